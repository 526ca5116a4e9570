// src/scoring.rs

use crate::models::{quiz::Question, response::AnswerRecord};

/// Server-side result of grading one submission. Stored, never returned to the taker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scorecard {
    pub score: i32,
    pub total_questions: i32,
    pub total_time_taken_seconds: i64,
}

/// Grades `answers` against the answer key.
///
/// For each question the first answer carrying its index counts; a missing
/// answer or `-1` is never correct. Order of `answers` does not matter
/// except for that tie-break. Time is summed over every submitted answer.
pub fn grade(questions: &[Question], answers: &[AnswerRecord]) -> Scorecard {
    let score = questions
        .iter()
        .enumerate()
        .filter(|(index, question)| {
            answers
                .iter()
                .find(|a| a.question_index as usize == *index)
                .is_some_and(|a| a.selected_option >= 0 && a.selected_option == question.correct_answer)
        })
        .count() as i32;

    let total_time_taken_seconds = answers
        .iter()
        .map(|a| i64::from(a.time_taken_seconds))
        .sum();

    Scorecard {
        score,
        total_questions: questions.len() as i32,
        total_time_taken_seconds,
    }
}
