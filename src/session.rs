// src/session.rs

//! Taker-side session for a timed quiz.
//!
//! `QuizSession` is a pure state machine: it only moves through
//! `handle(event)`, and every transition returns the `Effect` the caller
//! must carry out (start a countdown, wait out the transition delay, send
//! the answers). `drive` is the cooperative runner that owns the single
//! countdown and feeds user actions into the machine.
//!
//! There is no event that moves to an earlier question.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::{
    sync::mpsc::{self, error::TryRecvError},
    time::{Instant, MissedTickBehavior, interval_at, sleep},
};

use crate::models::{
    quiz::{OPTIONS_PER_QUESTION, PublicQuiz},
    response::{AnswerRecord, SubmitAck, UNANSWERED},
};

/// Pause between recording an answer and showing the next question.
pub const TRANSITION_DELAY: Duration = Duration::from_millis(300);

/// Countdown resolution.
pub const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    InQuestion {
        index: usize,
        remaining_seconds: u32,
        elapsed_seconds: u32,
        selected: Option<u8>,
    },
    /// Answer for `next_index - 1` is recorded; input is locked.
    Transitioning { next_index: usize },
    Submitting,
    Completed {
        feedback_link: Option<String>,
        already_submitted: bool,
    },
    /// The taker may not start this quiz.
    Blocked { reason: String },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Start,
    Select(u8),
    Next,
    TimerTick,
    TransitionElapsed,
    SubmitResult(Result<SubmitAck, SubmitFailure>),
}

/// What the runner must do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Idle,
    /// A question is on screen; (re)start the countdown.
    ShowQuestion { index: usize, time_limit_seconds: u32 },
    /// Wait `TRANSITION_DELAY`, then send `TransitionElapsed`.
    ScheduleTransition(Duration),
    /// Send the full ordered answer list, exactly once.
    Submit(Vec<AnswerRecord>),
}

/// Why the server refused the answer list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitFailure {
    AlreadySubmitted,
    Rejected(String),
}

/// An event arrived in a state that does not accept it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub state: SessionState,
    pub event: SessionEvent,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event {:?} not accepted in state {:?}", self.event, self.state)
    }
}

impl std::error::Error for InvalidTransition {}

pub struct QuizSession {
    time_limits: Vec<u32>,
    state: SessionState,
    answers: Vec<AnswerRecord>,
}

impl QuizSession {
    pub fn new(quiz: &PublicQuiz) -> Self {
        let time_limits = quiz
            .questions
            .iter()
            .map(|q| q.time_limit_seconds.max(1) as u32)
            .collect();

        Self {
            time_limits,
            state: SessionState::NotStarted,
            answers: Vec::new(),
        }
    }

    /// A session that can never start, e.g. after the gate refused access.
    pub fn blocked(quiz: &PublicQuiz, reason: impl Into<String>) -> Self {
        let mut session = Self::new(quiz);
        session.state = SessionState::Blocked {
            reason: reason.into(),
        };
        session
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Answers recorded so far, in question order.
    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.state {
            SessionState::InQuestion { index, .. } => Some(index),
            _ => None,
        }
    }

    pub fn handle(&mut self, event: SessionEvent) -> Result<Effect, InvalidTransition> {
        match (&mut self.state, event) {
            (SessionState::NotStarted, SessionEvent::Start) => {
                if self.time_limits.is_empty() {
                    self.state = SessionState::Error {
                        message: "quiz has no questions".to_string(),
                    };
                    return Ok(Effect::Idle);
                }
                self.answers.clear();
                Ok(self.show(0))
            }

            (SessionState::InQuestion { selected, .. }, SessionEvent::Select(option))
                if usize::from(option) < OPTIONS_PER_QUESTION =>
            {
                *selected = Some(option);
                Ok(Effect::Idle)
            }

            (SessionState::InQuestion { .. }, SessionEvent::Next) => Ok(self.record_and_advance()),

            (
                SessionState::InQuestion {
                    remaining_seconds,
                    elapsed_seconds,
                    ..
                },
                SessionEvent::TimerTick,
            ) => {
                *remaining_seconds = remaining_seconds.saturating_sub(1);
                *elapsed_seconds += 1;
                if *remaining_seconds == 0 {
                    return Ok(self.record_and_advance());
                }
                Ok(Effect::Idle)
            }

            (SessionState::Transitioning { next_index }, SessionEvent::TransitionElapsed) => {
                let next = *next_index;
                Ok(self.show(next))
            }

            (SessionState::Submitting, SessionEvent::SubmitResult(result)) => {
                self.state = match result {
                    Ok(ack) => SessionState::Completed {
                        feedback_link: ack.feedback_link,
                        already_submitted: false,
                    },
                    Err(SubmitFailure::AlreadySubmitted) => SessionState::Completed {
                        feedback_link: None,
                        already_submitted: true,
                    },
                    Err(SubmitFailure::Rejected(message)) => SessionState::Error { message },
                };
                Ok(Effect::Idle)
            }

            (state, event) => Err(InvalidTransition {
                state: state.clone(),
                event,
            }),
        }
    }

    fn show(&mut self, index: usize) -> Effect {
        let time_limit_seconds = self.time_limits[index];
        self.state = SessionState::InQuestion {
            index,
            remaining_seconds: time_limit_seconds,
            elapsed_seconds: 0,
            selected: None,
        };
        Effect::ShowQuestion {
            index,
            time_limit_seconds,
        }
    }

    /// Records the answer for the current question and locks input.
    fn record_and_advance(&mut self) -> Effect {
        let SessionState::InQuestion {
            index,
            elapsed_seconds,
            selected,
            ..
        } = self.state
        else {
            return Effect::Idle;
        };

        self.answers.push(AnswerRecord {
            question_index: index as u32,
            selected_option: selected.map_or(UNANSWERED, i32::from),
            time_taken_seconds: elapsed_seconds,
        });

        if index + 1 >= self.time_limits.len() {
            self.state = SessionState::Submitting;
            Effect::Submit(self.answers.clone())
        } else {
            self.state = SessionState::Transitioning {
                next_index: index + 1,
            };
            Effect::ScheduleTransition(TRANSITION_DELAY)
        }
    }
}

/// User input forwarded to a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Select(u8),
    Next,
}

impl From<UserAction> for SessionEvent {
    fn from(action: UserAction) -> Self {
        match action {
            UserAction::Select(option) => SessionEvent::Select(option),
            UserAction::Next => SessionEvent::Next,
        }
    }
}

/// Delivers the final answer list to the scoring endpoint.
#[async_trait]
pub trait AnswerSubmitter: Send + Sync {
    async fn submit(&self, answers: Vec<AnswerRecord>) -> Result<SubmitAck, SubmitFailure>;
}

/// Runs a session to completion on the current task.
///
/// One countdown exists at a time and it is dropped as soon as an answer is
/// recorded, so a late tick can never race a manual `Next`. Actions that
/// arrive during the transition delay are discarded. Closing the
/// `actions` channel abandons the session; nothing is sent in that case.
pub async fn drive<S>(
    mut session: QuizSession,
    mut actions: mpsc::Receiver<UserAction>,
    submitter: &S,
) -> QuizSession
where
    S: AnswerSubmitter + ?Sized,
{
    let mut effect = match session.handle(SessionEvent::Start) {
        Ok(effect) => effect,
        Err(err) => {
            tracing::debug!("session not started: {}", err);
            return session;
        }
    };
    let mut countdown = None;

    loop {
        match effect {
            Effect::ShowQuestion { index, .. } => {
                tracing::trace!("showing question {}", index);
                let mut ticker = interval_at(Instant::now() + TICK, TICK);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                countdown = Some(ticker);
            }
            Effect::ScheduleTransition(delay) => {
                countdown = None;
                sleep(delay).await;
                // Input is locked while transitioning; clicks made meanwhile are discarded.
                loop {
                    match actions.try_recv() {
                        Ok(action) => tracing::debug!("dropped {:?} during transition", action),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            tracing::debug!("session abandoned during transition");
                            return session;
                        }
                    }
                }
                effect = session
                    .handle(SessionEvent::TransitionElapsed)
                    .unwrap_or(Effect::Idle);
                continue;
            }
            Effect::Submit(answers) => {
                let outcome = submitter.submit(answers).await;
                if let Err(err) = session.handle(SessionEvent::SubmitResult(outcome)) {
                    tracing::warn!("submit result dropped: {}", err);
                }
                return session;
            }
            Effect::Idle => {}
        }

        let Some(ticker) = countdown.as_mut() else {
            return session;
        };

        let event = tokio::select! {
            _ = ticker.tick() => SessionEvent::TimerTick,
            action = actions.recv() => match action {
                Some(action) => action.into(),
                None => {
                    tracing::debug!("session abandoned at {:?}", session.current_index());
                    return session;
                }
            },
        };

        effect = match session.handle(event) {
            Ok(effect) => effect,
            Err(err) => {
                tracing::debug!("ignored: {}", err);
                Effect::Idle
            }
        };
    }
}
