// src/session.rs
//
// Server-held quiz sessions. A session pins a randomly drawn question
// subset for one (quiz, student) pair, collects answers, and grades the
// attempt at submission time. Sessions live in process; abandoning one
// persists nothing.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::models::quiz::{PublicQuestion, Question};

/// Each attempt presents at most this many questions.
pub const MAX_PRESENTED_QUESTIONS: usize = 10;

/// One live quiz session. The presented subset and its order are fixed at
/// creation and persisted verbatim with the attempt.
#[derive(Debug)]
pub struct QuizSession {
    pub quiz_id: i64,
    pub student_id: i64,
    pub questions: Vec<Question>,
    /// Position -> chosen option text. Free-form; last write wins.
    pub answers: HashMap<usize, String>,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: i64,
    /// Guards against double submission (manual click racing timer expiry).
    submitting: bool,
}

impl QuizSession {
    /// Draws a uniformly shuffled permutation of the authored set and keeps
    /// a prefix of `min(10, n)` questions.
    pub fn new(
        quiz_id: i64,
        student_id: i64,
        mut authored: Vec<Question>,
        duration_minutes: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let mut rng = rand::rng();
        authored.shuffle(&mut rng);
        authored.truncate(MAX_PRESENTED_QUESTIONS.min(authored.len()));

        Self {
            quiz_id,
            student_id,
            questions: authored,
            answers: HashMap::new(),
            started_at: now,
            duration_seconds: duration_minutes * 60,
            submitting: false,
        }
    }

    /// Records an answer. The chosen text is not checked against the
    /// question's options; an overwrite replaces the previous choice.
    pub fn record_answer(
        &mut self,
        position: usize,
        answer: String,
    ) -> Result<(), AppError> {
        if position >= self.questions.len() {
            return Err(AppError::BadRequest(format!(
                "position {position} is out of range"
            )));
        }
        self.answers.insert(position, answer);
        Ok(())
    }

    /// Seconds elapsed since the session started, clamped to
    /// `[0, duration_seconds]`.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at)
            .num_seconds()
            .clamp(0, self.duration_seconds)
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        self.duration_seconds - self.elapsed_seconds(now)
    }

    pub fn presented(&self) -> Vec<PublicQuestion> {
        self.questions.iter().map(PublicQuestion::from).collect()
    }
}

/// Score = count of positions where the recorded answer equals the
/// presented question's answer key, by exact string equality.
pub fn grade(questions: &[Question], answers: &HashMap<usize, String>) -> i64 {
    questions
        .iter()
        .enumerate()
        .filter(|(pos, q)| answers.get(pos).is_some_and(|a| *a == q.correct))
        .count() as i64
}

/// Snapshot of a session returned to the presentation layer. Answer keys
/// are stripped from the presented questions.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub quiz_id: i64,
    pub questions: Vec<PublicQuestion>,
    pub total_questions: usize,
    pub duration_seconds: i64,
    pub remaining_seconds: i64,
    /// True when `start` re-entered an already-live session.
    pub resumed: bool,
}

/// Everything needed to write the attempt row, captured under the store
/// lock so a concurrent submit cannot grade the same session twice.
#[derive(Debug)]
pub struct PendingSubmission {
    pub questions: Vec<Question>,
    pub answers: HashMap<usize, String>,
    pub score: i64,
    pub time_taken_seconds: i64,
}

/// What a countdown poll observed for a (quiz, student) key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPoll {
    /// No session for this key; a watcher can stop.
    Gone,
    /// A submission is in flight. It may still fail and re-open the
    /// session, so this is not a terminal state.
    Submitting,
    Active { remaining_seconds: i64 },
}

/// In-process session store, keyed by (quiz, student). The single lock
/// serializes manual submission against timer expiry.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<(i64, i64), QuizSession>>>,
}

impl SessionStore {
    /// Starts a session, or returns the live one for this (quiz, student)
    /// with its original subset and the current remaining time.
    pub async fn start(
        &self,
        quiz_id: i64,
        student_id: i64,
        authored: Vec<Question>,
        duration_minutes: i64,
        now: DateTime<Utc>,
    ) -> SessionView {
        let mut sessions = self.inner.lock().await;
        let key = (quiz_id, student_id);

        if let Some(existing) = sessions.get(&key) {
            return SessionView {
                quiz_id,
                questions: existing.presented(),
                total_questions: existing.questions.len(),
                duration_seconds: existing.duration_seconds,
                remaining_seconds: existing.remaining_seconds(now),
                resumed: true,
            };
        }

        let session = QuizSession::new(quiz_id, student_id, authored, duration_minutes, now);
        let view = SessionView {
            quiz_id,
            questions: session.presented(),
            total_questions: session.questions.len(),
            duration_seconds: session.duration_seconds,
            remaining_seconds: session.remaining_seconds(now),
            resumed: false,
        };
        sessions.insert(key, session);
        view
    }

    pub async fn record_answer(
        &self,
        quiz_id: i64,
        student_id: i64,
        position: usize,
        answer: String,
    ) -> Result<(), AppError> {
        let mut sessions = self.inner.lock().await;
        let session = sessions
            .get_mut(&(quiz_id, student_id))
            .ok_or_else(|| AppError::NotFound("No active quiz session".to_string()))?;

        if session.submitting {
            return Err(AppError::Conflict(
                "Submission already in progress".to_string(),
            ));
        }

        session.record_answer(position, answer)
    }

    /// Marks the session as submitting and captures the graded snapshot.
    /// Fails if the session is gone or another submission is in flight.
    pub async fn begin_submit(
        &self,
        quiz_id: i64,
        student_id: i64,
        now: DateTime<Utc>,
    ) -> Result<PendingSubmission, AppError> {
        let mut sessions = self.inner.lock().await;
        let session = sessions
            .get_mut(&(quiz_id, student_id))
            .ok_or_else(|| AppError::NotFound("No active quiz session".to_string()))?;

        if session.submitting {
            return Err(AppError::Conflict(
                "Submission already in progress".to_string(),
            ));
        }
        session.submitting = true;

        Ok(PendingSubmission {
            score: grade(&session.questions, &session.answers),
            questions: session.questions.clone(),
            answers: session.answers.clone(),
            time_taken_seconds: session.elapsed_seconds(now),
        })
    }

    /// Drops the session after the attempt row is acknowledged.
    pub async fn finish_submit(&self, quiz_id: i64, student_id: i64) {
        self.inner.lock().await.remove(&(quiz_id, student_id));
    }

    /// Re-opens the session after a failed write so a re-submit is allowed.
    pub async fn abort_submit(&self, quiz_id: i64, student_id: i64) {
        if let Some(session) = self.inner.lock().await.get_mut(&(quiz_id, student_id)) {
            session.submitting = false;
        }
    }

    /// State of the session as seen by the countdown task. `Submitting` is
    /// transient: a failed write re-opens the session, so a watcher must
    /// keep polling through it and only stop on `Gone`.
    pub async fn poll(&self, quiz_id: i64, student_id: i64, now: DateTime<Utc>) -> SessionPoll {
        let sessions = self.inner.lock().await;
        match sessions.get(&(quiz_id, student_id)) {
            None => SessionPoll::Gone,
            Some(session) if session.submitting => SessionPoll::Submitting,
            Some(session) => SessionPoll::Active {
                remaining_seconds: session.remaining_seconds(now),
            },
        }
    }

    /// Abandons a session without persisting anything.
    pub async fn abandon(&self, quiz_id: i64, student_id: i64) {
        self.inner.lock().await.remove(&(quiz_id, student_id));
    }
}
