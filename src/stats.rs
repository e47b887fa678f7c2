// src/stats.rs
//
// Pure aggregation over fetched attempt rows: per-student statistics,
// class/quiz rollups, and leaderboard ranking. These functions never fail
// on empty input; they degrade to zero values so a dashboard can always
// render.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Students whose pooled accuracy falls below this need attention.
pub const ATTENTION_THRESHOLD: f64 = 60.0;

/// Improvement-rate window for the faculty class view.
pub const CLASS_IMPROVEMENT_WINDOW: usize = 3;

/// Improvement-rate window for the student self view.
pub const SELF_IMPROVEMENT_WINDOW: usize = 5;

/// The facts about one attempt that aggregation consumes.
/// Collections of these are expected in most-recent-first order, matching
/// the `completed_at DESC` fetch order.
#[derive(Debug, Clone)]
pub struct AttemptFacts {
    pub score: i64,
    pub total_questions: i64,
    pub time_taken_seconds: i64,
    pub completed_at: DateTime<Utc>,
}

impl AttemptFacts {
    /// Per-attempt accuracy percentage.
    pub fn accuracy(&self) -> f64 {
        if self.total_questions == 0 {
            0.0
        } else {
            self.score as f64 / self.total_questions as f64 * 100.0
        }
    }
}

/// Per-student rollup across attempts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StudentStats {
    pub total_quizzes: usize,
    pub average_score: f64,
    /// Pooled accuracy: `sum(score) / sum(total_questions) * 100`, weighted
    /// by question count. Not the mean of per-attempt percentages.
    pub average_accuracy: f64,
    pub best_accuracy: f64,
    pub improvement_rate: f64,
    pub total_time_seconds: i64,
}

/// Aggregates one student's attempts. Empty input yields all zeros.
pub fn aggregate(attempts: &[AttemptFacts], improvement_window: usize) -> StudentStats {
    if attempts.is_empty() {
        return StudentStats::default();
    }

    let total_score: i64 = attempts.iter().map(|a| a.score).sum();
    let total_questions: i64 = attempts.iter().map(|a| a.total_questions).sum();

    let average_accuracy = if total_questions == 0 {
        0.0
    } else {
        total_score as f64 / total_questions as f64 * 100.0
    };

    StudentStats {
        total_quizzes: attempts.len(),
        average_score: total_score as f64 / attempts.len() as f64,
        average_accuracy,
        best_accuracy: attempts
            .iter()
            .map(AttemptFacts::accuracy)
            .fold(0.0, f64::max),
        improvement_rate: improvement_rate(attempts, improvement_window),
        total_time_seconds: attempts.iter().map(|a| a.time_taken_seconds).sum(),
    }
}

/// Compares the mean accuracy of the most-recent `window` attempts against
/// the oldest `window`, as a signed percentage relative to the older mean.
/// The windows overlap when fewer than `2 * window` attempts exist. Returns
/// 0 when there are fewer than `window` attempts or the older mean is
/// exactly zero.
pub fn improvement_rate(attempts: &[AttemptFacts], window: usize) -> f64 {
    if window == 0 || attempts.len() < window {
        return 0.0;
    }

    let mean = |slice: &[AttemptFacts]| {
        slice.iter().map(AttemptFacts::accuracy).sum::<f64>() / slice.len() as f64
    };

    let recent = mean(&attempts[..window]);
    let older = mean(&attempts[attempts.len() - window..]);

    if older == 0.0 {
        return 0.0;
    }
    (recent - older) / older * 100.0
}

/// Class-level rollup over the per-student statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassStats {
    pub total_students: usize,
    /// Mean of the per-student pooled accuracies.
    pub average_accuracy: f64,
    pub total_attempts: usize,
    /// Students with pooled accuracy below [`ATTENTION_THRESHOLD`].
    pub needing_attention: usize,
    pub attempts_per_student: f64,
}

pub fn class_rollup(students: &[StudentStats], total_attempts: usize) -> ClassStats {
    if students.is_empty() {
        return ClassStats::default();
    }

    let accuracy_sum: f64 = students.iter().map(|s| s.average_accuracy).sum();

    ClassStats {
        total_students: students.len(),
        average_accuracy: accuracy_sum / students.len() as f64,
        total_attempts,
        needing_attention: students
            .iter()
            .filter(|s| s.average_accuracy < ATTENTION_THRESHOLD)
            .count(),
        attempts_per_student: total_attempts as f64 / students.len() as f64,
    }
}

/// Rollup across all attempts of one quiz, for the faculty results view.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QuizStats {
    pub total_attempts: usize,
    pub average_score: f64,
    /// Pooled accuracy across attempts.
    pub average_accuracy: f64,
    pub average_time_seconds: f64,
    /// Fraction of attempts at or above the attention threshold, as a
    /// percentage.
    pub pass_rate: f64,
}

pub fn quiz_rollup(attempts: &[AttemptFacts]) -> QuizStats {
    if attempts.is_empty() {
        return QuizStats::default();
    }

    let total_score: i64 = attempts.iter().map(|a| a.score).sum();
    let total_questions: i64 = attempts.iter().map(|a| a.total_questions).sum();
    let total_time: i64 = attempts.iter().map(|a| a.time_taken_seconds).sum();
    let pass_count = attempts
        .iter()
        .filter(|a| a.accuracy() >= ATTENTION_THRESHOLD)
        .count();

    QuizStats {
        total_attempts: attempts.len(),
        average_score: total_score as f64 / attempts.len() as f64,
        average_accuracy: if total_questions == 0 {
            0.0
        } else {
            total_score as f64 / total_questions as f64 * 100.0
        },
        average_time_seconds: total_time as f64 / attempts.len() as f64,
        pass_rate: pass_count as f64 / attempts.len() as f64 * 100.0,
    }
}

/// Rank badge: the top three positions are distinguished, the rest are
/// plain ordinals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankBadge {
    Gold,
    Silver,
    Bronze,
    Position(usize),
}

impl RankBadge {
    pub fn for_rank(rank: usize) -> Self {
        match rank {
            0 => RankBadge::Gold,
            1 => RankBadge::Silver,
            2 => RankBadge::Bronze,
            n => RankBadge::Position(n + 1),
        }
    }
}

impl Serialize for RankBadge {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RankBadge::Gold => serializer.serialize_str("gold"),
            RankBadge::Silver => serializer.serialize_str("silver"),
            RankBadge::Bronze => serializer.serialize_str("bronze"),
            RankBadge::Position(n) => serializer.serialize_str(&format!("#{n}")),
        }
    }
}

/// A ranked leaderboard row.
#[derive(Debug, Clone, Serialize)]
pub struct Ranked<T> {
    pub rank: usize,
    pub badge: RankBadge,
    #[serde(flatten)]
    pub entry: T,
}

/// Stable sort by score descending with earliest completion as the
/// deterministic secondary key; entries tied on both keep their input
/// order. `key` returns `(score, completed_at)` for an entry.
pub fn rank<T, F>(mut entries: Vec<T>, key: F) -> Vec<Ranked<T>>
where
    F: Fn(&T) -> (i64, DateTime<Utc>),
{
    entries.sort_by(|a, b| {
        let (score_a, time_a) = key(a);
        let (score_b, time_b) = key(b);
        score_b.cmp(&score_a).then(time_a.cmp(&time_b))
    });

    entries
        .into_iter()
        .enumerate()
        .map(|(rank, entry)| Ranked {
            rank,
            badge: RankBadge::for_rank(rank),
            entry,
        })
        .collect()
}

/// One student's attempts within a class-scoped fetch.
#[derive(Debug, Clone)]
pub struct StudentAttempts {
    pub student_id: i64,
    pub student_name: String,
    pub attempts: Vec<AttemptFacts>,
}

/// Groups class-scoped attempt facts by student, preserving the order in
/// which students first appear and each student's row order.
pub fn group_by_student(
    rows: impl IntoIterator<Item = (i64, String, AttemptFacts)>,
) -> Vec<StudentAttempts> {
    let mut grouped: Vec<StudentAttempts> = Vec::new();
    for (student_id, student_name, facts) in rows {
        match grouped.iter_mut().find(|g| g.student_id == student_id) {
            Some(group) => group.attempts.push(facts),
            None => grouped.push(StudentAttempts {
                student_id,
                student_name,
                attempts: vec![facts],
            }),
        }
    }
    grouped
}

/// One row of the overall (cross-quiz) leaderboard. Total score is the
/// sort key; the average is a display metric only.
#[derive(Debug, Clone, Serialize)]
pub struct OverallEntry {
    pub student_id: i64,
    pub student_name: String,
    pub total_score: i64,
    pub attempt_count: usize,
    pub average_score: f64,
    #[serde(skip)]
    pub first_completed_at: DateTime<Utc>,
}

/// Builds overall leaderboard entries from grouped attempts. The earliest
/// completion timestamp is kept as the ranking tie-break.
pub fn overall_entries(groups: &[StudentAttempts]) -> Vec<OverallEntry> {
    groups
        .iter()
        .filter(|g| !g.attempts.is_empty())
        .map(|g| {
            let total_score: i64 = g.attempts.iter().map(|a| a.score).sum();
            let first_completed_at = g
                .attempts
                .iter()
                .map(|a| a.completed_at)
                .min()
                .unwrap_or_else(Utc::now);
            OverallEntry {
                student_id: g.student_id,
                student_name: g.student_name.clone(),
                total_score,
                attempt_count: g.attempts.len(),
                average_score: total_score as f64 / g.attempts.len() as f64,
                first_completed_at,
            }
        })
        .collect()
}
