use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::segments::SEGMENT_COUNT;
use super::tokens::TokenLedger;

/// Sentence-length category that earns the shorter probation period.
pub const SHORT_SENTENCE: &str = "2-years-or-less";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata captured before segment 1. `email` comes from the sign-in
/// collaborator; the rest is entered by the officer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespondentProfile {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub length_of_sentence: String,
    #[serde(default)]
    pub officer_name: String,
    #[serde(default)]
    pub chief_name: String,
}

impl RespondentProfile {
    /// Declared category, falling back to the short-sentence category when blank.
    pub fn sentence_category(&self) -> &str {
        let declared = self.length_of_sentence.trim();
        if declared.is_empty() {
            SHORT_SENTENCE
        } else {
            declared
        }
    }
}

/// Stored per-question scores keyed by nominal segment, in question order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentAnswers(BTreeMap<u8, Vec<i32>>);

impl SegmentAnswers {
    pub fn set(&mut self, segment: u8, scores: Vec<i32>) {
        self.0.insert(segment, scores);
    }

    /// Empty when the segment has not been submitted.
    pub fn scores(&self, segment: u8) -> &[i32] {
        self.0.get(&segment).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_completed(&self, segment: u8) -> bool {
        self.0.contains_key(&segment)
    }

    pub fn completed(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.keys().copied()
    }

    pub fn is_finished(&self) -> bool {
        (1..=SEGMENT_COUNT).all(|segment| self.is_completed(segment))
    }
}

impl FromIterator<(u8, Vec<i32>)> for SegmentAnswers {
    fn from_iter<I: IntoIterator<Item = (u8, Vec<i32>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One assessment in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub respondent: RespondentProfile,
    pub answers: SegmentAnswers,
    pub tokens: TokenLedger,
    pub notes: String,
    /// Furthest segment the respondent may open.
    pub unlocked_segment: u8,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    pub fn new(respondent: RespondentProfile, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::generate(),
            respondent,
            answers: SegmentAnswers::default(),
            tokens: TokenLedger::default(),
            notes: String::new(),
            unlocked_segment: 1,
            created_at: now,
            last_active: now,
        }
    }

    pub fn is_idle(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.last_active > ttl
    }
}
