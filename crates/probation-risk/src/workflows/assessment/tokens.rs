//! Step-gating tokens.
//!
//! A token is a truncated SHA-256 digest of `session id + purpose + time
//! bucket`. It is a sequencing guard that makes skipped or forged wizard steps
//! evident; it is not an authorization boundary, since anyone holding the
//! session id can derive the value for the current second.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::session::SessionId;

/// Hex characters kept from the digest.
pub const TOKEN_LENGTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Entering or submitting the next segment page.
    Segment,
    /// Viewing the summary.
    Results,
    /// Triggering the document export.
    GeneratePdf,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Segment => "segment",
            TokenPurpose::Results => "results",
            TokenPurpose::GeneratePdf => "generate_pdf",
        }
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepToken(pub String);

impl StepToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of the coarse time bucket that salts issued tokens.
pub type BucketClock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Issues and verifies tokens. Holds no per-session state.
#[derive(Clone)]
pub struct TokenAuthority {
    clock: BucketClock,
}

impl Default for TokenAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthority").finish_non_exhaustive()
    }
}

impl TokenAuthority {
    /// Buckets by wall-clock second.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(|| Utc::now().timestamp()))
    }

    pub fn with_clock(clock: BucketClock) -> Self {
        Self { clock }
    }

    pub fn issue(&self, session_id: &SessionId, purpose: TokenPurpose) -> StepToken {
        Self::derive(session_id, purpose, (self.clock)())
    }

    /// Accepts the value expected for the current bucket or any remembered token.
    pub fn verify(
        &self,
        token: &str,
        session_id: &SessionId,
        purpose: TokenPurpose,
        ledger: &TokenLedger,
    ) -> bool {
        if token.is_empty() {
            return false;
        }
        if self.issue(session_id, purpose).as_str() == token {
            return true;
        }
        ledger.contains(purpose, token)
    }

    fn derive(session_id: &SessionId, purpose: TokenPurpose, bucket: i64) -> StepToken {
        let mut hasher = Sha256::new();
        hasher.update(session_id.as_str().as_bytes());
        hasher.update(purpose.as_str().as_bytes());
        hasher.update(bucket.to_string().as_bytes());
        let digest = hex::encode(hasher.finalize());
        StepToken(digest[..TOKEN_LENGTH].to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct PurposeTokens {
    current: Option<StepToken>,
    /// Oldest first.
    history: VecDeque<StepToken>,
}

/// Per-session record of issued tokens, bounded per purpose.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLedger {
    purposes: HashMap<TokenPurpose, PurposeTokens>,
}

impl TokenLedger {
    /// Sets the current token and remembers it, evicting the oldest entries
    /// beyond `cap`.
    pub fn record(&mut self, purpose: TokenPurpose, token: StepToken, cap: usize) {
        let entry = self.purposes.entry(purpose).or_default();
        if !entry.history.contains(&token) {
            entry.history.push_back(token.clone());
        }
        while entry.history.len() > cap.max(1) {
            entry.history.pop_front();
        }
        entry.current = Some(token);
    }

    pub fn current(&self, purpose: TokenPurpose) -> Option<&StepToken> {
        self.purposes
            .get(&purpose)
            .and_then(|entry| entry.current.as_ref())
    }

    pub fn contains(&self, purpose: TokenPurpose, token: &str) -> bool {
        self.purposes.get(&purpose).is_some_and(|entry| {
            entry
                .current
                .as_ref()
                .is_some_and(|current| current.as_str() == token)
                || entry.history.iter().any(|known| known.as_str() == token)
        })
    }

    pub fn history_len(&self, purpose: TokenPurpose) -> usize {
        self.purposes
            .get(&purpose)
            .map_or(0, |entry| entry.history.len())
    }
}
