//! Stack locks
//!
//! A lock is a small JSON document next to the state file naming who holds
//! it and for which operation. Locks expire so that a run that died midway
//! does not block its stack until someone force-unlocks it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const LOCK_TIMEOUT_MINUTES: i64 = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockInfo {
    pub id: String,
    /// "apply" or "destroy"
    pub operation: String,
    /// user@host
    pub who: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl LockInfo {
    pub fn new(operation: impl Into<String>) -> Self {
        Self::taken(operation, holder(), Utc::now())
    }

    fn taken(operation: impl Into<String>, who: String, created: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
            who,
            created,
            expires: created + Duration::minutes(LOCK_TIMEOUT_MINUTES),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expired_at(Utc::now())
    }

    fn expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires
    }
}

fn holder() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}@{}", user, host)
}
