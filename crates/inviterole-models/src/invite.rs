use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One invite link as observed at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteRecord {
    pub code: String,
    pub uses: u32,
    /// `None` or `Some(0)` both mean unlimited on the platform.
    pub max_uses: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// All invites of a guild captured at once.
///
/// Snapshots are immutable once built; the store hands out clones that share
/// the same record map.
#[derive(Debug, Clone)]
pub struct InviteSnapshot {
    invites: Arc<HashMap<String, InviteRecord>>,
    captured_at: DateTime<Utc>,
}

impl InviteSnapshot {
    pub fn new(records: impl IntoIterator<Item = InviteRecord>, captured_at: DateTime<Utc>) -> Self {
        let invites = records
            .into_iter()
            .map(|record| (record.code.clone(), record))
            .collect();
        Self {
            invites: Arc::new(invites),
            captured_at,
        }
    }

    /// Build a snapshot stamped with the current time.
    pub fn capture(records: impl IntoIterator<Item = InviteRecord>) -> Self {
        Self::new(records, Utc::now())
    }

    pub fn get(&self, code: &str) -> Option<&InviteRecord> {
        self.invites.get(code)
    }

    pub fn uses(&self, code: &str) -> u32 {
        self.invites.get(code).map_or(0, |r| r.uses)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InviteRecord> {
        self.invites.values()
    }

    pub fn len(&self) -> usize {
        self.invites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invites.is_empty()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// True when both snapshots are the very same capture (not merely equal).
    pub fn same_capture(&self, other: &InviteSnapshot) -> bool {
        Arc::ptr_eq(&self.invites, &other.invites) && self.captured_at == other.captured_at
    }
}

impl PartialEq for InviteSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.captured_at == other.captured_at && self.invites == other.invites
    }
}

impl Eq for InviteSnapshot {}
