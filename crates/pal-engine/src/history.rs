//! Display-shaped view over a product's stage history.

use serde::{Deserialize, Serialize};

use pal_core::{Identity, Timestamp};
use pal_ledger::StageEvent;

/// One stage as presented to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sequence: u64,
    pub stage_name: String,
    pub authenticator: Identity,
    pub recorded_at: Timestamp,
}

impl From<StageEvent> for HistoryEntry {
    fn from(event: StageEvent) -> Self {
        Self {
            sequence: event.sequence,
            stage_name: event.stage_name,
            authenticator: event.authenticator,
            recorded_at: event.timestamp,
        }
    }
}

/// Order stages by ledger sequence.
///
/// Ledger timestamps never decrease along the sequence, so this is also
/// chronological order. The sort is stable.
pub fn history_view(events: Vec<StageEvent>) -> Vec<HistoryEntry> {
    let mut entries: Vec<HistoryEntry> = events.into_iter().map(HistoryEntry::from).collect();
    entries.sort_by_key(|e| e.sequence);
    entries
}
