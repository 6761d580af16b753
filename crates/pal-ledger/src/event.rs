//! # Ledger Events and the Hash-Chained Event Log
//!
//! Every accepted mutation appends one [`LedgerEvent`]. Events carry a
//! ledger-wide sequence number (starting at 1), the acting identity, and a
//! ledger-assigned timestamp.
//!
//! ## Chain
//!
//! ```text
//! digest_n = SHA-256(JCS({sequence, kind, actor, timestamp, prev_digest: digest_{n-1}}))
//! digest_0 = "00…00" (64 zeros)
//! ```
//!
//! Editing, reordering, or deleting any event breaks every digest after it,
//! which [`EventLog::verify_chain`] detects.

use serde::{Deserialize, Serialize};

use pal_core::{sha256_hex, CanonicalBytes, Fingerprint, Identity, ProductId, Timestamp};

use crate::error::LedgerError;
use crate::policy::Capability;

/// `prev_digest` of the first event.
pub const GENESIS_DIGEST: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// One lifecycle milestone recorded against a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEvent {
    /// The product this stage belongs to.
    pub product_id: ProductId,
    /// Ledger-wide sequence number of the event that recorded this stage.
    pub sequence: u64,
    /// Stage label (e.g. "Packaged").
    pub stage_name: String,
    /// Identity that recorded the stage.
    pub authenticator: Identity,
    /// Ledger-assigned time of recording.
    pub timestamp: Timestamp,
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEventKind {
    /// A product fingerprint was anchored.
    ProductRegistered {
        product_id: ProductId,
        fingerprint: Fingerprint,
    },
    /// A stage was appended to a product's history.
    StageAppended {
        product_id: ProductId,
        stage_name: String,
    },
    /// A capability was granted.
    CapabilityGranted {
        identity: Identity,
        capability: Capability,
    },
    /// A capability was revoked.
    CapabilityRevoked {
        identity: Identity,
        capability: Capability,
    },
}

/// A sequenced, attributed, chained ledger event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Ledger-wide sequence number.
    pub sequence: u64,
    /// Event payload.
    pub kind: LedgerEventKind,
    /// Identity that caused the event.
    pub actor: Identity,
    /// Ledger-assigned timestamp.
    pub timestamp: Timestamp,
    /// Digest of the previous event (or [`GENESIS_DIGEST`]).
    pub prev_digest: String,
    /// Digest of this event.
    pub digest: String,
}

#[derive(Serialize)]
struct EventBody<'a> {
    sequence: u64,
    kind: &'a LedgerEventKind,
    actor: &'a Identity,
    timestamp: &'a Timestamp,
    prev_digest: &'a str,
}

fn event_digest(
    sequence: u64,
    kind: &LedgerEventKind,
    actor: &Identity,
    timestamp: &Timestamp,
    prev_digest: &str,
) -> Result<String, LedgerError> {
    let body = EventBody {
        sequence,
        kind,
        actor,
        timestamp,
        prev_digest,
    };
    let cb = CanonicalBytes::new(&body)
        .map_err(|e| LedgerError::Integrity(format!("event {sequence} not canonicalizable: {e}")))?;
    Ok(sha256_hex(&cb))
}

/// Append-only event log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<LedgerEvent>,
}

impl EventLog {
    /// Sequence number the next event will receive.
    pub fn next_sequence(&self) -> u64 {
        self.events.last().map_or(1, |e| e.sequence + 1)
    }

    /// Digest of the last event, or [`GENESIS_DIGEST`] when empty.
    pub fn head_digest(&self) -> &str {
        self.events
            .last()
            .map_or(GENESIS_DIGEST, |e| e.digest.as_str())
    }

    /// Build the next event without appending it.
    ///
    /// Callers prepare the event first and commit it with [`Self::commit`]
    /// only after every other precondition has passed.
    pub fn prepare(
        &self,
        kind: LedgerEventKind,
        actor: &Identity,
        timestamp: Timestamp,
    ) -> Result<LedgerEvent, LedgerError> {
        let sequence = self.next_sequence();
        let prev_digest = self.head_digest().to_string();
        let digest = event_digest(sequence, &kind, actor, &timestamp, &prev_digest)?;
        Ok(LedgerEvent {
            sequence,
            kind,
            actor: actor.clone(),
            timestamp,
            prev_digest,
            digest,
        })
    }

    /// Append a prepared event.
    ///
    /// Rejects an event that does not extend the current head.
    pub fn commit(&mut self, event: LedgerEvent) -> Result<(), LedgerError> {
        if event.sequence != self.next_sequence() || event.prev_digest != self.head_digest() {
            return Err(LedgerError::Integrity(format!(
                "event {} does not extend head {}",
                event.sequence,
                self.head_digest()
            )));
        }
        self.events.push(event);
        Ok(())
    }

    /// Recompute every digest and check linkage.
    pub fn verify_chain(&self) -> Result<(), LedgerError> {
        let mut prev = GENESIS_DIGEST.to_string();
        for (i, e) in self.events.iter().enumerate() {
            let expected_seq = i as u64 + 1;
            if e.sequence != expected_seq {
                return Err(LedgerError::Integrity(format!(
                    "event at position {i} has sequence {}, expected {expected_seq}",
                    e.sequence
                )));
            }
            if e.prev_digest != prev {
                return Err(LedgerError::Integrity(format!(
                    "event {} prev_digest does not match predecessor",
                    e.sequence
                )));
            }
            let recomputed = event_digest(e.sequence, &e.kind, &e.actor, &e.timestamp, &prev)?;
            if recomputed != e.digest {
                return Err(LedgerError::Integrity(format!(
                    "event {} digest mismatch",
                    e.sequence
                )));
            }
            prev = e.digest.clone();
        }
        Ok(())
    }

    /// All events in sequence order.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> Identity {
        Identity::new("deployer").unwrap()
    }

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_epoch_secs(1_768_478_400 + secs).unwrap()
    }

    fn grant(identity: &str) -> LedgerEventKind {
        LedgerEventKind::CapabilityGranted {
            identity: Identity::new(identity).unwrap(),
            capability: Capability::Administrative,
        }
    }

    fn log_with(n: usize) -> EventLog {
        let mut log = EventLog::default();
        for i in 0..n {
            let e = log.prepare(grant(&format!("id{i}")), &actor(), ts(i as i64)).unwrap();
            log.commit(e).unwrap();
        }
        log
    }

    #[test]
    fn sequences_start_at_one_and_chain() {
        let log = log_with(3);
        let events = log.events();
        assert_eq!(events[0].sequence, 1);
        assert_eq!(events[0].prev_digest, GENESIS_DIGEST);
        assert_eq!(events[1].prev_digest, events[0].digest);
        assert_eq!(events[2].prev_digest, events[1].digest);
        assert!(log.verify_chain().is_ok());
    }

    #[test]
    fn prepare_does_not_mutate() {
        let log = log_with(1);
        let _ = log.prepare(grant("x"), &actor(), ts(9)).unwrap();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn stale_prepared_event_is_rejected() {
        let mut log = log_with(1);
        let a = log.prepare(grant("a"), &actor(), ts(1)).unwrap();
        let b = log.prepare(grant("b"), &actor(), ts(1)).unwrap();
        log.commit(a).unwrap();
        assert!(matches!(log.commit(b), Err(LedgerError::Integrity(_))));
    }

    #[test]
    fn tampered_payload_breaks_chain() {
        let mut log = log_with(3);
        log.events[1].kind = grant("mallory");
        assert!(matches!(log.verify_chain(), Err(LedgerError::Integrity(_))));
    }

    #[test]
    fn deleted_event_breaks_chain() {
        let mut log = log_with(3);
        log.events.remove(1);
        assert!(log.verify_chain().is_err());
    }

    #[test]
    fn event_kind_serializes_with_type_tag() {
        let json = serde_json::to_value(grant("alice")).unwrap();
        assert_eq!(json["type"], "capability_granted");
        assert_eq!(json["capability"], "administrative");
    }
}
