//! End-to-end authenticity properties of the reconciliation engine.

mod common;

use std::sync::Arc;
use std::thread;

use common::*;
use pal_core::{ErrorKind, Fingerprint};
use pal_engine::{EngineConfig, EngineError};
use pal_ledger::{Capability, Ledger};
use pal_store::{MetadataStore, PendingRegistrationStore};
use proptest::prelude::*;

// ── Round trip ──────────────────────────────────────────────────────

#[test]
fn register_then_verify_is_authentic() {
    let h = Harness::new();
    let receipt = h.engine.register(&h.owner, "P1", "Aspirin", "B001").unwrap();
    assert_eq!(receipt.fingerprint.as_str(), ASPIRIN_P1);
    assert_eq!(receipt.expires_at.to_iso8601(), "2028-01-15T12:00:00Z");

    let report = h.engine.verify("P1").unwrap();
    assert!(report.is_authentic);
    assert_eq!(report.store_fingerprint, report.ledger_fingerprint);
    assert_eq!(report.ledger_fingerprint, receipt.fingerprint);
    assert_eq!(report.record.product_type, "Aspirin");
    assert!(h.pending.list_pending().unwrap().is_empty());
}

#[test]
fn shelf_life_override_changes_expiry() {
    let config = EngineConfig::from_yaml_str("shelf_life:\n  overrides:\n    Vaccine: 180\n")
        .unwrap();
    let h = Harness::with_config(config);
    let receipt = h.engine.register(&h.owner, "V1", "Vaccine", "B9").unwrap();
    assert_eq!(receipt.expires_at.to_iso8601(), "2026-07-14T12:00:00Z");
    assert!(h.engine.verify("V1").unwrap().is_authentic);
}

// ── Tamper detection ────────────────────────────────────────────────

#[test]
fn out_of_band_edit_is_detected_without_failing() {
    let h = Harness::new();
    h.engine.register(&h.owner, "P1", "Aspirin", "B001").unwrap();

    let mut record = h.store.get(&pid("P1")).unwrap();
    record.product_type = "Ibuprofen".to_string();
    h.store.inner.overwrite_unchecked(record);

    let report = h.engine.verify("P1").unwrap();
    assert!(!report.is_authentic);
    assert_eq!(report.store_fingerprint.as_str(), IBUPROFEN_P1);
    assert_eq!(report.ledger_fingerprint.as_str(), ASPIRIN_P1);
    assert_eq!(report.record.product_type, "Ibuprofen");
}

#[test]
fn stored_fingerprint_column_is_not_trusted() {
    let h = Harness::new();
    h.engine.register(&h.owner, "P1", "Aspirin", "B001").unwrap();

    // Edit a field and forge the stored fingerprint to match the ledger.
    let mut record = h.store.get(&pid("P1")).unwrap();
    record.batch_number = pal_core::BatchNumber::new("B002").unwrap();
    record.fingerprint = Fingerprint::parse(ASPIRIN_P1).unwrap();
    h.store.inner.overwrite_unchecked(record);

    assert!(!h.engine.verify("P1").unwrap().is_authentic);
}

#[test]
fn verify_rereads_after_each_change() {
    let h = Harness::new();
    h.engine.register(&h.owner, "P1", "Aspirin", "B001").unwrap();
    assert!(h.engine.verify("P1").unwrap().is_authentic);

    let original = h.store.get(&pid("P1")).unwrap();
    let mut tampered = original.clone();
    tampered.product_type = "Ibuprofen".to_string();
    h.store.inner.overwrite_unchecked(tampered);
    assert!(!h.engine.verify("P1").unwrap().is_authentic);

    h.store.inner.overwrite_unchecked(original);
    assert!(h.engine.verify("P1").unwrap().is_authentic);
}

// ── Duplicate rejection ─────────────────────────────────────────────

#[test]
fn second_registration_is_rejected() {
    let h = Harness::new();
    h.engine.register(&h.owner, "P1", "Aspirin", "B001").unwrap();
    h.advance(5);
    let err = h
        .engine
        .register(&h.owner, "P1", "Aspirin", "B001")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    assert_eq!(h.registrations_of("P1"), 1);
    assert_eq!(h.store.inner.len(), 1);
    assert!(h.engine.verify("P1").unwrap().is_authentic);
    assert!(h.pending.list_pending().unwrap().is_empty());
}

#[test]
fn concurrent_registrations_have_one_winner() {
    let h = Arc::new(Harness::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let h = Arc::clone(&h);
            thread::spawn(move || h.engine.register(&h.owner, "P1", "Aspirin", "B001"))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|t| t.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::AlreadyExists, "unexpected {err}");
    }
    assert_eq!(h.registrations_of("P1"), 1);
    assert_eq!(h.store.inner.len(), 1);
    assert!(h.pending.list_pending().unwrap().is_empty());
}

// ── Authorization gate ──────────────────────────────────────────────

#[test]
fn unauthorized_register_changes_nothing() {
    let h = Harness::new();
    let events_before = h.ledger.events().unwrap();
    let err = h
        .engine
        .register(&id("mallory"), "P1", "Aspirin", "B001")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    assert_eq!(h.ledger.events().unwrap(), events_before);
    assert!(!h.ledger.exists(&pid("P1")).unwrap());
    assert!(h.store.inner.is_empty());
    assert!(h.pending.list_pending().unwrap().is_empty());
}

#[test]
fn unauthorized_add_stage_changes_nothing() {
    let h = Harness::new();
    h.engine.register(&h.owner, "P1", "Aspirin", "B001").unwrap();
    let err = h
        .engine
        .add_stage(&id("mallory"), "P1", "Packaged")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert!(h.engine.get_history("P1").unwrap().is_empty());
}

#[test]
fn granted_admin_can_record_and_revoked_admin_cannot() {
    let h = Harness::new();
    h.engine.register(&h.owner, "P1", "Aspirin", "B001").unwrap();

    assert!(h.engine.grant_admin(&h.owner, "packer").unwrap());
    assert!(!h.engine.grant_admin(&h.owner, "packer").unwrap());
    assert!(h.engine.is_admin("packer").unwrap());
    h.engine.add_stage(&id("packer"), "P1", "Packaged").unwrap();

    assert!(h.engine.revoke_admin(&h.owner, "packer").unwrap());
    let err = h
        .engine
        .add_stage(&id("packer"), "P1", "Shipped")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[test]
fn only_root_grants() {
    let h = Harness::new();
    h.engine.grant_admin(&h.owner, "admin").unwrap();
    let err = h.engine.grant_admin(&id("admin"), "other").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert!(!h
        .ledger
        .has_capability(&id("other"), Capability::Administrative)
        .unwrap());
}

#[test]
fn malformed_identity_is_invalid_argument() {
    let h = Harness::new();
    let err = h.engine.grant_admin(&h.owner, "two words").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = h.engine.grant_admin(&h.owner, "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

// ── History ordering ────────────────────────────────────────────────

#[test]
fn history_preserves_order_and_attribution() {
    let h = Harness::new();
    h.engine.register(&h.owner, "P1", "Aspirin", "B001").unwrap();
    h.engine.grant_admin(&h.owner, "shipper").unwrap();
    h.advance(60);
    h.engine.add_stage(&h.owner, "P1", "Packaged").unwrap();
    h.advance(60);
    h.engine.add_stage(&id("shipper"), "P1", "Shipped").unwrap();

    let history = h.engine.get_history("P1").unwrap();
    let names: Vec<_> = history.iter().map(|e| e.stage_name.as_str()).collect();
    assert_eq!(names, ["Packaged", "Shipped"]);
    assert!(history[0].recorded_at <= history[1].recorded_at);
    assert_eq!(history[0].authenticator, h.owner);
    assert_eq!(history[1].authenticator, id("shipper"));
    assert_eq!(history[0].recorded_at.to_iso8601(), "2026-01-15T12:01:00Z");
}

#[test]
fn history_timestamps_survive_clock_regression() {
    let h = Harness::new();
    h.engine.register(&h.owner, "P1", "Aspirin", "B001").unwrap();
    h.advance(3600);
    h.engine.add_stage(&h.owner, "P1", "Packaged").unwrap();
    h.advance(-7200);
    h.engine.add_stage(&h.owner, "P1", "Shipped").unwrap();

    let history = h.engine.get_history("P1").unwrap();
    assert!(history[0].recorded_at <= history[1].recorded_at);
}

#[test]
fn new_product_has_empty_history() {
    let h = Harness::new();
    h.engine.register(&h.owner, "P1", "Aspirin", "B001").unwrap();
    assert!(h.engine.get_history("P1").unwrap().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn history_matches_append_order(names in proptest::collection::vec("[A-Za-z][A-Za-z ]{0,15}", 1..12)) {
        let h = Harness::new();
        h.engine.register(&h.owner, "P1", "Aspirin", "B001").unwrap();
        for name in &names {
            h.engine.add_stage(&h.owner, "P1", name).unwrap();
        }
        let history = h.engine.get_history("P1").unwrap();
        let got: Vec<_> = history.iter().map(|e| e.stage_name.clone()).collect();
        prop_assert_eq!(got, names);
        prop_assert!(history.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }
}

// ── Missing product ─────────────────────────────────────────────────

#[test]
fn unknown_product_is_not_found() {
    let h = Harness::new();
    assert_eq!(h.engine.verify("unknown").unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(
        h.engine.get_history("unknown").unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        h.engine
            .add_stage(&h.owner, "unknown", "Packaged")
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn store_without_ledger_entry_is_reported_as_ledger_not_found() {
    let h = Harness::new();
    h.engine.register(&h.owner, "P1", "Aspirin", "B001").unwrap();
    let mut orphan = h.store.get(&pid("P1")).unwrap();
    orphan.product_id = pid("P2");
    h.store.inner.overwrite_unchecked(orphan);

    match h.engine.verify("P2") {
        Err(EngineError::Ledger(e)) => assert_eq!(e.kind(), ErrorKind::NotFound),
        other => panic!("expected ledger NotFound, got {other:?}"),
    }
    match h.engine.verify("P3") {
        Err(EngineError::Store(e)) => assert_eq!(e.kind(), ErrorKind::NotFound),
        other => panic!("expected store NotFound, got {other:?}"),
    }
}

// ── Input validation ────────────────────────────────────────────────

#[test]
fn blank_inputs_are_rejected_before_any_write() {
    let h = Harness::new();
    for (product_id, product_type, batch) in [
        ("", "Aspirin", "B001"),
        ("P1", "  ", "B001"),
        ("P1", "Aspirin", ""),
    ] {
        let err = h
            .engine
            .register(&h.owner, product_id, product_type, batch)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
    let err = h.engine.add_stage(&h.owner, "P1", "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(h.ledger.events().unwrap().len(), 2);
    assert!(h.store.inner.is_empty());
}

#[test]
fn oversized_batch_number_is_rejected() {
    let h = Harness::new();
    let err = h
        .engine
        .register(&h.owner, "P1", "Aspirin", &"B".repeat(65))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}
