use contactsync_types::{ChangeEntry, ChangeKind, ChangeOp, Contact, ContactId};
use std::str::FromStr;

fn snapshot(name: &str) -> Contact {
    Contact::new(name).with_id("c1")
}

// ── Coalescing ───────────────────────────────────────────────────

#[test]
fn coalesce_with_nothing_queued_keeps_incoming() {
    let op = ChangeOp::Update(snapshot("A"));
    assert_eq!(ChangeOp::coalesce(None, op.clone()), Some(op));
    assert_eq!(ChangeOp::coalesce(None, ChangeOp::Delete), Some(ChangeOp::Delete));
}

#[test]
fn update_after_create_stays_create_with_latest_snapshot() {
    let existing = ChangeOp::Create(snapshot("A"));
    let merged = ChangeOp::coalesce(Some(&existing), ChangeOp::Update(snapshot("B")));
    assert_eq!(merged, Some(ChangeOp::Create(snapshot("B"))));
}

#[test]
fn delete_after_create_cancels_entry() {
    let existing = ChangeOp::Create(snapshot("A"));
    assert_eq!(ChangeOp::coalesce(Some(&existing), ChangeOp::Delete), None);
}

#[test]
fn update_after_update_keeps_latest() {
    let existing = ChangeOp::Update(snapshot("A"));
    let merged = ChangeOp::coalesce(Some(&existing), ChangeOp::Update(snapshot("B")));
    assert_eq!(merged, Some(ChangeOp::Update(snapshot("B"))));
}

#[test]
fn delete_after_update_wins() {
    let existing = ChangeOp::Update(snapshot("A"));
    assert_eq!(
        ChangeOp::coalesce(Some(&existing), ChangeOp::Delete),
        Some(ChangeOp::Delete)
    );
}

#[test]
fn delete_is_never_overridden() {
    let existing = ChangeOp::Delete;
    assert_eq!(
        ChangeOp::coalesce(Some(&existing), ChangeOp::Update(snapshot("B"))),
        Some(ChangeOp::Delete)
    );
    assert_eq!(
        ChangeOp::coalesce(Some(&existing), ChangeOp::Create(snapshot("B"))),
        Some(ChangeOp::Delete)
    );
}

// ── Entries and tags ─────────────────────────────────────────────

#[test]
fn entry_constructors_key_by_contact_id() {
    let c = snapshot("A");
    assert_eq!(ChangeEntry::create(c.clone()).id, ContactId::new("c1"));
    assert_eq!(ChangeEntry::update(c).kind(), ChangeKind::Update);
    let del = ChangeEntry::delete(ContactId::new("x"));
    assert_eq!(del.kind(), ChangeKind::Delete);
    assert_eq!(del.revision, 0);
    assert!(del.op.snapshot().is_none());
}

#[test]
fn change_kind_roundtrips_through_str() {
    for kind in [ChangeKind::Create, ChangeKind::Update, ChangeKind::Delete] {
        assert_eq!(ChangeKind::from_str(kind.as_str()).unwrap(), kind);
    }
    assert!(ChangeKind::from_str("upsert").is_err());
}

#[test]
fn change_op_serializes_with_tag() {
    let json = serde_json::to_value(ChangeOp::Delete).unwrap();
    assert_eq!(json["op"], "Delete");
    let json = serde_json::to_value(ChangeOp::Create(snapshot("A"))).unwrap();
    assert_eq!(json["op"], "Create");
    assert_eq!(json["contact"]["name"], "A");
}
