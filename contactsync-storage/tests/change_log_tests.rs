use contactsync_storage::{LocalStore, StorageError};
use contactsync_types::{ChangeEntry, ChangeKind, ChangeOp, Contact, ContactId};
use pretty_assertions::assert_eq;

fn snapshot(id: &str, name: &str) -> Contact {
    Contact::new(name).with_id(id)
}

fn kinds(entries: &[ChangeEntry]) -> Vec<(String, ChangeKind)> {
    entries.iter().map(|e| (e.id.to_string(), e.kind())).collect()
}

#[test]
fn append_and_list_in_insertion_order() {
    let log = LocalStore::open_in_memory().unwrap().changes();
    log.append(ChangeEntry::update(snapshot("b", "B"))).unwrap();
    log.append(ChangeEntry::create(snapshot("a", "A"))).unwrap();
    log.append(ChangeEntry::delete(ContactId::new("c"))).unwrap();

    let entries = log.list_all().unwrap();
    assert_eq!(
        kinds(&entries),
        vec![
            ("b".to_string(), ChangeKind::Update),
            ("a".to_string(), ChangeKind::Create),
            ("c".to_string(), ChangeKind::Delete),
        ]
    );
}

#[test]
fn append_keeps_snapshot() {
    let log = LocalStore::open_in_memory().unwrap().changes();
    let ada = snapshot("t1", "Ada").with_image(vec![7, 7, 7], "image/png");
    let stored = log.append(ChangeEntry::create(ada.clone())).unwrap().unwrap();

    let loaded = log.get(&ContactId::new("t1")).unwrap().unwrap();
    assert_eq!(loaded.op, ChangeOp::Create(ada));
    assert_eq!(loaded.revision, stored.revision);
}

#[test]
fn repeated_updates_coalesce_to_latest() {
    let log = LocalStore::open_in_memory().unwrap().changes();
    let first = log
        .append(ChangeEntry::update(snapshot("b", "first")))
        .unwrap()
        .unwrap();
    log.append(ChangeEntry::update(snapshot("b", "second"))).unwrap();
    let stored = log
        .append(ChangeEntry::update(snapshot("b", "third")))
        .unwrap()
        .unwrap();

    assert!(stored.revision > first.revision);
    let entries = log.list_all().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].op, ChangeOp::Update(snapshot("b", "third")));
}

#[test]
fn coalescing_keeps_queue_position() {
    let log = LocalStore::open_in_memory().unwrap().changes();
    log.append(ChangeEntry::create(snapshot("first", "1"))).unwrap();
    log.append(ChangeEntry::create(snapshot("second", "2"))).unwrap();
    log.append(ChangeEntry::update(snapshot("first", "1b"))).unwrap();

    let entries = log.list_all().unwrap();
    assert_eq!(entries[0].id, ContactId::new("first"));
    assert_eq!(entries[0].op, ChangeOp::Create(snapshot("first", "1b")));
    assert_eq!(entries[1].id, ContactId::new("second"));
}

#[test]
fn delete_cancels_queued_create() {
    let log = LocalStore::open_in_memory().unwrap().changes();
    log.append(ChangeEntry::create(snapshot("t1", "Temp"))).unwrap();
    let stored = log.append(ChangeEntry::delete(ContactId::new("t1"))).unwrap();

    assert!(stored.is_none());
    assert!(log.is_empty().unwrap());
}

#[test]
fn delete_supersedes_queued_update() {
    let log = LocalStore::open_in_memory().unwrap().changes();
    log.append(ChangeEntry::update(snapshot("b2", "Bob"))).unwrap();
    log.append(ChangeEntry::delete(ContactId::new("b2"))).unwrap();

    let entry = log.get(&ContactId::new("b2")).unwrap().unwrap();
    assert_eq!(entry.op, ChangeOp::Delete);
    assert_eq!(log.len().unwrap(), 1);
}

#[test]
fn remove_is_idempotent() {
    let log = LocalStore::open_in_memory().unwrap().changes();
    log.append(ChangeEntry::delete(ContactId::new("x"))).unwrap();
    assert!(log.remove(&ContactId::new("x")).unwrap());
    assert!(!log.remove(&ContactId::new("x")).unwrap());
}

#[test]
fn requeued_identifier_gets_a_new_revision() {
    let log = LocalStore::open_in_memory().unwrap().changes();
    let first = log
        .append(ChangeEntry::create(snapshot("t1", "Ada")))
        .unwrap()
        .unwrap();
    log.append(ChangeEntry::delete(ContactId::new("t1"))).unwrap();
    assert!(log.is_empty().unwrap());

    let again = log
        .append(ChangeEntry::create(snapshot("t1", "Ada v2")))
        .unwrap()
        .unwrap();
    assert_ne!(again.revision, first.revision);

    log.remove(&ContactId::new("t1")).unwrap();
    log.clear().unwrap();
    let after_clear = log
        .append(ChangeEntry::update(snapshot("t1", "Ada v3")))
        .unwrap()
        .unwrap();
    assert!(after_clear.revision > again.revision);
}

#[test]
fn revisions_are_distinct_across_identifiers() {
    let log = LocalStore::open_in_memory().unwrap().changes();
    let a = log.append(ChangeEntry::update(snapshot("a", "A"))).unwrap().unwrap();
    let b = log.append(ChangeEntry::update(snapshot("b", "B"))).unwrap().unwrap();
    assert_ne!(a.revision, b.revision);
}

#[test]
fn clear_drops_everything() {
    let log = LocalStore::open_in_memory().unwrap().changes();
    for i in 0..5 {
        log.append(ChangeEntry::delete(ContactId::new(format!("id{i}")))).unwrap();
    }
    assert_eq!(log.clear().unwrap(), 5);
    assert!(log.list_all().unwrap().is_empty());
}

#[test]
fn entries_for_unrelated_ids_are_independent() {
    let log = LocalStore::open_in_memory().unwrap().changes();
    log.append(ChangeEntry::update(snapshot("a", "A"))).unwrap();
    log.append(ChangeEntry::update(snapshot("b", "B"))).unwrap();
    log.remove(&ContactId::new("a")).unwrap();
    log.append(ChangeEntry::update(snapshot("c", "C"))).unwrap();

    let ids: Vec<String> = log.list_all().unwrap().iter().map(|e| e.id.to_string()).collect();
    assert_eq!(ids, vec!["b", "c"]);
}

#[test]
fn append_without_id_is_rejected() {
    let log = LocalStore::open_in_memory().unwrap().changes();
    let err = log.append(ChangeEntry::update(Contact::new("anon"))).unwrap_err();
    assert!(matches!(err, StorageError::InvalidData(_)));
}
