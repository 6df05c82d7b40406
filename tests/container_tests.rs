/// Container tests
///
/// Primary, backup and capacity behavior of a single container.
/// Run with: cargo test --test container_tests
use partstore::{CollectionConfig, Container, Data, Item, StorageKind};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

fn container(max_size: usize) -> Container {
    Container::new(0, Arc::new(CollectionConfig::new("items").with_max_size(max_size)))
}

fn values(names: &[&str]) -> Vec<Data> {
    names.iter().map(|name| Data::from(*name)).collect()
}

#[test]
fn test_ids_are_unique_and_increasing() {
    let mut c = container(usize::MAX);
    let mut last = 0;
    for i in 0..100 {
        let id = c.add(Data::from(format!("v{}", i % 7))).unwrap();
        assert!(id > last);
        last = id;
    }
    assert_eq!(c.watermark(), last);
    assert_eq!(c.size(), 100);
}

#[test]
fn test_capacity_walkthrough() {
    let mut c = container(2);
    assert_eq!(c.add(Data::from("a")), Some(1));
    assert_eq!(c.add(Data::from("b")), Some(2));
    assert!(!c.has_enough_capacity(1));
    assert_eq!(c.remove(&Data::from("a")), Some(Item::new(1, Data::from("a"))));
    assert!(c.has_enough_capacity(1));
}

#[test]
fn test_capacity_boundary() {
    let mut c = container(10);
    c.add_all(values(&["a", "b", "c", "d"]));
    let room = 10 - c.size();
    assert!(c.has_enough_capacity(room));
    assert!(!c.has_enough_capacity(room + 1));
}

#[test]
fn test_remove_uses_value_equality_first_match() {
    let mut c = container(usize::MAX);
    c.add_all(values(&["dup", "x", "dup"]));
    let removed = c.remove(&Data::new(b"dup".to_vec())).unwrap();
    assert_eq!(removed.id, 1);
    assert_eq!(c.get_all(), values(&["x", "dup"]));
    assert_eq!(c.remove(&Data::from("missing")), None);
}

#[test]
fn test_add_all_returns_assigned_ids() {
    let mut c = container(usize::MAX);
    c.add(Data::from("first"));
    let added = c.add_all(values(&["a", "b"]));
    assert_eq!(
        added,
        BTreeMap::from([(2, Data::from("a")), (3, Data::from("b"))])
    );
}

#[test]
fn test_clear_returns_everything_removed() {
    let mut c = container(usize::MAX);
    c.add_all(values(&["a", "b"]));
    let removed = c.clear();
    assert_eq!(removed.len(), 2);
    assert!(c.is_empty());
    // ids are never reused
    assert_eq!(c.add(Data::from("c")), Some(3));
}

#[test]
fn test_get_all_is_a_snapshot() {
    let mut c = container(usize::MAX);
    c.add(Data::from("a"));
    let snapshot = c.get_all();
    c.add(Data::from("b"));
    assert_eq!(snapshot, values(&["a"]));
}

#[test]
fn test_primary_results_replay_on_backup() {
    let mut primary = container(usize::MAX);
    let mut backup = container(usize::MAX);

    let id = primary.add(Data::from("a")).unwrap();
    backup.add_backup(id, Data::from("a"));

    let added = primary.add_all(values(&["b", "c", "d"]));
    backup.add_all_backup(&added);

    let keep: HashSet<Data> = values(&["b", "d"]).into_iter().collect();
    let removed = primary.compare_and_remove(true, &keep);
    let removed_ids: HashSet<u64> = removed.keys().copied().collect();
    backup.clear_backup(&removed_ids);

    let item = primary.remove(&Data::from("b")).unwrap();
    backup.remove_backup(item.id);

    assert_eq!(primary.get_all(), backup.get_all());
    assert_eq!(primary.watermark(), backup.watermark());

    // Promotion: the backup continues the id sequence without collisions.
    assert_eq!(backup.add(Data::from("e")), Some(primary.watermark() + 1));
}

#[test]
fn test_backup_redelivery_is_harmless() {
    let mut backup = container(usize::MAX);
    let batch = BTreeMap::from([(4, Data::from("a")), (5, Data::from("b"))]);
    backup.add_all_backup(&batch);
    backup.add_all_backup(&batch);
    assert_eq!(backup.size(), 2);

    let ids: HashSet<u64> = batch.keys().copied().collect();
    backup.clear_backup(&ids);
    backup.clear_backup(&ids);
    assert!(backup.is_empty());
    assert_eq!(backup.watermark(), 5);
}

#[test]
fn test_set_storage_rejects_duplicates() {
    let config = CollectionConfig::new("tags").with_storage(StorageKind::Set);
    let mut c = Container::new(0, Arc::new(config));
    assert!(c.add(Data::from("rust")).is_some());
    assert!(c.add(Data::from("rust")).is_none());
    assert_eq!(c.size(), 1);
}

#[test]
fn test_queue_storage_is_fifo() {
    let config = CollectionConfig::new("jobs").with_storage(StorageKind::Queue);
    let mut c = Container::new(0, Arc::new(config));
    c.add_all(values(&["one", "two", "three"]));
    let drained: Vec<Data> = std::iter::from_fn(|| c.poll().map(|item| item.value)).collect();
    assert_eq!(drained, values(&["one", "two", "three"]));
}
