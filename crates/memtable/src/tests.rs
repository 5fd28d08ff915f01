use super::*;

#[test]
fn shadowing_across_sequences() {
    let table = Memtable::new(ByteComparator);
    table.add(5, ValueType::Value, b"a", b"old");
    table.add(7, ValueType::Value, b"a", b"new");

    assert_eq!(table.get(&LookupKey::new(b"a", 10)), GetResult::Found(b"new".to_vec()));

    table.add(9, ValueType::Deletion, b"a", b"");
    assert_eq!(table.get(&LookupKey::new(b"a", 10)), GetResult::NotFound);
    assert_eq!(table.get(&LookupKey::new(b"a", 6)), GetResult::Found(b"old".to_vec()));
}

#[test]
fn get_on_missing_key_returns_missing() {
    let table = Memtable::new(ByteComparator);
    table.add(1, ValueType::Value, b"a", b"x");
    assert_eq!(table.get(&LookupKey::new(b"z", 100)), GetResult::Missing);
}

#[test]
fn get_before_any_write_is_visible_returns_missing() {
    let table = Memtable::new(ByteComparator);
    table.add(10, ValueType::Value, b"a", b"x");
    assert_eq!(table.get(&LookupKey::new(b"a", 5)), GetResult::Missing);
}

#[test]
fn iteration_orders_ascending_by_user_key_then_descending_by_sequence() {
    let table = Memtable::new(ByteComparator);
    table.add(1, ValueType::Value, b"b", b"b1");
    table.add(5, ValueType::Value, b"a", b"a-new");
    table.add(2, ValueType::Value, b"a", b"a-old");

    let keys: Vec<Vec<u8>> = table.iter().map(|(ikey, _)| ikey[..ikey.len() - 8].to_vec()).collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"a".to_vec(), b"b".to_vec()]);

    let values: Vec<Vec<u8>> = table.iter().map(|(_, v)| v.to_vec()).collect();
    assert_eq!(values, vec![b"a-new".to_vec(), b"a-old".to_vec(), b"b1".to_vec()]);
}

#[test]
fn approximate_memory_usage_tracks_the_arena() {
    let table = Memtable::new(ByteComparator);
    assert_eq!(table.approximate_memory_usage(), 0);
    table.add(1, ValueType::Value, b"k", b"v");
    assert!(table.approximate_memory_usage() > 0);
}

#[test]
fn len_and_is_empty() {
    let table = Memtable::new(ByteComparator);
    assert!(table.is_empty());
    table.add(1, ValueType::Value, b"k", b"v");
    table.add(2, ValueType::Deletion, b"k2", b"");
    assert_eq!(table.len(), 2);
    assert!(!table.is_empty());
}

#[test]
fn lookup_key_user_key_accessor() {
    let lk = LookupKey::new(b"hello", 42);
    assert_eq!(lk.user_key(), b"hello");
}

#[test]
fn entries_with_empty_user_key_are_handled() {
    let table = Memtable::new(ByteComparator);
    table.add(1, ValueType::Value, b"", b"root value");
    assert_eq!(
        table.get(&LookupKey::new(b"", 5)),
        GetResult::Found(b"root value".to_vec())
    );
}
