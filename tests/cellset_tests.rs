//! CellSet Tests
//!
//! Tests verify:
//! - Insert / duplicate / remove semantics
//! - Navigation bounds (at-or-above, above, below)
//! - Ordered iteration
//! - Concurrent insertion

use stratakv::{Cell, CellSet, CellType};

fn put(row: &str, ts: u64, mvcc: u64, value: &str) -> Cell {
    Cell::new(
        row.to_string(),
        "f",
        "q",
        ts,
        CellType::Put,
        value.to_string(),
    )
    .with_mvcc(mvcc)
}

// =============================================================================
// Membership Tests
// =============================================================================

#[test]
fn test_new_set_is_empty() {
    let set = CellSet::new();
    assert!(set.is_empty());
    assert_eq!(set.len(), 0);
    assert!(set.first().is_none());
    assert!(set.last().is_none());
}

#[test]
fn test_add_and_get() {
    let set = CellSet::new();
    let cell = put("r1", 1, 1, "v");

    assert!(set.add(cell.clone()));
    assert!(set.contains(&cell));
    assert_eq!(set.get(&cell), Some(cell));
    assert_eq!(set.len(), 1);
}

#[test]
fn test_duplicate_add_is_noop_and_keeps_stored_cell() {
    let set = CellSet::new();
    let original = put("r1", 1, 1, "original");
    let duplicate = put("r1", 1, 1, "different_payload");

    assert!(set.add(original.clone()));
    assert!(!set.add(duplicate));
    assert_eq!(set.len(), 1);

    // The stored element keeps the first payload.
    let stored = set.get(&original).unwrap();
    assert_eq!(stored.value().as_ref(), b"original");
}

#[test]
fn test_cell_differing_only_in_mvcc_is_distinct() {
    let set = CellSet::new();
    assert!(set.add(put("r1", 1, 1, "a")));
    assert!(set.add(put("r1", 1, 2, "b")));
    assert_eq!(set.len(), 2);
}

#[test]
fn test_remove() {
    let set = CellSet::new();
    let cell = put("r1", 1, 1, "v");

    set.add(cell.clone());
    assert!(set.remove(&cell));
    assert!(!set.remove(&cell)); // second remove is a no-op
    assert!(set.is_empty());
}

// =============================================================================
// Navigation Tests
// =============================================================================

#[test]
fn test_first_and_last() {
    let set = CellSet::new();
    set.add(put("m", 1, 1, "v"));
    set.add(put("a", 1, 1, "v"));
    set.add(put("z", 1, 1, "v"));

    assert_eq!(set.first().unwrap().row().as_ref(), b"a");
    assert_eq!(set.last().unwrap().row().as_ref(), b"z");
}

#[test]
fn test_first_at_or_above_is_inclusive() {
    let set = CellSet::new();
    let cell = put("m", 1, 1, "v");
    set.add(cell.clone());

    assert_eq!(set.first_at_or_above(&cell), Some(cell.clone()));
    assert_eq!(set.first_above(&cell), None);
}

#[test]
fn test_navigation_with_sentinels() {
    let set = CellSet::new();
    set.add(put("a", 1, 1, "v"));
    set.add(put("m", 1, 1, "v"));
    set.add(put("z", 1, 1, "v"));

    // The first-on-row sentinel lands before every real cell of its row.
    let sentinel = Cell::first_on_row("m".to_string());
    assert_eq!(
        set.first_at_or_above(&sentinel).unwrap().row().as_ref(),
        b"m"
    );
    assert_eq!(set.last_below(&sentinel).unwrap().row().as_ref(), b"a");
}

#[test]
fn test_last_below_is_exclusive() {
    let set = CellSet::new();
    let cell = put("m", 1, 1, "v");
    set.add(cell.clone());

    assert_eq!(set.last_below(&cell), None);
    assert_eq!(set.last_below(&put("n", 1, 1, "v")), Some(cell));
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[test]
fn test_iter_is_ordered() {
    let set = CellSet::new();
    set.add(put("cherry", 1, 1, "3"));
    set.add(put("apple", 1, 1, "1"));
    set.add(put("banana", 1, 1, "2"));

    let rows: Vec<_> = set.iter().map(|c| c.row().clone()).collect();
    assert_eq!(rows, vec!["apple", "banana", "cherry"]);
}

#[test]
fn test_iter_orders_versions_newest_first() {
    let set = CellSet::new();
    set.add(put("r", 10, 1, "old"));
    set.add(put("r", 30, 3, "newest"));
    set.add(put("r", 20, 2, "mid"));

    let timestamps: Vec<_> = set.iter().map(|c| c.timestamp()).collect();
    assert_eq!(timestamps, vec![30, 20, 10]);
}

#[test]
fn test_remove_during_walk() {
    let set = CellSet::new();
    for i in 0..10 {
        set.add(put(&format!("row{i}"), 1, 1, "v"));
    }

    // Walk down from the top, removing as we go.
    let bound = Cell::first_on_row("row9~".to_string());
    let mut cursor = set.last_below(&bound);
    while let Some(cell) = cursor {
        set.remove(&cell);
        cursor = set.last_below(&cell);
    }
    assert!(set.is_empty());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_adds() {
    use std::sync::Arc;
    use std::thread;

    let set = Arc::new(CellSet::new());
    let mut handles = vec![];

    for t in 0..8 {
        let set = Arc::clone(&set);
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                set.add(put(&format!("row{t}_{i}"), 1, (t * 100 + i) as u64, "v"));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(set.len(), 800);

    // Verify global ordering survived concurrent insertion.
    let cells: Vec<_> = set.iter().collect();
    for pair in cells.windows(2) {
        assert!(pair[0] < pair[1]);
    }
}

#[test]
fn test_reads_proceed_during_writes() {
    use std::sync::Arc;
    use std::thread;

    let set = Arc::new(CellSet::new());
    set.add(put("anchor", 1, 1, "v"));

    let writer_set = Arc::clone(&set);
    let writer = thread::spawn(move || {
        for i in 0..500 {
            writer_set.add(put(&format!("w{i:04}"), 1, 1, "v"));
        }
    });

    // Readers walk while the writer inserts; every walk must stay ordered.
    for _ in 0..50 {
        let cells: Vec<_> = set.iter().collect();
        for pair in cells.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
    writer.join().unwrap();
}
