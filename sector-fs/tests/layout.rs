use std::mem;

use sector_fs::layout::{DirEntry, Directory, FreeMap};
use sector_fs::{SectorId, NUM_DIR_ENTRIES, NUM_SECTORS};

#[test]
fn dir_entry_size() {
    assert_eq!(DirEntry::SIZE, mem::size_of::<DirEntry>());
    assert_eq!(32, mem::size_of::<DirEntry>());
}

#[test]
fn free_map_allocates_lowest_first() {
    let mut map = FreeMap::new();

    assert_eq!(Some(SectorId::new(0)), map.find_and_set());
    assert_eq!(Some(SectorId::new(1)), map.find_and_set());
    assert_eq!(Some(SectorId::new(2)), map.find_and_set());

    map.clear(SectorId::new(1));
    assert_eq!(Some(SectorId::new(1)), map.find_and_set());
}

#[test]
fn free_map_exhaustion() {
    let mut map = FreeMap::new();
    for _ in 0..NUM_SECTORS {
        assert!(map.find_and_set().is_some());
    }

    assert_eq!(None, map.find_and_set());
    assert_eq!(0, map.count_clear());
}

#[test]
#[should_panic]
fn free_map_rejects_double_free() {
    let mut map = FreeMap::new();
    map.mark(SectorId::new(3));
    map.clear(SectorId::new(3));
    map.clear(SectorId::new(3));
}

#[test]
fn directory_names_are_unique() {
    let mut dir = Directory::new();

    assert!(dir.add("a", SectorId::new(2), false));
    assert!(!dir.add("a", SectorId::new(3), true));
    assert_eq!(Some(SectorId::new(2)), dir.find("a"));

    assert!(dir.remove("a"));
    assert!(!dir.remove("a"));
    assert_eq!(None, dir.find("a"));
}

#[test]
fn directory_table_is_fixed_capacity() {
    let mut dir = Directory::new();
    for i in 0..NUM_DIR_ENTRIES {
        assert!(dir.add(&format!("f{i}"), SectorId::new(i as u32 + 2), false));
    }

    assert!(!dir.add("overflow", SectorId::new(99), false));

    // 注销后空槽可以复用
    assert!(dir.remove("f7"));
    assert!(dir.add("again", SectorId::new(99), false));
}

#[test]
fn directory_rejects_oversized_name() {
    let mut dir = Directory::new();
    assert!(!dir.add(&"x".repeat(24), SectorId::new(2), false));
    assert!(dir.add(&"x".repeat(23), SectorId::new(2), false));
}
