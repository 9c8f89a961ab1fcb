use std::sync::Arc;

use sector_fs::{Error, FileSystem, SECTOR_SIZE};

use crate::MemDisk;

fn fresh() -> (Arc<MemDisk>, FileSystem) {
    let disk = Arc::new(MemDisk::new());
    let fs = FileSystem::format(disk.clone());
    (disk, fs)
}

#[test]
fn format_create_list() {
    let (_disk, fs) = fresh();

    fs.create("/a", 0, true).unwrap();
    fs.create("/a/b", 200, false).unwrap();

    let mut out = String::new();
    fs.list(false, "/", &mut out).unwrap();
    assert_eq!("[D] a\n", out);

    out.clear();
    fs.list(false, "/a", &mut out).unwrap();
    assert_eq!("[F] b (200 bytes)\n", out);

    out.clear();
    fs.list(true, "/", &mut out).unwrap();
    assert_eq!("[D] a\n    [F] b (200 bytes)\n", out);
}

#[test]
fn create_failures() {
    let (_disk, fs) = fresh();

    fs.create("/a", 0, true).unwrap();
    assert_eq!(Err(Error::AlreadyExists), fs.create("/a", 0, false));

    assert_eq!(Err(Error::NotFound), fs.create("/missing/b", 0, false));
    assert_eq!(Err(Error::InvalidPath), fs.create("", 0, false));
    assert_eq!(Err(Error::InvalidPath), fs.create("/", 0, false));
    assert_eq!(Err(Error::InvalidPath), fs.create("/a/", 0, false));
    assert_eq!(Err(Error::InvalidPath), fs.create("a/b", 0, false));

    // 非末段必须是目录
    fs.create("/a/f", 10, false).unwrap();
    assert_eq!(Err(Error::NotADirectory), fs.create("/a/f/x", 0, false));
}

#[test]
fn read_back_written_bytes() {
    let (_disk, fs) = fresh();

    fs.create("/data", 300, false).unwrap();
    let mut file = fs.open("/data").unwrap();
    assert_eq!(300, file.len());

    let payload: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
    assert_eq!(300, file.write(&payload));

    // 句柄互相独立，各自有游标
    let mut other = fs.open("/data").unwrap();
    let mut read = vec![0; 300];
    assert_eq!(300, other.read(&mut read));
    assert_eq!(payload, read);

    // 游标可以拨回去重读
    file.seek(4);
    let mut four = [0; 4];
    assert_eq!(4, file.read(&mut four));
    assert_eq!([4, 5, 6, 7], four);

    // 文件不增长：越过末尾的读写都被截掉
    assert_eq!(0, other.read(&mut read));
    assert_eq!(0, file.write_at(300, &[1, 2, 3]));
    assert_eq!(4, file.write_at(296, &[9; 8]));
    let mut tail = [0; 8];
    assert_eq!(4, file.read_at(296, &mut tail));
    assert_eq!([9, 9, 9, 9, 0, 0, 0, 0], tail);
}

#[test]
fn reopened_file_system_round_trip() {
    let disk = Arc::new(MemDisk::new());
    let sizes = [1, 127, 128, 129, 1000, 5000];

    {
        let fs = FileSystem::format(disk.clone());
        fs.create("/nested", 0, true).unwrap();

        for (i, &size) in sizes.iter().enumerate() {
            let path = format!("/nested/f{i}");
            fs.create(&path, size, false).unwrap();

            let mut file = fs.open(&path).unwrap();
            let payload: Vec<u8> = (0..size).map(|b| (b * 31 + i) as u8).collect();
            assert_eq!(size, file.write(&payload));
        }
    }

    // 不格式化，重新挂上同一块磁盘
    let fs = FileSystem::open_existing(disk);
    for (i, &size) in sizes.iter().enumerate() {
        let mut file = fs.open(&format!("/nested/f{i}")).unwrap();
        assert_eq!(size, file.len());

        let mut read = vec![0; size];
        assert_eq!(size, file.read(&mut read));
        let expected: Vec<u8> = (0..size).map(|b| (b * 31 + i) as u8).collect();
        assert_eq!(expected, read);
    }
}

#[test]
fn recursive_remove_returns_every_sector() {
    let (_disk, fs) = fresh();
    let clean = fs.free_map();

    fs.create("/a", 0, true).unwrap();
    fs.create("/a/b", 200, false).unwrap();
    fs.create("/a/c", 0, true).unwrap();
    fs.create("/a/c/d", 4000, false).unwrap();

    fs.remove(true, "/a").unwrap();

    assert!(matches!(fs.open("/a/b"), Err(Error::NotFound)));
    assert!(matches!(fs.open("/a"), Err(Error::NotFound)));
    // 位图回到创建前的样子
    assert_eq!(clean, fs.free_map());
}

#[test]
fn remove_failures() {
    let (_disk, fs) = fresh();

    assert_eq!(Err(Error::NotFound), fs.remove(false, "/missing"));

    fs.create("/a", 0, true).unwrap();
    fs.create("/a/b", 10, false).unwrap();
    // 非空目录不许非递归删除
    assert_eq!(Err(Error::DirectoryNotEmpty), fs.remove(false, "/a"));

    fs.remove(false, "/a/b").unwrap();
    // 空了就可以
    fs.remove(false, "/a").unwrap();
    assert!(matches!(fs.open("/a"), Err(Error::NotFound)));
}

#[test]
fn failed_create_leaves_disk_untouched() {
    let (_disk, fs) = fresh();

    // 填到只剩几个扇区
    fs.create("/fill", 980 * SECTOR_SIZE, false).unwrap();
    let before = fs.free_map();
    assert!(before.count_clear() < 10);

    assert_eq!(Err(Error::NoSpace), fs.create("/big", 10 * SECTOR_SIZE, false));

    // 重新从磁盘读出的位图与失败前完全一致
    assert_eq!(before, fs.free_map());

    let mut out = String::new();
    fs.list(false, "/", &mut out).unwrap();
    assert_eq!("[F] fill (125440 bytes)\n", out);
}

#[test]
fn directory_capacity_boundary() {
    let (_disk, fs) = fresh();

    for i in 0..sector_fs::NUM_DIR_ENTRIES {
        fs.create(&format!("/f{i}"), 0, false).unwrap();
    }
    assert_eq!(Err(Error::NoSpace), fs.create("/one-more", 0, false));
}

#[test]
fn open_handle_cap() {
    let (_disk, fs) = fresh();
    fs.create("/f", 10, false).unwrap();

    let handles: Vec<_> = (0..sector_fs::MAX_OPEN_FILES)
        .map(|_| fs.open("/f").unwrap())
        .collect();
    assert!(matches!(fs.open("/f"), Err(Error::TooManyOpenFiles)));

    // 句柄销毁后名额回来
    drop(handles);
    assert!(fs.open("/f").is_ok());
}

#[test]
fn print_dumps_reserved_files() {
    let (_disk, fs) = fresh();
    fs.create("/a", 0, true).unwrap();

    let mut out = String::new();
    fs.print(&mut out).unwrap();

    assert!(out.contains("Free map file header:"));
    assert!(out.contains("Root directory file header:"));
    assert!(out.contains("Name a, Sector"));
}
