#[cfg(test)]
mod tests;

use std::fs::File;
use std::os::unix::fs::FileExt;
use std::sync::Mutex;

use disk_dev::DiskDevice;
use sector_fs::{NUM_SECTORS, SECTOR_SIZE};

/// 以宿主机文件为后端的模拟磁盘。
/// 定位读写不动游标，所以不需要锁。
pub struct DiskFile(File);

impl DiskFile {
    pub fn new(file: File) -> Self {
        Self(file)
    }

    fn offset(sector: usize) -> u64 {
        assert!(sector < NUM_SECTORS);
        (sector * SECTOR_SIZE) as u64
    }
}

impl DiskDevice for DiskFile {
    fn read_sector(&self, sector: usize, buf: &mut [u8]) {
        assert_eq!(buf.len(), SECTOR_SIZE);
        self.0
            .read_exact_at(buf, Self::offset(sector))
            .expect("disk image read failed");
    }

    fn write_sector(&self, sector: usize, buf: &[u8]) {
        assert_eq!(buf.len(), SECTOR_SIZE);
        self.0
            .write_all_at(buf, Self::offset(sector))
            .expect("disk image write failed");
    }
}

/// 以内存为后端的模拟磁盘，测试用
pub struct MemDisk(Mutex<Vec<u8>>);

impl MemDisk {
    pub fn new() -> Self {
        Self(Mutex::new(vec![0; NUM_SECTORS * SECTOR_SIZE]))
    }
}

impl Default for MemDisk {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskDevice for MemDisk {
    fn read_sector(&self, sector: usize, buf: &mut [u8]) {
        let data = self.0.lock().unwrap();
        buf.copy_from_slice(&data[sector * SECTOR_SIZE..][..SECTOR_SIZE]);
    }

    fn write_sector(&self, sector: usize, buf: &[u8]) {
        let mut data = self.0.lock().unwrap();
        data[sector * SECTOR_SIZE..][..SECTOR_SIZE].copy_from_slice(buf);
    }
}
