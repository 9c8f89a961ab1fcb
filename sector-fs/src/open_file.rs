//! # 文件句柄层
//!
//! [`OpenFile`] 是绑定到某个文件头扇区的临时句柄：
//! 文件头缓存在内存里，读写经由它换算到数据扇区。
//! 重复打开得到互相独立的句柄；销毁只释放内存状态，
//! 不会写盘。

use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};

use disk_dev::DiskDevice;

use crate::layout::FileHeader;
use crate::{SectorId, SECTOR_SIZE};

pub struct OpenFile {
    disk: Arc<dyn DiskDevice>,
    header: FileHeader,
    header_sector: SectorId,
    /// 顺序读写的游标
    pos: usize,
    /// 存活句柄计数的凭据，只有 `FileSystem::open` 发放
    live: Option<LiveToken>,
}

/// 随句柄销毁而递减计数
pub(crate) struct LiveToken(pub(crate) Arc<AtomicUsize>);

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl OpenFile {
    /// 读入文件头，建立句柄
    pub fn new(disk: Arc<dyn DiskDevice>, header_sector: SectorId) -> Self {
        let header = FileHeader::fetch_from(&disk, header_sector);
        Self {
            disk,
            header,
            header_sector,
            pos: 0,
            live: None,
        }
    }

    pub(crate) fn with_live(mut self, token: LiveToken) -> Self {
        self.live = Some(token);
        self
    }

    /// 文件字节长度，创建时固定
    #[inline]
    pub fn len(&self) -> usize {
        self.header.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.header.is_empty()
    }

    #[inline]
    pub fn header_sector(&self) -> SectorId {
        self.header_sector
    }

    /// 移动顺序读写的游标
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.len());
    }

    /// 从游标处顺序读
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let read = self.read_at(self.pos, buf);
        self.pos += read;
        read
    }

    /// 从游标处顺序写
    pub fn write(&mut self, buf: &[u8]) -> usize {
        let written = self.write_at(self.pos, buf);
        self.pos += written;
        written
    }

    /// 从指定偏移读出数据填充 buf，返回读到的字节数。
    /// 超出文件末尾的部分被截掉。
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        let mut start = offset;
        let end = (start + buf.len()).min(self.len());
        if start >= end {
            return 0;
        }

        let mut read_size = 0;
        let mut data = [0; SECTOR_SIZE];
        loop {
            // 游标所在扇区在文件内的序号
            let sector_index = start / SECTOR_SIZE;
            // 当前扇区的末地址(字节)
            let current_end = ((sector_index + 1) * SECTOR_SIZE).min(end);
            let chunk = current_end - start;

            self.disk
                .read_sector(self.header.sector_of(sector_index).as_usize(), &mut data);
            // 绝对地址 % 扇区大小 = 扇区内偏移
            let inoffset = start % SECTOR_SIZE;
            buf[read_size..read_size + chunk].copy_from_slice(&data[inoffset..inoffset + chunk]);

            read_size += chunk;
            if current_end == end {
                break;
            }
            start = current_end;
        }

        read_size
    }

    /// 把 buf 写入指定偏移，返回写入的字节数。
    /// 文件不会增长，超出末尾的部分被截掉。
    pub fn write_at(&self, offset: usize, buf: &[u8]) -> usize {
        let mut start = offset;
        let end = (start + buf.len()).min(self.len());
        if start >= end {
            return 0;
        }

        let mut written_size = 0;
        let mut data = [0; SECTOR_SIZE];
        loop {
            let sector_index = start / SECTOR_SIZE;
            let current_end = ((sector_index + 1) * SECTOR_SIZE).min(end);
            let chunk = current_end - start;
            let sector = self.header.sector_of(sector_index).as_usize();

            // 只覆盖一部分时得先把原扇区读进来
            if chunk != SECTOR_SIZE {
                self.disk.read_sector(sector, &mut data);
            }
            let inoffset = start % SECTOR_SIZE;
            data[inoffset..inoffset + chunk]
                .copy_from_slice(&buf[written_size..written_size + chunk]);
            self.disk.write_sector(sector, &data);

            written_size += chunk;
            if current_end == end {
                break;
            }
            start = current_end;
        }

        written_size
    }
}
