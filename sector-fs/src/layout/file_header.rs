//! 文件头
//! - 主头：记录文件字节长度与前一段数据扇区的索引
//! - 扩展头：文件超出单头的覆盖范围时链在主头之后，
//!   每个扩展头续接下一段数据扇区
//!
//! 每个头恰好占一个扇区。分配是全有或全无的：
//! 空间不足时位图不被触碰。

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Write as _;
use core::mem;
use core::ptr;
use core::slice;

use disk_dev::DiskDevice;

use crate::layout::FreeMap;
use crate::{SectorId, SECTOR_SIZE};

/// 单个头可记录的直接索引数
pub const NUM_DIRECT: usize = (SECTOR_SIZE - 3 * mem::size_of::<u32>()) / mem::size_of::<u32>();

/// 磁盘上的文件头
#[derive(Debug, Default, Clone)]
#[repr(C)]
struct RawHeader {
    /// 文件字节长度，扩展头中为0
    num_bytes: u32,
    /// 本头记录的数据扇区数
    num_sectors: u32,
    /// 下一个扩展头所在扇区，0表示没有
    // 扇区0属于位图文件头，永远不会是扩展头
    next: u32,
    direct: [u32; NUM_DIRECT],
}

const _: () = assert!(mem::size_of::<RawHeader>() == SECTOR_SIZE);

/// 内存中的文件头：主头与全部扩展头的合并视图
#[derive(Debug, Default, Clone)]
pub struct FileHeader {
    num_bytes: u32,
    /// 数据扇区，按文件内顺序
    sectors: Vec<SectorId>,
    /// 扩展头所在扇区，按链序
    extensions: Vec<SectorId>,
}

impl FileHeader {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 文件字节长度
    #[inline]
    pub fn len(&self) -> usize {
        self.num_bytes as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_bytes == 0
    }

    /// 文件内第 index 段数据所在的扇区
    #[inline]
    pub fn sector_of(&self, index: usize) -> SectorId {
        self.sectors[index]
    }

    /// 为 size 字节的文件数据在位图上占座，
    /// 返回全部头占用的字节数；空间不足返回空，位图不被修改。
    pub fn allocate(&mut self, free_map: &mut FreeMap, size: usize) -> Option<usize> {
        assert!(self.sectors.is_empty(), "header already allocated");

        let data_sectors = size.div_ceil(SECTOR_SIZE);
        let extension_headers = data_sectors.div_ceil(NUM_DIRECT).saturating_sub(1);

        // 全有或全无
        if free_map.count_clear() < data_sectors + extension_headers {
            return None;
        }

        self.num_bytes = size as u32;
        self.sectors = (0..data_sectors)
            .map(|_| free_map.find_and_set().unwrap())
            .collect();
        self.extensions = (0..extension_headers)
            .map(|_| free_map.find_and_set().unwrap())
            .collect();

        Some((1 + extension_headers) * SECTOR_SIZE)
    }

    /// 把数据扇区和扩展头扇区全部归还位图，
    /// 主头自己的扇区由调用者归还。
    pub fn deallocate(&mut self, disk: &Arc<dyn DiskDevice>, free_map: &mut FreeMap) {
        let zeroes = [0; SECTOR_SIZE];
        for &sector in &self.sectors {
            // 清掉旧内容，免得后来者读到
            disk.write_sector(sector.as_usize(), &zeroes);
            free_map.clear(sector);
        }
        for &sector in &self.extensions {
            free_map.clear(sector);
        }

        self.num_bytes = 0;
        self.sectors.clear();
        self.extensions.clear();
    }

    /// 从磁盘读入整条头链
    pub fn fetch_from(disk: &Arc<dyn DiskDevice>, sector: SectorId) -> Self {
        let mut raw = RawHeader::read(disk, sector);
        let num_bytes = raw.num_bytes;
        let mut sectors = Vec::new();
        let mut extensions = Vec::new();

        loop {
            let used = raw.num_sectors as usize;
            assert!(used <= NUM_DIRECT, "corrupted file header");
            sectors.extend(raw.direct[..used].iter().map(|&id| SectorId::new(id)));

            if raw.next == 0 {
                break;
            }
            let next = SectorId::new(raw.next);
            extensions.push(next);
            raw = RawHeader::read(disk, next);
        }

        Self {
            num_bytes,
            sectors,
            extensions,
        }
    }

    /// 把整条头链写回磁盘，主头落在 sector
    pub fn write_back(&self, disk: &Arc<dyn DiskDevice>, sector: SectorId) {
        let positions = core::iter::once(sector).chain(self.extensions.iter().copied());

        for (index, at) in positions.enumerate() {
            let chunk = self
                .sectors
                .get(index * NUM_DIRECT..)
                .map(|rest| &rest[..rest.len().min(NUM_DIRECT)])
                .unwrap_or(&[]);

            let mut raw = RawHeader {
                num_bytes: if index == 0 { self.num_bytes } else { 0 },
                num_sectors: chunk.len() as u32,
                next: self.extensions.get(index).map_or(0, |next| next.as_raw()),
                ..Default::default()
            };
            for (direct, data) in raw.direct.iter_mut().zip(chunk) {
                *direct = data.as_raw();
            }

            raw.write(disk, at);
        }
    }

    /// 诊断输出：长度与扇区清单
    pub fn print(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        write!(out, "File size: {} bytes. Data sectors:", self.num_bytes)?;
        for sector in &self.sectors {
            write!(out, " {sector}")?;
        }
        writeln!(out)?;

        if !self.extensions.is_empty() {
            write!(out, "Extension headers:")?;
            for sector in &self.extensions {
                write!(out, " {sector}")?;
            }
            writeln!(out)?;
        }

        Ok(())
    }
}

impl RawHeader {
    fn read(disk: &Arc<dyn DiskDevice>, sector: SectorId) -> Self {
        let mut raw = Self::default();
        disk.read_sector(sector.as_usize(), raw.as_bytes_mut());
        raw
    }

    fn write(&self, disk: &Arc<dyn DiskDevice>, sector: SectorId) {
        disk.write_sector(sector.as_usize(), self.as_bytes());
    }

    #[inline]
    fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(ptr::from_ref(self).cast(), SECTOR_SIZE) }
    }

    #[inline]
    fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(ptr::from_mut(self).cast(), SECTOR_SIZE) }
    }
}
