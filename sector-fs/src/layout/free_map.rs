use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Write as _;

use crate::open_file::OpenFile;
use crate::{SectorId, FREE_MAP_FILE_SIZE, NUM_SECTORS};

/// 空闲扇区位图，1表示已占用。
///
/// 位图本身作为普通文件持久化；一切修改停留在内存中，
/// 直到 [`FreeMap::write_back`] 整体写回备份文件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeMap {
    /// bit组，每组64个扇区
    groups: Vec<u64>,
}

impl FreeMap {
    /// 全空的位图，格式化时用
    pub fn new() -> Self {
        Self {
            groups: vec![0; NUM_SECTORS / 64],
        }
    }

    /// 从备份文件读出位图
    pub fn fetch_from(file: &OpenFile) -> Self {
        let mut buf = [0; FREE_MAP_FILE_SIZE];
        let read = file.read_at(0, &mut buf);
        assert_eq!(read, FREE_MAP_FILE_SIZE, "free map file truncated");

        let groups = buf
            .chunks_exact(8)
            .map(|chunk| u64::from_le_bytes(chunk.try_into().unwrap()))
            .collect();

        Self { groups }
    }

    /// 把位图整体写回备份文件
    pub fn write_back(&self, file: &OpenFile) {
        let mut buf = [0; FREE_MAP_FILE_SIZE];
        for (chunk, group) in buf.chunks_exact_mut(8).zip(&self.groups) {
            chunk.copy_from_slice(&group.to_le_bytes());
        }

        let written = file.write_at(0, &buf);
        assert_eq!(written, FREE_MAP_FILE_SIZE, "free map file truncated");
    }

    pub fn mark(&mut self, sector: SectorId) {
        let (group, bit) = Self::locate(sector);
        self.groups[group] |= 1 << bit;
    }

    pub fn clear(&mut self, sector: SectorId) {
        let (group, bit) = Self::locate(sector);
        // 编号一定得有对应的位
        assert_ne!(
            self.groups[group] & (1 << bit),
            0,
            "double freeing sector {sector}"
        );
        self.groups[group] &= !(1 << bit);
    }

    #[inline]
    pub fn test(&self, sector: SectorId) -> bool {
        let (group, bit) = Self::locate(sector);
        self.groups[group] & (1 << bit) != 0
    }

    /// 标记编号最小的空闲扇区并返回其编号，
    /// 位图满了则返回空。
    pub fn find_and_set(&mut self) -> Option<SectorId> {
        let (group_index, ingroup_index) =
            self.groups
                .iter()
                .enumerate()
                .find_map(|(group_index, &bits)| {
                    (bits != u64::MAX).then_some((group_index, bits.trailing_ones()))
                })?;

        self.groups[group_index] |= 1 << ingroup_index;
        Some(SectorId::new(group_index as u32 * 64 + ingroup_index))
    }

    /// 空闲扇区总数
    pub fn count_clear(&self) -> usize {
        self.groups.iter().map(|bits| bits.count_zeros() as usize).sum()
    }

    /// 诊断输出：列出已占用扇区的编号
    pub fn print(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        write!(out, "Free map: {} sectors clear, in use:", self.count_clear())?;
        for sector in (0..NUM_SECTORS as u32).map(SectorId::new) {
            if self.test(sector) {
                write!(out, " {sector}")?;
            }
        }
        writeln!(out)
    }

    #[inline]
    fn locate(sector: SectorId) -> (usize, usize) {
        let raw = sector.as_usize();
        assert!(raw < NUM_SECTORS);
        (raw / 64, raw % 64)
    }
}

impl Default for FreeMap {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
