use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Write as _;
use core::ptr;
use core::slice;

use disk_dev::DiskDevice;

use crate::layout::FileHeader;
use crate::open_file::OpenFile;
use crate::{SectorId, NUM_DIR_ENTRIES};

/// 目录项名字的长度上限
pub const NAME_MAX_LEN: usize = 23;

/// 目录项：名字、文件头扇区与类型标记
#[derive(Debug, Default, Clone)]
#[repr(C)]
pub struct DirEntry {
    // 最后一字节留给 \0
    name: [u8; NAME_MAX_LEN + 1],
    sector: SectorId,
    in_use: u8,
    is_dir: u8,
    _pad: [u8; 2],
}

impl DirEntry {
    /// 目录项大小恒为32字节
    pub const SIZE: usize = 32;

    pub fn new(name: &str, sector: SectorId, is_dir: bool) -> Self {
        let bytes = name.as_bytes();
        assert!(bytes.len() <= NAME_MAX_LEN);
        let mut name = [0; NAME_MAX_LEN + 1];
        name[..bytes.len()].copy_from_slice(bytes);

        Self {
            name,
            sector,
            in_use: 1,
            is_dir: is_dir as u8,
            _pad: [0; 2],
        }
    }

    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&c| c == 0).unwrap();
        core::str::from_utf8(&self.name[..len]).unwrap()
    }

    #[inline]
    pub fn sector(&self) -> SectorId {
        self.sector
    }

    #[inline]
    pub fn in_use(&self) -> bool {
        self.in_use != 0
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.is_dir != 0
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(ptr::from_ref(self).cast(), Self::SIZE) }
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(ptr::from_mut(self).cast(), Self::SIZE) }
    }
}

/// 定容目录表。在用目录项的名字互不相同。
#[derive(Debug, Clone)]
pub struct Directory {
    table: Vec<DirEntry>,
}

impl Directory {
    /// 空目录表
    pub fn new() -> Self {
        Self {
            table: vec![DirEntry::default(); NUM_DIR_ENTRIES],
        }
    }

    /// 从目录文件读出整张表
    pub fn fetch_from(file: &OpenFile) -> Self {
        let mut directory = Self::new();
        for (index, entry) in directory.table.iter_mut().enumerate() {
            let read = file.read_at(index * DirEntry::SIZE, entry.as_bytes_mut());
            assert_eq!(read, DirEntry::SIZE, "directory file truncated");
        }
        directory
    }

    /// 把整张表写回目录文件
    pub fn write_back(&self, file: &OpenFile) {
        for (index, entry) in self.table.iter().enumerate() {
            let written = file.write_at(index * DirEntry::SIZE, entry.as_bytes());
            assert_eq!(written, DirEntry::SIZE, "directory file truncated");
        }
    }

    /// 按名字找到文件头扇区
    pub fn find(&self, name: &str) -> Option<SectorId> {
        self.entry(name).map(DirEntry::sector)
    }

    /// 登记一个新项。重名、表满或名字过长时失败，表不被修改。
    pub fn add(&mut self, name: &str, sector: SectorId, is_dir: bool) -> bool {
        if name.len() > NAME_MAX_LEN || self.entry(name).is_some() {
            return false;
        }

        let Some(slot) = self.table.iter_mut().find(|entry| !entry.in_use()) else {
            return false;
        };
        *slot = DirEntry::new(name, sector, is_dir);
        true
    }

    /// 注销名下的项
    pub fn remove(&mut self, name: &str) -> bool {
        let Some(entry) = self.table.iter_mut().find(|entry| entry.in_use() && entry.name() == name)
        else {
            return false;
        };
        *entry = DirEntry::default();
        true
    }

    pub fn is_dir(&self, name: &str) -> bool {
        self.entry(name).is_some_and(DirEntry::is_dir)
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    /// 在用的目录项
    pub fn entries(&self) -> impl Iterator<Item = &DirEntry> {
        self.table.iter().filter(|entry| entry.in_use())
    }

    /// 打印目录内容，子目录按需递归
    pub fn list(
        &self,
        disk: &Arc<dyn DiskDevice>,
        recursive: bool,
        depth: usize,
        out: &mut dyn fmt::Write,
    ) -> fmt::Result {
        let indent = depth * 4;
        for entry in self.entries() {
            if entry.is_dir() {
                writeln!(out, "{:indent$}[D] {}", "", entry.name())?;
                if recursive {
                    let file = OpenFile::new(disk.clone(), entry.sector());
                    Self::fetch_from(&file).list(disk, true, depth + 1, out)?;
                }
            } else {
                let size = FileHeader::fetch_from(disk, entry.sector()).len();
                writeln!(out, "{:indent$}[F] {} ({size} bytes)", "", entry.name())?;
            }
        }
        Ok(())
    }

    /// 诊断输出：每个在用项一行
    pub fn print(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "Directory contents:")?;
        for entry in self.entries() {
            writeln!(
                out,
                "Name {}, Sector {}{}",
                entry.name(),
                entry.sector(),
                if entry.is_dir() { ", Directory" } else { "" }
            )?;
        }
        Ok(())
    }

    fn entry(&self, name: &str) -> Option<&DirEntry> {
        self.table
            .iter()
            .find(|entry| entry.in_use() && entry.name() == name)
    }
}

impl Default for Directory {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
