#![no_std]

extern crate alloc;

/* sector-fs 的整体架构，自上而下 */

// 磁盘管理器层：格式化、路径解析，create/open/remove/list
mod fs;
pub use fs::{Error, FileSystem};

// 文件句柄层：绑定文件头扇区的临时读写句柄
mod open_file;
pub use open_file::OpenFile;

// 磁盘数据结构层：表示磁盘文件系统的数据结构
pub mod layout;

// 磁盘设备接口层：读写模拟磁盘的接口
pub use disk_dev::DiskDevice;

use derive_more::{Display, From, Into};

/// 扇区大小(字节)
pub const SECTOR_SIZE: usize = 128;
/// 模拟磁盘的扇区总数
pub const NUM_SECTORS: usize = 1024;

/// 空闲位图文件的文件头所在扇区
pub const FREE_MAP_SECTOR: SectorId = SectorId::new(0);
/// 根目录文件的文件头所在扇区
pub const ROOT_DIRECTORY_SECTOR: SectorId = SectorId::new(1);

/// 空闲位图文件的大小：每个扇区一位
pub const FREE_MAP_FILE_SIZE: usize = NUM_SECTORS / 8;
/// 单个目录的目录项数量，格式化时固定，不支持增长
pub const NUM_DIR_ENTRIES: usize = 16;
/// 目录文件的大小
pub const DIRECTORY_FILE_SIZE: usize = NUM_DIR_ENTRIES * layout::DirEntry::SIZE;
/// 同时存活的文件句柄上限
pub const MAX_OPEN_FILES: usize = 487;

/// 扇区编号
#[derive(
    Debug, Display, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into,
)]
#[repr(transparent)]
pub struct SectorId(u32);

impl SectorId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    /// 拉伸为磁盘驱动使用的下标
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}
