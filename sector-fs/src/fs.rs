//! # 磁盘管理器层
//!
//! 构建磁盘的整体布局并实现文件操作：
//! 扇区0放空闲位图文件的头，扇区1放根目录文件的头，
//! 这两个文件在文件系统的整个生命期内保持打开。
//!
//! 修改位图或目录的操作先在内存里进行，全部成功后才写回磁盘；
//! 半路失败则直接丢弃内存中的版本，磁盘保持原样。

use alloc::format;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Write as _;
use core::ops::Deref;
use core::sync::atomic::{AtomicUsize, Ordering};

use disk_dev::DiskDevice;

use crate::layout::{Directory, FileHeader, FreeMap, NAME_MAX_LEN};
use crate::open_file::{LiveToken, OpenFile};
use crate::{
    DIRECTORY_FILE_SIZE, FREE_MAP_FILE_SIZE, FREE_MAP_SECTOR, MAX_OPEN_FILES,
    ROOT_DIRECTORY_SECTOR,
};

/// 文件操作的失败原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    NotFound,
    AlreadyExists,
    NoSpace,
    TooManyOpenFiles,
    InvalidPath,
    NotADirectory,
    DirectoryNotEmpty,
}

pub struct FileSystem {
    disk: Arc<dyn DiskDevice>,
    /// 空闲位图文件，常驻打开
    free_map_file: OpenFile,
    /// 根目录文件，常驻打开
    directory_file: OpenFile,
    /// 存活句柄计数
    live_handles: Arc<AtomicUsize>,
}

/// 路径解析持有的目录句柄。
///
/// 根目录句柄从文件系统借用，中途打开的目录句柄归遍历所有，
/// 无论从哪条路径退出都会随之释放。
enum DirHandle<'fs> {
    Root(&'fs OpenFile),
    Sub(OpenFile),
}

impl Deref for DirHandle<'_> {
    type Target = OpenFile;

    fn deref(&self) -> &OpenFile {
        match self {
            Self::Root(file) => file,
            Self::Sub(file) => file,
        }
    }
}

impl FileSystem {
    /// 格式化磁盘并建立文件系统
    pub fn format(disk: Arc<dyn DiskDevice>) -> Self {
        log::debug!("formatting the file system");

        let mut free_map = FreeMap::new();
        let directory = Directory::new();
        let mut map_header = FileHeader::new();
        let mut dir_header = FileHeader::new();

        // 先给两个文件头本身占座
        free_map.mark(FREE_MAP_SECTOR);
        free_map.mark(ROOT_DIRECTORY_SECTOR);

        // 再为两个文件的数据扇区占座，空间必然足够
        map_header
            .allocate(&mut free_map, FREE_MAP_FILE_SIZE)
            .expect("free map does not fit");
        dir_header
            .allocate(&mut free_map, DIRECTORY_FILE_SIZE)
            .expect("root directory does not fit");

        // 文件头得先落盘，此刻打开这两个文件才能读到真实的头
        map_header.write_back(&disk, FREE_MAP_SECTOR);
        dir_header.write_back(&disk, ROOT_DIRECTORY_SECTOR);

        let free_map_file = OpenFile::new(disk.clone(), FREE_MAP_SECTOR);
        let directory_file = OpenFile::new(disk.clone(), ROOT_DIRECTORY_SECTOR);

        // 初始位图与空根目录落盘
        free_map.write_back(&free_map_file);
        directory.write_back(&directory_file);

        Self {
            disk,
            free_map_file,
            directory_file,
            live_handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 磁盘上已有文件系统时，打开两份常驻文件即可
    pub fn open_existing(disk: Arc<dyn DiskDevice>) -> Self {
        log::debug!("initializing the file system");

        let free_map_file = OpenFile::new(disk.clone(), FREE_MAP_SECTOR);
        let directory_file = OpenFile::new(disk.clone(), ROOT_DIRECTORY_SECTOR);

        Self {
            disk,
            free_map_file,
            directory_file,
            live_handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 在路径处创建文件或目录。文件大小在创建时固定；
    /// 目录的大小是统一规格，忽略传入值。
    pub fn create(&self, path: &str, initial_size: usize, is_dir: bool) -> Result<(), Error> {
        let initial_size = if is_dir { DIRECTORY_FILE_SIZE } else { initial_size };
        log::debug!("creating {path:?} size {initial_size}");

        let (parent, name) = self.resolve_parent(path)?;
        let mut directory = Directory::fetch_from(&parent);

        if directory.find(name).is_some() {
            return Err(Error::AlreadyExists);
        }

        let mut free_map = FreeMap::fetch_from(&self.free_map_file);
        // 给新文件头找扇区
        let sector = free_map.find_and_set().ok_or(Error::NoSpace)?;
        // 在父目录登记
        if !directory.add(name, sector, is_dir) {
            return Err(Error::NoSpace);
        }

        let mut header = FileHeader::new();
        header
            .allocate(&mut free_map, initial_size)
            .ok_or(Error::NoSpace)?;

        // 全部成功，按 文件头、父目录、位图 的顺序落盘
        header.write_back(&self.disk, sector);
        directory.write_back(&parent);
        free_map.write_back(&self.free_map_file);

        // 新目录的表也得是干净的
        if is_dir {
            let file = OpenFile::new(self.disk.clone(), sector);
            Directory::new().write_back(&file);
        }

        Ok(())
    }

    /// 打开路径处的文件，句柄之间互相独立
    pub fn open(&self, path: &str) -> Result<OpenFile, Error> {
        log::debug!("opening {path:?}");

        let (parent, name) = self.resolve_parent(path)?;
        let directory = Directory::fetch_from(&parent);
        let sector = directory.find(name).ok_or(Error::NotFound)?;

        // 句柄数量的软上限
        if self.live_handles.load(Ordering::Relaxed) >= MAX_OPEN_FILES {
            return Err(Error::TooManyOpenFiles);
        }

        self.live_handles.fetch_add(1, Ordering::Relaxed);
        let token = LiveToken(self.live_handles.clone());
        Ok(OpenFile::new(self.disk.clone(), sector).with_live(token))
    }

    /// 删除路径处的文件或目录，归还文件头与数据扇区。
    /// 目标是非空目录时，要么 recursive 逐个删除子项，
    /// 要么拒绝。
    pub fn remove(&self, recursive: bool, path: &str) -> Result<(), Error> {
        log::debug!("removing {path:?}");

        let (parent, name) = self.resolve_parent(path)?;
        let mut directory = Directory::fetch_from(&parent);
        let sector = directory.find(name).ok_or(Error::NotFound)?;

        if directory.is_dir(name) {
            let target_file = OpenFile::new(self.disk.clone(), sector);
            let target = Directory::fetch_from(&target_file);

            if recursive {
                for entry in target.entries() {
                    let child = format!("{path}/{}", entry.name());
                    self.remove(true, &child)?;
                }
            } else if !target.is_empty() {
                // 不能静默泄漏子项的扇区
                return Err(Error::DirectoryNotEmpty);
            }
        }

        let mut header = FileHeader::fetch_from(&self.disk, sector);
        let mut free_map = FreeMap::fetch_from(&self.free_map_file);

        // 归还数据扇区，再归还文件头扇区
        header.deallocate(&self.disk, &mut free_map);
        free_map.clear(sector);
        directory.remove(name);

        free_map.write_back(&self.free_map_file);
        directory.write_back(&parent);

        Ok(())
    }

    /// 打印路径处目录的内容。路径 `"/"` 直接列出根目录；
    /// 路径无法解析时不输出任何内容。
    pub fn list(&self, recursive: bool, path: &str, out: &mut dyn fmt::Write) -> fmt::Result {
        // 根目录没有父目录，单独处理
        if path == "/" {
            let directory = Directory::fetch_from(&self.directory_file);
            return directory.list(&self.disk, recursive, 0, out);
        }

        let Ok((parent, name)) = self.resolve_parent(path) else {
            return Ok(());
        };
        let directory = Directory::fetch_from(&parent);

        let Some(sector) = directory.find(name) else {
            log::debug!("listing {path:?}: not found");
            return Ok(());
        };

        let file = OpenFile::new(self.disk.clone(), sector);
        Directory::fetch_from(&file).list(&self.disk, recursive, 0, out)
    }

    /// 诊断输出：位图、根目录以及两个常驻文件的头
    pub fn print(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "Free map file header:")?;
        FileHeader::fetch_from(&self.disk, FREE_MAP_SECTOR).print(out)?;

        writeln!(out, "Root directory file header:")?;
        FileHeader::fetch_from(&self.disk, ROOT_DIRECTORY_SECTOR).print(out)?;

        FreeMap::fetch_from(&self.free_map_file).print(out)?;
        Directory::fetch_from(&self.directory_file).print(out)
    }

    /// 诊断用：从备份文件读出当前位图
    pub fn free_map(&self) -> FreeMap {
        FreeMap::fetch_from(&self.free_map_file)
    }

    /// 解析绝对路径，返回终点所在目录的句柄与终点名。
    ///
    /// 逐段下潜：非末段必须是已存在的目录。
    /// 空路径、结尾的斜杠或超长的名字都判为非法路径。
    fn resolve_parent<'path>(
        &self,
        path: &'path str,
    ) -> Result<(DirHandle<'_>, &'path str), Error> {
        let rest = path.strip_prefix('/').ok_or(Error::InvalidPath)?;
        if rest.is_empty() {
            return Err(Error::InvalidPath);
        }

        let components: Vec<&str> = rest.split('/').collect();
        if components
            .iter()
            .any(|component| component.is_empty() || component.len() > NAME_MAX_LEN)
        {
            return Err(Error::InvalidPath);
        }

        let mut current = DirHandle::Root(&self.directory_file);
        for &component in &components[..components.len() - 1] {
            let directory = Directory::fetch_from(&current);
            let Some(sector) = directory.find(component) else {
                log::debug!("sub-directory {component:?} not found");
                return Err(Error::NotFound);
            };
            if !directory.is_dir(component) {
                return Err(Error::NotADirectory);
            }

            // 下潜。旧的中间句柄在这里释放
            current = DirHandle::Sub(OpenFile::new(self.disk.clone(), sector));
        }

        Ok((current, components[components.len() - 1]))
    }
}
