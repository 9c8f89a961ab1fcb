mod cli;

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use cli::Cli;
use sector_fs::FileSystem;
use sector_fs::{NUM_SECTORS, SECTOR_SIZE};
use sector_fs_fuse::DiskFile;

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    println!("source={:?}\nimage={:?}", cli.source, cli.image);

    let disk = Arc::new(DiskFile::new({
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&cli.image)?;
        fd.set_len((NUM_SECTORS * SECTOR_SIZE) as u64)?;

        fd
    }));

    let fs = FileSystem::format(disk);
    pack_dir(&fs, &cli.source, "")?;

    if cli.list {
        let mut listing = String::new();
        fs.list(true, "/", &mut listing).unwrap();
        print!("{listing}");
    }

    Ok(())
}

/// 把宿主机目录树原样搬进镜像
fn pack_dir(fs: &FileSystem, host_dir: &Path, prefix: &str) -> io::Result<()> {
    for entry in fs::read_dir(host_dir)? {
        let entry = entry?;
        let name = entry
            .file_name()
            .into_string()
            .expect("file name is not UTF-8");
        let path = format!("{prefix}/{name}");

        if entry.file_type()?.is_dir() {
            log::info!("dir: {path}");
            fs.create(&path, 0, true).expect("packing directory");
            pack_dir(fs, &entry.path(), &path)?;
        } else {
            let mut data = Vec::new();
            File::open(entry.path())?.read_to_end(&mut data)?;
            log::info!("file: {path} ({} bytes)", data.len());

            fs.create(&path, data.len(), false).expect("packing file");
            let mut file = fs.open(&path).expect("opening packed file");
            file.write(&data);
        }
    }

    Ok(())
}
