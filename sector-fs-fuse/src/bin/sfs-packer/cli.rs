use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
pub struct Cli {
    /// Host directory packed into the image
    #[arg(long, short)]
    pub source: PathBuf,

    /// Image file to create
    #[arg(long, short)]
    pub image: PathBuf,

    /// List the image contents after packing
    #[arg(long, short)]
    pub list: bool,
}
