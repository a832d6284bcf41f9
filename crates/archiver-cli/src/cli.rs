use clap::Parser;
use std::path::PathBuf;

use archiver_core::AccessTier;

#[derive(Parser, Debug)]
#[command(name = "archiver")]
#[command(about = "Move blobs of an Azure storage account to a colder access tier", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Only process this container (exact, case-sensitive)
    pub container: Option<String>,

    /// Only process this top-level directory of the container
    pub directory: Option<String>,

    /// Target access tier (default from config: archive)
    #[arg(long, value_name = "TIER")]
    pub tier: Option<AccessTier>,

    /// Report failed tier changes and keep going
    #[arg(long)]
    pub continue_on_error: bool,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH", env = "ARCHIVER_CONFIG")]
    pub config: Option<PathBuf>,
}
