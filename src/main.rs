use std::path::PathBuf;

use clap::Parser;

use datesync::runlog::RunLog;
use datesync::{sync_tree, verify_tree, SyncOptions};

#[derive(Parser)]
#[command(
    name = "datesync",
    version,
    about = "Sync photo EXIF timestamps and file times to the capture time encoded in filenames"
)]
struct Cli {
    /// Directory to process
    #[arg(long, default_value = ".")]
    directory: PathBuf,

    /// Check file times against filenames without modifying anything
    #[arg(long)]
    verify: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let options = SyncOptions::new(cli.directory);

    let started = chrono::Utc::now().timestamp();
    let log_dir = PathBuf::from("logs");

    if cli.verify {
        let name = format!("verify_file_date_changes_{started}.log");
        let mut log = RunLog::create(&log_dir, &name)?;
        verify_tree(&options, &mut log)?;
    } else {
        let name = format!("file_date_changes_{started}.log");
        let mut log = RunLog::create(&log_dir, &name)?;
        sync_tree(&options, &mut log)?;
    }

    Ok(())
}
