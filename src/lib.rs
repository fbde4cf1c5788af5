pub mod media;
pub mod metadata;
pub mod runlog;
pub mod timestamp;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use filetime::FileTime;
use walkdir::WalkDir;

use media::MediaKind;
use metadata::UpdateStatus;
use runlog::{PassCounters, RunLog};
use timestamp::NameLayout;

/// Options for one pass over a tree.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Root of the walk.
    pub root: PathBuf,
    /// Zone the derived timestamps are expressed in.
    pub timezone: Tz,
    /// Filename layout the timestamps are derived from.
    pub layout: NameLayout,
}

impl SyncOptions {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            timezone: timestamp::DEFAULT_TIMEZONE,
            layout: NameLayout::default(),
        }
    }
}

/// Terminal state of one picture in the synchronization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Filename did not yield a timestamp; file untouched.
    DerivationFailed,
    /// EXIF block created from scratch.
    Created,
    /// Existing EXIF rewritten with the derived timestamp.
    Updated,
    /// EXIF already carried the derived timestamp.
    AlreadyInSync,
    /// Re-encode or rewrite failed; file left as it was.
    WriteFailed,
}

/// Walk the tree and synchronize every picture's EXIF timestamps and
/// file times with its filename. One bad file never aborts the walk.
pub fn sync_tree(options: &SyncOptions, log: &mut RunLog) -> Result<PassCounters> {
    let mut counters = PassCounters::default();

    for entry in WalkDir::new(&options.root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log.line(&format!("Failed to walk directory: {err}"));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        match media::classify(path) {
            MediaKind::Picture => counters.pictures += 1,
            MediaKind::Video => {
                // counted only; video metadata is out of scope
                counters.videos += 1;
                continue;
            }
            MediaKind::Other => continue,
        }

        match sync_picture(path, options, log) {
            SyncOutcome::Created | SyncOutcome::Updated => counters.altered_pictures += 1,
            SyncOutcome::AlreadyInSync
            | SyncOutcome::DerivationFailed
            | SyncOutcome::WriteFailed => {}
        }
    }

    log.line(&counters.summary());
    Ok(counters)
}

/// Run one picture through the sync state machine. Every terminal
/// state is logged.
fn sync_picture(path: &Path, options: &SyncOptions, log: &mut RunLog) -> SyncOutcome {
    let rel = display_path(path, &options.root);

    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => {
            log.line(&format!(
                "Failed to update {rel}: filename is not valid UTF-8"
            ));
            return SyncOutcome::DerivationFailed;
        }
    };
    let Some(derived) = timestamp::derive_timestamp(name, &options.layout, options.timezone)
    else {
        log.line(&format!(
            "Failed to update {rel}: no timestamp in filename"
        ));
        return SyncOutcome::DerivationFailed;
    };

    // File times follow the filename as soon as derivation succeeds,
    // before EXIF is even consulted.
    if let Err(err) = apply_file_times(path, &derived) {
        log.line(&format!("Failed to update {rel}: {err}"));
        return SyncOutcome::WriteFailed;
    }

    let target = derived.naive_local();
    match metadata::read_exif(path, log) {
        None => match metadata::create_exif(path, target) {
            Ok(()) => {
                // the rewrite bumped the mtime; stamp it again
                apply_file_times(path, &derived).ok();
                log.line(&format!(
                    "Created EXIF data for {} with date {}",
                    path.display(),
                    derived
                ));
                SyncOutcome::Created
            }
            Err(err) => {
                log.line(&format!(
                    "Failed to create EXIF data for {}: {}",
                    path.display(),
                    err
                ));
                SyncOutcome::WriteFailed
            }
        },
        Some(existing) => match metadata::update_exif(path, &existing, target) {
            Ok(UpdateStatus::AlreadyInSync) => {
                log.line(&format!(
                    "EXIF data for {rel} is already in sync with {derived}"
                ));
                SyncOutcome::AlreadyInSync
            }
            Ok(UpdateStatus::Updated) => {
                apply_file_times(path, &derived).ok();
                log.line(&format!(
                    "Updated EXIF data for {} to {}",
                    path.display(),
                    derived
                ));
                SyncOutcome::Updated
            }
            Err(err) => {
                log.line(&format!(
                    "Failed to update EXIF data for {}: {}",
                    path.display(),
                    err
                ));
                SyncOutcome::WriteFailed
            }
        },
    }
}

/// Read-only pass: report every candidate whose modification time does
/// not match the timestamp derived from its filename.
pub fn verify_tree(options: &SyncOptions, log: &mut RunLog) -> Result<PassCounters> {
    log.line("Verification Log");
    let mut counters = PassCounters::default();

    for entry in WalkDir::new(&options.root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log.line(&format!("Failed to walk directory: {err}"));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        match media::classify(path) {
            MediaKind::Picture => counters.pictures += 1,
            MediaKind::Video => {
                counters.videos += 1;
                continue;
            }
            MediaKind::Other => continue,
        }
        let rel = display_path(path, &options.root);

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            log.line(&format!(
                "Failed to verify {rel}: filename is not valid UTF-8"
            ));
            continue;
        };
        let Some(derived) = timestamp::derive_timestamp(name, &options.layout, options.timezone)
        else {
            log.line(&format!("Failed to verify {rel}: no timestamp in filename"));
            continue;
        };

        let modified = match file_mtime(path) {
            Ok(modified) => modified.with_timezone(&options.timezone),
            Err(err) => {
                log.line(&format!("Failed to verify {rel}: {err}"));
                continue;
            }
        };

        // second resolution; sub-second filesystem precision is ignored
        if modified.timestamp() != derived.timestamp() {
            log.line(&format!(
                "File {rel} is not in sync. Filename date: {derived}, File date: {modified}"
            ));
            counters.altered_pictures += 1;
        }
    }

    log.line(&counters.summary());
    Ok(counters)
}

/// Stamp the derived instant onto the file's access and modification
/// times.
fn apply_file_times(path: &Path, when: &DateTime<Tz>) -> std::io::Result<()> {
    let ft = FileTime::from_unix_time(when.timestamp(), 0);
    filetime::set_file_times(path, ft, ft)
}

fn file_mtime(path: &Path) -> Result<DateTime<Utc>> {
    let meta = std::fs::metadata(path)?;
    let mtime = FileTime::from_last_modification_time(&meta);
    DateTime::from_timestamp(mtime.unix_seconds(), 0)
        .ok_or_else(|| anyhow!("modification time out of range"))
}

fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}
