use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::Result;

/// Line sink for one run. Every line goes to stdout and to the
/// underlying writer: the run's log file in production, a buffer in
/// tests.
pub struct RunLog {
    sink: Box<dyn Write>,
}

impl RunLog {
    /// Open the run's log file under `dir` in append mode, creating
    /// the directory as needed.
    pub fn create(dir: &Path, file_name: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(file_name))?;
        Ok(Self::from_writer(Box::new(file)))
    }

    pub fn from_writer(sink: Box<dyn Write>) -> Self {
        Self { sink }
    }

    /// Print a line and append it to the log. A failing sink never
    /// interrupts the pass.
    pub fn line(&mut self, message: &str) {
        println!("{message}");
        writeln!(self.sink, "{message}").ok();
    }
}

/// Counters accumulated over one pass of the tree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassCounters {
    pub pictures: u64,
    pub videos: u64,
    pub altered_pictures: u64,
    pub altered_videos: u64,
}

impl PassCounters {
    /// Three-line summary emitted at the end of a pass.
    pub fn summary(&self) -> String {
        format!(
            "Total pictures: {}, Total videos: {}\n\
             Altered pictures: {}, Altered videos: {}\n\
             Not altered pictures: {}, Not altered videos: {}",
            self.pictures,
            self.videos,
            self.altered_pictures,
            self.altered_videos,
            self.pictures - self.altered_pictures,
            self.videos - self.altered_videos,
        )
    }
}
