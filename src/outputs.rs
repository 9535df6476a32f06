//! Step outputs exposed to downstream pipeline steps
//!
//! Outputs are `name=value` lines appended to the CI output file, or printed
//! to stdout when no file is configured.

use crate::error::{RustcargoError, RustcargoResult};
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Output names
pub mod names {
    pub const CACHE_KEY: &str = "cache-key";
    pub const CACHE_HIT: &str = "cache-hit";
    pub const RUST_VERSION: &str = "rust-version";
    pub const RUST_HASH: &str = "rust-hash";
}

/// Destination for step outputs
pub struct OutputSink {
    path: Option<PathBuf>,
}

impl OutputSink {
    /// Append to `path`, or print to stdout when `None`
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Emit one output
    pub async fn set(&self, name: &str, value: &str) -> RustcargoResult<()> {
        let line = format!("{}={}\n", name, value.replace('\n', " "));
        debug!("Output {}={}", name, value);

        match &self.path {
            Some(path) => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await
                    .map_err(|e| {
                        RustcargoError::io(format!("opening output file {}", path.display()), e)
                    })?;

                file.write_all(line.as_bytes())
                    .await
                    .map_err(|e| RustcargoError::io("writing output", e))?;
                file.flush()
                    .await
                    .map_err(|e| RustcargoError::io("flushing output", e))?;
            }
            None => print!("{line}"),
        }

        Ok(())
    }
}
