//! `;`-delimited history report files.
//!
//! One line per event: `user_id;segment_slug;operation;timestamp`. Files get a
//! random alphanumeric suffix and are created with `create_new`, so concurrent
//! exports never overwrite each other.

use rand::Rng;
use std::fs::OpenOptions;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::types::{format_timestamp, Event, ReportLocation};
use crate::config::ReportConfig;
use crate::error::{Result, SegmentError};

const FILE_ID_LENGTH: usize = 10;
const FILE_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
/// Attempts before giving up on finding an unused file name.
const MAX_NAME_ATTEMPTS: usize = 8;

#[derive(Debug, Clone)]
pub struct ReportExporter {
    storage_dir: PathBuf,
    file_prefix: String,
    file_ext: String,
    base_url: String,
}

impl ReportExporter {
    pub fn new(
        storage_dir: impl Into<PathBuf>,
        file_prefix: impl Into<String>,
        file_ext: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            file_prefix: file_prefix.into(),
            file_ext: file_ext.into(),
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(
            config.resolved_storage_dir(),
            config.file_prefix.clone(),
            config.file_ext.clone(),
            config.base_url.clone(),
        )
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Write `events` to a fresh file and return where it can be fetched.
    ///
    /// An empty event list still produces an (empty) file.
    pub fn export(&self, events: &[Event]) -> Result<ReportLocation> {
        std::fs::create_dir_all(&self.storage_dir)?;

        let (file_name, file) = self.create_unique_file()?;
        let path = self.storage_dir.join(&file_name);

        let file = discard_on_error(&path, write_events(file, events))?;
        if let Err(e) = file.sync_all() {
            tracing::warn!(path = %path.display(), error = %e, "failed to sync report file");
        }

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), file_name);
        tracing::info!(path = %path.display(), events = events.len(), "report exported");
        Ok(ReportLocation { path, url })
    }

    fn create_unique_file(&self) -> Result<(String, std::fs::File)> {
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_NAME_ATTEMPTS {
            let file_name = format!("{}{}{}", self.file_prefix, random_id(&mut rng), self.file_ext);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.storage_dir.join(&file_name))
            {
                Ok(file) => return Ok((file_name, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(SegmentError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            "could not find an unused report file name",
        )))
    }
}

fn write_events(file: std::fs::File, events: &[Event]) -> std::io::Result<std::fs::File> {
    let mut writer = BufWriter::new(file);
    for event in events {
        writeln!(writer, "{}", format_line(event))?;
    }
    writer.into_inner().map_err(|e| e.into_error())
}

/// Remove the partially written report at `path` when `result` failed.
fn discard_on_error<T>(path: &Path, result: std::io::Result<T>) -> Result<T> {
    result.map_err(|err| {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove partial report");
        }
        SegmentError::Io(err)
    })
}

/// `user_id;segment_slug;operation;timestamp`
pub fn format_line(event: &Event) -> String {
    format!(
        "{};{};{};{}",
        event.user_id,
        event.segment_slug,
        event.operation,
        format_timestamp(event.timestamp)
    )
}

fn random_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..FILE_ID_LENGTH)
        .map(|_| FILE_ID_ALPHABET[rng.gen_range(0..FILE_ID_ALPHABET.len())] as char)
        .collect()
}
