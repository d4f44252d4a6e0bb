//! Flat-file outcome log.
//!
//! # Format
//! Each record is one block followed by a newline:
//!
//! ```text
//! |||<id>:<Success|Error> code:<status>:<body>|||
//! ```
//!
//! The body is written verbatim and may span lines or contain `:`. A reader
//! finds the line starting with `|||<id>:`, takes the status from the third
//! `:`-separated field and collects everything after the third `:` up to the
//! first line that ends in `|||`. A body with `|||` at the end of one of its
//! lines therefore ends the record early; that ambiguity is part of the
//! format. A continuation line that starts another block (`|||` followed by
//! anything but a line break) means the record was cut off; it is skipped
//! and the scan resumes at that line.
//!
//! # Design
//! Records are appended with a single `write_all` on an append-mode handle,
//! and `OutcomeLogger` serializes writers within a process. Lookups scan from
//! the start of the file; there is no index.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::path::Path;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LogSettings;
use crate::error::LogError;
use crate::id::CorrelationId;

const MARKER: &str = "|||";

/// Success/Error classification of a completed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeTag {
    Success,
    Error,
}

impl OutcomeTag {
    /// `Success` for statuses in `[200, 300)`, `Error` for everything else,
    /// including 0.
    pub fn from_status(status: u16) -> Self {
        if (200..300).contains(&status) {
            OutcomeTag::Success
        } else {
            OutcomeTag::Error
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeTag::Success => "Success",
            OutcomeTag::Error => "Error",
        }
    }

    fn parse(field: &str) -> Option<Self> {
        match field {
            "Success code" => Some(OutcomeTag::Success),
            "Error code" => Some(OutcomeTag::Error),
            _ => None,
        }
    }
}

impl fmt::Display for OutcomeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One correlated outcome as stored in a log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: CorrelationId,
    pub tag: OutcomeTag,
    pub status: u16,
    pub body: String,
}

impl LogRecord {
    pub fn new(id: CorrelationId, status: u16, body: impl Into<String>) -> Self {
        Self {
            id,
            tag: OutcomeTag::from_status(status),
            status,
            body: body.into(),
        }
    }

    /// `<id>:<Tag> code:<status>:<body>`, the record without its markers.
    pub fn summary(&self) -> String {
        format!("{}:{} code:{}:{}", self.id, self.tag, self.status, self.body)
    }

    pub fn project(self, projection: Projection) -> Projected {
        match projection {
            Projection::Code => Projected::Code(self.status),
            Projection::Body => Projected::Body(self.body),
            Projection::Full => Projected::Full(self.summary()),
        }
    }
}

/// The on-disk block, without the trailing newline.
impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{MARKER}{}{MARKER}", self.summary())
    }
}

/// Which part of a found record a caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Code,
    Body,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projected {
    Code(u16),
    Body(String),
    Full(String),
}

/// Appends records, one writer at a time.
#[derive(Debug, Default)]
pub struct OutcomeLogger {
    lock: Mutex<()>,
}

impl OutcomeLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `|||id:Tag code:status:body|||` to `path`. A missing file is
    /// created world-writable.
    pub fn record(
        &self,
        id: &CorrelationId,
        tag: OutcomeTag,
        status: u16,
        body: &str,
        path: &Path,
    ) -> Result<(), LogError> {
        let record = LogRecord {
            id: id.clone(),
            tag,
            status,
            body: body.to_string(),
        };
        let block = format!("{record}\n");

        let _guard = self.lock.lock();
        let mut file = open_append(path).map_err(|e| LogError::io(path, e))?;
        file.write_all(block.as_bytes())
            .map_err(|e| LogError::io(path, e))?;
        debug!(%id, %tag, status, path = %path.display(), "outcome recorded");
        Ok(())
    }

    /// Route by status to the success or error path of `logs`.
    pub fn record_outcome(
        &self,
        logs: &LogSettings,
        id: &CorrelationId,
        status: u16,
        body: &str,
    ) -> Result<(), LogError> {
        let tag = OutcomeTag::from_status(status);
        let path = logs.path_for(tag).ok_or(LogError::MissingPath {
            tag: tag.as_str(),
        })?;
        self.record(id, tag, status, body, path)
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    match OpenOptions::new().append(true).create_new(true).open(path) {
        Ok(file) => {
            make_world_writable(&file)?;
            Ok(file)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            OpenOptions::new().append(true).open(path)
        }
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn make_world_writable(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o666))
}

#[cfg(not(unix))]
fn make_world_writable(_file: &File) -> io::Result<()> {
    Ok(())
}

impl LogSettings {
    pub fn path_for(&self, tag: OutcomeTag) -> Option<&Path> {
        match tag {
            OutcomeTag::Success => self.success_path.as_deref(),
            OutcomeTag::Error => self.error_path.as_deref(),
        }
    }

    /// Find `id` in the log selected by `tag`.
    pub fn lookup(&self, id: &CorrelationId, tag: OutcomeTag) -> Result<Option<LogRecord>, LogError> {
        match self.path_for(tag) {
            Some(path) => lookup(path, id),
            None => Ok(None),
        }
    }
}

/// Scan `path` for the first record of `id`. A missing file is `Ok(None)`.
pub fn lookup(path: &Path, id: &CorrelationId) -> Result<Option<LogRecord>, LogError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LogError::io(path, e)),
    };
    scan(BufReader::new(file), id).map_err(|e| LogError::io(path, e))
}

/// Scan a log stream for the first complete record of `id`.
pub fn scan<R: BufRead>(mut reader: R, id: &CorrelationId) -> io::Result<Option<LogRecord>> {
    let prefix = format!("{MARKER}{id}:");
    let mut line = String::new();
    let mut carried = false;
    loop {
        if !carried {
            line.clear();
            if read_line(&mut reader, &mut line)? == 0 {
                return Ok(None);
            }
        }
        carried = false;
        let Some(rest) = line.strip_prefix(prefix.as_str()) else {
            continue;
        };
        let mut fields = rest.splitn(3, ':');
        let (Some(tag), Some(status), Some(first)) = (fields.next(), fields.next(), fields.next())
        else {
            debug!(%id, "skipping record start with too few fields");
            continue;
        };
        let (Some(tag), Ok(status)) = (OutcomeTag::parse(tag), status.trim().parse::<u16>()) else {
            debug!(%id, "skipping record start with unreadable tag or status");
            continue;
        };

        let mut body = first.to_string();
        loop {
            if let Some(done) = body.strip_suffix("|||\n").or_else(|| body.strip_suffix(MARKER)) {
                let body = done.to_string();
                return Ok(Some(LogRecord {
                    id: id.clone(),
                    tag,
                    status,
                    body,
                }));
            }
            line.clear();
            if read_line(&mut reader, &mut line)? == 0 {
                warn!(%id, "record has no terminating marker");
                return Ok(None);
            }
            if starts_block(&line) {
                warn!(%id, "record cut off by the next block");
                carried = true;
                break;
            }
            body.push_str(&line);
        }
    }
}

/// A line opening a new block, as opposed to the bare closing marker of a
/// body that ends in a line break.
fn starts_block(line: &str) -> bool {
    line.strip_prefix(MARKER)
        .is_some_and(|rest| !rest.trim_end_matches(['\r', '\n']).is_empty())
}

/// `read_line` that tolerates invalid UTF-8 in bodies.
fn read_line<R: BufRead>(reader: &mut R, line: &mut String) -> io::Result<usize> {
    let mut bytes = Vec::new();
    let read = reader.read_until(b'\n', &mut bytes)?;
    line.push_str(&String::from_utf8_lossy(&bytes));
    Ok(read)
}
