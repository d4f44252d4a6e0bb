//! Per-ID response and diagnostic files for async dispatches.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::error::LogError;
use crate::id::CorrelationId;

/// Directory name under the system temp dir used when none is configured.
pub const DEFAULT_SPOOL_DIR: &str = "phpcurl";

/// Which per-ID file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpoolKind {
    Response,
    Error,
}

impl SpoolKind {
    fn extension(self) -> &'static str {
        match self {
            SpoolKind::Response => "response",
            SpoolKind::Error => "error",
        }
    }
}

/// Location of per-ID files: `<dir>/<id>.response` and `<dir>/<id>.error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spool {
    dir: PathBuf,
}

impl Default for Spool {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join(DEFAULT_SPOOL_DIR))
    }
}

impl Spool {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `RELAY_SPOOL_DIR`, or the default under the system temp dir.
    pub fn from_env() -> Self {
        std::env::var_os("RELAY_SPOOL_DIR").map(Self::new).unwrap_or_default()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, id: &CorrelationId, kind: SpoolKind) -> PathBuf {
        self.dir.join(format!("{id}.{}", kind.extension()))
    }

    /// Create (or truncate) the file, creating the directory on demand.
    pub fn create(&self, id: &CorrelationId, kind: SpoolKind) -> Result<File, LogError> {
        fs::create_dir_all(&self.dir).map_err(|e| LogError::io(&self.dir, e))?;
        let path = self.path(id, kind);
        File::create(&path).map_err(|e| LogError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn paths_follow_id_and_kind() {
        let spool = Spool::new("/var/spool/relay");
        let id = CorrelationId::from("abc");
        assert_eq!(spool.path(&id, SpoolKind::Response), Path::new("/var/spool/relay/abc.response"));
        assert_eq!(spool.path(&id, SpoolKind::Error), Path::new("/var/spool/relay/abc.error"));
    }

    #[test]
    fn default_lives_under_temp_dir() {
        assert_eq!(Spool::default().dir(), std::env::temp_dir().join(DEFAULT_SPOOL_DIR));
    }

    #[test]
    fn create_makes_directory_and_truncates() {
        let root = tempfile::tempdir().unwrap();
        let spool = Spool::new(root.path().join("nested/spool"));
        let id = CorrelationId::from("r1");

        spool.create(&id, SpoolKind::Response).unwrap().write_all(b"first run").unwrap();
        spool.create(&id, SpoolKind::Response).unwrap().write_all(b"2nd").unwrap();

        let written = fs::read_to_string(spool.path(&id, SpoolKind::Response)).unwrap();
        assert_eq!(written, "2nd");
    }
}
