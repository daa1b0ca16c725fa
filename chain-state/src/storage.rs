//! Storage layer: data directory layout and the block log
//!
//! # Layout
//!
//! ```text
//! <data_dir>/
//!   database/
//!     genesis.json   initial allocation
//!     block.db       one JSON block envelope per line, append-only
//! ```
//!
//! The engine only talks to the log through [`BlockLog`], so it runs the same
//! against a real file ([`FileLog`]) and an in-memory stand-in ([`MemoryLog`]).

use crate::{
    genesis::{write_genesis, Genesis},
    Result,
};
use parking_lot::Mutex;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DATABASE_DIR: &str = "database";
const GENESIS_FILE: &str = "genesis.json";
const BLOCK_DB_FILE: &str = "block.db";

/// `<data_dir>/database`
pub fn database_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(DATABASE_DIR)
}

/// `<data_dir>/database/genesis.json`
pub fn genesis_path(data_dir: &Path) -> PathBuf {
    database_dir(data_dir).join(GENESIS_FILE)
}

/// `<data_dir>/database/block.db`
pub fn block_db_path(data_dir: &Path) -> PathBuf {
    database_dir(data_dir).join(BLOCK_DB_FILE)
}

/// Create the database directory, default genesis and an empty block log.
///
/// Does nothing once `genesis.json` exists. Returns whether it bootstrapped.
pub fn init_data_dir_if_not_exists(data_dir: &Path) -> Result<bool> {
    if genesis_path(data_dir).exists() {
        return Ok(false);
    }

    std::fs::create_dir_all(database_dir(data_dir))?;
    write_genesis(genesis_path(data_dir), &Genesis::default())?;
    File::create(block_db_path(data_dir))?;

    tracing::info!(data_dir = %data_dir.display(), "Initialized data directory");

    Ok(true)
}

fn closed_error() -> crate::Error {
    io::Error::new(io::ErrorKind::Other, "block log is closed").into()
}

/// Append target that can be cut back to an earlier length
trait Truncate: Write {
    fn current_len(&self) -> io::Result<u64>;
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl Truncate for File {
    fn current_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Write `buf` in full or leave the target at its previous length.
///
/// A retry after a failed append must start on a clean line.
fn append_or_rollback<T: Truncate>(target: &mut T, buf: &[u8], sync: bool) -> io::Result<()> {
    let prev_len = target.current_len()?;

    let written = match target.write_all(buf) {
        Ok(()) if sync => target.sync(),
        other => other,
    };

    if let Err(e) = written {
        match target.truncate_to(prev_len) {
            Ok(()) => tracing::warn!(error = %e, len = prev_len, "Rolled back failed block log append"),
            Err(rollback) => {
                tracing::error!(error = %e, rollback_error = %rollback, "Failed to roll back block log append")
            }
        }
        return Err(e);
    }
    Ok(())
}

/// Cut trailing blank lines and terminate an unfinished last line, so the
/// next append lands directly after the last block.
fn repair_tail(file: &mut File, path: &Path) -> Result<()> {
    let mut content = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut content)?;

    let end = content
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    let terminated = end == 0 || content.get(end) == Some(&b'\n');
    let keep = if end > 0 && terminated { end + 1 } else { end };

    if keep < content.len() {
        tracing::warn!(
            path = %path.display(),
            removed = content.len() - keep,
            "Trimmed trailing blank lines from block log"
        );
        file.set_len(keep as u64)?;
    }
    if !terminated {
        tracing::warn!(path = %path.display(), "Terminated unfinished last line of block log");
        file.write_all(b"\n")?;
    }
    Ok(())
}

/// Sequential-read / append-only access to persisted block envelopes
pub trait BlockLog: Send + fmt::Debug {
    /// All lines in file order, without terminators
    fn read_lines(&mut self) -> Result<Vec<String>>;

    /// Append one line; the terminator is added here
    fn append_line(&mut self, line: &str) -> Result<()>;

    /// Release the underlying resource
    fn close(&mut self) -> Result<()>;
}

/// Block log backed by `block.db`
pub struct FileLog {
    path: PathBuf,
    file: Option<File>,
    sync_on_append: bool,
}

impl FileLog {
    /// Open an existing log for read + append.
    ///
    /// Trailing blank lines are removed so appends never follow the end
    /// marker.
    pub fn open(path: impl AsRef<Path>, sync_on_append: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).append(true).open(&path)?;
        repair_tail(&mut file, &path)?;

        Ok(Self {
            path,
            file: Some(file),
            sync_on_append,
        })
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or_else(closed_error)
    }
}

impl fmt::Debug for FileLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLog")
            .field("path", &self.path)
            .field("open", &self.file.is_some())
            .field("sync_on_append", &self.sync_on_append)
            .finish()
    }
}

impl BlockLog for FileLog {
    fn read_lines(&mut self) -> Result<Vec<String>> {
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(0))?;

        let mut lines = Vec::new();
        for line in BufReader::new(file).lines() {
            lines.push(line?);
        }
        Ok(lines)
    }

    fn append_line(&mut self, line: &str) -> Result<()> {
        let sync = self.sync_on_append;
        let file = self.file_mut()?;

        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        append_or_rollback(file, &buf, sync)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        match self.file.take() {
            Some(file) => {
                file.sync_all()?;
                tracing::debug!(path = %self.path.display(), "Block log closed");
                Ok(())
            }
            None => Err(closed_error()),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    lines: Vec<String>,
    fail_appends: bool,
    closed: bool,
}

/// In-memory block log; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Log pre-filled with raw lines
    pub fn with_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let log = Self::new();
        log.inner.lock().lines = lines.into_iter().map(Into::into).collect();
        log
    }

    /// Snapshot of the current lines
    pub fn lines(&self) -> Vec<String> {
        self.inner.lock().lines.clone()
    }

    /// Make every following append fail with an IO error
    pub fn fail_appends(&self, fail: bool) {
        self.inner.lock().fail_appends = fail;
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl BlockLog for MemoryLog {
    fn read_lines(&mut self) -> Result<Vec<String>> {
        let inner = self.inner.lock();
        if inner.closed {
            return Err(closed_error());
        }
        Ok(inner.lines.clone())
    }

    fn append_line(&mut self, line: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(closed_error());
        }
        if inner.fail_appends {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure").into());
        }
        // Same tail handling as FileLog::open
        while inner.lines.last().map_or(false, |l| l.trim().is_empty()) {
            inner.lines.pop();
        }
        inner.lines.push(line.to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(closed_error());
        }
        inner.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::load_genesis;
    use crate::Error;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let root = Path::new("/tmp/node");
        assert_eq!(genesis_path(root), Path::new("/tmp/node/database/genesis.json"));
        assert_eq!(block_db_path(root), Path::new("/tmp/node/database/block.db"));
    }

    #[test]
    fn test_bootstrap_runs_once() {
        let dir = TempDir::new().unwrap();

        assert!(init_data_dir_if_not_exists(dir.path()).unwrap());
        assert_eq!(load_genesis(genesis_path(dir.path())).unwrap(), Genesis::default());
        assert_eq!(std::fs::read(block_db_path(dir.path())).unwrap().len(), 0);

        // Existing data must survive a second bootstrap
        std::fs::write(block_db_path(dir.path()), "keep\n").unwrap();
        assert!(!init_data_dir_if_not_exists(dir.path()).unwrap());
        assert_eq!(std::fs::read_to_string(block_db_path(dir.path())).unwrap(), "keep\n");
    }

    #[test]
    fn test_file_log_append_and_read() {
        let dir = TempDir::new().unwrap();
        init_data_dir_if_not_exists(dir.path()).unwrap();

        let mut log = FileLog::open(block_db_path(dir.path()), false).unwrap();
        log.append_line("one").unwrap();
        log.append_line("two").unwrap();
        assert_eq!(log.read_lines().unwrap(), vec!["one", "two"]);

        // Reading does not move the append position
        log.append_line("three").unwrap();
        assert_eq!(log.read_lines().unwrap(), vec!["one", "two", "three"]);
        log.close().unwrap();

        let raw = std::fs::read_to_string(block_db_path(dir.path())).unwrap();
        assert_eq!(raw, "one\ntwo\nthree\n");
    }

    #[test]
    fn test_file_log_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = FileLog::open(dir.path().join("block.db"), false);
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_file_log_close_twice() {
        let dir = TempDir::new().unwrap();
        init_data_dir_if_not_exists(dir.path()).unwrap();

        let mut log = FileLog::open(block_db_path(dir.path()), true).unwrap();
        log.close().unwrap();
        assert!(log.close().is_err());
        assert!(log.append_line("late").is_err());
    }

    #[test]
    fn test_memory_log_shared_and_failing() {
        let log = MemoryLog::with_lines(["a"]);
        let mut writer = log.clone();

        writer.append_line("b").unwrap();
        assert_eq!(log.lines(), vec!["a", "b"]);

        log.fail_appends(true);
        assert!(matches!(writer.append_line("c"), Err(Error::Io(_))));
        assert_eq!(log.lines(), vec!["a", "b"]);

        writer.close().unwrap();
        assert!(log.is_closed());
        assert!(writer.read_lines().is_err());
    }

    #[test]
    fn test_memory_log_appends_before_trailing_blank() {
        let mut log = MemoryLog::with_lines(["a", "", " "]);
        log.append_line("b").unwrap();
        assert_eq!(log.lines(), vec!["a", "b"]);
    }

    #[test]
    fn test_file_log_open_trims_trailing_blank_lines() {
        let dir = TempDir::new().unwrap();
        init_data_dir_if_not_exists(dir.path()).unwrap();
        let path = block_db_path(dir.path());
        std::fs::write(&path, "one\n\n  \n").unwrap();

        let mut log = FileLog::open(&path, false).unwrap();
        log.append_line("two").unwrap();
        log.close().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_file_log_open_terminates_last_line() {
        let dir = TempDir::new().unwrap();
        init_data_dir_if_not_exists(dir.path()).unwrap();
        let path = block_db_path(dir.path());
        std::fs::write(&path, "one").unwrap();

        let mut log = FileLog::open(&path, false).unwrap();
        log.append_line("two").unwrap();
        assert_eq!(log.read_lines().unwrap(), vec!["one", "two"]);
        log.close().unwrap();
    }

    /// Accepts `budget` bytes, then fails like a full disk
    struct TornWriter {
        data: Vec<u8>,
        budget: usize,
        fail_sync: bool,
    }

    impl Write for TornWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
            }
            let n = buf.len().min(self.budget);
            self.data.extend_from_slice(&buf[..n]);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Truncate for TornWriter {
        fn current_len(&self) -> io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn truncate_to(&mut self, len: u64) -> io::Result<()> {
            self.data.truncate(len as usize);
            Ok(())
        }

        fn sync(&mut self) -> io::Result<()> {
            if self.fail_sync {
                return Err(io::Error::new(io::ErrorKind::Other, "sync failed"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_partial_append_is_rolled_back() {
        let mut target = TornWriter {
            data: b"first\n".to_vec(),
            budget: 4,
            fail_sync: false,
        };

        assert!(append_or_rollback(&mut target, b"second line\n", false).is_err());
        assert_eq!(target.data, b"first\n");

        // Retry starts on a clean line
        target.budget = usize::MAX;
        append_or_rollback(&mut target, b"second line\n", false).unwrap();
        assert_eq!(target.data, b"first\nsecond line\n");
    }

    #[test]
    fn test_failed_sync_is_rolled_back() {
        let mut target = TornWriter {
            data: Vec::new(),
            budget: usize::MAX,
            fail_sync: true,
        };

        assert!(append_or_rollback(&mut target, b"line\n", true).is_err());
        assert!(target.data.is_empty());

        // Without sync the same write sticks
        append_or_rollback(&mut target, b"line\n", false).unwrap();
        assert_eq!(target.data, b"line\n");
    }
}
