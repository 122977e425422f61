use super::{EvaluationSession, SessionId, SessionStore};
use crate::error::StorageError;
use crate::grader::EvaluationResult;
use chrono::{DateTime, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use tracing::{info, warn};

struct Writer {
    file: File,
    next_id: u64,
}

/// Session log on disk, one JSON object per line.
///
/// Appends go through a single writer lock; a line is written and flushed
/// before the in-memory index shows it, so readers never see an entry that
/// is not on disk.
pub struct JsonlStore {
    path: PathBuf,
    writer: Mutex<Writer>,
    index: RwLock<Vec<EvaluationSession>>,
}

impl JsonlStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = match fs::read(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let scan = parse_log(&content, &path)?;
        let sessions = scan.sessions;

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if (scan.good_len as usize) < content.len() {
            // Drop the torn tail so the next append starts on a fresh line
            file.set_len(scan.good_len)?;
        }
        if scan.unterminated {
            // Last entry is whole but lost its newline
            file.write_all(b"\n")?;
            file.flush()?;
        }

        let next_id = sessions.iter().map(|s| s.id.0).max().unwrap_or(0) + 1;
        info!(
            "🗂️  Opened session log {} ({} sessions)",
            path.display(),
            sessions.len()
        );

        Ok(Self {
            path,
            writer: Mutex::new(Writer { file, next_id }),
            index: RwLock::new(sessions),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct LogScan {
    sessions: Vec<EvaluationSession>,
    /// Byte length of the valid prefix.
    good_len: u64,
    /// The valid prefix ends in an entry without its trailing newline.
    unterminated: bool,
}

/// Parses the log. Only the final line may be damaged; a final line that
/// parses is kept even when its newline is missing.
fn parse_log(content: &[u8], path: &Path) -> Result<LogScan, StorageError> {
    let mut sessions = Vec::new();
    let mut offset = 0usize;
    let mut good_len = 0usize;
    let mut unterminated = false;

    while offset < content.len() {
        let rest = &content[offset..];
        let (line, consumed, terminated) = match rest.iter().position(|&b| b == b'\n') {
            Some(n) => (&rest[..n], n + 1, true),
            None => (rest, rest.len(), false),
        };
        let is_last = offset + consumed >= content.len();

        let text = String::from_utf8_lossy(line);
        if text.trim().is_empty() {
            offset += consumed;
            if terminated {
                good_len = offset;
            }
            continue;
        }

        match serde_json::from_str::<EvaluationSession>(&text) {
            Ok(s) => {
                sessions.push(s);
                offset += consumed;
                good_len = offset;
                unterminated = !terminated;
            }
            Err(e) if !is_last => {
                return Err(StorageError::Unavailable(format!(
                    "{} line {} is corrupt: {}",
                    path.display(),
                    sessions.len() + 1,
                    e
                )))
            }
            _ => {
                warn!(
                    "Skipping torn trailing entry in {} ({} bytes)",
                    path.display(),
                    line.len()
                );
                offset += consumed;
            }
        }
    }
    Ok(LogScan {
        sessions,
        good_len: good_len as u64,
        unterminated,
    })
}

/// The file operations an append needs, so a failed write can be undone.
trait LogFile: Write {
    fn len(&self) -> io::Result<u64>;
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl LogFile for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Writes one whole line or nothing: on failure the file is cut back to
/// where it was.
fn append_line<F: LogFile>(file: &mut F, line: &[u8]) -> io::Result<()> {
    let start = file.len()?;
    let written = file.write_all(line).and_then(|_| file.flush());
    if let Err(e) = written {
        if let Err(undo) = file.truncate_to(start) {
            warn!("Could not roll back partial session entry: {}", undo);
        }
        return Err(e);
    }
    Ok(())
}

fn poisoned() -> StorageError {
    StorageError::Unavailable("session log lock poisoned".to_string())
}

impl SessionStore for JsonlStore {
    fn record_at(
        &self,
        result: &EvaluationResult,
        image_ref: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<SessionId, StorageError> {
        let mut w = self.writer.lock().map_err(|_| poisoned())?;
        let session = EvaluationSession {
            id: SessionId(w.next_id),
            timestamp,
            result: result.clone(),
            image_ref: image_ref.to_string(),
        };

        let mut line = serde_json::to_vec(&session)?;
        line.push(b'\n');
        append_line(&mut w.file, &line)?;
        w.next_id += 1;

        let id = session.id;
        self.index.write().map_err(|_| poisoned())?.push(session);
        Ok(id)
    }

    fn snapshot(&self) -> Result<Vec<EvaluationSession>, StorageError> {
        Ok(self.index.read().map_err(|_| poisoned())?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory file that stops accepting bytes after `capacity`.
    struct ShortFile {
        data: Vec<u8>,
        capacity: usize,
    }

    impl Write for ShortFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.capacity.saturating_sub(self.data.len());
            if room == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            let n = room.min(buf.len());
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogFile for ShortFile {
        fn len(&self) -> io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn truncate_to(&mut self, len: u64) -> io::Result<()> {
            self.data.truncate(len as usize);
            Ok(())
        }
    }

    #[test]
    fn test_failed_append_leaves_no_fragment() {
        let mut f = ShortFile {
            data: b"{\"a\":1}\n".to_vec(),
            capacity: 14,
        };
        assert!(append_line(&mut f, b"{\"b\":2}\n").is_err());
        assert_eq!(f.data, b"{\"a\":1}\n");

        f.capacity = 64;
        append_line(&mut f, b"{\"c\":3}\n").unwrap();
        assert_eq!(f.data, b"{\"a\":1}\n{\"c\":3}\n");
    }

    #[test]
    fn test_scan_drops_unparseable_tail() {
        let path = Path::new("mem.jsonl");
        assert!(parse_log(b"", path).unwrap().sessions.is_empty());

        let scan = parse_log(b"{\"truncated", path).unwrap();
        assert!(scan.sessions.is_empty());
        assert_eq!(scan.good_len, 0);
        assert!(!scan.unterminated);
    }
}
