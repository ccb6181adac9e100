use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One structured telemetry line per user rating event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingRecord {
    pub session_id: String,
    pub skill: String,
    pub case_id: Option<String>,
    pub stars: u8,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}

/// Appends rating events as JSONL under `<data_dir>/caseprep/ratings/`.
pub struct RatingWriter {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl RatingWriter {
    /// Create a new RatingWriter. Computes the file path from the current
    /// UTC timestamp and a hash of the session id, creates parent
    /// directories, and opens the file for writing.
    pub fn new(session_id: &str) -> io::Result<Self> {
        let ratings_dir = Self::ratings_dir()?;
        Self::with_dir(&ratings_dir, session_id)
    }

    /// Create a RatingWriter in a custom directory (useful for testing).
    pub fn with_dir(dir: &Path, session_id: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;

        let now = Utc::now();
        let timestamp_str = now.format("%Y-%m-%dT%H-%M-%SZ").to_string();

        let mut hasher = Sha256::new();
        hasher.update(session_id.as_bytes());
        let hash = hex::encode(hasher.finalize());
        let short_hash = &hash[..6];

        let filename = format!("{}_{}.jsonl", timestamp_str, short_hash);
        let path = dir.join(filename);

        let file = File::create(&path)?;
        let writer = BufWriter::new(file);

        Ok(Self {
            file: Mutex::new(writer),
            path,
        })
    }

    /// Returns the path to the telemetry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one rating record; best effort, errors are swallowed.
    pub fn write(&self, record: &RatingRecord) {
        if let Ok(json) = serde_json::to_string(record) {
            if let Ok(mut writer) = self.file.lock() {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
    }

    fn ratings_dir() -> io::Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine data directory",
            )
        })?;
        Ok(data_dir.join("caseprep").join("ratings"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RatingWriter::with_dir(dir.path(), "session-abc").unwrap();

        writer.write(&RatingRecord {
            session_id: "session-abc".into(),
            skill: "clarifying-questions".into(),
            case_id: Some("market-entry".into()),
            stars: 2,
            comment: "The interviewer repeated itself.".into(),
            timestamp: Utc::now(),
        });
        writer.write(&RatingRecord {
            session_id: "session-abc".into(),
            skill: "framework".into(),
            case_id: None,
            stars: 5,
            comment: String::new(),
            timestamp: Utc::now(),
        });

        let content = std::fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: RatingRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.stars, 2);
        assert_eq!(first.comment, "The interviewer repeated itself.");
        assert_eq!(first.case_id.as_deref(), Some("market-entry"));
    }

    #[test]
    fn test_filename_carries_session_hash() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RatingWriter::with_dir(dir.path(), "session-abc").unwrap();

        let name = writer.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with(".jsonl"));
        // timestamp prefix + underscore + 6-char hash
        let hash_part = name.trim_end_matches(".jsonl").rsplit('_').next().unwrap();
        assert_eq!(hash_part.len(), 6);
    }
}
