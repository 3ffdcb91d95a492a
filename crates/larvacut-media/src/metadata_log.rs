//! Append-only clip log, amendable by row removal.

use std::path::Path;

use larvacut_models::LogEntry;

use crate::error::MediaResult;

/// Column header of the serialized log.
pub const LOG_HEADER: [&str; 6] = ["movie_name", "parent_video", "frame", "coordinates", "comments", "label"];

/// File name of the log inside the output folder.
pub const LOG_FILE_NAME: &str = "log.csv";

/// Rows describing every clip that currently exists on disk.
#[derive(Debug, Clone, Default)]
pub struct MetadataLog {
    entries: Vec<LogEntry>,
}

impl MetadataLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    /// Drop the row for `movie_name`. Returns whether a row was removed;
    /// removing an absent name is a no-op.
    pub fn remove(&mut self, movie_name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.movie_name != movie_name);
        self.entries.len() != before
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// CSV rendering, header first, rows in insertion order.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = String::new();
        push_record(&mut out, LOG_HEADER.iter().copied());
        for entry in &self.entries {
            let frame = entry.frame.to_string();
            let coordinates = entry.coordinates.to_string();
            push_record(
                &mut out,
                [
                    entry.movie_name.as_str(),
                    entry.parent_video.as_str(),
                    frame.as_str(),
                    coordinates.as_str(),
                    entry.comments.as_str(),
                    entry.label.as_deref().unwrap_or(""),
                ],
            );
        }
        out.into_bytes()
    }

    /// Write the serialized log to `path`, replacing any previous file.
    pub fn write_to(&self, path: impl AsRef<Path>) -> MediaResult<()> {
        std::fs::write(path, self.serialize())?;
        Ok(())
    }
}

fn push_record<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push('\n');
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larvacut_models::Centroid;

    fn entry(name: &str) -> LogEntry {
        LogEntry::new(name, "/data/fish.avi", 160, Centroid::new(310, 42))
    }

    #[test]
    fn test_empty_log_has_only_header() {
        let log = MetadataLog::new();
        assert_eq!(
            String::from_utf8(log.serialize()).unwrap(),
            "movie_name,parent_video,frame,coordinates,comments,label\n"
        );
    }

    #[test]
    fn test_rows_quote_coordinates() {
        let mut log = MetadataLog::new();
        log.add(entry("fish_f160_x310_y42.avi"));
        let csv = String::from_utf8(log.serialize()).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(row, "fish_f160_x310_y42.avi,/data/fish.avi,160,\"(310, 42)\",,");
    }

    #[test]
    fn test_quotes_are_escaped() {
        let mut log = MetadataLog::new();
        let mut row = entry("a.avi");
        row.comments = "said \"hi\"".to_string();
        row.label = Some("feeding".to_string());
        log.add(row);
        let csv = String::from_utf8(log.serialize()).unwrap();
        assert!(csv.ends_with(",\"said \"\"hi\"\"\",feeding\n"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut log = MetadataLog::new();
        log.add(entry("a.avi"));
        log.add(entry("b.avi"));

        assert!(log.remove("a.avi"));
        assert!(!log.remove("a.avi"));
        assert!(!log.remove("never-added.avi"));
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].movie_name, "b.avi");
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOG_FILE_NAME);
        let mut log = MetadataLog::new();
        log.add(entry("a.avi"));
        log.write_to(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 2);
    }
}
