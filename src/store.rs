use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::record::{Record, StoreRow, STORE_HEADER};

/// Result of a merge call. `applied == false` means nothing was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub applied: bool,
    pub final_count: usize,
}

/// The ordered, content-deduplicated record file.
pub struct OrderedStore {
    path: PathBuf,
}

impl OrderedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        OrderedStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored record in file order. A missing file is an empty store.
    pub fn load(&self) -> Result<Vec<Record>, StoreError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io { path: self.path.clone(), source });
            }
        };
        let mut reader = csv::Reader::from_reader(file);
        reader
            .deserialize::<StoreRow>()
            .map(|row| row.map(Record::from))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| StoreError::Csv { path: self.path.clone(), source })
    }

    /// Merge a batch into the store, all or nothing.
    ///
    /// The first record whose content key is already stored, or repeats an
    /// earlier record of the same batch, rejects the whole batch. Otherwise
    /// the batch is placed in front of (`insert_mode`) or behind the existing
    /// records, everything is renumbered from 1 and the file is replaced.
    pub fn merge(&self, batch: &[Record], insert_mode: bool) -> Result<MergeOutcome, StoreError> {
        let existing = self.load()?;
        if batch.is_empty() {
            info!("No new records to write");
            return Ok(MergeOutcome { applied: false, final_count: existing.len() });
        }

        let mut keys: HashSet<&str> = existing.iter().map(|r| r.content_key.as_str()).collect();
        for record in batch {
            if !keys.insert(record.content_key.as_str()) {
                warn!(
                    url = %record.source_url,
                    key = %record.content_key,
                    batch = batch.len(),
                    "Duplicate content, discarding batch"
                );
                return Ok(MergeOutcome { applied: false, final_count: existing.len() });
            }
        }

        let merged: Vec<&Record> = if insert_mode {
            batch.iter().chain(existing.iter()).collect()
        } else {
            existing.iter().chain(batch.iter()).collect()
        };

        self.rewrite(&merged)?;
        info!(path = ?self.path, records = merged.len(), "Store updated");
        Ok(MergeOutcome { applied: true, final_count: merged.len() })
    }

    /// Replace the file with header + renumbered rows via temp file and rename.
    fn rewrite(&self, records: &[&Record]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io { path: self.path.clone(), source };
        let csv_err = |source| StoreError::Csv { path: self.path.clone(), source };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(tmp.as_file_mut());
            writer.write_record(STORE_HEADER).map_err(csv_err)?;
            for (i, record) in records.iter().enumerate() {
                writer.serialize(StoreRow::numbered(i + 1, record)).map_err(csv_err)?;
            }
            writer.flush().map_err(io_err)?;
        }
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rec(key: &str, url: &str) -> Record {
        Record {
            content_key: key.to_string(),
            ..Record::unknown(url)
        }
    }

    fn keys(store: &OrderedStore) -> Vec<String> {
        store.load().unwrap().into_iter().map(|r| r.content_key).collect()
    }

    fn numbers(path: &Path) -> Vec<String> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader
            .deserialize::<StoreRow>()
            .map(|r| r.unwrap().sequence)
            .collect()
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = OrderedStore::new(dir.path().join("output.csv"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn append_mode_keeps_arrival_order() {
        let dir = TempDir::new().unwrap();
        let store = OrderedStore::new(dir.path().join("output.csv"));
        let out = store.merge(&[rec("a", "u1"), rec("b", "u2")], false).unwrap();
        assert_eq!(out, MergeOutcome { applied: true, final_count: 2 });
        store.merge(&[rec("c", "u3")], false).unwrap();
        assert_eq!(keys(&store), ["a", "b", "c"]);
    }

    #[test]
    fn insert_mode_puts_batch_first() {
        let dir = TempDir::new().unwrap();
        let store = OrderedStore::new(dir.path().join("output.csv"));
        store.merge(&[rec("a", "u1"), rec("b", "u2")], false).unwrap();
        store.merge(&[rec("c", "u3")], true).unwrap();
        assert_eq!(keys(&store), ["c", "a", "b"]);
    }

    #[test]
    fn numbering_is_dense_after_every_merge() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output.csv");
        let store = OrderedStore::new(&path);
        store.merge(&[rec("a", "u1")], false).unwrap();
        store.merge(&[rec("b", "u2"), rec("c", "u3")], true).unwrap();
        assert_eq!(numbers(&path), ["1", "2", "3"]);
    }

    #[test]
    fn stale_numbers_are_not_carried_over() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output.csv");
        std::fs::write(
            &path,
            "NO.,date,number,title,size,type,magnet,LINK\n\
             7,d,n,t,s,y,magnet:a,u1\n\
             42,d,n,t,s,y,magnet:b,u2\n",
        )
        .unwrap();
        let store = OrderedStore::new(&path);
        store.merge(&[rec("magnet:c", "u3")], false).unwrap();
        assert_eq!(numbers(&path), ["1", "2", "3"]);
    }

    #[test]
    fn collision_with_store_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output.csv");
        let store = OrderedStore::new(&path);
        store.merge(&[rec("a", "u1"), rec("b", "u2")], false).unwrap();
        let before = std::fs::read(&path).unwrap();

        let out = store.merge(&[rec("x", "u3"), rec("b", "u4")], false).unwrap();
        assert_eq!(out, MergeOutcome { applied: false, final_count: 2 });
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn collision_inside_batch_rejects_batch() {
        let dir = TempDir::new().unwrap();
        let store = OrderedStore::new(dir.path().join("output.csv"));
        let out = store.merge(&[rec("a", "u1"), rec("a", "u2")], false).unwrap();
        assert!(!out.applied);
        assert!(!store.path().exists());
    }

    #[test]
    fn empty_batch_performs_no_io() {
        let dir = TempDir::new().unwrap();
        let store = OrderedStore::new(dir.path().join("output.csv"));
        let out = store.merge(&[], true).unwrap();
        assert_eq!(out, MergeOutcome { applied: false, final_count: 0 });
        assert!(!store.path().exists());
    }

    #[test]
    fn header_and_columns_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output.csv");
        let store = OrderedStore::new(&path);
        let record = Record {
            date: "2024-01-02 03:04:05".into(),
            identifier: "ABC-123".into(),
            title: "a, quoted \"title\"".into(),
            category: "无码".into(),
            size_label: "4.2GB".into(),
            content_key: "magnet:?xt=urn:btih:abc".into(),
            source_url: "https://example.com/thread-1.html".into(),
        };
        store.merge(std::slice::from_ref(&record), false).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("NO.,date,number,title,size,type,magnet,LINK\n"));
        assert_eq!(store.load().unwrap(), vec![record]);
    }
}
