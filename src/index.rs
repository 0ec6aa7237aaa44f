use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use tracing::{info, warn};

use crate::error::IndexError;

/// Append-only log of URLs whose records made it into the store.
pub struct SeenIndex {
    path: PathBuf,
    urls: HashSet<String>,
}

impl SeenIndex {
    /// Load the log into memory. A missing file starts an empty index.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, IndexError> {
        let path = path.into();
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = ?path, "URL index not found, starting empty");
                return Ok(SeenIndex { path, urls: HashSet::new() });
            }
            Err(source) => return Err(IndexError::Io { path, source }),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);
        let mut urls = HashSet::new();
        for row in reader.records() {
            let row = row.map_err(|source| IndexError::Csv { path: path.clone(), source })?;
            if let Some(url) = row.get(0).filter(|u| !u.is_empty()) {
                urls.insert(url.to_string());
            }
        }
        info!(path = ?path, urls = urls.len(), "Loaded URL index");
        Ok(SeenIndex { path, urls })
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_seen(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// Append the URLs not yet present, in one write.
    ///
    /// Memory is only updated once the bytes are on disk. A failed write is
    /// truncated back to the previous file length.
    pub fn mark_seen<S: AsRef<str>>(&mut self, urls: &[S]) -> Result<usize, IndexError> {
        let mut queued: HashSet<&str> = HashSet::new();
        let fresh: Vec<&str> = urls
            .iter()
            .map(AsRef::as_ref)
            .filter(|url| !self.urls.contains(*url) && queued.insert(*url))
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        let mut buf = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        for url in &fresh {
            buf.write_record([*url])
                .map_err(|source| IndexError::Csv { path: self.path.clone(), source })?;
        }
        let bytes = buf
            .into_inner()
            .map_err(|e| IndexError::Io { path: self.path.clone(), source: e.into_error() })?;

        self.append(&bytes)
            .map_err(|source| IndexError::Io { path: self.path.clone(), source })?;

        let added = fresh.len();
        self.urls.extend(fresh.into_iter().map(str::to_string));
        info!(path = ?self.path, added, total = self.urls.len(), "URL index updated");
        Ok(added)
    }

    fn append(&self, bytes: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        let before = file.metadata()?.len();

        // A log edited by hand may lack its final newline.
        let mut buf = Vec::with_capacity(bytes.len() + 1);
        if before > 0 && last_byte(&mut file, before)? != b'\n' {
            buf.push(b'\n');
        }
        buf.extend_from_slice(bytes);

        let written = file.write_all(&buf).and_then(|_| file.sync_data());
        if let Err(e) = written {
            // Best effort: drop the partial tail so the log stays line-aligned.
            let _ = file.set_len(before);
            return Err(e);
        }
        Ok(())
    }
}

fn last_byte(file: &mut File, len: u64) -> io::Result<u8> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0])
}
