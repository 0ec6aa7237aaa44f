use std::fs::File;
use std::io;
use std::path::Path;

use tracing::{info, warn};

use crate::error::ConfigError;

const URL_COLUMN: &str = "URL";

/// Read the `URL` column of the input CSV, in file order.
pub fn read_urls(path: &Path) -> Result<Vec<String>, ConfigError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::MissingInput(path.to_path_buf()));
        }
        Err(e) => {
            return Err(ConfigError::Input { path: path.to_path_buf(), source: e.into() });
        }
    };
    let input_err = |source| ConfigError::Input { path: path.to_path_buf(), source };

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
    let column = reader
        .headers()
        .map_err(input_err)?
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == URL_COLUMN)
        .ok_or_else(|| ConfigError::MissingUrlColumn(path.to_path_buf()))?;

    let mut urls = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(input_err)?;
        match row.get(column).map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => urls.push(url.to_string()),
            None => warn!(row = line + 1, "Blank URL cell, skipping"),
        }
    }
    info!(path = ?path, urls = urls.len(), "Loaded input URLs");
    Ok(urls)
}
