use serde::{Deserialize, Serialize};

/// Placeholder for any field that could not be recovered from the page.
pub const UNKNOWN: &str = "unknown";

/// One extracted thread. Numbering is owned by the store, not the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub date: String,
    pub identifier: String,
    pub title: String,
    pub category: String,
    pub size_label: String,
    pub content_key: String,
    pub source_url: String,
}

impl Record {
    pub fn unknown(source_url: &str) -> Self {
        Record {
            date: UNKNOWN.into(),
            identifier: UNKNOWN.into(),
            title: UNKNOWN.into(),
            category: UNKNOWN.into(),
            size_label: UNKNOWN.into(),
            content_key: UNKNOWN.into(),
            source_url: source_url.to_string(),
        }
    }
}

/// On-disk row of the ordered store. Column names match the existing
/// `output.csv` layout so older datasets keep loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRow {
    #[serde(rename = "NO.")]
    pub sequence: String,
    pub date: String,
    #[serde(rename = "number")]
    pub identifier: String,
    pub title: String,
    #[serde(rename = "size")]
    pub size_label: String,
    #[serde(rename = "type")]
    pub category: String,
    #[serde(rename = "magnet")]
    pub content_key: String,
    #[serde(rename = "LINK")]
    pub source_url: String,
}

pub const STORE_HEADER: [&str; 8] = [
    "NO.", "date", "number", "title", "size", "type", "magnet", "LINK",
];

impl StoreRow {
    pub fn numbered(seq: usize, r: &Record) -> Self {
        StoreRow {
            sequence: seq.to_string(),
            date: r.date.clone(),
            identifier: r.identifier.clone(),
            title: r.title.clone(),
            size_label: r.size_label.clone(),
            category: r.category.clone(),
            content_key: r.content_key.clone(),
            source_url: r.source_url.clone(),
        }
    }
}

impl From<StoreRow> for Record {
    // Stored numbers are dropped; they are recomputed on every write.
    fn from(row: StoreRow) -> Self {
        Record {
            date: row.date,
            identifier: row.identifier,
            title: row.title,
            category: row.category,
            size_label: row.size_label,
            content_key: row.content_key,
            source_url: row.source_url,
        }
    }
}
