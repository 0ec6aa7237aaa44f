use chrono::NaiveDateTime;

use crate::record::{Record, UNKNOWN};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Quick health view of the stored dataset.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StoreSummary {
    pub records: usize,
    pub oldest: Option<NaiveDateTime>,
    pub newest: Option<NaiveDateTime>,
    pub undated: usize,
    pub unknown_keys: usize,
    pub unknown_titles: usize,
}

pub fn summarize(records: &[Record]) -> StoreSummary {
    let mut s = StoreSummary { records: records.len(), ..StoreSummary::default() };
    for r in records {
        match NaiveDateTime::parse_from_str(&r.date, DATE_FORMAT) {
            Ok(d) => {
                s.oldest = Some(s.oldest.map_or(d, |o| o.min(d)));
                s.newest = Some(s.newest.map_or(d, |n| n.max(d)));
            }
            Err(_) => s.undated += 1,
        }
        if r.content_key == UNKNOWN {
            s.unknown_keys += 1;
        }
        if r.title == UNKNOWN {
            s.unknown_titles += 1;
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dated(date: &str) -> Record {
        Record { date: date.into(), ..Record::unknown("u") }
    }

    #[test]
    fn date_range_ignores_unparsable() {
        let recs = [
            dated("2024-03-01 10:00:00"),
            dated(UNKNOWN),
            dated("2023-12-31 23:59:59"),
            dated("3 天前"),
        ];
        let s = summarize(&recs);
        assert_eq!(s.records, 4);
        assert_eq!(s.undated, 2);
        assert_eq!(s.oldest.unwrap().to_string(), "2023-12-31 23:59:59");
        assert_eq!(s.newest.unwrap().to_string(), "2024-03-01 10:00:00");
        assert_eq!(s.unknown_keys, 4);
    }

    #[test]
    fn empty_store() {
        assert_eq!(summarize(&[]), StoreSummary::default());
    }
}
