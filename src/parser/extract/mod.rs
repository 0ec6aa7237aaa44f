pub mod date;
pub mod labels;
pub mod links;

use tracing::{debug, info};

use super::dom::Document;
use crate::error::ExtractError;
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Date,
    Identifier,
    Title,
    Category,
    SizeLabel,
    ContentKey,
}

type Rule = fn(&Document) -> Option<String>;

/// Field rules, evaluated independently and in this order.
pub const RULES: [(Field, Rule); 6] = [
    (Field::Date, date::extract),
    (Field::Identifier, links::identifier),
    (Field::Title, labels::title),
    (Field::Category, labels::category),
    (Field::SizeLabel, labels::size_label),
    (Field::ContentKey, links::content_key),
];

impl Record {
    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Date => &mut self.date,
            Field::Identifier => &mut self.identifier,
            Field::Title => &mut self.title,
            Field::Category => &mut self.category,
            Field::SizeLabel => &mut self.size_label,
            Field::ContentKey => &mut self.content_key,
        }
    }
}

/// Build a record from rendered markup. Missing fields become `unknown`;
/// only a blank document is an error.
pub fn extract_record(markup: &str, source_url: &str) -> Result<Record, ExtractError> {
    if markup.trim().is_empty() {
        return Err(ExtractError::EmptyDocument(source_url.to_string()));
    }

    let doc = Document::parse(markup);
    let mut record = Record::unknown(source_url);
    for (field, rule) in RULES {
        match rule(&doc) {
            Some(value) => *record.field_mut(field) = value,
            None => debug!(?field, url = source_url, "Field missing"),
        }
    }

    info!(
        number = %record.identifier,
        title = %record.title,
        size = %record.size_label,
        kind = %record.category,
        magnet = %record.content_key,
        "Extracted record"
    );
    Ok(record)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::UNKNOWN;

    const URL: &str = "https://example.com/thread-1-1-1.html";

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    #[test]
    fn full_thread_page() {
        let r = extract_record(&fixture("thread"), URL).unwrap();
        assert_eq!(r.date, "2024-05-12 21:14:03");
        assert_eq!(r.identifier, "MIDV-512");
        assert_eq!(r.title, "夏日来信");
        assert_eq!(r.category, "有码");
        assert_eq!(r.size_label, "5.8GB");
        assert_eq!(r.content_key, "magnet:?xt=urn:btih:3f2a9c0d8e7b6a5f4e3d2c1b0a9f8e7d6c5b4a39");
        assert_eq!(r.source_url, URL);
    }

    #[test]
    fn missing_title_defaults_only_title() {
        let r = extract_record(&fixture("thread_no_title"), URL).unwrap();
        assert_eq!(r.title, UNKNOWN);
        assert_eq!(r.date, "2024-05-10 09:00:00");
        assert_eq!(r.identifier, "ABP-101");
        assert_eq!(r.category, "无码");
        assert_eq!(r.size_label, "1.2GB");
        assert_eq!(r.content_key, "magnet:?xt=urn:btih:aaaa0000bbbb1111");
    }

    #[test]
    fn unrelated_page_yields_all_unknown() {
        let r = extract_record("<html><body><p>maintenance</p></body></html>", URL).unwrap();
        assert_eq!(r, Record::unknown(URL));
    }

    #[test]
    fn blank_document_is_an_error() {
        assert!(matches!(
            extract_record("  \n ", URL),
            Err(ExtractError::EmptyDocument(_))
        ));
    }

    #[test]
    fn rules_cover_every_field_once() {
        let fields: Vec<Field> = RULES.iter().map(|(f, _)| *f).collect();
        for f in [
            Field::Date,
            Field::Identifier,
            Field::Title,
            Field::Category,
            Field::SizeLabel,
            Field::ContentKey,
        ] {
            assert_eq!(fields.iter().filter(|x| **x == f).count(), 1, "{f:?}");
        }
    }
}
