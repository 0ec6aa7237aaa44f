use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::parser::dom::{descendant, stripped_text, Document};

static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}").unwrap());

const POST_TIME_ID_PREFIX: &str = "authorposton";
const POSTED_LABEL: &str = "发表于";

/// Post timestamp: the `authorposton*` text when it is a full timestamp,
/// otherwise the `title` of a nested span (relative dates like "3 天前").
pub fn extract(doc: &Document) -> Option<String> {
    let Some(em) = doc.find_by_id_prefix("em", POST_TIME_ID_PREFIX) else {
        debug!("No post time element");
        return None;
    };

    let text = stripped_text(em).replace(POSTED_LABEL, "");
    let text = text.trim();
    if TIMESTAMP_RE.is_match(text) {
        return Some(text.to_string());
    }

    let span = descendant(em, "span", |s| {
        s.value().attr("title").is_some_and(|t| t.contains('-'))
    });
    match span.and_then(|s| s.value().attr("title")) {
        Some(title) => Some(title.trim().to_string()),
        None => {
            debug!(text, "Post time did not match a timestamp");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date_of(body: &str) -> Option<String> {
        extract(&Document::parse(&format!("<html><body>{body}</body></html>")))
    }

    #[test]
    fn absolute_timestamp_is_used_verbatim() {
        let d = date_of(r#"<em id="authorposton991">发表于 2024-03-01 12:34:56</em>"#);
        assert_eq!(d.as_deref(), Some("2024-03-01 12:34:56"));
    }

    #[test]
    fn relative_timestamp_falls_back_to_span_title() {
        let d = date_of(
            r#"<em id="authorposton7">发表于 <span title="2024-02-28 08:00:00">3 天前</span></em>"#,
        );
        assert_eq!(d.as_deref(), Some("2024-02-28 08:00:00"));
    }

    #[test]
    fn unmatched_text_without_span_is_none() {
        assert_eq!(date_of(r#"<em id="authorposton7">发表于 昨天</em>"#), None);
    }

    #[test]
    fn missing_element_is_none() {
        assert_eq!(date_of(r#"<em id="postmessage">2024-03-01 12:34:56</em>"#), None);
    }
}
