use crate::parser::dom::{descendant, stripped_text, Document, BLOCKCODE};

/// Substring identifying the downloadable artifact link. Also the readiness
/// marker the retriever waits for.
pub const ARTIFACT_MARKER: &str = ".torrent";

/// Release code: the `.torrent` anchor text minus its file suffix.
pub fn identifier(doc: &Document) -> Option<String> {
    let anchor = doc.find_by_text("a", ARTIFACT_MARKER)?;
    let text = stripped_text(anchor);
    let keep = text.chars().count().saturating_sub(ARTIFACT_MARKER.chars().count());
    let code: String = text.chars().take(keep).collect();
    (!code.is_empty()).then_some(code)
}

/// Magnet link from the first list item of the first code block, lower-cased.
pub fn content_key(doc: &Document) -> Option<String> {
    let block = doc.select_first(&BLOCKCODE)?;
    let item = descendant(block, "li", |_| true)?;
    let key = stripped_text(item).to_lowercase();
    (!key.is_empty()).then_some(key)
}
