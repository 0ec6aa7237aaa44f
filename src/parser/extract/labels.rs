use crate::parser::dom::Document;

pub const TITLE_LABEL: &str = "影片名称";
pub const CATEGORY_LABEL: &str = "是否有码";
pub const SIZE_LABEL: &str = "影片容量";

const FULL_WIDTH_COLON: char = '：';

/// Value of a `标签：值` line. The first text node carrying `label` wins;
/// the value is the segment right after the first full-width colon.
pub fn extract(doc: &Document, label: &str) -> Option<String> {
    let line = doc.find_text_node(label)?;
    let value = line.split(FULL_WIDTH_COLON).nth(1)?.trim();
    Some(value.to_string())
}

pub fn title(doc: &Document) -> Option<String> {
    extract(doc, TITLE_LABEL)
}

pub fn category(doc: &Document) -> Option<String> {
    extract(doc, CATEGORY_LABEL)
}

pub fn size_label(doc: &Document) -> Option<String> {
    extract(doc, SIZE_LABEL)
}
