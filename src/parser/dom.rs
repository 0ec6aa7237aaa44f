use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};

/// Parsed page with the handful of lookups the field rules need.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(markup: &str) -> Self {
        Document { html: Html::parse_document(markup) }
    }

    /// All elements with the given tag, in document order.
    pub fn elements<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        self.html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(move |el| el.value().name() == tag)
    }

    /// First `tag` element whose id starts with `prefix`.
    pub fn find_by_id_prefix<'a>(&'a self, tag: &'a str, prefix: &str) -> Option<ElementRef<'a>> {
        self.find_by_attr(tag, "id", |id| id.starts_with(prefix))
    }

    /// First `tag` element whose `attr` value satisfies `pred`.
    pub fn find_by_attr<'a>(
        &'a self,
        tag: &'a str,
        attr: &str,
        pred: impl Fn(&str) -> bool,
    ) -> Option<ElementRef<'a>> {
        self.elements(tag)
            .find(|el| el.value().attr(attr).is_some_and(&pred))
    }

    /// First `tag` element whose own string contains `needle`. Elements with
    /// mixed or multiple children have no own string and never match.
    pub fn find_by_text<'a>(&'a self, tag: &'a str, needle: &str) -> Option<ElementRef<'a>> {
        self.elements(tag)
            .find(|el| own_string(*el).is_some_and(|t| t.contains(needle)))
    }

    /// First raw text node containing `needle`.
    pub fn find_text_node(&self, needle: &str) -> Option<&str> {
        self.html.tree.root().descendants().find_map(|node| match node.value() {
            Node::Text(text) if text.contains(needle) => Some(&**text),
            _ => None,
        })
    }

    pub fn select_first(&self, selector: &Selector) -> Option<ElementRef<'_>> {
        self.html.select(selector).next()
    }
}

/// First descendant `tag` under `el` (excluding `el` itself) matching `pred`.
pub fn descendant<'a>(
    el: ElementRef<'a>,
    tag: &str,
    pred: impl Fn(ElementRef<'a>) -> bool,
) -> Option<ElementRef<'a>> {
    el.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|d| d.value().name() == tag && pred(*d))
}

/// Text of an element with a single child, descending through single-child
/// wrappers. `None` for empty or mixed content.
pub fn own_string<'a>(el: ElementRef<'a>) -> Option<&'a str> {
    let mut children = el.children();
    let only = children.next()?;
    if children.next().is_some() {
        return None;
    }
    match only.value() {
        Node::Text(text) => Some(&**text),
        Node::Element(_) => ElementRef::wrap(only).and_then(own_string),
        _ => None,
    }
}

/// Text of every descendant node, each trimmed, empty pieces dropped, joined.
pub fn stripped_text(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).filter(|t| !t.is_empty()).collect()
}

pub static BLOCKCODE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.blockcode").unwrap());

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <em id="authorposton123">发表于 <span title="2023-05-06 07:08:09">3 天前</span></em>
        <p id="other">x</p>
        <a href="/f">  ABC-001.torrent </a>
        <div>影片名称：Example</div>
    </body></html>"#;

    #[test]
    fn id_prefix_lookup() {
        let doc = Document::parse(PAGE);
        let em = doc.find_by_id_prefix("em", "authorposton").unwrap();
        assert_eq!(em.value().id(), Some("authorposton123"));
        assert!(doc.find_by_id_prefix("em", "nope").is_none());
    }

    #[test]
    fn attribute_and_descendant_lookup() {
        let doc = Document::parse(PAGE);
        let em = doc.find_by_id_prefix("em", "authorposton").unwrap();
        let span = descendant(em, "span", |s| s.value().attr("title").is_some()).unwrap();
        assert_eq!(span.value().attr("title"), Some("2023-05-06 07:08:09"));
        assert!(doc.find_by_attr("span", "title", |t| t.contains('-')).is_some());
    }

    #[test]
    fn text_lookups() {
        let doc = Document::parse(PAGE);
        let a = doc.find_by_text("a", ".torrent").unwrap();
        assert_eq!(stripped_text(a), "ABC-001.torrent");
        assert_eq!(doc.find_text_node("影片名称"), Some("影片名称：Example"));
    }

    #[test]
    fn own_string_needs_a_single_text_child() {
        let doc = Document::parse(
            r#"<p><a id="mixed"><b>see</b> X.torrent</a><a id="wrap"><b>Y.torrent</b></a><a id="empty"></a></p>"#,
        );
        let by_id = |id: &str| doc.find_by_attr("a", "id", |v| v == id).unwrap();
        assert_eq!(own_string(by_id("mixed")), None);
        assert_eq!(own_string(by_id("wrap")), Some("Y.torrent"));
        assert_eq!(own_string(by_id("empty")), None);
        assert_eq!(doc.find_by_text("a", ".torrent").unwrap().value().id(), Some("wrap"));
    }
}
