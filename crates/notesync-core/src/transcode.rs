//! Conversion between remote rich-markup note bodies and plain text.
//!
//! Markup is parsed into a small [`Node`] tree and flattened to text. The
//! reverse direction does not rebuild structure: local text is escaped and
//! wrapped in a single preformatted block, so styling and lists collapse on
//! the first local edit.

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// First line of every note body written to the remote.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
/// Second line of every note body written to the remote.
pub const DOCTYPE: &str = r#"<!DOCTYPE en-note SYSTEM "http://xml.evernote.com/pub/enml2.dtd">"#;

/// Prefix for a list item line.
const LIST_MARKER: &str = "\t* ";

/// Elements rendered inline (no newline after them).
const INLINE_TAGS: &[&str] = &["b", "i", "strong", "em", "span", "ul"];

/// Elements rendered as list items.
const LIST_ITEM_TAGS: &[&str] = &["li"];

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Malformed markup: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, TranscodeError>;

/// A parsed markup node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Element { tag: String, children: Vec<Node> },
}

impl Node {
    fn element(tag: impl Into<String>) -> Self {
        Node::Element {
            tag: tag.into(),
            children: Vec::new(),
        }
    }

    /// Lowercased tag name, or `None` for text.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Node::Text(_) => None,
            Node::Element { tag, .. } => Some(tag),
        }
    }

    fn push(&mut self, child: Node) {
        if let Node::Element { children, .. } = self {
            children.push(child);
        }
    }
}

/// Parse markup into a tree rooted at an element with an empty tag.
///
/// The declaration, doctype, comments and processing instructions are
/// dropped. Mismatched or stray end tags are tolerated; elements still open at
/// end of input are closed implicitly.
pub fn parse(markup: &str) -> Result<Node> {
    let mut reader = Reader::from_str(markup);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    // stack[0] is the document root
    let mut stack = vec![Node::element("")];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                stack.push(Node::element(tag_name(e.name().as_ref())));
            }
            Ok(Event::Empty(e)) => {
                let node = Node::element(tag_name(e.name().as_ref()));
                push_child(&mut stack, node);
            }
            Ok(Event::End(e)) => {
                let name = tag_name(e.name().as_ref());
                close_element(&mut stack, &name);
            }
            Ok(Event::Text(e)) => {
                let raw = String::from_utf8_lossy(&e);
                push_child(&mut stack, Node::Text(unescape(&raw)));
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                push_child(&mut stack, Node::Text(text));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(TranscodeError::Parse(e.to_string())),
        }
    }

    while stack.len() > 1 {
        if let Some(open) = stack.pop() {
            push_child(&mut stack, open);
        }
    }
    Ok(stack.pop().unwrap_or_else(|| Node::element("")))
}

/// Convert rich markup to plain text.
pub fn markup_to_text(markup: &str) -> Result<String> {
    Ok(render(&parse(markup)?))
}

/// Flatten a node tree to text.
///
/// Text nodes render trimmed. Children of an element are concatenated in
/// document order; list items get a marker, and every child except inline
/// elements is followed by a newline. Each element's result is trimmed.
pub fn render(node: &Node) -> String {
    match node {
        Node::Text(text) => text.trim().to_string(),
        Node::Element { children, .. } => {
            let mut out = String::new();
            for child in children {
                let tag = child.tag();
                if tag.is_some_and(|t| LIST_ITEM_TAGS.contains(&t)) {
                    out.push_str(LIST_MARKER);
                }
                out.push_str(&render(child));
                if !tag.is_some_and(|t| INLINE_TAGS.contains(&t)) {
                    out.push('\n');
                }
            }
            out.trim().to_string()
        }
    }
}

/// Wrap plain text in the remote note envelope.
///
/// Only `<` and `>` are escaped; the envelope must match what the remote
/// service expects byte for byte.
pub fn text_to_markup(text: &str) -> String {
    format!(
        "{XML_DECLARATION}\n{DOCTYPE}\n<en-note><pre>{}</pre></en-note>\n",
        escape(text)
    )
}

/// Drop the declaration and doctype lines at the top of a remote body.
pub fn strip_header(body: &str) -> &str {
    let mut rest = body;
    for _ in 0..2 {
        let line_end = rest.find('\n').map_or(rest.len(), |i| i + 1);
        let line = rest[..line_end].trim_start();
        if line.starts_with("<?xml") || line.starts_with("<!DOCTYPE") {
            rest = &rest[line_end..];
        } else {
            break;
        }
    }
    rest
}

fn escape(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

/// Resolve entity and character references. Unknown names, bare `&` and
/// unterminated references stay verbatim.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let resolved = tail[1..]
            .find(';')
            .and_then(|end| resolve_reference(&tail[1..=end]).map(|text| (text, end + 2)));
        match resolved {
            Some((text, consumed)) => {
                out.push_str(&text);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve_reference(name: &str) -> Option<String> {
    match name.strip_prefix('#') {
        Some(number) => {
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code).map(String::from)
        }
        None => resolve_entity(name).map(str::to_string),
    }
}

fn resolve_entity(entity: &str) -> Option<&'static str> {
    match entity {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        "nbsp" => Some("\u{a0}"),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        "hellip" => Some("\u{2026}"),
        "copy" => Some("\u{a9}"),
        _ => None,
    }
}

fn push_child(stack: &mut [Node], child: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.push(child);
    }
}

/// Close the innermost open element named `name`, closing anything opened
/// after it. An end tag with no matching open element is ignored.
fn close_element(stack: &mut Vec<Node>, name: &str) {
    let Some(pos) = stack
        .iter()
        .skip(1)
        .rposition(|node| node.tag() == Some(name))
        .map(|p| p + 1)
    else {
        return;
    };

    while stack.len() > pos {
        if let Some(open) = stack.pop() {
            push_child(stack, open);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(body: &str) -> String {
        format!("{XML_DECLARATION}\n{DOCTYPE}\n<en-note>{body}</en-note>")
    }

    #[test]
    fn test_envelope_is_exact() {
        let markup = text_to_markup("hello");
        assert_eq!(
            markup,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <!DOCTYPE en-note SYSTEM \"http://xml.evernote.com/pub/enml2.dtd\">\n\
             <en-note><pre>hello</pre></en-note>\n"
        );
    }

    #[test]
    fn test_escapes_angle_brackets_only() {
        let markup = text_to_markup("a < b > c & d");
        assert!(markup.contains("<pre>a &lt; b &gt; c & d</pre>"));
    }

    #[test]
    fn test_block_elements_become_lines() {
        let markup = wrap("<div>First line</div><div>Second line</div><p>Third</p>");
        assert_eq!(
            markup_to_text(&markup).unwrap(),
            "First line\nSecond line\nThird"
        );
    }

    #[test]
    fn test_inline_elements_not_followed_by_newline() {
        let markup = wrap("<div>Buy <b>milk</b> and <i>eggs</i></div>");
        // Text nodes are trimmed, so the spaces around inline tags go away
        assert_eq!(markup_to_text(&markup).unwrap(), "Buy\nmilkand\neggs");
    }

    #[test]
    fn test_list_items_get_marker() {
        let markup = wrap("<div>Groceries</div><div><li>milk</li><li>bread</li></div>");
        assert_eq!(
            markup_to_text(&markup).unwrap(),
            "Groceries\n* milk\n\t* bread"
        );
    }

    #[test]
    fn test_entities_are_resolved() {
        let markup = wrap("<div>fish &amp; chips&nbsp;</div><div>1 &lt; 2</div>");
        assert_eq!(markup_to_text(&markup).unwrap(), "fish & chips\n1 < 2");
    }

    #[test]
    fn test_bare_ampersand_does_not_block_other_entities() {
        let markup = wrap("<div>salt &amp; pepper & &lt;herbs&gt; &#233;&#x41;</div>");
        assert_eq!(
            markup_to_text(&markup).unwrap(),
            "salt & pepper & <herbs> \u{e9}A"
        );
    }

    #[test]
    fn test_local_ampersand_survives_envelope() {
        let text = "R&D <notes>";
        assert_eq!(markup_to_text(&text_to_markup(text)).unwrap(), text);
    }

    #[test]
    fn test_unknown_entity_kept_verbatim() {
        let markup = wrap("<div>caf&eacute;</div>");
        assert_eq!(markup_to_text(&markup).unwrap(), "caf&eacute;");
    }

    #[test]
    fn test_empty_elements_and_stray_end_tags() {
        let markup = wrap("<div>one<br/>two</div></span><div>three");
        assert_eq!(markup_to_text(&markup).unwrap(), "one\n\ntwo\nthree");
    }

    #[test]
    fn test_parse_builds_tree() {
        let tree = parse("<en-note><pre>x</pre></en-note>").unwrap();
        assert_eq!(
            tree,
            Node::Element {
                tag: String::new(),
                children: vec![Node::Element {
                    tag: "en-note".into(),
                    children: vec![Node::Element {
                        tag: "pre".into(),
                        children: vec![Node::Text("x".into())],
                    }],
                }],
            }
        );
    }

    #[test]
    fn test_lossy_transform_is_stable() {
        let original = wrap(
            "<div><b>Plan</b></div><div>step &lt;one&gt;</div><ul><li>a</li><li>b</li></ul>",
        );
        let text = markup_to_text(&original).unwrap();
        let again = markup_to_text(&text_to_markup(&text)).unwrap();
        assert_eq!(again, text);
    }

    #[test]
    fn test_lossy_transform_is_stable_across_shapes() {
        let bodies = [
            "<ul><li>a<ul><li>b</li><li>c</li></ul></li><li>d</li></ul>",
            "<div>Intro <b>bold</b> text</div><p><em>lead</em></p><span>tail</span>",
            "<div>&lt;tag&gt; &amp; &quot;quoted&quot; &nbsp;x&hellip;</div>",
            "<div>caf&eacute; <i>au</i> lait</div>",
            "<div><div><div>deep</div></div>shallow</div><br/><div>after break</div>",
            "",
        ];
        for body in bodies {
            let text = markup_to_text(&wrap(body)).unwrap();
            let again = markup_to_text(&text_to_markup(&text)).unwrap();
            assert_eq!(again, text, "unstable for {body:?}");
        }
    }

    #[test]
    fn test_empty_note_is_empty_text() {
        let body = format!("{XML_DECLARATION}\n{DOCTYPE}\n<en-note/>");
        let text = markup_to_text(&body).unwrap();
        assert_eq!(text, "");
        assert_eq!(markup_to_text(&text_to_markup(&text)).unwrap(), "");
    }

    #[test]
    fn test_local_text_survives_envelope() {
        let text = "line one\n  indented <tag>\nline three";
        assert_eq!(markup_to_text(&text_to_markup(text)).unwrap(), text);
    }

    #[test]
    fn test_strip_header() {
        let body = text_to_markup("hi");
        assert_eq!(strip_header(&body), "<en-note><pre>hi</pre></en-note>\n");
    }

    #[test]
    fn test_strip_header_keeps_unrecognized_lines() {
        // Only declaration and doctype lines count as header
        let body = "<!-- exported -->\n<en-note>x</en-note>";
        assert_eq!(strip_header(body), body);

        let body = format!("{XML_DECLARATION}\n<en-note>x</en-note>\n<div>y</div>");
        assert_eq!(strip_header(&body), "<en-note>x</en-note>\n<div>y</div>");
    }

    #[test]
    fn test_strip_header_leaves_headerless_body() {
        assert_eq!(strip_header("<en-note>x</en-note>"), "<en-note>x</en-note>");
    }
}
