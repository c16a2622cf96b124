//! Owned document tree for composed HTML bodies.
//!
//! The tree is built from the quick-xml event stream with end-name checks
//! disabled, so ordinary compose HTML (void elements, unclosed paragraphs)
//! is accepted. Every parsed node keeps the exact source text it came from:
//! serializing an untouched tree reproduces the input byte for byte, and a
//! transformed tree only differs where nodes were detached or created.

use quick_xml::escape::{escape, resolve_predefined_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

pub type NodeId = usize;

const ROOT: NodeId = 0;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

#[derive(Debug, Clone)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    /// Source text of the start tag; `None` for created elements.
    open_tag: Option<String>,
    close_tag: Option<String>,
    self_closing: bool,
}

impl Element {
    fn from_tag(tag: &BytesStart<'_>, raw: &str, self_closing: bool) -> Self {
        let name = String::from_utf8_lossy(tag.name().as_ref()).to_ascii_lowercase();
        let attributes = tag
            .html_attributes()
            .filter_map(|attr| attr.ok())
            .map(|attr| {
                (
                    String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase(),
                    String::from_utf8_lossy(&attr.value).into_owned(),
                )
            })
            .collect();

        Self {
            name,
            attributes,
            open_tag: Some(raw.to_string()),
            close_tag: None,
            self_closing,
        }
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(Element),
    /// Character data exactly as written, entities still encoded.
    Text(String),
    /// Comments, doctype, declarations and stray end tags.
    Raw(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    pub fn parse(source: &str) -> Self {
        let mut document = Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        };
        document.parse_into(ROOT, source);
        document
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    /// The `body` element, or the document root for bare fragments.
    pub fn body(&self) -> NodeId {
        self.descendants(ROOT)
            .into_iter()
            .find(|&id| self.name(id) == Some("body"))
            .unwrap_or(ROOT)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// All nodes below `id` in document order, `id` itself excluded.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id].children.iter().rev().copied().collect();

        while let Some(current) = stack.pop() {
            found.push(current);
            stack.extend(self.nodes[current].children.iter().rev());
        }

        found
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element(element) => Some(element.name.as_str()),
            _ => None,
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element(element) => element
                .attributes
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attribute(id, "class")
            .map(|classes| classes.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// Elements carrying `class`, in document order.
    pub fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
        self.descendants(ROOT)
            .into_iter()
            .filter(|&id| self.has_class(id, class))
            .collect()
    }

    /// Decoded character data of every text node below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|node| match &self.nodes[node].kind {
                NodeKind::Text(raw) => Some(decode_text(raw)),
                _ => None,
            })
            .collect()
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in &self.nodes[id].children {
            self.write_node(child, &mut out);
        }
        out
    }

    pub fn to_html(&self) -> String {
        self.inner_html(ROOT)
    }

    /// Removes `id` and its whole subtree from the tree.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&child| child != id);
        }
    }

    /// Creates an unattached element; attach it with [`Document::append_child`].
    pub fn create_element(&mut self, name: &str, attributes: &[(&str, &str)]) -> NodeId {
        let element = Element {
            name: name.to_ascii_lowercase(),
            attributes: attributes
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            open_tag: None,
            close_tag: None,
            self_closing: false,
        };
        self.nodes.push(Node {
            kind: NodeKind::Element(element),
            parent: None,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    /// Parses `html` and appends the resulting nodes to `parent`.
    pub fn append_html(&mut self, parent: NodeId, html: &str) {
        self.parse_into(parent, html);
    }

    /// Appends `text` to `parent` as character data, escaping markup.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        self.push(parent, NodeKind::Text(escape(text).into_owned()));
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    fn parse_into(&mut self, parent: NodeId, source: &str) {
        let mut reader = Reader::from_str(source);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        // Innermost open element last; `parent` itself is never popped.
        let mut open = vec![parent];

        loop {
            let start = reader.buffer_position() as usize;
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("Markup parse error at byte {}: {}", start, e);
                    let rest = &source[start.min(source.len())..];
                    if !rest.is_empty() {
                        let current = open[open.len() - 1];
                        self.push(current, NodeKind::Raw(rest.to_string()));
                    }
                    break;
                }
            };
            let end = reader.buffer_position() as usize;
            let raw = &source[start..end];
            let current = open[open.len() - 1];

            match event {
                Event::Eof => break,
                Event::Start(tag) => {
                    let element = Element::from_tag(&tag, raw, false);
                    let is_void = VOID_ELEMENTS.contains(&element.name.as_str());
                    let id = self.push(current, NodeKind::Element(element));
                    if !is_void {
                        open.push(id);
                    }
                }
                Event::Empty(tag) => {
                    let element = Element::from_tag(&tag, raw, true);
                    self.push(current, NodeKind::Element(element));
                }
                Event::End(tag) => {
                    let name = String::from_utf8_lossy(tag.name().as_ref()).to_ascii_lowercase();
                    let matching = open
                        .iter()
                        .skip(1)
                        .rposition(|&id| self.name(id) == Some(name.as_str()))
                        .map(|position| position + 1);

                    match matching {
                        Some(position) => {
                            if let NodeKind::Element(element) = &mut self.nodes[open[position]].kind {
                                element.close_tag = Some(raw.to_string());
                            }
                            open.truncate(position);
                        }
                        None => {
                            self.push(current, NodeKind::Raw(raw.to_string()));
                        }
                    }
                }
                Event::Text(_) => {
                    self.push(current, NodeKind::Text(raw.to_string()));
                }
                _ => {
                    self.push(current, NodeKind::Raw(raw.to_string()));
                }
            }
        }
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id].kind {
            NodeKind::Document => {
                for &child in &self.nodes[id].children {
                    self.write_node(child, out);
                }
            }
            NodeKind::Text(raw) | NodeKind::Raw(raw) => out.push_str(raw),
            NodeKind::Element(element) => {
                match &element.open_tag {
                    Some(raw) => out.push_str(raw),
                    None => {
                        out.push('<');
                        out.push_str(&element.name);
                        for (key, value) in &element.attributes {
                            out.push(' ');
                            out.push_str(key);
                            out.push_str("=\"");
                            out.push_str(&escape(value.as_str()));
                            out.push('"');
                        }
                        out.push_str(if element.self_closing { "/>" } else { ">" });
                    }
                }

                for &child in &self.nodes[id].children {
                    self.write_node(child, out);
                }

                match &element.close_tag {
                    Some(raw) => out.push_str(raw),
                    None if element.open_tag.is_none() && !element.self_closing => {
                        out.push_str("</");
                        out.push_str(&element.name);
                        out.push('>');
                    }
                    None => {}
                }
            }
        }
    }
}

fn decode_text(raw: &str) -> String {
    unescape_with(raw, |entity| {
        resolve_predefined_entity(entity).or(match entity {
            "nbsp" => Some("\u{a0}"),
            _ => None,
        })
    })
    .map(|text| text.into_owned())
    .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"></head>\
        <body><p>Hi,<br>there</p>\n<blockquote type=\"cite\">old <b>text</b></blockquote>\
        <!-- note --></body></html>";

    #[test]
    fn test_untouched_document_round_trips() {
        let document = Document::parse(BODY);
        assert_eq!(document.to_html(), BODY);
    }

    #[test]
    fn test_void_elements_do_not_swallow_siblings() {
        let document = Document::parse("<p>a<br>b</p><p>c</p>");
        let paragraphs: Vec<_> = document
            .descendants(document.root())
            .into_iter()
            .filter(|&id| document.name(id) == Some("p"))
            .collect();

        assert_eq!(paragraphs.len(), 2);
        assert_eq!(document.text_content(paragraphs[0]), "ab");
        assert_eq!(document.text_content(paragraphs[1]), "c");
    }

    #[test]
    fn test_detach_removes_subtree() {
        let mut document = Document::parse(BODY);
        let quote = document
            .descendants(document.root())
            .into_iter()
            .find(|&id| document.name(id) == Some("blockquote"))
            .unwrap();

        assert_eq!(document.attribute(quote, "TYPE"), Some("cite"));
        assert_eq!(document.inner_html(quote), "old <b>text</b>");

        document.detach(quote);
        assert!(!document.to_html().contains("blockquote"));
        assert!(document.to_html().contains("<!-- note -->"));
    }

    #[test]
    fn test_created_element_is_serialized_inside_body() {
        let mut document = Document::parse("<html><body><p>x</p></body></html>");
        let body = document.body();
        let element = document.create_element("pre", &[("class", "moz-signature"), ("cols", "72")]);
        document.append_text(element, "a < b & c");
        document.append_child(body, element);

        assert_eq!(
            document.to_html(),
            "<html><body><p>x</p><pre class=\"moz-signature\" cols=\"72\">a &lt; b &amp; c</pre></body></html>"
        );
        assert_eq!(document.text_content(element), "a < b & c");
        assert!(document.has_class(element, "moz-signature"));
    }

    #[test]
    fn test_append_html_builds_nested_nodes() {
        let mut document = Document::parse("<body></body>");
        let body = document.body();
        let element = document.create_element("div", &[]);
        document.append_html(element, "<i>Bob</i> &amp; co");
        document.append_child(body, element);

        assert_eq!(document.inner_html(element), "<i>Bob</i> &amp; co");
        assert_eq!(document.text_content(element), "Bob & co");
        assert_eq!(document.to_html(), "<body><div><i>Bob</i> &amp; co</div></body>");
    }

    #[test]
    fn test_fragment_without_body_uses_root() {
        let document = Document::parse("<p>plain fragment</p>");
        assert_eq!(document.body(), document.root());
    }

    #[test]
    fn test_stray_end_tag_is_preserved() {
        let source = "<div>a</span>b</div>";
        let document = Document::parse(source);
        assert_eq!(document.to_html(), source);
    }

    #[test]
    fn test_class_matching_is_by_token() {
        let document = Document::parse(
            "<div class=\"x moz-signature\">a</div><div class=\"moz-signature-old\">b</div>",
        );
        let found = document.elements_with_class("moz-signature");
        assert_eq!(found.len(), 1);
        assert_eq!(document.text_content(found[0]), "a");
    }
}
