//! Signature boundary detection, insertion, removal and rotation.
//!
//! Plain-text signatures follow the usenet convention: a line holding only
//! `"-- "` separates the body from the signature. HTML signatures are the
//! last element carrying the `moz-signature` class.

use crate::compose::ComposedMessage;
use crate::markup::{Document, NodeId};
use serde::{Deserialize, Deserializer, Serialize};

pub const PLAIN_TEXT_SEPARATOR: &str = "-- \n";
pub const SIGNATURE_CLASS: &str = "moz-signature";
pub const SIGNATURE_COLUMNS: &str = "72";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub text: String,
    /// Empty means "render `text` inside a `pre` element".
    #[serde(default)]
    pub html: String,
    #[serde(
        default,
        alias = "autoSwitch",
        deserialize_with = "deserialize_patterns"
    )]
    pub auto_switch_patterns: Vec<String>,
}

/// Accepts either a list of patterns or one comma-separated string.
fn deserialize_patterns<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Patterns {
        List(Vec<String>),
        Joined(String),
    }

    let patterns = match Option::<Patterns>::deserialize(deserializer)? {
        Some(Patterns::List(list)) => list,
        Some(Patterns::Joined(joined)) => joined.split(',').map(str::to_string).collect(),
        None => Vec::new(),
    };

    Ok(patterns
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect())
}

/// User signatures in display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureCatalog(Vec<SignatureEntry>);

impl SignatureCatalog {
    pub fn new(entries: Vec<SignatureEntry>) -> Self {
        SignatureCatalog(entries)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignatureEntry> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SignatureEntry> {
        self.0.iter().find(|entry| entry.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.0.iter().position(|entry| entry.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

fn plain_text_signature(text: &str) -> String {
    format!("\n{}{}", PLAIN_TEXT_SEPARATOR, text)
}

fn last_signature_element(document: &Document) -> Option<NodeId> {
    document.elements_with_class(SIGNATURE_CLASS).pop()
}

/// Id of the catalog entry whose signature currently ends the message.
pub fn find_trailing_signature<'a>(
    message: &ComposedMessage,
    catalog: &'a SignatureCatalog,
) -> Option<&'a SignatureEntry> {
    if message.is_plain_text {
        return catalog
            .iter()
            .find(|entry| message.plain_text_body.ends_with(&plain_text_signature(&entry.text)));
    }

    let document = Document::parse(&message.body);
    let element = last_signature_element(&document)?;

    catalog.iter().find(|entry| {
        if entry.html.is_empty() {
            document.text_content(element) == entry.text
        } else {
            document.inner_html(element) == entry.html
        }
    })
}

/// Active body with the trailing signature removed.
pub fn strip_signature(message: &ComposedMessage) -> String {
    if message.is_plain_text {
        let body = &message.plain_text_body;
        let boundary = format!("\n{}", PLAIN_TEXT_SEPARATOR);
        return match body.rfind(&boundary) {
            Some(index) => body[..index].to_string(),
            None => body.clone(),
        };
    }

    let mut document = Document::parse(&message.body);
    match last_signature_element(&document) {
        Some(element) => {
            document.detach(element);
            document.to_html()
        }
        None => message.body.clone(),
    }
}

/// Active body ending with `entry`, replacing any existing signature.
pub fn append_signature(message: &ComposedMessage, entry: &SignatureEntry) -> String {
    let stripped = strip_signature(message);

    if message.is_plain_text {
        return stripped + &plain_text_signature(&entry.text);
    }

    let mut document = Document::parse(&stripped);
    let attributes = [("class", SIGNATURE_CLASS), ("cols", SIGNATURE_COLUMNS)];
    let element = if entry.html.is_empty() {
        let element = document.create_element("pre", &attributes);
        document.append_text(element, &entry.text);
        element
    } else {
        let element = document.create_element("div", &attributes);
        document.append_html(element, &entry.html);
        element
    };

    let body = document.body();
    document.append_child(body, element);
    document.to_html()
}

/// Entry to switch to from `current`.
///
/// Without a current signature this is the default entry. A current id that
/// is no longer in the catalog yields `None`.
pub fn rotate<'a>(
    direction: Direction,
    catalog: &'a SignatureCatalog,
    current: Option<&str>,
    default_id: Option<&str>,
) -> Option<&'a SignatureEntry> {
    let current = match current {
        Some(current) => current,
        None => return default_id.and_then(|id| catalog.get(id)),
    };

    let index = catalog.position(current)?;
    let last = catalog.len() - 1;
    let next = match direction {
        Direction::Next if index == last => 0,
        Direction::Next => index + 1,
        Direction::Previous if index == 0 => last,
        Direction::Previous => index - 1,
    };

    catalog.0.get(next)
}
