use crate::compose::ComposedMessage;
use crate::markup::{Document, NodeId};

const NEW_LINE: &str = "\n";

/// Result of a reduction; `message` is the input unchanged when nothing
/// was removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub message: ComposedMessage,
    pub changed: bool,
}

/// Removes quoted content nested deeper than `max_depth`.
///
/// A depth of 0 removes every quote.
pub fn reduce(message: &ComposedMessage, max_depth: usize) -> Reduction {
    let reduced = if message.is_plain_text {
        reduce_plain_text(&message.plain_text_body, max_depth)
    } else {
        reduce_markup(&message.body, max_depth)
    };

    match reduced {
        Some(body) => {
            let mut message = message.clone();
            message.apply(message.update_with(body));
            Reduction {
                message,
                changed: true,
            }
        }
        None => Reduction {
            message: message.clone(),
            changed: false,
        },
    }
}

/// `None` when no line can be nested deeper than `max_depth`.
fn quote_prefix(max_depth: usize) -> Option<String> {
    max_depth.checked_add(1).map(|depth| ">".repeat(depth))
}

/// Returns the new body, or `None` when no line was dropped.
pub fn reduce_plain_text(body: &str, max_depth: usize) -> Option<String> {
    let prefix = quote_prefix(max_depth)?;
    let mut dropped = 0;

    let kept: Vec<&str> = body
        .split(NEW_LINE)
        .filter(|line| {
            let keep = !line.starts_with(&prefix);
            if !keep {
                dropped += 1;
            }
            keep
        })
        .collect();

    if dropped == 0 {
        return None;
    }

    log::debug!("Dropped {} plain-text quote lines deeper than {}", dropped, max_depth);
    Some(kept.join(NEW_LINE))
}

fn is_cited_quote(document: &Document, id: NodeId) -> bool {
    document.name(id) == Some("blockquote")
        && document
            .attribute(id, "type")
            .map(|kind| kind.eq_ignore_ascii_case("cite"))
            .unwrap_or(false)
}

/// Cited quotes below `id` that are not nested inside another cited quote
/// below `id`.
fn nearest_cited_quotes(document: &Document, id: NodeId) -> Vec<NodeId> {
    let mut found = Vec::new();
    let mut stack: Vec<NodeId> = document.children(id).iter().rev().copied().collect();

    while let Some(current) = stack.pop() {
        if is_cited_quote(document, current) {
            found.push(current);
        } else {
            stack.extend(document.children(current).iter().rev());
        }
    }

    found
}

fn collect_deletable(
    document: &Document,
    quotes: Vec<NodeId>,
    level: usize,
    max_depth: usize,
    deletable: &mut Vec<NodeId>,
) {
    for quote in quotes {
        if level > max_depth {
            deletable.push(quote);
        } else {
            let nested = nearest_cited_quotes(document, quote);
            collect_deletable(document, nested, level + 1, max_depth, deletable);
        }
    }
}

/// Returns the new body, or `None` when no cited quote was removed.
pub fn reduce_markup(body: &str, max_depth: usize) -> Option<String> {
    let mut document = Document::parse(body);
    let top_level = nearest_cited_quotes(&document, document.root());

    let mut deletable = Vec::new();
    collect_deletable(&document, top_level, 1, max_depth, &mut deletable);

    if deletable.is_empty() {
        return None;
    }

    log::debug!("Removing {} cited quotes deeper than {}", deletable.len(), max_depth);
    for quote in deletable {
        document.detach(quote);
    }

    Some(document.to_html())
}
