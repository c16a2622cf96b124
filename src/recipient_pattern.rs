use crate::signature::{SignatureCatalog, SignatureEntry};
use regex::{Regex, RegexBuilder};

/// Glob-like address pattern used for signature auto-switching.
///
/// `*` matches any run of characters; every other character is literal.
/// Matching is case-insensitive and must cover the whole address.
#[derive(Debug, Clone)]
pub struct RecipientPattern {
    source: String,
    regex: Regex,
}

impl RecipientPattern {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let mut expression = String::from("^(?:");
        for ch in pattern.chars() {
            if ch == '*' {
                expression.push_str(".*");
            } else {
                expression.push_str(&regex::escape(ch.encode_utf8(&mut [0; 4])));
            }
        }
        expression.push_str(")$");

        let regex = RegexBuilder::new(&expression)
            .case_insensitive(true)
            .build()?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Matches a raw recipient, `"Display Name" <address>` forms included.
    pub fn matches(&self, recipient: &str) -> bool {
        self.regex.is_match(bare_address(recipient))
    }
}

/// Extracts the address from `"Display Name" <address>`; other forms are
/// returned as given.
pub fn bare_address(recipient: &str) -> &str {
    match (recipient.find('<'), recipient.rfind('>')) {
        (Some(open), Some(close)) if open < close => &recipient[open + 1..close],
        _ => recipient,
    }
}

/// First catalog entry (catalog order) with a pattern matching any recipient.
pub fn select_by_recipients<'a>(
    recipients: &[String],
    catalog: &'a SignatureCatalog,
) -> Option<&'a SignatureEntry> {
    if recipients.is_empty() {
        return None;
    }

    for entry in catalog.iter() {
        for pattern in &entry.auto_switch_patterns {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                continue;
            }

            let compiled = match RecipientPattern::compile(pattern) {
                Ok(compiled) => compiled,
                Err(e) => {
                    log::warn!(
                        "Skipping auto-switch pattern '{}' of signature '{}': {}",
                        pattern,
                        entry.id,
                        e
                    );
                    continue;
                }
            };

            if let Some(recipient) = recipients.iter().find(|r| compiled.matches(r)) {
                log::debug!(
                    "Recipient '{}' matched pattern '{}' of signature '{}'",
                    recipient,
                    compiled.as_str(),
                    entry.id
                );
                return Some(entry);
            }
        }
    }

    None
}
