use crate::signature::{SignatureCatalog, SignatureEntry};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::RwLock;

/// What to do with the signature when a compose window opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultAction {
    Insert,
    Remove,
}

/// Persisted settings of both helpers, keyed as in the host's storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(
        default = "default_max_allowed_quote_depth",
        deserialize_with = "deserialize_depth"
    )]
    pub max_allowed_quote_depth: usize,
    #[serde(default)]
    pub auto_remove: bool,
    #[serde(default = "default_true", alias = "contextMenuEntry")]
    pub context_menu_entry_enabled: bool,
    #[serde(default)]
    pub signatures: SignatureCatalog,
    #[serde(
        default,
        alias = "defaultSignature",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_signature_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_action: Option<DefaultAction>,
}

fn default_max_allowed_quote_depth() -> usize {
    1
}

fn default_true() -> bool {
    true
}

/// The options page stores the depth as a string; accept both forms.
fn deserialize_depth<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Depth {
        Number(usize),
        Text(String),
    }

    match Depth::deserialize(deserializer)? {
        Depth::Number(depth) => Ok(depth),
        Depth::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid quote depth '{}'", text))),
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_allowed_quote_depth: default_max_allowed_quote_depth(),
            auto_remove: false,
            context_menu_entry_enabled: true,
            signatures: SignatureCatalog::default(),
            default_signature_id: None,
            default_action: None,
        }
    }
}

impl Settings {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Parses the host's storage blob.
    pub fn from_storage(blob: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(blob)?)
    }

    pub fn default_signature(&self) -> Option<&SignatureEntry> {
        self.default_signature_id
            .as_deref()
            .and_then(|id| self.signatures.get(id))
    }

    /// Example settings written by `generate-config`.
    pub fn example() -> Self {
        Settings {
            signatures: SignatureCatalog::new(vec![
                SignatureEntry {
                    id: "work".to_string(),
                    name: "Work".to_string(),
                    text: "Jane Doe\nExample Corp".to_string(),
                    html: "<b>Jane Doe</b><br>Example Corp".to_string(),
                    auto_switch_patterns: vec!["*@example.com".to_string()],
                },
                SignatureEntry {
                    id: "private".to_string(),
                    name: "Private".to_string(),
                    text: "Jane".to_string(),
                    html: String::new(),
                    auto_switch_patterns: Vec::new(),
                },
            ]),
            default_signature_id: Some("private".to_string()),
            default_action: Some(DefaultAction::Insert),
            ..Default::default()
        }
    }
}

/// Host storage holding [`Settings`]. Reads are snapshots.
pub trait ConfigStore: Send + Sync {
    fn get_all(&self) -> Settings;

    /// Applies the host's `key -> new value` change notification; a null
    /// value removes the key. Returns the keys whose value actually changed.
    fn apply_changes(&self, changes: &HashMap<String, Value>) -> anyhow::Result<Vec<String>>;
}

/// In-process settings store fed by the host's change notifications.
#[derive(Debug, Default)]
pub struct SharedConfig {
    settings: RwLock<Settings>,
}

impl SharedConfig {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }
}

impl ConfigStore for SharedConfig {
    fn get_all(&self) -> Settings {
        self.settings.read().unwrap().clone()
    }

    fn apply_changes(&self, changes: &HashMap<String, Value>) -> anyhow::Result<Vec<String>> {
        let mut settings = self.settings.write().unwrap();

        let mut blob: Map<String, Value> = match serde_json::to_value(&*settings)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in changes {
            let key = canonical_key(key);
            if value.is_null() {
                blob.remove(key);
            } else {
                blob.insert(key.to_string(), value.clone());
            }
        }

        let updated: Settings = serde_json::from_value(Value::Object(blob))?;
        let changed = changed_keys(&settings, &updated);
        if !changed.is_empty() {
            log::debug!("Settings changed: {}", changed.join(", "));
        }
        *settings = updated;
        Ok(changed)
    }
}

fn canonical_key(key: &str) -> &str {
    match key {
        "contextMenuEntry" => "contextMenuEntryEnabled",
        "defaultSignature" => "defaultSignatureId",
        other => other,
    }
}

fn changed_keys(old: &Settings, new: &Settings) -> Vec<String> {
    let mut changed = Vec::new();
    if old.max_allowed_quote_depth != new.max_allowed_quote_depth {
        changed.push("maxAllowedQuoteDepth".to_string());
    }
    if old.auto_remove != new.auto_remove {
        changed.push("autoRemove".to_string());
    }
    if old.context_menu_entry_enabled != new.context_menu_entry_enabled {
        changed.push("contextMenuEntryEnabled".to_string());
    }
    if old.signatures != new.signatures {
        changed.push("signatures".to_string());
    }
    if old.default_signature_id != new.default_signature_id {
        changed.push("defaultSignatureId".to_string());
    }
    if old.default_action != new.default_action {
        changed.push("defaultAction".to_string());
    }
    changed
}
