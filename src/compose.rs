use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Mutex;

/// Identifier of a compose window/tab owned by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub String);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(id: &str) -> Self {
        TargetId(id.to_string())
    }
}

impl From<u64> for TargetId {
    fn from(id: u64) -> Self {
        TargetId(id.to_string())
    }
}

/// The message currently being composed, as the host reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedMessage {
    pub is_plain_text: bool,
    #[serde(default)]
    pub plain_text_body: String,
    /// HTML body; meaningful only when `is_plain_text` is false.
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub to: Vec<String>,
}

impl ComposedMessage {
    pub fn plain_text(body: &str) -> Self {
        Self {
            is_plain_text: true,
            plain_text_body: body.to_string(),
            ..Default::default()
        }
    }

    pub fn markup(body: &str) -> Self {
        Self {
            is_plain_text: false,
            body: body.to_string(),
            ..Default::default()
        }
    }

    pub fn with_recipients(mut self, to: &[&str]) -> Self {
        self.to = to.iter().map(|r| r.to_string()).collect();
        self
    }

    /// The body selected by `is_plain_text`.
    pub fn active_body(&self) -> &str {
        if self.is_plain_text {
            &self.plain_text_body
        } else {
            &self.body
        }
    }

    /// Update replacing the active body with `body`.
    pub fn update_with(&self, body: String) -> ComposeUpdate {
        if self.is_plain_text {
            ComposeUpdate::PlainText(body)
        } else {
            ComposeUpdate::Markup(body)
        }
    }

    pub fn apply(&mut self, update: ComposeUpdate) {
        match update {
            ComposeUpdate::PlainText(body) => self.plain_text_body = body,
            ComposeUpdate::Markup(body) => self.body = body,
        }
    }
}

/// Partial write-back: only the changed body is sent to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComposeUpdate {
    #[serde(rename = "plainTextBody")]
    PlainText(String),
    #[serde(rename = "body")]
    Markup(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("compose target {0} no longer exists")]
    StaleTarget(TargetId),
    #[error("compose target I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("compose target is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ComposeError {
    pub fn is_stale(&self) -> bool {
        matches!(self, ComposeError::StaleTarget(_))
    }
}

/// Host access to compose targets.
pub trait ComposeStore: Send + Sync {
    fn get_details(
        &self,
        target: &TargetId,
    ) -> impl Future<Output = Result<ComposedMessage, ComposeError>> + Send;

    fn set_details(
        &self,
        target: &TargetId,
        update: ComposeUpdate,
    ) -> impl Future<Output = Result<(), ComposeError>> + Send;
}

/// Compose targets held in memory; closing a target makes it stale.
#[derive(Debug, Default)]
pub struct InMemoryComposeStore {
    targets: Mutex<HashMap<TargetId, ComposedMessage>>,
}

impl InMemoryComposeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, target: TargetId, message: ComposedMessage) {
        self.targets.lock().unwrap().insert(target, message);
    }

    pub fn close(&self, target: &TargetId) -> Option<ComposedMessage> {
        self.targets.lock().unwrap().remove(target)
    }

    pub fn snapshot(&self, target: &TargetId) -> Option<ComposedMessage> {
        self.targets.lock().unwrap().get(target).cloned()
    }

    pub fn set_recipients(&self, target: &TargetId, to: &[&str]) {
        if let Some(message) = self.targets.lock().unwrap().get_mut(target) {
            message.to = to.iter().map(|r| r.to_string()).collect();
        }
    }
}

impl ComposeStore for InMemoryComposeStore {
    async fn get_details(&self, target: &TargetId) -> Result<ComposedMessage, ComposeError> {
        self.snapshot(target)
            .ok_or_else(|| ComposeError::StaleTarget(target.clone()))
    }

    async fn set_details(&self, target: &TargetId, update: ComposeUpdate) -> Result<(), ComposeError> {
        let mut targets = self.targets.lock().unwrap();
        let message = targets
            .get_mut(target)
            .ok_or_else(|| ComposeError::StaleTarget(target.clone()))?;
        message.apply(update);
        Ok(())
    }
}

/// Compose targets stored as JSON files; the target id is the file path.
#[derive(Debug, Default)]
pub struct FileComposeStore;

impl FileComposeStore {
    pub fn new() -> Self {
        FileComposeStore
    }

    fn path(target: &TargetId) -> PathBuf {
        PathBuf::from(&target.0)
    }

    async fn read(target: &TargetId) -> Result<ComposedMessage, ComposeError> {
        let content = match tokio::fs::read_to_string(Self::path(target)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ComposeError::StaleTarget(target.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }
}

impl ComposeStore for FileComposeStore {
    async fn get_details(&self, target: &TargetId) -> Result<ComposedMessage, ComposeError> {
        Self::read(target).await
    }

    async fn set_details(&self, target: &TargetId, update: ComposeUpdate) -> Result<(), ComposeError> {
        let mut message = Self::read(target).await?;
        message.apply(update);
        let content = serde_json::to_string_pretty(&message)?;
        tokio::fs::write(Self::path(target), content).await?;
        Ok(())
    }
}
