use crate::compose::TargetId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

pub const WINDOW_TYPE_MESSAGE_COMPOSE: &str = "messageCompose";

/// Keyboard commands declared by the helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    RemoveNestedQuotes,
    Switch,
    Next,
    Previous,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "removeNestedQuotes" => Ok(Command::RemoveNestedQuotes),
            "switch" => Ok(Command::Switch),
            "next" => Ok(Command::Next),
            "previous" => Ok(Command::Previous),
            other => Err(anyhow::anyhow!("unknown command '{}'", other)),
        }
    }
}

/// Messages sent by the compose popup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum RuntimeMessage {
    /// `"on"` inserts the default signature, anything else removes it.
    SwitchSignature(String),
    InsertSignature(String),
    IsSignaturePresent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceResponse {
    pub result: bool,
}

/// Events delivered by the host to a helper.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// Toolbar button of the compose window.
    ComposeActionClicked { target: TargetId },
    /// Keyboard command for the focused compose window.
    Command { command: Command, target: TargetId },
    MenuClicked { item_id: String, target: TargetId },
    WindowCreated { window_type: String, target: TargetId },
    Message { message: RuntimeMessage, target: TargetId },
    StorageChanged { changes: HashMap<String, Value> },
}

impl HostEvent {
    pub fn is_compose_window(window_type: &str) -> bool {
        window_type == WINDOW_TYPE_MESSAGE_COMPOSE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names() {
        assert_eq!("switch".parse::<Command>().unwrap(), Command::Switch);
        assert_eq!(
            "removeNestedQuotes".parse::<Command>().unwrap(),
            Command::RemoveNestedQuotes
        );
        assert!("reload".parse::<Command>().is_err());
    }

    #[test]
    fn test_runtime_message_wire_format() {
        let message: RuntimeMessage =
            serde_json::from_str(r#"{"type": "insertSignature", "value": "s2"}"#).unwrap();
        assert_eq!(message, RuntimeMessage::InsertSignature("s2".to_string()));

        let message: RuntimeMessage =
            serde_json::from_str(r#"{"type": "isSignaturePresent"}"#).unwrap();
        assert_eq!(message, RuntimeMessage::IsSignaturePresent);

        assert!(serde_json::from_str::<RuntimeMessage>(r#"{"type": "bogus"}"#).is_err());
    }
}
