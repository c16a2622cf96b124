use crate::compose::{ComposeError, ComposeStore, TargetId};
use crate::config::{ConfigStore, DefaultAction};
use crate::events::{Command, HostEvent, PresenceResponse, RuntimeMessage};
use crate::menu::{self, MenuAction, MenuItem};
use crate::recipient_pattern;
use crate::recipient_watch;
use crate::signature::{self, Direction, SignatureEntry};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureOutcome {
    Updated,
    Unchanged,
    /// Reply to `isSignaturePresent`, also sent when the popup opens.
    Presence(bool),
    MenuRebuilt(Vec<MenuItem>),
    OpenOptions,
    /// A recipient watch was spawned for the new compose window.
    Watching,
    Ignored,
}

impl SignatureOutcome {
    /// Wire reply for the popup, if this outcome answers a presence query.
    pub fn presence_response(&self) -> Option<PresenceResponse> {
        match self {
            SignatureOutcome::Presence(result) => Some(PresenceResponse { result: *result }),
            _ => None,
        }
    }
}

/// Event handler of the signature switch.
pub struct SignatureSwitch<C, S> {
    compose: Arc<C>,
    config: Arc<S>,
    poll_interval: Duration,
}

impl<C, S> Clone for SignatureSwitch<C, S> {
    fn clone(&self) -> Self {
        Self {
            compose: Arc::clone(&self.compose),
            config: Arc::clone(&self.config),
            poll_interval: self.poll_interval,
        }
    }
}

impl<C: ComposeStore + 'static, S: ConfigStore + 'static> SignatureSwitch<C, S> {
    pub fn new(compose: Arc<C>, config: Arc<S>) -> Self {
        Self {
            compose,
            config,
            poll_interval: recipient_watch::DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn menu(&self) -> Vec<MenuItem> {
        menu::signature_menu(&self.config.get_all())
    }

    pub async fn handle(&self, event: HostEvent) -> SignatureOutcome {
        let result = match event {
            HostEvent::ComposeActionClicked { target } => self
                .is_signature_present(&target)
                .await
                .map(SignatureOutcome::Presence),
            HostEvent::Command { command, target } => match command {
                Command::Switch => self.toggle(&target).await.map(updated),
                Command::Next => self.rotate(&target, Direction::Next).await.map(updated),
                Command::Previous => self.rotate(&target, Direction::Previous).await.map(updated),
                Command::RemoveNestedQuotes => Ok(SignatureOutcome::Ignored),
            },
            HostEvent::MenuClicked { item_id, target } => {
                match menu::parse_signature_menu_click(&item_id) {
                    Some(MenuAction::Toggle) => self.toggle(&target).await.map(updated),
                    Some(MenuAction::Insert(id)) => self.insert_signature(&target, &id).await.map(updated),
                    Some(MenuAction::Options) => Ok(SignatureOutcome::OpenOptions),
                    None => Ok(SignatureOutcome::Ignored),
                }
            }
            HostEvent::Message { message, target } => match message {
                RuntimeMessage::SwitchSignature(value) if value == "on" => {
                    self.insert_default_signature(&target).await.map(updated)
                }
                RuntimeMessage::SwitchSignature(_) => self.remove_signature(&target).await.map(updated),
                RuntimeMessage::InsertSignature(id) => {
                    self.insert_signature(&target, &id).await.map(updated)
                }
                RuntimeMessage::IsSignaturePresent => self
                    .is_signature_present(&target)
                    .await
                    .map(SignatureOutcome::Presence),
            },
            HostEvent::WindowCreated {
                window_type,
                target,
            } if HostEvent::is_compose_window(&window_type) => self.on_compose_window(target).await,
            HostEvent::StorageChanged { changes } => match self.config.apply_changes(&changes) {
                Ok(_) => Ok(SignatureOutcome::MenuRebuilt(self.menu())),
                Err(e) => {
                    log::warn!("Ignoring invalid settings change: {}", e);
                    Ok(SignatureOutcome::Ignored)
                }
            },
            HostEvent::WindowCreated { .. } => Ok(SignatureOutcome::Ignored),
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_stale() => {
                log::debug!("{}", e);
                SignatureOutcome::Ignored
            }
            Err(e) => {
                log::error!("Signature operation failed: {}", e);
                SignatureOutcome::Ignored
            }
        }
    }

    async fn on_compose_window(&self, target: TargetId) -> Result<SignatureOutcome, ComposeError> {
        match self.config.get_all().default_action {
            Some(DefaultAction::Insert) => {
                self.insert_default_signature(&target).await?;
            }
            Some(DefaultAction::Remove) => {
                self.remove_signature(&target).await?;
            }
            None => {}
        }

        tokio::spawn(recipient_watch::watch_recipients(
            self.clone(),
            target,
            self.poll_interval,
        ));
        Ok(SignatureOutcome::Watching)
    }

    pub async fn recipients(&self, target: &TargetId) -> Result<Vec<String>, ComposeError> {
        Ok(self.compose.get_details(target).await?.to)
    }

    /// The catalog entry whose signature currently ends the target.
    pub async fn current_signature(&self, target: &TargetId) -> Result<Option<SignatureEntry>, ComposeError> {
        let settings = self.config.get_all();
        let details = self.compose.get_details(target).await?;
        Ok(signature::find_trailing_signature(&details, &settings.signatures).cloned())
    }

    pub async fn is_signature_present(&self, target: &TargetId) -> Result<bool, ComposeError> {
        Ok(self.current_signature(target).await?.is_some())
    }

    /// Replaces the target's signature with `entry`.
    pub async fn apply_signature(&self, target: &TargetId, entry: &SignatureEntry) -> Result<bool, ComposeError> {
        let details = self.compose.get_details(target).await?;
        let body = signature::append_signature(&details, entry);
        if body == details.active_body() {
            return Ok(false);
        }

        self.compose.set_details(target, details.update_with(body)).await?;
        log::info!("Inserted signature '{}' into {}", entry.id, target);
        Ok(true)
    }

    pub async fn insert_signature(&self, target: &TargetId, id: &str) -> Result<bool, ComposeError> {
        let settings = self.config.get_all();
        match settings.signatures.get(id) {
            Some(entry) => self.apply_signature(target, entry).await,
            None => {
                log::debug!("No signature with id '{}'", id);
                Ok(false)
            }
        }
    }

    pub async fn insert_default_signature(&self, target: &TargetId) -> Result<bool, ComposeError> {
        let settings = self.config.get_all();
        match settings.default_signature() {
            Some(entry) => self.apply_signature(target, entry).await,
            None => {
                log::debug!("No default signature configured");
                Ok(false)
            }
        }
    }

    pub async fn remove_signature(&self, target: &TargetId) -> Result<bool, ComposeError> {
        let details = self.compose.get_details(target).await?;
        let body = signature::strip_signature(&details);
        if body == details.active_body() {
            return Ok(false);
        }

        self.compose.set_details(target, details.update_with(body)).await?;
        log::info!("Removed signature from {}", target);
        Ok(true)
    }

    /// Inserts the default signature when none is present, removes it otherwise.
    pub async fn toggle(&self, target: &TargetId) -> Result<bool, ComposeError> {
        if self.is_signature_present(target).await? {
            self.remove_signature(target).await
        } else {
            self.insert_default_signature(target).await
        }
    }

    pub async fn rotate(&self, target: &TargetId, direction: Direction) -> Result<bool, ComposeError> {
        let settings = self.config.get_all();
        let current = self.current_signature(target).await?;
        let next = signature::rotate(
            direction,
            &settings.signatures,
            current.as_ref().map(|entry| entry.id.as_str()),
            settings.default_signature_id.as_deref(),
        );

        match next {
            Some(entry) => self.apply_signature(target, entry).await,
            None => Ok(false),
        }
    }

    /// Inserts the first signature whose auto-switch patterns match a recipient.
    pub async fn auto_switch(&self, target: &TargetId) -> Result<bool, ComposeError> {
        let settings = self.config.get_all();
        let details = self.compose.get_details(target).await?;

        match recipient_pattern::select_by_recipients(&details.to, &settings.signatures) {
            Some(entry) => self.apply_signature(target, entry).await,
            None => Ok(false),
        }
    }
}

fn updated(changed: bool) -> SignatureOutcome {
    if changed {
        SignatureOutcome::Updated
    } else {
        SignatureOutcome::Unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{ComposedMessage, InMemoryComposeStore};
    use crate::config::{Settings, SharedConfig};
    use serde_json::json;
    use std::collections::HashMap;

    type Switch = SignatureSwitch<InMemoryComposeStore, SharedConfig>;

    fn setup(settings: Settings) -> (Arc<InMemoryComposeStore>, Switch) {
        let compose = Arc::new(InMemoryComposeStore::new());
        let switch = SignatureSwitch::new(compose.clone(), Arc::new(SharedConfig::new(settings)));
        (compose, switch)
    }

    fn command(command: Command, target: &TargetId) -> HostEvent {
        HostEvent::Command {
            command,
            target: target.clone(),
        }
    }

    #[tokio::test]
    async fn test_switch_command_toggles_default_signature() {
        let (compose, switch) = setup(Settings::example());
        let target = TargetId::from(1);
        compose.open(target.clone(), ComposedMessage::plain_text("Hello"));

        let outcome = switch.handle(command(Command::Switch, &target)).await;
        assert_eq!(outcome, SignatureOutcome::Updated);
        assert_eq!(compose.snapshot(&target).unwrap().plain_text_body, "Hello\n-- \nJane");

        let outcome = switch.handle(command(Command::Switch, &target)).await;
        assert_eq!(outcome, SignatureOutcome::Updated);
        assert_eq!(compose.snapshot(&target).unwrap().plain_text_body, "Hello");
    }

    #[tokio::test]
    async fn test_next_and_previous_rotate_through_catalog() {
        let (compose, switch) = setup(Settings::example());
        let target = TargetId::from(1);
        compose.open(target.clone(), ComposedMessage::plain_text("Hi"));

        // No signature yet: the default ("private") is inserted.
        switch.handle(command(Command::Next, &target)).await;
        assert_eq!(switch.current_signature(&target).await.unwrap().unwrap().id, "private");

        switch.handle(command(Command::Next, &target)).await;
        assert_eq!(switch.current_signature(&target).await.unwrap().unwrap().id, "work");

        switch.handle(command(Command::Previous, &target)).await;
        assert_eq!(switch.current_signature(&target).await.unwrap().unwrap().id, "private");
    }

    #[tokio::test]
    async fn test_popup_messages() {
        let (compose, switch) = setup(Settings::example());
        let target = TargetId::from(3);
        compose.open(target.clone(), ComposedMessage::markup("<html><body><p>x</p></body></html>"));

        let message = |message| HostEvent::Message {
            message,
            target: target.clone(),
        };

        assert_eq!(
            switch.handle(message(RuntimeMessage::IsSignaturePresent)).await,
            SignatureOutcome::Presence(false)
        );
        assert_eq!(
            switch
                .handle(message(RuntimeMessage::InsertSignature("work".to_string())))
                .await,
            SignatureOutcome::Updated
        );
        let outcome = switch.handle(message(RuntimeMessage::IsSignaturePresent)).await;
        assert_eq!(
            serde_json::to_string(&outcome.presence_response().unwrap()).unwrap(),
            r#"{"result":true}"#
        );
        assert_eq!(
            switch
                .handle(message(RuntimeMessage::SwitchSignature("off".to_string())))
                .await,
            SignatureOutcome::Updated
        );
        assert_eq!(
            compose.snapshot(&target).unwrap().body,
            "<html><body><p>x</p></body></html>"
        );
    }

    #[tokio::test]
    async fn test_unknown_signature_id_is_noop() {
        let (compose, switch) = setup(Settings::example());
        let target = TargetId::from(1);
        compose.open(target.clone(), ComposedMessage::plain_text("Hi"));

        let outcome = switch
            .handle(HostEvent::MenuClicked {
                item_id: "signature_switch_missing".to_string(),
                target: target.clone(),
            })
            .await;
        assert_eq!(outcome, SignatureOutcome::Unchanged);
        assert_eq!(compose.snapshot(&target).unwrap().plain_text_body, "Hi");
    }

    #[tokio::test]
    async fn test_toggle_without_default_is_noop() {
        let mut settings = Settings::example();
        settings.default_signature_id = None;
        let (compose, switch) = setup(settings);
        let target = TargetId::from(1);
        compose.open(target.clone(), ComposedMessage::plain_text("Hi"));

        assert_eq!(
            switch.handle(command(Command::Switch, &target)).await,
            SignatureOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn test_auto_switch_by_recipient() {
        let (compose, switch) = setup(Settings::example());
        let target = TargetId::from(1);
        compose.open(
            target.clone(),
            ComposedMessage::plain_text("Hi").with_recipients(&["\"Jane Doe\" <jane@example.com>"]),
        );

        assert!(switch.auto_switch(&target).await.unwrap());
        assert_eq!(switch.current_signature(&target).await.unwrap().unwrap().id, "work");
        // Already in place: nothing to write.
        assert!(!switch.auto_switch(&target).await.unwrap());

        compose.set_recipients(&target, &["jane@other.org"]);
        assert!(!switch.auto_switch(&target).await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_target_is_silent() {
        let (_compose, switch) = setup(Settings::example());
        let outcome = switch.handle(command(Command::Switch, &TargetId::from(404))).await;
        assert_eq!(outcome, SignatureOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_storage_change_rebuilds_menu() {
        let (_compose, switch) = setup(Settings::example());
        let outcome = switch
            .handle(HostEvent::StorageChanged {
                changes: Default::default(),
            })
            .await;
        assert_eq!(outcome, SignatureOutcome::MenuRebuilt(switch.menu()));
    }

    #[tokio::test]
    async fn test_storage_change_switches_default_signature() {
        let (compose, switch) = setup(Settings::example());
        let target = TargetId::from(5);
        compose.open(target.clone(), ComposedMessage::plain_text("Hello"));

        let mut changes = HashMap::new();
        changes.insert("defaultSignature".to_string(), json!("work"));
        changes.insert(
            "signatures".to_string(),
            json!([{"id": "work", "name": "Office", "text": "Jane Doe", "html": ""}]),
        );
        let outcome = switch.handle(HostEvent::StorageChanged { changes }).await;
        assert_eq!(outcome, SignatureOutcome::MenuRebuilt(switch.menu()));
        assert!(switch.menu().iter().any(|item| matches!(
            item,
            MenuItem::Entry { title, .. } if title == "Office"
        )));

        switch.handle(command(Command::Switch, &target)).await;
        assert_eq!(
            compose.snapshot(&target).unwrap().plain_text_body,
            "Hello\n-- \nJane Doe"
        );
    }

    #[tokio::test]
    async fn test_invalid_storage_change_keeps_settings() {
        let (_compose, switch) = setup(Settings::example());
        let before = switch.menu();

        let mut changes = HashMap::new();
        changes.insert("signatures".to_string(), json!("not a list"));
        let outcome = switch.handle(HostEvent::StorageChanged { changes }).await;
        assert_eq!(outcome, SignatureOutcome::Ignored);
        assert_eq!(switch.menu(), before);
    }
}
