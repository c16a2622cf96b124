use crate::compose::{ComposeError, ComposeStore, TargetId};
use crate::config::ConfigStore;
use crate::events::{Command, HostEvent};
use crate::menu::{self, MenuItem, QUOTE_REMOVER_MENU_ID};
use crate::quote_reducer;
use std::sync::Arc;

/// Outcome of one handled event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteRemoverOutcome {
    /// The target was rewritten.
    Reduced,
    Unchanged,
    /// The context menu has to be registered again with these items.
    MenuRebuilt(Vec<MenuItem>),
    Ignored,
}

/// Event handler of the nested quote remover.
pub struct QuoteRemover<C, S> {
    compose: Arc<C>,
    config: Arc<S>,
}

impl<C: ComposeStore, S: ConfigStore> QuoteRemover<C, S> {
    pub fn new(compose: Arc<C>, config: Arc<S>) -> Self {
        Self { compose, config }
    }

    pub fn menu(&self) -> Vec<MenuItem> {
        menu::quote_remover_menu(&self.config.get_all())
    }

    pub async fn handle(&self, event: HostEvent) -> QuoteRemoverOutcome {
        match event {
            HostEvent::ComposeActionClicked { target }
            | HostEvent::Command {
                command: Command::RemoveNestedQuotes,
                target,
            } => self.reduce_target(&target).await,
            HostEvent::MenuClicked { item_id, target } if item_id == QUOTE_REMOVER_MENU_ID => {
                self.reduce_target(&target).await
            }
            HostEvent::WindowCreated {
                window_type,
                target,
            } if HostEvent::is_compose_window(&window_type) => {
                if self.config.get_all().auto_remove {
                    self.reduce_target(&target).await
                } else {
                    QuoteRemoverOutcome::Ignored
                }
            }
            HostEvent::StorageChanged { changes } => {
                if let Err(e) = self.config.apply_changes(&changes) {
                    log::warn!("Ignoring invalid settings change: {}", e);
                    return QuoteRemoverOutcome::Ignored;
                }
                // Keyed on the notification, not on what changed: a store
                // shared with the signature switch may already hold the values.
                let menu_changed = changes
                    .keys()
                    .any(|key| key == "contextMenuEntry" || key == "contextMenuEntryEnabled");
                if menu_changed {
                    QuoteRemoverOutcome::MenuRebuilt(self.menu())
                } else {
                    QuoteRemoverOutcome::Ignored
                }
            }
            _ => QuoteRemoverOutcome::Ignored,
        }
    }

    async fn reduce_target(&self, target: &TargetId) -> QuoteRemoverOutcome {
        match self.remove_nested_quotes(target).await {
            Ok(true) => QuoteRemoverOutcome::Reduced,
            Ok(false) => QuoteRemoverOutcome::Unchanged,
            Err(e) if e.is_stale() => {
                log::debug!("{}", e);
                QuoteRemoverOutcome::Ignored
            }
            Err(e) => {
                log::error!("Failed to remove nested quotes from {}: {}", target, e);
                QuoteRemoverOutcome::Ignored
            }
        }
    }

    /// Reduces the target to the configured depth; returns whether it changed.
    pub async fn remove_nested_quotes(&self, target: &TargetId) -> Result<bool, ComposeError> {
        let max_depth = self.config.get_all().max_allowed_quote_depth;
        let details = self.compose.get_details(target).await?;
        let reduction = quote_reducer::reduce(&details, max_depth);

        if !reduction.changed {
            return Ok(false);
        }

        let update = details.update_with(reduction.message.active_body().to_string());
        self.compose.set_details(target, update).await?;
        log::info!("Removed quotes nested deeper than {} from {}", max_depth, target);
        Ok(true)
    }
}
