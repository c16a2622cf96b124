use crate::compose::{ComposeStore, TargetId};
use crate::config::ConfigStore;
use crate::signature_switch::SignatureSwitch;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polls the recipients of `target` and auto-switches the signature
/// whenever they change. Ends once the target is gone; returns the number
/// of signature switches performed.
pub async fn watch_recipients<C, S>(
    switch: SignatureSwitch<C, S>,
    target: TargetId,
    interval: Duration,
) -> usize
where
    C: ComposeStore + 'static,
    S: ConfigStore + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut previous = String::new();
    let mut switches = 0;

    loop {
        ticker.tick().await;

        let recipients = match switch.recipients(&target).await {
            Ok(recipients) => recipients.join(","),
            Err(e) => {
                log::debug!("Stopping recipient watch: {}", e);
                break;
            }
        };

        if recipients == previous {
            continue;
        }
        log::debug!("Recipients of {} changed to [{}]", target, recipients);
        previous = recipients;

        match switch.auto_switch(&target).await {
            Ok(true) => switches += 1,
            Ok(false) => {}
            Err(e) => {
                log::debug!("Stopping recipient watch: {}", e);
                break;
            }
        }
    }

    switches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{ComposedMessage, InMemoryComposeStore};
    use crate::config::{Settings, SharedConfig};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_watch_switches_on_change_and_stops_when_closed() {
        let compose = Arc::new(InMemoryComposeStore::new());
        let switch = SignatureSwitch::new(
            compose.clone(),
            Arc::new(SharedConfig::new(Settings::example())),
        );
        let target = TargetId::from(5);
        compose.open(target.clone(), ComposedMessage::plain_text("Hi"));

        let handle = tokio::spawn(watch_recipients(
            switch.clone(),
            target.clone(),
            Duration::from_millis(10),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(compose.snapshot(&target).unwrap().plain_text_body, "Hi");

        compose.set_recipients(&target, &["boss@example.com"]);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(
            switch.current_signature(&target).await.unwrap().unwrap().id,
            "work"
        );

        compose.close(&target);
        let switches = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(switches, 1);
    }

    #[tokio::test]
    async fn test_watch_on_missing_target_ends_immediately() {
        let switch = SignatureSwitch::new(
            Arc::new(InMemoryComposeStore::new()),
            Arc::new(SharedConfig::new(Settings::default())),
        );
        let switches = watch_recipients(switch, TargetId::from(1), Duration::from_millis(5)).await;
        assert_eq!(switches, 0);
    }
}
