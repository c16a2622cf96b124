//! Context-menu models; the host registers them as given.

use crate::config::Settings;

pub const QUOTE_REMOVER_MENU_ID: &str = "nestedquote_remover";
pub const SIGNATURE_MENU_ROOT: &str = "signature_switch";
pub const SIGNATURE_MENU_PREFIX: &str = "signature_switch_";
pub const MENU_ENTRY_ON_OFF: &str = "on-off";

const MAX_TITLE_LENGTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuItem {
    Entry {
        id: String,
        parent_id: Option<String>,
        title: String,
    },
    Separator {
        parent_id: String,
    },
}

impl MenuItem {
    fn entry(id: &str, parent_id: Option<&str>, title: &str) -> Self {
        MenuItem::Entry {
            id: id.to_string(),
            parent_id: parent_id.map(str::to_string),
            title: title.to_string(),
        }
    }

    fn separator() -> Self {
        MenuItem::Separator {
            parent_id: SIGNATURE_MENU_ROOT.to_string(),
        }
    }
}

/// What a signature-switch menu click asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    Toggle,
    Insert(String),
    Options,
}

pub fn quote_remover_menu(settings: &Settings) -> Vec<MenuItem> {
    if settings.context_menu_entry_enabled {
        vec![MenuItem::entry(QUOTE_REMOVER_MENU_ID, None, "Remove nested quotes")]
    } else {
        Vec::new()
    }
}

pub fn signature_menu(settings: &Settings) -> Vec<MenuItem> {
    let root = Some(SIGNATURE_MENU_ROOT);
    let mut items = vec![
        MenuItem::entry(SIGNATURE_MENU_ROOT, None, "Signature Switch"),
        MenuItem::entry(
            &format!("{}{}", SIGNATURE_MENU_PREFIX, MENU_ENTRY_ON_OFF),
            root,
            "ON/OFF",
        ),
        MenuItem::separator(),
    ];

    if !settings.signatures.is_empty() {
        for signature in settings.signatures.iter() {
            items.push(MenuItem::entry(
                &format!("{}{}", SIGNATURE_MENU_PREFIX, signature.id),
                root,
                &truncate_title(&signature.name, MAX_TITLE_LENGTH),
            ));
        }
        items.push(MenuItem::separator());
    }

    items.push(MenuItem::entry(
        &format!("{}options", SIGNATURE_MENU_PREFIX),
        root,
        "Options",
    ));
    items
}

pub fn parse_signature_menu_click(item_id: &str) -> Option<MenuAction> {
    let rest = item_id.strip_prefix(SIGNATURE_MENU_PREFIX)?;
    match rest {
        MENU_ENTRY_ON_OFF => Some(MenuAction::Toggle),
        "options" => Some(MenuAction::Options),
        "" => None,
        id => Some(MenuAction::Insert(id.to_string())),
    }
}

fn truncate_title(title: &str, length: usize) -> String {
    if title.chars().count() <= length {
        return title.to_string();
    }
    let truncated: String = title.chars().take(length).collect();
    format!("{}...", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_remover_menu_follows_setting() {
        let mut settings = Settings::default();
        assert_eq!(quote_remover_menu(&settings).len(), 1);

        settings.context_menu_entry_enabled = false;
        assert!(quote_remover_menu(&settings).is_empty());
    }

    #[test]
    fn test_signature_menu_lists_catalog() {
        let items = signature_menu(&Settings::example());
        let ids: Vec<_> = items
            .iter()
            .filter_map(|item| match item {
                MenuItem::Entry { id, .. } => Some(id.as_str()),
                MenuItem::Separator { .. } => None,
            })
            .collect();

        assert_eq!(
            ids,
            vec![
                "signature_switch",
                "signature_switch_on-off",
                "signature_switch_work",
                "signature_switch_private",
                "signature_switch_options",
            ]
        );
        assert_eq!(items.len(), 7);
    }

    #[test]
    fn test_truncate_title() {
        assert_eq!(truncate_title("short", 20), "short");
        assert_eq!(
            truncate_title("A very long signature name", 20),
            "A very long signatur..."
        );
    }

    #[test]
    fn test_parse_menu_click() {
        assert_eq!(
            parse_signature_menu_click("signature_switch_on-off"),
            Some(MenuAction::Toggle)
        );
        assert_eq!(
            parse_signature_menu_click("signature_switch_sig_2"),
            Some(MenuAction::Insert("sig_2".to_string()))
        );
        assert_eq!(parse_signature_menu_click("nestedquote_remover"), None);
    }
}
