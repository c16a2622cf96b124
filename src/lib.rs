pub mod compose;
pub mod config;
pub mod events;
pub mod markup;
pub mod menu;
pub mod quote_reducer;
pub mod quote_remover;
pub mod recipient_pattern;
pub mod recipient_watch;
pub mod signature;
pub mod signature_switch;

pub use compose::{ComposeError, ComposeStore, ComposeUpdate, ComposedMessage, TargetId};
pub use config::{ConfigStore, Settings, SharedConfig};
pub use quote_remover::QuoteRemover;
pub use signature::{Direction, SignatureCatalog, SignatureEntry};
pub use signature_switch::SignatureSwitch;
