#[allow(clippy::module_inception)]
pub mod log;
pub mod record;

pub use log::InteractionLog;
pub use record::{TurnKind, TurnRecord};
