//! Interlude Core - Types, ledger, event model, and error handling

pub mod config;
pub mod error;
pub mod event;
pub mod ledger;
pub mod types;

pub use config::*;
pub use error::{Error, Result};
pub use event::*;
pub use ledger::Ledger;
pub use types::*;
