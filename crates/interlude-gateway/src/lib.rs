//! Interlude Gateway - HTTP surface, configuration loading and terminal chat

pub mod api;
pub mod config;
pub mod repl;
pub mod server;

pub use config::{apply_overrides, load_config};
pub use server::{
    build_executor, flavoured_router, router, start_gateway, AppState, QUERY_PREFIX, REVIEW_PREFIX,
};
