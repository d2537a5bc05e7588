//! Fleet Chat Relay - forward fleet chat log lines to a Discord webhook.

pub mod config;
pub mod display;
pub mod presence;
pub mod relay;
pub mod session;
pub mod watcher;
