//! Core domain + application logic for the feed relay bot.
//!
//! This crate is intentionally framework-agnostic. Telegram delivery and
//! page enrichment live behind ports (traits) implemented in adapter
//! crates; everything here can be driven from tests with stub ports and a
//! mock HTTP server.

pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod extract;
pub mod feed;
pub mod formatting;
pub mod known;
pub mod logging;
pub mod pipeline;
pub mod poller;
pub mod ports;
pub mod registry;
pub mod state;

pub use errors::{Error, Result};
