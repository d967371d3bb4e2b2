//! Core domain + application logic for the WhatsApp ordering bot.
//!
//! This crate is framework-agnostic. The WhatsApp Cloud API and the HTTP
//! surface live behind ports (traits) implemented in adapter crates.

pub mod admin;
pub mod catalog;
pub mod config;
pub mod conversation;
pub mod copy;
pub mod dispatch;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod finalizer;
pub mod formatting;
pub mod logging;
pub mod matcher;
pub mod messaging;
pub mod ports;
pub mod scheduler;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
