//! parley: a terminal chat client that streams replies from a chat backend.

pub mod config;
pub mod conversation;
pub mod decoder;
pub mod error;
pub mod logging;
pub mod projection;
pub mod reducer;
pub mod session;
pub mod settings;
pub mod stream;
pub mod transport;
pub mod ui;
pub mod upload;
