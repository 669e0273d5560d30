pub mod backends;
pub mod cli;
pub mod color;
pub mod config;
pub mod error;
pub mod log;
pub mod pipeline;
pub mod service;
pub mod session;
pub mod theme;
pub mod tui;
