//! # Foundry Host Tools
//!
//! Everything the simulation core leaves to its host:
//! - Config and automation file validation
//! - Save files with atomic writes
//! - A headless session runner with offline catch-up and autosave

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod error;
pub mod save;
pub mod session;
pub mod validate;

pub use error::{Result, ToolError};
