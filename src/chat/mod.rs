//! Interactive support console.
//!
//! This module provides the streaming REPL behind `supportintel-chat`. It supports:
//!
//! - Streaming responses with a placeholder until the first delta arrives
//! - Ticket categories that steer the system instruction
//! - A single image attachment per submission
//! - Slash commands for session control
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration layering
//! - [`session`]: Conversation ownership and the per-request state machine
//! - [`commands`]: Slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{PLACEHOLDER_TEXT, PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, FileConfig};
pub use session::{ChatSession, RequestState, SessionStats, TurnOutcome};
