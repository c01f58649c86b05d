//! chatrelay - group chat relay with LLM bot participants
//!
//! A TCP relay that fans chat messages out to every connected participant,
//! and bot clients that take turns replying through a completion provider.

pub mod bot;
pub mod chat;
pub mod config;
pub mod error;
pub mod logging;
pub mod provider;
pub mod server;

pub use bot::{BotSession, HistoryEntry, ResponseThrottle, Role, TurnCoordinator, TurnDecision};
pub use chat::{ChatEvent, FrameDecoder, SYSTEM_SENDER};
pub use config::{BotConfig, Config, InboundFraming, LoggingConfig, ServerConfig};
pub use error::{RelayError, Result};
pub use provider::{Provider, ProviderError, ProviderKind, ReplyGenerator};
pub use server::{ConnectionRegistry, RelayServer};
