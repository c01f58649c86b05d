//! Bot participants.
//!
//! A bot is an ordinary relay client whose replies come from a
//! [`ReplyGenerator`](crate::provider::ReplyGenerator). This module holds the
//! turn-taking policy, the response throttle, conversation history and the
//! session that ties them to a relay connection.

mod history;
mod persona;
mod session;
mod throttle;
mod turn;

pub use history::{ConversationHistory, HistoryEntry, Role};
pub use persona::{load_persona, DEFAULT_PERSONA};
pub use session::{apology, connect, BotSession};
pub use throttle::{ResponseSlot, ResponseThrottle};
pub use turn::{TurnCoordinator, TurnDecision};
