//! Chat wire protocol for chatrelay.
//!
//! This module provides:
//! - Chat events and the `SYSTEM` sender tag
//! - The relay → participant frame codec (delimited JSON objects)
//! - Chunked, newline-terminated participant → relay messages

pub mod chunk;
pub mod codec;
mod event;

pub use chunk::{split_chunks, write_chunked, LineAssembler, MESSAGE_TERMINATOR};
pub use codec::{decode, encode, FrameDecoder, FRAME_DELIMITER};
pub use event::{ChatEvent, SYSTEM_SENDER};
