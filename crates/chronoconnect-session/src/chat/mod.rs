//! Text chat over a peer data link.
//!
//! A [`ChatChannel`] holds at most one link. Inbound links are accepted
//! opportunistically and replace whatever was there before. History is
//! append-only and survives link changes.

mod channel;
mod composer;
mod history;
mod link;
mod types;


pub use crate::error::{ChatError, DocumentError};
pub use channel::ChatChannel;
pub use composer::{ChatComposer, SelectedDocument};
pub use history::ChatHistory;
pub use types::{ChatConfig, ChatEvent, ChatLinkState, ChatMessage, ChatSender, ChatSignal};
