//! Session controller: the state machine tying media, transport, and chat
//! together.
//!
//! User intents come in through [`SessionController::handle_intent`];
//! background signals through [`SessionController::handle_signal`]. Both
//! run to completion on the owning task, so no two handlers interleave.
//! Everything a presentation surface needs is emitted as
//! [`SessionEvent`]s or read from [`SessionController::snapshot`].

mod machine;
mod types;

#[cfg(test)]
mod tests;

pub use machine::SessionController;
pub use types::{
    CallState, Collaborators, Intent, Preview, SessionConfig, SessionEvent, SessionSnapshot,
    Signal, NO_CHAT_TO_SUMMARIZE,
};
