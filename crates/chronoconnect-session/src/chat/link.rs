use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::ChatError;
use crate::identity::PeerId;
use crate::protocol::ChatPayload;
use crate::transport::DataLink;

use super::types::ChatLinkState;

/// One data link and its state machine.
pub(crate) struct ChatLink {
    pub id: u64,
    pub remote: PeerId,
    state: ChatLinkState,
    handle: Box<dyn DataLink>,
    pump: JoinHandle<()>,
}

impl ChatLink {
    /// Wrap a freshly opened data link. It starts out `Connecting`.
    pub fn connecting(
        id: u64,
        remote: PeerId,
        handle: Box<dyn DataLink>,
        pump: JoinHandle<()>,
    ) -> Result<Self, ChatError> {
        let mut link = Self {
            id,
            remote,
            state: ChatLinkState::Idle,
            handle,
            pump,
        };
        link.transition(ChatLinkState::Connecting)?;
        Ok(link)
    }

    pub fn state(&self) -> ChatLinkState {
        self.state
    }

    pub fn transition(&mut self, next: ChatLinkState) -> Result<(), ChatError> {
        if !self.state.can_transition_to(next) {
            return Err(ChatError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(link_id = self.id, from = ?self.state, to = ?next, "chat link transition");
        self.state = next;
        Ok(())
    }

    pub async fn send(&self, payload: &ChatPayload) -> Result<(), ChatError> {
        if self.state != ChatLinkState::Open {
            return Err(ChatError::NotOpen);
        }
        self.handle
            .send(payload.to_value())
            .await
            .map_err(ChatError::Send)
    }

    /// Close the link and stop listening to it. Returns `false` if it was
    /// already closed.
    pub fn close(&mut self) -> bool {
        if self.transition(ChatLinkState::Closed).is_err() {
            return false;
        }
        self.handle.close();
        self.pump.abort();
        true
    }
}

impl Drop for ChatLink {
    fn drop(&mut self) {
        self.close();
    }
}
