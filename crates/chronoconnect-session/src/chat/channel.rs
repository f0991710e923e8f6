//! Chat channel: accepts data links, sends and receives messages, and
//! keeps the history.

use chrono::Local;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::ChatError;
use crate::identity::PeerId;
use crate::protocol::ChatPayload;
use crate::transport::{DataConnection, DataLinkEvent};

use super::composer::ChatComposer;
use super::history::ChatHistory;
use super::link::ChatLink;
use super::types::{format_timestamp, ChatConfig, ChatEvent, ChatLinkState, ChatMessage, ChatSignal};

// ---------------------------------------------------------------------------
// Chat Channel
// ---------------------------------------------------------------------------

pub struct ChatChannel {
    config: ChatConfig,
    link: Option<ChatLink>,
    next_link_id: u64,
    history: ChatHistory,
    composer: ChatComposer,
    signal_tx: mpsc::Sender<ChatSignal>,
}

impl ChatChannel {
    pub fn new(config: ChatConfig) -> (Self, mpsc::Receiver<ChatSignal>) {
        let (signal_tx, signal_rx) = mpsc::channel(64);
        let channel = Self {
            config,
            link: None,
            next_link_id: 0,
            history: ChatHistory::default(),
            composer: ChatComposer::default(),
            signal_tx,
        };
        (channel, signal_rx)
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// State of the current link; `Idle` when there has never been one.
    pub fn state(&self) -> ChatLinkState {
        self.link
            .as_ref()
            .map_or(ChatLinkState::Idle, ChatLink::state)
    }

    pub fn is_open(&self) -> bool {
        self.state() == ChatLinkState::Open
    }

    pub fn remote(&self) -> Option<&PeerId> {
        self.link.as_ref().map(|l| &l.remote)
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn composer(&self) -> &ChatComposer {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut ChatComposer {
        &mut self.composer
    }

    /// Send the composer's draft and clear it. A blank draft is kept and
    /// nothing is sent.
    pub async fn send_draft(&mut self) -> Option<ChatMessage> {
        let text = self.composer.take_draft()?;
        self.send(&text).await
    }

    /// Adopt `conn` as the chat link, closing the previous link first.
    /// Returns the new link id.
    pub fn accept(&mut self, conn: DataConnection) -> u64 {
        if let Some(mut old) = self.link.take() {
            if old.close() {
                info!(link_id = old.id, remote = %old.remote, "replacing chat link");
            }
        }

        self.next_link_id += 1;
        let link_id = self.next_link_id;
        let tx = self.signal_tx.clone();
        let mut events = conn.events;
        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if tx.send(ChatSignal { link_id, event }).await.is_err() {
                    break;
                }
            }
        });

        match ChatLink::connecting(link_id, conn.remote, conn.link, pump) {
            Ok(link) => {
                info!(link_id, remote = %link.remote, "chat link connecting");
                self.link = Some(link);
            }
            Err(e) => warn!(link_id, error = %e, "chat link rejected"),
        }
        link_id
    }

    /// Record a local message and send it if the link is open.
    ///
    /// Blank text is ignored and returns `None`. Otherwise the message is
    /// always added to the history; `delivered` says whether it went out.
    pub async fn send(&mut self, text: &str) -> Option<ChatMessage> {
        if text.trim().is_empty() {
            return None;
        }

        let delivered = match &self.link {
            Some(link) => match link.send(&ChatPayload::new(text)).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(link_id = link.id, error = %e, "chat message kept local");
                    false
                }
            },
            None => {
                debug!("no chat link, message kept local");
                false
            }
        };

        let message = ChatMessage::local(text, self.now(), delivered);
        self.history.push(message.clone());
        Some(message)
    }

    /// Apply one link signal. Signals from replaced links are ignored.
    pub fn handle_signal(&mut self, signal: ChatSignal) -> Option<ChatEvent> {
        let timestamp = self.now();
        let Some(link) = self.link.as_mut().filter(|l| l.id == signal.link_id) else {
            debug!(link_id = signal.link_id, "dropping signal for replaced chat link");
            return None;
        };

        match signal.event {
            DataLinkEvent::Open => match link.transition(ChatLinkState::Open) {
                Ok(()) => {
                    info!(link_id = link.id, remote = %link.remote, "chat link open");
                    Some(ChatEvent::Connected {
                        remote: link.remote.clone(),
                    })
                }
                Err(e) => {
                    warn!(link_id = link.id, error = %e, "ignoring open");
                    None
                }
            },
            DataLinkEvent::Data(value) => match ChatPayload::from_value(value) {
                Ok(payload) => {
                    let message = ChatMessage::remote(payload.text, timestamp);
                    self.history.push(message.clone());
                    Some(ChatEvent::Message(message))
                }
                Err(e) => {
                    warn!(link_id = link.id, error = %e, "dropping unrecognized chat payload");
                    None
                }
            },
            DataLinkEvent::Closed => {
                if !link.close() {
                    return None;
                }
                info!(link_id = link.id, remote = %link.remote, "chat link closed by peer");
                Some(ChatEvent::Disconnected {
                    remote: link.remote.clone(),
                })
            }
            DataLinkEvent::Error(err) => {
                link.close();
                warn!(link_id = link.id, error = %err, "chat link failed");
                Some(ChatEvent::Failed {
                    remote: link.remote.clone(),
                    error: ChatError::Send(err),
                })
            }
        }
    }

    /// Close the current link. Returns `false` if there was nothing open.
    pub fn close(&mut self) -> bool {
        let Some(link) = self.link.as_mut() else {
            return false;
        };
        if !link.close() {
            return false;
        }
        info!(link_id = link.id, remote = %link.remote, "chat link closed");
        true
    }

    fn now(&self) -> String {
        format_timestamp(Local::now(), &self.config.timestamp_format)
    }
}
