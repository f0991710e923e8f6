//! Remote audio playback.
//!
//! Only the remote side's audio is rendered; its video is never shown.
//! The transport keeps at most one playback alive and releases it when the
//! remote audio ends or the call closes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::identity::PeerId;
use crate::media::{CaptureStream, MediaTrack};

use super::types::TransportSignal;

/// Somewhere remote audio can be played.
pub trait AudioOutput: Send + Sync {
    fn play(&self, remote: &PeerId, tracks: Vec<MediaTrack>) -> Box<dyn AudioPlayback>;
}

/// A running playback. Stopping releases the output resource.
pub trait AudioPlayback: Send + Sync {
    fn stop(&mut self);
}

// ---------------------------------------------------------------------------
// Null output
// ---------------------------------------------------------------------------

/// Discards audio but counts playbacks, so leaks are observable.
#[derive(Debug, Default)]
pub struct NullAudioOutput {
    active: Arc<AtomicUsize>,
    started: AtomicUsize,
}

impl NullAudioOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Playbacks started and not yet stopped.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Playbacks ever started.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

impl AudioOutput for NullAudioOutput {
    fn play(&self, remote: &PeerId, tracks: Vec<MediaTrack>) -> Box<dyn AudioPlayback> {
        debug!(%remote, tracks = tracks.len(), "remote audio playback started");
        self.started.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        Box::new(NullPlayback {
            active: Arc::clone(&self.active),
            stopped: false,
        })
    }
}

struct NullPlayback {
    active: Arc<AtomicUsize>,
    stopped: bool,
}

impl AudioPlayback for NullPlayback {
    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for NullPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Remote playback bookkeeping
// ---------------------------------------------------------------------------

/// The playback attached to one call, plus the task watching its tracks.
pub(crate) struct RemotePlayback {
    pub call_id: u64,
    sink: Box<dyn AudioPlayback>,
    watch: JoinHandle<()>,
}

impl RemotePlayback {
    /// Start playing the audio tracks of `stream`. Returns `None` when the
    /// stream carries no audio.
    pub(crate) fn start(
        output: &dyn AudioOutput,
        call_id: u64,
        remote: &PeerId,
        stream: &CaptureStream,
        signal_tx: mpsc::Sender<TransportSignal>,
    ) -> Option<Self> {
        let tracks: Vec<MediaTrack> = stream.audio_tracks().cloned().collect();
        if tracks.is_empty() {
            return None;
        }

        let sink = output.play(remote, tracks.clone());
        let watch = tokio::spawn(async move {
            for track in &tracks {
                track.ended().await;
            }
            let _ = signal_tx
                .send(TransportSignal::RemoteAudioEnded { call_id })
                .await;
        });

        Some(Self {
            call_id,
            sink,
            watch,
        })
    }

    pub(crate) fn release(mut self) {
        self.watch.abort();
        self.sink.stop();
        debug!(call_id = self.call_id, "remote audio playback released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;

    #[test]
    fn null_playback_stops_once() {
        let output = NullAudioOutput::new();
        let mut playback = output.play(&PeerId::from("p"), Vec::new());
        assert_eq!(output.active(), 1);

        playback.stop();
        playback.stop();
        drop(playback);
        assert_eq!(output.active(), 0);
        assert_eq!(output.started(), 1);
    }

    #[tokio::test]
    async fn video_only_stream_gets_no_playback() {
        let output = NullAudioOutput::new();
        let (tx, _rx) = mpsc::channel(4);
        let stream = CaptureStream::new(vec![MediaTrack::new(MediaKind::Video, "v")]);

        assert!(RemotePlayback::start(&output, 1, &PeerId::from("p"), &stream, tx).is_none());
        assert_eq!(output.started(), 0);
    }

    #[tokio::test]
    async fn ended_audio_is_signalled() {
        let output = NullAudioOutput::new();
        let (tx, mut rx) = mpsc::channel(4);
        let stream = CaptureStream::new(vec![MediaTrack::new(MediaKind::Audio, "a")]);

        let playback =
            RemotePlayback::start(&output, 7, &PeerId::from("p"), &stream, tx).unwrap();
        stream.stop();

        let signal = rx.recv().await.unwrap();
        assert!(matches!(signal, TransportSignal::RemoteAudioEnded { call_id: 7 }));
        playback.release();
        assert_eq!(output.active(), 0);
    }
}
