use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::shared::frame::RawFrame;

/// Result of handing a frame to the slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The slot was empty.
    Queued,
    /// A frame that had not been picked up yet was discarded.
    Replaced { dropped_sequence: u64 },
}

/// Creates a keep-only-latest hand-off between the frame reader and the
/// pipeline worker.
///
/// At most one frame waits in the slot. Publishing while a frame is still
/// waiting discards the waiting one, so the worker always picks up the most
/// recent frame and no backlog can build up behind slow inference.
pub fn latest_frame_slot() -> (FramePublisher, FrameSubscriber) {
    let (tx, rx) = crossbeam_channel::bounded::<RawFrame>(1);
    (
        FramePublisher {
            tx,
            stale: rx.clone(),
        },
        FrameSubscriber { rx },
    )
}

/// Producer side; owned by the single frame reader.
pub struct FramePublisher {
    tx: Sender<RawFrame>,
    stale: Receiver<RawFrame>,
}

impl FramePublisher {
    pub fn publish(&self, frame: RawFrame) -> PublishOutcome {
        let frame = match self.tx.try_send(frame) {
            Ok(()) => return PublishOutcome::Queued,
            Err(TrySendError::Full(frame)) | Err(TrySendError::Disconnected(frame)) => frame,
        };

        // The waiting frame may be taken by the worker between the two calls;
        // then nothing is dropped.
        let dropped = self.stale.try_recv().ok();
        if let Err(e) = self.tx.try_send(frame) {
            log::warn!(
                "Frame {} discarded: slot unavailable",
                e.into_inner().sequence()
            );
        }
        match dropped {
            Some(old) => PublishOutcome::Replaced {
                dropped_sequence: old.sequence(),
            },
            None => PublishOutcome::Queued,
        }
    }
}

/// Consumer side; owned by the pipeline worker.
pub struct FrameSubscriber {
    rx: Receiver<RawFrame>,
}

impl FrameSubscriber {
    /// Blocks until a frame is available. Returns `None` once the publisher
    /// is gone and the slot is empty.
    pub fn recv(&self) -> Option<RawFrame> {
        self.rx.recv().ok()
    }

    /// Like [`recv`](Self::recv) but gives up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<RawFrame, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Option<RawFrame> {
        self.rx.try_recv().ok()
    }
}
