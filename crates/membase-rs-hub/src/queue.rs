//! Upload queue state and per-task completion handles.

use crate::error::HubError;
use log::debug;
use serde_json::Value;
use std::collections::VecDeque;
use tokio::sync::oneshot::{self, error::TryRecvError};

pub(crate) type UploadResult = Result<Value, HubError>;

/// One pending upload.
#[derive(Debug)]
pub(crate) struct UploadTask {
    pub(crate) owner: String,
    pub(crate) bucket: String,
    pub(crate) filename: String,
    pub(crate) payload: String,
    pub(crate) completion: oneshot::Sender<UploadResult>,
}

impl UploadTask {
    pub(crate) fn new(
        owner: String,
        bucket: String,
        filename: String,
        payload: String,
    ) -> (Self, UploadHandle) {
        let (completion, receiver) = oneshot::channel();
        let task = Self {
            owner,
            bucket,
            filename,
            payload,
            completion,
        };
        (task, UploadHandle::new(receiver))
    }

    /// Deliver the outcome; a dropped handle is not an error.
    pub(crate) fn complete(self, result: UploadResult) {
        if self.completion.send(result).is_err() {
            debug!("upload handle dropped before completion (id={})", self.filename);
        }
    }
}

/// Shared queue state. `processing` is true while a drain owns the queue.
#[derive(Debug, Default)]
pub(crate) struct QueueState {
    pub(crate) tasks: VecDeque<UploadTask>,
    pub(crate) processing: bool,
    /// An upload request is outstanding. Survives `close`.
    pub(crate) in_flight: bool,
    /// Bumped by `close`; a drain started under an older epoch stops.
    pub(crate) epoch: u64,
    pub(crate) completed: u64,
    pub(crate) failed: u64,
}

/// Completion handle for a queued upload.
///
/// Resolves with the hub acknowledgement once the task has been processed.
/// If the task is discarded by `HubClient::close` before it runs, the handle
/// never resolves; use [`UploadHandle::is_abandoned`] to detect that.
#[derive(Debug)]
pub struct UploadHandle {
    receiver: oneshot::Receiver<UploadResult>,
    ready: Option<UploadResult>,
    abandoned: bool,
}

impl UploadHandle {
    fn new(receiver: oneshot::Receiver<UploadResult>) -> Self {
        Self {
            receiver,
            ready: None,
            abandoned: false,
        }
    }

    /// Whether the task was dropped without being processed.
    pub fn is_abandoned(&mut self) -> bool {
        if self.ready.is_none() && !self.abandoned {
            match self.receiver.try_recv() {
                Ok(result) => self.ready = Some(result),
                Err(TryRecvError::Closed) => self.abandoned = true,
                Err(TryRecvError::Empty) => {}
            }
        }
        self.abandoned
    }

    /// Wait for the task to be processed.
    pub async fn wait(self) -> UploadResult {
        if let Some(result) = self.ready {
            return result;
        }
        if !self.abandoned
            && let Ok(result) = self.receiver.await
        {
            return result;
        }
        debug!("upload task abandoned; handle will not resolve");
        std::future::pending().await
    }
}
