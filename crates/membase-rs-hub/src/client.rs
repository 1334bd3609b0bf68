//! Hub client: serialized upload queue plus retried conversation reads.

use crate::error::HubError;
use crate::queue::{QueueState, UploadHandle, UploadResult, UploadTask};
use crate::retry::retry_read;
use crate::transport::{HubRequest, HubResponse, HubTransport, ReqwestTransport};
use log::{debug, error, info, warn};
use membase_rs_config::{HubConfig, RetryConfig};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

/// Result of a non-blocking or blocking upload request.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// The hub acknowledged the upload.
    Completed(Value),
    /// The task was queued and will run in the background.
    Queued,
}

impl UploadOutcome {
    /// Status body reported to callers that did not wait.
    pub fn queued_status() -> Value {
        json!({"status": "queued", "message": "Upload task has been queued"})
    }
}

/// Snapshot of the client state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubStatus {
    pub base_url: String,
    pub membase_id: String,
    pub queue_len: usize,
    pub is_processing: bool,
    pub completed_uploads: u64,
    pub failed_uploads: u64,
}

/// Bucket an upload lands in.
///
/// A JSON object payload with a non-empty string `name` uses that name;
/// anything else uses `fallback`.
pub fn resolve_bucket(payload: &str, fallback: &str) -> String {
    serde_json::from_str::<Value>(payload)
        .ok()
        .and_then(|value| {
            value
                .get("name")
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| fallback.to_string())
}

/// Client for the membase hub.
///
/// Cloning is cheap; all clones share the same upload queue.
#[derive(Clone)]
pub struct HubClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: HubConfig,
    transport: Arc<dyn HubTransport>,
    queue: Mutex<QueueState>,
}

impl std::fmt::Debug for HubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubClient")
            .field("base_url", &self.inner.config.base_url)
            .field("membase_id", &self.inner.config.membase_id)
            .finish()
    }
}

impl HubClient {
    /// Create a client over an explicit transport.
    pub fn new(config: HubConfig, transport: Arc<dyn HubTransport>) -> Self {
        info!(
            "hub client created (base_url={}, membase_id={})",
            config.base_url, config.membase_id
        );
        Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                queue: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// Create a client backed by `reqwest`.
    pub fn from_config(config: HubConfig) -> Result<Self, HubError> {
        let transport = ReqwestTransport::new(&config.user_agent)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Bucket used when neither the caller nor the payload names one.
    pub fn default_bucket(&self, owner: &str) -> String {
        if self.inner.config.membase_id.is_empty() {
            owner.to_string()
        } else {
            self.inner.config.membase_id.clone()
        }
    }

    /// Append an upload to the queue and start draining if idle.
    ///
    /// Background draining needs a tokio runtime; without one the task stays
    /// queued until [`HubClient::drain`] runs.
    pub fn enqueue_upload(
        &self,
        owner: &str,
        filename: &str,
        payload: impl Into<String>,
        bucket: Option<&str>,
    ) -> UploadHandle {
        let payload = payload.into();
        let bucket = match bucket {
            Some(bucket) => bucket.to_string(),
            None => resolve_bucket(&payload, &self.default_bucket(owner)),
        };
        let (task, handle) =
            UploadTask::new(owner.to_string(), bucket, filename.to_string(), payload);
        let queue_len = {
            let mut queue = self.inner.queue.lock();
            queue.tasks.push_back(task);
            queue.tasks.len()
        };
        debug!("upload queued (id={filename}, owner={owner}, queue_len={queue_len})");
        self.spawn_drain();
        handle
    }

    /// Queue an upload and optionally wait for the acknowledgement.
    pub async fn upload_hub(
        &self,
        owner: &str,
        filename: &str,
        payload: impl Into<String>,
        bucket: Option<&str>,
        wait: bool,
    ) -> Result<UploadOutcome, HubError> {
        let handle = self.enqueue_upload(owner, filename, payload, bucket);
        if wait {
            handle.wait().await.map(UploadOutcome::Completed)
        } else {
            Ok(UploadOutcome::Queued)
        }
    }

    /// Process queued uploads on the current task until the queue is empty.
    ///
    /// Returns immediately if another drain is already running.
    pub async fn drain(&self) {
        match self.inner.begin_drain() {
            Some(epoch) => self.inner.run_drain(epoch).await,
            None => debug!("upload drain already running or queue empty"),
        }
    }

    /// Resolve once the queue is empty and no upload is running.
    pub async fn wait_for_idle(&self) {
        let interval = self.inner.config.idle_poll_interval();
        loop {
            {
                let queue = self.inner.queue.lock();
                if queue.tasks.is_empty() && !queue.processing && !queue.in_flight {
                    return;
                }
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Conversation ids stored for `owner`, or `None` on failure.
    pub async fn list_conversations(&self, owner: &str) -> Option<Vec<String>> {
        self.list_conversations_with_retry(owner, self.inner.config.retry)
            .await
    }

    pub async fn list_conversations_with_retry(
        &self,
        owner: &str,
        policy: RetryConfig,
    ) -> Option<Vec<String>> {
        let request = self
            .request("api/conversation")
            .form([("owner", owner)]);
        self.read_json("listConversations", request, policy).await
    }

    /// Serialized messages of one conversation, or `None` on failure.
    pub async fn get_conversation(&self, owner: &str, conversation_id: &str) -> Option<Vec<String>> {
        self.get_conversation_with_retry(owner, conversation_id, self.inner.config.retry)
            .await
    }

    pub async fn get_conversation_with_retry(
        &self,
        owner: &str,
        conversation_id: &str,
        policy: RetryConfig,
    ) -> Option<Vec<String>> {
        let request = self
            .request("api/conversation")
            .form([("owner", owner), ("id", conversation_id)]);
        self.read_json("getConversation", request, policy).await
    }

    /// Raw bytes stored under `filename`, or `None` on failure.
    pub async fn download_hub(&self, owner: &str, filename: &str) -> Option<Vec<u8>> {
        let request = self
            .request("api/download")
            .form([("id", filename), ("owner", owner)]);
        match self.send_checked("downloadHub", request).await {
            Ok(response) => {
                debug!(
                    "download completed (id={filename}, bytes={})",
                    response.body.len()
                );
                Some(response.body)
            }
            Err(err) => {
                error!("download failed (id={filename}, owner={owner}): {err}");
                None
            }
        }
    }

    /// Upload a binary file as multipart form data.
    pub async fn upload_data(&self, owner: &str, filename: &str, data: Vec<u8>) -> Option<Value> {
        let request = self.request("api/uploadData").multipart(
            "file",
            filename,
            data,
            [("owner", owner)],
        );
        let result = match self.send_checked("uploadHubData", request).await {
            Ok(response) => response.json::<Value>().map_err(|source| HubError::Decode {
                operation: "uploadHubData".to_string(),
                source,
            }),
            Err(err) => Err(err),
        };
        match result {
            Ok(ack) => {
                info!("data upload completed (id={filename}, owner={owner})");
                Some(ack)
            }
            Err(err) => {
                error!("data upload failed (id={filename}, owner={owner}): {err}");
                None
            }
        }
    }

    pub fn status(&self) -> HubStatus {
        let queue = self.inner.queue.lock();
        HubStatus {
            base_url: self.inner.config.base_url.clone(),
            membase_id: self.inner.config.membase_id.clone(),
            queue_len: queue.tasks.len(),
            is_processing: queue.processing,
            completed_uploads: queue.completed,
            failed_uploads: queue.failed,
        }
    }

    /// Discard pending uploads and release the processing flag.
    ///
    /// Handles of discarded tasks never resolve. An upload already in flight
    /// still finishes, and no other upload starts before it returns.
    pub fn close(&self) {
        let mut queue = self.inner.queue.lock();
        let discarded = queue.tasks.len();
        queue.tasks.clear();
        queue.processing = false;
        queue.epoch = queue.epoch.wrapping_add(1);
        info!("hub client closed (discarded_uploads={discarded})");
    }

    fn spawn_drain(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime available; uploads stay queued until drain() is called");
            return;
        };
        let Some(epoch) = self.inner.begin_drain() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            inner.run_drain(epoch).await;
        });
    }

    fn request(&self, path: &str) -> HubRequest {
        let url = format!("{}/{}", self.inner.config.base_url.trim_end_matches('/'), path);
        HubRequest::post(url).timeout(self.inner.config.timeout())
    }

    async fn send_checked(
        &self,
        operation: &str,
        request: HubRequest,
    ) -> Result<HubResponse, HubError> {
        self.inner.send_checked(operation, request).await
    }

    async fn read_json<T>(&self, operation: &str, request: HubRequest, policy: RetryConfig) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let result = retry_read(operation, policy, move || {
            let request = request.clone();
            async move {
                let response = self.send_checked(operation, request).await?;
                if response.is_null() {
                    return Ok(None);
                }
                response
                    .json::<T>()
                    .map(Some)
                    .map_err(|source| HubError::Decode {
                        operation: operation.to_string(),
                        source,
                    })
            }
        })
        .await;
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                error!("{operation} gave up: {err}");
                None
            }
        }
    }
}

impl ClientInner {
    /// Claim the queue for a drain. Returns the epoch the drain runs under.
    ///
    /// Refused while an upload is in flight, even one whose drain was
    /// closed; that drain picks up the queue once its upload returns.
    fn begin_drain(&self) -> Option<u64> {
        let mut queue = self.queue.lock();
        if queue.processing || queue.in_flight || queue.tasks.is_empty() {
            return None;
        }
        queue.processing = true;
        Some(queue.epoch)
    }

    async fn run_drain(&self, mut epoch: u64) {
        let interval = self.config.upload_interval();
        debug!("upload drain started (epoch={epoch})");
        loop {
            let task = {
                let mut queue = self.queue.lock();
                if queue.epoch != epoch {
                    // Closed since the last task. Continue only if no newer
                    // drain has claimed the queue in the meantime.
                    if queue.processing || queue.tasks.is_empty() {
                        debug!("upload drain stopped by close (epoch={epoch})");
                        return;
                    }
                    queue.processing = true;
                    debug!(
                        "upload drain adopted queue after close (epoch={epoch}, new_epoch={})",
                        queue.epoch
                    );
                    epoch = queue.epoch;
                }
                match queue.tasks.pop_front() {
                    Some(task) => {
                        queue.in_flight = true;
                        task
                    }
                    None => {
                        queue.processing = false;
                        debug!("upload drain finished (epoch={epoch})");
                        return;
                    }
                }
            };

            let result = self.upload(&task).await;
            {
                let mut queue = self.queue.lock();
                queue.in_flight = false;
                match &result {
                    Ok(_) => queue.completed += 1,
                    Err(_) => queue.failed += 1,
                }
            }
            match &result {
                Ok(_) => info!(
                    "upload completed (id={}, owner={}, bucket={})",
                    task.filename, task.owner, task.bucket
                ),
                Err(err) => error!(
                    "upload failed (id={}, owner={}): {err}",
                    task.filename, task.owner
                ),
            }
            task.complete(result);

            if !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
        }
    }

    async fn upload(&self, task: &UploadTask) -> UploadResult {
        let url = format!("{}/api/upload", self.config.base_url.trim_end_matches('/'));
        let request = HubRequest::post(url)
            .timeout(self.config.timeout())
            .json(json!({
                "Owner": task.owner,
                "Bucket": task.bucket,
                "ID": task.filename,
                "Message": task.payload,
            }));
        let response = self.send_checked("uploadHub", request).await?;
        if response.is_null() {
            return Ok(Value::Null);
        }
        response.json::<Value>().map_err(|source| HubError::Decode {
            operation: "uploadHub".to_string(),
            source,
        })
    }

    async fn send_checked(
        &self,
        operation: &str,
        request: HubRequest,
    ) -> Result<HubResponse, HubError> {
        let response = self.transport.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(HubError::from_status(operation, response.status))
        }
    }
}
