use async_trait::async_trait;
use membase_rs_hub::{HubRequest, HubResponse, HubTransport, TransportError};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// A request observed by [`ScriptedTransport`] and when it arrived.
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub request: HubRequest,
    pub at: Instant,
}

/// Transport that replays scripted responses and records every request.
///
/// Scripted responses are consumed in order; once they run out the default
/// response is returned.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HubResponse, TransportError>>>,
    default_response: HubResponse,
    sent: Mutex<Vec<SentRequest>>,
    gate: Option<Arc<Semaphore>>,
    latency: Option<Duration>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_response: HubResponse::ok_json(&json!({"status": "ok"})),
            sent: Mutex::new(Vec::new()),
            gate: None,
            latency: None,
        }
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, response: HubResponse) -> Self {
        self.default_response = response;
        self
    }

    /// Hold every request until [`ScriptedTransport::release`] grants it.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn respond(&self, response: HubResponse) -> &Self {
        self.script.lock().push_back(Ok(response));
        self
    }

    pub fn respond_json(&self, value: Value) -> &Self {
        self.respond(HubResponse::ok_json(&value))
    }

    pub fn respond_status(&self, status: u16) -> &Self {
        self.respond(HubResponse::new(status, Vec::new()))
    }

    pub fn fail(&self, error: TransportError) -> &Self {
        self.script.lock().push_back(Err(error));
        self
    }

    /// Let `count` gated requests proceed.
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// `ID` fields of the uploads seen so far, in arrival order.
    pub fn uploaded_ids(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|sent| sent.request.url.ends_with("/api/upload"))
            .filter_map(|sent| sent.request.json_body())
            .filter_map(|body| body.get("ID").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    /// Gaps between consecutive requests.
    pub fn gaps(&self) -> Vec<Duration> {
        let sent = self.sent.lock();
        sent.windows(2)
            .map(|pair| pair[1].at.duration_since(pair[0].at))
            .collect()
    }
}

#[async_trait]
impl HubTransport for ScriptedTransport {
    async fn send(&self, request: HubRequest) -> Result<HubResponse, TransportError> {
        self.sent.lock().push(SentRequest {
            request,
            at: Instant::now(),
        });
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|err| TransportError::Network(err.to_string()))?;
            permit.forget();
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| Ok(self.default_response.clone()))
    }
}
