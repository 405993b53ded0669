//! Deterministic fakes for the gateway's I/O seams
//!
//! Scripted HTTP answers and recorded backoff delays, so retry and CSRF
//! behavior can be asserted without a server or a wall clock.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::clock::Sleeper;
use crate::error::TransportError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};

#[derive(Debug, Clone)]
enum Scripted {
    Respond(HttpResponse),
    Fail(TransportError),
    /// Held until the gate is notified
    Gated(Arc<Notify>, HttpResponse),
}

#[derive(Debug, Default)]
struct Script {
    queued: VecDeque<Scripted>,
    sticky: Option<Scripted>,
}

/// Transport answering from per-path scripts
///
/// Queued answers are consumed in order; once a path's queue is empty its
/// sticky answer (if any) is repeated. Unscripted paths answer 404. Every
/// request is recorded before it is answered.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, Script>>,
    log: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, path: &str, answer: Scripted) {
        self.scripts
            .lock()
            .entry(path.to_string())
            .or_default()
            .queued
            .push_back(answer);
    }

    /// Answer the next request to `path` once with `response`
    pub fn respond(&self, path: &str, response: HttpResponse) -> &Self {
        self.push(path, Scripted::Respond(response));
        self
    }

    /// Answer every request to `path` with `response` once its queue is empty
    pub fn respond_always(&self, path: &str, response: HttpResponse) -> &Self {
        self.scripts.lock().entry(path.to_string()).or_default().sticky = Some(Scripted::Respond(response));
        self
    }

    /// Fail the next request to `path` below HTTP
    pub fn fail(&self, path: &str, error: TransportError) -> &Self {
        self.push(path, Scripted::Fail(error));
        self
    }

    /// Fail every request to `path` once its queue is empty
    pub fn fail_always(&self, path: &str, error: TransportError) -> &Self {
        self.scripts.lock().entry(path.to_string()).or_default().sticky = Some(Scripted::Fail(error));
        self
    }

    /// Answer the next request to `path` only after `gate` is notified
    pub fn respond_gated(&self, path: &str, gate: Arc<Notify>, response: HttpResponse) -> &Self {
        self.push(path, Scripted::Gated(gate, response));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.log.lock().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.log
            .lock()
            .iter()
            .filter(|request| request.path == path)
            .cloned()
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.log.lock().iter().filter(|request| request.path == path).count()
    }

    pub fn count_method(&self, method: Method, path: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|request| request.method == method && request.path == path)
            .count()
    }

    pub fn total(&self) -> usize {
        self.log.lock().len()
    }

    fn next_answer(&self, path: &str) -> Option<Scripted> {
        let mut scripts = self.scripts.lock();
        let script = scripts.get_mut(path)?;
        script.queued.pop_front().or_else(|| script.sticky.clone())
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let path = request.path.clone();
        self.log.lock().push(request);

        match self.next_answer(&path) {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(error)) => Err(error),
            Some(Scripted::Gated(gate, response)) => {
                gate.notified().await;
                Ok(response)
            }
            None => Ok(HttpResponse::empty(404)),
        }
    }
}

/// Sleeper that records requested delays and returns immediately
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn get(path: &str) -> HttpRequest {
        HttpRequest {
            method: Method::Get,
            path: path.to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_queue_then_sticky_then_404() {
        let transport = ScriptedTransport::new();
        transport
            .respond("/a", HttpResponse::empty(401))
            .respond_always("/a", HttpResponse::empty(200));

        assert_eq!(transport.send(get("/a")).await.unwrap().status, 401);
        assert_eq!(transport.send(get("/a")).await.unwrap().status, 200);
        assert_eq!(transport.send(get("/a")).await.unwrap().status, 200);
        assert_eq!(transport.send(get("/b")).await.unwrap().status, 404);
        assert_eq!(transport.count("/a"), 3);
        assert_eq!(transport.total(), 4);
    }

    #[tokio::test]
    async fn test_gated_response_waits_for_release() {
        let transport = Arc::new(ScriptedTransport::new());
        let gate = Arc::new(Notify::new());
        transport.respond_gated("/slow", gate.clone(), HttpResponse::json(200, &Value::Null));

        let pending = tokio::spawn({
            let transport = transport.clone();
            async move { transport.send(get("/slow")).await }
        });
        for _ in 0..10 {
            if transport.count("/slow") == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(transport.count("/slow"), 1, "request is logged before it is answered");

        gate.notify_one();
        assert_eq!(pending.await.unwrap().unwrap().status, 200);
    }
}
