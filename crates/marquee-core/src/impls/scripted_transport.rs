//! ScriptedTransport - 開発・テスト用の in-process transport
//!
//! (method, path) ごとに応答を積んでおき、順に返します。
//! 最後の 1 件は使い回される（ステータスのポーリングを想定）。
//! path はマウント位置（既定 `/api`）からの相対で完全一致させる。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::ports::{
    Method, RequestBody, Transport, TransportError, TransportRequest, TransportResponse,
};

#[derive(Debug, Clone)]
enum Scripted {
    Respond(TransportResponse),
    Fail(TransportError),
}

#[derive(Debug, Clone)]
struct Step {
    delay: Option<Duration>,
    outcome: Scripted,
}

#[derive(Debug)]
struct Route {
    method: Method,
    path: String,
    steps: VecDeque<Step>,
}

/// A request as the transport saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub bearer: Option<String>,
    pub body: RequestBody,
}

const DEFAULT_MOUNT: &str = "/api";

#[derive(Debug)]
pub struct ScriptedTransport {
    mount: String,
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::mounted_at(DEFAULT_MOUNT)
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes are matched relative to `mount`, the base URL's path.
    pub fn mounted_at(mount: &str) -> Self {
        Self {
            mount: mount.trim_end_matches('/').to_string(),
            routes: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a JSON response for `method path` (path below the mount, no query).
    pub fn respond(&self, method: Method, path: &str, status: u16, body: serde_json::Value) -> &Self {
        self.push(method, path, None, Scripted::Respond(TransportResponse::new(status, body.to_string())))
    }

    pub fn respond_raw(&self, method: Method, path: &str, status: u16, body: &str) -> &Self {
        self.push(method, path, None, Scripted::Respond(TransportResponse::new(status, body)))
    }

    /// Like `respond`, but the response arrives after `delay`.
    pub fn respond_after(
        &self,
        method: Method,
        path: &str,
        delay: Duration,
        status: u16,
        body: serde_json::Value,
    ) -> &Self {
        self.push(
            method,
            path,
            Some(delay),
            Scripted::Respond(TransportResponse::new(status, body.to_string())),
        )
    }

    pub fn fail(&self, method: Method, path: &str, message: &str) -> &Self {
        self.push(method, path, None, Scripted::Fail(TransportError(message.to_string())))
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn push(&self, method: Method, path: &str, delay: Option<Duration>, outcome: Scripted) -> &Self {
        let mut routes = self
            .routes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let step = Step { delay, outcome };
        match routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
        {
            Some(route) => route.steps.push_back(step),
            None => routes.push(Route {
                method,
                path: path.to_string(),
                steps: VecDeque::from([step]),
            }),
        }
        self
    }

    /// Path below the mount; `None` for URLs outside it.
    fn route_path(&self, url: &str) -> Option<String> {
        let url = reqwest::Url::parse(url).ok()?;
        url.path().strip_prefix(&self.mount).map(str::to_string)
    }

    fn next_step(&self, method: Method, url: &str) -> Option<Step> {
        let path = self.route_path(url)?;
        let mut routes = self
            .routes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let route = routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)?;
        if route.steps.len() > 1 {
            route.steps.pop_front()
        } else {
            route.steps.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(RecordedRequest {
                method: request.method,
                url: request.url.clone(),
                bearer: request.bearer.clone(),
                body: request.body.clone(),
            });

        if let (RequestBody::Multipart(form), Some(report)) = (&request.body, &request.progress) {
            let total = form.bytes.len() as u64;
            report(total / 2, total);
            report(total, total);
        }

        let Some(step) = self.next_step(request.method, &request.url) else {
            return Ok(TransportResponse::new(
                404,
                serde_json::json!({ "message": format!("no route for {} {}", request.method, request.url) })
                    .to_string(),
            ));
        };

        if let Some(delay) = step.delay {
            tokio::time::sleep(delay).await;
        }

        match step.outcome {
            Scripted::Respond(response) => Ok(response),
            Scripted::Fail(err) => Err(err),
        }
    }
}
