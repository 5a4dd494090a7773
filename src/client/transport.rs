//! HTTP transport seam
//!
//! Requests and responses are plain values so the fetch pipeline can replay
//! a request after a token refresh. [`ReqwestTransport`] is the real
//! implementation; tests script a mock.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::AuthStrategy;
use crate::error::{Error, Result};

const USER_AGENT: &str = concat!("villen-player/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    /// Methods that need an anti-forgery token
    pub fn is_state_changing(self) -> bool {
        matches!(self, Method::Post | Method::Delete)
    }
}

#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn delete(url: Url) -> Self {
        Self::new(Method::Delete, url)
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a header, replacing any earlier value of the same name.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self, what: &str) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::decode(what, e))
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Cookie auth keeps HttpOnly session cookies in the client's jar.
    pub fn new(strategy: AuthStrategy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .cookie_store(strategy == AuthStrategy::Cookie)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        tracing::trace!(url = %request.url, status, bytes = body.len(), "HTTP response");
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::{HashMap, VecDeque};

    use parking_lot::Mutex;

    use super::*;

    /// Scripted transport keyed by method and URL path.
    ///
    /// Responses for a route are served in order; the last one repeats.
    /// Unscripted routes answer 404.
    #[derive(Default)]
    pub(crate) struct MockTransport {
        routes: Mutex<HashMap<(Method, String), VecDeque<HttpResponse>>>,
        failures: Mutex<HashMap<(Method, String), String>>,
        delays: Mutex<HashMap<(Method, String), Duration>>,
        log: Mutex<Vec<HttpRequest>>,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn on(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
            self.routes
                .lock()
                .entry((method, path.to_string()))
                .or_default()
                .push_back(HttpResponse::new(status, body.to_string()));
            self
        }

        /// Make the route fail at the network level.
        pub(crate) fn fail(&self, method: Method, path: &str) -> &Self {
            self.failures
                .lock()
                .insert((method, path.to_string()), "connection reset".to_string());
            self
        }

        /// Hold every response on the route for `delay` before answering.
        pub(crate) fn delay(&self, method: Method, path: &str, delay: Duration) -> &Self {
            self.delays.lock().insert((method, path.to_string()), delay);
            self
        }

        pub(crate) fn requests(&self) -> Vec<HttpRequest> {
            self.log.lock().clone()
        }

        pub(crate) fn count(&self, method: Method, path: &str) -> usize {
            self.log
                .lock()
                .iter()
                .filter(|r| r.method == method && r.url.path() == path)
                .count()
        }

        pub(crate) fn last(&self, method: Method, path: &str) -> Option<HttpRequest> {
            self.log
                .lock()
                .iter()
                .rev()
                .find(|r| r.method == method && r.url.path() == path)
                .cloned()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            let key = (request.method, request.url.path().to_string());
            self.log.lock().push(request);

            let delay = self.delays.lock().get(&key).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(reason) = self.failures.lock().get(&key) {
                return Err(Error::Transport(reason.clone()));
            }

            let mut routes = self.routes.lock();
            let response = match routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            };
            Ok(response.unwrap_or_else(|| HttpResponse::new(404, "{}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_post_and_delete_need_csrf() {
        assert!(!Method::Get.is_state_changing());
        assert!(Method::Post.is_state_changing());
        assert!(Method::Delete.is_state_changing());
    }

    #[test]
    fn with_header_replaces_existing_value() {
        let url = Url::parse("https://api.test/api/").unwrap();
        let request = HttpRequest::get(url)
            .with_header("Authorization", "Bearer old")
            .with_header("authorization", "Bearer new");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("Authorization"), Some("Bearer new"));
    }

    #[test]
    fn response_decodes_json_or_reports_shape() {
        let ok = HttpResponse::new(200, r#"{"url":"https://cdn/x.mp3"}"#);
        let value: Value = ok.json("stream").unwrap();
        assert_eq!(value["url"], "https://cdn/x.mp3");

        let bad = HttpResponse::new(200, "<html>");
        assert!(matches!(bad.json::<Value>("stream"), Err(Error::Decode { .. })));
    }
}
