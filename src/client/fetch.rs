//! Authenticated request pipeline
//!
//! Wraps the transport with credentials, anti-forgery tokens and a single
//! refresh-and-retry when the backend answers 401 to a logged-in user.

use std::sync::Arc;

use reqwest::Url;
use serde::Deserialize;
use serde_json::json;

use super::session::Session;
use super::transport::{HttpRequest, HttpResponse, Method, Transport};
use crate::config::AuthStrategy;
use crate::error::{Error, Result};

pub const CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Deserialize)]
struct CsrfResponse {
    #[serde(default)]
    csrftoken: String,
}

#[derive(Deserialize)]
struct TokenPair {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

#[derive(Clone)]
pub struct AuthenticatedFetch {
    transport: Arc<dyn Transport>,
    session: Session,
    base: Url,
}

impl AuthenticatedFetch {
    pub fn new(transport: Arc<dyn Transport>, session: Session, base_url: &str) -> Result<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base = Url::parse(&normalized).map_err(|e| Error::Url(e.to_string()))?;
        Ok(Self {
            transport,
            session,
            base,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Resolve a path like `search/` against the API base.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::Url(e.to_string()))
    }

    /// Endpoint built from path segments. Each segment is percent-encoded,
    /// so an id carrying `/`, `?` or `#` stays inside its segment.
    pub fn resource(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Url(format!("{} cannot carry a path", self.base)))?
            .pop_if_empty()
            .extend(segments)
            .push("");
        Ok(url)
    }

    /// Send a request with credentials attached.
    ///
    /// A 401 while a session is active triggers one refresh; on success the
    /// request is replayed exactly once. If the refresh itself is rejected
    /// the session is torn down and the original 401 is returned.
    pub async fn request(&self, request: HttpRequest) -> Result<HttpResponse> {
        let request = self.prepare(request).await;
        let response = self.transport.send(request.clone()).await?;

        if response.status != 401 || !self.session.is_active().await {
            return Ok(response);
        }

        tracing::debug!(path = request.url.path(), "Request unauthorized, refreshing access token");
        if !self.refresh().await {
            return Ok(response);
        }

        let retry = self.attach_bearer(request).await;
        let response = self.transport.send(retry).await?;
        tracing::debug!(status = response.status, "Retried request after refresh");
        Ok(response)
    }

    pub async fn get(&self, path: &str) -> Result<HttpResponse> {
        self.request(HttpRequest::get(self.endpoint(path)?)).await
    }

    async fn prepare(&self, mut request: HttpRequest) -> HttpRequest {
        if request.method.is_state_changing() {
            let token = self.csrf_token().await;
            request = request.with_header(CSRF_HEADER, token);
        }
        self.attach_bearer(request).await
    }

    async fn attach_bearer(&self, request: HttpRequest) -> HttpRequest {
        if self.session.strategy() != AuthStrategy::Bearer {
            return request;
        }
        match self.session.access_token().await {
            Some(token) => request.with_header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Fetch a fresh anti-forgery token. Never cached; a failure yields an
    /// empty token and lets the backend decide.
    pub async fn csrf_token(&self) -> String {
        let url = match self.endpoint("csrf/") {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "Could not build CSRF endpoint");
                return String::new();
            }
        };

        match self.transport.send(HttpRequest::get(url)).await {
            Ok(response) if response.is_success() => match response.json::<CsrfResponse>("csrf token") {
                Ok(body) => body.csrftoken,
                Err(e) => {
                    tracing::warn!(error = %e, "Malformed CSRF response");
                    String::new()
                }
            },
            Ok(response) => {
                tracing::warn!(status = response.status, "CSRF token request rejected");
                String::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "CSRF token request failed");
                String::new()
            }
        }
    }

    /// One refresh attempt, sent straight to the transport so it can never
    /// recurse into the retry logic. Returns whether a retry is worthwhile.
    pub async fn refresh(&self) -> bool {
        let url = match self.endpoint("auth/refresh/") {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "Could not build refresh endpoint");
                return false;
            }
        };

        let mut request = HttpRequest::post(url);
        if self.session.strategy() == AuthStrategy::Bearer {
            let Some(refresh) = self.session.refresh_token().await else {
                tracing::warn!("No refresh token held, ending session");
                self.session.expire().await;
                return false;
            };
            request = request.with_json(json!({ "refresh": refresh }));
        }

        match self.transport.send(request).await {
            Ok(response) if response.status == 401 || response.status == 403 => {
                tracing::warn!(status = response.status, "Refresh rejected");
                self.session.expire().await;
                self.remote_logout().await;
                false
            }
            Ok(response) if response.is_success() => {
                if self.session.strategy() == AuthStrategy::Bearer {
                    match response.json::<TokenPair>("refreshed token") {
                        Ok(pair) => self.session.set_access_token(pair.access).await,
                        Err(e) => {
                            tracing::warn!(error = %e, "Refresh response unusable");
                            return false;
                        }
                    }
                }
                tracing::info!("Access token refreshed");
                true
            }
            Ok(response) => {
                tracing::warn!(status = response.status, "Refresh failed");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Refresh request failed");
                false
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let url = self.endpoint("auth/login/")?;
        let request = HttpRequest::post(url).with_json(json!({
            "username": username,
            "password": password,
        }));
        let response = self.transport.send(self.prepare(request).await).await?;
        if !response.is_success() {
            return Err(Error::Http {
                path: "auth/login/".to_string(),
                status: response.status,
            });
        }

        let (access, refresh) = match self.session.strategy() {
            AuthStrategy::Bearer => {
                let pair: TokenPair = response.json("login tokens")?;
                (Some(pair.access), pair.refresh)
            }
            AuthStrategy::Cookie => (None, None),
        };
        self.session.begin(username.to_string(), access, refresh).await;
        Ok(())
    }

    pub async fn logout(&self) {
        self.remote_logout().await;
        self.session.end().await;
    }

    async fn remote_logout(&self) {
        let Ok(url) = self.endpoint("auth/logout/") else {
            return;
        };
        let request = self.prepare(HttpRequest::new(Method::Post, url)).await;
        if let Err(e) = self.transport.send(request).await {
            tracing::debug!(error = %e, "Remote logout failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::mock::MockTransport;
    use crate::events::{EngineEvent, EventBus, testing::drain};
    use serde_json::json;

    const BASE: &str = "http://api.test/api";

    fn pipeline(strategy: AuthStrategy) -> (Arc<MockTransport>, AuthenticatedFetch, EventBus) {
        let transport = Arc::new(MockTransport::new());
        let events = EventBus::new();
        let session = Session::new(strategy, events.clone());
        let fetch = AuthenticatedFetch::new(transport.clone(), session, BASE).unwrap();
        (transport, fetch, events)
    }

    #[tokio::test]
    async fn endpoint_keeps_api_prefix() {
        let (_, fetch, _) = pipeline(AuthStrategy::Cookie);
        assert_eq!(fetch.endpoint("search/").unwrap().as_str(), "http://api.test/api/search/");
        assert_eq!(fetch.endpoint("/stream/x/").unwrap().path(), "/api/stream/x/");
    }

    #[tokio::test]
    async fn resource_escapes_each_segment() {
        let (_, fetch, _) = pipeline(AuthStrategy::Cookie);
        let url = fetch.resource(&["song", "a/b?c#d", "related"]).unwrap();
        assert_eq!(url.path(), "/api/song/a%2Fb%3Fc%23d/related/");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[tokio::test]
    async fn unauthorized_request_refreshes_once_and_retries_once() {
        let (transport, fetch, _) = pipeline(AuthStrategy::Bearer);
        fetch.session().begin("ana".into(), Some("old".into()), Some("r1".into())).await;

        transport
            .on(Method::Get, "/api/user/likes/", 401, json!({}))
            .on(Method::Get, "/api/user/likes/", 200, json!([]));
        transport.on(Method::Post, "/api/auth/refresh/", 200, json!({"access": "new"}));

        let response = fetch.get("user/likes/").await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(transport.count(Method::Post, "/api/auth/refresh/"), 1);
        assert_eq!(transport.count(Method::Get, "/api/user/likes/"), 2);
        let refresh = transport.last(Method::Post, "/api/auth/refresh/").unwrap();
        assert_eq!(refresh.body, Some(json!({"refresh": "r1"})));
        let retry = transport.last(Method::Get, "/api/user/likes/").unwrap();
        assert_eq!(retry.header("Authorization"), Some("Bearer new"));
    }

    #[tokio::test]
    async fn retry_that_fails_again_is_returned_as_is() {
        let (transport, fetch, _) = pipeline(AuthStrategy::Cookie);
        fetch.session().begin("ana".into(), None, None).await;
        transport.on(Method::Get, "/api/trending/", 401, json!({}));
        transport.on(Method::Post, "/api/auth/refresh/", 200, json!({}));

        let response = fetch.get("trending/").await.unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(transport.count(Method::Get, "/api/trending/"), 2);
        assert_eq!(transport.count(Method::Post, "/api/auth/refresh/"), 1);
    }

    #[tokio::test]
    async fn rejected_refresh_tears_down_session() {
        let (transport, fetch, events) = pipeline(AuthStrategy::Cookie);
        let mut rx = events.subscribe();
        fetch.session().begin("ana".into(), None, None).await;
        transport.on(Method::Get, "/api/user/likes/", 401, json!({}));
        transport.on(Method::Post, "/api/auth/refresh/", 403, json!({}));

        let response = fetch.get("user/likes/").await.unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(transport.count(Method::Get, "/api/user/likes/"), 1);
        assert!(!fetch.session().is_active().await);
        let events = drain(&mut rx);
        assert!(events.contains(&EngineEvent::SessionExpired));
        assert!(events.contains(&EngineEvent::Notice("Session expired. Please login again.".into())));
    }

    #[tokio::test]
    async fn anonymous_401_is_not_refreshed() {
        let (transport, fetch, _) = pipeline(AuthStrategy::Cookie);
        transport.on(Method::Get, "/api/user/likes/", 401, json!({}));

        let response = fetch.get("user/likes/").await.unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(transport.count(Method::Post, "/api/auth/refresh/"), 0);
    }

    #[tokio::test]
    async fn state_changing_requests_fetch_a_fresh_csrf_token() {
        let (transport, fetch, _) = pipeline(AuthStrategy::Cookie);
        transport
            .on(Method::Get, "/api/csrf/", 200, json!({"csrftoken": "t1"}))
            .on(Method::Get, "/api/csrf/", 200, json!({"csrftoken": "t2"}));
        transport.on(Method::Post, "/api/user/likes/", 201, json!({}));

        for _ in 0..2 {
            let url = fetch.endpoint("user/likes/").unwrap();
            fetch.request(HttpRequest::post(url).with_json(json!({"song_id": "a"}))).await.unwrap();
        }
        fetch.get("trending/").await.unwrap();

        assert_eq!(transport.count(Method::Get, "/api/csrf/"), 2);
        let last = transport.last(Method::Post, "/api/user/likes/").unwrap();
        assert_eq!(last.header(CSRF_HEADER), Some("t2"));
    }

    #[tokio::test]
    async fn bearer_login_stores_tokens() {
        let (transport, fetch, events) = pipeline(AuthStrategy::Bearer);
        let mut rx = events.subscribe();
        transport.on(Method::Get, "/api/csrf/", 200, json!({"csrftoken": "t"}));
        transport.on(Method::Post, "/api/auth/login/", 200, json!({"access": "a1", "refresh": "r1"}));

        fetch.login("ana", "secret").await.unwrap();

        assert_eq!(fetch.session().access_token().await.as_deref(), Some("a1"));
        assert_eq!(fetch.session().refresh_token().await.as_deref(), Some("r1"));
        assert_eq!(drain(&mut rx), vec![EngineEvent::LoggedIn("ana".into())]);
    }

    #[tokio::test]
    async fn failed_login_reports_status() {
        let (transport, fetch, _) = pipeline(AuthStrategy::Cookie);
        transport.on(Method::Post, "/api/auth/login/", 400, json!({"error": "bad"}));

        let err = fetch.login("ana", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::Http { status: 400, .. }));
        assert!(!fetch.session().is_active().await);
    }
}
