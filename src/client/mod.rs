//! Backend client
//!
//! - `transport`: the HTTP seam and its reqwest implementation
//! - `session`: who is logged in and, in bearer mode, their tokens
//! - `fetch`: credentials, CSRF and the refresh-and-retry pipeline
//! - `api`: cached catalog lookups
//! - `likes`: liked tracks and the server mirror

pub mod api;
pub mod fetch;
pub mod likes;
pub mod session;
pub mod transport;

pub use api::MusicApi;
pub use fetch::AuthenticatedFetch;
pub use likes::LikeSync;
pub use session::Session;
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
