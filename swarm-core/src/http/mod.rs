//! Re-exports of the HTTP types the framework is built on, so that
//! applications and companion crates do not need their own `axum`/`http`
//! dependency.

pub mod header;

pub use axum::body::{self, Body, Bytes};
pub use axum::http::Uri;
pub use axum::{serve, Json, Router};

pub mod response {
    pub use axum::response::{Html, IntoResponse, Response};
}

pub mod routing {
    pub use axum::routing::{any, get, on, MethodFilter, MethodRouter};
}

pub use self::header::{
    HeaderMap, HeaderName, HeaderValue, HttpRequest, Method, StatusCode,
    // Common header constants
    ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE,
};
pub use self::response::{Html, IntoResponse, Response};
