//! Per-request metadata: request id propagation and the client details
//! recorded in audit trails.

use std::{convert::Infallible, net::SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request},
    http::{HeaderValue, header, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

static REQUEST_ID_HEADER: axum::http::HeaderName =
    axum::http::HeaderName::from_static("x-request-id");

const UNKNOWN_ADDR: &str = "<unknown>";

/// The `X-Request-ID` the caller sent, if any.
#[derive(Clone, Debug)]
struct RequestId(Option<String>);

/// Echoes (or mints) `X-Request-ID` and runs the request inside a span
/// carrying it.
pub(crate) async fn propagate_request_id(mut request: Request, next: Next) -> Response {
    let received = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);
    let id = received
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    request.extensions_mut().insert(RequestId(received));

    let span = tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %id,
    );
    let mut response = next.run(request).instrument(span).await;

    match HeaderValue::from_str(&id) {
        Ok(value) => {
            response
                .headers_mut()
                .insert(REQUEST_ID_HEADER.clone(), value);
        }
        Err(_) => tracing::error!("failed to encode x-request-id header"),
    }
    response
}

/// Who is calling: address, request id and the headers the login audit
/// keeps.
#[derive(Clone, Debug)]
pub(crate) struct RequestMeta {
    pub addr: String,
    pub request_id: Option<String>,
    pub user_agent: Option<String>,
    pub accept: Option<String>,
    pub path: String,
}

impl RequestMeta {
    /// Actor description stored with plan audit entries.
    pub fn origin(&self) -> String {
        format!(
            "Remote: {}, Request-ID: {}",
            self.addr,
            self.request_id.as_deref().unwrap_or("<none>")
        )
    }

    pub fn attempt_info(&self) -> engine::AttemptInfo {
        engine::AttemptInfo {
            ip_address: self.addr.clone(),
            user_agent: self.user_agent.clone(),
            http_accept: self.accept.clone(),
            path_info: Some(self.path.clone()),
        }
    }
}

fn header_string(parts: &Parts, name: &header::HeaderName) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_ADDR.to_string());
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .and_then(|RequestId(id)| id.clone())
            .or_else(|| header_string(parts, &REQUEST_ID_HEADER));

        Ok(Self {
            addr,
            request_id,
            user_agent: header_string(parts, &header::USER_AGENT),
            accept: header_string(parts, &header::ACCEPT),
            path: parts.uri.path().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_names_address_and_request_id() {
        let meta = RequestMeta {
            addr: "10.1.2.3".to_string(),
            request_id: Some("abc".to_string()),
            user_agent: None,
            accept: None,
            path: "/api/v0/plan/subscription/".to_string(),
        };
        assert_eq!(meta.origin(), "Remote: 10.1.2.3, Request-ID: abc");

        let meta = RequestMeta {
            request_id: None,
            ..meta
        };
        assert_eq!(meta.origin(), "Remote: 10.1.2.3, Request-ID: <none>");
    }
}
