//! ETag and conditional GET support.

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use antislot_core::signature::etag;

use crate::error::ApiError;

/// Tags successful GET responses with a body ETag and answers a matching
/// `If-None-Match` with an empty 304.
pub async fn etag_layer(request: Request, next: Next) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let if_none_match = request.headers().get(header::IF_NONE_MATCH).cloned();
    let response = next.run(request).await;
    if !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => return ApiError::Internal(format!("failed to buffer body: {e}")).into_response(),
    };

    let tag = etag(&bytes);
    let Ok(tag_value) = HeaderValue::from_str(&tag) else {
        return Response::from_parts(parts, Body::from(bytes));
    };
    parts.headers.insert(header::ETAG, tag_value.clone());

    if if_none_match.is_some_and(|value| matches_etag(&value, &tag)) {
        debug!(etag = %tag, "Not modified");
        return not_modified(&parts.headers, tag_value);
    }

    Response::from_parts(parts, Body::from(bytes))
}

/// Returns true if an `If-None-Match` value names `tag` (or is `*`).
fn matches_etag(value: &HeaderValue, tag: &str) -> bool {
    let Ok(value) = value.to_str() else {
        return false;
    };
    value.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == tag
    })
}

fn not_modified(headers: &HeaderMap, tag: HeaderValue) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    response.headers_mut().insert(header::ETAG, tag);
    if let Some(cache_control) = headers.get(header::CACHE_CONTROL) {
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, cache_control.clone());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn if_none_match_forms() {
        let tag = "\"2cf24dba5fb0a30e\"";
        assert!(matches_etag(&HeaderValue::from_static("\"2cf24dba5fb0a30e\""), tag));
        assert!(matches_etag(
            &HeaderValue::from_static("\"aaaa\", W/\"2cf24dba5fb0a30e\""),
            tag
        ));
        assert!(matches_etag(&HeaderValue::from_static("*"), tag));
        assert!(!matches_etag(&HeaderValue::from_static("\"2cf24dba\""), tag));
    }
}
