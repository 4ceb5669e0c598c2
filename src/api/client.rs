use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::USER_AGENT, request::Parts, HeaderMap},
};

use crate::documents::ClientInfo;

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(client_info(&parts.headers))
    }
}

/// Caller address and agent as seen through the reverse proxy.
pub fn client_info(headers: &HeaderMap) -> ClientInfo {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        });

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.chars().take(255).collect());

    ClientInfo { ip, user_agent }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn first_forwarded_address_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.7, 172.16.0.1"));
        headers.insert(USER_AGENT, HeaderValue::from_static("campus-app/2.1"));

        let client = client_info(&headers);
        assert_eq!(client.ip.as_deref(), Some("10.0.0.7"));
        assert_eq!(client.user_agent.as_deref(), Some("campus-app/2.1"));
    }

    #[test]
    fn missing_headers_leave_fields_empty() {
        let client = client_info(&HeaderMap::new());
        assert!(client.ip.is_none());
        assert!(client.user_agent.is_none());
    }
}
