use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;

/// Client details recorded on the session at sign-in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestMeta {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub device: Option<String>,
}

impl RequestMeta {
    /// The server sits behind one proxy, so the first `X-Forwarded-For` hop is the client.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        let user_agent = headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let ip_address = header("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
            .or_else(|| header("x-real-ip"));
        let device = user_agent.as_deref().map(|ua| device_kind(ua).to_string());

        Self {
            user_agent,
            ip_address,
            device,
        }
    }
}

fn device_kind(user_agent: &str) -> &'static str {
    let ua = user_agent.to_ascii_lowercase();
    if ua.contains("ipad") || ua.contains("tablet") {
        "tablet"
    } else if ua.contains("mobi") || ua.contains("iphone") || ua.contains("android") {
        "mobile"
    } else {
        "desktop"
    }
}
