use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};

/// Caller id used when no client address can be resolved.
pub const ANONYMOUS_CALLER: &str = "anonymous";

/// Extension key for storing extracted IP address
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl ClientIp {
    /// Rate-limit key for this client.
    pub fn caller_id(&self) -> String {
        self.0.to_string()
    }
}

/// Resolve the client address.
///
/// The socket peer is used unless `trust_proxy_headers` is set, in which case
/// the priority is:
/// 1. X-Forwarded-For header (first hop)
/// 2. X-Real-IP header (for Nginx)
/// 3. Socket address (direct connection)
pub fn resolve_client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> Option<IpAddr> {
    let peer_ip = peer.map(|addr| addr.ip());
    if !trust_proxy_headers {
        return peer_ip;
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        })
        .or(peer_ip)
}

/// Middleware to extract client IP address from request
///
/// `ConnectInfo` is optional so the router also works when driven directly
/// (tests, or a server built without connect info).
pub async fn extract_client_ip(
    trust_proxy_headers: bool,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    mut request: Request,
    next: Next,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);

    if let Some(ip) = resolve_client_ip(request.headers(), peer, trust_proxy_headers) {
        request.extensions_mut().insert(ClientIp(ip));
    }

    next.run(request).await
}
