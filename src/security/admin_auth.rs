use crate::config::Config;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use ipnetwork::IpNetwork;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AdminAuthConfig {
    pub admin_token: Option<String>,
    pub allowed_ips: Vec<IpNetwork>,
}

impl AdminAuthConfig {
    pub fn new(admin_token: Option<String>, allowed_ips: Vec<IpNetwork>) -> Self {
        Self {
            admin_token,
            allowed_ips,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.admin_token.clone(), config.allowed_admin_ips.clone())
    }

    pub fn is_enabled(&self) -> bool {
        self.admin_token.is_some()
    }

    /// Check one request; returns the client address it was accepted for.
    ///
    /// 503 when no token is configured, 403 for a source outside the allowed
    /// networks, 401 for a missing or wrong bearer token.
    pub fn authorize(&self, headers: &HeaderMap, peer: IpAddr) -> Result<IpAddr, StatusCode> {
        let Some(admin_token) = &self.admin_token else {
            warn!("Admin endpoint accessed but ADMIN_TOKEN not configured");
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        };

        let source_ip = self.client_ip(headers, peer);
        if !self.is_ip_allowed(source_ip) {
            warn!(
                "Admin request from unauthorized IP: {} (allowed networks: {:?})",
                source_ip, self.allowed_ips
            );
            return Err(StatusCode::FORBIDDEN);
        }

        let token = headers
            .get("authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| {
                warn!("Admin request without bearer token from IP: {}", source_ip);
                StatusCode::UNAUTHORIZED
            })?;

        if !bool::from(token.as_bytes().ct_eq(admin_token.as_bytes())) {
            warn!("Invalid admin token from IP: {}", source_ip);
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(source_ip)
    }

    /// Forwarding headers are honoured only when the peer itself is trusted.
    fn client_ip(&self, headers: &HeaderMap, peer: IpAddr) -> IpAddr {
        if !self.is_ip_allowed(peer) {
            return peer;
        }

        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse::<IpAddr>().ok())
            })
            .unwrap_or(peer)
    }

    fn is_ip_allowed(&self, ip: IpAddr) -> bool {
        ip.is_loopback() || self.allowed_ips.iter().any(|network| network.contains(ip))
    }
}

/// Guards the `/admin` routes.
pub async fn admin_auth_middleware(
    State(config): State<Arc<AdminAuthConfig>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let source_ip = config.authorize(req.headers(), addr.ip())?;
    info!("Admin authenticated from IP: {}", source_ip);

    req.extensions_mut().insert(source_ip);
    Ok(next.run(req).await)
}
