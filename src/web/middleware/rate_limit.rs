//! Per-source-address rate limiting for the login endpoint.
//!
//! This sits in front of the per-account lockout and caps how fast a single
//! address can guess passwords across many accounts. The address is the TCP
//! peer; `X-Forwarded-For` and `X-Real-IP` are only read when the peer is a
//! configured trusted proxy.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

use crate::web::error::ApiError;
use crate::web::handlers::AppState;

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Keyed limiter allowing a number of login requests per address per minute.
pub struct LoginRateLimiter {
    limiter: KeyedLimiter,
    clock: DefaultClock,
    trusted_proxies: Vec<IpAddr>,
}

impl LoginRateLimiter {
    /// Create a limiter allowing `per_minute` requests per address.
    ///
    /// Forwarding headers are honored only on connections from
    /// `trusted_proxies`.
    pub fn new(per_minute: u32, trusted_proxies: Vec<IpAddr>) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::keyed(quota),
            clock: DefaultClock::default(),
            trusted_proxies,
        }
    }

    fn is_trusted(&self, ip: &IpAddr) -> bool {
        self.trusted_proxies.contains(ip)
    }

    /// Address a request is limited under.
    ///
    /// Behind trusted proxies this is the rightmost `X-Forwarded-For` hop
    /// that is not itself a trusted proxy, then `X-Real-IP`. Anything the
    /// client could have written itself is ignored.
    pub fn client_ip(&self, req: &Request<Body>) -> String {
        let Some(ConnectInfo(peer)) = req.extensions().get::<ConnectInfo<SocketAddr>>() else {
            return "unknown".to_string();
        };
        let peer = peer.ip();
        if !self.is_trusted(&peer) {
            return peer.to_string();
        }

        if let Some(forwarded) = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
        {
            let hop = forwarded
                .rsplit(',')
                .filter_map(|hop| hop.trim().parse::<IpAddr>().ok())
                .find(|ip| !self.is_trusted(ip));
            if let Some(ip) = hop {
                return ip.to_string();
            }
        }

        if let Some(real_ip) = req
            .headers()
            .get("X-Real-IP")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
        {
            return real_ip.to_string();
        }

        peer.to_string()
    }

    /// Admit one request from `ip`, or return how long until the next is allowed.
    pub fn check(&self, ip: &str) -> Result<(), Duration> {
        self.limiter
            .check_key(&ip.to_string())
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Forget addresses whose quota has fully replenished.
    pub fn cleanup(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of addresses currently tracked.
    pub fn len(&self) -> usize {
        self.limiter.len()
    }

    /// Whether no address is tracked.
    pub fn is_empty(&self) -> bool {
        self.limiter.is_empty()
    }
}

/// Rate limiting middleware for the login endpoint.
pub async fn login_rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = state.login_limiter.client_ip(&req);

    if let Err(wait) = state.login_limiter.check(&ip) {
        let retry_after = wait.as_secs().max(1);
        tracing::warn!(ip = %ip, retry_after, "Login rate limit exceeded");
        return ApiError::too_many_requests("Too many login attempts. Please try again later.")
            .with_retry_after(retry_after)
            .into_response();
    }

    next.run(req).await
}
