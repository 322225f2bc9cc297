//! Per-IP token buckets.
//!
//! Every request draws from the general bucket. The login route draws from a
//! separate, much smaller bucket so the shared admin secret cannot be
//! guessed at the general request rate.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::ServerError;

pub const LOGIN_PATH: &str = "/api/admin/verify";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Policy {
    /// Tokens added per second.
    pub rate: f64,
    /// Bucket size.
    pub burst: f64,
}

impl Policy {
    pub const GENERAL: Policy = Policy { rate: 10.0, burst: 30.0 };
    /// One attempt every 12 seconds, five in a row.
    pub const LOGIN: Policy = Policy { rate: 1.0 / 12.0, burst: 5.0 };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Scope {
    General,
    Login,
}

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn full(policy: Policy) -> Self {
        Self {
            tokens: policy.burst,
            last_refill: Instant::now(),
        }
    }

    fn take(&mut self, policy: Policy) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * policy.rate).min(policy.burst);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<(Scope, IpAddr), Bucket>>>,
    general: Policy,
    login: Policy,
}

impl RateLimiter {
    pub fn new(general: Policy, login: Policy) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            general,
            login,
        }
    }

    async fn take(&self, scope: Scope, ip: IpAddr) -> bool {
        let policy = match scope {
            Scope::General => self.general,
            Scope::Login => self.login,
        };
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry((scope, ip))
            .or_insert_with(|| Bucket::full(policy))
            .take(policy)
    }

    /// Admit one request for `path` from `ip`.
    pub async fn check(&self, ip: IpAddr, path: &str) -> bool {
        if !self.take(Scope::General, ip).await {
            return false;
        }
        path != LOGIN_PATH || self.take(Scope::Login, ip).await
    }

    pub async fn purge_stale(&self, max_idle_secs: f64) {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        buckets.retain(|_, bucket| {
            now.duration_since(bucket.last_refill).as_secs_f64() < max_idle_secs
        });
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Policy::GENERAL, Policy::LOGIN)
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Some(ip) = client_ip(&req) {
        if !limiter.check(ip, req.uri().path()).await {
            warn!(ip = %ip, path = %req.uri().path(), "Rate limit exceeded");
            return ServerError::RateLimited.into_response();
        }
    }

    next.run(req).await
}

/// ConnectInfo, then the first X-Forwarded-For hop, then X-Real-IP.
fn client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Some(addr.ip());
    }

    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());

    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse().ok())
        .or_else(|| header("x-real-ip").and_then(|v| v.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(general_burst: f64, login_burst: f64) -> RateLimiter {
        RateLimiter::new(
            Policy { rate: 0.001, burst: general_burst },
            Policy { rate: 0.001, burst: login_burst },
        )
    }

    #[tokio::test]
    async fn test_allows_burst_then_rejects() {
        let limiter = limiter(5.0, 5.0);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        for _ in 0..5 {
            assert!(limiter.check(ip, "/api/licenses").await);
        }
        assert!(!limiter.check(ip, "/api/licenses").await);
    }

    #[tokio::test]
    async fn test_ips_are_independent() {
        let limiter = limiter(2.0, 2.0);
        let ip1: IpAddr = "10.0.0.1".parse().unwrap();
        let ip2: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check(ip1, "/health").await);
        assert!(limiter.check(ip1, "/health").await);
        assert!(!limiter.check(ip1, "/health").await);

        assert!(limiter.check(ip2, "/health").await);
    }

    #[tokio::test]
    async fn test_login_has_its_own_smaller_bucket() {
        let limiter = limiter(30.0, 3.0);
        let ip: IpAddr = "10.0.0.9".parse().unwrap();

        for _ in 0..3 {
            assert!(limiter.check(ip, LOGIN_PATH).await);
        }
        assert!(!limiter.check(ip, LOGIN_PATH).await);

        // Other routes still have general budget.
        assert!(limiter.check(ip, "/api/licenses").await);
    }

    #[tokio::test]
    async fn test_purge_stale() {
        let limiter = limiter(5.0, 5.0);
        let ip: IpAddr = "192.168.1.1".parse().unwrap();
        assert!(limiter.check(ip, LOGIN_PATH).await);

        limiter.purge_stale(0.0).await;

        assert!(limiter.buckets.lock().await.is_empty());
    }

    #[test]
    fn test_client_ip_from_headers() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req), Some("203.0.113.7".parse().unwrap()));

        let req = Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req), Some("198.51.100.2".parse().unwrap()));

        let req = Request::builder().body(()).unwrap();
        assert_eq!(client_ip(&req), None);
    }
}
