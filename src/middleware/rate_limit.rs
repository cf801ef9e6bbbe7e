//! Fixed-window request counting per `(route group, client)`.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::error::ApiError;
use crate::state::AppState;
use crate::tenant::{Clock, SystemClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteGroup {
    /// Login endpoints, limited more tightly.
    Auth,
    Api,
}

impl RouteGroup {
    pub fn for_path(path: &str) -> Self {
        if path.starts_with("/api/v1/auth/login") || path.starts_with("/api/v1/auth/system/login") {
            RouteGroup::Auth
        } else {
            RouteGroup::Api
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

const MAX_TRACKED_CLIENTS: usize = 10_000;

pub struct RateLimiter {
    windows: Mutex<HashMap<(RouteGroup, String), Window>>,
    window: Duration,
    api_limit: u32,
    auth_limit: u32,
    max_tracked: usize,
    trusted_proxies: Vec<IpAddr>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(window: Duration, api_limit: u32, auth_limit: u32) -> Self {
        Self::with_clock(window, api_limit, auth_limit, Arc::new(SystemClock))
    }

    pub fn with_clock(window: Duration, api_limit: u32, auth_limit: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window,
            api_limit,
            auth_limit,
            max_tracked: MAX_TRACKED_CLIENTS,
            trusted_proxies: Vec::new(),
            clock,
        }
    }

    /// Believe `X-Forwarded-For` only when the peer is one of these proxies.
    pub fn trusting_proxies(mut self, proxies: Vec<IpAddr>) -> Self {
        self.trusted_proxies = proxies;
        self
    }

    /// Client identity. The peer address, unless the peer is a trusted
    /// proxy, in which case the nearest untrusted `X-Forwarded-For` hop.
    pub fn client_key(&self, peer: Option<IpAddr>, forwarded_for: Option<&str>) -> String {
        let Some(peer) = peer else {
            return "unknown".to_string();
        };
        if !self.trusted_proxies.contains(&peer) {
            return peer.to_string();
        }

        forwarded_for
            .into_iter()
            .flat_map(|v| v.rsplit(','))
            .filter_map(|hop| hop.trim().parse::<IpAddr>().ok())
            .find(|hop| !self.trusted_proxies.contains(hop))
            .unwrap_or(peer)
            .to_string()
    }

    fn limit(&self, group: RouteGroup) -> u32 {
        match group {
            RouteGroup::Auth => self.auth_limit,
            RouteGroup::Api => self.api_limit,
        }
    }

    /// Count one request. `Err` carries the seconds until the window resets.
    pub async fn check(&self, group: RouteGroup, client: &str) -> Result<(), u64> {
        let now = self.clock.now();
        let mut windows = self.windows.lock().await;
        let key = (group, client.to_string());

        if !windows.contains_key(&key) && windows.len() >= self.max_tracked {
            windows.retain(|_, w| now.duration_since(w.started) < self.window);
            // Still full of live windows: forget the oldest
            if windows.len() >= self.max_tracked {
                let oldest = windows.iter().min_by_key(|(_, w)| w.started).map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    windows.remove(&oldest);
                }
            }
        }

        let window = windows.entry(key).or_insert(Window { started: now, count: 0 });
        if now.duration_since(window.started) >= self.window {
            *window = Window { started: now, count: 0 };
        }
        if window.count >= self.limit(group) {
            let remaining = self.window.saturating_sub(now.duration_since(window.started));
            return Err(remaining.as_secs().max(1));
        }
        window.count += 1;
        Ok(())
    }

    pub async fn tracked_clients(&self) -> usize {
        self.windows.lock().await.len()
    }
}

fn client_key(limiter: &RateLimiter, request: &Request) -> String {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let forwarded_for = request.headers().get("x-forwarded-for").and_then(|v| v.to_str().ok());
    limiter.client_key(peer, forwarded_for)
}

pub async fn rate_limit_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.config.api.enable_rate_limiting {
        return next.run(request).await;
    }

    let group = RouteGroup::for_path(request.uri().path());
    let client = client_key(&state.rate_limiter, &request);
    if let Err(retry_after) = state.rate_limiter.check(group, &client).await {
        tracing::warn!("Rate limit exceeded for {} on {:?} routes", client, group);
        return ApiError::too_many_requests(format!("Too many requests, retry in {} seconds", retry_after))
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::cache::tests::ManualClock;

    fn limiter() -> (Arc<ManualClock>, RateLimiter) {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(Duration::from_secs(60), 3, 1, clock.clone());
        (clock, limiter)
    }

    #[tokio::test]
    async fn blocks_after_limit_until_window_ends() {
        let (clock, limiter) = limiter();
        for _ in 0..3 {
            assert!(limiter.check(RouteGroup::Api, "10.0.0.1").await.is_ok());
        }
        assert!(limiter.check(RouteGroup::Api, "10.0.0.1").await.is_err());
        assert!(limiter.check(RouteGroup::Api, "10.0.0.2").await.is_ok());

        clock.advance(Duration::from_secs(60));
        assert!(limiter.check(RouteGroup::Api, "10.0.0.1").await.is_ok());
    }

    #[tokio::test]
    async fn auth_group_counted_separately() {
        let (_clock, limiter) = limiter();
        assert!(limiter.check(RouteGroup::Auth, "10.0.0.1").await.is_ok());
        assert!(limiter.check(RouteGroup::Auth, "10.0.0.1").await.is_err());
        assert!(limiter.check(RouteGroup::Api, "10.0.0.1").await.is_ok());
    }

    #[tokio::test]
    async fn spoofed_forwarded_for_does_not_split_the_count() {
        let (_clock, limiter) = limiter();
        let peer: IpAddr = "203.0.113.9".parse().unwrap();

        let mut allowed = 0;
        for i in 0..50 {
            let spoofed = format!("10.1.0.{}", i);
            let client = limiter.client_key(Some(peer), Some(&spoofed));
            if limiter.check(RouteGroup::Auth, &client).await.is_ok() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 1);
        assert_eq!(limiter.tracked_clients().await, 1);
    }

    #[test]
    fn forwarded_for_honoured_behind_trusted_proxy() {
        let proxy: IpAddr = "10.0.0.2".parse().unwrap();
        let limiter = RateLimiter::new(Duration::from_secs(60), 3, 1).trusting_proxies(vec![proxy]);

        assert_eq!(limiter.client_key(Some(proxy), Some("198.51.100.7, 10.0.0.2")), "198.51.100.7");
        assert_eq!(limiter.client_key(Some(proxy), Some("garbage")), "10.0.0.2");
        assert_eq!(limiter.client_key(Some(proxy), None), "10.0.0.2");
        let outsider: IpAddr = "198.51.100.8".parse().unwrap();
        assert_eq!(limiter.client_key(Some(outsider), Some("1.2.3.4")), "198.51.100.8");
        assert_eq!(limiter.client_key(None, Some("1.2.3.4")), "unknown");
    }

    #[tokio::test]
    async fn tracked_clients_are_capped() {
        let (clock, mut limiter) = limiter();
        limiter.max_tracked = 3;
        for i in 0..10 {
            clock.advance(Duration::from_secs(1));
            assert!(limiter.check(RouteGroup::Api, &format!("10.0.0.{}", i)).await.is_ok());
        }
        assert_eq!(limiter.tracked_clients().await, 3);
    }

    #[test]
    fn login_paths_use_auth_group() {
        assert_eq!(RouteGroup::for_path("/api/v1/auth/login"), RouteGroup::Auth);
        assert_eq!(RouteGroup::for_path("/api/v1/auth/system/login"), RouteGroup::Auth);
        assert_eq!(RouteGroup::for_path("/api/v1/auth/me"), RouteGroup::Api);
    }
}
