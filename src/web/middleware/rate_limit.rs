use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests allowed per client per window.
    pub max_requests: u32,
    pub window: Duration,
    /// Clients silent for this long are dropped by the sweeper.
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
    /// Hard cap on the number of client entries held at once.
    pub max_tracked_clients: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 120,
            window: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
            max_tracked_clients: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    window_start: Instant,
    count: u32,
    last_seen: Instant,
}

/// Fixed-window limiter keyed by client IP. Shared through `AppState`; idle
/// entries are evicted by the task returned from [`RateLimiter::spawn_sweeper`].
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clients: Mutex<HashMap<IpAddr, ClientWindow>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<IpAddr, ClientWindow>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn check(&self, ip: IpAddr) -> Result<(), AppError> {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), AppError> {
        let mut clients = self.lock();

        if !clients.contains_key(&ip) && clients.len() >= self.config.max_tracked_clients {
            let idle = self.config.idle_timeout;
            clients.retain(|_, c| now.saturating_duration_since(c.last_seen) < idle);
            if clients.len() >= self.config.max_tracked_clients {
                warn!(
                    ip = %ip,
                    tracked = clients.len(),
                    "rejecting new client: tracking table full"
                );
                return Err(AppError::TooManyRequests);
            }
        }

        let entry = clients.entry(ip).or_insert(ClientWindow {
            window_start: now,
            count: 0,
            last_seen: now,
        });
        entry.last_seen = now;
        if now.saturating_duration_since(entry.window_start) >= self.config.window {
            entry.window_start = now;
            entry.count = 0;
        }
        if entry.count >= self.config.max_requests {
            warn!(ip = %ip, max = self.config.max_requests, "rate limit exceeded");
            return Err(AppError::TooManyRequests);
        }
        entry.count += 1;
        Ok(())
    }

    /// Drops clients idle past `idle_timeout`; returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let idle = self.config.idle_timeout;
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, c| now.saturating_duration_since(c.last_seen) < idle);
        before - clients.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    /// Starts the periodic sweep. The task lives as long as the handle.
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweepHandle {
        let limiter = Arc::clone(self);
        let period = self.config.sweep_interval.max(Duration::from_millis(1));
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = limiter.sweep();
                if evicted > 0 {
                    debug!(evicted, "rate limiter sweep");
                }
            }
        });
        SweepHandle { task }
    }
}

/// Owns the sweeper task and aborts it on drop.
#[derive(Debug)]
pub struct SweepHandle {
    task: JoinHandle<()>,
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Rejects with 429 once the caller's IP is over budget. Requests without
/// connection info (in-process tests) pass through.
pub async fn limit_by_ip(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if let Some(ip) = ip {
        if let Err(e) = limiter.check(ip) {
            return e.into_response();
        }
    }
    next.run(request).await
}
