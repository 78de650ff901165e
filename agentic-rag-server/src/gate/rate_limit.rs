//! Fixed-window request budget per client address.
//!
//! A client seen for the first time gets `rate - 1` remaining requests. Once
//! a full window has elapsed since the window started, the next request opens
//! a new window with `rate - 1` remaining. Within a window each request
//! consumes one token and is refused when none are left.
//!
//! Windows are not aligned across clients and not sliding, so a client can
//! pass up to `2 * rate` requests in an interval that straddles a boundary.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Records idle for this many windows are dropped by [`RateLimiter::sweep`].
const IDLE_WINDOWS: u32 = 5;

#[derive(Debug)]
struct ClientWindow {
    tokens: u32,
    started: Instant,
    /// Set by [`RateLimiter::sweep`] under this record's lock when it drops
    /// the record from the map. Holders of a stale handle must look again.
    evicted: bool,
}

type Record = Arc<Mutex<ClientWindow>>;

/// Per-address fixed-window limiter. A `rate` of 0 admits everything.
#[derive(Debug)]
pub struct RateLimiter {
    rate: u32,
    window: Duration,
    clients: RwLock<HashMap<IpAddr, Record>>,
}

impl RateLimiter {
    pub fn new(rate: u32, window: Duration) -> Self {
        Self { rate, window, clients: RwLock::new(HashMap::new()) }
    }

    pub fn is_enabled(&self) -> bool {
        self.rate > 0
    }

    /// Count a request from `client` and report whether it may proceed.
    pub async fn check(&self, client: IpAddr) -> bool {
        if !self.is_enabled() {
            return true;
        }
        let found = self.clients.read().await.get(&client).cloned();
        self.admit(client, found).await
    }

    /// Spend a token from `found`, or from a fresh record when there is none.
    /// A record evicted after it was looked up is never spent.
    async fn admit(&self, client: IpAddr, mut found: Option<Record>) -> bool {
        loop {
            let record = match found.take() {
                Some(record) => record,
                None => {
                    let mut clients = self.clients.write().await;
                    match clients.get(&client) {
                        // Another request inserted it while we waited for the lock.
                        Some(record) => record.clone(),
                        None => {
                            let fresh = ClientWindow {
                                tokens: self.rate - 1,
                                started: Instant::now(),
                                evicted: false,
                            };
                            clients.insert(client, Arc::new(Mutex::new(fresh)));
                            return true;
                        }
                    }
                }
            };

            let mut window = record.lock().await;
            if window.evicted {
                continue;
            }
            let now = Instant::now();
            if now.duration_since(window.started) >= self.window {
                window.tokens = self.rate - 1;
                window.started = now;
                return true;
            }
            if window.tokens > 0 {
                window.tokens -= 1;
                return true;
            }
            return false;
        }
    }

    /// Drop records whose window started more than five windows ago.
    /// Returns the number removed. Records in use are kept.
    pub async fn sweep(&self) -> usize {
        let idle = self.window * IDLE_WINDOWS;
        let now = Instant::now();
        let mut clients = self.clients.write().await;
        let before = clients.len();
        clients.retain(|_, record| match record.try_lock() {
            Ok(mut window) => {
                let keep = now.duration_since(window.started) <= idle;
                window.evicted = !keep;
                keep
            }
            Err(_) => true,
        });
        before - clients.len()
    }

    /// Number of client addresses currently tracked.
    pub async fn tracked_clients(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Sweep every `interval` until the limiter is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let limiter = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                let removed = limiter.sweep().await;
                if removed > 0 {
                    debug!(removed, "swept idle rate limit records");
                }
            }
        })
    }
}
