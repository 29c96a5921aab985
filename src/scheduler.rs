//! Periodic jobs: pool/price/volume refresh, health checks, cache pruning,
//! debounced persistence flush, portfolio auto-sync, and the two
//! cron-style UTC jobs (daily digest, seen-tx prune).
//!
//! Each job is an independently cancellable `tokio::spawn`ed loop around
//! `tokio::time::interval`, checking a shared shutdown flag each tick —
//! the same `tokio::select!`-driven shutdown race the teacher's `main.rs`
//! uses around its consumer/API/metrics handles.

use chrono::{Timelike, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    /// Spawns a job that runs `action` every `interval`, stopping once
    /// shutdown is signaled.
    pub fn spawn_interval<F, Fut>(&mut self, name: &'static str, interval: Duration, mut action: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        action().await;
                    }
                    _ = shutdown_rx.changed() => {
                        info!(job = name, "job shutting down");
                        break;
                    }
                }
            }
        });
        self.handles.push(handle);
    }

    /// Spawns a job that fires once per day at `hour_utc:minute_utc`.
    pub fn spawn_daily_utc<F, Fut>(
        &mut self,
        name: &'static str,
        hour_utc: u8,
        minute_utc: u8,
        mut action: F,
    ) where
        F: FnMut() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                let sleep_for = duration_until_next(hour_utc, minute_utc);
                tokio::select! {
                    _ = tokio::time::sleep(sleep_for) => {
                        action().await;
                    }
                    _ = shutdown_rx.changed() => {
                        info!(job = name, "job shutting down");
                        break;
                    }
                }
            }
        });
        self.handles.push(handle);
    }

    /// Cancels all jobs and waits up to `grace` before forcing termination.
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.shutdown_tx.send(true);
        let join_all = futures::future::join_all(self.handles);
        if tokio::time::timeout(grace, join_all).await.is_err() {
            tracing::warn!("scheduler did not shut down within grace period, forcing exit");
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_until_next(hour_utc: u8, minute_utc: u8) -> Duration {
    let now = Utc::now();
    let mut target = now
        .date_naive()
        .and_hms_opt(hour_utc as u32, minute_utc as u32, 0)
        .expect("valid hour/minute")
        .and_utc();
    if target <= now {
        target += chrono::Duration::days(1);
    }
    (target - now).to_std().unwrap_or(Duration::from_secs(86_400))
}

#[allow(dead_code)]
fn current_utc_hour() -> u8 {
    Utc::now().hour() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_until_next_is_never_negative() {
        for h in 0..24u8 {
            let d = duration_until_next(h, 0);
            assert!(d.as_secs() <= 86_400);
        }
    }
}
