//! Periodic re-triggering of ingestion runs.
//!
//! Runs in the foreground until SIGINT or SIGTERM. Each tick is an ordinary
//! run; a failed run is logged and the next tick proceeds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use crate::app::{AppContext, Result};

/// Longest accepted interval (one year).
pub const MAX_INTERVAL_SECS: u64 = 365 * 86400;

/// Watch loop configuration
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Seconds between runs (default: 3600 = 1 hour)
    pub interval_secs: u64,
    /// Whether to run immediately on start
    pub run_on_start: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            run_on_start: true,
        }
    }
}

impl WatchConfig {
    /// Parse an interval like "90s", "30m", "6h", "1d", or bare seconds.
    pub fn parse_interval(s: &str) -> std::result::Result<u64, String> {
        let s = s.trim().to_lowercase();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (number, unit) = s.split_at(split);

        let multiplier = match unit {
            "" | "s" => 1,
            "m" => 60,
            "h" => 3600,
            "d" => 86400,
            _ => {
                return Err(format!(
                    "Invalid interval: {}. Use format like '1h', '30m', '1d'",
                    s
                ))
            }
        };
        let count: u64 = number
            .parse()
            .map_err(|_| format!("Invalid interval: {}. Use format like '1h', '30m', '1d'", s))?;

        match count.checked_mul(multiplier) {
            Some(0) => Err("Interval must be greater than zero".to_string()),
            Some(secs) if secs <= MAX_INTERVAL_SECS => Ok(secs),
            _ => Err(format!("Interval too large: {} (at most 365d)", s)),
        }
    }

    /// Format interval for display
    pub fn format_interval(secs: u64) -> String {
        if secs >= 86400 && secs % 86400 == 0 {
            format!("{}d", secs / 86400)
        } else if secs >= 3600 && secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs >= 60 && secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

pub struct Watcher {
    ctx: Arc<AppContext>,
    config: WatchConfig,
    running: Arc<AtomicBool>,
}

impl Watcher {
    pub fn new(ctx: Arc<AppContext>, config: WatchConfig) -> Self {
        Self {
            ctx,
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Run until a shutdown signal arrives or [`stop`](Self::stop) is called.
    pub async fn run(&self) -> Result<()> {
        self.spawn_signal_handler();

        tracing::info!(
            interval = %WatchConfig::format_interval(self.config.interval_secs),
            sources = self.ctx.registry().len(),
            "watching feeds"
        );

        if self.config.run_on_start {
            self.run_once().await;
        }

        let mut timer = interval(Duration::from_secs(self.config.interval_secs));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer.tick().await; // Skip the first immediate tick

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = timer.tick() => {}
                _ = self.wait_for_stop() => break,
            }

            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.run_once().await;
        }

        tracing::info!("watch loop shutting down");
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    async fn run_once(&self) {
        let report = self.ctx.run_ingestion().await;
        match (report.success, report.message, report.error) {
            (true, Some(message), _) => tracing::info!("{}", message),
            (false, _, Some(error)) => tracing::error!("ingestion run failed: {}", error),
            _ => {}
        }
    }

    async fn wait_for_stop(&self) {
        while self.running.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    fn spawn_signal_handler(&self) {
        let running = self.running.clone();

        #[cfg(unix)]
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = sigterm.recv() => {},
                        _ = tokio::signal::ctrl_c() => {},
                    }
                }
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
            running.store(false, Ordering::SeqCst);
        });

        #[cfg(not(unix))]
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            running.store(false, Ordering::SeqCst);
        });
    }
}
