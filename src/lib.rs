//! # hn-pull
//!
//! Resumable, bounded-concurrency Hacker News archive puller.
//!
//! ## Design Philosophy
//!
//! hn-pull is designed to be:
//! - **Resumable** - A crash or interruption loses no completed work; the
//!   next run picks up strictly below the last persisted item
//! - **Self-limiting** - One configurable admission ceiling bounds all
//!   in-flight requests against an API that publishes no rate limit
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Append-only** - Output is two JSONL streams (items, users) written
//!   durably, one record per line, never updated in place
//!
//! ## Quick Start
//!
//! ```no_run
//! use hn_pull::{Config, PullConfig, Puller, pull_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         pull: PullConfig {
//!             n_months: Some(6.0),
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     };
//!
//!     let puller = Puller::from_config(config)?;
//!
//!     // Subscribe to progress events
//!     let mut events = puller.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Run until done, or until SIGINT/SIGTERM drains the current batch
//!     let report = pull_with_shutdown(puller).await?;
//!     println!("Finished: {}", report.termination);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Bounded API client
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Traversal controller
pub mod puller;
/// Retry logic with exponential backoff
pub mod retry;
/// Durable append-only JSONL sink
pub mod sink;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use client::{HnApi, HnClient};
pub use config::{ApiConfig, Config, OutputConfig, PullConfig, RetryConfig};
pub use error::{Error, Result};
pub use puller::Puller;
pub use sink::JsonlSink;
pub use types::{Event, Item, ItemId, ItemType, PullReport, PullStats, Termination, User};

use tokio_util::sync::CancellationToken;

/// Run a puller to completion with graceful signal handling.
///
/// Waits for a termination signal and cancels the run's token; the puller
/// drains its in-flight batch, persists it, and returns an
/// [`Termination::Interrupted`] report rather than aborting mid-record.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn pull_with_shutdown(mut puller: Puller) -> Result<PullReport> {
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    let signal_task = tokio::spawn(async move {
        wait_for_signal().await;
        signal_cancel.cancel();
    });

    let report = puller.run(cancel).await;
    signal_task.abort();
    report
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
