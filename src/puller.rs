//! Traversal controller — the data puller
//!
//! Owns the descending walk over the item ID space: which IDs to fetch,
//! when to stop, and how to deduplicate user lookups. Transport is behind
//! the [`HnApi`] seam; persistence is behind the append-only sinks. All
//! traversal state (cursor, budget countdown, cutoff, seen handles) lives
//! here exclusively and is mutated only between batch-processing steps.
//!
//! A run moves through phases:
//! 1. Resolve the starting cursor — resume strictly below the lowest
//!    already-persisted ID, or seed from the live max item ID
//! 2. Compute the cutoff timestamp once
//! 3. Walk descending batches: fetch, drain in ID order, persist, collect
//!    newly seen authors
//! 4. Resolve and persist each batch's authors before the next batch
//! 5. Finish in one of three terminal states, all resumable

use crate::client::{HnApi, HnClient};
use crate::config::Config;
use crate::error::Result;
use crate::sink::{self, JsonlSink};
use crate::types::{Event, ItemId, PullReport, PullStats, Termination, User};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Capacity of the progress event channel; slow subscribers lag and miss
/// events rather than backpressuring the run
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Pulls items and users from the API into the output streams
///
/// Construct with [`from_config`](Puller::from_config) for the production
/// client, or [`with_api`](Puller::with_api) to supply another [`HnApi`]
/// implementation.
pub struct Puller {
    config: Config,
    api: Arc<dyn HnApi>,
    items_sink: JsonlSink,
    users_sink: JsonlSink,
    /// Handles already scheduled for fetching this run; dedup happens at
    /// schedule time, so a handle referenced twice fetches once
    seen_users: HashSet<String>,
    stats: PullStats,
    event_tx: broadcast::Sender<Event>,
}

impl Puller {
    /// Build a puller with a production [`HnClient`] from the configuration
    pub fn from_config(config: Config) -> Result<Self> {
        let client = HnClient::new(&config)?;
        Self::with_api(config, Arc::new(client))
    }

    /// Build a puller over an explicit API implementation
    ///
    /// Validates the configuration and opens (or creates) both output
    /// streams for appending.
    pub fn with_api(config: Config, api: Arc<dyn HnApi>) -> Result<Self> {
        config.validate()?;
        let items_sink = JsonlSink::open(config.output.items_path.clone())?;
        let users_sink = JsonlSink::open(config.output.users_path.clone())?;
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            config,
            api,
            items_sink,
            users_sink,
            seen_users: HashSet::new(),
            stats: PullStats::default(),
            event_tx,
        })
    }

    /// Subscribe to progress events
    ///
    /// Multiple subscribers are supported. The channel is lossy: a
    /// subscriber that falls more than the channel capacity behind misses
    /// the oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Counters accumulated so far
    pub fn stats(&self) -> &PullStats {
        &self.stats
    }

    /// Run the pull to one of its terminal states
    ///
    /// The cancellation token is honored between batches: on cancellation
    /// the in-flight batch drains, its records persist, and the run returns
    /// [`Termination::Interrupted`]. Per-request failures are logged and
    /// skipped; only sink I/O failures (and a failure to seed the starting
    /// cursor) abort the run with an error.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<PullReport> {
        // Phase 1: resolve the starting cursor
        let start = match sink::scan_last_id(&self.config.output.items_path)? {
            Some(checkpoint) => {
                tracing::info!(checkpoint = %checkpoint, "Resuming below last persisted item");
                if checkpoint.get() <= 1 {
                    tracing::info!("Checkpoint already at the bottom of the ID space");
                    self.emit(Event::Finished {
                        termination: Termination::Completed,
                    });
                    return Ok(PullReport {
                        termination: Termination::Completed,
                        stats: self.stats.clone(),
                        last_cursor: None,
                    });
                }
                ItemId::new(checkpoint.get() - 1)
            }
            None => {
                let max = self.api.max_item_id().await?;
                tracing::info!(max_id = %max, "No checkpoint found, starting from max item ID");
                max
            }
        };

        // Phase 2: cutoff is computed once at run start, never re-evaluated.
        // A month is a 30-day window, so fractional months are meaningful.
        let cutoff = self.config.pull.n_months.map(|months| {
            Utc::now().timestamp() - (months * 30.0 * 86_400.0) as i64
        });
        if let Some(ts) = cutoff {
            tracing::info!(cutoff = ts, "Items older than the cutoff stop the run");
        }

        self.emit(Event::Started {
            start_id: start,
            cutoff,
        });

        // Phase 3: descending batch walk
        let batch_size = self.config.pull.batch_size as u64;
        let mut cursor = start.get();
        let mut last_cursor: Option<ItemId> = None;
        let mut stop: Option<Termination> = None;

        loop {
            if cancel.is_cancelled() {
                tracing::info!("Cancellation requested, stopping before the next batch");
                stop = Some(Termination::Interrupted);
                break;
            }

            let low = cursor.saturating_sub(batch_size - 1).max(1);
            let ids: Vec<ItemId> = (low..=cursor).rev().map(ItemId::new).collect();

            let mut results = self.api.items(&ids).await;
            // Completion order within a batch is unconstrained; drain in
            // descending ID order so the cutoff decision stays globally
            // newest-to-oldest
            results.sort_by_key(|(id, _)| std::cmp::Reverse(*id));

            let mut pending_users: Vec<String> = Vec::new();
            for (id, outcome) in results {
                self.stats.items_seen += 1;
                last_cursor = Some(id);
                match outcome {
                    Err(e) => {
                        tracing::warn!(item_id = %id, error = %e, "Item fetch failed, skipping");
                        self.stats.item_errors += 1;
                    }
                    Ok(None) => {
                        // Tombstoned or never-allocated ID
                        self.stats.items_absent += 1;
                    }
                    Ok(Some(item)) => {
                        if let (Some(cutoff_ts), Some(time)) = (cutoff, item.time) {
                            if time < cutoff_ts {
                                tracing::info!(
                                    item_id = %id,
                                    item_time = time,
                                    cutoff = cutoff_ts,
                                    "Item older than cutoff, stopping run"
                                );
                                stop = Some(Termination::StoppedByCutoff);
                                break;
                            }
                        }

                        self.items_sink.append(&item).await?;
                        self.stats.items_saved += 1;

                        if let Some(by) = item.by.as_deref() {
                            if self.seen_users.insert(by.to_string()) {
                                pending_users.push(by.to_string());
                            }
                        }

                        if let Some(budget) = self.config.pull.max_items {
                            if self.stats.items_saved >= budget {
                                tracing::info!(max_items = budget, "Item budget reached");
                                stop = Some(Termination::Completed);
                                break;
                            }
                        }
                    }
                }
            }

            // Phase 4: resolve this batch's newly seen authors before moving
            // on, so an interruption never leaves a persisted item whose
            // author was scheduled but lost
            self.resolve_users(pending_users).await?;

            self.emit(Event::BatchCompleted {
                cursor: ItemId::new(cursor),
                items_saved: self.stats.items_saved,
                users_saved: self.stats.users_saved,
            });
            tracing::info!(
                cursor = cursor,
                items_saved = self.stats.items_saved,
                users_saved = self.stats.users_saved,
                "Batch complete"
            );

            if stop.is_some() {
                break;
            }
            if low == 1 {
                tracing::info!("Reached item ID 1, ID space exhausted");
                break;
            }
            cursor = low - 1;
        }

        let termination = stop.unwrap_or(Termination::Completed);
        self.emit(Event::Finished { termination });
        tracing::info!(
            termination = %termination,
            items_seen = self.stats.items_seen,
            items_saved = self.stats.items_saved,
            users_saved = self.stats.users_saved,
            item_errors = self.stats.item_errors,
            "Pull run finished"
        );

        Ok(PullReport {
            termination,
            stats: self.stats.clone(),
            last_cursor,
        })
    }

    /// Fetch and persist a batch's pending authors
    ///
    /// Lookups overlap through the same client (and the same admission
    /// ceiling) as item fetches. Per-user failures and absent profiles are
    /// counted and skipped; only sink failures propagate.
    async fn resolve_users(&mut self, handles: Vec<String>) -> Result<()> {
        if handles.is_empty() {
            return Ok(());
        }

        let api = Arc::clone(&self.api);
        let results: Vec<(String, Result<Option<User>>)> = stream::iter(handles)
            .map(|handle| {
                let api = Arc::clone(&api);
                async move {
                    let outcome = api.user(&handle).await;
                    (handle, outcome)
                }
            })
            .buffer_unordered(self.config.pull.max_concurrent)
            .collect()
            .await;

        for (handle, outcome) in results {
            match outcome {
                Err(e) => {
                    tracing::warn!(user = %handle, error = %e, "User fetch failed, skipping");
                    self.stats.user_errors += 1;
                }
                Ok(None) => {
                    tracing::debug!(user = %handle, "No profile upstream, skipping");
                    self.stats.users_absent += 1;
                }
                Ok(Some(user)) => {
                    self.users_sink.append(&user).await?;
                    self.stats.users_saved += 1;
                }
            }
        }
        Ok(())
    }

    fn emit(&self, event: Event) {
        // Send only fails when no subscriber is listening
        let _ = self.event_tx.send(event);
    }
}
