// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Directory monitor: upload activity files as they appear.
//!
//! Filesystem events arrive on a bounded channel. Each candidate path gets a
//! settle timer; when a timer fires (and no newer event for the same path
//! restarted it) the path is handed to a single dispatch loop, which runs
//! the batch processor for that one file. Shutdown is checked between events.

use dashmap::DashMap;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::error::{AppError, Result};
use crate::models::BatchReport;
use crate::services::batch::{is_candidate, BatchProcessor, ProcessMode};
use crate::services::connect::UploadClient;
use crate::services::ledger::UploadLedger;

/// Default capacity of the event and settle queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Watching,
    Settling,
    Dispatching,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEvent {
    Started,
    FileCreated,
    Settled,
    DispatchFinished { pending: usize },
    Interrupted,
}

impl MonitorState {
    pub fn on(self, event: MonitorEvent) -> MonitorState {
        use MonitorEvent::*;
        use MonitorState::*;
        match (self, event) {
            (Stopped, _) => Stopped,
            (_, Interrupted) => Stopped,
            (Idle, Started) => Watching,
            (Watching | Settling, FileCreated) => Settling,
            (Watching | Settling, Settled) => Dispatching,
            (Dispatching, DispatchFinished { pending: 0 }) => Watching,
            (Dispatching, DispatchFinished { .. }) => Settling,
            (state, _) => state,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    pub settle_delay: Duration,
    pub queue_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(5),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Watches for new files and dispatches them through a batch processor.
pub struct DirectoryMonitor<C> {
    processor: BatchProcessor<C>,
    ledger: UploadLedger,
    config: MonitorConfig,
    state: MonitorState,
    /// Paths waiting for their settle timer, with the generation of the
    /// newest timer. Only the newest timer may dispatch.
    pending: Arc<DashMap<PathBuf, u64>>,
    generation: u64,
}

impl<C: UploadClient> DirectoryMonitor<C> {
    pub fn new(processor: BatchProcessor<C>, ledger: UploadLedger, config: MonitorConfig) -> Self {
        Self {
            processor,
            ledger,
            config,
            state: MonitorState::Idle,
            pending: Arc::new(DashMap::new()),
            generation: 0,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn into_parts(self) -> (BatchProcessor<C>, UploadLedger) {
        (self.processor, self.ledger)
    }

    /// Run until `shutdown` turns true, or until `events` is closed and every
    /// pending file has been dispatched.
    pub async fn run(
        &mut self,
        mut events: mpsc::Receiver<PathBuf>,
        mut shutdown: watch::Receiver<bool>,
        mode: ProcessMode,
    ) -> Result<BatchReport> {
        let (settled_tx, mut settled_rx) =
            mpsc::channel::<(PathBuf, u64)>(self.config.queue_capacity);
        let mut report = BatchReport::default();
        let mut events_open = true;
        let mut shutdown_open = true;

        self.transition(MonitorEvent::Started);
        tracing::info!(
            settle_delay_ms = self.config.settle_delay.as_millis() as u64,
            "Watching for new activity files"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            if !events_open && self.pending.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed(), if shutdown_open => {
                    if changed.is_err() {
                        shutdown_open = false;
                    }
                }

                Some((path, generation)) = settled_rx.recv() => {
                    self.transition(MonitorEvent::Settled);
                    let result = self.dispatch(&path, generation, mode).await;
                    match result {
                        Ok(Some(file_report)) => report.push(file_report),
                        Ok(None) => {}
                        Err(e) => {
                            tracing::error!(error = %e, "Stopping monitor");
                            self.transition(MonitorEvent::Interrupted);
                            return Err(e);
                        }
                    }
                    let pending = self.pending.len();
                    self.transition(MonitorEvent::DispatchFinished { pending });
                }

                event = events.recv(), if events_open => {
                    match event {
                        Some(path) => self.schedule(path, &settled_tx),
                        None => {
                            tracing::debug!("Event source closed");
                            events_open = false;
                        }
                    }
                }
            }
        }

        self.transition(MonitorEvent::Interrupted);
        tracing::info!(dispatched = report.files.len(), "Monitor stopped");
        Ok(report)
    }

    /// Start (or restart) the settle timer for `path`.
    fn schedule(&mut self, path: PathBuf, settled_tx: &mpsc::Sender<(PathBuf, u64)>) {
        if !is_candidate(&path) {
            tracing::trace!(file = %path.display(), "Ignoring non-activity file");
            return;
        }

        self.generation += 1;
        let generation = self.generation;
        if self.pending.insert(path.clone(), generation).is_some() {
            tracing::debug!(file = %path.display(), "Restarting settle timer");
        } else {
            tracing::info!(file = %path.display(), "New file detected");
        }
        self.transition(MonitorEvent::FileCreated);

        let pending = Arc::clone(&self.pending);
        let tx = settled_tx.clone();
        let delay = self.config.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let newest = pending.get(&path).map(|g| *g) == Some(generation);
            if newest {
                let _ = tx.send((path, generation)).await;
            }
        });
    }

    /// Hand one settled file to the batch processor.
    async fn dispatch(
        &mut self,
        path: &Path,
        generation: u64,
        mode: ProcessMode,
    ) -> Result<Option<crate::models::FileReport>> {
        if !claim(&self.pending, path, generation) {
            tracing::debug!(file = %path.display(), "Settle timer superseded by a newer event");
            return Ok(None);
        }
        if !path.exists() {
            tracing::warn!(file = %path.display(), "File disappeared before processing");
            return Ok(None);
        }
        // pick up keys recorded by other runs since the last dispatch
        self.ledger.reload()?;
        let report = self.processor.process_file(path, &mut self.ledger, mode).await?;
        Ok(Some(report))
    }

    fn transition(&mut self, event: MonitorEvent) {
        let next = self.state.on(event);
        if next != self.state {
            tracing::trace!(from = ?self.state, to = ?next, "Monitor state change");
            self.state = next;
        }
    }
}

/// Take `path` out of the pending set if `generation` is still its newest
/// timer. A newer event keeps the entry for its own timer.
fn claim(pending: &DashMap<PathBuf, u64>, path: &Path, generation: u64) -> bool {
    pending.remove_if(path, |_, g| *g == generation).is_some()
}

/// Paths an event reports as newly present.
pub fn created_paths(event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) => event.paths.clone(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.clone(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().cloned().into_iter().collect()
        }
        _ => Vec::new(),
    }
}

/// Watch `dir` (non-recursively) and forward created activity files into a
/// bounded channel. Keep the returned watcher alive for as long as events are needed.
pub fn watch_directory(
    dir: &Path,
    capacity: usize,
) -> Result<(RecommendedWatcher, mpsc::Receiver<PathBuf>)> {
    let (tx, rx) = mpsc::channel(capacity);
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for path in created_paths(&event).into_iter().filter(|p| is_candidate(p)) {
                // notify calls back on its own thread, so blocking is fine
                if tx.blocking_send(path).is_err() {
                    return;
                }
            }
        }
        Err(e) => tracing::warn!(error = %e, "Filesystem watch error"),
    })
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to create watcher: {}", e)))?;

    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to watch {}: {}", dir.display(), e)))?;
    tracing::info!(dir = %dir.display(), "Directory watch started");
    Ok((watcher, rx))
}
