//! Sync session: pull/push orchestration for one workspace connection.
//!
//! A [`SyncSession`] owns its record store, tombstone set, status line,
//! and timer handles. Pull fetches the remote snapshot and merges it
//! through the engine's reconciler; push serializes the full local
//! collection plus pending tombstones and clears the tombstones once
//! the server acknowledges. Both are single-flight guarded and bounded
//! by a request timeout plus a guard deadline that clears a stuck
//! in-flight state even if the network stack never resolves.

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::status::{StatusKind, SyncStatus};
use opsboard_engine::snapshot::{self, StoreSnapshot};
use opsboard_engine::{
    timestamp, AppSchema, LocalStore, ReconcileOutcome, Record, RecordsResponse, SyncRequest,
    SyncResponse, Tombstone,
};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Error payload shape returned by the sync server.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Timer state for auto sync mode.
#[derive(Default)]
struct AutoSync {
    enabled: bool,
    runtime: Option<tokio::runtime::Handle>,
    pull_task: Option<JoinHandle<()>>,
    push_task: Option<JoinHandle<()>>,
}

/// One dashboard's connection to a shared workspace.
///
/// Constructed per `(api_url, workspace_key, app)` combination; use a
/// new session to switch workspaces. All methods take `&self`, so the
/// session can be shared across tasks behind its `Arc`.
pub struct SyncSession {
    config: SyncConfig,
    http: reqwest::Client,
    store: Mutex<LocalStore>,
    status: Mutex<SyncStatus>,
    pending: AtomicBool,
    auto: Mutex<AutoSync>,
    weak: Weak<SyncSession>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SyncSession {
    /// Create a session for one app's records.
    ///
    /// The session is returned in an `Arc` so its timers can hold weak
    /// references back to it; dropping the last strong reference stops
    /// every scheduled task.
    pub fn new_shared(schema: AppSchema, config: SyncConfig) -> Result<Arc<Self>, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        let configured = config.is_ready();
        Ok(Arc::new_cyclic(|weak| Self {
            http,
            store: Mutex::new(LocalStore::new(schema)),
            status: Mutex::new(SyncStatus::initial(configured)),
            pending: AtomicBool::new(false),
            auto: Mutex::new(AutoSync::default()),
            weak: weak.clone(),
            config,
        }))
    }

    /// The session's configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Live records, newest first.
    pub fn records(&self) -> Vec<Record> {
        lock(&self.store).records()
    }

    /// Look up a record by id.
    pub fn get(&self, id: &str) -> Option<Record> {
        lock(&self.store).get(id).cloned()
    }

    /// Deletions not yet acknowledged by the server.
    pub fn pending_deletions(&self) -> Vec<Tombstone> {
        lock(&self.store).tombstones()
    }

    /// Current status snapshot for rendering.
    pub fn status(&self) -> SyncStatus {
        let mut status = lock(&self.status).clone();
        status.pending = self.pending.load(Ordering::SeqCst);
        status
    }

    // ------------------------------------------------------------------
    // Local mutations
    // ------------------------------------------------------------------

    /// Create a record locally and schedule a debounced push.
    pub fn create(&self, payload: Value) -> Result<Record, SyncError> {
        let record = lock(&self.store).create(payload)?;
        self.persist();
        self.schedule_push();
        Ok(record)
    }

    /// Replace a record's payload, stamping a fresh timestamp.
    pub fn update(&self, id: &str, payload: Value) -> Result<Option<Record>, SyncError> {
        let updated = lock(&self.store).update(id, payload)?;
        if updated.is_some() {
            self.persist();
            self.schedule_push();
        }
        Ok(updated)
    }

    /// Delete a record, keeping a tombstone until the next push lands.
    pub fn remove(&self, id: &str) -> Option<Record> {
        let removed = lock(&self.store).remove(id);
        self.persist();
        self.schedule_push();
        removed
    }

    /// Delete every local record. Shared data is untouched until the
    /// tombstones are pushed.
    pub fn clear_all(&self) -> usize {
        let cleared = lock(&self.store).clear_all();
        self.persist();
        self.schedule_push();
        cleared
    }

    // ------------------------------------------------------------------
    // Snapshot persistence
    // ------------------------------------------------------------------

    /// Load persisted state from the configured snapshot file.
    ///
    /// A missing file means a fresh device; a corrupt one loads as
    /// empty rather than failing startup.
    pub fn load_snapshot(&self) {
        let Some(path) = &self.config.snapshot_path else {
            return;
        };
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to read snapshot");
                return;
            }
        };
        let mut store = lock(&self.store);
        snapshot::load_or_default(&mut store, &json);
        tracing::debug!(
            path = %path.display(),
            records = store.len(),
            "Loaded snapshot"
        );
    }

    fn persist(&self) {
        let Some(path) = &self.config.snapshot_path else {
            return;
        };
        let snapshot = StoreSnapshot::capture(&lock(&self.store));
        if let Err(err) = write_snapshot(path, &snapshot) {
            tracing::warn!(path = %path.display(), error = %err, "Failed to write snapshot");
        }
    }

    // ------------------------------------------------------------------
    // Pull / push
    // ------------------------------------------------------------------

    /// Fetch the remote record list and merge it into local state.
    ///
    /// `silent` suppresses the busy and success status chatter for
    /// timer-driven calls; failures always surface in the status.
    pub async fn pull(&self, silent: bool) -> Result<ReconcileOutcome, SyncError> {
        let Some((api_url, workspace_key)) = self.config.endpoint() else {
            return Err(self.not_configured(silent));
        };
        if !self.begin_pending(silent) {
            return Err(SyncError::Busy);
        }

        let result = self.guarded(self.pull_once(&api_url, &workspace_key)).await;
        self.end_pending();

        match result {
            Ok(outcome) => {
                self.mark_synced();
                if !silent {
                    self.set_status(
                        StatusKind::Ok,
                        format!("Pulled {} shared record(s).", outcome.total()),
                    );
                }
                Ok(outcome)
            }
            Err(err) => {
                self.set_status(StatusKind::Error, format!("Pull failed: {}", err.compact()));
                Err(err)
            }
        }
    }

    /// Send the full local collection plus pending tombstones upstream.
    ///
    /// On success the pushed tombstones are cleared; on any failure the
    /// local state is left untouched so the next push retries the same
    /// payload.
    pub async fn push(&self, silent: bool) -> Result<SyncResponse, SyncError> {
        let Some((api_url, workspace_key)) = self.config.endpoint() else {
            return Err(self.not_configured(silent));
        };
        if !self.begin_pending(silent) {
            return Err(SyncError::Busy);
        }

        let result = self.guarded(self.push_once(&api_url, &workspace_key)).await;
        self.end_pending();

        match result {
            Ok(response) => {
                self.mark_synced();
                if !silent {
                    self.set_status(
                        StatusKind::Ok,
                        format!(
                            "Pushed {} upsert(s) and {} deletion(s).",
                            response.applied_upserts, response.applied_deletions
                        ),
                    );
                }
                Ok(response)
            }
            Err(err) => {
                self.set_status(StatusKind::Error, format!("Push failed: {}", err.compact()));
                Err(err)
            }
        }
    }

    async fn pull_once(
        &self,
        api_url: &str,
        workspace_key: &str,
    ) -> Result<ReconcileOutcome, SyncError> {
        let app_key = lock(&self.store).schema().app_key.clone();
        let url = format!("{api_url}/ops/workspaces/{workspace_key}/records");
        let response = self
            .http
            .get(&url)
            .query(&[("app", app_key.as_str())])
            .send()
            .await
            .map_err(|err| self.request_error(err))?;
        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }
        let body: RecordsResponse = response
            .json()
            .await
            .map_err(|err| self.request_error(err))?;

        tracing::debug!(
            workspace = %workspace_key,
            app = %app_key,
            records = body.records.len(),
            "Pulled remote records"
        );
        let outcome = lock(&self.store).apply_remote(body.records);
        self.persist();
        Ok(outcome)
    }

    async fn push_once(
        &self,
        api_url: &str,
        workspace_key: &str,
    ) -> Result<SyncResponse, SyncError> {
        let (app_key, records, tombstones) = {
            let store = lock(&self.store);
            (
                store.schema().app_key.clone(),
                store.records(),
                store.tombstones(),
            )
        };
        let request = SyncRequest::from_state(&records, &tombstones);
        request.validate()?;

        let url = format!("{api_url}/ops/workspaces/{workspace_key}/sync");
        let response = self
            .http
            .post(&url)
            .query(&[("app", app_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|err| self.request_error(err))?;
        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }
        let body: SyncResponse = response
            .json()
            .await
            .map_err(|err| self.request_error(err))?;

        tracing::debug!(
            workspace = %workspace_key,
            app = %app_key,
            upserts = body.applied_upserts,
            deletions = body.applied_deletions,
            "Push acknowledged"
        );
        lock(&self.store).acknowledge_push(&tombstones);
        self.persist();
        Ok(body)
    }

    // ------------------------------------------------------------------
    // Auto sync
    // ------------------------------------------------------------------

    /// Start auto sync: periodic silent pulls plus a debounced silent
    /// push after each local mutation.
    ///
    /// No-op unless the session is configured for sharing and a Tokio
    /// runtime is current. The first automatic pull fires one full
    /// interval after this call, not immediately.
    pub fn start_auto_sync(&self) {
        if !self.config.is_ready() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("Auto sync requires a running Tokio runtime");
            return;
        };

        let mut auto = lock(&self.auto);
        if auto.enabled {
            return;
        }

        let weak = self.weak.clone();
        let every = self.config.pull_interval;
        auto.pull_task = Some(handle.spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval fires immediately; swallow that first tick
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(session) = weak.upgrade() else { break };
                let _ = session.pull(true).await;
            }
        }));
        auto.runtime = Some(handle);
        auto.enabled = true;
        drop(auto);

        self.set_status(
            StatusKind::Ok,
            format!(
                "Auto sync enabled. Local changes will push and pulls run every {}s.",
                self.config.pull_interval.as_secs()
            ),
        );
    }

    /// Stop the pull timer and drop any pending debounced push.
    pub fn stop_auto_sync(&self) {
        let mut auto = lock(&self.auto);
        let was_enabled = auto.enabled;
        auto.enabled = false;
        auto.runtime = None;
        if let Some(task) = auto.pull_task.take() {
            task.abort();
        }
        if let Some(task) = auto.push_task.take() {
            task.abort();
        }
        drop(auto);

        if was_enabled {
            self.set_status(
                StatusKind::Neutral,
                "Auto sync disabled. Use Pull/Push manually.",
            );
        }
    }

    /// Whether auto sync is currently running.
    pub fn is_auto_sync_enabled(&self) -> bool {
        lock(&self.auto).enabled
    }

    fn schedule_push(&self) {
        let mut auto = lock(&self.auto);
        if !auto.enabled {
            return;
        }
        let Some(handle) = auto.runtime.clone() else {
            return;
        };

        let weak = self.weak.clone();
        let delay = self.config.push_debounce;
        let task = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(session) = weak.upgrade() else { return };
            let _ = session.push(true).await;
        });
        if let Some(previous) = auto.push_task.replace(task) {
            previous.abort();
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn guarded<T>(
        &self,
        op: impl Future<Output = Result<T, SyncError>>,
    ) -> Result<T, SyncError> {
        let deadline = self.config.request_timeout + self.config.guard_slack;
        match tokio::time::timeout(deadline, op).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::GuardTimeout),
        }
    }

    fn begin_pending(&self, silent: bool) -> bool {
        if self
            .pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            if !silent {
                self.set_status(StatusKind::Neutral, SyncError::Busy.to_string());
            }
            return false;
        }
        true
    }

    fn end_pending(&self) {
        self.pending.store(false, Ordering::SeqCst);
    }

    fn not_configured(&self, silent: bool) -> SyncError {
        if !silent {
            self.set_status(StatusKind::Neutral, SyncError::NotConfigured.to_string());
        }
        SyncError::NotConfigured
    }

    fn mark_synced(&self) {
        lock(&self.status).last_synced_at = Some(timestamp::now_iso());
    }

    fn set_status(&self, kind: StatusKind, message: impl Into<String>) {
        let mut status = lock(&self.status);
        status.kind = kind;
        status.message = message.into();
    }

    fn request_error(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::RequestTimeout {
                seconds: self.config.request_timeout.as_secs(),
            }
        } else {
            SyncError::Transport(err.to_string())
        }
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        let mut auto = lock(&self.auto);
        if let Some(task) = auto.pull_task.take() {
            task.abort();
        }
        if let Some(task) = auto.push_task.take() {
            task.abort();
        }
    }
}

async fn remote_error(response: reqwest::Response) -> SyncError {
    let status = response.status().as_u16();
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body
            .error
            .unwrap_or_else(|| format!("Request failed ({status})")),
        Err(_) => format!("Request failed ({status})"),
    };
    SyncError::Remote { status, message }
}

fn write_snapshot(path: &Path, snapshot: &StoreSnapshot) -> Result<(), SyncError> {
    let json = snapshot.to_json()?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
