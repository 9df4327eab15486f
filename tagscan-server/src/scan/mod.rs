//! Scan resolution pipeline
//!
//! A tag scan is acknowledged by the HTTP handler immediately and resolved on a
//! tracked background task:
//!
//! 1. Debounce: an immediate repeat of the previous tag is dropped.
//! 2. Look the tag up in the store.
//! 3. Known tag: notify, then append a log entry.
//!    Unknown tag: arm the pending-tag slot and notify with a bind hint.
//!
//! Concurrency is capped by a semaphore. Store calls share one deadline per
//! scan, measured from the moment the scan holds its permit.

mod debounce;
mod pending;

pub use debounce::DebounceFilter;
pub use pending::PendingTagRegistry;

use crate::notify::Notifier;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tagscan_common::config::{
    Settings, DEFAULT_MAX_CONCURRENT_SCANS, DEFAULT_SCAN_TIMEOUT_SECS, MAX_SCAN_TIMEOUT_SECS,
};
use tagscan_common::{Error, Result, Store};
use tokio::sync::Semaphore;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Tunables for [`ScanResolver`]
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Budget for the store calls of one scan, and for each notification
    pub scan_timeout: Duration,
    pub max_concurrent_scans: usize,
    /// Admin UI base URL without trailing slash
    pub base_url: Option<String>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            scan_timeout: Duration::from_secs(DEFAULT_SCAN_TIMEOUT_SECS),
            max_concurrent_scans: DEFAULT_MAX_CONCURRENT_SCANS,
            base_url: None,
        }
    }
}

impl From<&Settings> for ResolverOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            scan_timeout: settings.scan_timeout,
            max_concurrent_scans: settings.max_concurrent_scans,
            base_url: settings.base_url.clone(),
        }
    }
}

/// What a single scan resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Same tag as the previous scan; nothing happened
    Suppressed,
    /// Known tag; a log entry was written
    Logged { item_id: u64, log_id: u64 },
    /// Known tag, but the log write failed
    LogFailed { item_id: u64 },
    /// Unknown tag; it is now the pending tag
    Armed,
    /// Lookup failed for a reason other than "not found"
    LoadFailed,
}

pub struct ScanResolver {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    pending: PendingTagRegistry,
    debounce: DebounceFilter,
    tasks: TaskTracker,
    permits: Arc<Semaphore>,
    options: ResolverOptions,
}

impl ScanResolver {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        options: ResolverOptions,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(options.max_concurrent_scans.max(1)));
        Self {
            store,
            notifier,
            pending: PendingTagRegistry::new(),
            debounce: DebounceFilter::new(),
            tasks: TaskTracker::new(),
            permits,
            options,
        }
    }

    /// Queue a scan for background resolution and return immediately
    ///
    /// Repeat suppression happens here, in arrival order, before any task is spawned.
    pub fn submit(self: &Arc<Self>, tag: impl Into<String>) {
        let tag = tag.into();
        if self.debounce.should_suppress(&tag) {
            debug!(tag = %tag, "Suppressing repeated scan");
            return;
        }
        let resolver = Arc::clone(self);

        self.tasks.spawn(async move {
            let _permit = match Arc::clone(&resolver.permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(tag = %tag, "Scan dropped: resolver is shutting down");
                    return;
                }
            };
            let outcome = resolver.resolve_unfiltered(&tag).await;
            debug!(tag = %tag, ?outcome, "Scan resolved");
        });
    }

    /// Resolve one scan on the calling task
    ///
    /// Does not take a concurrency permit; [`submit`](Self::submit) does that.
    pub async fn resolve(&self, tag: &str) -> ScanOutcome {
        if self.debounce.should_suppress(tag) {
            debug!(tag, "Suppressing repeated scan");
            return ScanOutcome::Suppressed;
        }
        self.resolve_unfiltered(tag).await
    }

    async fn resolve_unfiltered(&self, tag: &str) -> ScanOutcome {
        let deadline = self.scan_deadline();

        match self.bounded(deadline, self.store.get_item_by_tag(tag)).await {
            Ok(item) => {
                info!(tag, item_id = item.id, name = %item.name, "Scanned known item");
                self.notify(&format!("Scanned {}", item)).await;

                match self.bounded(deadline, self.store.create_log(item.id)).await {
                    Ok(entry) => ScanOutcome::Logged {
                        item_id: item.id,
                        log_id: entry.id,
                    },
                    Err(e) => {
                        error!(tag, item_id = item.id, error = %e, "Failed to log scan");
                        self.notify(&format!("Could not log item: {}", e)).await;
                        ScanOutcome::LogFailed { item_id: item.id }
                    }
                }
            }
            Err(e) if e.is_not_found() => {
                info!(tag, "Unknown tag scanned, arming pending tag");
                self.pending.arm(tag);
                self.notify(&self.unknown_tag_message(tag)).await;
                ScanOutcome::Armed
            }
            Err(e) => {
                error!(tag, error = %e, "Failed to load item for tag");
                self.notify(&format!("Could not load item: {}", e)).await;
                ScanOutcome::LoadFailed
            }
        }
    }

    /// Options built in code skip the config range check, so the budget may not fit an `Instant`
    fn scan_deadline(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(self.options.scan_timeout)
            .unwrap_or_else(|| now + Duration::from_secs(MAX_SCAN_TIMEOUT_SECS))
    }

    async fn bounded<T>(
        &self,
        deadline: Instant,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match timeout_at(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "store call exceeded {}s scan budget",
                self.options.scan_timeout.as_secs_f64()
            ))),
        }
    }

    async fn notify(&self, message: &str) {
        // Own budget, so a failure report still goes out after a store timeout
        if timeout(self.options.scan_timeout, self.notifier.send(message))
            .await
            .is_err()
        {
            warn!("Notification timed out");
        }
    }

    fn unknown_tag_message(&self, tag: &str) -> String {
        let hint = "Unknown tag scanned; bind it in the admin UI";
        let link = self.options.base_url.as_deref().and_then(|base| {
            reqwest::Url::parse_with_params(
                &format!("{}/items/new", base),
                &[("tag", tag), ("log", "true")],
            )
            .map_err(|e| warn!(base, error = %e, "Invalid base URL, omitting link"))
            .ok()
        });

        match link {
            Some(url) => format!("{}\n\nCreate new item at {}", hint, url),
            None => hint.to_string(),
        }
    }

    /// Currently armed unbound tag, if any
    pub fn pending_tag(&self) -> Option<String> {
        Some(self.pending.peek()).filter(|tag| !tag.is_empty())
    }

    /// Clear the pending tag if it is still `tag`
    pub fn clear_pending_tag_if(&self, tag: &str) -> bool {
        self.pending.clear_if_matches(tag)
    }

    pub fn clear_pending_tag(&self) {
        self.pending.clear();
    }

    /// Wait until every submitted scan has finished
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Stop accepting scans and wait up to `grace` for in-flight ones
    pub async fn shutdown(&self, grace: Duration) {
        self.permits.close();
        self.tasks.close();
        let in_flight = self.tasks.len();
        if in_flight > 0 {
            info!(in_flight, "Waiting for in-flight scans");
        }
        if timeout(grace, self.tasks.wait()).await.is_err() {
            warn!(
                remaining = self.tasks.len(),
                "Scan tasks still running after shutdown grace period"
            );
        }
    }
}
