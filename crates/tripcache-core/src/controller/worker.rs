//! The network cache controller.
//!
//! A dispatcher over the worker lifecycle (install, activate, fetch,
//! message, sync) with its collaborators injected at construction. Every
//! handler can be called directly, which is how the tests drive it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::try_join_all;
use tracing::{debug, error, info, warn};

use super::clients::ClientRegistry;
use super::messages::{ClientMessage, TripPackagePayload};
use crate::cache::{CacheNames, CacheStorage};
use crate::clock::{Clock, SystemClock};
use crate::error::{OfflineError, Result};
use crate::fetch::Fetcher;
use crate::http::{Request, Response};
use crate::sync::{ReconnectNotifier, DEFAULT_SYNC_TAG};

/// Fallback page served when the network is unreachable.
pub const DEFAULT_OFFLINE_PAGE: &str = "/offline.html";

/// Prefix of the synthetic URLs trip packages are stored under.
pub const DEFAULT_TRIP_PACKAGE_PREFIX: &str = "/offline/trips";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Waiting,
    Active,
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Lifecycle and traffic events the host platform delivers.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Message(ClientMessage),
    Sync { tag: String },
}

#[derive(Debug)]
pub enum EventOutcome {
    Installed(WorkerState),
    Activated { deleted: Vec<String> },
    Fetched(FetchOutcome),
    MessageHandled,
    Synced { notified: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    OfflineFallback,
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub response: Response,
    pub source: ResponseSource,
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// App-shell URLs cached on install. All must succeed.
    pub manifest: Vec<String>,
    /// Cached page served when a request cannot reach the network.
    pub offline_page: String,
    /// Trip packages are stored under `<prefix>/<groupId>`.
    pub trip_package_prefix: String,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            manifest: vec!["/".to_string(), DEFAULT_OFFLINE_PAGE.to_string()],
            offline_page: DEFAULT_OFFLINE_PAGE.to_string(),
            trip_package_prefix: DEFAULT_TRIP_PACKAGE_PREFIX.to_string(),
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

pub struct NetworkCacheController {
    names: CacheNames,
    options: ControllerOptions,
    caches: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    clients: ClientRegistry,
    notifier: ReconnectNotifier,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
}

impl NetworkCacheController {
    pub fn new(
        names: CacheNames,
        options: ControllerOptions,
        caches: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let clients = ClientRegistry::new();
        let notifier = ReconnectNotifier::new(clients.clone(), DEFAULT_SYNC_TAG);
        Self {
            names,
            options,
            caches,
            fetcher,
            clock: Arc::new(SystemClock),
            clients,
            notifier,
            state: Mutex::new(WorkerState::Installing),
            skip_waiting: AtomicBool::new(false),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use an existing set of client connections.
    pub fn with_clients(mut self, clients: ClientRegistry) -> Self {
        self.notifier = self.notifier.with_clients(clients.clone());
        self.clients = clients;
        self
    }

    /// Replace the reconnect notifier. It is rebound to this controller's
    /// clients.
    pub fn with_notifier(mut self, notifier: ReconnectNotifier) -> Self {
        self.notifier = notifier.with_clients(self.clients.clone());
        self
    }

    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, next: WorkerState) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let previous = *state;
        if previous != next {
            info!(from = %previous, to = %next, "Worker state changed");
            *state = next;
        }
    }

    /// Synthetic URL a group's trip package is cached under.
    pub fn trip_package_url(&self, group_id: &str) -> String {
        format!(
            "{}/{}",
            self.options.trip_package_prefix.trim_end_matches('/'),
            group_id
        )
    }

    /// Route a platform event to its handler.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome> {
        match event {
            WorkerEvent::Install => self.install().await.map(EventOutcome::Installed),
            WorkerEvent::Activate => self
                .activate()
                .await
                .map(|deleted| EventOutcome::Activated { deleted }),
            WorkerEvent::Fetch(request) => self.handle_fetch(&request).await.map(EventOutcome::Fetched),
            WorkerEvent::Message(message) => self
                .handle_message(message)
                .await
                .map(|()| EventOutcome::MessageHandled),
            WorkerEvent::Sync { tag } => self
                .handle_sync(&tag)
                .await
                .map(|notified| EventOutcome::Synced { notified }),
        }
    }

    // ===== Install =====

    /// Cache the whole app-shell manifest. Nothing is stored unless every
    /// entry was fetched successfully; any failure makes the worker
    /// redundant.
    pub async fn install(&self) -> Result<WorkerState> {
        let current = self.state();
        if current != WorkerState::Installing {
            return Err(OfflineError::Lifecycle(format!("cannot install while {}", current)));
        }

        info!(cache = %self.names.app_shell, entries = self.options.manifest.len(), "Installing app shell");

        if let Err(e) = self.cache_manifest().await {
            error!(error = %e, "App shell install failed");
            self.set_state(WorkerState::Redundant);
            return Err(e);
        }

        self.set_state(WorkerState::Waiting);
        if self.skip_waiting.load(Ordering::SeqCst) {
            self.activate().await?;
        }
        Ok(self.state())
    }

    async fn cache_manifest(&self) -> Result<()> {
        let cache = &self.names.app_shell;
        self.caches.open(cache).await?;

        let fetches = self.options.manifest.iter().map(|url| async move {
            let response = self
                .fetcher
                .fetch(&Request::get(url.as_str()))
                .await
                .map_err(|e| OfflineError::InstallFailed {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;
            if !response.is_ok() {
                return Err(OfflineError::InstallFailed {
                    url: url.clone(),
                    reason: format!("status {}", response.status),
                });
            }
            Ok::<_, OfflineError>((url, response))
        });
        let fetched = try_join_all(fetches).await?;

        for (url, response) in fetched {
            self.caches
                .put(cache, url, response)
                .await
                .map_err(|e| OfflineError::InstallFailed {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }

    // ===== Activate =====

    /// Delete every cache generation that is not current, then take control
    /// of open clients. Returns the names of the deleted caches.
    pub async fn activate(&self) -> Result<Vec<String>> {
        match self.state() {
            WorkerState::Waiting => {}
            WorkerState::Active => return Ok(Vec::new()),
            other => {
                return Err(OfflineError::Lifecycle(format!("cannot activate while {}", other)));
            }
        }

        let mut deleted = Vec::new();
        for name in self.caches.keys().await? {
            if self.names.is_current(&name) {
                continue;
            }
            match self.caches.delete(&name).await {
                Ok(_) => {
                    debug!(cache = %name, "Deleted stale cache generation");
                    deleted.push(name);
                }
                Err(e) => warn!(cache = %name, error = %e, "Failed to delete stale cache"),
            }
        }

        self.set_state(WorkerState::Active);
        let claimed = self.clients.claim();
        info!(deleted = deleted.len(), claimed, "Worker activated");
        Ok(deleted)
    }

    /// Mark this worker as replaced by a newer version.
    pub fn supersede(&self) {
        self.set_state(WorkerState::Redundant);
    }

    // ===== Fetch =====

    /// Cache-first fetch. A hit is returned without touching the network;
    /// a miss goes to the network and same-origin 200s are stored; an
    /// unreachable network falls back to the cached offline page.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome> {
        if self.state() != WorkerState::Active || !request.is_cacheable() {
            let response = self.fetcher.fetch(request).await?;
            return Ok(FetchOutcome {
                response,
                source: ResponseSource::Network,
            });
        }

        if let Some(response) = self.lookup(&request.url).await {
            debug!(url = %request.url, "Served from cache");
            return Ok(FetchOutcome {
                response,
                source: ResponseSource::Cache,
            });
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    if let Err(e) = self
                        .caches
                        .put(&self.names.app_shell, &request.url, response.clone())
                        .await
                    {
                        warn!(url = %request.url, error = %e, "Failed to cache response");
                    }
                }
                Ok(FetchOutcome {
                    response,
                    source: ResponseSource::Network,
                })
            }
            Err(e) if e.is_network() => {
                let fallback = self
                    .caches
                    .match_request(&self.names.app_shell, &self.options.offline_page)
                    .await
                    .unwrap_or_else(|cache_err| {
                        warn!(error = %cache_err, "Offline page lookup failed");
                        None
                    });
                match fallback {
                    Some(response) => {
                        debug!(url = %request.url, error = %e, "Network unreachable, serving offline page");
                        Ok(FetchOutcome {
                            response,
                            source: ResponseSource::OfflineFallback,
                        })
                    }
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// App-shell cache first, then the tile cache so pre-fetched map tiles
    /// are served offline.
    async fn lookup(&self, url: &str) -> Option<Response> {
        for cache in [&self.names.app_shell, &self.names.tiles] {
            match self.caches.match_request(cache, url).await {
                Ok(Some(response)) => return Some(response),
                Ok(None) => {}
                Err(e) => warn!(cache = %cache, url, error = %e, "Cache lookup failed"),
            }
        }
        None
    }

    // ===== Messages =====

    pub async fn handle_message(&self, message: ClientMessage) -> Result<()> {
        match message {
            ClientMessage::SkipWaiting => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                if self.state() == WorkerState::Waiting {
                    self.activate().await?;
                }
                Ok(())
            }
            ClientMessage::CacheTripPackage { payload } => self.cache_trip_package(payload).await,
        }
    }

    async fn cache_trip_package(&self, payload: TripPackagePayload) -> Result<()> {
        let url = self.trip_package_url(&payload.group_id);
        let response = Response::json(&payload.data)?
            .with_header("date", self.clock.now().to_rfc2822());

        match self.caches.put(&self.names.app_shell, &url, response).await {
            Ok(()) => debug!(group_id = %payload.group_id, %url, "Trip package cached"),
            Err(e) => warn!(group_id = %payload.group_id, error = %e, "Failed to cache trip package"),
        }
        Ok(())
    }

    // ===== Sync =====

    /// Forward a connectivity-restored signal to the reconnect notifier.
    pub async fn handle_sync(&self, tag: &str) -> Result<usize> {
        match self.notifier.notify(tag).await {
            Err(OfflineError::SyncUnsupported) => {
                warn!(tag, "Background sync unsupported, clients must refresh manually");
                Ok(0)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStorage;
    use crate::clock::FixedClock;
    use crate::controller::OutboundMessage;
    use crate::http::ResponseType;
    use crate::testing::{ReadOnlyCache, StubFetcher};
    use chrono::TimeZone;
    use serde_json::json;

    const SHELL: &str = "shell-v2";
    const TILES: &str = "tiles-v1";
    const ROOT: &str = "https://app.test/";
    const OFFLINE: &str = "https://app.test/offline.html";
    const APP_JS: &str = "https://app.test/app.js";

    fn options() -> ControllerOptions {
        ControllerOptions {
            manifest: vec![ROOT.to_string(), OFFLINE.to_string(), APP_JS.to_string()],
            offline_page: OFFLINE.to_string(),
            trip_package_prefix: "https://app.test/offline/trips".to_string(),
        }
    }

    fn scripted_fetcher() -> Arc<StubFetcher> {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.ok(ROOT, "<html>app</html>");
        fetcher.ok(OFFLINE, "<html>offline</html>");
        fetcher.ok(APP_JS, "console.log(1)");
        fetcher
    }

    fn controller(caches: MemoryCacheStorage, fetcher: Arc<StubFetcher>) -> NetworkCacheController {
        NetworkCacheController::new(
            CacheNames::new(SHELL, TILES),
            options(),
            Arc::new(caches),
            fetcher,
        )
    }

    async fn active(caches: MemoryCacheStorage, fetcher: Arc<StubFetcher>) -> NetworkCacheController {
        let controller = controller(caches, fetcher);
        assert_eq!(controller.install().await.unwrap(), WorkerState::Waiting);
        controller.activate().await.unwrap();
        controller
    }

    #[tokio::test]
    async fn test_install_caches_full_manifest() {
        let caches = MemoryCacheStorage::new();
        let controller = controller(caches.clone(), scripted_fetcher());

        assert_eq!(controller.state(), WorkerState::Installing);
        assert_eq!(controller.install().await.unwrap(), WorkerState::Waiting);

        let mut entries = caches.entries(SHELL).await.unwrap();
        entries.sort();
        assert_eq!(entries, vec![ROOT, APP_JS, OFFLINE]);
    }

    #[tokio::test]
    async fn test_install_fails_whole_on_single_entry_failure() {
        let caches = MemoryCacheStorage::new();
        let fetcher = scripted_fetcher();
        fetcher.fail(APP_JS);
        let controller = controller(caches.clone(), fetcher);

        let err = controller.install().await.unwrap_err();
        assert!(matches!(err, OfflineError::InstallFailed { ref url, .. } if url.as_str() == APP_JS));
        assert_eq!(controller.state(), WorkerState::Redundant);
        assert!(caches.entries(SHELL).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_rejects_error_status() {
        let fetcher = scripted_fetcher();
        fetcher.respond(APP_JS, Response::new(404, ResponseType::Basic, "missing"));
        let controller = controller(MemoryCacheStorage::new(), fetcher);
        assert!(controller.install().await.is_err());
        assert_eq!(controller.state(), WorkerState::Redundant);
    }

    #[tokio::test]
    async fn test_skip_waiting_before_install_activates_immediately() {
        let controller = controller(MemoryCacheStorage::new(), scripted_fetcher());
        controller.handle_message(ClientMessage::SkipWaiting).await.unwrap();
        assert_eq!(controller.state(), WorkerState::Installing);
        assert_eq!(controller.install().await.unwrap(), WorkerState::Active);
    }

    #[tokio::test]
    async fn test_skip_waiting_while_waiting_activates() {
        let controller = controller(MemoryCacheStorage::new(), scripted_fetcher());
        controller.install().await.unwrap();
        assert_eq!(controller.state(), WorkerState::Waiting);
        controller.handle_message(ClientMessage::SkipWaiting).await.unwrap();
        assert_eq!(controller.state(), WorkerState::Active);
    }

    #[tokio::test]
    async fn test_activate_sweeps_stale_generations() {
        let caches = MemoryCacheStorage::new();
        caches.open("shell-v1").await.unwrap();
        caches.open(TILES).await.unwrap();
        caches.open("tiles-v0").await.unwrap();
        let controller = controller(caches.clone(), scripted_fetcher());
        controller.install().await.unwrap();

        let mut deleted = controller.activate().await.unwrap();
        deleted.sort();
        assert_eq!(deleted, vec!["shell-v1", "tiles-v0"]);
        assert_eq!(caches.keys().await.unwrap(), vec![SHELL, TILES]);
        assert_eq!(controller.state(), WorkerState::Active);
    }

    #[tokio::test]
    async fn test_activate_whitelist_retains_current_only() {
        let caches = MemoryCacheStorage::new();
        caches.open("v1").await.unwrap();
        caches.open("v2").await.unwrap();
        let fetcher = scripted_fetcher();
        let controller = NetworkCacheController::new(
            CacheNames::new("v2", "v2"),
            options(),
            Arc::new(caches.clone()),
            fetcher,
        );
        controller.install().await.unwrap();
        controller.activate().await.unwrap();
        assert_eq!(caches.keys().await.unwrap(), vec!["v2"]);
    }

    #[tokio::test]
    async fn test_activate_claims_open_clients() {
        let controller = controller(MemoryCacheStorage::new(), scripted_fetcher());
        let client = controller.clients().connect();
        controller.install().await.unwrap();
        assert!(!controller.clients().is_controlled(client.id));
        controller.activate().await.unwrap();
        assert!(controller.clients().is_controlled(client.id));
    }

    #[tokio::test]
    async fn test_activate_before_install_is_rejected() {
        let controller = controller(MemoryCacheStorage::new(), scripted_fetcher());
        assert!(matches!(controller.activate().await, Err(OfflineError::Lifecycle(_))));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let fetcher = scripted_fetcher();
        let controller = active(MemoryCacheStorage::new(), Arc::clone(&fetcher)).await;
        let before = fetcher.call_count(APP_JS);

        let outcome = controller.handle_fetch(&Request::get(APP_JS)).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Cache);
        assert_eq!(outcome.response.text(), "console.log(1)");
        assert_eq!(fetcher.call_count(APP_JS), before);
    }

    #[tokio::test]
    async fn test_evicted_entry_refetched_and_recached() {
        let caches = MemoryCacheStorage::new();
        let fetcher = scripted_fetcher();
        let controller = active(caches.clone(), Arc::clone(&fetcher)).await;

        assert!(caches.delete_entry(SHELL, APP_JS).await.unwrap());
        let before = fetcher.call_count(APP_JS);

        let first = controller.handle_fetch(&Request::get(APP_JS)).await.unwrap();
        assert_eq!(first.source, ResponseSource::Network);
        assert_eq!(fetcher.call_count(APP_JS), before + 1);
        assert!(caches.match_request(SHELL, APP_JS).await.unwrap().is_some());

        let second = controller.handle_fetch(&Request::get(APP_JS)).await.unwrap();
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(fetcher.call_count(APP_JS), before + 1);
    }

    #[tokio::test]
    async fn test_non_basic_or_non_200_not_cached() {
        let caches = MemoryCacheStorage::new();
        let fetcher = scripted_fetcher();
        let cdn = "https://cdn.test/lib.js";
        let created = "https://app.test/api/groups";
        fetcher.respond(cdn, Response::new(200, ResponseType::Cors, "lib"));
        fetcher.respond(created, Response::new(201, ResponseType::Basic, "{}"));
        let controller = active(caches.clone(), fetcher).await;

        let outcome = controller.handle_fetch(&Request::get(cdn)).await.unwrap();
        assert_eq!(outcome.response.text(), "lib");
        let outcome = controller.handle_fetch(&Request::get(created)).await.unwrap();
        assert_eq!(outcome.response.status, 201);

        assert!(caches.match_request(SHELL, cdn).await.unwrap().is_none());
        assert!(caches.match_request(SHELL, created).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_network_failure_serves_offline_page() {
        let fetcher = scripted_fetcher();
        let controller = active(MemoryCacheStorage::new(), Arc::clone(&fetcher)).await;
        fetcher.set_offline(true);

        let outcome = controller
            .handle_fetch(&Request::get("https://app.test/groups/7"))
            .await
            .unwrap();
        assert_eq!(outcome.source, ResponseSource::OfflineFallback);
        assert_eq!(outcome.response.text(), "<html>offline</html>");
    }

    #[tokio::test]
    async fn test_network_failure_without_offline_page_propagates() {
        let caches = MemoryCacheStorage::new();
        let fetcher = scripted_fetcher();
        let controller = active(caches.clone(), Arc::clone(&fetcher)).await;
        caches.delete_entry(SHELL, OFFLINE).await.unwrap();
        fetcher.set_offline(true);

        let err = controller
            .handle_fetch(&Request::get("https://app.test/groups/7"))
            .await
            .unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_tile_cache_served_offline() {
        let caches = MemoryCacheStorage::new();
        let fetcher = scripted_fetcher();
        let tile = "https://tile.test/5/16/10.png";
        caches
            .put(TILES, tile, Response::new(200, ResponseType::Cors, "png"))
            .await
            .unwrap();
        let controller = active(caches, Arc::clone(&fetcher)).await;
        fetcher.set_offline(true);

        let outcome = controller.handle_fetch(&Request::get(tile)).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Cache);
        assert_eq!(outcome.response.text(), "png");
    }

    #[tokio::test]
    async fn test_cache_write_failure_is_swallowed() {
        let storage = ReadOnlyCache::default();
        let fetcher = scripted_fetcher();
        let extra = "https://app.test/extra.css";
        fetcher.ok(extra, "body{}");
        storage.inner.open(SHELL).await.unwrap();
        let controller = NetworkCacheController::new(
            CacheNames::new(SHELL, TILES),
            ControllerOptions {
                manifest: vec![],
                ..options()
            },
            Arc::new(storage),
            fetcher,
        );
        controller.install().await.unwrap();
        controller.activate().await.unwrap();

        let outcome = controller.handle_fetch(&Request::get(extra)).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Network);
        assert_eq!(outcome.response.text(), "body{}");

        controller
            .handle_message(ClientMessage::CacheTripPackage {
                payload: TripPackagePayload {
                    group_id: "g1".to_string(),
                    data: json!({}),
                },
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_not_active_passes_through() {
        let caches = MemoryCacheStorage::new();
        let fetcher = scripted_fetcher();
        let controller = controller(caches.clone(), Arc::clone(&fetcher));
        controller.install().await.unwrap();

        let outcome = controller.handle_fetch(&Request::get(ROOT)).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Network);
    }

    #[tokio::test]
    async fn test_mutations_bypass_cache() {
        let fetcher = scripted_fetcher();
        let controller = active(MemoryCacheStorage::new(), Arc::clone(&fetcher)).await;
        fetcher.set_offline(true);

        let post = Request::new(crate::http::Method::Post, ROOT);
        let err = controller.handle_fetch(&post).await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_trip_package_retrievable_as_cached_resource() {
        let caches = MemoryCacheStorage::new();
        let fetcher = scripted_fetcher();
        let at = chrono::Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let controller = active(caches, Arc::clone(&fetcher))
            .await
            .with_clock(Arc::new(FixedClock(at)));

        let data = json!({"group": {"id": "g-9", "name": "Porto"}, "expenses": [1, 2]});
        controller
            .dispatch(WorkerEvent::Message(ClientMessage::CacheTripPackage {
                payload: TripPackagePayload {
                    group_id: "g-9".to_string(),
                    data: data.clone(),
                },
            }))
            .await
            .unwrap();

        fetcher.set_offline(true);
        let url = controller.trip_package_url("g-9");
        assert_eq!(url, "https://app.test/offline/trips/g-9");
        let outcome = controller.handle_fetch(&Request::get(url)).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Cache);
        assert_eq!(outcome.response.header("content-type"), Some("application/json"));
        assert_eq!(outcome.response.header("date"), Some(at.to_rfc2822().as_str()));
        let body: serde_json::Value = serde_json::from_slice(&outcome.response.body).unwrap();
        assert_eq!(body, data);
    }

    #[tokio::test]
    async fn test_dispatch_sync_notifies_clients() {
        let controller = controller(MemoryCacheStorage::new(), scripted_fetcher());
        let mut client = controller.clients().connect();

        let outcome = controller
            .dispatch(WorkerEvent::Sync {
                tag: DEFAULT_SYNC_TAG.to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Synced { notified: 1 }));
        assert_eq!(client.rx.recv().await, Some(OutboundMessage::sync_queue()));
    }

    #[tokio::test]
    async fn test_sync_unsupported_is_swallowed() {
        let controller = controller(MemoryCacheStorage::new(), scripted_fetcher())
            .with_notifier(ReconnectNotifier::unsupported(ClientRegistry::new()));
        let mut client = controller.clients().connect();
        assert_eq!(controller.handle_sync(DEFAULT_SYNC_TAG).await.unwrap(), 0);
        assert!(client.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_supersede_marks_redundant() {
        let controller = active(MemoryCacheStorage::new(), scripted_fetcher()).await;
        controller.supersede();
        assert_eq!(controller.state(), WorkerState::Redundant);
    }
}
