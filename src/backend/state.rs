//! Backend State
//!
//! One service object owns everything the handlers touch: the collection,
//! playlists, views, the in-memory log, open connections, pending
//! correlation handles and the query cache. Constructed once at startup and
//! passed around by `Arc`; no ambient globals.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::warn;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message;

use crate::config::AppConfig;
use crate::game::{playlist, GameCollection, GameRecord, PlaylistRegistry};
use crate::search::{build_search_filter, filter_game_refs, order_games, ViewManager};

use super::launcher::GameLauncher;
use super::protocol::{Request, Response, SearchQuery};

/// One entry of the in-memory log, broadcast to clients as it is appended.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub source: String,
    pub content: String,
    pub timestamp: i64,
}

/// The ordered result list of one executed query.
pub struct QueryResults {
    pub query: SearchQuery,
    pub games: Vec<GameRecord>,
}

pub struct BackState {
    pub config: RwLock<AppConfig>,
    pub config_path: PathBuf,
    pub secret: String,
    pub collection: Arc<GameCollection>,
    pub playlists: Arc<PlaylistRegistry>,
    pub views: Arc<ViewManager>,
    pub launcher: Box<dyn GameLauncher>,
    pub connections: Arc<ConnectionRegistry>,
    pub pending: PendingRequests,
    log: Mutex<Vec<LogEntry>>,
    queries: Mutex<HashMap<String, Arc<QueryResults>>>,
    file_server_port: Mutex<Option<u16>>,
    shutdown_tx: watch::Sender<bool>,
}

impl BackState {
    pub fn new(
        config: AppConfig,
        config_path: PathBuf,
        secret: String,
        collection: Arc<GameCollection>,
        playlists: Arc<PlaylistRegistry>,
        launcher: Box<dyn GameLauncher>,
    ) -> Arc<Self> {
        let views = ViewManager::new(Arc::clone(&collection), Arc::clone(&playlists));
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            config: RwLock::new(config),
            config_path,
            secret,
            collection,
            playlists,
            views,
            launcher,
            connections: Arc::new(ConnectionRegistry::new()),
            pending: PendingRequests::new(),
            log: Mutex::new(Vec::new()),
            queries: Mutex::new(HashMap::new()),
            file_server_port: Mutex::new(None),
            shutdown_tx,
        })
    }

    pub fn set_file_server_port(&self, port: u16) {
        *self.file_server_port.lock() = Some(port);
    }

    pub fn file_server_port(&self) -> Option<u16> {
        *self.file_server_port.lock()
    }

    pub fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Append to the in-memory log, returning the entry and its index. The
    /// caller broadcasts the addition.
    pub fn append_log(&self, source: impl Into<String>, content: impl Into<String>) -> (LogEntry, usize) {
        let entry = LogEntry {
            source: source.into(),
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        let mut log = self.log.lock();
        log.push(entry.clone());
        (entry, log.len() - 1)
    }

    pub fn log_snapshot(&self) -> Vec<LogEntry> {
        self.log.lock().clone()
    }

    /// Execute a query, serving repeated requests from the cache. The cache
    /// key is the SHA-256 of the serialized query.
    pub fn query_games(&self, query: &SearchQuery) -> Arc<QueryResults> {
        let key = match serde_json::to_vec(query) {
            Ok(bytes) => hex::encode(Sha256::digest(&bytes)),
            Err(error) => {
                warn!("Uncacheable query: {error}");
                return Arc::new(self.execute_query(query));
            }
        };
        if let Some(cached) = self.queries.lock().get(&key) {
            return Arc::clone(cached);
        }
        let results = Arc::new(self.execute_query(query));
        self.queries.lock().insert(key, Arc::clone(&results));
        results
    }

    fn execute_query(&self, query: &SearchQuery) -> QueryResults {
        let all = self.collection.games();
        let selected = query
            .playlist_id
            .as_deref()
            .and_then(|id| self.playlists.find(id));

        let mut base: Vec<&GameRecord> = match &selected {
            Some(selected) => playlist::filter_playlist(selected, all),
            None => all.iter().collect(),
        };
        if let Some(platform) = &query.platform {
            base.retain(|game| &game.platform == platform);
        }

        let filter = build_search_filter(
            &query.search,
            selected.as_ref().and_then(|p| p.filter.as_ref()),
        );
        let mut games: Vec<GameRecord> = filter_game_refs(&base, &filter)
            .into_iter()
            .cloned()
            .collect();
        order_games(&mut games, query.order_by, query.order_reverse);

        QueryResults {
            query: query.clone(),
            games,
        }
    }

    /// Drop every cached query that involves the given playlist.
    pub fn invalidate_playlist_queries(&self, playlist_id: &str) {
        self.queries
            .lock()
            .retain(|_, cached| cached.query.playlist_id.as_deref() != Some(playlist_id));
    }
}

/// Writer channels of every authenticated connection. Connections are
/// registered only after the secret exchange, so broadcast can never reach
/// an unauthenticated socket.
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    connections: Mutex<HashMap<u64, mpsc::UnboundedSender<Message>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            connections: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, sender: mpsc::UnboundedSender<Message>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections.lock().insert(id, sender);
        id
    }

    pub fn remove(&self, id: u64) {
        self.connections.lock().remove(&id);
    }

    /// Send a response envelope to one connection. Returns false when the
    /// connection is gone.
    pub fn send_to(&self, id: u64, response: &Response) -> bool {
        let text = match serde_json::to_string(response) {
            Ok(text) => text,
            Err(error) => {
                warn!("Failed to serialize response: {error}");
                return false;
            }
        };
        let connections = self.connections.lock();
        match connections.get(&id) {
            Some(sender) => sender.send(Message::Text(text)).is_ok(),
            None => false,
        }
    }

    /// Send a response envelope to every authenticated connection,
    /// returning how many received it.
    pub fn broadcast(&self, response: &Response) -> usize {
        let text = match serde_json::to_string(response) {
            Ok(text) => text,
            Err(error) => {
                warn!("Failed to serialize broadcast: {error}");
                return 0;
            }
        };
        let connections = self.connections.lock();
        let mut count = 0;
        for sender in connections.values() {
            if sender.send(Message::Text(text.clone())).is_ok() {
                count += 1;
            }
        }
        count
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct PendingEntry {
    connection: u64,
    sender: oneshot::Sender<Request>,
}

/// Outstanding backend-originated requests, keyed by correlation id. Every
/// handle is removed on resolution *and* when its connection closes, so an
/// unanswered request cannot leak.
pub struct PendingRequests {
    inner: Mutex<HashMap<String, PendingEntry>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Register a correlation id for a request about to be sent to
    /// `connection`. The returned receiver resolves with the client's
    /// answer, or errors when the connection closes first.
    pub fn register(&self, connection: u64, id: String) -> oneshot::Receiver<Request> {
        let (sender, receiver) = oneshot::channel();
        self.inner.lock().insert(id, PendingEntry { connection, sender });
        receiver
    }

    /// Route an inbound response envelope to its waiting handle. Returns
    /// false when no request is registered under the id.
    pub fn complete(&self, id: &str, request: Request) -> bool {
        match self.inner.lock().remove(id) {
            Some(entry) => {
                // A dropped receiver just means the handler gave up waiting.
                let _ = entry.sender.send(request);
                true
            }
            None => false,
        }
    }

    /// Forget a correlation id whose request was never delivered.
    pub fn discard(&self, id: &str) {
        self.inner.lock().remove(id);
    }

    /// Drop every handle owned by a closing connection; their receivers
    /// resolve with an error.
    pub fn drop_connection(&self, connection: u64) {
        self.inner
            .lock()
            .retain(|_, entry| entry.connection != connection);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}
