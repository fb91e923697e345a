//! Session orchestration (spec §4.6): connection lifecycle plus the hierarchy
//! and per-view-text caches layered on top of the request manager.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;

use crate::archive::Value;
use crate::error::Error;
use crate::hierarchy::{AttributesGroup, HierarchyInfo, HierarchyNode};
use crate::port_prober;
use crate::request_manager::RequestManager;
use crate::transport::{ConnectionState, Transport};

/// Upper bound on concurrent per-view text-enrichment fetches (spec §4.4:
/// "fetched with bounded concurrency, never all at once").
const TEXT_FETCH_CONCURRENCY: usize = 10;

/// Timeout given to each port-probe connect attempt during auto-discovery.
const PROBE_TIMEOUT: Duration = Duration::from_millis(300);

/// A fetched hierarchy with every text-bearing view's extracted text already
/// resolved and attached, keyed by view oid.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedHierarchy {
    pub info: HierarchyInfo,
    pub text_by_view_oid: HashMap<u64, String>,
}

struct Cache {
    hierarchy: Option<HierarchyInfo>,
    text_by_view_oid: HashMap<u64, String>,
}

impl Cache {
    fn empty() -> Self {
        Self {
            hierarchy: None,
            text_by_view_oid: HashMap::new(),
        }
    }
}

/// The transport plus the request manager built on it. Kept together so a
/// teardown can replace both atomically with a fresh, `Idle` pair — spec §3:
/// "`Closed` and `Failed` are terminal; a new connection requires a fresh
/// instance."
struct Conn {
    transport: Transport,
    requests: RequestManager,
}

impl Conn {
    fn fresh() -> Self {
        let transport = Transport::new();
        let requests = RequestManager::new(transport.clone());
        Self { transport, requests }
    }
}

/// One client session against a single LookinServer instance.
///
/// Holds the transport, the typed request manager built on it, and the
/// hierarchy/text caches the spec's invalidation rules govern: a fresh
/// hierarchy fetch or any successful attribute modification clears the text
/// map, and disconnecting clears both. `conn` is replaced wholesale by a
/// fresh `Idle` pair on every teardown so the next `connect_*` call never
/// finds a terminal `Transport` (spec §4.6/§7: "the next tool call starts
/// from `Idle`").
pub struct Session {
    conn: RwLock<Conn>,
    cache: RwLock<Cache>,
    connect_lock: Mutex<()>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            conn: RwLock::new(Conn::fresh()),
            cache: RwLock::new(Cache::empty()),
            connect_lock: Mutex::new(()),
        }
    }

    async fn transport(&self) -> Transport {
        self.conn.read().await.transport.clone()
    }

    async fn requests(&self) -> RequestManager {
        self.conn.read().await.requests.clone()
    }

    pub async fn state(&self) -> ConnectionState {
        self.transport().await.state().await
    }

    pub async fn connected_port(&self) -> Option<u16> {
        self.transport().await.connected_port().await
    }

    /// Probe the fixed port range and connect to the first LookinServer
    /// found (spec §4.1).
    pub async fn connect_auto(&self) -> Result<u16, Error> {
        let _guard = self.connect_lock.lock().await;
        let port = port_prober::find_first(port_prober::PORT_RANGE, PROBE_TIMEOUT)
            .await
            .ok_or_else(|| Error::ConnectionFailed("no LookinServer found in the port range".into()))?;
        self.transport().await.connect(port).await?;
        Ok(port)
    }

    pub async fn connect_to(&self, port: u16) -> Result<(), Error> {
        let _guard = self.connect_lock.lock().await;
        self.transport().await.connect(port).await
    }

    /// Tear down the connection, clear both caches, and swap in a fresh
    /// `Conn` so the next `connect_auto`/`connect_to` starts from `Idle`
    /// instead of hitting the old transport's terminal `Closed` state.
    pub async fn disconnect(&self) {
        self.transport().await.disconnect().await;
        *self.conn.write().await = Conn::fresh();
        *self.cache.write().await = Cache::empty();
    }

    pub async fn ping(&self, timeout: Option<Duration>) -> Result<bool, Error> {
        match self.requests().await.ping(timeout).await {
            Ok(result) => Ok(result.alive),
            // Transport's reader loop always fails pending requests with
            // `NotConnected` on teardown, never `ReadError` (spec §4.2), so
            // that kind isn't matched here — only the outcomes the
            // transport can actually produce for a dropped connection.
            Err(err @ (Error::NotConnected | Error::SendError(_))) => {
                self.disconnect().await;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn app_info(&self, timeout: Option<Duration>) -> Result<crate::hierarchy::AppInfo, Error> {
        self.requests().await.app_info(timeout).await
    }

    /// Fetch the hierarchy fresh from the server, replacing the cached
    /// hierarchy and clearing the text cache (spec §4.6: "re-fetching the
    /// hierarchy invalidates all cached text").
    pub async fn refresh_hierarchy(&self, timeout: Option<Duration>) -> Result<HierarchyInfo, Error> {
        let info = match self.requests().await.hierarchy(timeout).await {
            Ok(info) => info,
            // Transport's reader loop always fails pending requests with
            // `NotConnected` on teardown, never `ReadError` (spec §4.2), so
            // that kind isn't matched here — only the outcomes the
            // transport can actually produce for a dropped connection.
            Err(err @ (Error::NotConnected | Error::SendError(_))) => {
                self.disconnect().await;
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        let mut cache = self.cache.write().await;
        cache.hierarchy = Some(info.clone());
        cache.text_by_view_oid.clear();
        Ok(info)
    }

    /// Return the cached hierarchy if present, otherwise fetch and cache it.
    pub async fn hierarchy(&self, timeout: Option<Duration>) -> Result<HierarchyInfo, Error> {
        if let Some(info) = self.cache.read().await.hierarchy.clone() {
            return Ok(info);
        }
        self.refresh_hierarchy(timeout).await
    }

    /// Fetch the hierarchy (using the cache when present) and enrich every
    /// text-bearing node with its extracted text, fetched with bounded
    /// concurrency (spec §4.4). Per-view enrichment failures are swallowed —
    /// a node simply has no entry in `text_by_view_oid` rather than failing
    /// the whole fetch.
    pub async fn hierarchy_with_text(&self, timeout: Option<Duration>) -> Result<EnrichedHierarchy, Error> {
        let info = self.hierarchy(timeout).await?;

        let mut targets = Vec::new();
        info.root.collect_text_bearing_oids(&mut targets);

        let mut missing: Vec<(u64, u64)> = Vec::new();
        {
            let cache = self.cache.read().await;
            for (view_oid, layer_oid) in &targets {
                if !cache.text_by_view_oid.contains_key(view_oid) {
                    missing.push((*view_oid, *layer_oid));
                }
            }
        }

        for chunk in missing.chunks(TEXT_FETCH_CONCURRENCY) {
            let mut set: JoinSet<(u64, Result<Vec<AttributesGroup>, Error>)> = JoinSet::new();
            for &(view_oid, layer_oid) in chunk {
                let requests = self.requests().await;
                set.spawn(async move {
                    (view_oid, requests.all_attr_groups(layer_oid, None).await)
                });
            }
            while let Some(joined) = set.join_next().await {
                let (view_oid, result) = match joined {
                    Ok(pair) => pair,
                    Err(_) => continue,
                };
                if let Ok(groups) = result {
                    if let Some(text) = crate::hierarchy::extract_text(&groups) {
                        self.cache.write().await.text_by_view_oid.insert(view_oid, text);
                    }
                }
            }
        }

        let text_by_view_oid = self.cache.read().await.text_by_view_oid.clone();
        Ok(EnrichedHierarchy { info, text_by_view_oid })
    }

    /// Resolve a view's layer oid from the cached hierarchy (spec §4.4
    /// view-oid/layer-oid resolution). Never fetches a fresh hierarchy to do
    /// so: "if the cache is absent, the view oid is used as-is (best-effort;
    /// the server may accept either for some properties)" — a cache miss is
    /// not an error, it's a fallback to the caller's oid.
    pub async fn resolve_layer_oid(&self, view_oid: u64) -> u64 {
        self.cache
            .read()
            .await
            .hierarchy
            .as_ref()
            .and_then(|h| h.root.find_layer_oid_for_view(view_oid))
            .unwrap_or(view_oid)
    }

    pub async fn find_node(&self, view_oid: u64, timeout: Option<Duration>) -> Result<HierarchyNode, Error> {
        let info = self.hierarchy(timeout).await?;
        info.root
            .find(view_oid)
            .cloned()
            .ok_or_else(|| Error::InvalidFrame(format!("no view with oid {view_oid} in hierarchy")))
    }

    pub async fn all_attr_groups(
        &self,
        layer_oid: u64,
        timeout: Option<Duration>,
    ) -> Result<Vec<AttributesGroup>, Error> {
        self.requests().await.all_attr_groups(layer_oid, timeout).await
    }

    /// Modify an attribute; a successful modification clears the cached text
    /// map (spec §4.6) since the server-side text for the modified view, or
    /// any descendant whose text depended on it, may now be stale.
    pub async fn modify_attribute(
        &self,
        target_oid: u64,
        setter_selector: &str,
        attr_type: i32,
        value: Value,
        timeout: Option<Duration>,
    ) -> Result<bool, Error> {
        let success = self
            .requests()
            .await
            .modify_attribute(target_oid, setter_selector, attr_type, value, timeout)
            .await?;
        if success {
            self.cache.write().await.text_by_view_oid.clear();
        }
        Ok(success)
    }

    pub async fn invoke_method(
        &self,
        oid: u64,
        selector_text: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, Error> {
        self.requests().await.invoke_method(oid, selector_text, timeout).await
    }

    pub async fn list_selectors(
        &self,
        class_name: &str,
        has_arg: bool,
        timeout: Option<Duration>,
    ) -> Result<Vec<String>, Error> {
        self.requests().await.list_selectors(class_name, has_arg, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_session_has_empty_caches_and_is_idle() {
        let session = Session::new();
        assert_eq!(session.state().await, ConnectionState::Idle);
        assert_eq!(session.cache.read().await.text_by_view_oid.len(), 0);
        assert!(session.cache.read().await.hierarchy.is_none());
    }

    #[tokio::test]
    async fn disconnect_on_never_connected_session_is_a_no_op() {
        let session = Session::new();
        session.disconnect().await;
        assert_eq!(session.state().await, ConnectionState::Idle);
    }

    #[tokio::test]
    async fn disconnect_then_reconnect_starts_from_idle() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while listener.accept().await.is_ok() {}
        });

        let session = Session::new();
        session.connect_to(port).await.unwrap();
        assert_eq!(session.state().await, ConnectionState::Ready);

        session.disconnect().await;
        assert_eq!(session.state().await, ConnectionState::Idle);

        // A fresh `Transport` backs the session post-disconnect, so a
        // second `connect_to` must succeed rather than fail with
        // `AlreadyConnected` (spec §3: "a new connection requires a fresh
        // instance").
        session.connect_to(port).await.unwrap();
        assert_eq!(session.state().await, ConnectionState::Ready);
    }

    #[tokio::test]
    async fn resolve_layer_oid_falls_back_to_view_oid_when_cache_is_absent() {
        let session = Session::new();
        assert_eq!(session.resolve_layer_oid(42).await, 42);
    }
}
