//! Push subscription records and the stores that hold them.
//!
//! The dispatcher only needs two things from a store: list the
//! subscriptions a send targets, and delete the ones a push service has
//! reported gone. [`SubscriptionStore`] is that seam. Two implementations
//! ship with the crate: an in-memory one and a JSON file on disk.

// Rust guideline compliant 2026-02

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// A browser's push subscription.
///
/// `p256dh` and `auth` are the recipient's payload-encryption keys; they
/// travel with the record but play no part in VAPID signing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    /// Push service endpoint URL.
    pub endpoint: String,
    /// Browser's P-256 ECDH public key (base64url).
    pub p256dh: String,
    /// Shared auth secret (base64url).
    pub auth: String,
    /// Owning user, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl PushSubscription {
    /// Build a subscription without an owner.
    pub fn new(endpoint: impl Into<String>, p256dh: impl Into<String>, auth: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            p256dh: p256dh.into(),
            auth: auth.into(),
            user_id: None,
        }
    }

    /// Attach an owning user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Which subscriptions a send targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubscriptionFilter {
    /// Every subscription owned by one user.
    User(String),
    /// A single endpoint.
    Endpoint(String),
    /// Everything in the store.
    Broadcast,
}

impl SubscriptionFilter {
    /// Whether `subscription` is selected.
    pub fn matches(&self, subscription: &PushSubscription) -> bool {
        match self {
            Self::User(user) => subscription.user_id.as_deref() == Some(user.as_str()),
            Self::Endpoint(endpoint) => subscription.endpoint == *endpoint,
            Self::Broadcast => true,
        }
    }
}

/// Storage the dispatcher reads targets from and reports gone endpoints to.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Subscriptions selected by `filter`.
    async fn list_subscriptions(&self, filter: &SubscriptionFilter) -> Result<Vec<PushSubscription>>;

    /// Delete every subscription whose endpoint is in `endpoints`.
    ///
    /// Returns how many records were removed.
    async fn delete_subscriptions(&self, endpoints: &[String]) -> Result<usize>;
}

/// In-memory set of subscriptions, unique by endpoint.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PushSubscriptionStore {
    subscriptions: Vec<PushSubscription>,
}

impl PushSubscriptionStore {
    /// Add or update a push subscription.
    ///
    /// Deduplicates by endpoint: a browser that re-registers keeps the same
    /// endpoint, so the newer record replaces the older one in place.
    pub fn upsert(&mut self, subscription: PushSubscription) {
        if let Some(existing) = self
            .subscriptions
            .iter_mut()
            .find(|s| s.endpoint == subscription.endpoint)
        {
            *existing = subscription;
        } else {
            self.subscriptions.push(subscription);
        }
    }

    /// Remove the subscription for `endpoint`. Returns whether it existed.
    pub fn remove(&mut self, endpoint: &str) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.endpoint != endpoint);
        self.subscriptions.len() != before
    }

    /// Remove every subscription whose endpoint is listed.
    pub fn remove_endpoints(&mut self, endpoints: &[String]) -> usize {
        let doomed: HashSet<&str> = endpoints.iter().map(String::as_str).collect();
        let before = self.subscriptions.len();
        self.subscriptions
            .retain(|s| !doomed.contains(s.endpoint.as_str()));
        before - self.subscriptions.len()
    }

    /// Subscriptions selected by `filter`.
    pub fn filter(&self, filter: &SubscriptionFilter) -> Vec<PushSubscription> {
        self.subscriptions
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect()
    }

    /// Get all active subscriptions.
    pub fn all(&self) -> impl Iterator<Item = &PushSubscription> {
        self.subscriptions.iter()
    }

    /// Number of stored subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Check if a subscription exists for `endpoint`.
    pub fn contains(&self, endpoint: &str) -> bool {
        self.subscriptions.iter().any(|s| s.endpoint == endpoint)
    }

    /// Drop duplicate endpoints, keeping the last record for each.
    ///
    /// Files written by hand or by older tools can carry duplicates that
    /// [`upsert`](Self::upsert) would have merged. Returns how many were removed.
    pub fn dedup_by_endpoint(&mut self) -> usize {
        let mut seen = HashSet::new();
        let before = self.subscriptions.len();
        let mut kept: Vec<PushSubscription> = self
            .subscriptions
            .drain(..)
            .rev()
            .filter(|s| seen.insert(s.endpoint.clone()))
            .collect();
        kept.reverse();
        self.subscriptions = kept;
        before - self.subscriptions.len()
    }
}

/// Async-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemorySubscriptionStore {
    inner: Mutex<PushSubscriptionStore>,
}

impl MemorySubscriptionStore {
    /// Seed the store with `subscriptions`.
    pub fn new(subscriptions: impl IntoIterator<Item = PushSubscription>) -> Self {
        let mut store = PushSubscriptionStore::default();
        for subscription in subscriptions {
            store.upsert(subscription);
        }
        Self {
            inner: Mutex::new(store),
        }
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> PushSubscriptionStore {
        self.inner.lock().await.clone()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn list_subscriptions(&self, filter: &SubscriptionFilter) -> Result<Vec<PushSubscription>> {
        Ok(self.inner.lock().await.filter(filter))
    }

    async fn delete_subscriptions(&self, endpoints: &[String]) -> Result<usize> {
        Ok(self.inner.lock().await.remove_endpoints(endpoints))
    }
}

/// Subscriptions persisted as a JSON file.
///
/// The file is read once on open and rewritten after every change.
#[derive(Debug)]
pub struct FileSubscriptionStore {
    path: PathBuf,
    inner: Mutex<PushSubscriptionStore>,
}

impl FileSubscriptionStore {
    /// Open `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut store = load_subscriptions(&path)?;
        let duplicates = store.dedup_by_endpoint();
        if duplicates > 0 {
            log::info!("[Store] Dropped {duplicates} duplicate subscription(s) from {}", path.display());
        }
        Ok(Self {
            path,
            inner: Mutex::new(store),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add or update a subscription and persist.
    pub async fn upsert(&self, subscription: PushSubscription) -> Result<()> {
        let mut store = self.inner.lock().await;
        store.upsert(subscription);
        save_subscriptions(&self.path, &store)
    }

    /// Remove one endpoint and persist. Returns whether it existed.
    pub async fn remove(&self, endpoint: &str) -> Result<bool> {
        let mut store = self.inner.lock().await;
        let removed = store.remove(endpoint);
        if removed {
            save_subscriptions(&self.path, &store)?;
        }
        Ok(removed)
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> PushSubscriptionStore {
        self.inner.lock().await.clone()
    }
}

#[async_trait]
impl SubscriptionStore for FileSubscriptionStore {
    async fn list_subscriptions(&self, filter: &SubscriptionFilter) -> Result<Vec<PushSubscription>> {
        Ok(self.inner.lock().await.filter(filter))
    }

    async fn delete_subscriptions(&self, endpoints: &[String]) -> Result<usize> {
        let mut store = self.inner.lock().await;
        let removed = store.remove_endpoints(endpoints);
        if removed > 0 {
            save_subscriptions(&self.path, &store)?;
        }
        Ok(removed)
    }
}

/// Load subscriptions from `path`. A missing file is an empty store.
pub fn load_subscriptions(path: &Path) -> Result<PushSubscriptionStore> {
    if !path.exists() {
        return Ok(PushSubscriptionStore::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read push subscriptions file {}", path.display()))?;
    let store: PushSubscriptionStore =
        serde_json::from_str(&content).context("Failed to parse push subscriptions file")?;

    log::info!("[Store] Loaded {} push subscription(s)", store.len());
    Ok(store)
}

/// Save subscriptions to `path` with owner-only permissions.
pub fn save_subscriptions(path: &Path, store: &PushSubscriptionStore) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let content =
        serde_json::to_string_pretty(store).context("Failed to serialize push subscriptions")?;
    std::fs::write(path, content).context("Failed to write push subscriptions file")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .context("Failed to set push subscriptions file permissions")?;
    }

    log::debug!("[Store] Saved {} push subscription(s) to {:?}", store.len(), path);
    Ok(())
}
