//! Space route cache
//!
//! Resolving a space to its stack and region APIs costs a store lookup plus
//! environment probing, so resolved routes are kept for a configurable TTL.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Resolved API endpoints for a space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceRoutes {
    /// Base URL of the stack API
    pub stack_api: String,
    /// Base URL of the region API
    pub region_api: String,
}

#[derive(Debug)]
struct CachedRoute {
    routes: SpaceRoutes,
    stored_at: Instant,
}

/// TTL cache of `SpaceRoutes` keyed by space name
#[derive(Debug)]
pub struct RouteCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedRoute>>,
}

impl RouteCache {
    /// Create an empty cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fresh routes for `space`, if cached
    pub async fn get(&self, space: &str) -> Option<SpaceRoutes> {
        let entries = self.entries.read().await;
        entries
            .get(space)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.routes.clone())
    }

    /// Store routes for `space`, pruning expired entries
    pub async fn insert(&self, space: &str, routes: SpaceRoutes) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        entries.insert(
            space.to_string(),
            CachedRoute {
                routes,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop the entry for `space`; returns whether one existed
    pub async fn invalidate(&self, space: &str) -> bool {
        self.entries.write().await.remove(space).is_some()
    }

    /// Drop every entry
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
