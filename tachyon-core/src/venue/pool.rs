//! Connection pool
//!
//! Callers own connections (`Arc`); the pool only observes them (`Weak`), so
//! a connection lives exactly as long as someone is using it. A cached entry
//! is reused only while it upgrades and reports healthy; otherwise a fresh
//! transport is built and replaces it.
//!
//! Two threads missing on the same key at once may both construct; the last
//! insert wins and the other connection simply lives on with its caller.

use super::transport::{Connection, ConnectionConfig, Protocol, Transport};
use crate::config::VenueConfig;
use crate::core::{Exchange, VenueError};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Pool effectiveness counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that had to construct
    pub misses: u64,
    /// Transports built
    pub constructions: u64,
    /// Misses caused by a cached connection that was no longer healthy
    pub reconnects: u64,
    /// Entries currently cached (live or expired)
    pub cached: usize,
}

pub struct ConnectionPool {
    venue: VenueConfig,
    cache: RwLock<HashMap<u64, Weak<Connection>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    constructions: AtomicU64,
    reconnects: AtomicU64,
}

impl ConnectionPool {
    pub fn new(venue: VenueConfig) -> Self {
        Self {
            venue,
            cache: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            constructions: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    /// Reuse a healthy cached connection or build a new one
    pub fn create(&self, config: ConnectionConfig) -> Result<Arc<Connection>, VenueError> {
        let key = config.cache_key();

        let stale = {
            let cache = self.cache.read();
            match cache.get(&key).map(Weak::upgrade) {
                Some(Some(conn)) if conn.is_healthy() => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(conn);
                }
                Some(Some(_)) => true,
                _ => false,
            }
        };

        self.misses.fetch_add(1, Ordering::Relaxed);
        if stale {
            self.reconnects.fetch_add(1, Ordering::Relaxed);
            tracing::info!(%config, "Cached connection unhealthy; reconnecting");
        }

        let conn = Arc::new(Connection::establish(config, &self.venue)?);
        self.constructions.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%config, "Established venue connection");

        self.cache.write().insert(key, Arc::downgrade(&conn));
        Ok(conn)
    }

    /// Preferred transport for a venue
    ///
    /// Primary equity venues get shared memory when ultra-low latency is
    /// requested and a FIX session otherwise; other venues get plain TCP.
    pub fn best_for_venue(
        &self,
        venue: Exchange,
        ultra_low_latency: bool,
    ) -> Result<Arc<Connection>, VenueError> {
        self.create(Self::preferred_config(venue, ultra_low_latency, &self.venue))
    }

    pub fn preferred_config(
        venue: Exchange,
        ultra_low_latency: bool,
        ports: &VenueConfig,
    ) -> ConnectionConfig {
        let (protocol, port) = match (venue.is_primary_equity(), ultra_low_latency) {
            (true, true) => (Protocol::SharedMem, 0),
            (true, false) => (Protocol::Fix, ports.session_port),
            (false, _) => (Protocol::Tcp, ports.fallback_port),
        };

        ConnectionConfig {
            venue,
            protocol,
            low_latency: true,
            port,
        }
    }

    /// Drop cache entries whose connection no longer exists
    ///
    /// Called by the metrics sampler on every tick.
    pub fn prune(&self) -> usize {
        let mut cache = self.cache.write();
        let before = cache.len();
        cache.retain(|_, weak| weak.strong_count() > 0);
        before - cache.len()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            constructions: self.constructions.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            cached: self.cache.read().len(),
        }
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new(VenueConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy_connection_is_reused() {
        let pool = ConnectionPool::default();

        let first = pool.best_for_venue(Exchange::Nyse, false).unwrap();
        let second = pool.best_for_venue(Exchange::Nyse, false).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.constructions, 1);
    }

    #[test]
    fn test_venue_routing() {
        let pool = ConnectionPool::default();

        let shm = pool.best_for_venue(Exchange::Nasdaq, true).unwrap();
        assert!(shm.is_shared_memory());
        assert_eq!(shm.config().port, 0);

        let fix = pool.best_for_venue(Exchange::Nyse, false).unwrap();
        assert_eq!(fix.config().protocol, Protocol::Fix);
        assert_eq!(fix.config().port, 8001);
        assert!(fix.config().low_latency);

        let tcp = pool.best_for_venue(Exchange::Cme, true).unwrap();
        assert_eq!(tcp.config().protocol, Protocol::Tcp);
        assert_eq!(tcp.config().port, 9001);
    }

    #[test]
    fn test_unhealthy_connection_is_replaced() {
        let pool = ConnectionPool::default();
        let first = pool.best_for_venue(Exchange::Cme, false).unwrap();

        if let Connection::Session(session) = first.as_ref() {
            session.sever();
        }

        let second = pool.best_for_venue(Exchange::Cme, false).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.is_healthy());
        assert_eq!(pool.stats().reconnects, 1);
    }

    #[test]
    fn test_dropped_connection_is_rebuilt_and_pruned() {
        let pool = ConnectionPool::default();
        drop(pool.best_for_venue(Exchange::Nyse, true).unwrap());
        drop(pool.best_for_venue(Exchange::Cme, true).unwrap());

        // Expired weak entries never upgrade
        let conn = pool.best_for_venue(Exchange::Nyse, true).unwrap();
        assert_eq!(pool.stats().constructions, 3);
        assert_eq!(pool.stats().reconnects, 0);

        assert_eq!(pool.prune(), 1);
        assert_eq!(pool.stats().cached, 1);
        drop(conn);
        assert_eq!(pool.prune(), 1);
        assert_eq!(pool.stats().cached, 0);
    }
}
