//! Venue transports
//!
//! Two concrete kinds sit behind the closed `Connection` enum:
//! - `SessionTransport`: stream/session socket (TCP, FIX)
//! - `SharedMemoryTransport`: co-located shared-memory order ring
//!
//! Neither speaks a real exchange protocol. The session transport tracks a
//! simulated handle and health flag; the shared-memory transport writes each
//! order into a fixed 64-byte slot of an anonymous mapping.

use crate::config::VenueConfig;
use crate::core::{Exchange, Order, VenueError};
use memmap2::MmapMut;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Bytes per shared-memory order slot
pub const ORDER_SLOT_BYTES: usize = 64;

/// Wire/transport protocol of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Protocol {
    Tcp = 0,
    Udp = 1,
    Fix = 2,
    Multicast = 3,
    SharedMem = 4,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Fix => "FIX",
            Protocol::Multicast => "MULTICAST",
            Protocol::SharedMem => "SHARED_MEM",
        };
        f.write_str(name)
    }
}

/// Identity of a pooled connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionConfig {
    pub venue: Exchange,
    pub protocol: Protocol,
    pub low_latency: bool,
    pub port: u16,
}

impl ConnectionConfig {
    /// Pack into a cache key: `venue | protocol | low_latency | port`, one
    /// field per byte lane above the 16-bit port, no overlap
    #[inline]
    pub const fn cache_key(&self) -> u64 {
        ((self.venue as u64) << 32)
            | ((self.protocol as u64) << 24)
            | ((self.low_latency as u64) << 16)
            | (self.port as u64)
    }
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}:{}{}",
            self.venue,
            self.protocol,
            self.port,
            if self.low_latency { " (low-latency)" } else { "" }
        )
    }
}

/// Capabilities the engine relies on
pub trait Transport {
    /// Hand the order to the venue; `true` when accepted
    fn send(&self, order: &Order) -> bool;

    fn is_healthy(&self) -> bool;

    /// Expected one-way latency, used as the order's timing hint
    fn last_latency_ns(&self) -> u64;
}

/// Stream/session socket transport
#[derive(Debug)]
pub struct SessionTransport {
    config: ConnectionConfig,
    handle: i32,
    healthy: AtomicBool,
    /// Venue refuses orders while the session itself stays up
    rejecting: AtomicBool,
    latency_ns: u64,
    sent: AtomicU64,
}

impl SessionTransport {
    pub fn connect(config: ConnectionConfig, venue: &VenueConfig) -> Self {
        // Stand-in descriptors: low-latency sessions would set TCP_NODELAY and SO_PRIORITY
        let handle = if config.low_latency { 1 } else { 2 };

        Self {
            config,
            handle,
            healthy: AtomicBool::new(handle > 0),
            rejecting: AtomicBool::new(false),
            latency_ns: venue.session_latency_ns,
            sent: AtomicU64::new(0),
        }
    }

    /// Simulated descriptor of the session
    pub fn handle(&self) -> i32 {
        self.handle
    }

    /// Mark the session as lost; the pool replaces it on next lookup
    pub fn sever(&self) {
        self.healthy.store(false, Ordering::Release);
    }

    /// Refuse (or accept again) orders without dropping the session
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::Release);
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl Transport for SessionTransport {
    fn send(&self, _order: &Order) -> bool {
        if !self.is_healthy() || self.rejecting.load(Ordering::Acquire) {
            return false;
        }
        self.sent.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    fn last_latency_ns(&self) -> u64 {
        self.latency_ns
    }
}

/// Shared-memory order ring
pub struct SharedMemoryTransport {
    config: ConnectionConfig,
    region: Mutex<MmapMut>,
    slots: usize,
    written: AtomicU64,
    latency_ns: u64,
}

impl SharedMemoryTransport {
    pub fn map(config: ConnectionConfig, venue: &VenueConfig) -> Result<Self, VenueError> {
        let slots = venue.shared_memory_slots.max(1);
        let bytes = slots * ORDER_SLOT_BYTES;
        let region =
            MmapMut::map_anon(bytes).map_err(|source| VenueError::SharedMemory { bytes, source })?;

        Ok(Self {
            config,
            region: Mutex::new(region),
            slots,
            written: AtomicU64::new(0),
            latency_ns: venue.shared_memory_latency_ns,
        })
    }

    /// Orders written so far
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Raw bytes of one slot
    pub fn slot_bytes(&self, index: usize) -> Option<[u8; ORDER_SLOT_BYTES]> {
        if index >= self.slots {
            return None;
        }
        let region = self.region.lock();
        let start = index * ORDER_SLOT_BYTES;
        let mut out = [0u8; ORDER_SLOT_BYTES];
        out.copy_from_slice(&region[start..start + ORDER_SLOT_BYTES]);
        Some(out)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl fmt::Debug for SharedMemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMemoryTransport")
            .field("config", &self.config)
            .field("slots", &self.slots)
            .field("written", &self.written())
            .finish()
    }
}

impl Transport for SharedMemoryTransport {
    fn send(&self, order: &Order) -> bool {
        let mut region = self.region.lock();
        let sequence = self.written.load(Ordering::Relaxed);
        let start = (sequence as usize % self.slots) * ORDER_SLOT_BYTES;
        encode_order(order, &mut region[start..start + ORDER_SLOT_BYTES]);
        self.written.store(sequence + 1, Ordering::Relaxed);
        true
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn last_latency_ns(&self) -> u64 {
        self.latency_ns
    }
}

/// Little-endian slot layout, mirroring `Order`'s field order:
///
/// | bytes  | field            |
/// |--------|------------------|
/// | 0      | exchange         |
/// | 1      | side             |
/// | 4..8   | symbol           |
/// | 8..16  | order_id         |
/// | 16..24 | price            |
/// | 24..28 | quantity         |
/// | 28..32 | timestamp        |
/// | 32..40 | target_venue_ns  |
/// | 40..44 | strategy         |
pub fn encode_order(order: &Order, slot: &mut [u8]) {
    debug_assert_eq!(slot.len(), ORDER_SLOT_BYTES);
    slot.fill(0);
    slot[0] = order.exchange as u8;
    slot[1] = order.side as u8;
    slot[4..8].copy_from_slice(&order.symbol.0.to_le_bytes());
    slot[8..16].copy_from_slice(&order.order_id.to_le_bytes());
    slot[16..24].copy_from_slice(&order.price.to_le_bytes());
    slot[24..28].copy_from_slice(&order.quantity.to_le_bytes());
    slot[28..32].copy_from_slice(&order.timestamp.to_le_bytes());
    slot[32..40].copy_from_slice(&order.target_venue_ns.to_le_bytes());
    slot[40..44].copy_from_slice(&order.strategy.bits().to_le_bytes());
}

/// A live venue connection
#[derive(Debug)]
pub enum Connection {
    Session(SessionTransport),
    SharedMemory(SharedMemoryTransport),
}

impl Connection {
    /// Build the transport matching `config.protocol`
    ///
    /// TCP and FIX get a session; shared memory gets a mapped segment; any
    /// other protocol falls back to a session.
    pub fn establish(config: ConnectionConfig, venue: &VenueConfig) -> Result<Self, VenueError> {
        match config.protocol {
            Protocol::Tcp | Protocol::Fix => {
                Ok(Connection::Session(SessionTransport::connect(config, venue)))
            }
            Protocol::SharedMem => Ok(Connection::SharedMemory(SharedMemoryTransport::map(
                config, venue,
            )?)),
            Protocol::Udp | Protocol::Multicast => {
                tracing::debug!(%config, "No dedicated transport; falling back to session");
                Ok(Connection::Session(SessionTransport::connect(config, venue)))
            }
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        match self {
            Connection::Session(t) => t.config(),
            Connection::SharedMemory(t) => t.config(),
        }
    }

    pub fn is_shared_memory(&self) -> bool {
        matches!(self, Connection::SharedMemory(_))
    }
}

impl Transport for Connection {
    #[inline]
    fn send(&self, order: &Order) -> bool {
        match self {
            Connection::Session(t) => t.send(order),
            Connection::SharedMemory(t) => t.send(order),
        }
    }

    #[inline]
    fn is_healthy(&self) -> bool {
        match self {
            Connection::Session(t) => t.is_healthy(),
            Connection::SharedMemory(t) => t.is_healthy(),
        }
    }

    #[inline]
    fn last_latency_ns(&self) -> u64 {
        match self {
            Connection::Session(t) => t.last_latency_ns(),
            Connection::SharedMemory(t) => t.last_latency_ns(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Side, StrategyTag, SymbolId};

    fn order(id: u64) -> Order {
        Order::new(
            Exchange::Nyse,
            Side::Sell,
            SymbolId::AAPL,
            id,
            99.5,
            12,
            7,
            500,
            StrategyTag::HYBRID,
        )
    }

    fn cfg(protocol: Protocol, port: u16) -> ConnectionConfig {
        ConnectionConfig {
            venue: Exchange::Nyse,
            protocol,
            low_latency: true,
            port,
        }
    }

    #[test]
    fn test_cache_key_fields_do_not_overlap() {
        let base = cfg(Protocol::Tcp, 0xFFFF);
        let key = base.cache_key();
        assert_eq!(key & 0xFFFF, 0xFFFF);
        assert_eq!((key >> 16) & 0xFF, 1);

        // Maximum port never bleeds into the protocol or venue lanes
        let other_protocol = ConnectionConfig {
            protocol: Protocol::Fix,
            ..base
        };
        let other_venue = ConnectionConfig {
            venue: Exchange::Cme,
            ..base
        };
        assert_ne!(key, other_protocol.cache_key());
        assert_ne!(key, other_venue.cache_key());
        assert_eq!(other_venue.cache_key() >> 32, Exchange::Cme as u64);
    }

    #[test]
    fn test_protocol_dispatch() {
        let venue = VenueConfig::default();
        for (protocol, shared) in [
            (Protocol::Tcp, false),
            (Protocol::Fix, false),
            (Protocol::Udp, false),
            (Protocol::Multicast, false),
            (Protocol::SharedMem, true),
        ] {
            let conn = Connection::establish(cfg(protocol, 1), &venue).unwrap();
            assert_eq!(conn.is_shared_memory(), shared, "{}", protocol);
            assert!(conn.is_healthy());
        }
    }

    #[test]
    fn test_latency_hints() {
        let venue = VenueConfig::default();
        let session = Connection::establish(cfg(Protocol::Fix, 8001), &venue).unwrap();
        let shm = Connection::establish(cfg(Protocol::SharedMem, 0), &venue).unwrap();
        assert_eq!(session.last_latency_ns(), 50_000);
        assert_eq!(shm.last_latency_ns(), 500);
    }

    #[test]
    fn test_severed_session_rejects_orders() {
        let session = SessionTransport::connect(cfg(Protocol::Tcp, 9001), &VenueConfig::default());
        assert!(session.send(&order(1)));
        session.sever();
        assert!(!session.is_healthy());
        assert!(!session.send(&order(2)));
        assert_eq!(session.sent(), 1);
    }

    #[test]
    fn test_rejecting_session_stays_healthy() {
        let session = SessionTransport::connect(cfg(Protocol::Fix, 8001), &VenueConfig::default());
        session.set_rejecting(true);
        assert!(session.is_healthy());
        assert!(!session.send(&order(1)));

        session.set_rejecting(false);
        assert!(session.send(&order(2)));
        assert_eq!(session.sent(), 1);
    }

    #[test]
    fn test_shared_memory_writes_slots_in_sequence() {
        let venue = VenueConfig {
            shared_memory_slots: 2,
            ..VenueConfig::default()
        };
        let shm = SharedMemoryTransport::map(cfg(Protocol::SharedMem, 0), &venue).unwrap();

        for id in 1..=3 {
            assert!(shm.send(&order(id)));
        }
        assert_eq!(shm.written(), 3);

        // Slot 0 wrapped around to the third order
        let slot0 = shm.slot_bytes(0).unwrap();
        let slot1 = shm.slot_bytes(1).unwrap();
        assert_eq!(u64::from_le_bytes(slot0[8..16].try_into().unwrap()), 3);
        assert_eq!(u64::from_le_bytes(slot1[8..16].try_into().unwrap()), 2);
        assert_eq!(slot1[1], Side::Sell as u8);
        assert_eq!(i32::from_le_bytes(slot1[24..28].try_into().unwrap()), 12);
        assert_eq!(f64::from_le_bytes(slot1[16..24].try_into().unwrap()), 99.5);
        assert!(shm.slot_bytes(2).is_none());
    }
}
