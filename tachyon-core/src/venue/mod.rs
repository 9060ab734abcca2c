//! Venue connectivity: pooled, health-checked transports
//!
//! - `transport`: the closed `Connection` enum and the `Transport` capability
//! - `pool`: weakly-referencing `ConnectionPool` with venue routing

pub mod pool;
pub mod transport;

pub use pool::{ConnectionPool, PoolStats};
pub use transport::{
    Connection, ConnectionConfig, Protocol, SessionTransport, SharedMemoryTransport, Transport,
};
