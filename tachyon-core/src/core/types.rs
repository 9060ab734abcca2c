//! Zero-overhead core types for the decision path
//!
//! All types in this module are designed for:
//! - Zero heap allocations
//! - Copy semantics where possible
//! - Cache-line alignment where they are batched or shared

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Trading venue
///
/// Single byte enum for minimal size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Exchange {
    Nyse = 0,
    Nasdaq = 1,
    Cme = 2,
}

impl Exchange {
    /// Primary equity venues get the dedicated low-latency transports
    #[inline(always)]
    pub const fn is_primary_equity(self) -> bool {
        matches!(self, Exchange::Nyse | Exchange::Nasdaq)
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exchange::Nyse => write!(f, "NYSE"),
            Exchange::Nasdaq => write!(f, "NASDAQ"),
            Exchange::Cme => write!(f, "CME"),
        }
    }
}

/// Order side (Buy or Sell)
///
/// Single byte enum for minimal size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    /// Side implied by the sign of a blended signal (strictly positive buys)
    #[inline(always)]
    pub fn from_signal(signal: f64) -> Self {
        if signal > 0.0 {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    /// +1.0 for buys, -1.0 for sells
    #[inline(always)]
    pub const fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }

    /// Single character code used in the decision log
    #[inline(always)]
    pub const fn as_char(self) -> char {
        match self {
            Side::Buy => 'B',
            Side::Sell => 'S',
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Strategy attribution bit flags carried on every order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct StrategyTag(u32);

impl StrategyTag {
    pub const PAIR_TRADING: Self = Self(0x01);
    pub const MICROSTRUCTURE_ALPHA: Self = Self(0x02);
    pub const ORDER_BOOK_IMBALANCE: Self = Self(0x04);
    pub const MOMENTUM_IGNITION: Self = Self(0x08);
    pub const VOLATILITY_BREAKOUT: Self = Self(0x10);
    pub const HOT_PATTERN: Self = Self(0x20);
    pub const ORACLE: Self = Self(0x40);
    /// Every panel strategy plus the oracle
    pub const HYBRID: Self = Self(0x7F);

    #[inline(always)]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline(always)]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for StrategyTag {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// 32-bit FNV-1a hash, usable in const context
pub const fn fnv1a(symbol: &str) -> u32 {
    const FNV_PRIME: u32 = 0x0100_0193;
    const OFFSET_BASIS: u32 = 0x811C_9DC5;

    let bytes = symbol.as_bytes();
    let mut hash = OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// Hashed instrument identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SymbolId(pub u32);

impl SymbolId {
    pub const AAPL: Self = Self(fnv1a("AAPL"));
    pub const TSLA: Self = Self(fnv1a("TSLA"));
    pub const ES: Self = Self(fnv1a("ES"));

    pub const fn from_ticker(ticker: &str) -> Self {
        Self(fnv1a(ticker))
    }

    /// Frequently traded names that are routed over the ultra-low-latency tier
    #[inline(always)]
    pub fn wants_ultra_low_latency(self) -> bool {
        self == Self::AAPL || self == Self::TSLA
    }
}

/// Venue order, exactly one cache line
///
/// Built once per execution attempt and never mutated afterwards.
/// Alignment prevents false sharing when orders are batched.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C, align(64))]
pub struct Order {
    pub exchange: Exchange,
    pub side: Side,
    _padding: u16,
    pub symbol: SymbolId,
    pub order_id: u64,
    pub price: f64,
    pub quantity: i32,
    /// Latency tracking stamp (microseconds on the engine's monotonic clock, wrapping)
    pub timestamp: u32,
    /// Expected venue latency at dispatch
    pub target_venue_ns: u64,
    pub strategy: StrategyTag,
    _cache_line_padding: [u8; 20],
}

const _: () = assert!(std::mem::size_of::<Order>() == 64);
const _: () = assert!(std::mem::align_of::<Order>() == 64);

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        exchange: Exchange,
        side: Side,
        symbol: SymbolId,
        order_id: u64,
        price: f64,
        quantity: i32,
        timestamp: u32,
        target_venue_ns: u64,
        strategy: StrategyTag,
    ) -> Self {
        Self {
            exchange,
            side,
            _padding: 0,
            symbol,
            order_id,
            price,
            quantity,
            timestamp,
            target_venue_ns,
            strategy,
            _cache_line_padding: [0; 20],
        }
    }

    /// Signed notional (+ for buys, - for sells)
    #[inline(always)]
    pub fn signed_notional(&self) -> f64 {
        self.side.sign() * self.price * self.quantity as f64
    }
}

/// Process-scoped order id source
///
/// Shared by reference (`Arc`) between every component that stamps orders,
/// so ids stay unique and increasing without a global counter.
#[repr(C, align(64))]
pub struct OrderIdSequence {
    next: AtomicU64,
}

impl OrderIdSequence {
    /// Ids start at 1; 0 is never handed out
    pub const fn new() -> Self {
        Self::starting_at(1)
    }

    pub const fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    #[inline(always)]
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Id the next call to `next_id` will return
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for OrderIdSequence {
    fn default() -> Self {
        Self::new()
    }
}
