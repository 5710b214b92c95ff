// src/lib.rs

//! Bootstrap market maker over an offset constant-product curve.
//!
//! Sells a bonding token against collateral from zero seed capital by
//! pricing trades on the virtual invariant `(x + alpha)(y + beta) = k`.
//! The [`Engine`] orchestrates the curve math, an external collateral
//! vault, the bonding token, and an optional trade hook; all external
//! calls go through the traits in [`traits`].

mod curve;
mod engine;
mod error;
mod events;
mod traits;
mod types;

pub use crate::curve::{marginal_price, quote_add, quote_remove, CurveShape, VirtualPair};
pub use crate::engine::Engine;
pub use crate::error::{CallError, EngineError, EngineResult, ErrorKind, MathError};
pub use crate::events::{Event, EventSink, InMemoryEventSink};
pub use crate::traits::{BondingToken, CollateralToken, TradeHook, Vault};
pub use crate::types::{Address, U256, MAX_BPS, MIN_AVERAGE_PRICE, WAD};
