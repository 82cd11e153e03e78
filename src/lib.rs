//! Wagerbook — on-chain betting ledger
//!
//! The betting subsystem of a blockchain node, enforced as a consensus
//! rule: events and odds published by an oracle, bets locked at placement
//! odds, and payouts every node must reproduce bit-identically from
//! integer fixed-point math.
//!
//! ## Architecture
//!
//! - **Codec** (`codec`): betting operations carried in data-only outputs
//! - **Store** (`store`): ReDB tables with big-endian composite keys and a
//!   per-block undo journal
//! - **Admission** (`validate`): read-only pool checks with stable
//!   rejection reasons
//! - **Apply** (`apply`): block-connect state transition
//! - **Resolve** (`payout`): deterministic payout vector + whole-block
//!   validation
//! - **Undo** (`undo`): reorg reversal from journaled pre-images

pub mod apply;
pub mod codec;
pub mod ledger;
pub mod mint;
pub mod payout;
pub mod protocol;
pub mod quickgames;
pub mod store;
pub mod undo;
pub mod validate;
pub mod view;

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

// ============================================================================
// PUBLIC API
// ============================================================================

pub use codec::{decode_betting_op, encode_betting_op, BettingOp, CodecVersion};
pub use ledger::BettingLedger;
pub use payout::{PayoutEntry, ResolvedPayouts, ODDS_DIVISOR};
pub use protocol::{Amount, Block, ConsensusParams, OutPoint, Transaction, TxOut, Txid, COIN};
pub use store::{BettingStore, TableId};
pub use validate::AdmissionError;

/// Shared ledger handle: block connect/disconnect takes the write side on
/// the validation thread, reporting readers take the read side and only
/// ever observe committed block boundaries.
pub type SharedLedger = Arc<RwLock<BettingLedger>>;

/// Fatal failures of store access, block connect or disconnect. Any of
/// these aborts the in-progress operation; partial writes are discarded
/// with the uncommitted transaction.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("store failure: {0}")]
    Store(String),
    #[error("record codec failure: {0}")]
    Codec(String),
    #[error("bad block: {0}")]
    BadBlock(String),
    #[error("payout vector mismatch: {0}")]
    PayoutMismatch(String),
}

pub(crate) fn store_err(e: impl std::fmt::Display) -> LedgerError {
    LedgerError::Store(e.to_string())
}
