//! Chain interface types for the betting subsystem.
//!
//! The betting ledger does not own consensus: blocks, transactions and
//! spendable outputs are produced by the surrounding node. This module
//! defines the narrow view of those structures the ledger needs, plus the
//! consensus parameters that govern betting behavior. Everything here is
//! passed in explicitly; the ledger keeps no ambient global chain state.

use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Monetary amount in the chain's smallest unit.
pub type Amount = i64;

/// Smallest units per whole coin.
pub const COIN: Amount = 100_000_000;

// ============================================================================
// TRANSACTION PRIMITIVES
// ============================================================================

/// Transaction identifier (32-byte hash).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct Txid(pub [u8; 32]);

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Reference to a transaction output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct OutPoint {
    pub txid: Txid,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Txid, vout: u32) -> Self {
        Self { txid, vout }
    }

    /// Byte encoding used inside composite store keys. Big-endian vout so
    /// the natural store ordering matches (txid, vout) ordering.
    pub fn to_key_bytes(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        out[..32].copy_from_slice(&self.txid.0);
        out[32..].copy_from_slice(&self.vout.to_be_bytes());
        out
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// Output script, reduced to the two shapes the ledger cares about.
///
/// `DataCarrier` is a provably unspendable output that exists only to carry
/// bytes (the host chain's OP_RETURN analogue); every betting operation
/// travels in one. `PayToAddress` is any ordinary spendable output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputScript {
    DataCarrier(Vec<u8>),
    PayToAddress(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: Amount,
    pub script: OutputScript,
}

impl TxOut {
    pub fn data(value: Amount, payload: Vec<u8>) -> Self {
        Self { value, script: OutputScript::DataCarrier(payload) }
    }

    pub fn pay(value: Amount, address: impl Into<String>) -> Self {
        Self { value, script: OutputScript::PayToAddress(address.into()) }
    }

    pub fn address(&self) -> Option<&str> {
        match &self.script {
            OutputScript::PayToAddress(addr) => Some(addr),
            OutputScript::DataCarrier(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub prevout: OutPoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: Txid,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
}

impl Transaction {
    /// The outpoint pointing at output `vout` of this transaction.
    pub fn outpoint(&self, vout: u32) -> OutPoint {
        OutPoint::new(self.txid, vout)
    }
}

/// The slice of a block the ledger consumes.
///
/// `transactions[0]` is the block's reward transaction; its outputs from
/// index 1 onward form the block's payout vector. `seed` is the block's
/// proof-of-stake hash, used to settle seeded games deterministically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub hash: [u8; 32],
    pub time: u32,
    pub seed: [u8; 32],
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn reward_transaction(&self) -> Option<&Transaction> {
        self.transactions.first()
    }
}

// ============================================================================
// COLLABORATOR VIEWS
// ============================================================================

/// Read access to spendable outputs, provided by the node's coin view.
///
/// Used to resolve a transaction's funding output, which determines both
/// the staked amount and the authority (address) behind an operation.
pub trait SpendableView {
    fn get_output(&self, outpoint: &OutPoint) -> Option<TxOut>;
}

/// Resolve the address that funded `tx` (its first input's previous output).
///
/// Returns `None` for reward transactions and inputs the view cannot
/// resolve; callers skip such outputs rather than erroring, since a foreign
/// transaction shape is not a betting protocol violation.
pub fn spender_address(view: &dyn SpendableView, tx: &Transaction) -> Option<String> {
    let input = tx.inputs.first()?;
    let funding = view.get_output(&input.prevout)?;
    funding.address().map(str::to_owned)
}

// ============================================================================
// CONSENSUS PARAMETERS
// ============================================================================

/// Network-level parameters governing the betting subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusParams {
    /// Minimum stake for any bet.
    pub min_bet: Amount,
    /// Maximum stake for a single-leg bet.
    pub max_bet: Amount,
    /// Maximum stake for a parlay bet (tighter than `max_bet`).
    pub max_parlay_bet: Amount,
    /// Maximum number of legs in a parlay.
    pub max_parlay_legs: usize,
    /// Bets placed within this many seconds of the event's locked start
    /// time are refunded at resolution.
    pub bet_cutoff_secs: u32,
    /// Height at which parlay and chain/quick game operations activate.
    pub v3_activation_height: u32,
    /// Height at which field markets and the zero-odds admission rule
    /// activate.
    pub v4_activation_height: u32,
    /// Height after which chain/quick game bets are no longer accepted.
    pub quick_games_end_height: u32,
    /// Addresses allowed to publish event-mutating operations.
    pub oracle_addresses: Vec<String>,
    /// Destination for the development share of game fees.
    pub dev_payout_address: String,
    /// Destination for the oracle-operations share of game fees.
    pub oracle_payout_address: String,
    /// Share of winnings withheld when splitting token-funded payouts,
    /// in permille.
    pub win_fee_permille: u32,
    /// Chain-game fee on the pot, in permille.
    pub chain_game_fee_permille: u32,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            min_bet: 25 * COIN,
            max_bet: 10_000 * COIN,
            max_parlay_bet: 4_000 * COIN,
            max_parlay_legs: 5,
            bet_cutoff_secs: 1_200,
            v3_activation_height: 0,
            v4_activation_height: 0,
            quick_games_end_height: u32::MAX,
            oracle_addresses: Vec::new(),
            dev_payout_address: String::new(),
            oracle_payout_address: String::new(),
            win_fee_permille: 60,
            chain_game_fee_permille: 200,
        }
    }
}

impl ConsensusParams {
    pub fn is_oracle(&self, address: &str) -> bool {
        self.oracle_addresses.iter().any(|a| a == address)
    }
}
