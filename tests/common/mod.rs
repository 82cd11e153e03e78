//! Shared fixtures for the ledger integration tests: an in-memory coin
//! view, transaction/block builders and a default parameter set with a
//! known oracle.
#![allow(dead_code)]

use std::collections::HashMap;

use wagerbook::codec::{encode_betting_op, BettingOp, CodecVersion};
use wagerbook::protocol::{
    Amount, Block, ConsensusParams, OutPoint, OutputScript, SpendableView, Transaction, TxIn,
    TxOut, Txid, COIN,
};

pub const ORACLE: &str = "oracle_authority";
pub const PLAYER: &str = "player_one";
pub const PLAYER_TWO: &str = "player_two";
pub const DEV_FUND: &str = "dev_fund";
pub const ORACLE_FUND: &str = "oracle_fund";
pub const MINER: &str = "miner";

/// In-memory spendable-output view.
#[derive(Default)]
pub struct MockCoins {
    outputs: HashMap<OutPoint, TxOut>,
    next_funding: u8,
}

impl MockCoins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a synthetic funding output owned by `owner` and return its
    /// outpoint, for use as a transaction's first input.
    pub fn fund(&mut self, owner: &str) -> OutPoint {
        self.next_funding += 1;
        let mut id = [0xf0u8; 32];
        id[0] = self.next_funding;
        let outpoint = OutPoint::new(Txid(id), 0);
        self.outputs.insert(outpoint, TxOut::pay(1_000_000 * COIN, owner));
        outpoint
    }
}

impl SpendableView for MockCoins {
    fn get_output(&self, outpoint: &OutPoint) -> Option<TxOut> {
        self.outputs.get(outpoint).cloned()
    }
}

pub fn txid(n: u8) -> Txid {
    Txid([n; 32])
}

/// A transaction carrying betting operations as data outputs, funded from
/// `prevout`.
pub fn op_tx(id: u8, prevout: OutPoint, ops: &[(BettingOp, Amount)]) -> Transaction {
    Transaction {
        txid: txid(id),
        inputs: vec![TxIn { prevout }],
        outputs: ops
            .iter()
            .map(|(op, value)| TxOut::data(*value, encode_betting_op(op, CodecVersion::V4)))
            .collect(),
    }
}

/// The block's reward transaction: output 0 is the miner's, the rest is
/// the payout vector.
pub fn reward_tx(id: u8, payouts: &[(String, Amount)]) -> Transaction {
    let mut outputs = vec![TxOut::pay(5 * COIN, MINER)];
    outputs.extend(payouts.iter().map(|(addr, amount)| TxOut::pay(*amount, addr.clone())));
    Transaction { txid: txid(id), inputs: vec![], outputs }
}

pub fn block(time: u32, seed: u8, transactions: Vec<Transaction>) -> Block {
    Block { hash: [seed; 32], time, seed: [seed; 32], transactions }
}

/// Default network parameters with a known oracle and reward addresses.
pub fn test_params() -> ConsensusParams {
    ConsensusParams {
        oracle_addresses: vec![ORACLE.to_string()],
        dev_payout_address: DEV_FUND.to_string(),
        oracle_payout_address: ORACLE_FUND.to_string(),
        ..ConsensusParams::default()
    }
}

/// Extract `(address, amount)` pairs suitable for `reward_tx` from a
/// resolved payout vector.
pub fn as_reward_outputs(resolved: &wagerbook::ResolvedPayouts) -> Vec<(String, Amount)> {
    resolved.entries.iter().map(|e| (e.address.clone(), e.amount)).collect()
}

/// Is this output script a data carrier? Convenience for assertions.
pub fn is_data(script: &OutputScript) -> bool {
    matches!(script, OutputScript::DataCarrier(_))
}
