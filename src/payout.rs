//! Deterministic payout resolution.
//!
//! Every node must derive the exact same payout vector for a block from the
//! same prior state, so everything here is integer fixed-point over a single
//! shared divisor. A leg's multiplier is a ratio over [`ODDS_DIVISOR`]:
//! the locked odds on a full win, zero on a full loss, the divisor itself
//! for a refund (stake returned), half the divisor for a partial push.
//! Parlay multipliers accumulate pairwise, dividing by the divisor at each
//! step, so a two-leg winner at 15000 each pays stake x 2.25.
//!
//! `validate_block_payouts` is the consensus rule: the block's reward
//! transaction must carry exactly the computed entries -- one missing,
//! extra or off-by-one-unit amount rejects the whole block.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::codec::{decode_betting_op, BettingOp, FieldOutcome, MarketOutcome, ResultKind};
use crate::protocol::{Amount, Block, ConsensusParams, OutPoint, COIN};
use crate::quickgames;
use crate::store::records::{
    BetLeg, BetRecord, BetStatus, ChainGameBetRecord, FieldBetLeg, FieldBetRecord,
    FieldLockedOdds, FieldResultRecord, LockedOdds, PayoutIndexRecord, PayoutKind,
    QuickGameBetRecord, ResultRecord,
};
use crate::store::{keys, StoreBatch, TableId};
use crate::LedgerError;

/// The fixed-point divisor shared by every odds and multiplier computation.
pub const ODDS_DIVISOR: u32 = 10_000;

/// Multiplier for a partial push (spread/total landing exactly on the line).
pub const HALF_MULTIPLIER: u32 = ODDS_DIVISOR / 2;

/// `stake x odds / divisor`, computed in u128 so no realistic stake/odds
/// combination can overflow.
pub fn payout_amount(stake: Amount, odds: u32) -> Amount {
    let gross = stake as u128 * odds as u128 / ODDS_DIVISOR as u128;
    gross as Amount
}

// ============================================================================
// LEG MULTIPLIERS
// ============================================================================

/// Multiplier for one head-to-head leg, over [`ODDS_DIVISOR`].
fn leg_multiplier(leg: &BetLeg, locked: &LockedOdds, result: &ResultRecord) -> u32 {
    let divisor = ODDS_DIVISOR;
    match result.kind {
        ResultKind::EventRefund | ResultKind::EventClosed => return divisor,
        ResultKind::MoneyLineRefund => {
            if matches!(
                leg.outcome,
                MarketOutcome::MoneyLineHome
                    | MarketOutcome::MoneyLineAway
                    | MarketOutcome::MoneyLineDraw
            ) {
                return divisor;
            }
        }
        ResultKind::Standard => {}
    }

    let odds = locked.odds_for(leg.outcome);
    // A market the oracle had zeroed at placement cannot win or lose;
    // the stake comes back.
    if odds == 0 {
        return divisor;
    }

    let home = result.home_score as i32;
    let away = result.away_score as i32;
    match leg.outcome {
        MarketOutcome::MoneyLineHome => {
            if home > away { odds } else { 0 }
        }
        MarketOutcome::MoneyLineAway => {
            if away > home { odds } else { 0 }
        }
        MarketOutcome::MoneyLineDraw => {
            if home == away { odds } else { 0 }
        }
        MarketOutcome::SpreadHome => {
            let adjusted = home + locked.spread_points as i32;
            if adjusted > away {
                odds
            } else if adjusted == away {
                HALF_MULTIPLIER
            } else {
                0
            }
        }
        MarketOutcome::SpreadAway => {
            let adjusted = home + locked.spread_points as i32;
            if adjusted < away {
                odds
            } else if adjusted == away {
                HALF_MULTIPLIER
            } else {
                0
            }
        }
        MarketOutcome::TotalOver => {
            let total = home + away;
            let line = locked.total_points as i32;
            if total > line {
                odds
            } else if total == line {
                HALF_MULTIPLIER
            } else {
                0
            }
        }
        MarketOutcome::TotalUnder => {
            let total = home + away;
            let line = locked.total_points as i32;
            if total < line {
                odds
            } else if total == line {
                HALF_MULTIPLIER
            } else {
                0
            }
        }
    }
}

/// Multiplier for one field leg, over [`ODDS_DIVISOR`].
fn field_leg_multiplier(
    leg: &FieldBetLeg,
    locked: &FieldLockedOdds,
    result: &FieldResultRecord,
) -> u32 {
    use crate::codec::ContenderResult;

    match result.kind {
        ResultKind::EventRefund | ResultKind::EventClosed | ResultKind::MoneyLineRefund => {
            return ODDS_DIVISOR;
        }
        ResultKind::Standard => {}
    }

    let odds = locked.odds_for(leg.outcome, leg.contender_id);
    if odds == 0 {
        return ODDS_DIVISOR;
    }

    let placing = result
        .contender_results
        .get(&leg.contender_id)
        .copied()
        .unwrap_or(ContenderResult::DidNotFinish);

    if placing == ContenderResult::DidNotRace {
        return ODDS_DIVISOR;
    }

    let won = match leg.outcome {
        FieldOutcome::Outright => placing == ContenderResult::Place1,
        FieldOutcome::Place => {
            matches!(placing, ContenderResult::Place1 | ContenderResult::Place2)
        }
        FieldOutcome::Show => matches!(
            placing,
            ContenderResult::Place1 | ContenderResult::Place2 | ContenderResult::Place3
        ),
    };
    if won { odds } else { 0 }
}

/// Accumulate a parlay multiplier: start from the first leg, multiply in
/// each further leg and renormalize by the divisor at every step. The
/// result is again a ratio over [`ODDS_DIVISOR`]; zero if any leg lost.
fn parlay_multiplier(multipliers: &[u32]) -> u128 {
    let mut iter = multipliers.iter();
    let Some(first) = iter.next() else {
        return 0;
    };
    let mut acc = *first as u128;
    for m in iter {
        acc = acc * *m as u128 / ODDS_DIVISOR as u128;
    }
    acc
}

/// Settle a bet from its leg multipliers. Returns the status and payout.
fn settle(stake: Amount, multipliers: &[u32], cutoff_refund: bool) -> (BetStatus, Amount) {
    if cutoff_refund {
        return (BetStatus::Refunded, stake);
    }
    if multipliers.iter().any(|m| *m == 0) {
        return (BetStatus::Lost, 0);
    }
    if multipliers.iter().all(|m| *m == ODDS_DIVISOR) {
        return (BetStatus::Refunded, stake);
    }
    let combined = parlay_multiplier(multipliers);
    let payout = (stake as u128 * combined / ODDS_DIVISOR as u128) as Amount;
    let status = if multipliers
        .iter()
        .any(|m| *m == HALF_MULTIPLIER || *m == ODDS_DIVISOR)
    {
        BetStatus::PartialPush
    } else {
        BetStatus::Won
    };
    (status, payout)
}

/// A bet placed inside the pre-start cutoff window of any of its legs is
/// refunded wholesale rather than settled.
fn placed_inside_cutoff(placed_time: u32, start_times: &[u32], cutoff_secs: u32) -> bool {
    start_times
        .iter()
        .any(|start| placed_time > start.saturating_sub(cutoff_secs))
}

// ============================================================================
// RESOLVED PAYOUTS
// ============================================================================

/// One entry of the block's payout vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutEntry {
    pub kind: PayoutKind,
    pub address: String,
    pub amount: Amount,
    /// The bet this entry settles; `None` for reward entries.
    pub bet_ref: Option<(TableId, Vec<u8>)>,
}

/// A bet record transition to be committed alongside the payout vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetCompletion {
    pub table: TableId,
    pub key: Vec<u8>,
    pub status: BetStatus,
    pub payout: Amount,
}

/// Everything the resolver derives for one block: the payout vector and the
/// set of bets that become completed when the block connects.
#[derive(Debug, Clone, Default)]
pub struct ResolvedPayouts {
    pub entries: Vec<PayoutEntry>,
    pub completions: Vec<BetCompletion>,
}

impl ResolvedPayouts {
    pub fn total(&self) -> Amount {
        self.entries.iter().map(|e| e.amount).sum()
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// Compute the payouts the block at `batch.height()` must contain.
///
/// Runs against the batch state, i.e. after [`crate::apply::apply_block`]
/// has written this block's operations, so result records landing in this
/// block are visible. Traversal order over the store is key order, which is
/// identical on every node.
pub fn expected_payouts(
    batch: &StoreBatch,
    block: &Block,
    params: &ConsensusParams,
) -> Result<ResolvedPayouts, LedgerError> {
    let mut pl_resulted: BTreeSet<u32> = BTreeSet::new();
    let mut field_resulted: BTreeSet<u32> = BTreeSet::new();
    let mut chain_game_resulted: BTreeSet<u16> = BTreeSet::new();

    for tx in &block.transactions {
        for output in &tx.outputs {
            match decode_betting_op(output) {
                Some(BettingOp::Result(op)) => {
                    pl_resulted.insert(op.event_id);
                }
                Some(BettingOp::FieldResult(op)) => {
                    field_resulted.insert(op.event_id);
                }
                Some(BettingOp::ChainGameResult(op)) => {
                    chain_game_resulted.insert(op.event_id);
                }
                _ => {}
            }
        }
    }

    let mut resolved = ResolvedPayouts::default();
    if !pl_resulted.is_empty() {
        resolve_peerless_bets(batch, &pl_resulted, params, &mut resolved)?;
    }
    if !field_resulted.is_empty() {
        resolve_field_bets(batch, &field_resulted, params, &mut resolved)?;
    }
    for event_id in chain_game_resulted {
        resolve_chain_game(batch, event_id, block, params, &mut resolved)?;
    }
    resolve_quick_games(batch, block, params, &mut resolved)?;

    debug!(
        height = batch.height(),
        entries = resolved.entries.len(),
        completions = resolved.completions.len(),
        total = resolved.total(),
        "payout vector resolved"
    );
    Ok(resolved)
}

fn resolve_peerless_bets(
    batch: &StoreBatch,
    resulted: &BTreeSet<u32>,
    params: &ConsensusParams,
    resolved: &mut ResolvedPayouts,
) -> Result<(), LedgerError> {
    let bets: Vec<(Vec<u8>, BetRecord)> = batch.scan_prefix(TableId::Bets, &[])?;
    for (key, bet) in bets {
        if bet.completed || !bet.legs.iter().any(|leg| resulted.contains(&leg.event_id)) {
            continue;
        }

        // Every leg's event must be resolved before the bet settles; a
        // parlay waits for its last result.
        let mut results = Vec::with_capacity(bet.legs.len());
        let mut all_resolved = true;
        for leg in &bet.legs {
            match batch.get::<ResultRecord>(TableId::Results, &keys::event(leg.event_id))? {
                Some(result) => results.push(result),
                None => {
                    all_resolved = false;
                    break;
                }
            }
        }
        if !all_resolved {
            continue;
        }

        let multipliers: Vec<u32> = bet
            .legs
            .iter()
            .zip(&bet.locked)
            .zip(&results)
            .map(|((leg, locked), result)| leg_multiplier(leg, locked, result))
            .collect();
        let start_times: Vec<u32> = bet.locked.iter().map(|l| l.start_time).collect();
        let cutoff = placed_inside_cutoff(bet.placed_time, &start_times, params.bet_cutoff_secs);
        let (status, payout) = settle(bet.amount, &multipliers, cutoff);

        if payout > 0 {
            let kind = if status == BetStatus::Refunded {
                PayoutKind::BetRefund
            } else {
                PayoutKind::BetPayout
            };
            resolved.entries.push(PayoutEntry {
                kind,
                address: bet.address.clone(),
                amount: payout,
                bet_ref: Some((TableId::Bets, key.clone())),
            });
        }
        resolved.completions.push(BetCompletion { table: TableId::Bets, key, status, payout });
    }
    Ok(())
}

fn resolve_field_bets(
    batch: &StoreBatch,
    resulted: &BTreeSet<u32>,
    params: &ConsensusParams,
    resolved: &mut ResolvedPayouts,
) -> Result<(), LedgerError> {
    let bets: Vec<(Vec<u8>, FieldBetRecord)> = batch.scan_prefix(TableId::FieldBets, &[])?;
    for (key, bet) in bets {
        if bet.completed || !bet.legs.iter().any(|leg| resulted.contains(&leg.event_id)) {
            continue;
        }

        let mut results = Vec::with_capacity(bet.legs.len());
        let mut all_resolved = true;
        for leg in &bet.legs {
            match batch
                .get::<FieldResultRecord>(TableId::FieldResults, &keys::event(leg.event_id))?
            {
                Some(result) => results.push(result),
                None => {
                    all_resolved = false;
                    break;
                }
            }
        }
        if !all_resolved {
            continue;
        }

        let multipliers: Vec<u32> = bet
            .legs
            .iter()
            .zip(&bet.locked)
            .zip(&results)
            .map(|((leg, locked), result)| field_leg_multiplier(leg, locked, result))
            .collect();
        let start_times: Vec<u32> = bet.locked.iter().map(|l| l.start_time).collect();
        let cutoff = placed_inside_cutoff(bet.placed_time, &start_times, params.bet_cutoff_secs);
        let (status, payout) = settle(bet.amount, &multipliers, cutoff);

        if payout > 0 {
            let kind = if status == BetStatus::Refunded {
                PayoutKind::FieldRefund
            } else {
                PayoutKind::FieldPayout
            };
            resolved.entries.push(PayoutEntry {
                kind,
                address: bet.address.clone(),
                amount: payout,
                bet_ref: Some((TableId::FieldBets, key.clone())),
            });
        }
        resolved
            .completions
            .push(BetCompletion { table: TableId::FieldBets, key, status, payout });
    }
    Ok(())
}

/// Chain-game pots: every entrant staked the event's entry fee; the block
/// seed picks one winner over the height-ordered entrant list, who takes
/// the pot minus the configured fee. The fee is split between the dev and
/// oracle reward addresses.
fn resolve_chain_game(
    batch: &StoreBatch,
    event_id: u16,
    block: &Block,
    params: &ConsensusParams,
    resolved: &mut ResolvedPayouts,
) -> Result<(), LedgerError> {
    let bets: Vec<(Vec<u8>, ChainGameBetRecord)> =
        batch.scan_prefix(TableId::ChainGameBets, &[])?;
    let entrants: Vec<(Vec<u8>, ChainGameBetRecord)> = bets
        .into_iter()
        .filter(|(_, b)| b.event_id == event_id && !b.completed)
        .collect();
    if entrants.is_empty() {
        return Ok(());
    }

    let pot: Amount = entrants.iter().map(|(_, b)| b.amount).sum();
    let winner_index = chain_game_winner(&block.seed, event_id, entrants.len());

    let fee = pot * params.chain_game_fee_permille as Amount / 1_000;
    let dev_share = fee / 2;
    let oracle_share = fee - dev_share;
    let prize = pot - fee;

    for (index, (key, bet)) in entrants.into_iter().enumerate() {
        let won = index == winner_index;
        let payout = if won { prize } else { 0 };
        if won && payout > 0 {
            resolved.entries.push(PayoutEntry {
                kind: PayoutKind::ChainGamePayout,
                address: bet.address.clone(),
                amount: payout,
                bet_ref: Some((TableId::ChainGameBets, key.clone())),
            });
        }
        resolved.completions.push(BetCompletion {
            table: TableId::ChainGameBets,
            key,
            status: if won { BetStatus::Won } else { BetStatus::Lost },
            payout,
        });
    }

    push_reward(resolved, &params.dev_payout_address, dev_share);
    push_reward(resolved, &params.oracle_payout_address, oracle_share);
    Ok(())
}

/// Deterministic winner index: the seed and event id are hashed together
/// and reduced modulo the entrant count.
fn chain_game_winner(seed: &[u8; 32], event_id: u16, entrants: usize) -> usize {
    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(event_id.to_le_bytes());
    let digest = hasher.finalize();
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(raw) % entrants as u64) as usize
}

/// Quick-game bets placed at height h settle at h+1 using that block's
/// seed, via the per-game handler table.
fn resolve_quick_games(
    batch: &StoreBatch,
    block: &Block,
    params: &ConsensusParams,
    resolved: &mut ResolvedPayouts,
) -> Result<(), LedgerError> {
    let height = batch.height();
    if height == 0 {
        return Ok(());
    }
    let bets: Vec<(Vec<u8>, QuickGameBetRecord)> =
        batch.scan_prefix(TableId::QuickGameBets, &keys::height_prefix(height - 1))?;

    for (key, bet) in bets {
        if bet.completed {
            continue;
        }
        let Some(game) = quickgames::game_view(bet.game) else {
            warn!(game = ?bet.game, "no handler for quick game, refunding");
            resolved.entries.push(PayoutEntry {
                kind: PayoutKind::QuickGameRefund,
                address: bet.address.clone(),
                amount: bet.amount,
                bet_ref: Some((TableId::QuickGameBets, key.clone())),
            });
            resolved.completions.push(BetCompletion {
                table: TableId::QuickGameBets,
                key,
                status: BetStatus::Refunded,
                payout: bet.amount,
            });
            continue;
        };

        let factor = (game.handler)(&bet.bet_info, &block.seed);
        let (status, player_amount, kind) = if factor == 0 {
            (BetStatus::Lost, 0, PayoutKind::QuickGamePayout)
        } else if factor == ODDS_DIVISOR {
            (BetStatus::Refunded, bet.amount, PayoutKind::QuickGameRefund)
        } else {
            let gross = payout_amount(bet.amount, factor);
            let winnings = gross - bet.amount;
            let dev_share = winnings * game.dev_fee_permille as Amount / 1_000;
            let oracle_share = winnings * game.oracle_fee_permille as Amount / 1_000;
            push_reward(resolved, &params.dev_payout_address, dev_share);
            push_reward(resolved, &params.oracle_payout_address, oracle_share);
            (BetStatus::Won, gross - dev_share - oracle_share, PayoutKind::QuickGamePayout)
        };

        if player_amount > 0 {
            resolved.entries.push(PayoutEntry {
                kind,
                address: bet.address.clone(),
                amount: player_amount,
                bet_ref: Some((TableId::QuickGameBets, key.clone())),
            });
        }
        resolved.completions.push(BetCompletion {
            table: TableId::QuickGameBets,
            key,
            status,
            payout: player_amount,
        });
    }
    Ok(())
}

fn push_reward(resolved: &mut ResolvedPayouts, address: &str, amount: Amount) {
    if amount > 0 && !address.is_empty() {
        resolved.entries.push(PayoutEntry {
            kind: PayoutKind::Reward,
            address: address.to_owned(),
            amount,
            bet_ref: None,
        });
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Check the block's actual payout outputs against the resolved vector.
///
/// The reward transaction's outputs from index 1 onward must match the
/// expected entries one for one -- same destination, same amount, down to
/// the smallest unit. Returns, for each matched output, its vout and the
/// index of the expected entry it settles, so the caller can index payouts
/// by outpoint.
pub fn validate_block_payouts(
    block: &Block,
    resolved: &ResolvedPayouts,
) -> Result<Vec<(u32, usize)>, LedgerError> {
    let mut unmatched: Vec<usize> = (0..resolved.entries.len()).collect();
    let mut matches = Vec::new();

    let outputs: &[crate::protocol::TxOut] = match block.reward_transaction() {
        Some(tx) => &tx.outputs,
        None if resolved.entries.is_empty() => return Ok(matches),
        None => {
            return Err(LedgerError::PayoutMismatch(
                "block has no reward transaction but payouts are due".into(),
            ));
        }
    };

    // Output 0 is the block reward itself; data carriers are not payouts.
    for (vout, output) in outputs.iter().enumerate().skip(1) {
        let Some(address) = output.address() else { continue };
        if output.value <= 0 {
            continue;
        }
        let position = unmatched.iter().position(|&i| {
            let entry = &resolved.entries[i];
            entry.address == address && entry.amount == output.value
        });
        match position {
            Some(slot) => {
                matches.push((vout as u32, unmatched.remove(slot)));
            }
            None => {
                warn!(address, amount = output.value, "unexpected payout output");
                return Err(LedgerError::PayoutMismatch(format!(
                    "unexpected payout of {} to {}",
                    output.value, address
                )));
            }
        }
    }

    if let Some(&missing) = unmatched.first() {
        let entry = &resolved.entries[missing];
        warn!(address = %entry.address, amount = entry.amount, "payout missing from block");
        return Err(LedgerError::PayoutMismatch(format!(
            "missing payout of {} to {}",
            entry.amount, entry.address
        )));
    }
    Ok(matches)
}

/// Validate the block's payouts and commit their effects: mark every
/// settled bet completed (status, payout, height set together) and write
/// the payout-index rows keyed by (height, outpoint).
pub fn commit_payouts(
    batch: &mut StoreBatch,
    block: &Block,
    resolved: &ResolvedPayouts,
) -> Result<(), LedgerError> {
    let matches = validate_block_payouts(block, resolved)?;
    let height = batch.height();

    for completion in &resolved.completions {
        complete_bet(batch, completion, height)?;
    }

    if let Some(reward_tx) = block.reward_transaction() {
        for (vout, entry_index) in matches {
            let entry = &resolved.entries[entry_index];
            let outpoint = OutPoint::new(reward_tx.txid, vout);
            let key = keys::height_outpoint(height, &outpoint);
            let record =
                PayoutIndexRecord { kind: entry.kind, bet_ref: entry.bet_ref.clone() };
            batch.put(TableId::PayoutIndex, &key, &record)?;
        }
    }
    Ok(())
}

fn complete_bet(
    batch: &mut StoreBatch,
    completion: &BetCompletion,
    height: u32,
) -> Result<(), LedgerError> {
    macro_rules! transition {
        ($record_ty:ty) => {{
            let mut record: $record_ty = batch
                .get(completion.table, &completion.key)?
                .ok_or_else(|| {
                    LedgerError::BadBlock(format!(
                        "settling unknown bet {}",
                        hex::encode(&completion.key)
                    ))
                })?;
            record.completed = true;
            record.status = completion.status;
            record.payout = completion.payout;
            record.payout_height = height;
            batch.put(completion.table, &completion.key, &record)
        }};
    }

    match completion.table {
        TableId::Bets => transition!(BetRecord),
        TableId::FieldBets => transition!(FieldBetRecord),
        TableId::ChainGameBets => transition!(ChainGameBetRecord),
        TableId::QuickGameBets => transition!(QuickGameBetRecord),
        other => Err(LedgerError::BadBlock(format!(
            "bet completion against non-bet table {other:?}"
        ))),
    }
}

/// Liability helper used by the applier: the potential payout of a stake at
/// given odds, expressed in whole coins for the event accumulators.
pub fn liability_coins(stake: Amount, odds: u32) -> u64 {
    (payout_amount(stake, odds) / COIN) as u64
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn locked(home: u32, away: u32, draw: u32) -> LockedOdds {
        LockedOdds {
            start_time: 1_000_000,
            home_odds: home,
            away_odds: away,
            draw_odds: draw,
            spread_points: 0,
            spread_home_odds: 0,
            spread_away_odds: 0,
            total_points: 0,
            total_over_odds: 0,
            total_under_odds: 0,
        }
    }

    fn standard_result(home: u16, away: u16) -> ResultRecord {
        ResultRecord {
            event_id: 1,
            kind: ResultKind::Standard,
            home_score: home,
            away_score: away,
        }
    }

    #[test]
    fn moneyline_win_lose_refund() {
        let leg = BetLeg { event_id: 1, outcome: MarketOutcome::MoneyLineHome };
        let snapshot = locked(15_000, 28_000, 30_000);

        // The worked example: 100 units at 15000/10000.
        let win = leg_multiplier(&leg, &snapshot, &standard_result(2, 1));
        assert_eq!(win, 15_000);
        assert_eq!(payout_amount(100, win), 150);

        let lose = leg_multiplier(&leg, &snapshot, &standard_result(0, 3));
        assert_eq!(lose, 0);

        let refund_result = ResultRecord {
            event_id: 1,
            kind: ResultKind::EventRefund,
            home_score: 0,
            away_score: 0,
        };
        let refund = leg_multiplier(&leg, &snapshot, &refund_result);
        assert_eq!(refund, ODDS_DIVISOR);
        assert_eq!(payout_amount(100, refund), 100);
    }

    #[test]
    fn spread_push_pays_half() {
        let mut snapshot = locked(0, 0, 0);
        snapshot.spread_points = -10;
        snapshot.spread_home_odds = 19_000;
        snapshot.spread_away_odds = 19_000;

        let leg = BetLeg { event_id: 1, outcome: MarketOutcome::SpreadHome };
        // home 30, away 20: 30 - 10 == 20, dead on the line
        let push = leg_multiplier(&leg, &snapshot, &standard_result(30, 20));
        assert_eq!(push, HALF_MULTIPLIER);
        assert_eq!(payout_amount(1_000, push), 500);
    }

    #[test]
    fn moneyline_refund_only_touches_moneyline() {
        let mut snapshot = locked(15_000, 20_000, 0);
        snapshot.total_points = 30;
        snapshot.total_over_odds = 18_000;

        let result = ResultRecord {
            event_id: 1,
            kind: ResultKind::MoneyLineRefund,
            home_score: 20,
            away_score: 25,
        };
        let ml = BetLeg { event_id: 1, outcome: MarketOutcome::MoneyLineHome };
        assert_eq!(leg_multiplier(&ml, &snapshot, &result), ODDS_DIVISOR);

        let over = BetLeg { event_id: 1, outcome: MarketOutcome::TotalOver };
        assert_eq!(leg_multiplier(&over, &snapshot, &result), 18_000, "totals settle on score");
    }

    #[test]
    fn parlay_products() {
        // Two full wins multiply.
        assert_eq!(parlay_multiplier(&[15_000, 20_000]), 30_000);
        // A push leg is the identity.
        assert_eq!(parlay_multiplier(&[15_000, ODDS_DIVISOR]), 15_000);
        // Any loss zeroes the ticket.
        assert_eq!(parlay_multiplier(&[15_000, 0, 20_000]), 0);
    }

    #[test]
    fn settle_classifies_outcomes() {
        assert_eq!(settle(100, &[15_000, 20_000], false), (BetStatus::Won, 300));
        assert_eq!(settle(100, &[15_000, 0], false), (BetStatus::Lost, 0));
        assert_eq!(
            settle(100, &[ODDS_DIVISOR, ODDS_DIVISOR], false),
            (BetStatus::Refunded, 100)
        );
        assert_eq!(
            settle(100, &[15_000, ODDS_DIVISOR], false),
            (BetStatus::PartialPush, 150)
        );
        assert_eq!(settle(100, &[15_000], true), (BetStatus::Refunded, 100));
    }

    #[test]
    fn cutoff_window_detection() {
        // Event starts at t=10000, cutoff 1200s: anything after 8800 refunds.
        assert!(!placed_inside_cutoff(8_800, &[10_000], 1_200));
        assert!(placed_inside_cutoff(8_801, &[10_000], 1_200));
        assert!(placed_inside_cutoff(11_000, &[10_000], 1_200));
    }

    #[test]
    fn chain_game_winner_is_deterministic() {
        let seed = [9u8; 32];
        let first = chain_game_winner(&seed, 7, 13);
        assert_eq!(first, chain_game_winner(&seed, 7, 13));
        assert!(first < 13);
        assert_eq!(chain_game_winner(&seed, 7, 1), 0, "single entrant always wins");
    }
}
