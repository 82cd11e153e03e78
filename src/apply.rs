//! Block-connect state transition.
//!
//! Re-decodes every output of the connecting block and commits its effects
//! to the store batch. Traversal order -- transactions in block order,
//! outputs in output order -- is itself a consensus rule: accumulators and
//! locked snapshots depend on it.
//!
//! Inconsistent references (a bet on an event that does not exist, an odds
//! update for a missing event) are fatal to the block: admission and the
//! block pre-check should have stopped them, so their presence means the
//! block is invalid. Duplicate definitions are the one tolerated anomaly:
//! last write wins, with the previous record journaled for undo.

use tracing::{debug, warn};

use crate::codec::{decode_betting_op, BettingOp};
use crate::payout::liability_coins;
use crate::protocol::{
    spender_address, Block, ConsensusParams, SpendableView, Transaction, COIN,
};
use crate::store::records::{
    BetLeg, BetRecord, ChainGameBetRecord, ChainGameEventRecord, ChainGameResultRecord,
    EventRecord, FieldBetLeg, FieldBetRecord, FieldEventRecord, FieldLockedOdds,
    FieldResultRecord, LockedOdds, MappingRecord, QuickGameBetRecord, ResultRecord,
};
use crate::store::{keys, StoreBatch, TableId};
use crate::LedgerError;

/// Apply every betting operation in `block` to the batch.
pub fn apply_block(
    batch: &mut StoreBatch,
    view: &dyn SpendableView,
    params: &ConsensusParams,
    block: &Block,
) -> Result<(), LedgerError> {
    let height = batch.height();
    debug!(height, txs = block.transactions.len(), "applying betting operations");

    for tx in &block.transactions {
        for (vout, output) in tx.outputs.iter().enumerate() {
            let Some(op) = decode_betting_op(output) else { continue };

            // The funding output's address identifies the actor. The view
            // may not cover outputs created earlier in this same block, so
            // fall back to an in-block lookup.
            let address = spender_address(view, tx).or_else(|| in_block_spender(block, tx));
            let Some(address) = address else {
                debug!(txid = %tx.txid, vout, "skipping operation without resolvable funder");
                continue;
            };

            if op.is_oracle_op() && !params.is_oracle(&address) {
                return Err(LedgerError::BadBlock(format!(
                    "operation 0x{:02x} in {} from non-oracle address",
                    op.tag(),
                    tx.txid
                )));
            }

            apply_op(batch, params, block, tx, vout as u32, &op, &address, output.value)?;
        }
    }
    Ok(())
}

fn in_block_spender(block: &Block, tx: &Transaction) -> Option<String> {
    let prevout = tx.inputs.first()?.prevout;
    let funding_tx = block.transactions.iter().find(|t| t.txid == prevout.txid)?;
    let output = funding_tx.outputs.get(prevout.vout as usize)?;
    output.address().map(str::to_owned)
}

#[allow(clippy::too_many_arguments)]
fn apply_op(
    batch: &mut StoreBatch,
    params: &ConsensusParams,
    block: &Block,
    tx: &Transaction,
    vout: u32,
    op: &BettingOp,
    address: &str,
    stake: crate::protocol::Amount,
) -> Result<(), LedgerError> {
    let height = batch.height();
    match op {
        // ==================== oracle operations ====================
        BettingOp::Mapping(mapping) => {
            if height < params.v4_activation_height
                && matches!(
                    mapping.kind,
                    crate::codec::MappingKind::IndividualSport
                        | crate::codec::MappingKind::Contender
                )
            {
                return Ok(());
            }
            let key = keys::mapping(mapping.kind, mapping.id);
            // Mappings are append-only; a replay of an existing id is
            // ignored rather than overwritten.
            if !batch.exists(TableId::Mappings, &key)? {
                batch.put(
                    TableId::Mappings,
                    &key,
                    &MappingRecord { name: mapping.name.clone() },
                )?;
            }
        }
        BettingOp::Event(event_op) => {
            let key = keys::event(event_op.event_id);
            if batch.exists(TableId::Events, &key)? {
                warn!(event_id = event_op.event_id, "duplicate event definition, last write wins");
            }
            batch.put(TableId::Events, &key, &EventRecord::from_op(event_op, height))?;
        }
        BettingOp::UpdateOdds(update) => {
            let key = keys::event(update.event_id);
            let mut event: EventRecord = require(batch.get(TableId::Events, &key)?, || {
                format!("odds update for unknown event {}", update.event_id)
            })?;
            event.apply_update(update);
            batch.put(TableId::Events, &key, &event)?;
        }
        BettingOp::SpreadsMarket(spreads) => {
            let key = keys::event(spreads.event_id);
            let mut event: EventRecord = require(batch.get(TableId::Events, &key)?, || {
                format!("spreads market for unknown event {}", spreads.event_id)
            })?;
            event.apply_spreads(spreads);
            batch.put(TableId::Events, &key, &event)?;
        }
        BettingOp::TotalsMarket(totals) => {
            let key = keys::event(totals.event_id);
            let mut event: EventRecord = require(batch.get(TableId::Events, &key)?, || {
                format!("totals market for unknown event {}", totals.event_id)
            })?;
            event.apply_totals(totals);
            batch.put(TableId::Events, &key, &event)?;
        }
        BettingOp::EventPatch(patch) => {
            let key = keys::event(patch.event_id);
            let mut event: EventRecord = require(batch.get(TableId::Events, &key)?, || {
                format!("patch for unknown event {}", patch.event_id)
            })?;
            event.apply_patch(patch);
            batch.put(TableId::Events, &key, &event)?;
        }
        BettingOp::ZeroingOdds(zeroing) => {
            if height < params.v4_activation_height {
                return Ok(());
            }
            for event_id in &zeroing.event_ids {
                let key = keys::event(*event_id);
                let mut event: EventRecord = require(batch.get(TableId::Events, &key)?, || {
                    format!("zeroing odds for unknown event {event_id}")
                })?;
                event.zero_odds();
                batch.put(TableId::Events, &key, &event)?;
            }
        }
        BettingOp::Result(result) => {
            let key = keys::event(result.event_id);
            if !batch.exists(TableId::Events, &key)? {
                return Err(LedgerError::BadBlock(format!(
                    "result for unknown event {}",
                    result.event_id
                )));
            }
            batch.put(TableId::Results, &key, &ResultRecord::from_op(result))?;
        }

        BettingOp::FieldEvent(event_op) => {
            if height < params.v4_activation_height {
                return Ok(());
            }
            let key = keys::event(event_op.event_id);
            if batch.exists(TableId::FieldEvents, &key)? {
                warn!(
                    event_id = event_op.event_id,
                    "duplicate field event definition, last write wins"
                );
            }
            batch.put(
                TableId::FieldEvents,
                &key,
                &FieldEventRecord::from_op(event_op, height),
            )?;
        }
        BettingOp::FieldUpdateOdds(update) => {
            if height < params.v4_activation_height {
                return Ok(());
            }
            let key = keys::event(update.event_id);
            let mut event: FieldEventRecord =
                require(batch.get(TableId::FieldEvents, &key)?, || {
                    format!("field odds update for unknown event {}", update.event_id)
                })?;
            event.set_input_odds(&update.contender_odds);
            batch.put(TableId::FieldEvents, &key, &event)?;
        }
        BettingOp::FieldUpdateModifiers(update) => {
            if height < params.v4_activation_height {
                return Ok(());
            }
            let key = keys::event(update.event_id);
            let mut event: FieldEventRecord =
                require(batch.get(TableId::FieldEvents, &key)?, || {
                    format!("field modifier update for unknown event {}", update.event_id)
                })?;
            event.set_modifiers(&update.contender_modifiers);
            batch.put(TableId::FieldEvents, &key, &event)?;
        }
        BettingOp::FieldUpdateMargin(update) => {
            if height < params.v4_activation_height {
                return Ok(());
            }
            let key = keys::event(update.event_id);
            let mut event: FieldEventRecord =
                require(batch.get(TableId::FieldEvents, &key)?, || {
                    format!("margin update for unknown event {}", update.event_id)
                })?;
            event.set_margin(update.margin_percent);
            batch.put(TableId::FieldEvents, &key, &event)?;
        }
        BettingOp::FieldZeroingOdds(zeroing) => {
            if height < params.v4_activation_height {
                return Ok(());
            }
            let key = keys::event(zeroing.event_id);
            let mut event: FieldEventRecord =
                require(batch.get(TableId::FieldEvents, &key)?, || {
                    format!("field zeroing for unknown event {}", zeroing.event_id)
                })?;
            event.zero_odds();
            batch.put(TableId::FieldEvents, &key, &event)?;
        }
        BettingOp::FieldResult(result) => {
            if height < params.v4_activation_height {
                return Ok(());
            }
            let key = keys::event(result.event_id);
            let event: FieldEventRecord =
                require(batch.get(TableId::FieldEvents, &key)?, || {
                    format!("field result for unknown event {}", result.event_id)
                })?;
            batch.put(
                TableId::FieldResults,
                &key,
                &FieldResultRecord::from_op(result, &event),
            )?;
        }

        BettingOp::ChainGameEvent(event_op) => {
            if height < params.v3_activation_height || height >= params.quick_games_end_height {
                return Ok(());
            }
            let key = keys::chain_game_event(event_op.event_id);
            batch.put(
                TableId::ChainGameEvents,
                &key,
                &ChainGameEventRecord {
                    event_id: event_op.event_id,
                    entry_fee: event_op.entry_fee,
                },
            )?;
        }
        BettingOp::ChainGameResult(result) => {
            if height < params.v3_activation_height || height >= params.quick_games_end_height {
                return Ok(());
            }
            let key = keys::chain_game_event(result.event_id);
            if !batch.exists(TableId::ChainGameEvents, &key)? {
                return Err(LedgerError::BadBlock(format!(
                    "chain game result for unknown event {}",
                    result.event_id
                )));
            }
            batch.put(
                TableId::ChainGameResults,
                &key,
                &ChainGameResultRecord { event_id: result.event_id },
            )?;
        }

        // ==================== player operations ====================
        BettingOp::Bet(bet) => {
            let key = keys::event(bet.event_id);
            let mut event: EventRecord = require(batch.get(TableId::Events, &key)?, || {
                format!("bet on unknown event {}", bet.event_id)
            })?;
            if batch.exists(TableId::Results, &key)? {
                return Err(LedgerError::BadBlock(format!(
                    "bet on resulted event {}",
                    bet.event_id
                )));
            }

            let locked = LockedOdds::from_event(&event);
            let potential = liability_coins(stake, event.odds_for(bet.outcome));
            event.record_bet(bet.outcome, potential, (stake / COIN) as u64);
            batch.put(TableId::Events, &key, &event)?;

            let record = BetRecord::new(
                stake,
                address.to_owned(),
                block.time,
                vec![BetLeg { event_id: bet.event_id, outcome: bet.outcome }],
                vec![locked],
            );
            let bet_key = keys::height_outpoint(height, &tx.outpoint(vout));
            batch.put(TableId::Bets, &bet_key, &record)?;
        }
        BettingOp::ParlayBet(parlay) => {
            if height < params.v3_activation_height {
                return Ok(());
            }
            let mut legs = Vec::with_capacity(parlay.legs.len());
            let mut locked = Vec::with_capacity(parlay.legs.len());
            for leg in &parlay.legs {
                let key = keys::event(leg.event_id);
                let mut event: EventRecord = require(batch.get(TableId::Events, &key)?, || {
                    format!("parlay leg on unknown event {}", leg.event_id)
                })?;
                if batch.exists(TableId::Results, &key)? {
                    return Err(LedgerError::BadBlock(format!(
                        "parlay leg on resulted event {}",
                        leg.event_id
                    )));
                }
                event.record_parlay_leg(leg.outcome);
                batch.put(TableId::Events, &key, &event)?;
                locked.push(LockedOdds::from_event(&event));
                legs.push(BetLeg { event_id: leg.event_id, outcome: leg.outcome });
            }
            if legs.is_empty() {
                return Ok(());
            }
            let record = BetRecord::new(stake, address.to_owned(), block.time, legs, locked);
            let bet_key = keys::height_outpoint(height, &tx.outpoint(vout));
            batch.put(TableId::Bets, &bet_key, &record)?;
        }
        BettingOp::FieldBet(bet) => {
            if height < params.v4_activation_height {
                return Ok(());
            }
            let key = keys::event(bet.event_id);
            let mut event: FieldEventRecord =
                require(batch.get(TableId::FieldEvents, &key)?, || {
                    format!("field bet on unknown event {}", bet.event_id)
                })?;
            if batch.exists(TableId::FieldResults, &key)? {
                return Err(LedgerError::BadBlock(format!(
                    "field bet on resulted event {}",
                    bet.event_id
                )));
            }

            let locked = FieldLockedOdds::from_event(&event);
            let odds = event.odds_for(bet.outcome, bet.contender_id).unwrap_or(0);
            event.record_bet(bet, liability_coins(stake, odds));
            batch.put(TableId::FieldEvents, &key, &event)?;

            let record = FieldBetRecord::new(
                stake,
                address.to_owned(),
                block.time,
                vec![FieldBetLeg {
                    event_id: bet.event_id,
                    outcome: bet.outcome,
                    contender_id: bet.contender_id,
                }],
                vec![locked],
            );
            let bet_key = keys::height_outpoint(height, &tx.outpoint(vout));
            batch.put(TableId::FieldBets, &bet_key, &record)?;
        }
        BettingOp::FieldParlayBet(parlay) => {
            if height < params.v4_activation_height {
                return Ok(());
            }
            let mut legs = Vec::with_capacity(parlay.legs.len());
            let mut locked = Vec::with_capacity(parlay.legs.len());
            for leg in &parlay.legs {
                let key = keys::event(leg.event_id);
                let mut event: FieldEventRecord =
                    require(batch.get(TableId::FieldEvents, &key)?, || {
                        format!("field parlay leg on unknown event {}", leg.event_id)
                    })?;
                if batch.exists(TableId::FieldResults, &key)? {
                    return Err(LedgerError::BadBlock(format!(
                        "field parlay leg on resulted event {}",
                        leg.event_id
                    )));
                }
                event.record_parlay_leg(leg);
                batch.put(TableId::FieldEvents, &key, &event)?;
                locked.push(FieldLockedOdds::from_event(&event));
                legs.push(FieldBetLeg {
                    event_id: leg.event_id,
                    outcome: leg.outcome,
                    contender_id: leg.contender_id,
                });
            }
            if legs.is_empty() {
                return Ok(());
            }
            let record = FieldBetRecord::new(stake, address.to_owned(), block.time, legs, locked);
            let bet_key = keys::height_outpoint(height, &tx.outpoint(vout));
            batch.put(TableId::FieldBets, &bet_key, &record)?;
        }
        BettingOp::ChainGameBet(bet) => {
            if height < params.v3_activation_height || height >= params.quick_games_end_height {
                return Ok(());
            }
            let key = keys::chain_game_event(bet.event_id);
            if !batch.exists(TableId::ChainGameEvents, &key)? {
                return Err(LedgerError::BadBlock(format!(
                    "chain game bet on unknown event {}",
                    bet.event_id
                )));
            }
            if batch.exists(TableId::ChainGameResults, &key)? {
                return Err(LedgerError::BadBlock(format!(
                    "chain game bet on resulted event {}",
                    bet.event_id
                )));
            }
            let record = ChainGameBetRecord {
                event_id: bet.event_id,
                amount: stake,
                address: address.to_owned(),
                placed_time: block.time,
                completed: false,
                status: crate::store::records::BetStatus::Open,
                payout: 0,
                payout_height: 0,
            };
            let bet_key = keys::height_outpoint(height, &tx.outpoint(vout));
            batch.put(TableId::ChainGameBets, &bet_key, &record)?;
        }
        BettingOp::QuickGameBet(bet) => {
            if height < params.v3_activation_height || height >= params.quick_games_end_height {
                return Ok(());
            }
            let record = QuickGameBetRecord {
                game: bet.game,
                bet_info: bet.bet_info.clone(),
                amount: stake,
                address: address.to_owned(),
                placed_time: block.time,
                completed: false,
                status: crate::store::records::BetStatus::Open,
                payout: 0,
                payout_height: 0,
            };
            let bet_key = keys::height_outpoint(height, &tx.outpoint(vout));
            batch.put(TableId::QuickGameBets, &bet_key, &record)?;
        }
    }
    Ok(())
}

fn require<T>(value: Option<T>, detail: impl FnOnce() -> String) -> Result<T, LedgerError> {
    value.ok_or_else(|| LedgerError::BadBlock(detail()))
}
