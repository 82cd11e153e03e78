//! Pool-admission checks for betting transactions.
//!
//! Runs before a transaction enters the pending pool or a candidate block.
//! Purely advisory: nothing is mutated, and every rejection carries a
//! stable, matchable reason. Outputs that do not decode as betting
//! operations are ignored -- the transaction may be fine for unrelated
//! reasons.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;

use crate::codec::{
    decode_betting_op, field_group, field_market, BetOp, BettingOp, FieldBetOp, MappingKind,
    ResultKind,
};
use crate::protocol::{spender_address, Amount, ConsensusParams, SpendableView, Transaction, COIN};
use crate::store::records::{
    ChainGameEventRecord, EventRecord, FieldEventRecord,
};
use crate::store::{keys, BettingStore, TableId};
use crate::LedgerError;

/// Stable rejection reasons for pool admission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("operation 0x{0:02x} requires oracle authority")]
    UnauthorizedOracle(u8),
    #[error("unknown event {0}")]
    UnknownEvent(u32),
    #[error("event {0} already has a result")]
    EventResulted(u32),
    #[error("event {0} already exists")]
    EventExists(u32),
    #[error("mapping {kind:?}/{id} already exists")]
    MappingExists { kind: MappingKind, id: u32 },
    #[error("unknown mapping {kind:?}/{id}")]
    UnknownMapping { kind: MappingKind, id: u32 },
    #[error("stake {0} outside the allowed range")]
    StakeOutOfRange(Amount),
    #[error("potential odds are zero for event {event_id}")]
    ZeroOdds { event_id: u32 },
    #[error("parlay has {0} legs, above the limit")]
    TooManyLegs(usize),
    #[error("parlay repeats event {0}")]
    DuplicateLegEvent(u32),
    #[error("staged event {0} cannot join a parlay")]
    StagedEventInParlay(u32),
    #[error("unknown contender {contender_id} for event {event_id}")]
    UnknownContender { event_id: u32, contender_id: u32 },
    #[error("market {market:#04x} is closed for event {event_id}")]
    MarketClosed { event_id: u32, market: u8 },
    #[error("bad field event group type {0:#04x}")]
    BadGroupType(u8),
    #[error("bad field event market type {0:#04x}")]
    BadMarketType(u8),
    #[error("unsupported result kind for field event")]
    BadFieldResultKind,
    #[error("chain game stake {got} does not match the entry fee {expected}")]
    BadEntryFee { got: Amount, expected: Amount },
    #[error("operation not active at height {height}")]
    NotActivated { height: u32 },
    #[error("chain and quick games are disabled from height {0}")]
    GamesDisabled(u32),
    #[error("store failure: {0}")]
    Store(String),
}

impl From<LedgerError> for AdmissionError {
    fn from(e: LedgerError) -> Self {
        AdmissionError::Store(e.to_string())
    }
}

/// Check every betting operation carried by `tx` against the current chain
/// state. `height` is the height the transaction would confirm at.
pub fn check_transaction(
    store: &BettingStore,
    view: &dyn SpendableView,
    params: &ConsensusParams,
    tx: &Transaction,
    height: u32,
) -> Result<(), AdmissionError> {
    for output in &tx.outputs {
        let Some(op) = decode_betting_op(output) else { continue };

        if op.is_oracle_op() {
            let authorized = spender_address(view, tx)
                .map(|addr| params.is_oracle(&addr))
                .unwrap_or(false);
            if !authorized {
                return Err(AdmissionError::UnauthorizedOracle(op.tag()));
            }
        }

        let stake = output.value;
        match &op {
            BettingOp::Bet(bet) => {
                check_single_stake(stake, params)?;
                check_bet_leg(store, bet, params, height)?;
            }
            BettingOp::ParlayBet(parlay) => {
                if height < params.v3_activation_height {
                    return Err(AdmissionError::NotActivated { height });
                }
                if parlay.legs.len() > params.max_parlay_legs {
                    return Err(AdmissionError::TooManyLegs(parlay.legs.len()));
                }
                if stake < params.min_bet || stake > params.max_parlay_bet {
                    return Err(AdmissionError::StakeOutOfRange(stake));
                }
                check_distinct_legs(parlay.legs.iter().map(|l| l.event_id))?;
                for leg in &parlay.legs {
                    let event = check_bet_leg(store, leg, params, height)?;
                    if height >= params.v4_activation_height && event.stage != 0 {
                        return Err(AdmissionError::StagedEventInParlay(leg.event_id));
                    }
                }
            }
            BettingOp::FieldBet(bet) => {
                if height < params.v4_activation_height {
                    return Err(AdmissionError::NotActivated { height });
                }
                check_single_stake(stake, params)?;
                check_field_bet_leg(store, bet)?;
            }
            BettingOp::FieldParlayBet(parlay) => {
                if height < params.v4_activation_height {
                    return Err(AdmissionError::NotActivated { height });
                }
                if parlay.legs.len() > params.max_parlay_legs {
                    return Err(AdmissionError::TooManyLegs(parlay.legs.len()));
                }
                if stake < params.min_bet || stake > params.max_parlay_bet {
                    return Err(AdmissionError::StakeOutOfRange(stake));
                }
                check_distinct_legs(parlay.legs.iter().map(|l| l.event_id))?;
                for leg in &parlay.legs {
                    let event = check_field_bet_leg(store, leg)?;
                    if event.stage != 0 {
                        return Err(AdmissionError::StagedEventInParlay(leg.event_id));
                    }
                }
            }
            BettingOp::ChainGameBet(bet) => {
                check_games_active(params, height)?;
                let key = keys::chain_game_event(bet.event_id);
                let event: ChainGameEventRecord = store
                    .get(TableId::ChainGameEvents, &key)?
                    .ok_or(AdmissionError::UnknownEvent(bet.event_id as u32))?;
                if store.exists(TableId::ChainGameResults, &key)? {
                    return Err(AdmissionError::EventResulted(bet.event_id as u32));
                }
                let expected = event.entry_fee as Amount * COIN;
                if stake != expected {
                    return Err(AdmissionError::BadEntryFee { got: stake, expected });
                }
            }
            BettingOp::QuickGameBet(bet) => {
                check_games_active(params, height)?;
                check_single_stake(stake, params)?;
                if crate::quickgames::game_view(bet.game).is_none() {
                    return Err(AdmissionError::NotActivated { height });
                }
            }

            BettingOp::Mapping(mapping) => {
                if height < params.v4_activation_height
                    && matches!(
                        mapping.kind,
                        MappingKind::IndividualSport | MappingKind::Contender
                    )
                {
                    return Err(AdmissionError::NotActivated { height });
                }
                let key = keys::mapping(mapping.kind, mapping.id);
                if store.exists(TableId::Mappings, &key)? {
                    return Err(AdmissionError::MappingExists {
                        kind: mapping.kind,
                        id: mapping.id,
                    });
                }
            }
            BettingOp::Event(event) => {
                let key = keys::event(event.event_id);
                if store.exists(TableId::Events, &key)? {
                    return Err(AdmissionError::EventExists(event.event_id));
                }
                require_mapping(store, MappingKind::Sport, event.sport as u32)?;
                require_mapping(store, MappingKind::Tournament, event.tournament as u32)?;
                require_mapping(store, MappingKind::Round, event.stage as u32)?;
                require_mapping(store, MappingKind::Team, event.home_team)?;
                require_mapping(store, MappingKind::Team, event.away_team)?;
            }
            BettingOp::UpdateOdds(update) => {
                require_event(store, update.event_id)?;
            }
            BettingOp::SpreadsMarket(spreads) => {
                require_event(store, spreads.event_id)?;
            }
            BettingOp::TotalsMarket(totals) => {
                require_event(store, totals.event_id)?;
            }
            BettingOp::EventPatch(patch) => {
                require_event(store, patch.event_id)?;
            }
            BettingOp::ZeroingOdds(zeroing) => {
                if height < params.v4_activation_height {
                    return Err(AdmissionError::NotActivated { height });
                }
                for event_id in &zeroing.event_ids {
                    require_event(store, *event_id)?;
                }
            }
            BettingOp::Result(result) => {
                require_event(store, result.event_id)?;
                if store.exists(TableId::Results, &keys::event(result.event_id))? {
                    return Err(AdmissionError::EventResulted(result.event_id));
                }
            }

            BettingOp::FieldEvent(event) => {
                if height < params.v4_activation_height {
                    return Err(AdmissionError::NotActivated { height });
                }
                let key = keys::event(event.event_id);
                if store.exists(TableId::FieldEvents, &key)? {
                    return Err(AdmissionError::EventExists(event.event_id));
                }
                if !field_group::valid(event.group_type) {
                    return Err(AdmissionError::BadGroupType(event.group_type));
                }
                if !field_market::valid(event.market_type) {
                    return Err(AdmissionError::BadMarketType(event.market_type));
                }
                require_mapping(store, MappingKind::IndividualSport, event.sport as u32)?;
                require_mapping(store, MappingKind::Tournament, event.tournament as u32)?;
                require_mapping(store, MappingKind::Round, event.stage as u32)?;
                for contender_id in event.contender_odds.keys() {
                    require_mapping(store, MappingKind::Contender, *contender_id)?;
                }
            }
            BettingOp::FieldUpdateOdds(update) => {
                require_field_event(store, update.event_id)?;
                for contender_id in update.contender_odds.keys() {
                    require_mapping(store, MappingKind::Contender, *contender_id)?;
                }
            }
            BettingOp::FieldUpdateModifiers(update) => {
                require_field_event(store, update.event_id)?;
                for contender_id in update.contender_modifiers.keys() {
                    require_mapping(store, MappingKind::Contender, *contender_id)?;
                }
            }
            BettingOp::FieldUpdateMargin(update) => {
                require_field_event(store, update.event_id)?;
            }
            BettingOp::FieldZeroingOdds(zeroing) => {
                require_field_event(store, zeroing.event_id)?;
            }
            BettingOp::FieldResult(result) => {
                if !matches!(
                    result.kind,
                    ResultKind::Standard | ResultKind::EventRefund | ResultKind::EventClosed
                ) {
                    return Err(AdmissionError::BadFieldResultKind);
                }
                let event = require_field_event(store, result.event_id)?;
                if store.exists(TableId::FieldResults, &keys::event(result.event_id))? {
                    return Err(AdmissionError::EventResulted(result.event_id));
                }
                for contender_id in result.contender_results.keys() {
                    if !event.contenders.contains_key(contender_id) {
                        return Err(AdmissionError::UnknownContender {
                            event_id: result.event_id,
                            contender_id: *contender_id,
                        });
                    }
                }
            }

            BettingOp::ChainGameEvent(event) => {
                check_games_active(params, height)?;
                let key = keys::chain_game_event(event.event_id);
                if store.exists(TableId::ChainGameEvents, &key)? {
                    return Err(AdmissionError::EventExists(event.event_id as u32));
                }
            }
            BettingOp::ChainGameResult(result) => {
                check_games_active(params, height)?;
                let key = keys::chain_game_event(result.event_id);
                if !store.exists(TableId::ChainGameEvents, &key)? {
                    return Err(AdmissionError::UnknownEvent(result.event_id as u32));
                }
                if store.exists(TableId::ChainGameResults, &key)? {
                    return Err(AdmissionError::EventResulted(result.event_id as u32));
                }
            }
        }
        debug!(tag = op.tag(), txid = %tx.txid, "betting operation admitted");
    }
    Ok(())
}

fn check_single_stake(stake: Amount, params: &ConsensusParams) -> Result<(), AdmissionError> {
    if stake < params.min_bet || stake > params.max_bet {
        return Err(AdmissionError::StakeOutOfRange(stake));
    }
    Ok(())
}

fn check_games_active(params: &ConsensusParams, height: u32) -> Result<(), AdmissionError> {
    if height < params.v3_activation_height {
        return Err(AdmissionError::NotActivated { height });
    }
    if height >= params.quick_games_end_height {
        return Err(AdmissionError::GamesDisabled(params.quick_games_end_height));
    }
    Ok(())
}

fn check_distinct_legs(
    event_ids: impl Iterator<Item = u32>,
) -> Result<(), AdmissionError> {
    let mut seen = BTreeSet::new();
    for event_id in event_ids {
        if !seen.insert(event_id) {
            return Err(AdmissionError::DuplicateLegEvent(event_id));
        }
    }
    Ok(())
}

/// The event must exist, be un-resulted and (from the v4 height) still
/// carry non-zero odds for the chosen outcome.
fn check_bet_leg(
    store: &BettingStore,
    leg: &BetOp,
    params: &ConsensusParams,
    height: u32,
) -> Result<EventRecord, AdmissionError> {
    let key = keys::event(leg.event_id);
    let event: EventRecord = store
        .get(TableId::Events, &key)?
        .ok_or(AdmissionError::UnknownEvent(leg.event_id))?;
    if store.exists(TableId::Results, &key)? {
        return Err(AdmissionError::EventResulted(leg.event_id));
    }
    if height >= params.v4_activation_height && event.odds_for(leg.outcome) == 0 {
        return Err(AdmissionError::ZeroOdds { event_id: leg.event_id });
    }
    Ok(event)
}

fn check_field_bet_leg(
    store: &BettingStore,
    leg: &FieldBetOp,
) -> Result<FieldEventRecord, AdmissionError> {
    let key = keys::event(leg.event_id);
    let event: FieldEventRecord = store
        .get(TableId::FieldEvents, &key)?
        .ok_or(AdmissionError::UnknownEvent(leg.event_id))?;
    if store.exists(TableId::FieldResults, &key)? {
        return Err(AdmissionError::EventResulted(leg.event_id));
    }
    if !event.market_open(leg.outcome) {
        return Err(AdmissionError::MarketClosed {
            event_id: leg.event_id,
            market: leg.outcome.to_byte(),
        });
    }
    if !event.contenders.contains_key(&leg.contender_id) {
        return Err(AdmissionError::UnknownContender {
            event_id: leg.event_id,
            contender_id: leg.contender_id,
        });
    }
    if event.odds_for(leg.outcome, leg.contender_id).unwrap_or(0) == 0 {
        return Err(AdmissionError::ZeroOdds { event_id: leg.event_id });
    }
    Ok(event)
}

fn require_event(store: &BettingStore, event_id: u32) -> Result<(), AdmissionError> {
    if !store.exists(TableId::Events, &keys::event(event_id))? {
        return Err(AdmissionError::UnknownEvent(event_id));
    }
    Ok(())
}

fn require_field_event(
    store: &BettingStore,
    event_id: u32,
) -> Result<FieldEventRecord, AdmissionError> {
    store
        .get(TableId::FieldEvents, &keys::event(event_id))?
        .ok_or(AdmissionError::UnknownEvent(event_id))
}

fn require_mapping(
    store: &BettingStore,
    kind: MappingKind,
    id: u32,
) -> Result<(), AdmissionError> {
    if !store.exists(TableId::Mappings, &keys::mapping(kind, id))? {
        return Err(AdmissionError::UnknownMapping { kind, id });
    }
    Ok(())
}
