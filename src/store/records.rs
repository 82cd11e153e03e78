//! Record types persisted in the betting store.
//!
//! All records are serialized with borsh: the byte layout is deterministic,
//! which keeps store contents identical across nodes and makes undo
//! pre-images byte-comparable.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::codec::{
    ContenderResult, EventOp, EventPatchOp, FieldBetOp, FieldEventOp, FieldOutcome,
    FieldResultOp, MarketOutcome, QuickGameKind, ResultKind, ResultOp, SpreadsMarketOp,
    TotalsMarketOp, UpdateOddsOp, field_market,
};
use crate::payout::ODDS_DIVISOR;
use crate::protocol::Amount;

/// Per-outcome liability accumulator: how many bets target the outcome and
/// the summed potential payout (in whole coins) if it hits.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct OutcomeTally {
    pub bets: u32,
    pub liability: u64,
}

impl OutcomeTally {
    fn note(&mut self, liability: u64) {
        self.bets += 1;
        self.liability += liability;
    }

    fn note_leg(&mut self) {
        self.bets += 1;
    }
}

// ============================================================================
// HEAD-TO-HEAD EVENTS
// ============================================================================

/// Live state of a head-to-head event: classification, current market odds
/// and the liability accumulators mutated by every incoming bet.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct EventRecord {
    pub event_id: u32,
    pub start_time: u32,
    pub sport: u16,
    pub tournament: u16,
    pub stage: u16,
    pub home_team: u32,
    pub away_team: u32,

    pub home_odds: u32,
    pub away_odds: u32,
    pub draw_odds: u32,
    pub spread_points: i16,
    pub spread_home_odds: u32,
    pub spread_away_odds: u32,
    pub total_points: u16,
    pub total_over_odds: u32,
    pub total_under_odds: u32,

    pub creation_height: u32,

    pub ml_home: OutcomeTally,
    pub ml_away: OutcomeTally,
    pub ml_draw: OutcomeTally,
    pub spread_home: OutcomeTally,
    pub spread_away: OutcomeTally,
    pub spread_push: OutcomeTally,
    pub total_over: OutcomeTally,
    pub total_under: OutcomeTally,
    pub total_push: OutcomeTally,
}

impl EventRecord {
    pub fn from_op(op: &EventOp, height: u32) -> Self {
        Self {
            event_id: op.event_id,
            start_time: op.start_time,
            sport: op.sport,
            tournament: op.tournament,
            stage: op.stage,
            home_team: op.home_team,
            away_team: op.away_team,
            home_odds: op.home_odds,
            away_odds: op.away_odds,
            draw_odds: op.draw_odds,
            spread_points: 0,
            spread_home_odds: 0,
            spread_away_odds: 0,
            total_points: 0,
            total_over_odds: 0,
            total_under_odds: 0,
            creation_height: height,
            ml_home: OutcomeTally::default(),
            ml_away: OutcomeTally::default(),
            ml_draw: OutcomeTally::default(),
            spread_home: OutcomeTally::default(),
            spread_away: OutcomeTally::default(),
            spread_push: OutcomeTally::default(),
            total_over: OutcomeTally::default(),
            total_under: OutcomeTally::default(),
            total_push: OutcomeTally::default(),
        }
    }

    pub fn apply_update(&mut self, op: &UpdateOddsOp) {
        self.home_odds = op.home_odds;
        self.away_odds = op.away_odds;
        self.draw_odds = op.draw_odds;
    }

    pub fn apply_spreads(&mut self, op: &SpreadsMarketOp) {
        self.spread_points = op.points;
        self.spread_home_odds = op.home_odds;
        self.spread_away_odds = op.away_odds;
    }

    pub fn apply_totals(&mut self, op: &TotalsMarketOp) {
        self.total_points = op.points;
        self.total_over_odds = op.over_odds;
        self.total_under_odds = op.under_odds;
    }

    pub fn apply_patch(&mut self, op: &EventPatchOp) {
        self.start_time = op.start_time;
    }

    pub fn zero_odds(&mut self) {
        self.home_odds = 0;
        self.away_odds = 0;
        self.draw_odds = 0;
        self.spread_home_odds = 0;
        self.spread_away_odds = 0;
        self.total_over_odds = 0;
        self.total_under_odds = 0;
    }

    /// Current odds for an outcome (zero when that market is closed).
    pub fn odds_for(&self, outcome: MarketOutcome) -> u32 {
        match outcome {
            MarketOutcome::MoneyLineHome => self.home_odds,
            MarketOutcome::MoneyLineAway => self.away_odds,
            MarketOutcome::MoneyLineDraw => self.draw_odds,
            MarketOutcome::SpreadHome => self.spread_home_odds,
            MarketOutcome::SpreadAway => self.spread_away_odds,
            MarketOutcome::TotalOver => self.total_over_odds,
            MarketOutcome::TotalUnder => self.total_under_odds,
        }
    }

    /// Fold a single bet into the liability accumulators. Spread and total
    /// bets can also push, so those track the staked amount separately.
    pub fn record_bet(&mut self, outcome: MarketOutcome, payout_coins: u64, stake_coins: u64) {
        match outcome {
            MarketOutcome::MoneyLineHome => self.ml_home.note(payout_coins),
            MarketOutcome::MoneyLineAway => self.ml_away.note(payout_coins),
            MarketOutcome::MoneyLineDraw => self.ml_draw.note(payout_coins),
            MarketOutcome::SpreadHome => {
                self.spread_home.note(payout_coins);
                self.spread_push.note(stake_coins);
            }
            MarketOutcome::SpreadAway => {
                self.spread_away.note(payout_coins);
                self.spread_push.note(stake_coins);
            }
            MarketOutcome::TotalOver => {
                self.total_over.note(payout_coins);
                self.total_push.note(stake_coins);
            }
            MarketOutcome::TotalUnder => {
                self.total_under.note(payout_coins);
                self.total_push.note(stake_coins);
            }
        }
    }

    /// Parlay legs only bump bet counts; the leg payout depends on the
    /// sibling legs so no single event carries its liability.
    pub fn record_parlay_leg(&mut self, outcome: MarketOutcome) {
        match outcome {
            MarketOutcome::MoneyLineHome => self.ml_home.note_leg(),
            MarketOutcome::MoneyLineAway => self.ml_away.note_leg(),
            MarketOutcome::MoneyLineDraw => self.ml_draw.note_leg(),
            MarketOutcome::SpreadHome => {
                self.spread_home.note_leg();
                self.spread_push.note_leg();
            }
            MarketOutcome::SpreadAway => {
                self.spread_away.note_leg();
                self.spread_push.note_leg();
            }
            MarketOutcome::TotalOver => {
                self.total_over.note_leg();
                self.total_push.note_leg();
            }
            MarketOutcome::TotalUnder => {
                self.total_under.note_leg();
                self.total_push.note_leg();
            }
        }
    }
}

// ============================================================================
// FIELD EVENTS
// ============================================================================

#[derive(
    Debug, Clone, Default, PartialEq, Eq,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct ContenderInfo {
    /// Oracle-supplied raw odds.
    pub input_odds: u32,
    /// Additive odds offset applied before the margin trim.
    pub modifier: u32,
    pub outright_odds: u32,
    pub place_odds: u32,
    pub show_odds: u32,
    pub outright: OutcomeTally,
    pub place: OutcomeTally,
    pub show: OutcomeTally,
}

impl ContenderInfo {
    pub fn odds_for(&self, outcome: FieldOutcome) -> u32 {
        match outcome {
            FieldOutcome::Outright => self.outright_odds,
            FieldOutcome::Place => self.place_odds,
            FieldOutcome::Show => self.show_odds,
        }
    }
}

/// Live state of a multi-contender event.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct FieldEventRecord {
    pub event_id: u32,
    pub start_time: u32,
    pub sport: u16,
    pub tournament: u16,
    pub stage: u16,
    pub group_type: u8,
    pub market_type: u8,
    pub margin_percent: u32,
    pub creation_height: u32,
    pub contenders: BTreeMap<u32, ContenderInfo>,
}

impl FieldEventRecord {
    pub fn from_op(op: &FieldEventOp, height: u32) -> Self {
        let mut record = Self {
            event_id: op.event_id,
            start_time: op.start_time,
            sport: op.sport,
            tournament: op.tournament,
            stage: op.stage,
            group_type: op.group_type,
            market_type: op.market_type,
            margin_percent: op.margin_percent,
            creation_height: height,
            contenders: op
                .contender_odds
                .iter()
                .map(|(id, odds)| {
                    (*id, ContenderInfo { input_odds: *odds, ..ContenderInfo::default() })
                })
                .collect(),
        };
        record.recalc_odds();
        record
    }

    pub fn set_input_odds(&mut self, updates: &BTreeMap<u32, u32>) {
        for (id, odds) in updates {
            self.contenders.entry(*id).or_default().input_odds = *odds;
        }
        self.recalc_odds();
    }

    pub fn set_modifiers(&mut self, updates: &BTreeMap<u32, u32>) {
        for (id, modifier) in updates {
            self.contenders.entry(*id).or_default().modifier = *modifier;
        }
        self.recalc_odds();
    }

    pub fn set_margin(&mut self, margin_percent: u32) {
        self.margin_percent = margin_percent;
        self.recalc_odds();
    }

    pub fn zero_odds(&mut self) {
        for contender in self.contenders.values_mut() {
            contender.input_odds = 0;
            contender.outright_odds = 0;
            contender.place_odds = 0;
            contender.show_odds = 0;
        }
    }

    /// Derive market odds from input odds, per-contender modifier and the
    /// event margin. Winnings are divided by the margin percent, so a
    /// margin of 100 leaves the input odds untouched.
    pub fn recalc_odds(&mut self) {
        let divisor = ODDS_DIVISOR as u64;
        let margin = self.margin_percent.max(100) as u64;
        let outright_only = self.market_type == field_market::OUTRIGHT_ONLY;
        for contender in self.contenders.values_mut() {
            if contender.input_odds <= ODDS_DIVISOR {
                contender.outright_odds = 0;
                contender.place_odds = 0;
                contender.show_odds = 0;
                continue;
            }
            let adjusted = contender.input_odds as u64 + contender.modifier as u64;
            let winnings = (adjusted - divisor) * 100 / margin;
            contender.outright_odds = (divisor + winnings) as u32;
            if outright_only {
                contender.place_odds = 0;
                contender.show_odds = 0;
            } else {
                contender.place_odds = (divisor + winnings / 2) as u32;
                contender.show_odds = (divisor + winnings / 3) as u32;
            }
        }
    }

    pub fn market_open(&self, outcome: FieldOutcome) -> bool {
        match outcome {
            FieldOutcome::Outright => true,
            FieldOutcome::Place | FieldOutcome::Show => {
                self.market_type == field_market::ALL_MARKETS
            }
        }
    }

    pub fn odds_for(&self, outcome: FieldOutcome, contender_id: u32) -> Option<u32> {
        self.contenders.get(&contender_id).map(|c| c.odds_for(outcome))
    }

    pub fn record_bet(&mut self, leg: &FieldBetOp, payout_coins: u64) {
        if let Some(contender) = self.contenders.get_mut(&leg.contender_id) {
            match leg.outcome {
                FieldOutcome::Outright => contender.outright.note(payout_coins),
                FieldOutcome::Place => contender.place.note(payout_coins),
                FieldOutcome::Show => contender.show.note(payout_coins),
            }
        }
    }

    pub fn record_parlay_leg(&mut self, leg: &FieldBetOp) {
        if let Some(contender) = self.contenders.get_mut(&leg.contender_id) {
            match leg.outcome {
                FieldOutcome::Outright => contender.outright.note_leg(),
                FieldOutcome::Place => contender.place.note_leg(),
                FieldOutcome::Show => contender.show.note_leg(),
            }
        }
    }
}

// ============================================================================
// RESULTS
// ============================================================================

#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct ResultRecord {
    pub event_id: u32,
    pub kind: ResultKind,
    pub home_score: u16,
    pub away_score: u16,
}

impl ResultRecord {
    pub fn from_op(op: &ResultOp) -> Self {
        Self {
            event_id: op.event_id,
            kind: op.kind,
            home_score: op.home_score,
            away_score: op.away_score,
        }
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct FieldResultRecord {
    pub event_id: u32,
    pub kind: ResultKind,
    pub contender_results: BTreeMap<u32, ContenderResult>,
}

impl FieldResultRecord {
    /// Contenders the oracle left out of the result are recorded as
    /// did-not-finish, so every contender in the event has a verdict.
    pub fn from_op(op: &FieldResultOp, event: &FieldEventRecord) -> Self {
        let contender_results = event
            .contenders
            .keys()
            .map(|id| {
                let result = op
                    .contender_results
                    .get(id)
                    .copied()
                    .unwrap_or(ContenderResult::DidNotFinish);
                (*id, result)
            })
            .collect();
        Self { event_id: op.event_id, kind: op.kind, contender_results }
    }
}

// ============================================================================
// BETS
// ============================================================================

/// Lifecycle classification of a settled bet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum BetStatus {
    Open,
    Won,
    Lost,
    Refunded,
    PartialPush,
}

/// Immutable snapshot of a head-to-head event's odds at bet placement.
/// Payout math reads this, never the live record.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct LockedOdds {
    pub start_time: u32,
    pub home_odds: u32,
    pub away_odds: u32,
    pub draw_odds: u32,
    pub spread_points: i16,
    pub spread_home_odds: u32,
    pub spread_away_odds: u32,
    pub total_points: u16,
    pub total_over_odds: u32,
    pub total_under_odds: u32,
}

impl LockedOdds {
    pub fn from_event(event: &EventRecord) -> Self {
        Self {
            start_time: event.start_time,
            home_odds: event.home_odds,
            away_odds: event.away_odds,
            draw_odds: event.draw_odds,
            spread_points: event.spread_points,
            spread_home_odds: event.spread_home_odds,
            spread_away_odds: event.spread_away_odds,
            total_points: event.total_points,
            total_over_odds: event.total_over_odds,
            total_under_odds: event.total_under_odds,
        }
    }

    pub fn odds_for(&self, outcome: MarketOutcome) -> u32 {
        match outcome {
            MarketOutcome::MoneyLineHome => self.home_odds,
            MarketOutcome::MoneyLineAway => self.away_odds,
            MarketOutcome::MoneyLineDraw => self.draw_odds,
            MarketOutcome::SpreadHome => self.spread_home_odds,
            MarketOutcome::SpreadAway => self.spread_away_odds,
            MarketOutcome::TotalOver => self.total_over_odds,
            MarketOutcome::TotalUnder => self.total_under_odds,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct BetLeg {
    pub event_id: u32,
    pub outcome: MarketOutcome,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct BetRecord {
    pub amount: Amount,
    pub address: String,
    pub placed_time: u32,
    pub legs: Vec<BetLeg>,
    /// One snapshot per leg, same order as `legs`.
    pub locked: Vec<LockedOdds>,
    pub completed: bool,
    pub status: BetStatus,
    pub payout: Amount,
    pub payout_height: u32,
}

impl BetRecord {
    pub fn new(
        amount: Amount,
        address: String,
        placed_time: u32,
        legs: Vec<BetLeg>,
        locked: Vec<LockedOdds>,
    ) -> Self {
        Self {
            amount,
            address,
            placed_time,
            legs,
            locked,
            completed: false,
            status: BetStatus::Open,
            payout: 0,
            payout_height: 0,
        }
    }

    pub fn is_parlay(&self) -> bool {
        self.legs.len() > 1
    }
}

/// Snapshot of a field event at bet placement: the margin and the market
/// odds of every contender.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct FieldLockedOdds {
    pub start_time: u32,
    pub margin_percent: u32,
    pub contender_odds: BTreeMap<u32, FieldContenderOdds>,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct FieldContenderOdds {
    pub outright: u32,
    pub place: u32,
    pub show: u32,
}

impl FieldLockedOdds {
    pub fn from_event(event: &FieldEventRecord) -> Self {
        Self {
            start_time: event.start_time,
            margin_percent: event.margin_percent,
            contender_odds: event
                .contenders
                .iter()
                .map(|(id, c)| {
                    (*id, FieldContenderOdds {
                        outright: c.outright_odds,
                        place: c.place_odds,
                        show: c.show_odds,
                    })
                })
                .collect(),
        }
    }

    pub fn odds_for(&self, outcome: FieldOutcome, contender_id: u32) -> u32 {
        let Some(odds) = self.contender_odds.get(&contender_id) else {
            return 0;
        };
        match outcome {
            FieldOutcome::Outright => odds.outright,
            FieldOutcome::Place => odds.place,
            FieldOutcome::Show => odds.show,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct FieldBetLeg {
    pub event_id: u32,
    pub outcome: FieldOutcome,
    pub contender_id: u32,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct FieldBetRecord {
    pub amount: Amount,
    pub address: String,
    pub placed_time: u32,
    pub legs: Vec<FieldBetLeg>,
    pub locked: Vec<FieldLockedOdds>,
    pub completed: bool,
    pub status: BetStatus,
    pub payout: Amount,
    pub payout_height: u32,
}

impl FieldBetRecord {
    pub fn new(
        amount: Amount,
        address: String,
        placed_time: u32,
        legs: Vec<FieldBetLeg>,
        locked: Vec<FieldLockedOdds>,
    ) -> Self {
        Self {
            amount,
            address,
            placed_time,
            legs,
            locked,
            completed: false,
            status: BetStatus::Open,
            payout: 0,
            payout_height: 0,
        }
    }
}

// ============================================================================
// CHAIN AND QUICK GAMES
// ============================================================================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct ChainGameEventRecord {
    pub event_id: u16,
    /// Entry fee in whole coins.
    pub entry_fee: u16,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct ChainGameBetRecord {
    pub event_id: u16,
    pub amount: Amount,
    pub address: String,
    pub placed_time: u32,
    pub completed: bool,
    pub status: BetStatus,
    pub payout: Amount,
    pub payout_height: u32,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct ChainGameResultRecord {
    pub event_id: u16,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct QuickGameBetRecord {
    pub game: QuickGameKind,
    pub bet_info: Vec<u8>,
    pub amount: Amount,
    pub address: String,
    pub placed_time: u32,
    pub completed: bool,
    pub status: BetStatus,
    pub payout: Amount,
    pub payout_height: u32,
}

// ============================================================================
// PAYOUT INDEX AND MAPPINGS
// ============================================================================

/// Classification of a payout-vector entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum PayoutKind {
    BetPayout,
    BetRefund,
    FieldPayout,
    FieldRefund,
    ChainGamePayout,
    QuickGamePayout,
    QuickGameRefund,
    Reward,
}

/// Written alongside a bet's completion; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PayoutIndexRecord {
    pub kind: PayoutKind,
    /// Back-reference to the bet that produced this payout; `None` for
    /// reward entries, which have no originating bet.
    pub bet_ref: Option<(super::TableId, Vec<u8>)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct MappingRecord {
    pub name: String,
}
