//! Wire codec for betting operations.
//!
//! Betting operations travel in data-carrier outputs as a 3-byte header
//! (marker, version, operation tag) followed by fixed-width little-endian
//! fields. Anything that does not parse as a supported operation is simply
//! "not a betting operation" -- an ordinary outcome, never an error, since
//! arbitrary applications share the same data-carrier space.
//!
//! The operation set is closed: every variant lives in [`BettingOp`] and is
//! matched exhaustively by the validator, applier and resolver.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::protocol::{OutputScript, TxOut};

/// Marker byte identifying a betting payload.
pub const OP_MARKER: u8 = b'B';

/// Supported wire versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CodecVersion {
    V4 = 0x01,
    V5 = 0x02,
}

impl CodecVersion {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(CodecVersion::V4),
            0x02 => Some(CodecVersion::V5),
            _ => None,
        }
    }
}

// ============================================================================
// OPERATION TAGS
// ============================================================================

pub mod tag {
    pub const MAPPING: u8 = 0x01;
    pub const EVENT: u8 = 0x02;
    pub const BET: u8 = 0x03;
    pub const RESULT: u8 = 0x04;
    pub const UPDATE_ODDS: u8 = 0x05;
    pub const CHAIN_GAME_EVENT: u8 = 0x06;
    pub const CHAIN_GAME_BET: u8 = 0x07;
    pub const CHAIN_GAME_RESULT: u8 = 0x08;
    pub const SPREADS_MARKET: u8 = 0x09;
    pub const TOTALS_MARKET: u8 = 0x0a;
    pub const EVENT_PATCH: u8 = 0x0b;
    pub const PARLAY_BET: u8 = 0x0c;
    pub const QUICK_GAME_BET: u8 = 0x0d;
    pub const ZEROING_ODDS: u8 = 0x0e;
    pub const FIELD_EVENT: u8 = 0x0f;
    pub const FIELD_UPDATE_ODDS: u8 = 0x10;
    pub const FIELD_ZEROING_ODDS: u8 = 0x11;
    pub const FIELD_RESULT: u8 = 0x12;
    pub const FIELD_BET: u8 = 0x13;
    pub const FIELD_PARLAY_BET: u8 = 0x14;
    pub const FIELD_UPDATE_MARGIN: u8 = 0x15;
    pub const FIELD_UPDATE_MODIFIERS: u8 = 0x16;
}

// ============================================================================
// DOMAIN ENUMS
// ============================================================================

/// Identifier-mapping namespaces.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum MappingKind {
    Sport,
    Round,
    Team,
    Tournament,
    IndividualSport,
    Contender,
}

impl MappingKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(MappingKind::Sport),
            0x02 => Some(MappingKind::Round),
            0x03 => Some(MappingKind::Team),
            0x04 => Some(MappingKind::Tournament),
            0x05 => Some(MappingKind::IndividualSport),
            0x06 => Some(MappingKind::Contender),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            MappingKind::Sport => 0x01,
            MappingKind::Round => 0x02,
            MappingKind::Team => 0x03,
            MappingKind::Tournament => 0x04,
            MappingKind::IndividualSport => 0x05,
            MappingKind::Contender => 0x06,
        }
    }

    /// Team and contender namespaces outgrew 16 bits; their ids are 4 bytes
    /// on the wire, every other namespace stays at 2.
    pub fn wide_id(self) -> bool {
        matches!(self, MappingKind::Team | MappingKind::Contender)
    }
}

/// Head-to-head market outcomes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum MarketOutcome {
    MoneyLineHome,
    MoneyLineAway,
    MoneyLineDraw,
    SpreadHome,
    SpreadAway,
    TotalOver,
    TotalUnder,
}

impl MarketOutcome {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(MarketOutcome::MoneyLineHome),
            0x02 => Some(MarketOutcome::MoneyLineAway),
            0x03 => Some(MarketOutcome::MoneyLineDraw),
            0x04 => Some(MarketOutcome::SpreadHome),
            0x05 => Some(MarketOutcome::SpreadAway),
            0x06 => Some(MarketOutcome::TotalOver),
            0x07 => Some(MarketOutcome::TotalUnder),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            MarketOutcome::MoneyLineHome => 0x01,
            MarketOutcome::MoneyLineAway => 0x02,
            MarketOutcome::MoneyLineDraw => 0x03,
            MarketOutcome::SpreadHome => 0x04,
            MarketOutcome::SpreadAway => 0x05,
            MarketOutcome::TotalOver => 0x06,
            MarketOutcome::TotalUnder => 0x07,
        }
    }
}

/// Multi-contender ("field") market outcomes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum FieldOutcome {
    Outright,
    Place,
    Show,
}

impl FieldOutcome {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(FieldOutcome::Outright),
            0x02 => Some(FieldOutcome::Place),
            0x03 => Some(FieldOutcome::Show),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            FieldOutcome::Outright => 0x01,
            FieldOutcome::Place => 0x02,
            FieldOutcome::Show => 0x03,
        }
    }
}

/// Result classifications published by the oracle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum ResultKind {
    /// Scores decide every market.
    Standard,
    /// Every bet on the event is refunded.
    EventRefund,
    /// Moneyline bets refund, spread/total markets settle on scores.
    MoneyLineRefund,
    /// The event never concluded; refund-only closure.
    EventClosed,
}

impl ResultKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(ResultKind::Standard),
            0x02 => Some(ResultKind::EventRefund),
            0x03 => Some(ResultKind::MoneyLineRefund),
            0x04 => Some(ResultKind::EventClosed),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            ResultKind::Standard => 0x01,
            ResultKind::EventRefund => 0x02,
            ResultKind::MoneyLineRefund => 0x03,
            ResultKind::EventClosed => 0x04,
        }
    }
}

/// Per-contender finishing classification in a field result.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum ContenderResult {
    Place1,
    Place2,
    Place3,
    DidNotFinish,
    DidNotRace,
}

impl ContenderResult {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(ContenderResult::Place1),
            0x02 => Some(ContenderResult::Place2),
            0x03 => Some(ContenderResult::Place3),
            0x04 => Some(ContenderResult::DidNotFinish),
            0x05 => Some(ContenderResult::DidNotRace),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            ContenderResult::Place1 => 0x01,
            ContenderResult::Place2 => 0x02,
            ContenderResult::Place3 => 0x03,
            ContenderResult::DidNotFinish => 0x04,
            ContenderResult::DidNotRace => 0x05,
        }
    }
}

/// Quick-game discriminator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum QuickGameKind {
    Dice,
}

impl QuickGameKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(QuickGameKind::Dice),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            QuickGameKind::Dice => 0x00,
        }
    }
}

/// Field event grouping, constrains which sports it models.
pub mod field_group {
    pub const OTHER: u8 = 0x01;
    pub const ATHLETICS: u8 = 0x02;
    pub const ANIMAL_RACING: u8 = 0x03;

    pub fn valid(b: u8) -> bool {
        (OTHER..=ANIMAL_RACING).contains(&b)
    }
}

/// Which field markets accept bets.
pub mod field_market {
    pub const ALL_MARKETS: u8 = 0x01;
    pub const OUTRIGHT_ONLY: u8 = 0x02;

    pub fn valid(b: u8) -> bool {
        (ALL_MARKETS..=OUTRIGHT_ONLY).contains(&b)
    }
}

// ============================================================================
// OPERATION VARIANTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingOp {
    pub kind: MappingKind,
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOp {
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
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetOp {
    pub event_id: u32,
    pub outcome: MarketOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultOp {
    pub event_id: u32,
    pub kind: ResultKind,
    pub home_score: u16,
    pub away_score: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOddsOp {
    pub event_id: u32,
    pub home_odds: u32,
    pub away_odds: u32,
    pub draw_odds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsMarketOp {
    pub event_id: u32,
    pub points: i16,
    pub home_odds: u32,
    pub away_odds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalsMarketOp {
    pub event_id: u32,
    pub points: u16,
    pub over_odds: u32,
    pub under_odds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPatchOp {
    pub event_id: u32,
    pub start_time: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParlayBetOp {
    pub legs: Vec<BetOp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZeroingOddsOp {
    pub event_ids: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainGameEventOp {
    pub event_id: u16,
    pub entry_fee: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainGameBetOp {
    pub event_id: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainGameResultOp {
    pub event_id: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickGameBetOp {
    pub game: QuickGameKind,
    /// Free-form payload interpreted by the game's handler.
    pub bet_info: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEventOp {
    pub event_id: u32,
    pub start_time: u32,
    pub sport: u16,
    pub tournament: u16,
    pub stage: u16,
    pub group_type: u8,
    pub market_type: u8,
    pub margin_percent: u32,
    /// contender id -> oracle input odds
    pub contender_odds: BTreeMap<u32, u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldUpdateOddsOp {
    pub event_id: u32,
    pub contender_odds: BTreeMap<u32, u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldUpdateModifiersOp {
    pub event_id: u32,
    pub contender_modifiers: BTreeMap<u32, u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldUpdateMarginOp {
    pub event_id: u32,
    pub margin_percent: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldZeroingOddsOp {
    pub event_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldResultOp {
    pub event_id: u32,
    pub kind: ResultKind,
    pub contender_results: BTreeMap<u32, ContenderResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldBetOp {
    pub event_id: u32,
    pub outcome: FieldOutcome,
    pub contender_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldParlayBetOp {
    pub legs: Vec<FieldBetOp>,
}

/// The closed set of betting operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BettingOp {
    Mapping(MappingOp),
    Event(EventOp),
    Bet(BetOp),
    Result(ResultOp),
    UpdateOdds(UpdateOddsOp),
    SpreadsMarket(SpreadsMarketOp),
    TotalsMarket(TotalsMarketOp),
    EventPatch(EventPatchOp),
    ParlayBet(ParlayBetOp),
    ZeroingOdds(ZeroingOddsOp),
    ChainGameEvent(ChainGameEventOp),
    ChainGameBet(ChainGameBetOp),
    ChainGameResult(ChainGameResultOp),
    QuickGameBet(QuickGameBetOp),
    FieldEvent(FieldEventOp),
    FieldUpdateOdds(FieldUpdateOddsOp),
    FieldUpdateModifiers(FieldUpdateModifiersOp),
    FieldUpdateMargin(FieldUpdateMarginOp),
    FieldZeroingOdds(FieldZeroingOddsOp),
    FieldResult(FieldResultOp),
    FieldBet(FieldBetOp),
    FieldParlayBet(FieldParlayBetOp),
}

impl BettingOp {
    pub fn tag(&self) -> u8 {
        match self {
            BettingOp::Mapping(_) => tag::MAPPING,
            BettingOp::Event(_) => tag::EVENT,
            BettingOp::Bet(_) => tag::BET,
            BettingOp::Result(_) => tag::RESULT,
            BettingOp::UpdateOdds(_) => tag::UPDATE_ODDS,
            BettingOp::SpreadsMarket(_) => tag::SPREADS_MARKET,
            BettingOp::TotalsMarket(_) => tag::TOTALS_MARKET,
            BettingOp::EventPatch(_) => tag::EVENT_PATCH,
            BettingOp::ParlayBet(_) => tag::PARLAY_BET,
            BettingOp::ZeroingOdds(_) => tag::ZEROING_ODDS,
            BettingOp::ChainGameEvent(_) => tag::CHAIN_GAME_EVENT,
            BettingOp::ChainGameBet(_) => tag::CHAIN_GAME_BET,
            BettingOp::ChainGameResult(_) => tag::CHAIN_GAME_RESULT,
            BettingOp::QuickGameBet(_) => tag::QUICK_GAME_BET,
            BettingOp::FieldEvent(_) => tag::FIELD_EVENT,
            BettingOp::FieldUpdateOdds(_) => tag::FIELD_UPDATE_ODDS,
            BettingOp::FieldUpdateModifiers(_) => tag::FIELD_UPDATE_MODIFIERS,
            BettingOp::FieldUpdateMargin(_) => tag::FIELD_UPDATE_MARGIN,
            BettingOp::FieldZeroingOdds(_) => tag::FIELD_ZEROING_ODDS,
            BettingOp::FieldResult(_) => tag::FIELD_RESULT,
            BettingOp::FieldBet(_) => tag::FIELD_BET,
            BettingOp::FieldParlayBet(_) => tag::FIELD_PARLAY_BET,
        }
    }

    /// Operations only the oracle authority may publish.
    pub fn is_oracle_op(&self) -> bool {
        !self.is_player_op()
    }

    /// Operations any player may publish (the bet family).
    pub fn is_player_op(&self) -> bool {
        matches!(
            self,
            BettingOp::Bet(_)
                | BettingOp::ParlayBet(_)
                | BettingOp::ChainGameBet(_)
                | BettingOp::QuickGameBet(_)
                | BettingOp::FieldBet(_)
                | BettingOp::FieldParlayBet(_)
        )
    }
}

// ============================================================================
// BYTE CURSORS
// ============================================================================

/// Little-endian reader over a payload slice. Every accessor returns `None`
/// past the end; decoders bubble that up as "not a betting operation".
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Some(out)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Option<u32> {
        self.take(4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i16(&mut self) -> Option<i16> {
        self.take(2).map(|b| i16::from_le_bytes([b[0], b[1]]))
    }

    /// Compact-size collection count (Bitcoin-style varint).
    fn compact_size(&mut self) -> Option<u64> {
        match self.u8()? {
            n @ 0..=0xfc => Some(n as u64),
            0xfd => self.u16().map(u64::from),
            0xfe => self.u32().map(u64::from),
            0xff => {
                let b = self.take(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(b);
                Some(u64::from_le_bytes(raw))
            }
        }
    }

    /// Consume everything that is left.
    fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }
}

/// Little-endian writer mirroring [`Reader`].
#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn compact_size(&mut self, v: u64) {
        match v {
            0..=0xfc => self.u8(v as u8),
            0xfd..=0xffff => {
                self.u8(0xfd);
                self.u16(v as u16);
            }
            0x1_0000..=0xffff_ffff => {
                self.u8(0xfe);
                self.u32(v as u32);
            }
            _ => {
                self.u8(0xff);
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
        }
    }

    fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// Decode the betting operation carried by an output, if any.
///
/// Returns `None` for spendable outputs, short payloads, foreign markers,
/// unsupported versions, unknown tags and structurally short fields. None of
/// these are errors: the transaction may still be perfectly valid for
/// unrelated reasons.
pub fn decode_betting_op(output: &TxOut) -> Option<BettingOp> {
    let payload = match &output.script {
        OutputScript::DataCarrier(payload) => payload.as_slice(),
        OutputScript::PayToAddress(_) => return None,
    };
    decode_payload(payload)
}

/// Decode a raw betting payload (header included). Exposed separately
/// because token-funded bet mints carry the same payload inside token
/// subgroup data rather than in an output script.
pub fn decode_payload(payload: &[u8]) -> Option<BettingOp> {
    let mut r = Reader::new(payload);
    if r.u8()? != OP_MARKER {
        return None;
    }
    CodecVersion::from_byte(r.u8()?)?;
    let op_tag = r.u8()?;
    decode_body(op_tag, &mut r)
}

fn decode_body(op_tag: u8, r: &mut Reader<'_>) -> Option<BettingOp> {
    let op = match op_tag {
        tag::MAPPING => {
            let kind = MappingKind::from_byte(r.u8()?)?;
            // Width of the id depends on the namespace read just above;
            // the name is whatever bytes remain.
            let id = if kind.wide_id() { r.u32()? } else { r.u16()? as u32 };
            let name = String::from_utf8(r.rest().to_vec()).ok()?;
            BettingOp::Mapping(MappingOp { kind, id, name })
        }
        tag::EVENT => BettingOp::Event(EventOp {
            event_id: r.u32()?,
            start_time: r.u32()?,
            sport: r.u16()?,
            tournament: r.u16()?,
            stage: r.u16()?,
            home_team: r.u32()?,
            away_team: r.u32()?,
            home_odds: r.u32()?,
            away_odds: r.u32()?,
            draw_odds: r.u32()?,
        }),
        tag::BET => BettingOp::Bet(decode_bet_leg(r)?),
        tag::RESULT => BettingOp::Result(ResultOp {
            event_id: r.u32()?,
            kind: ResultKind::from_byte(r.u8()?)?,
            home_score: r.u16()?,
            away_score: r.u16()?,
        }),
        tag::UPDATE_ODDS => BettingOp::UpdateOdds(UpdateOddsOp {
            event_id: r.u32()?,
            home_odds: r.u32()?,
            away_odds: r.u32()?,
            draw_odds: r.u32()?,
        }),
        tag::SPREADS_MARKET => BettingOp::SpreadsMarket(SpreadsMarketOp {
            event_id: r.u32()?,
            points: r.i16()?,
            home_odds: r.u32()?,
            away_odds: r.u32()?,
        }),
        tag::TOTALS_MARKET => BettingOp::TotalsMarket(TotalsMarketOp {
            event_id: r.u32()?,
            points: r.u16()?,
            over_odds: r.u32()?,
            under_odds: r.u32()?,
        }),
        tag::EVENT_PATCH => BettingOp::EventPatch(EventPatchOp {
            event_id: r.u32()?,
            start_time: r.u32()?,
        }),
        tag::PARLAY_BET => {
            let count = r.compact_size()?;
            let mut legs = Vec::new();
            for _ in 0..count {
                legs.push(decode_bet_leg(r)?);
            }
            BettingOp::ParlayBet(ParlayBetOp { legs })
        }
        tag::ZEROING_ODDS => {
            let count = r.compact_size()?;
            let mut event_ids = Vec::new();
            for _ in 0..count {
                event_ids.push(r.u32()?);
            }
            BettingOp::ZeroingOdds(ZeroingOddsOp { event_ids })
        }
        tag::CHAIN_GAME_EVENT => BettingOp::ChainGameEvent(ChainGameEventOp {
            event_id: r.u16()?,
            entry_fee: r.u16()?,
        }),
        tag::CHAIN_GAME_BET => {
            BettingOp::ChainGameBet(ChainGameBetOp { event_id: r.u16()? })
        }
        tag::CHAIN_GAME_RESULT => {
            BettingOp::ChainGameResult(ChainGameResultOp { event_id: r.u16()? })
        }
        tag::QUICK_GAME_BET => {
            let game = QuickGameKind::from_byte(r.u8()?)?;
            let len = r.compact_size()?;
            let bet_info = r.take(usize::try_from(len).ok()?)?.to_vec();
            BettingOp::QuickGameBet(QuickGameBetOp { game, bet_info })
        }
        tag::FIELD_EVENT => BettingOp::FieldEvent(FieldEventOp {
            event_id: r.u32()?,
            start_time: r.u32()?,
            sport: r.u16()?,
            tournament: r.u16()?,
            stage: r.u16()?,
            group_type: r.u8()?,
            market_type: r.u8()?,
            margin_percent: r.u32()?,
            contender_odds: decode_u32_map(r)?,
        }),
        tag::FIELD_UPDATE_ODDS => BettingOp::FieldUpdateOdds(FieldUpdateOddsOp {
            event_id: r.u32()?,
            contender_odds: decode_u32_map(r)?,
        }),
        tag::FIELD_UPDATE_MODIFIERS => {
            BettingOp::FieldUpdateModifiers(FieldUpdateModifiersOp {
                event_id: r.u32()?,
                contender_modifiers: decode_u32_map(r)?,
            })
        }
        tag::FIELD_UPDATE_MARGIN => BettingOp::FieldUpdateMargin(FieldUpdateMarginOp {
            event_id: r.u32()?,
            margin_percent: r.u32()?,
        }),
        tag::FIELD_ZEROING_ODDS => {
            BettingOp::FieldZeroingOdds(FieldZeroingOddsOp { event_id: r.u32()? })
        }
        tag::FIELD_RESULT => {
            let event_id = r.u32()?;
            let kind = ResultKind::from_byte(r.u8()?)?;
            let count = r.compact_size()?;
            let mut contender_results = BTreeMap::new();
            for _ in 0..count {
                let contender = r.u32()?;
                let result = ContenderResult::from_byte(r.u8()?)?;
                contender_results.insert(contender, result);
            }
            BettingOp::FieldResult(FieldResultOp { event_id, kind, contender_results })
        }
        tag::FIELD_BET => BettingOp::FieldBet(decode_field_bet_leg(r)?),
        tag::FIELD_PARLAY_BET => {
            let count = r.compact_size()?;
            let mut legs = Vec::new();
            for _ in 0..count {
                legs.push(decode_field_bet_leg(r)?);
            }
            BettingOp::FieldParlayBet(FieldParlayBetOp { legs })
        }
        _ => return None,
    };
    Some(op)
}

fn decode_bet_leg(r: &mut Reader<'_>) -> Option<BetOp> {
    Some(BetOp {
        event_id: r.u32()?,
        outcome: MarketOutcome::from_byte(r.u8()?)?,
    })
}

fn decode_field_bet_leg(r: &mut Reader<'_>) -> Option<FieldBetOp> {
    Some(FieldBetOp {
        event_id: r.u32()?,
        outcome: FieldOutcome::from_byte(r.u8()?)?,
        contender_id: r.u32()?,
    })
}

fn decode_u32_map(r: &mut Reader<'_>) -> Option<BTreeMap<u32, u32>> {
    let count = r.compact_size()?;
    let mut map = BTreeMap::new();
    for _ in 0..count {
        let key = r.u32()?;
        let value = r.u32()?;
        map.insert(key, value);
    }
    Some(map)
}

// ============================================================================
// ENCODING
// ============================================================================

/// Encode an operation into its wire payload for the given version.
///
/// Field layouts are shared by both supported versions; the version byte in
/// the header is the only difference. `decode_payload(encode_betting_op(op,
/// v)) == Some(op)` for every operation and both versions.
pub fn encode_betting_op(op: &BettingOp, version: CodecVersion) -> Vec<u8> {
    let mut w = Writer::default();
    w.u8(OP_MARKER);
    w.u8(version as u8);
    w.u8(op.tag());
    encode_body(op, &mut w);
    w.buf
}

fn encode_body(op: &BettingOp, w: &mut Writer) {
    match op {
        BettingOp::Mapping(m) => {
            w.u8(m.kind.to_byte());
            if m.kind.wide_id() {
                w.u32(m.id);
            } else {
                w.u16(m.id as u16);
            }
            w.bytes(m.name.as_bytes());
        }
        BettingOp::Event(e) => {
            w.u32(e.event_id);
            w.u32(e.start_time);
            w.u16(e.sport);
            w.u16(e.tournament);
            w.u16(e.stage);
            w.u32(e.home_team);
            w.u32(e.away_team);
            w.u32(e.home_odds);
            w.u32(e.away_odds);
            w.u32(e.draw_odds);
        }
        BettingOp::Bet(b) => encode_bet_leg(b, w),
        BettingOp::Result(res) => {
            w.u32(res.event_id);
            w.u8(res.kind.to_byte());
            w.u16(res.home_score);
            w.u16(res.away_score);
        }
        BettingOp::UpdateOdds(u) => {
            w.u32(u.event_id);
            w.u32(u.home_odds);
            w.u32(u.away_odds);
            w.u32(u.draw_odds);
        }
        BettingOp::SpreadsMarket(s) => {
            w.u32(s.event_id);
            w.i16(s.points);
            w.u32(s.home_odds);
            w.u32(s.away_odds);
        }
        BettingOp::TotalsMarket(t) => {
            w.u32(t.event_id);
            w.u16(t.points);
            w.u32(t.over_odds);
            w.u32(t.under_odds);
        }
        BettingOp::EventPatch(p) => {
            w.u32(p.event_id);
            w.u32(p.start_time);
        }
        BettingOp::ParlayBet(p) => {
            w.compact_size(p.legs.len() as u64);
            for leg in &p.legs {
                encode_bet_leg(leg, w);
            }
        }
        BettingOp::ZeroingOdds(z) => {
            w.compact_size(z.event_ids.len() as u64);
            for id in &z.event_ids {
                w.u32(*id);
            }
        }
        BettingOp::ChainGameEvent(e) => {
            w.u16(e.event_id);
            w.u16(e.entry_fee);
        }
        BettingOp::ChainGameBet(b) => w.u16(b.event_id),
        BettingOp::ChainGameResult(res) => w.u16(res.event_id),
        BettingOp::QuickGameBet(q) => {
            w.u8(q.game.to_byte());
            w.compact_size(q.bet_info.len() as u64);
            w.bytes(&q.bet_info);
        }
        BettingOp::FieldEvent(e) => {
            w.u32(e.event_id);
            w.u32(e.start_time);
            w.u16(e.sport);
            w.u16(e.tournament);
            w.u16(e.stage);
            w.u8(e.group_type);
            w.u8(e.market_type);
            w.u32(e.margin_percent);
            encode_u32_map(&e.contender_odds, w);
        }
        BettingOp::FieldUpdateOdds(u) => {
            w.u32(u.event_id);
            encode_u32_map(&u.contender_odds, w);
        }
        BettingOp::FieldUpdateModifiers(u) => {
            w.u32(u.event_id);
            encode_u32_map(&u.contender_modifiers, w);
        }
        BettingOp::FieldUpdateMargin(u) => {
            w.u32(u.event_id);
            w.u32(u.margin_percent);
        }
        BettingOp::FieldZeroingOdds(z) => w.u32(z.event_id),
        BettingOp::FieldResult(res) => {
            w.u32(res.event_id);
            w.u8(res.kind.to_byte());
            w.compact_size(res.contender_results.len() as u64);
            for (contender, result) in &res.contender_results {
                w.u32(*contender);
                w.u8(result.to_byte());
            }
        }
        BettingOp::FieldBet(b) => encode_field_bet_leg(b, w),
        BettingOp::FieldParlayBet(p) => {
            w.compact_size(p.legs.len() as u64);
            for leg in &p.legs {
                encode_field_bet_leg(leg, w);
            }
        }
    }
}

fn encode_bet_leg(leg: &BetOp, w: &mut Writer) {
    w.u32(leg.event_id);
    w.u8(leg.outcome.to_byte());
}

fn encode_field_bet_leg(leg: &FieldBetOp, w: &mut Writer) {
    w.u32(leg.event_id);
    w.u8(leg.outcome.to_byte());
    w.u32(leg.contender_id);
}

fn encode_u32_map(map: &BTreeMap<u32, u32>, w: &mut Writer) {
    w.compact_size(map.len() as u64);
    for (key, value) in map {
        w.u32(*key);
        w.u32(*value);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TxOut;

    fn sample_ops() -> Vec<BettingOp> {
        vec![
            BettingOp::Mapping(MappingOp {
                kind: MappingKind::Sport,
                id: 9,
                name: "Football".into(),
            }),
            BettingOp::Mapping(MappingOp {
                kind: MappingKind::Team,
                id: 0x0102_0304,
                name: "FC Ajax".into(),
            }),
            BettingOp::Event(EventOp {
                event_id: 1001,
                start_time: 1_700_000_000,
                sport: 9,
                tournament: 3,
                stage: 0,
                home_team: 41,
                away_team: 42,
                home_odds: 15_000,
                away_odds: 28_000,
                draw_odds: 31_000,
            }),
            BettingOp::Bet(BetOp { event_id: 1001, outcome: MarketOutcome::MoneyLineHome }),
            BettingOp::Result(ResultOp {
                event_id: 1001,
                kind: ResultKind::Standard,
                home_score: 2,
                away_score: 1,
            }),
            BettingOp::UpdateOdds(UpdateOddsOp {
                event_id: 1001,
                home_odds: 14_000,
                away_odds: 29_500,
                draw_odds: 31_000,
            }),
            BettingOp::SpreadsMarket(SpreadsMarketOp {
                event_id: 1001,
                points: -15,
                home_odds: 19_000,
                away_odds: 19_000,
            }),
            BettingOp::TotalsMarket(TotalsMarketOp {
                event_id: 1001,
                points: 25,
                over_odds: 18_500,
                under_odds: 19_500,
            }),
            BettingOp::EventPatch(EventPatchOp { event_id: 1001, start_time: 1_700_003_600 }),
            BettingOp::ParlayBet(ParlayBetOp {
                legs: vec![
                    BetOp { event_id: 1001, outcome: MarketOutcome::MoneyLineHome },
                    BetOp { event_id: 1002, outcome: MarketOutcome::TotalOver },
                ],
            }),
            BettingOp::ZeroingOdds(ZeroingOddsOp { event_ids: vec![1001, 1002, 1003] }),
            BettingOp::ChainGameEvent(ChainGameEventOp { event_id: 7, entry_fee: 25 }),
            BettingOp::ChainGameBet(ChainGameBetOp { event_id: 7 }),
            BettingOp::ChainGameResult(ChainGameResultOp { event_id: 7 }),
            BettingOp::QuickGameBet(QuickGameBetOp {
                game: QuickGameKind::Dice,
                bet_info: vec![0x00, 0x07, 0x00, 0x00, 0x00],
            }),
            BettingOp::FieldEvent(FieldEventOp {
                event_id: 5001,
                start_time: 1_700_100_000,
                sport: 12,
                tournament: 4,
                stage: 0,
                group_type: field_group::ANIMAL_RACING,
                market_type: field_market::ALL_MARKETS,
                margin_percent: 110,
                contender_odds: [(301, 40_000), (302, 65_000)].into_iter().collect(),
            }),
            BettingOp::FieldUpdateOdds(FieldUpdateOddsOp {
                event_id: 5001,
                contender_odds: [(301, 38_000)].into_iter().collect(),
            }),
            BettingOp::FieldUpdateModifiers(FieldUpdateModifiersOp {
                event_id: 5001,
                contender_modifiers: [(301, 15)].into_iter().collect(),
            }),
            BettingOp::FieldUpdateMargin(FieldUpdateMarginOp {
                event_id: 5001,
                margin_percent: 118,
            }),
            BettingOp::FieldZeroingOdds(FieldZeroingOddsOp { event_id: 5001 }),
            BettingOp::FieldResult(FieldResultOp {
                event_id: 5001,
                kind: ResultKind::Standard,
                contender_results: [
                    (301, ContenderResult::Place1),
                    (302, ContenderResult::DidNotFinish),
                ]
                .into_iter()
                .collect(),
            }),
            BettingOp::FieldBet(FieldBetOp {
                event_id: 5001,
                outcome: FieldOutcome::Outright,
                contender_id: 301,
            }),
            BettingOp::FieldParlayBet(FieldParlayBetOp {
                legs: vec![
                    FieldBetOp { event_id: 5001, outcome: FieldOutcome::Place, contender_id: 301 },
                    FieldBetOp { event_id: 5002, outcome: FieldOutcome::Show, contender_id: 404 },
                ],
            }),
        ]
    }

    #[test]
    fn roundtrip_every_variant_both_versions() {
        for op in sample_ops() {
            for version in [CodecVersion::V4, CodecVersion::V5] {
                let payload = encode_betting_op(&op, version);
                let decoded = decode_payload(&payload);
                assert_eq!(decoded.as_ref(), Some(&op), "version {version:?}");
            }
        }
    }

    #[test]
    fn spendable_output_is_not_an_operation() {
        let out = TxOut::pay(25 * crate::protocol::COIN, "player");
        assert_eq!(decode_betting_op(&out), None);
    }

    #[test]
    fn wrong_marker_and_version_rejected() {
        let op = BettingOp::Bet(BetOp { event_id: 1, outcome: MarketOutcome::MoneyLineAway });
        let good = encode_betting_op(&op, CodecVersion::V4);

        let mut bad_marker = good.clone();
        bad_marker[0] = b'X';
        assert_eq!(decode_payload(&bad_marker), None);

        let mut bad_version = good.clone();
        bad_version[1] = 0x09;
        assert_eq!(decode_payload(&bad_version), None);

        let mut bad_tag = good;
        bad_tag[2] = 0xee;
        assert_eq!(decode_payload(&bad_tag), None);
    }

    #[test]
    fn short_payloads_rejected() {
        let op = BettingOp::Event(EventOp {
            event_id: 1,
            start_time: 2,
            sport: 3,
            tournament: 4,
            stage: 5,
            home_team: 6,
            away_team: 7,
            home_odds: 8,
            away_odds: 9,
            draw_odds: 10,
        });
        let full = encode_betting_op(&op, CodecVersion::V4);
        for cut in [0, 1, 2, 3, full.len() - 1] {
            assert_eq!(decode_payload(&full[..cut]), None, "truncated at {cut}");
        }
    }

    #[test]
    fn mapping_id_width_follows_namespace() {
        // Narrow namespace: 2-byte id.
        let narrow = encode_betting_op(
            &BettingOp::Mapping(MappingOp {
                kind: MappingKind::Tournament,
                id: 0x0201,
                name: "Cup".into(),
            }),
            CodecVersion::V4,
        );
        // header(3) + kind(1) + id(2) + name(3)
        assert_eq!(narrow.len(), 9);
        assert_eq!(&narrow[4..6], &[0x01, 0x02]);

        // Wide namespace: 4-byte id.
        let wide = encode_betting_op(
            &BettingOp::Mapping(MappingOp {
                kind: MappingKind::Contender,
                id: 0x0403_0201,
                name: "Cup".into(),
            }),
            CodecVersion::V4,
        );
        assert_eq!(wide.len(), 11);
        assert_eq!(&wide[4..8], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn parlay_leg_count_is_compact_size() {
        let op = BettingOp::ParlayBet(ParlayBetOp {
            legs: vec![BetOp { event_id: 3, outcome: MarketOutcome::MoneyLineDraw }; 3],
        });
        let payload = encode_betting_op(&op, CodecVersion::V5);
        assert_eq!(payload[3], 3, "single-byte compact size for small counts");
    }
}
