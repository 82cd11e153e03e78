//! Read-only reporting queries.
//!
//! External clients of the store: RPC handlers and monitoring tooling call
//! these to display events, liabilities and settled payouts. Nothing here
//! participates in consensus, and nothing mutates.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::protocol::Amount;
use crate::store::records::{
    BetRecord, EventRecord, FieldBetRecord, FieldEventRecord, MappingRecord,
    PayoutIndexRecord, ResultRecord,
};
use crate::store::{keys, BettingStore, TableId};
use crate::codec::MappingKind;
use crate::LedgerError;

/// Human-facing event summary with aggregate liability.
#[derive(Debug, Clone, Serialize)]
pub struct EventOverview {
    pub event_id: u32,
    pub start_time: u32,
    pub start_time_utc: String,
    pub resulted: bool,
    pub total_bets: u32,
    /// Worst-case payout exposure across all outcomes, in whole coins.
    pub max_liability: u64,
}

fn format_start_time(start_time: u32) -> String {
    DateTime::<Utc>::from_timestamp(start_time as i64, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

pub fn event(store: &BettingStore, event_id: u32) -> Result<Option<EventRecord>, LedgerError> {
    store.get(TableId::Events, &keys::event(event_id))
}

pub fn field_event(
    store: &BettingStore,
    event_id: u32,
) -> Result<Option<FieldEventRecord>, LedgerError> {
    store.get(TableId::FieldEvents, &keys::event(event_id))
}

pub fn event_result(
    store: &BettingStore,
    event_id: u32,
) -> Result<Option<ResultRecord>, LedgerError> {
    store.get(TableId::Results, &keys::event(event_id))
}

/// All head-to-head events in ascending id order.
pub fn list_events(store: &BettingStore) -> Result<Vec<EventRecord>, LedgerError> {
    Ok(store
        .scan_prefix::<EventRecord>(TableId::Events, &[])?
        .into_iter()
        .map(|(_, record)| record)
        .collect())
}

/// Aggregate overview of one event for dashboards.
pub fn event_overview(
    store: &BettingStore,
    event_id: u32,
) -> Result<Option<EventOverview>, LedgerError> {
    let Some(record) = event(store, event_id)? else {
        return Ok(None);
    };
    let resulted = store.exists(TableId::Results, &keys::event(event_id))?;
    let tallies = [
        record.ml_home,
        record.ml_away,
        record.ml_draw,
        record.spread_home,
        record.spread_away,
        record.total_over,
        record.total_under,
    ];
    Ok(Some(EventOverview {
        event_id: record.event_id,
        start_time: record.start_time,
        start_time_utc: format_start_time(record.start_time),
        resulted,
        total_bets: tallies.iter().map(|t| t.bets).sum(),
        max_liability: tallies.iter().map(|t| t.liability).max().unwrap_or(0),
    }))
}

/// Bets recorded at exactly `height`, with their store keys.
pub fn bets_at_height(
    store: &BettingStore,
    height: u32,
) -> Result<Vec<(Vec<u8>, BetRecord)>, LedgerError> {
    store.scan_prefix(TableId::Bets, &keys::height_prefix(height))
}

/// Field bets recorded at exactly `height`.
pub fn field_bets_at_height(
    store: &BettingStore,
    height: u32,
) -> Result<Vec<(Vec<u8>, FieldBetRecord)>, LedgerError> {
    store.scan_prefix(TableId::FieldBets, &keys::height_prefix(height))
}

/// Payout-index rows from `from_height` onward: every settled payout with
/// its classification, ascending by (height, outpoint).
pub fn payouts_since(
    store: &BettingStore,
    from_height: u32,
) -> Result<Vec<(u32, PayoutIndexRecord)>, LedgerError> {
    let all: Vec<(Vec<u8>, PayoutIndexRecord)> =
        store.scan_prefix(TableId::PayoutIndex, &[])?;
    Ok(all
        .into_iter()
        .filter_map(|(key, record)| {
            let height = u32::from_be_bytes([key[0], key[1], key[2], key[3]]);
            (height >= from_height).then_some((height, record))
        })
        .collect())
}

/// All name mappings of one namespace, ascending by id.
pub fn mappings_of_kind(
    store: &BettingStore,
    kind: MappingKind,
) -> Result<Vec<(u32, String)>, LedgerError> {
    let rows: Vec<(Vec<u8>, MappingRecord)> =
        store.scan_prefix(TableId::Mappings, &keys::mapping_prefix(kind))?;
    Ok(rows
        .into_iter()
        .map(|(key, record)| {
            let id = u32::from_be_bytes([key[1], key[2], key[3], key[4]]);
            (id, record.name)
        })
        .collect())
}

/// Total payout owed to `address` across completed bets, in smallest units.
pub fn settled_winnings(store: &BettingStore, address: &str) -> Result<Amount, LedgerError> {
    let bets: Vec<(Vec<u8>, BetRecord)> = store.scan_prefix(TableId::Bets, &[])?;
    Ok(bets
        .iter()
        .filter(|(_, b)| b.completed && b.address == address)
        .map(|(_, b)| b.payout)
        .sum())
}
