// ============================================================================
// BETTING STATE STORE
// ============================================================================
//
// Ordered key-value store for the betting subsystem, backed by ReDB:
// - One table per record family (events, bets, results, payout index, ...)
// - Big-endian composite keys so prefix iteration walks ascending
//   (height, outpoint) / (mapping kind, id) order
// - All of one block's mutations run in a single write transaction and
//   commit atomically; every mutation records its pre-image in the undo log
//
// CONCURRENCY MODEL:
// - Writes: one StoreBatch at a time, driven by the block-connect thread
// - Reads: ReDB MVCC snapshots; readers never observe a half-applied block
//
// ============================================================================

pub mod records;
pub mod undo;

use std::path::Path;

use borsh::{BorshDeserialize, BorshSerialize};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::protocol::OutPoint;
use crate::{store_err, LedgerError};

use self::undo::{UndoEntry, UndoLog};

// ============================================================================
// TABLE DEFINITIONS
// ============================================================================

const EVENTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("events");
const FIELD_EVENTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("field_events");
const RESULTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("results");
const FIELD_RESULTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("field_results");
const BETS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("bets");
const FIELD_BETS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("field_bets");
const CHAIN_GAME_EVENTS: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("chain_game_events");
const CHAIN_GAME_BETS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("chain_game_bets");
const CHAIN_GAME_RESULTS: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("chain_game_results");
const QUICK_GAME_BETS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("quick_game_bets");
const PAYOUT_INDEX: TableDefinition<&[u8], &[u8]> = TableDefinition::new("payout_index");
const MAPPINGS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("mappings");
const UNDO: TableDefinition<&[u8], &[u8]> = TableDefinition::new("undo");

/// Addressable tables. The undo table itself is not listed: it is the
/// journal, not journaled data.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum TableId {
    Events,
    FieldEvents,
    Results,
    FieldResults,
    Bets,
    FieldBets,
    ChainGameEvents,
    ChainGameBets,
    ChainGameResults,
    QuickGameBets,
    PayoutIndex,
    Mappings,
}

fn table_def(id: TableId) -> TableDefinition<'static, &'static [u8], &'static [u8]> {
    match id {
        TableId::Events => EVENTS,
        TableId::FieldEvents => FIELD_EVENTS,
        TableId::Results => RESULTS,
        TableId::FieldResults => FIELD_RESULTS,
        TableId::Bets => BETS,
        TableId::FieldBets => FIELD_BETS,
        TableId::ChainGameEvents => CHAIN_GAME_EVENTS,
        TableId::ChainGameBets => CHAIN_GAME_BETS,
        TableId::ChainGameResults => CHAIN_GAME_RESULTS,
        TableId::QuickGameBets => QUICK_GAME_BETS,
        TableId::PayoutIndex => PAYOUT_INDEX,
        TableId::Mappings => MAPPINGS,
    }
}

const ALL_TABLES: [TableId; 12] = [
    TableId::Events,
    TableId::FieldEvents,
    TableId::Results,
    TableId::FieldResults,
    TableId::Bets,
    TableId::FieldBets,
    TableId::ChainGameEvents,
    TableId::ChainGameBets,
    TableId::ChainGameResults,
    TableId::QuickGameBets,
    TableId::PayoutIndex,
    TableId::Mappings,
];

// ============================================================================
// COMPOSITE KEYS
// ============================================================================

/// Key builders. All multi-byte fields are big-endian so the store's
/// natural byte ordering matches numeric ordering.
pub mod keys {
    use super::OutPoint;
    use crate::codec::MappingKind;

    pub fn event(event_id: u32) -> [u8; 4] {
        event_id.to_be_bytes()
    }

    pub fn chain_game_event(event_id: u16) -> [u8; 2] {
        event_id.to_be_bytes()
    }

    pub fn mapping(kind: MappingKind, id: u32) -> [u8; 5] {
        let mut key = [0u8; 5];
        key[0] = kind.to_byte();
        key[1..].copy_from_slice(&id.to_be_bytes());
        key
    }

    /// Namespace prefix for "all mappings of kind K" scans.
    pub fn mapping_prefix(kind: MappingKind) -> [u8; 1] {
        [kind.to_byte()]
    }

    /// (height, outpoint) — used for bets and payout-index rows so both
    /// iterate ascending by height, then outpoint.
    pub fn height_outpoint(height: u32, outpoint: &OutPoint) -> [u8; 40] {
        let mut key = [0u8; 40];
        key[..4].copy_from_slice(&height.to_be_bytes());
        key[4..].copy_from_slice(&outpoint.to_key_bytes());
        key
    }

    pub fn height_prefix(height: u32) -> [u8; 4] {
        height.to_be_bytes()
    }

    pub fn undo(height: u32, seq: u32) -> [u8; 8] {
        let mut key = [0u8; 8];
        key[..4].copy_from_slice(&height.to_be_bytes());
        key[4..].copy_from_slice(&seq.to_be_bytes());
        key
    }
}

/// Smallest byte string strictly greater than every key with this prefix,
/// or `None` when the prefix is all 0xff and the range is unbounded.
fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.last_mut() {
        if *last == 0xff {
            end.pop();
        } else {
            *last += 1;
            return Some(end);
        }
    }
    None
}

fn decode_record<T: BorshDeserialize>(bytes: &[u8]) -> Result<T, LedgerError> {
    T::try_from_slice(bytes).map_err(|e| LedgerError::Codec(e.to_string()))
}

fn encode_record<T: BorshSerialize>(value: &T) -> Result<Vec<u8>, LedgerError> {
    borsh::to_vec(value).map_err(|e| LedgerError::Codec(e.to_string()))
}

// ============================================================================
// STORE
// ============================================================================

/// The betting subsystem's persistent state.
pub struct BettingStore {
    db: Database,
}

impl BettingStore {
    /// Create or open the store at `path` (a directory).
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        std::fs::create_dir_all(path).map_err(store_err)?;
        let db_path = path.join("betting.redb");
        info!(path = %db_path.display(), "opening betting store");
        let db = Database::create(&db_path).map_err(store_err)?;

        // Make sure every table exists so later read transactions never
        // fault on a missing table.
        let txn = db.begin_write().map_err(store_err)?;
        {
            for id in ALL_TABLES {
                txn.open_table(table_def(id)).map_err(store_err)?;
            }
            txn.open_table(UNDO).map_err(store_err)?;
        }
        txn.commit().map_err(store_err)?;

        Ok(Self { db })
    }

    /// Begin the write batch for connecting the block at `height`.
    pub fn begin(&self, height: u32) -> Result<StoreBatch, LedgerError> {
        let txn = self.db.begin_write().map_err(store_err)?;
        Ok(StoreBatch { txn, height, undo: UndoLog::default() })
    }

    pub(crate) fn database(&self) -> &Database {
        &self.db
    }

    // ========================================================================
    // READ PATH (own MVCC snapshot per call)
    // ========================================================================

    pub fn get<T: BorshDeserialize>(
        &self,
        table: TableId,
        key: &[u8],
    ) -> Result<Option<T>, LedgerError> {
        let txn = self.db.begin_read().map_err(store_err)?;
        let t = txn.open_table(table_def(table)).map_err(store_err)?;
        match t.get(key).map_err(store_err)? {
            Some(guard) => Ok(Some(decode_record(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn exists(&self, table: TableId, key: &[u8]) -> Result<bool, LedgerError> {
        let txn = self.db.begin_read().map_err(store_err)?;
        let t = txn.open_table(table_def(table)).map_err(store_err)?;
        Ok(t.get(key).map_err(store_err)?.is_some())
    }

    /// All records whose key starts with `prefix`, in ascending key order.
    /// An empty prefix walks the whole table.
    pub fn scan_prefix<T: BorshDeserialize>(
        &self,
        table: TableId,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, T)>, LedgerError> {
        let txn = self.db.begin_read().map_err(store_err)?;
        let t = txn.open_table(table_def(table)).map_err(store_err)?;
        let mut out = Vec::new();
        let iter = match prefix_successor(prefix) {
            Some(end) => t.range(prefix..end.as_slice()).map_err(store_err)?,
            None => t.range(prefix..).map_err(store_err)?,
        };
        for item in iter {
            let (key, value) = item.map_err(store_err)?;
            out.push((key.value().to_vec(), decode_record(value.value())?));
        }
        Ok(out)
    }

    /// Replay the undo journal for `height` in reverse write order, then
    /// drop the journal rows, all in one atomic transaction. Returns the
    /// number of reverted mutations. Calling it again for the same height
    /// is a no-op, which keeps repeated connect/disconnect cycles
    /// idempotent.
    pub(crate) fn revert_height(&self, height: u32) -> Result<usize, LedgerError> {
        let entries = self.undo_entries(height)?;
        let txn = self.db.begin_write().map_err(store_err)?;
        {
            for entry in entries.iter().rev() {
                let mut t = txn.open_table(table_def(entry.table)).map_err(store_err)?;
                match &entry.prev {
                    Some(prev) => {
                        t.insert(entry.key.as_slice(), prev.as_slice()).map_err(store_err)?;
                    }
                    None => {
                        t.remove(entry.key.as_slice()).map_err(store_err)?;
                    }
                }
            }
            let mut u = txn.open_table(UNDO).map_err(store_err)?;
            for seq in 0..entries.len() as u32 {
                u.remove(keys::undo(height, seq).as_slice()).map_err(store_err)?;
            }
        }
        txn.commit().map_err(store_err)?;
        Ok(entries.len())
    }

    /// Undo entries recorded for `height`, in original write order.
    pub fn undo_entries(&self, height: u32) -> Result<Vec<UndoEntry>, LedgerError> {
        let txn = self.db.begin_read().map_err(store_err)?;
        let t = txn.open_table(UNDO).map_err(store_err)?;
        let prefix = keys::height_prefix(height);
        let end = keys::height_prefix(height.checked_add(1).unwrap_or(u32::MAX));
        let mut out = Vec::new();
        let iter = if height == u32::MAX {
            t.range(prefix.as_slice()..).map_err(store_err)?
        } else {
            t.range(prefix.as_slice()..end.as_slice()).map_err(store_err)?
        };
        for item in iter {
            let (_, value) = item.map_err(store_err)?;
            out.push(decode_record(value.value())?);
        }
        Ok(out)
    }
}

// ============================================================================
// WRITE BATCH
// ============================================================================

/// All mutations of one block, committed atomically together with their
/// undo journal. Dropping the batch without `commit` discards everything.
pub struct StoreBatch {
    txn: redb::WriteTransaction,
    height: u32,
    undo: UndoLog,
}

impl StoreBatch {
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get<T: BorshDeserialize>(
        &self,
        table: TableId,
        key: &[u8],
    ) -> Result<Option<T>, LedgerError> {
        let t = self.txn.open_table(table_def(table)).map_err(store_err)?;
        let result = match t.get(key).map_err(store_err)? {
            Some(guard) => Ok(Some(decode_record(guard.value())?)),
            None => Ok(None),
        };
        result
    }

    pub fn exists(&self, table: TableId, key: &[u8]) -> Result<bool, LedgerError> {
        let t = self.txn.open_table(table_def(table)).map_err(store_err)?;
        let found = t.get(key).map_err(store_err)?.is_some();
        Ok(found)
    }

    pub fn scan_prefix<T: BorshDeserialize>(
        &self,
        table: TableId,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, T)>, LedgerError> {
        let t = self.txn.open_table(table_def(table)).map_err(store_err)?;
        let mut out = Vec::new();
        let iter = match prefix_successor(prefix) {
            Some(end) => t.range(prefix..end.as_slice()).map_err(store_err)?,
            None => t.range(prefix..).map_err(store_err)?,
        };
        for item in iter {
            let (key, value) = item.map_err(store_err)?;
            out.push((key.value().to_vec(), decode_record(value.value())?));
        }
        Ok(out)
    }

    /// Insert or overwrite, journaling the pre-image (or its absence).
    pub fn put<T: BorshSerialize>(
        &mut self,
        table: TableId,
        key: &[u8],
        value: &T,
    ) -> Result<(), LedgerError> {
        let bytes = encode_record(value)?;
        let mut t = self.txn.open_table(table_def(table)).map_err(store_err)?;
        let prev = t.get(key).map_err(store_err)?.map(|g| g.value().to_vec());
        t.insert(key, bytes.as_slice()).map_err(store_err)?;
        self.undo.record(table, key, prev);
        Ok(())
    }

    /// Delete, journaling the pre-image.
    pub fn delete(&mut self, table: TableId, key: &[u8]) -> Result<(), LedgerError> {
        let mut t = self.txn.open_table(table_def(table)).map_err(store_err)?;
        let prev = t.remove(key).map_err(store_err)?.map(|g| g.value().to_vec());
        self.undo.record(table, key, prev);
        Ok(())
    }

    /// Persist the undo journal and commit every mutation atomically.
    pub fn commit(self) -> Result<(), LedgerError> {
        let entry_count = self.undo.len();
        {
            let mut t = self.txn.open_table(UNDO).map_err(store_err)?;
            for (seq, entry) in self.undo.entries().iter().enumerate() {
                let key = keys::undo(self.height, seq as u32);
                t.insert(key.as_slice(), encode_record(entry)?.as_slice())
                    .map_err(store_err)?;
            }
        }
        self.txn.commit().map_err(store_err)?;
        debug!(height = self.height, undo_entries = entry_count, "block batch committed");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
