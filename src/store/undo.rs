//! Write-ahead undo log.
//!
//! Every mutation performed while connecting a block records the pre-image
//! of the touched (table, key) pair -- including "the key was absent". The
//! entries for one block, replayed in reverse write order, restore the store
//! to its exact state before the block, which is how chain reorganizations
//! are serviced. One generic component instead of a hand-rolled
//! read-old/write-new/remember-old dance per table.

use borsh::{BorshDeserialize, BorshSerialize};

use super::TableId;

/// Pre-image of one store mutation.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct UndoEntry {
    pub table: TableId,
    pub key: Vec<u8>,
    /// Value before the mutation; `None` when the key did not exist.
    pub prev: Option<Vec<u8>>,
}

/// In-memory undo buffer for the block currently being connected.
/// Persisted under the undo table at commit, keyed (height, sequence).
#[derive(Debug, Default)]
pub struct UndoLog {
    entries: Vec<UndoEntry>,
}

impl UndoLog {
    pub fn record(&mut self, table: TableId, key: &[u8], prev: Option<Vec<u8>>) {
        self.entries.push(UndoEntry { table, key: key.to_vec(), prev });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[UndoEntry] {
        &self.entries
    }
}
