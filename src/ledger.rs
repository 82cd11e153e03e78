//! The betting ledger facade.
//!
//! [`BettingLedger`] is the integration surface the surrounding node
//! consumes: admission check, block connect (apply + payout resolution +
//! payout validation, committed atomically), payout preview for block
//! assembly, and block disconnect. All mutation happens on the single
//! thread that drives block connection; share the handle as
//! [`crate::SharedLedger`] so readers take the shared side of the lock.

use std::path::Path;

use tracing::{info, warn};

use crate::apply::apply_block;
use crate::mint::{check_bet_mints, MintError, TokenGroupDeltas};
use crate::payout::{commit_payouts, expected_payouts, ResolvedPayouts};
use crate::protocol::{Amount, Block, ConsensusParams, SpendableView, Transaction};
use crate::store::BettingStore;
use crate::undo::disconnect_block;
use crate::validate::{check_transaction, AdmissionError};
use crate::LedgerError;

pub struct BettingLedger {
    store: BettingStore,
    params: ConsensusParams,
}

impl BettingLedger {
    /// Open (or create) the ledger state under `path`.
    pub fn open(path: &Path, params: ConsensusParams) -> Result<Self, LedgerError> {
        Ok(Self { store: BettingStore::open(path)?, params })
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    /// Read access for reporting queries ([`crate::view`]).
    pub fn store(&self) -> &BettingStore {
        &self.store
    }

    // ========================================================================
    // ADMISSION (read-only)
    // ========================================================================

    /// Check a transaction for pool admission or block pre-validation.
    pub fn check_transaction(
        &self,
        view: &dyn SpendableView,
        tx: &Transaction,
        height: u32,
    ) -> Result<(), AdmissionError> {
        check_transaction(&self.store, view, &self.params, tx, height)
    }

    /// Check a transaction's token-funded bet mints.
    pub fn check_bet_mints(
        &self,
        native_in: Amount,
        native_out: Amount,
        deltas: &TokenGroupDeltas,
    ) -> Result<(), MintError> {
        check_bet_mints(&self.store, &self.params, native_in, native_out, deltas)
    }

    // ========================================================================
    // BLOCK CONNECT / DISCONNECT (exclusive)
    // ========================================================================

    /// Connect a block: apply its operations, resolve the payouts it must
    /// carry, validate its actual payout outputs against them, and commit
    /// everything -- or nothing. A failure at any step leaves the store at
    /// the prior block's state.
    pub fn connect_block(
        &mut self,
        view: &dyn SpendableView,
        block: &Block,
        height: u32,
    ) -> Result<ResolvedPayouts, LedgerError> {
        let mut batch = self.store.begin(height)?;
        apply_block(&mut batch, view, &self.params, block)?;
        let resolved = expected_payouts(&batch, block, &self.params)?;
        if let Err(e) = commit_payouts(&mut batch, block, &resolved) {
            warn!(height, error = %e, "block rejected, discarding partial state");
            return Err(e);
        }
        batch.commit()?;
        info!(
            height,
            payouts = resolved.entries.len(),
            settled = resolved.completions.len(),
            "betting state connected"
        );
        Ok(resolved)
    }

    /// Compute the payout vector a candidate block must carry, without
    /// committing anything. Used by block assembly before the reward
    /// transaction is finalized.
    pub fn preview_payouts(
        &self,
        view: &dyn SpendableView,
        block: &Block,
        height: u32,
    ) -> Result<ResolvedPayouts, LedgerError> {
        let mut batch = self.store.begin(height)?;
        apply_block(&mut batch, view, &self.params, block)?;
        expected_payouts(&batch, block, &self.params)
        // batch dropped: nothing persists
    }

    /// Disconnect the block at `height`, restoring the prior state.
    pub fn disconnect_block(&mut self, height: u32) -> Result<usize, LedgerError> {
        disconnect_block(&self.store, height)
    }
}
