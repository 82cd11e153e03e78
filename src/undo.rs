//! Block-disconnect reversal.
//!
//! Connecting a block journals the pre-image of every store mutation it
//! performs -- event accumulator bumps, new bet records, result inserts,
//! completion flags, payout-index rows. Disconnecting replays that journal
//! in reverse write order, which restores the state of the prior block
//! exactly: bets the block completed open up again and become resolvable on
//! whatever chain replaces it.

use tracing::info;

use crate::store::BettingStore;
use crate::LedgerError;

/// Reverse every effect the block at `height` had on the betting state.
///
/// Satisfies `disconnect(connect(block, S)) == S` for the state the connect
/// actually produced; a second disconnect of the same height finds an empty
/// journal and changes nothing.
pub fn disconnect_block(store: &BettingStore, height: u32) -> Result<usize, LedgerError> {
    let reverted = store.revert_height(height)?;
    info!(height, reverted, "betting state disconnected");
    Ok(reverted)
}
