//! Token-funded bet mints.
//!
//! Besides plain staked bets, a bet can be funded by minting betting tokens
//! of a dedicated token group: the group's description pins the event, its
//! subgroup data carries the encoded bet operation, and the minted token
//! amount must equal exactly what the locked odds imply for the native
//! coins spent. A mismatched mint is a rejection, never a silent clamp.
//! At settlement the computed payout is split into a bettor-payable amount
//! and a burn remainder.

use thiserror::Error;

use crate::codec::{decode_payload, BettingOp};
use crate::payout::payout_amount;
use crate::protocol::{Amount, ConsensusParams};
use crate::store::records::EventRecord;
use crate::store::{keys, BettingStore, TableId};
use crate::LedgerError;

/// Flags carved out of a token group id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenGroupFlags {
    pub betting: bool,
    pub parlay: bool,
}

/// The slice of a token group identity the betting subsystem reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGroup {
    pub event_id: u32,
    pub flags: TokenGroupFlags,
    /// Subgroup data: the encoded betting operation this group funds.
    pub bet_payload: Vec<u8>,
}

/// Net mint/melt for one token group within a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupBalance {
    pub input: Amount,
    pub output: Amount,
}

impl GroupBalance {
    pub fn minted(&self) -> Amount {
        self.output - self.input
    }
}

/// Per-transaction token balance deltas, reported by the token subsystem.
pub type TokenGroupDeltas = Vec<(TokenGroup, GroupBalance)>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MintError {
    #[error("token group is not a betting group")]
    NotBettingToken,
    #[error("bet mint mixes unrelated token groups")]
    MixedGroups,
    #[error("token group references unknown event {0}")]
    UnknownEvent(u32),
    #[error("event {0} is closed to new bets")]
    EventClosed(u32),
    #[error("token subgroup data is not a bet operation")]
    BadBetPayload,
    #[error("bet payload targets event {got}, token group pins {expected}")]
    EventMismatch { got: u32, expected: u32 },
    #[error("native spend {0} outside the allowed bet range")]
    SpendOutOfRange(Amount),
    #[error("minted {minted} betting tokens, locked odds imply {expected}")]
    WrongMintAmount { minted: Amount, expected: Amount },
    #[error("store failure: {0}")]
    Store(String),
}

impl From<LedgerError> for MintError {
    fn from(e: LedgerError) -> Self {
        MintError::Store(e.to_string())
    }
}

/// Whether the transaction mints any betting tokens at all. If not, none
/// of the checks below apply.
pub fn bet_tokens_minted(deltas: &TokenGroupDeltas) -> bool {
    deltas
        .iter()
        .any(|(group, balance)| group.flags.betting && balance.minted() > 0)
}

/// Shape test for a single regular (non-parlay) bet mint: exactly one
/// betting group, fresh tokens only, and native coins actually spent.
pub fn is_regular_bet_mint(
    native_in: Amount,
    native_out: Amount,
    deltas: &TokenGroupDeltas,
) -> bool {
    if deltas.len() != 1 || native_out >= native_in {
        return false;
    }
    let (group, balance) = &deltas[0];
    group.flags.betting && !group.flags.parlay && balance.input == 0 && balance.output > 0
}

/// Validate the bet mints of a transaction against current chain state.
///
/// `native_in`/`native_out` are the transaction's native coin totals; their
/// difference is the bet cost. The minted token amount must equal that cost
/// scaled by the event's current odds for the encoded outcome.
pub fn check_bet_mints(
    store: &BettingStore,
    params: &ConsensusParams,
    native_in: Amount,
    native_out: Amount,
    deltas: &TokenGroupDeltas,
) -> Result<(), MintError> {
    if !bet_tokens_minted(deltas) {
        return Ok(());
    }
    if !is_regular_bet_mint(native_in, native_out, deltas) {
        // Parlay token mints require every group to be a parlay betting
        // group; anything else is a malformed funding shape.
        let all_parlay = deltas.len() >= 2
            && deltas.iter().all(|(group, balance)| {
                group.flags.betting
                    && group.flags.parlay
                    && balance.input == 0
                    && balance.output > 0
            });
        if !all_parlay {
            return Err(MintError::MixedGroups);
        }
        for (group, _) in deltas {
            resolve_group_odds(store, group)?;
        }
        return Ok(());
    }

    let spent = native_in - native_out;
    if spent < params.min_bet || spent > params.max_bet {
        return Err(MintError::SpendOutOfRange(spent));
    }

    let (group, balance) = &deltas[0];
    let odds = resolve_group_odds(store, group)?;
    let expected = payout_amount(spent, odds);
    if balance.minted() != expected {
        return Err(MintError::WrongMintAmount { minted: balance.minted(), expected });
    }
    Ok(())
}

/// Decode the group's bet payload and return the event's current odds for
/// the encoded outcome.
fn resolve_group_odds(store: &BettingStore, group: &TokenGroup) -> Result<u32, MintError> {
    if !group.flags.betting {
        return Err(MintError::NotBettingToken);
    }
    let op = decode_payload(&group.bet_payload).ok_or(MintError::BadBetPayload)?;
    let BettingOp::Bet(bet) = op else {
        return Err(MintError::BadBetPayload);
    };
    if bet.event_id != group.event_id {
        return Err(MintError::EventMismatch { got: bet.event_id, expected: group.event_id });
    }

    let key = keys::event(bet.event_id);
    let event: EventRecord = store
        .get(TableId::Events, &key)?
        .ok_or(MintError::UnknownEvent(bet.event_id))?;
    if store.exists(TableId::Results, &key)? {
        return Err(MintError::EventClosed(bet.event_id));
    }
    let odds = event.odds_for(bet.outcome);
    if odds == 0 {
        return Err(MintError::EventClosed(bet.event_id));
    }
    Ok(odds)
}

/// Split a settled payout into the bettor-payable amount and the burn
/// remainder. The burn is the configured permille of the winnings; a
/// refund (payout not above stake) burns nothing.
pub fn payout_burn_amounts(
    stake: Amount,
    locked_odds: u32,
    fee_permille: u32,
) -> (Amount, Amount) {
    let gross = payout_amount(stake, locked_odds);
    if gross <= stake {
        return (gross, 0);
    }
    let winnings = gross - stake;
    let burn = winnings * fee_permille as Amount / 1_000;
    (gross - burn, burn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_betting_op, BetOp, CodecVersion, MarketOutcome};
    use crate::protocol::COIN;

    #[test]
    fn burn_split_follows_locked_odds() {
        // 100 coins at 1.5x: 150 gross, 50 winnings, 6% burn = 3 coins.
        let (payable, burn) = payout_burn_amounts(100 * COIN, 15_000, 60);
        assert_eq!(burn, 3 * COIN);
        assert_eq!(payable, 147 * COIN);
        // Refund: nothing to burn.
        let divisor = crate::payout::ODDS_DIVISOR;
        assert_eq!(payout_burn_amounts(100 * COIN, divisor, 60), (100 * COIN, 0));
    }

    #[test]
    fn regular_mint_shape() {
        let payload = encode_betting_op(
            &BettingOp::Bet(BetOp { event_id: 5, outcome: MarketOutcome::MoneyLineHome }),
            CodecVersion::V4,
        );
        let group = TokenGroup {
            event_id: 5,
            flags: TokenGroupFlags { betting: true, parlay: false },
            bet_payload: payload,
        };
        let deltas = vec![(group, GroupBalance { input: 0, output: 150 * COIN })];
        assert!(is_regular_bet_mint(200 * COIN, 100 * COIN, &deltas));
        assert!(!is_regular_bet_mint(100 * COIN, 100 * COIN, &deltas), "no native spend");
    }
}
