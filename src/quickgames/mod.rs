//! Quick-game framework.
//!
//! A quick game settles one block after placement from the block seed. Each
//! game contributes a handler that maps (bet payload, seed) to an odds
//! factor over the shared divisor: zero is a loss, the divisor itself a
//! refund, anything above it a win at that multiplier. The resolver applies
//! the factor and routes the configured fee shares to the reward addresses.

pub mod dice;

use crate::codec::QuickGameKind;

/// Handler signature: interpret the bet payload against the block seed and
/// return the odds factor. An unparseable payload refunds (divisor).
pub type BetHandler = fn(bet_info: &[u8], seed: &[u8; 32]) -> u32;

/// Static description of one quick game.
pub struct QuickGameView {
    pub name: &'static str,
    pub kind: QuickGameKind,
    pub handler: BetHandler,
    /// Share of winnings routed to the dev reward address, in permille.
    pub dev_fee_permille: u32,
    /// Share of winnings routed to the oracle reward address, in permille.
    pub oracle_fee_permille: u32,
}

static GAMES: [QuickGameView; 1] = [QuickGameView {
    name: "dice",
    kind: QuickGameKind::Dice,
    handler: dice::handle_bet,
    dev_fee_permille: 10,
    oracle_fee_permille: 10,
}];

pub fn game_view(kind: QuickGameKind) -> Option<&'static QuickGameView> {
    GAMES.iter().find(|g| g.kind == kind)
}
