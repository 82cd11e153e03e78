//! Dice quick game.
//!
//! Two dice are rolled from the block seed. The payload picks one of six
//! bet types; number-carrying types read a 4-byte little-endian target.
//! Factors are the true odds over the divisor (36 / favorable ways), so the
//! game is fair before fees.

use sha2::{Digest, Sha256};

use crate::payout::ODDS_DIVISOR;

/// Dice bet types carried in the payload's first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiceBetKind {
    Equal,
    NotEqual,
    TotalOver,
    TotalUnder,
    Even,
    Odd,
}

impl DiceBetKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(DiceBetKind::Equal),
            0x01 => Some(DiceBetKind::NotEqual),
            0x02 => Some(DiceBetKind::TotalOver),
            0x03 => Some(DiceBetKind::TotalUnder),
            0x04 => Some(DiceBetKind::Even),
            0x05 => Some(DiceBetKind::Odd),
            _ => None,
        }
    }

    fn takes_number(self) -> bool {
        !matches!(self, DiceBetKind::Even | DiceBetKind::Odd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceBetInfo {
    pub kind: DiceBetKind,
    pub number: u32,
}

impl DiceBetInfo {
    /// Parse the free-form quick-game payload. `None` means the payload is
    /// malformed and the bet refunds.
    pub fn parse(bet_info: &[u8]) -> Option<Self> {
        let kind = DiceBetKind::from_byte(*bet_info.first()?)?;
        let number = if kind.takes_number() {
            let raw = bet_info.get(1..5)?;
            u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])
        } else {
            0
        };
        Some(Self { kind, number })
    }
}

/// Roll both dice from the seed. Each die reduces one half of the digest
/// modulo six, which every node reproduces identically.
pub fn roll(seed: &[u8; 32]) -> (u32, u32) {
    let digest = Sha256::digest(seed);
    let mut lo = [0u8; 8];
    let mut hi = [0u8; 8];
    lo.copy_from_slice(&digest[..8]);
    hi.copy_from_slice(&digest[8..16]);
    let first = (u64::from_le_bytes(lo) % 6) as u32 + 1;
    let second = (u64::from_le_bytes(hi) % 6) as u32 + 1;
    (first, second)
}

/// Ways to roll each total 2..=12 with two dice.
fn ways(total: u32) -> u32 {
    match total {
        2 | 12 => 1,
        3 | 11 => 2,
        4 | 10 => 3,
        5 | 9 => 4,
        6 | 8 => 5,
        7 => 6,
        _ => 0,
    }
}

fn ways_over(line: u32) -> u32 {
    ((line + 1)..=12).map(ways).sum()
}

fn ways_under(line: u32) -> u32 {
    (2..line.min(13)).map(ways).sum()
}

/// True-odds factor for a winning pick with `favorable` of 36 ways.
fn factor(favorable: u32) -> u32 {
    ODDS_DIVISOR * 36 / favorable
}

/// Quick-game handler: zero on a loss, the divisor on a refund-worthy bet
/// (malformed payload or a pick that can never win), the true-odds factor
/// on a win.
pub fn handle_bet(bet_info: &[u8], seed: &[u8; 32]) -> u32 {
    let Some(info) = DiceBetInfo::parse(bet_info) else {
        return ODDS_DIVISOR;
    };

    let (first, second) = roll(seed);
    let total = first + second;

    let (won, favorable) = match info.kind {
        DiceBetKind::Equal => (total == info.number, ways(info.number)),
        DiceBetKind::NotEqual => (total != info.number, 36 - ways(info.number)),
        DiceBetKind::TotalOver => (total > info.number, ways_over(info.number)),
        DiceBetKind::TotalUnder => (total < info.number, ways_under(info.number)),
        DiceBetKind::Even => (total % 2 == 0, 18),
        DiceBetKind::Odd => (total % 2 == 1, 18),
    };

    // A pick with no winning roll (e.g. equal-to-13) cannot settle either
    // way; the stake comes back.
    if favorable == 0 || favorable >= 36 {
        return ODDS_DIVISOR;
    }
    if won {
        factor(favorable)
    } else {
        0
    }
}
