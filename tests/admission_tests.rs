//! Pool-admission rejection scenarios: every failure returns its specific
//! stable reason and nothing is mutated.

mod common;

use common::*;
use tempfile::tempdir;
use wagerbook::codec::{
    BetOp, BettingOp, ChainGameBetOp, ChainGameEventOp, EventOp, MappingKind, MappingOp,
    MarketOutcome, ParlayBetOp, ResultKind, ResultOp, ZeroingOddsOp,
};
use wagerbook::ledger::BettingLedger;
use wagerbook::protocol::COIN;
use wagerbook::validate::AdmissionError;

fn setup() -> (tempfile::TempDir, BettingLedger, MockCoins) {
    let dir = tempdir().unwrap();
    let mut coins = MockCoins::new();
    let mut ledger = BettingLedger::open(dir.path(), test_params()).unwrap();

    let funding = coins.fund(ORACLE);
    let setup_tx = op_tx(
        10,
        funding,
        &[
            (mapping(MappingKind::Sport, 9, "Football"), 0),
            (mapping(MappingKind::Tournament, 3, "Cup"), 0),
            (mapping(MappingKind::Round, 0, "Regular"), 0),
            (mapping(MappingKind::Round, 2, "Semifinal"), 0),
            (mapping(MappingKind::Team, 41, "Home FC"), 0),
            (mapping(MappingKind::Team, 42, "Away FC"), 0),
            (event_op(1001, 0), 0),
            (event_op(1002, 2), 0), // staged event: no parlays
            (
                BettingOp::ChainGameEvent(ChainGameEventOp { event_id: 7, entry_fee: 25 }),
                0,
            ),
        ],
    );
    let b1 = block(500_000, 1, vec![reward_tx(9, &[]), setup_tx]);
    ledger.connect_block(&coins, &b1, 1).unwrap();
    (dir, ledger, coins)
}

fn mapping(kind: MappingKind, id: u32, name: &str) -> BettingOp {
    BettingOp::Mapping(MappingOp { kind, id, name: name.to_string() })
}

fn event_op(event_id: u32, stage: u16) -> BettingOp {
    BettingOp::Event(EventOp {
        event_id,
        start_time: 900_000,
        sport: 9,
        tournament: 3,
        stage,
        home_team: 41,
        away_team: 42,
        home_odds: 15_000,
        away_odds: 28_000,
        draw_odds: 31_000,
    })
}

fn bet_op(event_id: u32) -> BettingOp {
    BettingOp::Bet(BetOp { event_id, outcome: MarketOutcome::MoneyLineHome })
}

#[test]
fn oracle_ops_from_players_are_rejected() {
    let (_dir, ledger, mut coins) = setup();
    let funding = coins.fund(PLAYER);
    let tx = op_tx(
        50,
        funding,
        &[(
            BettingOp::Result(ResultOp {
                event_id: 1001,
                kind: ResultKind::Standard,
                home_score: 1,
                away_score: 0,
            }),
            0,
        )],
    );
    let err = ledger.check_transaction(&coins, &tx, 2).unwrap_err();
    assert!(matches!(err, AdmissionError::UnauthorizedOracle(_)), "got {err}");
}

#[test]
fn bet_on_unknown_event_rejected() {
    let (_dir, ledger, mut coins) = setup();
    let funding = coins.fund(PLAYER);
    let tx = op_tx(50, funding, &[(bet_op(9999), 100 * COIN)]);
    assert_eq!(
        ledger.check_transaction(&coins, &tx, 2),
        Err(AdmissionError::UnknownEvent(9999))
    );
}

#[test]
fn stake_bounds_enforced() {
    let (_dir, ledger, mut coins) = setup();

    let funding = coins.fund(PLAYER);
    let low = op_tx(50, funding, &[(bet_op(1001), 10 * COIN)]);
    assert_eq!(
        ledger.check_transaction(&coins, &low, 2),
        Err(AdmissionError::StakeOutOfRange(10 * COIN))
    );

    let funding = coins.fund(PLAYER);
    let high = op_tx(51, funding, &[(bet_op(1001), 20_000 * COIN)]);
    assert_eq!(
        ledger.check_transaction(&coins, &high, 2),
        Err(AdmissionError::StakeOutOfRange(20_000 * COIN))
    );

    // Parlays have a tighter maximum.
    let funding = coins.fund(PLAYER);
    let parlay = op_tx(
        52,
        funding,
        &[(
            BettingOp::ParlayBet(ParlayBetOp {
                legs: vec![
                    BetOp { event_id: 1001, outcome: MarketOutcome::MoneyLineHome },
                    BetOp { event_id: 1002, outcome: MarketOutcome::MoneyLineAway },
                ],
            }),
            5_000 * COIN,
        )],
    );
    assert_eq!(
        ledger.check_transaction(&coins, &parlay, 2),
        Err(AdmissionError::StakeOutOfRange(5_000 * COIN))
    );
}

#[test]
fn bet_on_resulted_event_rejected() {
    let (_dir, mut ledger, mut coins) = setup();

    let funding = coins.fund(ORACLE);
    let result_tx = op_tx(
        30,
        funding,
        &[(
            BettingOp::Result(ResultOp {
                event_id: 1001,
                kind: ResultKind::Standard,
                home_score: 1,
                away_score: 0,
            }),
            0,
        )],
    );
    let b2 = block(500_100, 2, vec![reward_tx(21, &[]), result_tx]);
    ledger.connect_block(&coins, &b2, 2).unwrap();

    let funding = coins.fund(PLAYER);
    let tx = op_tx(50, funding, &[(bet_op(1001), 100 * COIN)]);
    assert_eq!(
        ledger.check_transaction(&coins, &tx, 3),
        Err(AdmissionError::EventResulted(1001))
    );
}

#[test]
fn zeroed_odds_close_the_market() {
    let (_dir, mut ledger, mut coins) = setup();

    let funding = coins.fund(ORACLE);
    let zero_tx = op_tx(
        30,
        funding,
        &[(BettingOp::ZeroingOdds(ZeroingOddsOp { event_ids: vec![1001] }), 0)],
    );
    let b2 = block(500_100, 2, vec![reward_tx(21, &[]), zero_tx]);
    ledger.connect_block(&coins, &b2, 2).unwrap();

    let funding = coins.fund(PLAYER);
    let tx = op_tx(50, funding, &[(bet_op(1001), 100 * COIN)]);
    assert_eq!(
        ledger.check_transaction(&coins, &tx, 3),
        Err(AdmissionError::ZeroOdds { event_id: 1001 })
    );
}

#[test]
fn parlay_composition_rules() {
    let (_dir, ledger, mut coins) = setup();

    // Duplicate legs.
    let funding = coins.fund(PLAYER);
    let duplicated = op_tx(
        50,
        funding,
        &[(
            BettingOp::ParlayBet(ParlayBetOp {
                legs: vec![
                    BetOp { event_id: 1001, outcome: MarketOutcome::MoneyLineHome },
                    BetOp { event_id: 1001, outcome: MarketOutcome::TotalOver },
                ],
            }),
            100 * COIN,
        )],
    );
    assert_eq!(
        ledger.check_transaction(&coins, &duplicated, 2),
        Err(AdmissionError::DuplicateLegEvent(1001))
    );

    // A staged (multi-stage tournament) event cannot join a parlay.
    let funding = coins.fund(PLAYER);
    let staged = op_tx(
        51,
        funding,
        &[(
            BettingOp::ParlayBet(ParlayBetOp {
                legs: vec![
                    BetOp { event_id: 1001, outcome: MarketOutcome::MoneyLineHome },
                    BetOp { event_id: 1002, outcome: MarketOutcome::MoneyLineHome },
                ],
            }),
            100 * COIN,
        )],
    );
    assert_eq!(
        ledger.check_transaction(&coins, &staged, 2),
        Err(AdmissionError::StagedEventInParlay(1002))
    );

    // Too many legs.
    let funding = coins.fund(PLAYER);
    let bloated = op_tx(
        52,
        funding,
        &[(
            BettingOp::ParlayBet(ParlayBetOp {
                legs: (0..6)
                    .map(|i| BetOp {
                        event_id: 2000 + i,
                        outcome: MarketOutcome::MoneyLineHome,
                    })
                    .collect(),
            }),
            100 * COIN,
        )],
    );
    assert_eq!(
        ledger.check_transaction(&coins, &bloated, 2),
        Err(AdmissionError::TooManyLegs(6))
    );
}

#[test]
fn chain_game_stake_must_match_entry_fee() {
    let (_dir, ledger, mut coins) = setup();
    let funding = coins.fund(PLAYER);
    let tx = op_tx(
        50,
        funding,
        &[(BettingOp::ChainGameBet(ChainGameBetOp { event_id: 7 }), 30 * COIN)],
    );
    assert_eq!(
        ledger.check_transaction(&coins, &tx, 2),
        Err(AdmissionError::BadEntryFee { got: 30 * COIN, expected: 25 * COIN })
    );
}

#[test]
fn duplicate_definitions_rejected() {
    let (_dir, ledger, mut coins) = setup();

    let funding = coins.fund(ORACLE);
    let dup_event = op_tx(50, funding, &[(event_op(1001, 0), 0)]);
    assert_eq!(
        ledger.check_transaction(&coins, &dup_event, 2),
        Err(AdmissionError::EventExists(1001))
    );

    let funding = coins.fund(ORACLE);
    let dup_mapping = op_tx(51, funding, &[(mapping(MappingKind::Sport, 9, "Football"), 0)]);
    assert_eq!(
        ledger.check_transaction(&coins, &dup_mapping, 2),
        Err(AdmissionError::MappingExists { kind: MappingKind::Sport, id: 9 })
    );
}

#[test]
fn non_betting_transactions_pass_through() {
    let (_dir, ledger, mut coins) = setup();
    let funding = coins.fund(PLAYER);
    let tx = wagerbook::protocol::Transaction {
        txid: txid(77),
        inputs: vec![wagerbook::protocol::TxIn { prevout: funding }],
        outputs: vec![
            wagerbook::protocol::TxOut::pay(10 * COIN, PLAYER_TWO),
            // Data output with a foreign payload: not a betting operation.
            wagerbook::protocol::TxOut::data(0, vec![0xde, 0xad, 0xbe, 0xef]),
        ],
    };
    assert_eq!(ledger.check_transaction(&coins, &tx, 2), Ok(()));
}
