
use common::setup::*;
use ledger_engine::{Classify, ErrorKind, Rad, Wad};
use wrapping_vault::{JoinError, Token, TokenError};

#[test]
fn test_token_mint_cap_and_allowances() {
    init_logger();
    let mut token = Token::new(addr(0x200), deployer(), "SIKKA");
    assert_eq!(token.symbol(), "SIKKA");

    let err = token.mint(alice(), alice(), wad(1)).expect_err("alice is not a ward");
    assert_eq!(err, TokenError::NotAuthorized);

    token.set_supply_cap(deployer(), wad(100)).expect("cap");
    token.mint(deployer(), alice(), wad(60)).expect("mint");
    let err = token.mint(deployer(), bob(), wad(41)).expect_err("over the cap");
    assert_eq!(err, TokenError::CapReached);
    assert_eq!(err.kind(), ErrorKind::Solvency);
    assert_eq!(token.total_supply(), wad(60));

    let err = token.set_supply_cap(deployer(), wad(50)).expect_err("below supply");
    assert_eq!(err, TokenError::MoreSupplyThanCap);

    let err = token
        .transfer_from(bob(), alice(), bob(), wad(10))
        .expect_err("no allowance");
    assert_eq!(err, TokenError::InsufficientAllowance);

    token.approve(alice(), bob(), wad(25));
    token.transfer_from(bob(), alice(), bob(), wad(10)).expect("within allowance");
    assert_eq!(token.allowance(&alice(), &bob()), wad(15));
    assert_eq!(token.balance_of(&bob()), wad(10));

    token.approve(alice(), bob(), Token::unlimited());
    token.transfer_from(bob(), alice(), bob(), wad(10)).expect("unlimited");
    assert_eq!(token.allowance(&alice(), &bob()), Token::unlimited());

    let err = token.transfer(bob(), alice(), wad(21)).expect_err("bob holds 20");
    assert_eq!(err, TokenError::InsufficientBalance);

    token.burn(bob(), bob(), wad(20)).expect("burn own");
    assert_eq!(token.total_supply(), wad(40));
    assert_eq!(token.balance_of(&bob()), Wad::zero());
}

#[test]
fn test_gem_join_round_trip() {
    let mut ledger = Ledger::new();
    let me = ledger.deployer;
    let ilk = ledger.ilk;
    let join = ledger.gem_join.address();

    ledger.gem.mint(me, me, wad(5)).expect("mint");
    ledger.gem.approve(me, join, wad(5));
    ledger
        .gem_join
        .join(me, &mut ledger.vat, &mut ledger.gem, me, wad(5))
        .expect("join");
    assert_eq!(ledger.vat.gem(&ilk, &me), wad(5));
    assert_eq!(ledger.gem.balance_of(&join), wad(5));
    assert_eq!(ledger.gem.balance_of(&me), Wad::zero());

    ledger
        .gem_join
        .exit(me, &mut ledger.vat, &mut ledger.gem, bob(), wad(2))
        .expect("exit");
    assert_eq!(ledger.vat.gem(&ilk, &me), wad(3));
    assert_eq!(ledger.gem.balance_of(&bob()), wad(2));
    assert_eq!(ledger.gem.balance_of(&join), wad(3));
}

#[test]
fn test_gem_join_failures_leave_both_ledgers_untouched() {
    let mut ledger = Ledger::new();
    let me = ledger.deployer;
    let ilk = ledger.ilk;

    ledger.gem.mint(me, me, wad(5)).expect("mint");
    let err = ledger
        .gem_join
        .join(me, &mut ledger.vat, &mut ledger.gem, me, wad(5))
        .expect_err("join not approved");
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(ledger.vat.gem(&ilk, &me), Wad::zero());
    assert_eq!(ledger.gem.balance_of(&me), wad(5));

    let err = ledger
        .gem_join
        .join(alice(), &mut ledger.vat, &mut ledger.gem, alice(), wad(1))
        .expect_err("alice is not a ward");
    assert_eq!(err, JoinError::NotAuthorized("GemJoin"));

    let err = ledger
        .gem_join
        .join(me, &mut ledger.vat, &mut ledger.sikka, me, wad(1))
        .expect_err("wrong token");
    assert_eq!(err, JoinError::WrongToken("GemJoin"));
    assert_eq!(err.to_string(), "GemJoin/wrong-token");

    let err = ledger
        .gem_join
        .exit(me, &mut ledger.vat, &mut ledger.gem, me, wad(1))
        .expect_err("nothing joined yet");
    assert_eq!(err.kind(), ErrorKind::Solvency);
}

#[test]
fn test_caged_gem_join_still_exits() {
    let mut ledger = Ledger::new();
    let me = ledger.deployer;
    let join = ledger.gem_join.address();

    ledger.gem.mint(me, me, wad(5)).expect("mint");
    ledger.gem.approve(me, join, Token::unlimited());
    ledger
        .gem_join
        .join(me, &mut ledger.vat, &mut ledger.gem, me, wad(3))
        .expect("join");

    ledger.gem_join.cage(me).expect("cage");
    let err = ledger
        .gem_join
        .join(me, &mut ledger.vat, &mut ledger.gem, me, wad(1))
        .expect_err("caged");
    assert_eq!(err, JoinError::NotLive("GemJoin"));
    assert_eq!(err.kind(), ErrorKind::Lifecycle);

    ledger
        .gem_join
        .exit(me, &mut ledger.vat, &mut ledger.gem, me, wad(3))
        .expect("exit after cage");
    assert_eq!(ledger.gem.balance_of(&me), wad(5));
}

#[test]
fn test_sikka_join_round_trip() {
    let mut ledger = Ledger::new();
    let me = ledger.deployer;
    let join = ledger.sikka_join.address();
    ledger.vat.suck(me, addr(0xdead), me, rad(10)).expect("suck");

    let err = ledger
        .sikka_join
        .exit(me, &mut ledger.vat, &mut ledger.sikka, alice(), wad(10))
        .expect_err("the join may not move our sikka yet");
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(ledger.sikka.total_supply(), Wad::zero());

    ledger.vat.hope(me, join);
    ledger
        .sikka_join
        .exit(me, &mut ledger.vat, &mut ledger.sikka, alice(), wad(10))
        .expect("exit");
    assert_eq!(ledger.sikka.balance_of(&alice()), wad(10));
    assert_eq!(ledger.vat.sikka(&me), Rad::zero());
    assert_eq!(ledger.vat.sikka(&join), rad(10));

    ledger.sikka_join.rely(me, alice()).expect("rely");
    ledger.sikka.approve(alice(), join, wad(4));
    ledger
        .sikka_join
        .join(alice(), &mut ledger.vat, &mut ledger.sikka, alice(), wad(4))
        .expect("join");
    assert_eq!(ledger.vat.sikka(&alice()), rad(4));
    assert_eq!(ledger.vat.sikka(&join), rad(6));
    assert_eq!(ledger.sikka.total_supply(), wad(6));
}

#[test]
fn test_sikka_exit_respects_supply_cap() {
    let mut ledger = Ledger::new();
    let me = ledger.deployer;
    ledger.vat.suck(me, addr(0xdead), me, rad(10)).expect("suck");
    ledger.vat.hope(me, ledger.sikka_join.address());
    ledger.sikka.set_supply_cap(me, wad(5)).expect("cap");

    let err = ledger
        .sikka_join
        .exit(me, &mut ledger.vat, &mut ledger.sikka, alice(), wad(10))
        .expect_err("cap is 5");
    assert_eq!(err, JoinError::Token(TokenError::CapReached));
    assert_eq!(ledger.vat.sikka(&me), rad(10));

    ledger
        .sikka_join
        .exit(me, &mut ledger.vat, &mut ledger.sikka, alice(), wad(5))
        .expect("at the cap");
    assert_eq!(ledger.sikka.total_supply(), wad(5));
}
