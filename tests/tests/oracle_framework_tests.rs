
use common::setup::*;
use ledger_engine::{Classify, ErrorKind, IlkId, Ray, Vat, Wad};
use oracle_framework::{OracleError, PriceFeed, SettableFeed, Spotter, SpotterError, TwapFeed};
use std::sync::Arc;

#[test]
fn test_settable_feed_updates() {
    init_logger();
    let feed = SettableFeed::new(oracle(), deployer());
    assert_eq!(feed.peek(), None);

    feed.update_price(oracle(), wad(150), T0).expect("update");
    assert_eq!(feed.peek(), Some(wad(150)));
    assert_eq!(feed.last_update(), T0);

    let err = feed.update_price(alice(), wad(1), T0).expect_err("alice is not the authority");
    assert_eq!(err, OracleError::Unauthorized);
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let err = feed.update_price(oracle(), Wad::zero(), T0).expect_err("zero price");
    assert_eq!(err, OracleError::InvalidPrice);

    let updates = feed.take_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].price, wad(150));
    assert!(feed.take_updates().is_empty());
}

#[test]
fn test_pause_blocks_updates_but_keeps_price() {
    init_logger();
    let feed = SettableFeed::new(oracle(), deployer());
    feed.update_price(oracle(), wad(10), T0).expect("update");

    let err = feed.pause(oracle()).expect_err("only the admin pauses");
    assert_eq!(err, OracleError::Unauthorized);
    feed.pause(deployer()).expect("pause");
    assert!(feed.is_paused());
    assert_eq!(feed.pause(deployer()), Err(OracleError::AlreadyPaused));

    let err = feed.update_price(oracle(), wad(11), T0 + 1).expect_err("paused");
    assert_eq!(err.kind(), ErrorKind::Lifecycle);
    assert_eq!(feed.peek(), Some(wad(10)));

    feed.unpause(deployer()).expect("unpause");
    assert_eq!(feed.unpause(deployer()), Err(OracleError::NotPaused));
    feed.update_price(oracle(), wad(11), T0 + 2).expect("update");
    assert_eq!(feed.peek(), Some(wad(11)));
}

#[test]
fn test_twap_weights_by_elapsed_time() {
    init_logger();
    let source = Arc::new(SettableFeed::with_price(oracle(), wad(100)));
    let twap = TwapFeed::new(source.clone(), 3600);
    assert_eq!(twap.peek(), None);

    assert_eq!(twap.update(T0).expect("first"), wad(100));
    source.update_price(oracle(), wad(200), T0).expect("update");
    assert_eq!(twap.update(T0).expect("same second"), wad(100));
    assert_eq!(twap.update(T0 + 3600).expect("one window"), wad(150));
    assert_eq!(twap.peek(), Some(wad(150)));

    source.void(oracle()).expect("void");
    assert_eq!(twap.update(T0 + 7200), Err(OracleError::InvalidPrice));
    assert_eq!(twap.peek(), Some(wad(150)));
}

#[test]
fn test_poke_applies_par_and_mat() {
    init_logger();
    let ilk = test_ilk();
    let mut vat = Vat::new(addr(0x100), deployer());
    vat.init(deployer(), ilk).expect("init");
    let mut spotter = Spotter::new(addr(0x101), deployer(), vat.address());
    vat.rely(deployer(), spotter.address()).expect("rely");

    let feed = Arc::new(SettableFeed::with_price(oracle(), wad(150)));
    spotter.file_pip(deployer(), ilk, "pip", feed.clone()).expect("pip");
    spotter.file_ilk(deployer(), ilk, "mat", ray("1.5").raw()).expect("mat");
    assert_eq!(spotter.par(), Ray::one());

    assert_eq!(spotter.poke(&mut vat, ilk).expect("poke"), ray("100"));
    assert_eq!(vat.ilk(&ilk).spot, ray("100"));

    spotter.file(deployer(), "par", ray("1.25").raw()).expect("par");
    assert_eq!(spotter.poke(&mut vat, ilk).expect("poke"), ray("80"));
    assert_eq!(vat.ilk(&ilk).spot, ray("80"));

    // A feed without a value zeroes the spot.
    feed.void(oracle()).expect("void");
    assert_eq!(spotter.poke(&mut vat, ilk).expect("poke"), Ray::zero());

    let events = spotter.take_events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].val, Some(wad(150)));
    assert_eq!(events[2].val, None);
}

#[test]
fn test_poke_with_zero_mat_is_arithmetic_error() {
    init_logger();
    let ilk = test_ilk();
    let mut vat = Vat::new(addr(0x100), deployer());
    vat.init(deployer(), ilk).expect("init");
    let mut spotter = Spotter::new(addr(0x101), deployer(), vat.address());
    vat.rely(deployer(), spotter.address()).expect("rely");
    spotter
        .file_pip(deployer(), ilk, "pip", Arc::new(SettableFeed::with_price(oracle(), wad(1))))
        .expect("pip");

    let err = spotter.poke(&mut vat, ilk).expect_err("mat unset");
    assert_eq!(err.kind(), ErrorKind::Arithmetic);
    assert_eq!(vat.ilk(&ilk).spot, Ray::zero());
}

#[test]
fn test_spotter_configuration_errors() {
    init_logger();
    let ilk = test_ilk();
    let mut vat = Vat::new(addr(0x100), deployer());
    let mut spotter = Spotter::new(addr(0x101), deployer(), vat.address());

    let err = spotter.poke(&mut vat, ilk).expect_err("no pip");
    assert_eq!(err, SpotterError::NoPriceFeed);
    assert_eq!(err.kind(), ErrorKind::Config);

    let err = spotter
        .file(deployer(), "mat", ray("1").raw())
        .expect_err("mat is per ilk");
    assert_eq!(err, SpotterError::UnrecognizedParam);
    assert_eq!(err.to_string(), "Spotter/file-unrecognized-param");

    let err = spotter
        .file_ilk(alice(), ilk, "mat", ray("1").raw())
        .expect_err("not a ward");
    assert_eq!(err, SpotterError::NotAuthorized);

    let other = IlkId::new("OTHER").expect("ilk");
    spotter
        .file_pip(deployer(), other, "pip", Arc::new(SettableFeed::with_price(oracle(), wad(1))))
        .expect("pip");
    let mut stranger = Vat::new(addr(0x999), deployer());
    let err = spotter.poke(&mut stranger, other).expect_err("wrong vat");
    assert_eq!(err, SpotterError::MiswiredVat);

    // Poking needs the Spotter to be a ward of the Vat.
    spotter.file_ilk(deployer(), other, "mat", ray("1").raw()).expect("mat");
    vat.init(deployer(), other).expect("init");
    let err = spotter.poke(&mut vat, other).expect_err("not relied");
    assert_eq!(err.kind(), ErrorKind::Authorization);

    spotter.cage(deployer()).expect("cage");
    assert!(!spotter.live());
    let err = spotter.file(deployer(), "par", ray("1").raw()).expect_err("caged");
    assert_eq!(err, SpotterError::NotLive);
}
