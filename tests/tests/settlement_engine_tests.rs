
use common::setup::*;
use ledger_engine::{Address, Classify, ErrorKind, IlkId, Rad, Ray, Wad, U256};
use oracle_framework::SettableFeed;
use serde::Deserialize;
use settlement_engine::config::DEFAULT_DUTY;
use settlement_engine::{
    Amount, ConfigError, DeployedAddresses, NetworkConfig, ProtocolError, ProtocolEvent,
};
use std::sync::Arc;

#[test]
fn test_network_config_scaling() -> anyhow::Result<()> {
    let config = NetworkConfig::from_json(&network_config_json())?;
    assert_eq!(config.ilk, "ceMATIC");
    assert_eq!(config.abacus_tau, Amount::Int(36000));
    assert_eq!(config.vat_dust, Amount::from("100"));

    let system = config.system_params()?;
    assert_eq!(system.global_line, rad(5_000_000));
    assert_eq!(system.par, Ray::one());
    assert_eq!(system.base, Ray::zero());
    assert_eq!(system.global_hole, rad(50_000_000));
    assert_eq!(system.sikka_supply_cap, wad(5_000_000));
    assert_eq!(system.multisig, multisig());

    let params = config.collateral_params()?;
    assert_eq!(params.ilk, cematic());
    assert_eq!(params.line, rad(5_000_000));
    assert_eq!(params.dust, rad(100));
    assert_eq!(params.mat, ray("1.5"));
    assert_eq!(params.duty, Ray::from_raw(U256::from_dec_str(DEFAULT_DUTY).expect("duty")));
    assert_eq!(params.chop, Wad::parse("1.1").expect("chop"));
    assert_eq!(params.hole, rad(50_000_000));
    assert_eq!(params.tau, 36000);
    assert_eq!(params.buf, ray("1.1"));
    assert_eq!(params.tail, 10800);
    assert_eq!(params.cusp, ray("0.6"));
    assert_eq!(params.chip, Wad::parse("0.0001").expect("chip"));
    assert_eq!(params.tip, rad(10));
    assert_eq!(params.stopped, 0);
    Ok(())
}

#[test]
fn test_network_config_round_trips() {
    let config = network_config();
    let json = config.to_json().expect("to json");
    assert!(json.contains("\"_vat_Line\""));
    // The chain id is not part of the model and is dropped.
    assert!(!json.contains("_chainId"));
    assert_eq!(NetworkConfig::from_json(&json).expect("from json"), config);
}

#[test]
fn test_network_config_rejects_bad_values() {
    let json = network_config_json().replace("\"_clip_stopped\": 0", "\"_clip_stopped\": 4");
    let config = NetworkConfig::from_json(&json).expect("parses");
    let err = config.collateral_params().expect_err("stopped above 3");
    assert!(matches!(err, ConfigError::InvalidAmount { key: "_clip_stopped", .. }));

    let json = network_config_json().replace("\"_vat_dust\": \"100\"", "\"_vat_dust\": \"lots\"");
    let config = NetworkConfig::from_json(&json).expect("parses");
    let err = config.collateral_params().expect_err("not a number");
    assert_eq!(err.to_string(), "Config/invalid-amount: _vat_dust = lots");

    let json = network_config_json().replace("ceMATIC", &"X".repeat(33));
    let config = NetworkConfig::from_json(&json).expect("parses");
    let err = config.collateral_params().expect_err("ilk too long");
    assert!(matches!(err, ConfigError::InvalidIlk(_)));

    let err = NetworkConfig::from_json("{ \"_ilk\": ").expect_err("truncated");
    assert!(matches!(err, ConfigError::Json(_)));
}

#[test]
fn test_network_config_load_from_file() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!("sikka_config_{}.json", std::process::id()));
    std::fs::write(&path, network_config_json())?;
    let loaded = NetworkConfig::load(&path)?;
    assert_eq!(loaded, network_config());
    std::fs::remove_file(&path)?;

    let err = NetworkConfig::load(&path).expect_err("file is gone");
    assert!(format!("{err:#}").contains("reading network config"));
    Ok(())
}

#[test]
fn test_deployment_wiring() {
    let d = Deployment::new();
    let ilk = d.ilk;
    let core = d.protocol.read();
    let addresses = core.addresses().clone();
    let ia = core.interaction.address();
    let collateral = core.collateral(&ilk).expect("collateral");

    for usr in [
        addresses.spot,
        addresses.sikka_join,
        addresses.jug,
        addresses.dog,
        ia,
        collateral.join.address(),
        collateral.clipper.address(),
    ] {
        assert!(core.vat.wards().is_ward(&usr), "{usr:?} should be a vat ward");
    }
    assert!(core.dog.wards().is_ward(&collateral.clipper.address()));
    assert!(collateral.clipper.wards().is_ward(&addresses.dog));
    assert!(core.sikka_join.wards().is_ward(&addresses.vow));

    assert_eq!(core.vat.ilk(&ilk).rate, Ray::one());
    assert_eq!(
        core.vat.ilk(&ilk).spot,
        Ray::from_raw(U256::from_dec_str("6666666666666666666666666666").expect("spot"))
    );
    assert_eq!(core.dog.ilk(&ilk).clip, collateral.clipper.address());
    assert_eq!(core.dog.vow(), addresses.vow);
    assert_eq!(core.vow.multisig(), multisig());
    assert_eq!(collateral.clipper.chost(), rad(110));
    assert_eq!(collateral.clipper.calc().address(), addresses.collateral(&ilk).expect("ilk").abacus);
    assert_eq!(
        core.jug.ilk(&ilk).expect("jug ilk").duty,
        Ray::from_raw(U256::from_dec_str(DEFAULT_DUTY).expect("duty"))
    );
    assert_eq!(core.sikka.supply_cap(), Some(wad(5_000_000)));
    assert_eq!(core.collateral_price(&ilk), Some(wad(10)));
}

/// The subset of the address book a front end reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientAddresses {
    interaction: Address,
    sikka_join: Address,
}

#[test]
fn test_deployed_addresses_json() -> anyhow::Result<()> {
    let d = Deployment::new();
    let addresses = d.protocol.addresses();
    assert_ne!(addresses.vat, addresses.dog);
    assert_eq!(addresses.deployer, deployer());

    let json = addresses.to_json()?;
    assert!(json.contains("\"sikkaJoin\""));
    assert!(json.contains("\"gemJoin\""));
    assert!(json.contains("ceMATIC"));
    let parsed = DeployedAddresses::from_json(&json)?;
    assert_eq!(parsed, addresses);
    assert!(parsed.collateral(&cematic()).is_some());

    let client: ClientAddresses = serde_json::from_str(&json)?;
    assert_eq!(client.interaction, addresses.interaction);
    assert_eq!(client.sikka_join, addresses.sikka_join);
    Ok(())
}

#[test]
fn test_deposit_borrow_payback_withdraw() {
    let d = Deployment::new();
    let ilk = d.ilk;
    let p = &d.protocol;
    d.fund(alice(), wad(150));

    assert_eq!(p.deposit(alice(), ilk, wad(100)).expect("deposit"), wad(100));
    assert_eq!(d.gem_balance(&alice()), wad(50));
    assert_eq!(p.locked(&ilk, &alice()), wad(100));
    assert_eq!(
        p.available_to_borrow(&ilk, &alice()).expect("available"),
        Wad::parse("666.666666666666666666").expect("wad")
    );
    assert_eq!(p.current_liquidation_price(&ilk, &alice()).expect("price"), Some(Wad::zero()));

    assert_eq!(p.borrow(alice(), ilk, wad(200)).expect("borrow"), wad(200));
    assert_eq!(d.sikka_balance(&alice()), wad(200));
    assert_eq!(p.borrowed(&ilk, &alice()).expect("borrowed"), wad(200));
    assert_eq!(p.current_liquidation_price(&ilk, &alice()).expect("price"), Some(wad(3)));

    assert_eq!(p.payback(alice(), ilk, wad(50)).expect("payback"), wad(150));
    assert_eq!(d.sikka_balance(&alice()), wad(150));

    assert_eq!(p.withdraw(alice(), ilk, wad(10)).expect("withdraw"), wad(90));
    assert_eq!(d.gem_balance(&alice()), wad(60));

    assert_eq!(p.payback(alice(), ilk, wad(150)).expect("payback"), Wad::zero());
    assert_eq!(p.withdraw(alice(), ilk, wad(90)).expect("withdraw"), Wad::zero());
    assert_eq!(d.gem_balance(&alice()), wad(150));
    assert_eq!(d.sikka_balance(&alice()), Wad::zero());
    assert_eq!(p.current_liquidation_price(&ilk, &alice()).expect("price"), None);
}

#[test]
fn test_failed_operations_change_nothing() {
    let d = Deployment::new();
    let ilk = d.ilk;
    let p = &d.protocol;
    d.fund(alice(), wad(100));
    p.deposit(alice(), ilk, wad(100)).expect("deposit");
    d.clock.advance(100);

    let err = p.borrow(alice(), ilk, wad(700)).expect_err("capacity is 666");
    assert!(matches!(err, ProtocolError::Vat(_)));
    assert_eq!(err.kind(), ErrorKind::Solvency);
    assert_eq!(d.sikka_balance(&alice()), Wad::zero());
    assert_eq!(p.borrowed(&ilk, &alice()).expect("borrowed"), Wad::zero());
    // The drip that ran before the failing step was rolled back as well.
    assert_eq!(p.read().jug.ilk(&ilk).expect("jug ilk").rho, T0);

    let err = p.borrow(alice(), ilk, wad(50)).expect_err("below dust");
    assert_eq!(err.to_string(), "Vat/dust");

    let err = p.withdraw(alice(), ilk, wad(101)).expect_err("only 100 locked");
    assert_eq!(err.kind(), ErrorKind::Arithmetic);
    assert_eq!(p.locked(&ilk, &alice()), wad(100));
    assert_eq!(d.gem_balance(&alice()), Wad::zero());

    let err = p.deposit(bob(), ilk, wad(1)).expect_err("bob holds nothing");
    assert!(matches!(err, ProtocolError::Token(_)));
    let core = p.read();
    assert!(!core.vat.can(&bob(), &core.interaction.address()));
}

#[test]
fn test_unknown_collateral_and_zero_amounts() {
    let d = Deployment::new();
    let p = &d.protocol;
    let nope = IlkId::new("NOPE").expect("ilk");

    let err = p.deposit(alice(), nope, wad(1)).expect_err("unknown");
    assert!(matches!(err, ProtocolError::UnknownIlk(ilk) if ilk == nope));
    assert_eq!(err.kind(), ErrorKind::Lifecycle);
    assert!(matches!(p.borrow(alice(), nope, wad(1)), Err(ProtocolError::UnknownIlk(_))));
    assert!(matches!(p.poke(nope), Err(ProtocolError::UnknownIlk(_))));
    assert!(matches!(
        p.start_auction(nope, alice(), keeper()),
        Err(ProtocolError::UnknownIlk(_))
    ));

    let err = p.deposit(alice(), d.ilk, Wad::zero()).expect_err("zero");
    assert!(matches!(err, ProtocolError::ZeroAmount));
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_collateral_administration() {
    let d = Deployment::new();
    let p = &d.protocol;
    let feed = Arc::new(SettableFeed::with_price(oracle(), wad(300)));

    let params = network_config().collateral_params().expect("params");
    let err = p
        .add_collateral(deployer(), params, feed.clone())
        .expect_err("already onboarded");
    assert!(matches!(err, ProtocolError::IlkExists(_)));

    let mut bnb = params;
    bnb.ilk = IlkId::new("ceBNB").expect("ilk");
    let err = p
        .add_collateral(alice(), bnb, feed.clone())
        .expect_err("alice is not a ward");
    assert!(matches!(err, ProtocolError::NotAuthorized));
    assert!(p.read().collateral(&bnb.ilk).is_err());

    p.add_collateral(deployer(), bnb, feed).expect("second collateral");
    assert_eq!(p.read().ilks().count(), 2);
    assert!(p.addresses().collateral(&bnb.ilk).is_some());
    assert_eq!(p.read().vat.ilk(&bnb.ilk).spot, ray("200"));

    let err = p
        .set_collateral_duty(alice(), bnb.ilk, ray("1.000000001"))
        .expect_err("not a ward");
    assert_eq!(err.kind(), ErrorKind::Authorization);
    p.set_collateral_duty(deployer(), bnb.ilk, ray("1.000000001"))
        .expect("duty");
    assert_eq!(
        p.read().jug.ilk(&bnb.ilk).expect("jug ilk").duty,
        ray("1.000000001")
    );
    let err = p
        .set_collateral_duty(deployer(), bnb.ilk, ray("0.9"))
        .expect_err("below one");
    assert_eq!(err.kind(), ErrorKind::Config);

    let events = p.take_events();
    assert!(events
        .iter()
        .any(|event| matches!(event, ProtocolEvent::Poke(poke) if poke.ilk == bnb.ilk)));
    assert!(p.take_events().is_empty());
}

#[test]
fn test_fees_accrue_over_time() {
    let d = Deployment::new();
    let ilk = d.ilk;
    let p = &d.protocol;
    let vow = p.addresses().vow;
    d.fund(alice(), wad(100));
    p.deposit(alice(), ilk, wad(100)).expect("deposit");
    p.borrow(alice(), ilk, wad(200)).expect("borrow");

    d.clock.advance(365 * 24 * 3600);
    let rate = p.drip(ilk).expect("drip");
    assert!(rate > ray("1.0199") && rate < ray("1.0201"));
    let owed = p.borrowed(&ilk, &alice()).expect("borrowed");
    assert!(owed > wad(203) && owed < wad(205));
    let surplus = p.read().vat.sikka(&vow);
    assert!(surplus > rad(3) && surplus < rad(5));

    // Repaid sikka buys back less normalised debt than before.
    let art = p.payback(alice(), ilk, wad(50)).expect("payback");
    assert!(art > wad(150) && art < wad(151));
}

#[test]
fn test_auction_through_the_interaction() {
    let d = Deployment::new();
    let ilk = d.ilk;
    let p = &d.protocol;
    let vow = p.addresses().vow;
    d.fund(alice(), wad(100));
    d.fund(bob(), wad(1000));
    p.deposit(alice(), ilk, wad(100)).expect("deposit");
    p.borrow(alice(), ilk, wad(600)).expect("borrow");
    p.deposit(bob(), ilk, wad(1000)).expect("deposit");
    p.borrow(bob(), ilk, wad(700)).expect("borrow");

    let err = p.start_auction(ilk, alice(), keeper()).expect_err("still safe");
    assert_eq!(err.kind(), ErrorKind::Solvency);

    d.set_price(wad(8));
    assert_eq!(p.unsafe_urns(), vec![(ilk, alice())]);
    let id = p.start_auction(ilk, alice(), keeper()).expect("bark");
    assert_eq!(id, 1);
    let coin = Rad::parse("10.066").expect("coin");
    assert_eq!(p.read().vat.sikka(&keeper()), coin);
    assert_eq!(p.read().vat.sin(&vow), rad(600).checked_add(coin).expect("sin"));
    assert!(p.unsafe_urns().is_empty());

    let status = p.read().auction_status(&ilk, id, T0).expect("status").expect("sale");
    assert_eq!(status.price, ray("8.8"));
    assert_eq!(status.tab, rad(660));
    assert_eq!(status.lot, wad(100));

    let err = p
        .buy_from_auction(bob(), ilk, id, wad(50), ray("8.7"), bob())
        .expect_err("price is 8.8");
    assert!(matches!(err, ProtocolError::Clipper(_)));
    assert_eq!(d.sikka_balance(&bob()), wad(700));

    let outcome = p
        .buy_from_auction(bob(), ilk, id, wad(50), ray("8.8"), bob())
        .expect("buy");
    assert_eq!(outcome.slice, wad(50));
    assert_eq!(outcome.owe, rad(440));
    assert_eq!(d.gem_balance(&bob()), wad(50));
    assert_eq!(d.sikka_balance(&bob()), wad(260));
    assert_eq!(p.read().vat.sikka(&vow), rad(440));

    let err = p.reset_auction(ilk, id, keeper()).expect_err("fresh sale");
    assert_eq!(err.kind(), ErrorKind::AuctionState);

    d.clock.advance(10_801);
    let status = p
        .read()
        .auction_status(&ilk, id, p.now())
        .expect("status")
        .expect("sale");
    assert!(status.needs_redo);
    p.reset_auction(ilk, id, keeper()).expect("redo");
    let status = p
        .read()
        .auction_status(&ilk, id, p.now())
        .expect("status")
        .expect("sale");
    assert!(!status.needs_redo);
    assert_eq!(status.price, ray("8.8"));
    assert_eq!(status.tab, rad(220));
}

#[test]
fn test_concurrent_readers_see_committed_state() {
    let d = Deployment::new();
    let ilk = d.ilk;
    let p = d.protocol.clone();
    d.fund(alice(), wad(1000));

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let reader = p.clone();
            scope.spawn(move || {
                for _ in 0..200 {
                    let locked = reader.locked(&ilk, &alice());
                    // Deposits land whole, ten at a time.
                    assert_eq!(locked.raw() % wad(10).raw(), U256::zero());
                    assert!(locked <= wad(1000));
                }
            });
        }
        let writer = p.clone();
        scope.spawn(move || {
            for _ in 0..100 {
                writer.deposit(alice(), ilk, wad(10)).expect("deposit");
            }
        });
    });

    assert_eq!(p.locked(&ilk, &alice()), wad(1000));
    assert_eq!(d.gem_balance(&alice()), Wad::zero());
}

#[test]
fn test_payback_beyond_the_debt_pulls_only_what_is_owed() {
    let d = Deployment::new();
    let ilk = d.ilk;
    let p = &d.protocol;
    d.fund(alice(), wad(100));
    d.fund(bob(), wad(100));
    p.deposit(alice(), ilk, wad(100)).expect("deposit");
    p.borrow(alice(), ilk, wad(200)).expect("borrow");
    p.deposit(bob(), ilk, wad(100)).expect("deposit");
    p.borrow(bob(), ilk, wad(300)).expect("borrow");
    p.write()
        .sikka
        .transfer(bob(), alice(), wad(100))
        .expect("transfer");

    d.clock.advance(24 * 3600);
    assert_eq!(p.payback(alice(), ilk, wad(300)).expect("payback"), Wad::zero());

    let left = d.sikka_balance(&alice());
    assert!(left > wad(99) && left < wad(100));
    assert!(p.read().vat.sikka(&alice()).to_wad().is_zero());
    assert_eq!(p.withdraw(alice(), ilk, wad(100)).expect("withdraw"), Wad::zero());

    // Nothing owed, nothing pulled.
    assert_eq!(p.payback(alice(), ilk, wad(10)).expect("payback"), Wad::zero());
    assert_eq!(d.sikka_balance(&alice()), left);
}

#[test]
fn test_auction_refund_is_limited_to_the_bid() {
    let d = Deployment::new();
    let ilk = d.ilk;
    let p = &d.protocol;
    d.fund(alice(), wad(100));
    d.fund(bob(), wad(1000));
    p.deposit(alice(), ilk, wad(100)).expect("deposit");
    p.borrow(alice(), ilk, wad(600)).expect("borrow");
    p.deposit(bob(), ilk, wad(1000)).expect("deposit");
    p.borrow(bob(), ilk, wad(700)).expect("borrow");
    d.set_price(wad(8));
    let id = p.start_auction(ilk, alice(), keeper()).expect("bark");

    // Sikka already held by the Interaction from earlier bids.
    let ia = p.addresses().interaction;
    {
        let mut core = p.write();
        let vow = core.vow.address();
        core.vat.suck(deployer(), vow, ia, rad(3)).expect("suck");
    }

    let outcome = p
        .buy_from_auction(bob(), ilk, id, wad(50), ray("9"), bob())
        .expect("buy");
    assert_eq!(outcome.owe, rad(440));
    assert_eq!(d.sikka_balance(&bob()), wad(260));
    assert_eq!(p.read().vat.sikka(&ia), rad(3));
}

#[test]
fn test_drip_reads_the_clock_under_the_lock() {
    let d = Deployment::new();
    let ilk = d.ilk;
    let p = &d.protocol;

    let mut guard = p.write();
    std::thread::scope(|scope| {
        let waiting = scope.spawn(|| p.drip(ilk));
        std::thread::sleep(std::time::Duration::from_millis(50));

        // Another writer accrues at a later time first.
        d.clock.advance(10);
        guard.drip(T0 + 10, ilk).expect("drip under the lock");
        drop(guard);

        let rate = waiting.join().expect("drip thread").expect("drip after wait");
        assert_eq!(rate, p.read().vat.ilk(&ilk).rate);
    });
    assert_eq!(p.read().jug.ilk(&ilk).expect("jug ilk").rho, T0 + 10);
}
