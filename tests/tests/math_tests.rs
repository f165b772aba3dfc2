use ledger_engine::math::{self, ray_unit, wad_unit};
use ledger_engine::{Classify, ErrorKind, IlkId, MathError, Rad, Ray, SignedRad, Wad, U256};
use rand::Rng;

#[test]
fn test_parse_and_display() {
    assert_eq!(Wad::parse("1.5").expect("wad"), Wad::from_raw(1_500_000_000_000_000_000u64));
    assert_eq!(Ray::parse("0.000000001").expect("ray").raw(), U256::exp10(18));
    assert_eq!(Rad::parse("10").expect("rad"), Rad::units(10));
    assert_eq!(Wad::parse(".25").expect("wad").to_string(), "0.25");
    assert_eq!(Ray::units(3).to_string(), "3");

    assert_eq!(Wad::parse("abc"), Err(MathError::InvalidLiteral));
    assert_eq!(Wad::parse("1.0000000000000000001"), Err(MathError::InvalidLiteral));
    assert_eq!(Wad::parse("-1"), Err(MathError::InvalidLiteral));
    assert_eq!(Wad::parse(""), Err(MathError::InvalidLiteral));
}

#[test]
fn test_scale_conversions() {
    let one = Wad::one();
    assert_eq!(one.to_rad().expect("rad"), Rad::one());
    assert_eq!(one.to_ray().expect("ray"), Ray::one());
    assert_eq!(Rad::units(7).to_wad(), Wad::units(7));
    assert_eq!(Ray::parse("2.5").expect("ray").to_wad(), Wad::parse("2.5").expect("wad"));

    // rad = wad * ray
    let tab = Wad::units(3).mul_ray(Ray::parse("1.1").expect("ray")).expect("mul");
    assert_eq!(tab, Rad::parse("3.3").expect("rad"));
    assert_eq!(tab.div_wad(Wad::units(3)).expect("div"), Ray::parse("1.1").expect("ray"));
    assert_eq!(tab.div_ray(Ray::parse("1.1").expect("ray")).expect("div"), Wad::units(3));
}

#[test]
fn test_rmul_rdiv_round_down() {
    let third = Ray::one().rdiv(Ray::units(3)).expect("rdiv");
    assert_eq!(third.raw(), U256::from_dec_str("333333333333333333333333333").expect("dec"));
    assert_eq!(
        third.rmul(Ray::units(3)).expect("rmul").raw(),
        U256::from_dec_str("999999999999999999999999999").expect("dec")
    );
    assert_eq!(math::rmul(U256::one(), U256::one()).expect("rmul"), U256::zero());
    assert_eq!(math::rdiv(U256::one(), U256::zero()), Err(MathError::DivisionByZero));
}

#[test]
fn test_wmul_wdiv() {
    let half = Wad::parse("0.5").expect("wad");
    assert_eq!(Wad::units(3).wmul(half).expect("wmul"), Wad::parse("1.5").expect("wad"));
    assert_eq!(Wad::units(3).wdiv(half).expect("wdiv"), Wad::units(6));
    assert_eq!(
        Rad::units(50).wmul(Wad::parse("1.1").expect("chop")).expect("wmul"),
        Rad::units(55)
    );
    assert_eq!(math::wdiv(wad_unit(), U256::zero()), Err(MathError::DivisionByZero));
}

#[test]
fn test_rpow() {
    let five_percent = Ray::parse("1.05").expect("ray");
    assert_eq!(five_percent.rpow(0).expect("rpow"), Ray::one());
    assert_eq!(five_percent.rpow(1).expect("rpow"), five_percent);
    assert_eq!(five_percent.rpow(2).expect("rpow"), Ray::parse("1.1025").expect("ray"));
    assert_eq!(five_percent.rpow(3).expect("rpow"), Ray::parse("1.157625").expect("ray"));
    assert_eq!(math::rpow(U256::zero(), 0, ray_unit()).expect("rpow"), ray_unit());
    assert_eq!(math::rpow(U256::zero(), 5, ray_unit()).expect("rpow"), U256::zero());

    // 2% a year compounded per second stays within a basis point of 1.02.
    let duty = Ray::from_raw(U256::from_dec_str("1000000000627937192491029810").expect("dec"));
    let year = duty.rpow(365 * 24 * 3600).expect("rpow");
    assert!(year > Ray::parse("1.0199").expect("ray"));
    assert!(year < Ray::parse("1.0201").expect("ray"));
}

#[test]
fn test_checked_arithmetic_errors() {
    let err = Wad::from_raw(U256::MAX).checked_add(Wad::from_raw(1u8)).expect_err("overflow");
    assert_eq!(err, MathError::Overflow);
    assert_eq!(err.kind(), ErrorKind::Arithmetic);
    assert_eq!(Wad::zero().checked_sub(Wad::one()), Err(MathError::Underflow));
    assert_eq!(Wad::zero().saturating_sub(Wad::one()), Wad::zero());
    assert_eq!(Wad::from_raw(U256::MAX).to_i128(), Err(MathError::Overflow));
    assert_eq!(math::neg(i128::MIN), Err(MathError::Overflow));
    assert_eq!(math::signed_diff(U256::from(3u8), U256::from(5u8)), Ok(-2));
}

#[test]
fn test_signed_deltas() {
    assert_eq!(Wad::units(5).add_signed(-(3 * 10i128.pow(18))).expect("add"), Wad::units(2));
    assert!(Wad::units(1).add_signed(-(2 * 10i128.pow(18))).is_err());

    let wipe = SignedRad::product(-(2 * 10i128.pow(18)), ray_unit()).expect("product");
    assert!(!wipe.is_positive());
    assert_eq!(wipe.add_to(Rad::units(5)).expect("add"), Rad::units(3));
    assert_eq!(wipe.sub_from(Rad::units(5)).expect("sub"), Rad::units(7));
}

#[test]
fn test_ilk_ids() {
    let ilk = IlkId::new("ceMATIC").expect("ilk");
    assert_eq!(ilk.name(), "ceMATIC");
    assert_eq!(ilk.to_string(), "ceMATIC");
    assert!(IlkId::new(&"X".repeat(33)).is_err());
    let full = IlkId::new(&"X".repeat(32)).expect("a full bytes32 label");
    assert_eq!(full.name(), "X".repeat(32));

    let json = serde_json::to_string(&ilk).expect("serialize");
    assert_eq!(json, "\"ceMATIC\"");
    let back: IlkId = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, ilk);
}

#[test]
fn test_random_rmul_identities() {
    let mut rng = rand::thread_rng();
    for _ in 0..256 {
        let x = Ray::from_raw(rng.gen::<u128>());
        assert_eq!(x.rmul(Ray::one()).expect("rmul"), x);
        assert_eq!(x.rdiv(Ray::one()).expect("rdiv"), x);

        let w = Wad::from_raw(rng.gen::<u64>());
        assert_eq!(w.wmul(Wad::one()).expect("wmul"), w);
        assert_eq!(w.to_rad().expect("rad").to_wad(), w);

        // rmul never rounds up.
        let y = Ray::from_raw(rng.gen_range(1..u64::MAX));
        let product = x.rmul(y).expect("rmul");
        assert!(product.raw() * ray_unit() <= x.raw() * y.raw());
    }
}
