#![cfg(test)]

// Engine behaviour is covered by the integration tests under tests/.

use ledger_engine::{Rad, Ray, Wad};

#[test]
fn smoke_test() {
    assert_eq!(Wad::one().to_rad().expect("rad"), Rad::one());
}

#[test]
fn test_unit_scales() {
    let half = Ray::parse("0.5").expect("ray literal");
    assert_eq!(Wad::units(10).mul_ray(half).expect("mul"), Rad::units(5));
}
