use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The set of addresses allowed to call a component's privileged operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wards(BTreeSet<Address>);

impl Wards {
    /// A ward set whose only member is the deployer.
    pub fn with(deployer: Address) -> Self {
        let mut wards = BTreeSet::new();
        wards.insert(deployer);
        Self(wards)
    }

    pub fn is_ward(&self, usr: &Address) -> bool {
        self.0.contains(usr)
    }

    pub fn rely(&mut self, usr: Address) {
        self.0.insert(usr);
    }

    pub fn deny(&mut self, usr: &Address) {
        self.0.remove(usr);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Returns early with the given error unless the condition holds.
#[macro_export]
macro_rules! require {
    ($cond:expr, $err:expr $(,)?) => {
        if !($cond) {
            return Err($err.into());
        }
    };
}
