//! Deployment parameters, read from a per-network JSON file that uses the
//! deployment script's key names, and the address book of what was deployed.
//!
//! Amounts come either as JSON numbers or as decimal strings. Keys ending in
//! a unit (`_vat_Line`, `_dog_hole`, `_clip_tip`, `_spot_par`,
//! `_sikka_supply_cap`) are whole units and get scaled; `_dog_chop`,
//! `_clip_buf`, `_clip_cusp`, `_clip_chip`, `_mat`, `_jug_base` and
//! `_jug_duty` are already raw fixed-point integers; `_clip_tail` and
//! `_abacus_tau` are seconds.

use anyhow::Context;
use ledger_engine::{Address, IlkId, InvalidIlkId, Rad, Ray, Wad, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// 2% per year, the duty the deployment sets for its first collateral.
pub const DEFAULT_DUTY: &str = "1000000000627937192491029810";
pub const DEFAULT_ILK: &str = "ceMATIC";
pub const DEFAULT_SUPPLY_CAP: &str = "5000000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config/invalid-amount: {key} = {value}")]
    InvalidAmount { key: &'static str, value: String },
    #[error("Config/invalid-ilk: {0}")]
    InvalidIlk(#[from] InvalidIlkId),
    #[error("Config/invalid-json: {0}")]
    Json(#[from] serde_json::Error),
}

/// A number as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Int(u64),
    Text(String),
}

impl Amount {
    fn literal(&self) -> String {
        match self {
            Amount::Int(n) => n.to_string(),
            Amount::Text(s) => s.trim().to_string(),
        }
    }

    fn invalid(&self, key: &'static str) -> ConfigError {
        ConfigError::InvalidAmount {
            key,
            value: self.literal(),
        }
    }

    /// An integer taken as is.
    fn raw(&self, key: &'static str) -> Result<U256, ConfigError> {
        U256::from_dec_str(&self.literal()).map_err(|_| self.invalid(key))
    }

    fn seconds(&self, key: &'static str) -> Result<u64, ConfigError> {
        let raw = self.raw(key)?;
        if raw > U256::from(u64::MAX) {
            return Err(self.invalid(key));
        }
        Ok(raw.low_u64())
    }

    fn wad(&self, key: &'static str) -> Result<Wad, ConfigError> {
        Wad::parse(&self.literal()).map_err(|_| self.invalid(key))
    }

    fn ray(&self, key: &'static str) -> Result<Ray, ConfigError> {
        Ray::parse(&self.literal()).map_err(|_| self.invalid(key))
    }

    fn rad(&self, key: &'static str) -> Result<Rad, ConfigError> {
        Rad::parse(&self.literal()).map_err(|_| self.invalid(key))
    }
}

impl From<u64> for Amount {
    fn from(n: u64) -> Self {
        Amount::Int(n)
    }
}

impl From<&str> for Amount {
    fn from(s: &str) -> Self {
        Amount::Text(s.to_string())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal())
    }
}

fn default_ilk() -> String {
    DEFAULT_ILK.to_string()
}

fn default_duty() -> Amount {
    Amount::from(DEFAULT_DUTY)
}

fn default_supply_cap() -> Amount {
    Amount::from(DEFAULT_SUPPLY_CAP)
}

/// Network configuration as stored in `<network>_config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(rename = "_ilk", default = "default_ilk")]
    pub ilk: String,
    #[serde(rename = "_vat_Line")]
    pub vat_global_line: Amount,
    #[serde(rename = "_vat_line")]
    pub vat_line: Amount,
    /// Whole sikka, scaled to rad like the other debt limits. The deploy
    /// script appends only ray decimals here, which would make the floor a
    /// fraction of a unit.
    #[serde(rename = "_vat_dust")]
    pub vat_dust: Amount,
    #[serde(rename = "_spot_par")]
    pub spot_par: Amount,
    #[serde(rename = "_mat")]
    pub mat: Amount,
    #[serde(rename = "_jug_base", default, skip_serializing_if = "Option::is_none")]
    pub jug_base: Option<Amount>,
    #[serde(rename = "_jug_duty", default = "default_duty")]
    pub jug_duty: Amount,
    #[serde(rename = "_dog_Hole")]
    pub dog_global_hole: Amount,
    #[serde(rename = "_dog_hole")]
    pub dog_hole: Amount,
    #[serde(rename = "_dog_chop")]
    pub dog_chop: Amount,
    #[serde(rename = "_abacus_tau")]
    pub abacus_tau: Amount,
    #[serde(rename = "_clip_buf")]
    pub clip_buf: Amount,
    #[serde(rename = "_clip_tail")]
    pub clip_tail: Amount,
    #[serde(rename = "_clip_cusp")]
    pub clip_cusp: Amount,
    #[serde(rename = "_clip_chip")]
    pub clip_chip: Amount,
    #[serde(rename = "_clip_tip")]
    pub clip_tip: Amount,
    #[serde(rename = "_clip_stopped")]
    pub clip_stopped: Amount,
    #[serde(rename = "_sikka_supply_cap", default = "default_supply_cap")]
    pub sikka_supply_cap: Amount,
    #[serde(rename = "_multisig")]
    pub multisig: Address,
}

impl NetworkConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading network config {}", path.display()))?;
        let config = Self::from_json(&json)
            .with_context(|| format!("parsing network config {}", path.display()))?;
        // Amounts are validated up front.
        config.system_params()?;
        config.collateral_params()?;
        log::info!("✅ Network config loaded from {}", path.display());
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn system_params(&self) -> Result<SystemParams, ConfigError> {
        Ok(SystemParams {
            global_line: self.vat_global_line.rad("_vat_Line")?,
            par: self.spot_par.ray("_spot_par")?,
            base: match &self.jug_base {
                Some(base) => Ray(base.raw("_jug_base")?),
                None => Ray::zero(),
            },
            global_hole: self.dog_global_hole.rad("_dog_Hole")?,
            sikka_supply_cap: self.sikka_supply_cap.wad("_sikka_supply_cap")?,
            multisig: self.multisig,
        })
    }

    pub fn collateral_params(&self) -> Result<CollateralParams, ConfigError> {
        let stopped = self.clip_stopped.raw("_clip_stopped")?;
        if stopped > U256::from(3u8) {
            return Err(self.clip_stopped.invalid("_clip_stopped"));
        }
        Ok(CollateralParams {
            ilk: IlkId::new(&self.ilk)?,
            line: self.vat_line.rad("_vat_line")?,
            dust: self.vat_dust.rad("_vat_dust")?,
            mat: Ray(self.mat.raw("_mat")?),
            duty: Ray(self.jug_duty.raw("_jug_duty")?),
            chop: Wad(self.dog_chop.raw("_dog_chop")?),
            hole: self.dog_hole.rad("_dog_hole")?,
            tau: self.abacus_tau.seconds("_abacus_tau")?,
            buf: Ray(self.clip_buf.raw("_clip_buf")?),
            tail: self.clip_tail.seconds("_clip_tail")?,
            cusp: Ray(self.clip_cusp.raw("_clip_cusp")?),
            chip: Wad(self.clip_chip.raw("_clip_chip")?),
            tip: self.clip_tip.rad("_clip_tip")?,
            stopped: stopped.low_u32() as u8,
        })
    }
}

/// System-wide parameters, scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemParams {
    pub global_line: Rad,
    pub par: Ray,
    pub base: Ray,
    pub global_hole: Rad,
    pub sikka_supply_cap: Wad,
    pub multisig: Address,
}

/// Everything needed to onboard one collateral type, scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollateralParams {
    pub ilk: IlkId,
    pub line: Rad,
    pub dust: Rad,
    pub mat: Ray,
    pub duty: Ray,
    pub chop: Wad,
    pub hole: Rad,
    pub tau: u64,
    pub buf: Ray,
    pub tail: u64,
    pub cusp: Ray,
    pub chip: Wad,
    pub tip: Rad,
    pub stopped: u8,
}

/// Addresses of one collateral type's contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralAddresses {
    pub gem: Address,
    #[serde(rename = "gemJoin")]
    pub gem_join: Address,
    pub clip: Address,
    pub abacus: Address,
}

/// Address book of a deployment, written out like the deployment script's
/// `addresses.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedAddresses {
    pub deployer: Address,
    pub vat: Address,
    pub spot: Address,
    pub sikka: Address,
    #[serde(rename = "sikkaJoin")]
    pub sikka_join: Address,
    pub jug: Address,
    pub vow: Address,
    pub dog: Address,
    pub interaction: Address,
    pub multisig: Address,
    pub collaterals: BTreeMap<IlkId, CollateralAddresses>,
}

impl DeployedAddresses {
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn collateral(&self, ilk: &IlkId) -> Option<&CollateralAddresses> {
        self.collaterals.get(ilk)
    }
}
