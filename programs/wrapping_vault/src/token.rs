use ledger_engine::{require, Address, Classify, ErrorKind, MathError, Wad, Wards, U256};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Token/not-authorized")]
    NotAuthorized,
    #[error("Token/insufficient-balance")]
    InsufficientBalance,
    #[error("Token/insufficient-allowance")]
    InsufficientAllowance,
    #[error("Token/cap-reached")]
    CapReached,
    #[error("Token/more-supply-than-cap")]
    MoreSupplyThanCap,
    #[error(transparent)]
    Math(#[from] MathError),
}

impl Classify for TokenError {
    fn kind(&self) -> ErrorKind {
        match self {
            TokenError::NotAuthorized | TokenError::InsufficientAllowance => {
                ErrorKind::Authorization
            }
            TokenError::InsufficientBalance | TokenError::CapReached => ErrorKind::Solvency,
            TokenError::MoreSupplyThanCap => ErrorKind::Config,
            TokenError::Math(e) => e.kind(),
        }
    }
}

/// Balance changes computed by a transfer, not yet written.
struct Transfer {
    src: Address,
    dst: Address,
    src_balance: Wad,
    dst_balance: Wad,
    allowance: Option<Wad>,
}

/// External ERC-20 style ledger for the stablecoin and collateral tokens.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    address: Address,
    symbol: String,
    wards: Wards,
    balances: BTreeMap<Address, Wad>,
    allowances: BTreeMap<Address, BTreeMap<Address, Wad>>,
    total_supply: Wad,
    supply_cap: Option<Wad>,
}

impl Token {
    pub fn new(address: Address, deployer: Address, symbol: &str) -> Self {
        log::info!("✅ Token {symbol} deployed at {address:?}");
        Self {
            address,
            symbol: symbol.to_string(),
            wards: Wards::with(deployer),
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
            total_supply: Wad::zero(),
            supply_cap: None,
        }
    }

    /// Allowance value that is never decremented.
    pub fn unlimited() -> Wad {
        Wad(U256::MAX)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn wards(&self) -> &Wards {
        &self.wards
    }

    pub fn total_supply(&self) -> Wad {
        self.total_supply
    }

    pub fn supply_cap(&self) -> Option<Wad> {
        self.supply_cap
    }

    pub fn balance_of(&self, usr: &Address) -> Wad {
        self.balances.get(usr).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Wad {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or_default()
    }

    fn auth(&self, caller: &Address) -> Result<(), TokenError> {
        require!(self.wards.is_ward(caller), TokenError::NotAuthorized);
        Ok(())
    }

    pub fn rely(&mut self, caller: Address, usr: Address) -> Result<(), TokenError> {
        self.auth(&caller)?;
        self.wards.rely(usr);
        Ok(())
    }

    pub fn deny(&mut self, caller: Address, usr: Address) -> Result<(), TokenError> {
        self.auth(&caller)?;
        self.wards.deny(&usr);
        Ok(())
    }

    pub fn set_supply_cap(&mut self, caller: Address, cap: Wad) -> Result<(), TokenError> {
        self.auth(&caller)?;
        require!(cap >= self.total_supply, TokenError::MoreSupplyThanCap);
        self.supply_cap = Some(cap);
        log::debug!("{} supply cap set to {cap}", self.symbol);
        Ok(())
    }

    pub fn approve(&mut self, caller: Address, spender: Address, wad: Wad) {
        self.allowances.entry(caller).or_default().insert(spender, wad);
    }

    /// Allowance left after `spender` uses `wad` of `owner`'s balance, or
    /// `None` when no allowance applies.
    fn spend_allowance(
        &self,
        spender: &Address,
        owner: &Address,
        wad: Wad,
    ) -> Result<Option<Wad>, TokenError> {
        if spender == owner {
            return Ok(None);
        }
        let allowed = self.allowance(owner, spender);
        if allowed == Self::unlimited() {
            return Ok(None);
        }
        require!(allowed >= wad, TokenError::InsufficientAllowance);
        Ok(Some(allowed.checked_sub(wad)?))
    }

    fn plan_transfer(
        &self,
        caller: Address,
        src: Address,
        dst: Address,
        wad: Wad,
    ) -> Result<Transfer, TokenError> {
        let src_balance = self.balance_of(&src);
        require!(src_balance >= wad, TokenError::InsufficientBalance);
        let allowance = self.spend_allowance(&caller, &src, wad)?;
        let src_balance = src_balance.checked_sub(wad)?;
        let dst_balance = (if src == dst { src_balance } else { self.balance_of(&dst) })
            .checked_add(wad)?;
        Ok(Transfer {
            src,
            dst,
            src_balance,
            dst_balance,
            allowance,
        })
    }

    /// Fails exactly when `transfer_from` with the same arguments would.
    pub fn ensure_transfer_from(
        &self,
        caller: Address,
        src: Address,
        dst: Address,
        wad: Wad,
    ) -> Result<(), TokenError> {
        self.plan_transfer(caller, src, dst, wad).map(|_| ())
    }

    pub fn transfer_from(
        &mut self,
        caller: Address,
        src: Address,
        dst: Address,
        wad: Wad,
    ) -> Result<(), TokenError> {
        let plan = self.plan_transfer(caller, src, dst, wad)?;
        if let Some(allowance) = plan.allowance {
            self.approve(plan.src, caller, allowance);
        }
        self.balances.insert(plan.src, plan.src_balance);
        self.balances.insert(plan.dst, plan.dst_balance);
        Ok(())
    }

    pub fn transfer(&mut self, caller: Address, dst: Address, wad: Wad) -> Result<(), TokenError> {
        self.transfer_from(caller, caller, dst, wad)
    }

    fn plan_mint(&self, caller: &Address, usr: &Address, wad: Wad) -> Result<(Wad, Wad), TokenError> {
        self.auth(caller)?;
        let supply = self.total_supply.checked_add(wad)?;
        if let Some(cap) = self.supply_cap {
            require!(supply <= cap, TokenError::CapReached);
        }
        Ok((self.balance_of(usr).checked_add(wad)?, supply))
    }

    pub fn ensure_mint(&self, caller: Address, usr: Address, wad: Wad) -> Result<(), TokenError> {
        self.plan_mint(&caller, &usr, wad).map(|_| ())
    }

    pub fn mint(&mut self, caller: Address, usr: Address, wad: Wad) -> Result<(), TokenError> {
        let (balance, supply) = self.plan_mint(&caller, &usr, wad)?;
        self.balances.insert(usr, balance);
        self.total_supply = supply;
        log::debug!("{} mint {wad} to {usr:?}", self.symbol);
        Ok(())
    }

    fn plan_burn(
        &self,
        caller: &Address,
        from: &Address,
        wad: Wad,
    ) -> Result<(Wad, Option<Wad>, Wad), TokenError> {
        let balance = self.balance_of(from);
        require!(balance >= wad, TokenError::InsufficientBalance);
        let allowance = self.spend_allowance(caller, from, wad)?;
        Ok((
            balance.checked_sub(wad)?,
            allowance,
            self.total_supply.checked_sub(wad)?,
        ))
    }

    pub fn ensure_burn(&self, caller: Address, from: Address, wad: Wad) -> Result<(), TokenError> {
        self.plan_burn(&caller, &from, wad).map(|_| ())
    }

    /// Destroys `wad` of `from`'s balance. Burning someone else's tokens
    /// consumes the caller's allowance.
    pub fn burn(&mut self, caller: Address, from: Address, wad: Wad) -> Result<(), TokenError> {
        let (balance, allowance, supply) = self.plan_burn(&caller, &from, wad)?;
        if let Some(allowance) = allowance {
            self.approve(from, caller, allowance);
        }
        self.balances.insert(from, balance);
        self.total_supply = supply;
        log::debug!("{} burn {wad} from {from:?}", self.symbol);
        Ok(())
    }
}
