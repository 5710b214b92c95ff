// src/traits.rs
//
// Collaborator boundaries. The engine orchestrates these but never reaches
// into their internals; failures propagate as `CallError` and abort the
// whole operation.

use crate::error::CallError;
use crate::types::{Address, U256};

/// The issued token. Minted and burned only by the engine under normal
/// operation; out-of-band minting is what the supply guard detects.
pub trait BondingToken {
    fn mint(&mut self, to: Address, amount: U256) -> Result<(), CallError>;

    fn burn(&mut self, from: Address, amount: U256) -> Result<(), CallError>;

    fn total_supply(&self) -> U256;

    fn balance_of(&self, account: Address) -> U256;
}

/// External custodian of real collateral. May invest deposits; the engine
/// only relies on `balance_of` for its own account.
pub trait Vault {
    fn deposit(&mut self, token: Address, amount: U256, from: Address) -> Result<(), CallError>;

    fn withdraw(&mut self, token: Address, amount: U256, to: Address) -> Result<(), CallError>;

    fn balance_of(&self, token: Address, account: Address) -> U256;
}

/// The collateral token's allowance surface. Only the plumbing the engine
/// needs: a one-time vault approval and the permit pass-through.
pub trait CollateralToken {
    /// Signature-based allowance grant. Implementations validate the
    /// signature and deadline themselves.
    fn permit(
        &mut self,
        owner: Address,
        spender: Address,
        value: U256,
        deadline: u64,
        signature: &[u8],
    ) -> Result<(), CallError>;

    fn allowance(&self, owner: Address, spender: Address) -> U256;

    fn approve(&mut self, owner: Address, spender: Address, value: U256) -> Result<(), CallError>;
}

/// Optional policy hook invoked after state commit. A hook error vetoes the
/// operation and rolls it back.
pub trait TradeHook {
    fn on_buy(&mut self, caller: Address, input_amount: U256, bonding_out: U256)
        -> Result<(), CallError>;

    fn on_sell(
        &mut self,
        caller: Address,
        bonding_amount: U256,
        input_out: U256,
    ) -> Result<(), CallError>;
}
