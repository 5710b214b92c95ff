// src/engine.rs

use tracing::{debug, info, warn};

use crate::curve::{self, CurveShape, VirtualPair};
use crate::error::{EngineError, EngineResult};
use crate::events::{Event, EventSink};
use crate::traits::{BondingToken, CollateralToken, TradeHook, Vault};
use crate::types::{Address, U256, MAX_BPS};

/// The bootstrap market maker. Owns the only mutation path into the virtual
/// pair; collaborators (vault, bonding token, collateral token, hook) are
/// injected and called synchronously.
///
/// Every public entry point either commits all of its state changes or none
/// of them: the pair and supply shadow are snapshotted before effects and
/// restored on any downstream failure. The hosting environment is assumed to
/// discard collaborator side effects of an aborted operation (transactional
/// execution); the engine's own state never needs that assumption.
pub struct Engine {
    owner: Address,
    /// The engine's account id at the vault and collateral token.
    address: Address,
    /// Collateral token id handed to the vault on deposit/withdraw.
    collateral: Address,
    vault_address: Address,

    shape: Option<CurveShape>,
    pair: VirtualPair,
    /// Supply of the bonding token as last observed by the engine. Diverging
    /// upward from the live supply marks out-of-band minting.
    last_known_supply: U256,

    withdrawal_fee_bps: u16,
    locked: bool,
    auto_lock: bool,
    vault_approval_initialized: bool,
    /// In-flight latch; rejects nested re-entry into add/remove.
    entered: bool,

    vault: Box<dyn Vault>,
    token: Box<dyn BondingToken>,
    collateral_token: Box<dyn CollateralToken>,
    hook: Option<Box<dyn TradeHook>>,
    sink: Box<dyn EventSink>,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner: Address,
        address: Address,
        collateral: Address,
        vault_address: Address,
        vault: Box<dyn Vault>,
        token: Box<dyn BondingToken>,
        collateral_token: Box<dyn CollateralToken>,
        sink: Box<dyn EventSink>,
    ) -> Self {
        Self {
            owner,
            address,
            collateral,
            vault_address,
            shape: None,
            pair: VirtualPair {
                virtual_input: U256::zero(),
                virtual_l: U256::zero(),
            },
            last_known_supply: U256::zero(),
            withdrawal_fee_bps: 0,
            locked: false,
            auto_lock: false,
            vault_approval_initialized: false,
            entered: false,
            vault,
            token,
            collateral_token,
            hook: None,
            sink,
        }
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Derive and install the curve shape from business goals. Owner-only.
    ///
    /// Re-invocation is permitted until the first add routes collateral
    /// through the curve; after that the transition is unsafe and rejected.
    pub fn set_goals(
        &mut self,
        caller: Address,
        funding_goal: U256,
        desired_average_price: U256,
    ) -> EngineResult<()> {
        self.only_owner(caller)?;
        if self.shape.is_some() && !self.pair.virtual_input.is_zero() {
            return Err(EngineError::GoalsAlreadyActive);
        }

        let shape = CurveShape::from_goals(funding_goal, desired_average_price)?;
        let pair = shape.initial_pair()?;

        self.shape = Some(shape);
        self.pair = pair;
        self.last_known_supply = self.token.total_supply();

        info!(
            funding_goal = %funding_goal,
            desired_average_price = %desired_average_price,
            alpha = %shape.alpha,
            virtual_k = %shape.virtual_k,
            "curve goals configured"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Trading
    // ------------------------------------------------------------------

    /// Deposit `input_amount` collateral, minting bonding tokens to `caller`.
    /// Fails with a slippage error if fewer than `min_bonding_out` tokens
    /// would be minted.
    pub fn add_liquidity(
        &mut self,
        caller: Address,
        input_amount: U256,
        min_bonding_out: U256,
    ) -> EngineResult<U256> {
        self.enter()?;
        let result = self.add_liquidity_inner(caller, input_amount, min_bonding_out);
        self.entered = false;
        result
    }

    /// Permit pass-through: attempt a signature-based allowance grant on the
    /// collateral token; on failure fall back to a pre-existing allowance.
    pub fn add_liquidity_with_permit(
        &mut self,
        caller: Address,
        input_amount: U256,
        min_bonding_out: U256,
        deadline: u64,
        signature: &[u8],
    ) -> EngineResult<U256> {
        if let Err(err) = self.collateral_token.permit(
            caller,
            self.address,
            input_amount,
            deadline,
            signature,
        ) {
            let have = self.collateral_token.allowance(caller, self.address);
            if have < input_amount {
                warn!(caller = %caller, reason = %err, "permit failed and allowance insufficient");
                return Err(EngineError::InsufficientAllowance {
                    have,
                    need: input_amount,
                });
            }
            debug!(caller = %caller, "permit failed, existing allowance covers the amount");
        }
        self.add_liquidity(caller, input_amount, min_bonding_out)
    }

    fn add_liquidity_inner(
        &mut self,
        caller: Address,
        input_amount: U256,
        min_bonding_out: U256,
    ) -> EngineResult<U256> {
        self.ensure_tradeable()?;
        if input_amount.is_zero() {
            return Err(EngineError::ZeroAmount);
        }
        let shape = self.shape.ok_or(EngineError::NotConfigured)?;

        let bonding_out = curve::quote_add(&shape, &self.pair, input_amount)?;
        if bonding_out < min_bonding_out {
            return Err(EngineError::Slippage {
                min: min_bonding_out,
                actual: bonding_out,
            });
        }

        // Effects: commit the pair before any external call.
        let snapshot = (self.pair, self.last_known_supply);
        let mut pair = self.pair;
        pair.apply_add(input_amount, bonding_out)?;
        self.pair = pair;

        // Interactions; each failure restores the snapshot.
        if let Err(err) = self.token.mint(caller, bonding_out) {
            self.restore(snapshot);
            return Err(err.into());
        }
        if let Err(err) = self.vault.deposit(self.collateral, input_amount, caller) {
            self.restore(snapshot);
            return Err(err.into());
        }
        // Absorption point: whatever the supply is now becomes the baseline.
        self.last_known_supply = self.token.total_supply();

        if let Some(hook) = self.hook.as_mut() {
            if let Err(err) = hook.on_buy(caller, input_amount, bonding_out) {
                self.restore(snapshot);
                return Err(err.into());
            }
        }

        info!(
            caller = %caller,
            input_amount = %input_amount,
            bonding_out = %bonding_out,
            "liquidity added"
        );
        self.sink.record(Event::LiquidityAdded {
            caller,
            input_amount,
            bonding_out,
        });
        Ok(bonding_out)
    }

    /// Burn `bonding_amount` from `caller`, releasing collateral from the
    /// vault. Fails with a slippage error below `min_input_out`.
    pub fn remove_liquidity(
        &mut self,
        caller: Address,
        bonding_amount: U256,
        min_input_out: U256,
    ) -> EngineResult<U256> {
        self.enter()?;
        let result = self.remove_liquidity_inner(caller, bonding_amount, min_input_out);
        self.entered = false;
        result
    }

    fn remove_liquidity_inner(
        &mut self,
        caller: Address,
        bonding_amount: U256,
        min_input_out: U256,
    ) -> EngineResult<U256> {
        self.ensure_tradeable()?;
        if bonding_amount.is_zero() {
            return Err(EngineError::ZeroAmount);
        }
        let have = self.token.balance_of(caller);
        if have < bonding_amount {
            return Err(EngineError::InsufficientBalance {
                have,
                need: bonding_amount,
            });
        }

        let (input_out, fee_amount) = self.redemption_quote(bonding_amount)?;
        if input_out < min_input_out {
            return Err(EngineError::Slippage {
                min: min_input_out,
                actual: input_out,
            });
        }

        let snapshot = (self.pair, self.last_known_supply);

        // The full bonding amount is burned and returned to the virtual
        // pool; the fee only shrinks the payout.
        if let Err(err) = self.token.burn(caller, bonding_amount) {
            return Err(err.into());
        }
        let mut pair = self.pair;
        if let Err(err) = pair.apply_remove(bonding_amount, input_out) {
            self.restore(snapshot);
            return Err(err.into());
        }
        self.pair = pair;

        if let Err(err) = self.vault.withdraw(self.collateral, input_out, caller) {
            self.restore(snapshot);
            return Err(err.into());
        }
        self.last_known_supply = self.token.total_supply();

        if let Some(hook) = self.hook.as_mut() {
            if let Err(err) = hook.on_sell(caller, bonding_amount, input_out) {
                self.restore(snapshot);
                return Err(err.into());
            }
        }

        info!(
            caller = %caller,
            bonding_amount = %bonding_amount,
            input_out = %input_out,
            fee_amount = %fee_amount,
            "liquidity removed"
        );
        self.sink.record(Event::LiquidityRemoved {
            caller,
            bonding_amount,
            input_out,
        });
        if !fee_amount.is_zero() {
            self.sink.record(Event::FeeCollected {
                caller,
                bonding_amount,
                fee_amount,
            });
        }
        Ok(input_out)
    }

    /// Redemption pricing shared by `remove_liquidity` and its quote view.
    ///
    /// If supply grew past the last observed value, issuance bypassed the
    /// engine: switch to proportional redemption against real vault
    /// holdings, bounding every redeemer to their linear share. Otherwise
    /// apply the fee haircut and the curve formula.
    fn redemption_quote(&self, bonding_amount: U256) -> EngineResult<(U256, U256)> {
        let shape = self.shape.ok_or(EngineError::NotConfigured)?;
        let supply = self.token.total_supply();

        if supply > self.last_known_supply {
            let vault_balance = self.vault.balance_of(self.collateral, self.address);
            let input_out = curve::div_u256(curve::mul_u256(bonding_amount, vault_balance)?, supply)?;
            debug!(
                supply = %supply,
                last_known_supply = %self.last_known_supply,
                "supply drift detected, proportional redemption"
            );
            return Ok((input_out, U256::zero()));
        }

        let fee_amount = curve::div_u256(
            curve::mul_u256(bonding_amount, U256::from(self.withdrawal_fee_bps))?,
            U256::from(MAX_BPS),
        )?;
        let effective = curve::sub_u256(bonding_amount, fee_amount)?;
        let input_out = if effective.is_zero() {
            // Full haircut burns everything and pays nothing; not an error.
            U256::zero()
        } else {
            curve::quote_remove(&shape, &self.pair, effective)?
        };
        Ok((input_out, fee_amount))
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Bonding tokens a deposit of `input_amount` would mint right now.
    pub fn quote_add_liquidity(&self, input_amount: U256) -> EngineResult<U256> {
        let shape = self.shape.ok_or(EngineError::NotConfigured)?;
        Ok(curve::quote_add(&shape, &self.pair, input_amount)?)
    }

    /// Collateral a removal of `bonding_amount` would pay right now. Fee-
    /// and guard-aware: mirrors the exact path `remove_liquidity` takes.
    pub fn quote_remove_liquidity(&self, bonding_amount: U256) -> EngineResult<U256> {
        Ok(self.redemption_quote(bonding_amount)?.0)
    }

    /// The pricing pair and its compatibility product `x * y`. The product
    /// is not the invariant constant; see [`Engine::virtual_k`].
    pub fn virtual_pair(&self) -> EngineResult<(U256, U256, U256)> {
        let product = self.pair.product()?;
        Ok((self.pair.virtual_input, self.pair.virtual_l, product))
    }

    pub fn alpha(&self) -> EngineResult<U256> {
        Ok(self.shape.ok_or(EngineError::NotConfigured)?.alpha)
    }

    pub fn beta(&self) -> EngineResult<U256> {
        Ok(self.shape.ok_or(EngineError::NotConfigured)?.beta)
    }

    pub fn virtual_k(&self) -> EngineResult<U256> {
        Ok(self.shape.ok_or(EngineError::NotConfigured)?.virtual_k)
    }

    /// Current marginal price, WAD-scaled.
    pub fn marginal_price(&self) -> EngineResult<U256> {
        let shape = self.shape.ok_or(EngineError::NotConfigured)?;
        Ok(curve::marginal_price(&shape, &self.pair)?)
    }

    pub fn withdrawal_fee_basis_points(&self) -> u16 {
        self.withdrawal_fee_bps
    }

    pub fn auto_lock(&self) -> bool {
        self.auto_lock
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn last_known_supply(&self) -> U256 {
        self.last_known_supply
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    pub fn lock(&mut self, caller: Address) -> EngineResult<()> {
        self.only_owner(caller)?;
        self.locked = true;
        info!(caller = %caller, "contract locked");
        self.sink.record(Event::ContractLocked { caller });
        Ok(())
    }

    pub fn unlock(&mut self, caller: Address) -> EngineResult<()> {
        self.only_owner(caller)?;
        self.locked = false;
        info!(caller = %caller, "contract unlocked");
        self.sink.record(Event::ContractUnlocked { caller });
        Ok(())
    }

    pub fn set_withdrawal_fee(&mut self, caller: Address, bps: u16) -> EngineResult<()> {
        self.only_owner(caller)?;
        if bps > MAX_BPS {
            return Err(EngineError::FeeOutOfRange(bps));
        }
        let old_bps = self.withdrawal_fee_bps;
        self.withdrawal_fee_bps = bps;
        info!(old_bps, new_bps = bps, "withdrawal fee updated");
        self.sink.record(Event::WithdrawalFeeUpdated {
            old_bps,
            new_bps: bps,
        });
        Ok(())
    }

    pub fn set_auto_lock(&mut self, caller: Address, enabled: bool) -> EngineResult<()> {
        self.only_owner(caller)?;
        self.auto_lock = enabled;
        info!(enabled, "auto-lock flag set");
        Ok(())
    }

    /// Swap the custodian. Forces a fresh approval before trading resumes.
    pub fn set_vault(
        &mut self,
        caller: Address,
        vault_address: Address,
        vault: Box<dyn Vault>,
    ) -> EngineResult<()> {
        self.only_owner(caller)?;
        self.vault = vault;
        self.vault_address = vault_address;
        self.vault_approval_initialized = false;
        info!(caller = %caller, vault = %vault_address, "vault changed");
        self.sink.record(Event::VaultChanged { caller });
        Ok(())
    }

    /// One-time unlimited collateral approval for the current vault.
    pub fn initialize_vault_approval(&mut self, caller: Address) -> EngineResult<()> {
        self.only_owner(caller)?;
        self.collateral_token
            .approve(self.address, self.vault_address, U256::MAX)?;
        self.vault_approval_initialized = true;
        info!(vault = %self.vault_address, "vault approval initialized");
        Ok(())
    }

    pub fn set_hook(&mut self, caller: Address, hook: Option<Box<dyn TradeHook>>) -> EngineResult<()> {
        self.only_owner(caller)?;
        self.hook = hook;
        info!("trade hook swapped");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------

    fn only_owner(&self, caller: Address) -> EngineResult<()> {
        if caller != self.owner {
            return Err(EngineError::NotOwner);
        }
        Ok(())
    }

    fn ensure_tradeable(&self) -> EngineResult<()> {
        if self.locked {
            return Err(EngineError::Locked);
        }
        if !self.vault_approval_initialized {
            return Err(EngineError::VaultNotInitialized);
        }
        if self.shape.is_none() {
            return Err(EngineError::NotConfigured);
        }
        Ok(())
    }

    fn enter(&mut self) -> EngineResult<()> {
        if self.entered {
            return Err(EngineError::Reentrancy);
        }
        self.entered = true;
        Ok(())
    }

    fn restore(&mut self, snapshot: (VirtualPair, U256)) {
        self.pair = snapshot.0;
        self.last_known_supply = snapshot.1;
    }
}
