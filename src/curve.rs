// src/curve.rs

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, MathError};
use crate::types::{U256, INVARIANT_TOLERANCE_DENOM, MIN_AVERAGE_PRICE, WAD};

pub(crate) fn add_u256(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

pub(crate) fn sub_u256(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_sub(b).ok_or(MathError::Underflow)
}

pub(crate) fn mul_u256(a: U256, b: U256) -> Result<U256, MathError> {
    let (res, overflow) = a.overflowing_mul(b);
    if overflow {
        Err(MathError::Overflow)
    } else {
        Ok(res)
    }
}

pub(crate) fn div_u256(a: U256, b: U256) -> Result<U256, MathError> {
    if b.is_zero() {
        Err(MathError::DivisionByZero)
    } else {
        // Truncates toward zero.
        Ok(a / b)
    }
}

/// Immutable shape of the offset curve, derived once from business goals.
///
/// Invariant: (x + alpha) * (y + beta) = virtual_k
/// Where:
///   - x is cumulative real collateral routed through the curve
///   - y is remaining virtual counter-liquidity
///   - alpha = beta = price * funding_goal / (1 - price)
///   - virtual_k = (funding_goal + alpha)^2
///
/// With these constants the marginal price starts at price^2 and reaches
/// exactly 1.0 when x hits the funding goal, while the average price paid
/// across the whole sale is `desired_average_price`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveShape {
    /// Target cumulative collateral at which marginal price reaches 1.0.
    pub funding_goal: U256,
    /// Target average sale price, WAD-scaled.
    pub desired_average_price: U256,
    /// Input-side offset.
    pub alpha: U256,
    /// Counter-side offset. Always equal to `alpha` under `from_goals`.
    pub beta: U256,
    /// The invariant constant `(funding_goal + alpha)^2`.
    pub virtual_k: U256,
    /// Real collateral present at configuration time. Forcibly zero; the
    /// curve is bootstrapped entirely from virtual liquidity.
    pub seed_input: U256,
}

impl CurveShape {
    /// Derive the shape constants from a funding goal and a desired average
    /// price (WAD-scaled, `sqrt(0.75) <= price < 1`).
    pub fn from_goals(funding_goal: U256, desired_average_price: U256) -> Result<Self, EngineError> {
        if funding_goal.is_zero() {
            return Err(EngineError::InvalidFundingGoal);
        }
        if desired_average_price < U256::from(MIN_AVERAGE_PRICE) {
            return Err(EngineError::AveragePriceTooLow);
        }
        if desired_average_price >= U256::from(WAD) {
            return Err(EngineError::AveragePriceTooHigh);
        }

        // alpha = price * goal / (1 - price)
        let one_minus_price = sub_u256(U256::from(WAD), desired_average_price)?;
        let alpha = div_u256(mul_u256(desired_average_price, funding_goal)?, one_minus_price)?;

        // virtual_k = (goal + alpha)^2
        let base = add_u256(funding_goal, alpha)?;
        let virtual_k = mul_u256(base, base)?;

        Ok(Self {
            funding_goal,
            desired_average_price,
            alpha,
            beta: alpha,
            virtual_k,
            seed_input: U256::zero(),
        })
    }

    /// The starting pair: x = 0, y = virtual_k / alpha - alpha.
    pub fn initial_pair(&self) -> Result<VirtualPair, MathError> {
        let virtual_l = sub_u256(div_u256(self.virtual_k, self.alpha)?, self.alpha)?;
        Ok(VirtualPair {
            virtual_input: self.seed_input,
            virtual_l,
        })
    }

    /// True when the fast single-offset quoting form applies. Always true
    /// for shapes built by `from_goals`; the general form exists for
    /// completeness and must agree bit-for-bit.
    pub fn is_symmetric(&self) -> bool {
        self.seed_input.is_zero() && self.alpha == self.beta
    }
}

/// The (x, y) pricing pair. Does not equal real token balances: the vault
/// may hold more collateral than `virtual_input` from out-of-band deposits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualPair {
    /// x: cumulative real collateral routed through curve operations.
    pub virtual_input: U256,
    /// y: remaining virtual counter-liquidity.
    pub virtual_l: U256,
}

impl VirtualPair {
    /// Commit an add: x += dx, y -= bonding_out.
    pub fn apply_add(&mut self, input_amount: U256, bonding_out: U256) -> Result<(), MathError> {
        self.virtual_input = add_u256(self.virtual_input, input_amount)?;
        self.virtual_l = sub_u256(self.virtual_l, bonding_out)?;
        Ok(())
    }

    /// Commit a remove: y += full bonding amount, x -= input_out.
    pub fn apply_remove(&mut self, bonding_amount: U256, input_out: U256) -> Result<(), MathError> {
        self.virtual_l = add_u256(self.virtual_l, bonding_amount)?;
        self.virtual_input = sub_u256(self.virtual_input, input_out)?;
        Ok(())
    }

    /// Compatibility product x * y. Distinct from the invariant constant.
    pub fn product(&self) -> Result<U256, MathError> {
        mul_u256(self.virtual_input, self.virtual_l)
    }

    /// Whether (x + alpha)(y + beta) still equals virtual_k within a 1e-12
    /// relative tolerance (integer rounding drift only).
    pub fn invariant_holds(&self, shape: &CurveShape) -> bool {
        let lhs = match add_u256(self.virtual_input, shape.alpha)
            .and_then(|a| add_u256(self.virtual_l, shape.beta).map(|b| (a, b)))
            .and_then(|(a, b)| mul_u256(a, b))
        {
            Ok(v) => v,
            Err(_) => return false,
        };
        let diff = if lhs > shape.virtual_k {
            lhs - shape.virtual_k
        } else {
            shape.virtual_k - lhs
        };
        diff <= shape.virtual_k / U256::from(INVARIANT_TOLERANCE_DENOM)
    }
}

/// Bonding tokens minted for `input_amount` of collateral at the current
/// position. Pure; does not mutate the pair.
///
/// new_y = virtual_k / (x + alpha + dx) - beta
/// out   = y - new_y
pub fn quote_add(shape: &CurveShape, pair: &VirtualPair, input_amount: U256) -> Result<U256, MathError> {
    if shape.is_symmetric() {
        quote_add_simplified(shape, pair, input_amount)
    } else {
        quote_add_general(shape, pair, input_amount)
    }
}

/// Collateral released for returning `bonding_amount` to the curve. Pure.
///
/// new_y = y + db
/// out   = x - (virtual_k / (new_y + beta) - alpha)
pub fn quote_remove(shape: &CurveShape, pair: &VirtualPair, bonding_amount: U256) -> Result<U256, MathError> {
    if shape.is_symmetric() {
        quote_remove_simplified(shape, pair, bonding_amount)
    } else {
        quote_remove_general(shape, pair, bonding_amount)
    }
}

/// Fast form: zero seed and alpha == beta collapse both offsets into one.
pub fn quote_add_simplified(
    shape: &CurveShape,
    pair: &VirtualPair,
    input_amount: U256,
) -> Result<U256, MathError> {
    let denom = add_u256(add_u256(pair.virtual_input, shape.alpha)?, input_amount)?;
    let new_y = sub_u256(div_u256(shape.virtual_k, denom)?, shape.alpha)?;
    sub_u256(pair.virtual_l, new_y)
}

/// General form: distinct alpha/beta offsets.
pub fn quote_add_general(
    shape: &CurveShape,
    pair: &VirtualPair,
    input_amount: U256,
) -> Result<U256, MathError> {
    let denom = add_u256(add_u256(pair.virtual_input, shape.alpha)?, input_amount)?;
    let new_y = sub_u256(div_u256(shape.virtual_k, denom)?, shape.beta)?;
    sub_u256(pair.virtual_l, new_y)
}

/// Fast form of the remove quote.
pub fn quote_remove_simplified(
    shape: &CurveShape,
    pair: &VirtualPair,
    bonding_amount: U256,
) -> Result<U256, MathError> {
    let new_y = add_u256(pair.virtual_l, bonding_amount)?;
    let denom = add_u256(new_y, shape.alpha)?;
    let inner = sub_u256(div_u256(shape.virtual_k, denom)?, shape.alpha)?;
    sub_u256(pair.virtual_input, inner)
}

/// General form of the remove quote.
pub fn quote_remove_general(
    shape: &CurveShape,
    pair: &VirtualPair,
    bonding_amount: U256,
) -> Result<U256, MathError> {
    let new_y = add_u256(pair.virtual_l, bonding_amount)?;
    let denom = add_u256(new_y, shape.beta)?;
    let inner = sub_u256(div_u256(shape.virtual_k, denom)?, shape.alpha)?;
    sub_u256(pair.virtual_input, inner)
}

/// Marginal price of the bonding token in collateral, WAD-scaled:
/// (x + alpha)^2 * WAD / virtual_k.
pub fn marginal_price(shape: &CurveShape, pair: &VirtualPair) -> Result<U256, MathError> {
    let shifted = add_u256(pair.virtual_input, shape.alpha)?;
    let num = mul_u256(mul_u256(shifted, shifted)?, U256::from(WAD))?;
    div_u256(num, shape.virtual_k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn u(s: &str) -> U256 {
        U256::from_dec_str(s).unwrap()
    }

    /// fundingGoal = 1_000_000e18, desiredAveragePrice = 0.9e18.
    fn reference_shape() -> CurveShape {
        CurveShape::from_goals(u("1000000000000000000000000"), u("900000000000000000")).unwrap()
    }

    #[test]
    fn goal_derivation_reference_values() {
        let shape = reference_shape();
        assert_eq!(shape.alpha, u("9000000000000000000000000"));
        assert_eq!(shape.beta, shape.alpha);
        assert_eq!(
            shape.virtual_k,
            u("100000000000000000000000000000000000000000000000000")
        );
        let pair = shape.initial_pair().unwrap();
        assert!(pair.virtual_input.is_zero());
        assert_eq!(pair.virtual_l, u("2111111111111111111111111"));
        assert!(shape.is_symmetric());
    }

    #[test]
    fn goal_validation() {
        let price = u("900000000000000000");
        assert_eq!(
            CurveShape::from_goals(U256::zero(), price),
            Err(EngineError::InvalidFundingGoal)
        );
        let goal = u("1000000000000000000000000");
        assert_eq!(
            CurveShape::from_goals(goal, u("866025403784438646")),
            Err(EngineError::AveragePriceTooLow)
        );
        assert_eq!(
            CurveShape::from_goals(goal, U256::from(WAD)),
            Err(EngineError::AveragePriceTooHigh)
        );
        // Exactly the minimum is accepted.
        assert!(CurveShape::from_goals(goal, U256::from(MIN_AVERAGE_PRICE)).is_ok());
    }

    #[test]
    fn marginal_price_start_and_end() {
        let shape = reference_shape();
        let mut pair = shape.initial_pair().unwrap();
        // 0.9^2 = 0.81 at x = 0.
        assert_eq!(marginal_price(&shape, &pair).unwrap(), u("810000000000000000"));
        // Exactly 1.0 once the goal is raised.
        pair.virtual_input = shape.funding_goal;
        assert_eq!(marginal_price(&shape, &pair).unwrap(), U256::from(WAD));
    }

    #[test]
    fn quote_add_reference_value() {
        let shape = reference_shape();
        let pair = shape.initial_pair().unwrap();
        let out = quote_add(&shape, &pair, u("1000000000000000000000")).unwrap();
        // Closed form: y0 - (k / (alpha + 1000e18) - alpha).
        assert_eq!(out, u("1234430742263205322866"));
    }

    #[test]
    fn quote_remove_on_empty_curve_underflows() {
        let shape = reference_shape();
        let pair = shape.initial_pair().unwrap();
        assert_eq!(
            quote_remove(&shape, &pair, U256::from(1u8)),
            Err(MathError::Underflow)
        );
    }

    #[test]
    fn add_then_remove_round_trip() {
        let shape = reference_shape();
        let mut pair = shape.initial_pair().unwrap();
        let amount = u("1000000000000000000000");
        let out = quote_add(&shape, &pair, amount).unwrap();
        pair.apply_add(amount, out).unwrap();
        assert!(pair.invariant_holds(&shape));

        let back = quote_remove(&shape, &pair, out).unwrap();
        pair.apply_remove(out, back).unwrap();
        assert!(pair.invariant_holds(&shape));

        // Rounding-only loss, strictly below 1 bp of the input.
        assert!(back <= amount);
        assert!(amount - back < amount / U256::from(10_000u32));
    }

    #[test]
    fn pricing_is_monotone_decreasing() {
        let shape = reference_shape();
        let mut pair = shape.initial_pair().unwrap();
        let step = u("5000000000000000000000"); // 5000e18
        let mut last_out = U256::MAX;
        for _ in 0..20 {
            let out = quote_add(&shape, &pair, step).unwrap();
            assert!(out < last_out, "bonding out per unit must strictly decrease");
            pair.apply_add(step, out).unwrap();
            last_out = out;
        }
    }

    #[test]
    fn shape_constants_survive_operations() {
        let shape = reference_shape();
        let before = shape;
        let mut pair = shape.initial_pair().unwrap();
        for i in 1u32..=10 {
            let dx = U256::from(i) * u("1000000000000000000");
            let out = quote_add(&shape, &pair, dx).unwrap();
            pair.apply_add(dx, out).unwrap();
        }
        assert_eq!(shape, before);
    }

    proptest! {
        #[test]
        fn fast_and_general_paths_agree(
            goal_units in 1u128..=1_000_000u128,
            price_offset in 0u128..=133_973_596_215_561_352u128,
            dx in 1u128..=1_000_000_000_000_000_000_000_000u128,
        ) {
            // goal in [1e18, 1e24], price in [sqrt(0.75), 0.999999) * WAD;
            // wider ranges push virtual_k past 256 bits.
            let goal = U256::from(goal_units) * U256::from(WAD);
            let price = U256::from(MIN_AVERAGE_PRICE + price_offset);
            let shape = CurveShape::from_goals(goal, price).unwrap();
            let pair = shape.initial_pair().unwrap();
            let dx = U256::from(dx);

            let fast = quote_add_simplified(&shape, &pair, dx);
            let general = quote_add_general(&shape, &pair, dx);
            prop_assert_eq!(fast, general);

            if let Ok(out) = fast {
                let mut after = pair;
                after.apply_add(dx, out).unwrap();
                let fast_r = quote_remove_simplified(&shape, &after, out);
                let general_r = quote_remove_general(&shape, &after, out);
                prop_assert_eq!(fast_r, general_r);
            }
        }

        #[test]
        fn invariant_preserved_across_add_remove_sequences(
            goal_units in 1_000u128..=1_000_000u128,
            amounts in prop::collection::vec(1u128..=1_000_000_000_000_000_000_000u128, 1..12),
        ) {
            let goal = U256::from(goal_units) * U256::from(WAD);
            let price = U256::from(900_000_000_000_000_000u128);
            let shape = CurveShape::from_goals(goal, price).unwrap();
            let mut pair = shape.initial_pair().unwrap();
            let mut held = U256::zero();

            for (i, amount) in amounts.iter().enumerate() {
                let amount = U256::from(*amount);
                if i % 3 == 2 && !held.is_zero() {
                    // Return half of what we hold to the curve.
                    let back = (held / U256::from(2u8) + U256::from(1u8)).min(held);
                    let out = quote_remove(&shape, &pair, back).unwrap();
                    pair.apply_remove(back, out).unwrap();
                    held = held - back;
                } else {
                    let out = quote_add(&shape, &pair, amount).unwrap();
                    pair.apply_add(amount, out).unwrap();
                    held = held + out;
                }
                prop_assert!(pair.invariant_holds(&shape));
            }
        }
    }
}
