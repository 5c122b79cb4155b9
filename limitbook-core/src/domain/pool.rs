//! Pool identity and swap direction.

use super::ids::{AccountId, AssetId, PoolId};
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Fee denominator: fees are expressed in pips (hundredths of a basis point).
pub const FEE_DENOMINATOR: u32 = 1_000_000;

/// Everything that identifies a trading pool: asset pair, fee tier,
/// tick granularity, and the hook (engine) account attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolKey {
    pub asset0: AssetId,
    pub asset1: AssetId,
    pub fee_pips: u32,
    pub tick_spacing: i32,
    pub hooks: AccountId,
}

impl PoolKey {
    pub fn new(
        asset0: AssetId,
        asset1: AssetId,
        fee_pips: u32,
        tick_spacing: i32,
        hooks: AccountId,
    ) -> Self {
        Self { asset0, asset1, fee_pips, tick_spacing, hooks }
    }

    /// Deterministic pool id.
    ///
    /// Canonical JSON with a fixed field order, hashed with BLAKE3.
    pub fn id(&self) -> PoolId {
        let canonical = json!({
            "asset0": &self.asset0.0,
            "asset1": &self.asset1.0,
            "fee_pips": self.fee_pips,
            "tick_spacing": self.tick_spacing,
            "hooks": &self.hooks.0,
        });
        PoolId::from_bytes(canonical.to_string().as_bytes())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.asset0 >= self.asset1 {
            return Err(ValidationError::InvalidPoolKey(format!(
                "assets must be strictly ordered: {} >= {}",
                self.asset0, self.asset1
            )));
        }
        if self.tick_spacing <= 0 {
            return Err(ValidationError::InvalidPoolKey(format!(
                "tick spacing must be positive, got {}",
                self.tick_spacing
            )));
        }
        if self.fee_pips >= FEE_DENOMINATOR {
            return Err(ValidationError::InvalidPoolKey(format!(
                "fee {} pips is not below {}",
                self.fee_pips, FEE_DENOMINATOR
            )));
        }
        Ok(())
    }
}

/// Which asset a swap (or a resting order) sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Sell asset0 for asset1. Pushes the price of asset0 down.
    ZeroForOne,
    /// Sell asset1 for asset0. Pushes the price of asset0 up.
    OneForZero,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::ZeroForOne => Direction::OneForZero,
            Direction::OneForZero => Direction::ZeroForOne,
        }
    }

    /// Asset paid into the pool.
    pub fn input_asset(self, key: &PoolKey) -> &AssetId {
        match self {
            Direction::ZeroForOne => &key.asset0,
            Direction::OneForZero => &key.asset1,
        }
    }

    /// Asset received from the pool.
    pub fn output_asset(self, key: &PoolKey) -> &AssetId {
        match self {
            Direction::ZeroForOne => &key.asset1,
            Direction::OneForZero => &key.asset0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::ZeroForOne => "zero_for_one",
            Direction::OneForZero => "one_for_zero",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> PoolKey {
        PoolKey::new(
            AssetId::new("ETH"),
            AssetId::new("USDC"),
            3000,
            60,
            AccountId::new("hook"),
        )
    }

    #[test]
    fn pool_id_is_stable() {
        assert_eq!(key().id(), key().id());
    }

    #[test]
    fn pool_id_depends_on_every_field() {
        let base = key().id();
        let mut k = key();
        k.fee_pips = 500;
        assert_ne!(k.id(), base);
        let mut k = key();
        k.tick_spacing = 10;
        assert_ne!(k.id(), base);
        let mut k = key();
        k.hooks = AccountId::new("other");
        assert_ne!(k.id(), base);
    }

    #[test]
    fn validate_rejects_unordered_assets() {
        let mut k = key();
        std::mem::swap(&mut k.asset0, &mut k.asset1);
        assert!(matches!(k.validate(), Err(ValidationError::InvalidPoolKey(_))));
    }

    #[test]
    fn validate_rejects_bad_spacing_and_fee() {
        let mut k = key();
        k.tick_spacing = 0;
        assert!(k.validate().is_err());
        let mut k = key();
        k.fee_pips = FEE_DENOMINATOR;
        assert!(k.validate().is_err());
        assert!(key().validate().is_ok());
    }

    #[test]
    fn direction_assets() {
        let k = key();
        assert_eq!(Direction::ZeroForOne.input_asset(&k).0, "ETH");
        assert_eq!(Direction::ZeroForOne.output_asset(&k).0, "USDC");
        assert_eq!(Direction::OneForZero.input_asset(&k).0, "USDC");
        assert_eq!(Direction::ZeroForOne.opposite(), Direction::OneForZero);
    }

    #[test]
    fn direction_serializes_snake_case() {
        let json = serde_json::to_string(&Direction::OneForZero).unwrap();
        assert_eq!(json, "\"one_for_zero\"");
    }
}
