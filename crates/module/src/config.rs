//! Engine configuration.
//!
//! Defaults applied to every auction the engine creates, plus the knobs that
//! govern timeout handling and queue randomisation.

use auction_types::{DeadlinePolicy, PricingConfig, QueuePolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Configuration for the auction engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pricing used when an auction is created without its own
    pub pricing: PricingConfig,

    /// Queue ordering used when an auction is created without its own
    pub queue_policy: QueuePolicy,

    /// Resolve timed-out rounds during the sweep (sell to the highest bid,
    /// otherwise mark unsold). When false, timed-out rounds wait in
    /// `Resolving` for an administrator.
    pub auto_resolve_on_timeout: bool,

    /// Fixed seed for queue shuffles; entropy when unset
    pub queue_seed: Option<u64>,

    /// Deadline sweep period for the server (milliseconds)
    pub sweep_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pricing: PricingConfig::default(),
            queue_policy: QueuePolicy::default(),
            auto_resolve_on_timeout: true,
            queue_seed: None,
            sweep_interval_ms: 500,
        }
    }
}

impl EngineConfig {
    /// Validate the engine configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        validate_pricing(&self.pricing)?;
        validate_queue_policy(&self.queue_policy)?;

        if self.sweep_interval_ms == 0 {
            return Err(ConfigValidationError::InvalidSweepInterval);
        }

        Ok(())
    }
}

/// Validate pricing rules, including every category override.
pub fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigValidationError> {
    if pricing.bid_increment == 0 {
        return Err(ConfigValidationError::InvalidPricing(
            "Bid increment cannot be zero".into(),
        ));
    }
    if pricing.round_time_limit_secs == 0 {
        return Err(ConfigValidationError::InvalidPricing(
            "Round time limit cannot be zero".into(),
        ));
    }

    if pricing.base_price.checked_add(pricing.bid_increment).is_none() {
        return Err(ConfigValidationError::InvalidPricing(
            "Base price plus increment overflows".into(),
        ));
    }

    for (category, o) in &pricing.category_overrides {
        if o.bid_increment == Some(0) || o.round_time_limit_secs == Some(0) {
            return Err(ConfigValidationError::InvalidPricing(format!(
                "Override for {} has a zero increment or time limit",
                category
            )));
        }
        let category = Some(category.as_str());
        if pricing
            .base_price_for(category)
            .checked_add(pricing.increment_for(category))
            .is_none()
        {
            return Err(ConfigValidationError::InvalidPricing(format!(
                "Override for {} overflows its first bid",
                category.unwrap_or_default()
            )));
        }
    }

    if let DeadlinePolicy::AntiSnipe { extension_secs, .. } = pricing.deadline_policy {
        if extension_secs == 0 {
            return Err(ConfigValidationError::InvalidPricing(
                "Anti-snipe extension cannot be zero".into(),
            ));
        }
    }

    Ok(())
}

/// Validate a queue policy.
pub fn validate_queue_policy(policy: &QueuePolicy) -> Result<(), ConfigValidationError> {
    let mut seen = BTreeSet::new();
    for id in &policy.priority_players {
        if !seen.insert(*id) {
            return Err(ConfigValidationError::DuplicatePriorityPlayer(*id));
        }
    }
    Ok(())
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid pricing configuration: {0}")]
    InvalidPricing(String),

    #[error("Player {0} listed twice in priority players")]
    DuplicatePriorityPlayer(u64),

    #[error("Sweep interval cannot be zero")]
    InvalidSweepInterval,
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_types::CategoryPricing;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.auto_resolve_on_timeout);
        assert_eq!(config.pricing.deadline_policy, DeadlinePolicy::Fixed);
    }

    #[test]
    fn test_zero_increment_rejected() {
        let mut config = EngineConfig::default();
        config.pricing.bid_increment = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidPricing(_))
        ));
    }

    #[test]
    fn test_zero_override_rejected() {
        let mut config = EngineConfig::default();
        config.pricing.category_overrides.insert(
            "Gold".into(),
            CategoryPricing {
                bid_increment: Some(0),
                ..Default::default()
            },
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidPricing(_))
        ));
    }

    #[test]
    fn test_first_bid_overflow_rejected() {
        let mut config = EngineConfig::default();
        config.pricing.base_price = u64::MAX - 50;
        config.pricing.bid_increment = 100;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidPricing(_))
        ));

        let mut config = EngineConfig::default();
        config.pricing.category_overrides.insert(
            "Icon".into(),
            CategoryPricing {
                base_price: Some(u64::MAX),
                ..Default::default()
            },
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidPricing(_))
        ));
    }

    #[test]
    fn test_duplicate_priority_player() {
        let mut config = EngineConfig::default();
        config.queue_policy.priority_players = vec![4, 9, 4];
        assert_eq!(
            config.validate(),
            Err(ConfigValidationError::DuplicatePriorityPlayer(4))
        );
    }

    #[test]
    fn test_partial_config_file() {
        let config: EngineConfig = serde_json::from_str(
            r#"{
                "pricing": { "base_price": 500, "bid_increment": 100, "round_time_limit_secs": 30 },
                "auto_resolve_on_timeout": false
            }"#,
        )
        .unwrap();
        assert_eq!(config.pricing.base_price, 500);
        assert!(!config.auto_resolve_on_timeout);
        assert_eq!(config.sweep_interval_ms, 500);
        assert!(config.validate().is_ok());
    }
}
