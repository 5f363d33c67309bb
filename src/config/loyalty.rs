//! Loyalty program configuration loading from config.toml
//!
//! This module loads the tier thresholds, the check-in award settings and the point
//! rules used to seed the database on first run. Every section is optional; anything
//! left out falls back to the defaults documented on each type.

use crate::entities::Tier;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoyaltyConfig {
    /// Lifetime-point thresholds for each tier
    pub tiers: TierThresholds,
    /// NFC check-in award settings
    pub checkin: CheckinConfig,
    /// Point rules to seed when no rule exists for their action type
    pub rules: Vec<RuleConfig>,
}

/// Lifetime points needed to reach each tier above silver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    /// Minimum lifetime points for gold (default 500)
    pub gold: i64,
    /// Minimum lifetime points for black (default 2000)
    pub black: i64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            gold: 500,
            black: 2000,
        }
    }
}

impl TierThresholds {
    /// Tier earned by `lifetime_points`. Non-decreasing in `lifetime_points`.
    #[must_use]
    pub const fn tier_for(&self, lifetime_points: i64) -> Tier {
        if lifetime_points >= self.black {
            Tier::Black
        } else if lifetime_points >= self.gold {
            Tier::Gold
        } else {
            Tier::Silver
        }
    }

    /// Rejects thresholds that would make tiers overlap or go backwards.
    pub fn validate(&self) -> Result<()> {
        if self.gold <= 0 || self.black <= self.gold {
            return Err(Error::Config {
                message: format!(
                    "Tier thresholds must satisfy 0 < gold < black (got gold={}, black={})",
                    self.gold, self.black
                ),
            });
        }
        Ok(())
    }
}

/// Settings for awarding points on NFC check-in
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CheckinConfig {
    /// Points per check-in when no active `event_checkin` rule exists (default 10)
    pub flat_points: i64,
    /// Site roles that earn check-in points (default `["vip"]`)
    pub eligible_roles: Vec<String>,
}

impl Default for CheckinConfig {
    fn default() -> Self {
        Self {
            flat_points: 10,
            eligible_roles: vec!["vip".to_string()],
        }
    }
}

impl CheckinConfig {
    /// Whether a user with `role` earns points for checking in
    #[must_use]
    pub fn is_eligible(&self, role: &str) -> bool {
        self.eligible_roles
            .iter()
            .any(|eligible| eligible.eq_ignore_ascii_case(role.trim()))
    }
}

/// Configuration for a single seeded point rule
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RuleConfig {
    /// Source-like tag the rule applies to
    pub action_type: String,
    /// Points per currency unit or per occurrence
    pub points_per_unit: f64,
}

/// Loads loyalty configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - The tier thresholds are inconsistent
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LoyaltyConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses and validates loyalty configuration from TOML text
pub fn parse_config(contents: &str) -> Result<LoyaltyConfig> {
    let config: LoyaltyConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.tiers.validate()?;
    Ok(config)
}

/// Loads the configuration at `path`, falling back to defaults when the file is absent
pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<LoyaltyConfig> {
    let path = path.as_ref();
    if !path.exists() {
        warn!(
            "Loyalty config {} not found, using built-in defaults",
            path.display()
        );
        return Ok(LoyaltyConfig::default());
    }
    load_config(path)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_parse_loyalty_config() {
        let toml_str = r#"
            [tiers]
            gold = 300
            black = 1200

            [checkin]
            flat_points = 15
            eligible_roles = ["vip", "talent"]

            [[rules]]
            action_type = "consumption_pos"
            points_per_unit = 1.5

            [[rules]]
            action_type = "event_checkin"
            points_per_unit = 10.0
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.tiers.gold, 300);
        assert_eq!(config.tiers.black, 1200);
        assert_eq!(config.checkin.flat_points, 15);
        assert!(config.checkin.is_eligible("Talent"));
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[0].points_per_unit, 1.5);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.tiers, TierThresholds::default());
        assert_eq!(config.checkin, CheckinConfig::default());
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let result = parse_config("[tiers]\ngold = 900\nblack = 100\n");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_tier_for_thresholds() {
        let tiers = TierThresholds::default();
        assert_eq!(tiers.tier_for(0), Tier::Silver);
        assert_eq!(tiers.tier_for(499), Tier::Silver);
        assert_eq!(tiers.tier_for(500), Tier::Gold);
        assert_eq!(tiers.tier_for(1999), Tier::Gold);
        assert_eq!(tiers.tier_for(2000), Tier::Black);
    }

    #[test]
    fn test_tier_for_is_monotonic() {
        let tiers = TierThresholds::default();
        let mut previous = tiers.tier_for(0);
        for lifetime in (0..5000).step_by(7) {
            let tier = tiers.tier_for(lifetime);
            assert!(tier >= previous);
            previous = tier;
        }
    }

    #[test]
    fn test_checkin_eligibility_default_is_vip_only() {
        let checkin = CheckinConfig::default();
        assert!(checkin.is_eligible("vip"));
        assert!(checkin.is_eligible(" VIP "));
        assert!(!checkin.is_eligible("staff"));
    }
}
