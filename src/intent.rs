//! Intent
//!
//! What the caller optimizes the schema for. Only the tension analyzer reads
//! it: the same pattern is a problem under one intent and a feature under
//! another.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigurationError;

/// Optimization priorities an intent can weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    WriteThroughput,
    ReadSimplicity,
    Auditability,
    StorageCost,
    Integrity,
    Flexibility,
}

impl Priority {
    pub const ALL: [Priority; 6] = [
        Priority::WriteThroughput,
        Priority::ReadSimplicity,
        Priority::Auditability,
        Priority::StorageCost,
        Priority::Integrity,
        Priority::Flexibility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WriteThroughput => "write_throughput",
            Self::ReadSimplicity => "read_simplicity",
            Self::Auditability => "auditability",
            Self::StorageCost => "storage_cost",
            Self::Integrity => "integrity",
            Self::Flexibility => "flexibility",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| ConfigurationError::UnknownPriority(s.to_string()))
    }
}

/// Priority weights in [0, 1]. Missing priorities read as [`Intent::NEUTRAL`].
///
/// Deserializes through [`IntentWeights`], so stored intents get the same
/// key and range checks as config files.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "IntentWeights")]
pub struct Intent {
    weights: BTreeMap<Priority, f64>,
}

impl Intent {
    pub const NEUTRAL: f64 = 0.5;

    /// Names accepted by [`Intent::preset`]
    pub const PRESETS: [&'static str; 4] = ["balanced", "oltp", "analytics", "audit_heavy"];

    /// Every priority at the neutral weight
    pub fn balanced() -> Self {
        Self::default()
    }

    /// Transactional workload: fast writes, strong integrity
    pub fn oltp() -> Self {
        Self::from_weights([
            (Priority::WriteThroughput, 0.9),
            (Priority::Integrity, 0.9),
            (Priority::ReadSimplicity, 0.6),
            (Priority::Auditability, 0.3),
            (Priority::StorageCost, 0.4),
            (Priority::Flexibility, 0.3),
        ])
    }

    /// Reporting workload: simple reads, history matters
    pub fn analytics() -> Self {
        Self::from_weights([
            (Priority::ReadSimplicity, 0.9),
            (Priority::Auditability, 0.6),
            (Priority::WriteThroughput, 0.2),
            (Priority::StorageCost, 0.3),
            (Priority::Integrity, 0.5),
            (Priority::Flexibility, 0.4),
        ])
    }

    /// Compliance-driven schemas: never lose history
    pub fn audit_heavy() -> Self {
        Self::from_weights([
            (Priority::Auditability, 1.0),
            (Priority::Integrity, 0.8),
            (Priority::ReadSimplicity, 0.4),
            (Priority::WriteThroughput, 0.3),
            (Priority::StorageCost, 0.2),
            (Priority::Flexibility, 0.3),
        ])
    }

    /// Resolve a preset by name
    pub fn preset(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "balanced" | "default" => Some(Self::balanced()),
            "oltp" => Some(Self::oltp()),
            "analytics" | "olap" => Some(Self::analytics()),
            "audit_heavy" | "audit" => Some(Self::audit_heavy()),
            _ => None,
        }
    }

    fn from_weights(weights: impl IntoIterator<Item = (Priority, f64)>) -> Self {
        Self {
            weights: weights.into_iter().collect(),
        }
    }

    /// Build from string keys (config files, CLI). Unknown keys and
    /// out-of-range weights are rejected.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut intent = Self::balanced();
        for (key, value) in pairs {
            let priority: Priority = key.parse()?;
            intent = intent.with(priority, value)?;
        }
        Ok(intent)
    }

    /// Set one weight
    pub fn with(mut self, priority: Priority, weight: f64) -> Result<Self, ConfigurationError> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(ConfigurationError::WeightOutOfRange {
                priority: priority.to_string(),
                value: weight,
            });
        }
        self.weights.insert(priority, weight);
        Ok(self)
    }

    /// Effective weight, neutral when unset
    pub fn weight(&self, priority: Priority) -> f64 {
        self.weights.get(&priority).copied().unwrap_or(Self::NEUTRAL)
    }

    /// Check every explicit weight is within [0, 1]. Weights can only be set
    /// through validated paths, except when deserialized directly.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (priority, &value) in &self.weights {
            if !(0.0..=1.0).contains(&value) || value.is_nan() {
                return Err(ConfigurationError::WeightOutOfRange {
                    priority: priority.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }

    /// Effective weights for every priority, in declared order
    pub fn weights(&self) -> impl Iterator<Item = (Priority, f64)> + '_ {
        Priority::ALL.into_iter().map(move |p| (p, self.weight(p)))
    }
}

/// String-keyed intent as written in snapshots and other stored documents
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntentWeights {
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

impl TryFrom<IntentWeights> for Intent {
    type Error = ConfigurationError;

    fn try_from(stored: IntentWeights) -> Result<Self, Self::Error> {
        Intent::from_pairs(stored.weights.iter().map(|(key, &value)| (key.as_str(), value)))
    }
}

impl From<&Intent> for IntentWeights {
    fn from(intent: &Intent) -> Self {
        Self {
            weights: intent
                .weights
                .iter()
                .map(|(priority, &value)| (priority.to_string(), value))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_defaults_to_neutral() {
        let intent = Intent::balanced();
        for (_, weight) in intent.weights() {
            assert_eq!(weight, Intent::NEUTRAL);
        }
    }

    #[test]
    fn test_partial_pairs_keep_neutral_for_the_rest() {
        let intent = Intent::from_pairs([("auditability", 0.9), ("write-throughput", 0.1)]).unwrap();
        assert_eq!(intent.weight(Priority::Auditability), 0.9);
        assert_eq!(intent.weight(Priority::WriteThroughput), 0.1);
        assert_eq!(intent.weight(Priority::StorageCost), Intent::NEUTRAL);
    }

    #[test]
    fn test_unknown_priority_is_rejected() {
        let err = Intent::from_pairs([("vibes", 0.4)]).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownPriority(key) if key == "vibes"));
    }

    #[test]
    fn test_stored_weights_are_checked() {
        let stored: Intent = serde_json::from_str(r#"{"weights": {"auditability": 0.9}}"#).unwrap();
        assert_eq!(stored.weight(Priority::Auditability), 0.9);
        assert_eq!(IntentWeights::from(&stored).weights["auditability"], 0.9);

        let err = serde_json::from_str::<Intent>(r#"{"weights": {"auditability": 1.5}}"#).unwrap_err();
        assert!(err.to_string().contains("must be within [0, 1]"), "{err}");
    }

    #[test]
    fn test_out_of_range_weight_is_rejected() {
        let err = Intent::balanced().with(Priority::Integrity, 1.5).unwrap_err();
        assert!(matches!(err, ConfigurationError::WeightOutOfRange { .. }));
    }

    #[test]
    fn test_presets() {
        assert_eq!(Intent::preset("OLTP"), Some(Intent::oltp()));
        assert_eq!(Intent::preset("audit-heavy"), Some(Intent::audit_heavy()));
        assert!(Intent::preset("nonsense").is_none());
        assert!(Intent::analytics().validate().is_ok());
        for name in Intent::PRESETS {
            assert!(Intent::preset(name).is_some(), "{name}");
        }
    }
}
