//! Production pipeline stages

use serde::{Deserialize, Serialize};

/// One step of the fixed production pipeline
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Discovery,
    Design,
    Sourcing,
    Production,
    Delivery,
    Complete,
}

impl Stage {
    /// All stages in pipeline order
    pub fn all() -> &'static [Stage] {
        &[
            Stage::Discovery,
            Stage::Design,
            Stage::Sourcing,
            Stage::Production,
            Stage::Delivery,
            Stage::Complete,
        ]
    }

    /// Stable key used in configuration files and the state store
    pub fn key(&self) -> &'static str {
        match self {
            Stage::Discovery => "discovery",
            Stage::Design => "design",
            Stage::Sourcing => "sourcing",
            Stage::Production => "production",
            Stage::Delivery => "delivery",
            Stage::Complete => "complete",
        }
    }

    /// Position in the pipeline (1-based)
    pub fn sort_order(&self) -> u8 {
        match self {
            Stage::Discovery => 1,
            Stage::Design => 2,
            Stage::Sourcing => 3,
            Stage::Production => 4,
            Stage::Delivery => 5,
            Stage::Complete => 6,
        }
    }

    /// The stage that follows this one, or None for the terminal stage
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Discovery => Some(Stage::Design),
            Stage::Design => Some(Stage::Sourcing),
            Stage::Sourcing => Some(Stage::Production),
            Stage::Production => Some(Stage::Delivery),
            Stage::Delivery => Some(Stage::Complete),
            Stage::Complete => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "discovery" => Ok(Stage::Discovery),
            "design" => Ok(Stage::Design),
            "sourcing" => Ok(Stage::Sourcing),
            "production" => Ok(Stage::Production),
            "delivery" => Ok(Stage::Delivery),
            "complete" => Ok(Stage::Complete),
            _ => Err(format!("Unknown stage: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_order_matches_next() {
        let stages = Stage::all();
        for pair in stages.windows(2) {
            assert_eq!(pair[0].next(), Some(pair[1]));
            assert!(pair[0].sort_order() < pair[1].sort_order());
        }
        assert!(Stage::Complete.is_terminal());
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Production".parse::<Stage>().unwrap(), Stage::Production);
        assert!("shipping".parse::<Stage>().is_err());
    }
}
