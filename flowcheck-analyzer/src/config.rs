use strum_macros::{Display, EnumString};

/// How blocks are visited by the initialization analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum TraversalMode {
    /// Each block once in stored order. A predecessor that comes later in
    /// the order contributes nothing, so information along back edges is lost.
    #[default]
    SinglePass,
    /// Iterate until no block lattice changes, then record diagnostics in one
    /// more pass.
    Fixpoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ReachabilityMode {
    /// The entry, its direct callees and their direct callees.
    #[default]
    TwoHop,
    Transitive,
}

pub const DEFAULT_ENTRY_NAME: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub traversal: TraversalMode,
    pub reachability: ReachabilityMode,
    pub entry_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            traversal: TraversalMode::default(),
            reachability: ReachabilityMode::default(),
            entry_name: DEFAULT_ENTRY_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlatConfig {
    pub fixpoint: bool,
    pub transitive: bool,
}

impl From<FlatConfig> for Config {
    fn from(config: FlatConfig) -> Self {
        Self {
            traversal: if config.fixpoint {
                TraversalMode::Fixpoint
            } else {
                TraversalMode::SinglePass
            },
            reachability: if config.transitive {
                ReachabilityMode::Transitive
            } else {
                ReachabilityMode::TwoHop
            },
            ..Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_flat_config() {
        let config = Config::from(FlatConfig {
            fixpoint: true,
            transitive: false,
        });
        assert_eq!(config.traversal, TraversalMode::Fixpoint);
        assert_eq!(config.reachability, ReachabilityMode::TwoHop);
        assert_eq!(config.entry_name, "main");
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(TraversalMode::SinglePass.to_string(), "single-pass");
        assert_eq!(
            ReachabilityMode::from_str("transitive"),
            Ok(ReachabilityMode::Transitive)
        );
    }
}
