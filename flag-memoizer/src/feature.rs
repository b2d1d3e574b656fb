use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Gate state of a single feature, as stored by an adapter.
///
/// `FeatureConfig::default()` is the configuration of a feature nobody has
/// touched yet: no boolean decision, no actors or groups, no percentages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub boolean: Option<bool>,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    #[serde(default)]
    pub actors: BTreeSet<String>,
    #[serde(default)]
    pub percentage_of_actors: Option<u32>,
    #[serde(default)]
    pub percentage_of_time: Option<u32>,
}

impl FeatureConfig {
    /// True if any gate could let a check through. Only used for diagnostics,
    /// adapters never look inside a config.
    pub fn is_enabled_anywhere(&self) -> bool {
        self.boolean == Some(true)
            || !self.groups.is_empty()
            || !self.actors.is_empty()
            || self.percentage_of_actors.is_some_and(|p| p > 0)
            || self.percentage_of_time.is_some_and(|p| p > 0)
    }
}

/// Result of a bulk read.
///
/// Looking up a key that is not in the map yields the default configuration
/// instead of nothing, so callers checking many unknown features do not fall
/// back to one adapter call each.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FeatureConfigs {
    configs: HashMap<String, FeatureConfig>,
    #[serde(skip)]
    default: FeatureConfig,
}

impl FeatureConfigs {
    pub fn new(configs: HashMap<String, FeatureConfig>) -> Self {
        Self::with_default(configs, FeatureConfig::default())
    }

    pub fn with_default(configs: HashMap<String, FeatureConfig>, default: FeatureConfig) -> Self {
        Self { configs, default }
    }

    /// Config for `key`, or the default config when the key was not loaded.
    pub fn get(&self, key: &str) -> &FeatureConfig {
        self.configs.get(key).unwrap_or(&self.default)
    }

    /// Config for `key` only if it was part of the loaded set.
    pub fn get_configured(&self, key: &str) -> Option<&FeatureConfig> {
        self.configs.get(key)
    }

    pub fn default_config(&self) -> &FeatureConfig {
        &self.default
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.configs.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.configs.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FeatureConfig)> {
        self.configs.iter()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn into_inner(self) -> HashMap<String, FeatureConfig> {
        self.configs
    }
}

impl FromIterator<(String, FeatureConfig)> for FeatureConfigs {
    fn from_iter<T: IntoIterator<Item = (String, FeatureConfig)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for FeatureConfigs {
    type Item = (String, FeatureConfig);
    type IntoIter = std::collections::hash_map::IntoIter<String, FeatureConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.configs.into_iter()
    }
}
