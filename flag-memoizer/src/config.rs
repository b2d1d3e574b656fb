use envconfig::Envconfig;
use once_cell::sync::Lazy;
use std::ops::Deref;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlexBool(pub bool);

impl FromStr for FlexBool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(FlexBool(true)),
            "false" | "0" | "no" | "off" | "" => Ok(FlexBool(false)),
            _ => Err(format!("Invalid boolean value: {}", s)),
        }
    }
}

impl From<FlexBool> for bool {
    fn from(flex: FlexBool) -> Self {
        flex.0
    }
}

impl Deref for FlexBool {
    type Target = bool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Comma separated feature keys, blanks dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureList(pub Vec<String>);

impl FromStr for FeatureList {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let keys: Vec<String> = s
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect();

        if let Some(bad) = keys.iter().find(|key| key.chars().any(char::is_whitespace)) {
            return Err(format!("Invalid feature key: {:?}", bad));
        }
        Ok(FeatureList(keys))
    }
}

impl FeatureList {
    pub fn as_strs(&self) -> Vec<&str> {
        self.0.iter().map(String::as_str).collect()
    }
}

impl Deref for FeatureList {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(from = "DEBUG", default = "false")]
    pub debug: FlexBool,

    #[envconfig(from = "SEED_FEATURES", default = "search,checkout-v2,dark-mode")]
    pub seed_features: FeatureList,

    #[envconfig(from = "ENABLED_FEATURES", default = "search")]
    pub enabled_features: FeatureList,

    #[envconfig(from = "LOOKUP_FEATURES", default = "search,checkout-v2,unknown-flag")]
    pub lookup_features: FeatureList,

    #[envconfig(from = "UNITS_OF_WORK", default = "3")]
    pub units_of_work: usize,
}

impl Config {
    pub fn default_test_config() -> Self {
        Self {
            debug: FlexBool(false),
            seed_features: FeatureList(vec!["a".to_string(), "b".to_string()]),
            enabled_features: FeatureList(vec!["a".to_string()]),
            lookup_features: FeatureList(vec!["a".to_string(), "c".to_string()]),
            units_of_work: 2,
        }
    }
}

pub static DEFAULT_TEST_CONFIG: Lazy<Config> = Lazy::new(Config::default_test_config);
