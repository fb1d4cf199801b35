use serde::{Deserialize, Serialize};
use crate::ResolveOptions;

/**
 * Tuning and resolution settings of an [`AssetManager`](crate::AssetManager).
 * Missing fields fall back to their defaults when deserialized.
 */
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub max_loads_per_tick: usize,      // Requests admitted into loading per call to advance().
    pub loose_root: Option<String>,     // Marker that routes any path containing it to the loose-file store.
    pub simulate_bundles: bool,         // Serves bundled paths through the direct source.
}

impl AssetConfig {

    pub const DEFAULT_MAX_LOADS_PER_TICK: usize = 3;

    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            loose_root: self.loose_root.clone(),
            simulate_bundles: self.simulate_bundles,
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            max_loads_per_tick: Self::DEFAULT_MAX_LOADS_PER_TICK,
            loose_root: None,
            simulate_bundles: false,
        }
    }
}


#[cfg(test)]
mod test {
    use super::AssetConfig;

    #[test]
    fn partial_yaml_uses_defaults() {
        let config = AssetConfig::from_yaml("loose_root: /Resources/\n").unwrap();
        assert_eq!(3, config.max_loads_per_tick);
        assert_eq!(Some("/Resources/"), config.loose_root.as_deref());
        assert!(!config.simulate_bundles);
    }

    #[test]
    fn full_yaml() {
        let source = "
max_loads_per_tick: 2
simulate_bundles: true
";
        let config = AssetConfig::from_yaml(source).unwrap();
        assert_eq!(2, config.max_loads_per_tick);
        assert!(config.simulate_bundles);
        assert!(config.resolve_options().simulate_bundles);
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(AssetConfig::from_yaml("max_loads_per_tick: many").is_err());
    }
}
