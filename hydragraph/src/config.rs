use std::num::NonZeroUsize;
use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// Configuration of schema assembly and of the per-request node loaders.
///
/// ```yaml
/// transform:
///   generate_opaque_types: true
/// loader:
///   cache: true
///   max_batch_size: 100
///   batch_window: 2ms
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// Schema assembly
    pub transform: TransformOptions,
    /// Node loading
    pub loader: LoaderOptions,
}

impl Configuration {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct TransformOptions {
    /// Generate an `Opaque{Interface}` object type for every discriminated interface, used when the
    /// discriminated value doesn't match any declared implementation.
    pub generate_opaque_types: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct LoaderOptions {
    /// Loads of the same node id within one request share a single fetch.
    pub cache: bool,
    /// Dispatch a wave as soon as it holds this many loads.
    pub max_batch_size: Option<NonZeroUsize>,
    /// How long loads are collected before a wave is dispatched. Zero dispatches on the next
    /// scheduler tick.
    #[serde(with = "humantime_serde")]
    #[schemars(with = "String")]
    pub batch_window: Duration,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            cache: true,
            max_batch_size: None,
            batch_window: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_configuration_uses_defaults() {
        assert_eq!(Configuration::from_yaml("{}").unwrap(), Configuration::default());
        assert!(!Configuration::default().transform.generate_opaque_types);
        assert!(Configuration::default().loader.cache);
    }

    #[test]
    fn reads_yaml() {
        let config = Configuration::from_yaml(
            r#"
transform:
  generate_opaque_types: true
loader:
  cache: false
  max_batch_size: 50
  batch_window: 5ms
"#,
        )
        .unwrap();
        assert_eq!(
            config,
            Configuration {
                transform: TransformOptions {
                    generate_opaque_types: true
                },
                loader: LoaderOptions {
                    cache: false,
                    max_batch_size: NonZeroUsize::new(50),
                    batch_window: Duration::from_millis(5),
                },
            }
        );
    }

    #[test]
    fn rejects_unknown_fields() {
        let error = Configuration::from_yaml("loader:\n  batch_size: 10\n").unwrap_err();
        assert!(error.to_string().contains("unknown field `batch_size`"));
    }
}
