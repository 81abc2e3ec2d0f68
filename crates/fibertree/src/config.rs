use core::fmt::{Debug, Display};
use serde::{Deserialize, Serialize};

/// Configuration IO error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid format.
    #[error("Config error => Invalid format: {0}")]
    InvalidFormat(String),

    /// File not found.
    #[error("Config error => File not found: {0}")]
    FileNotFound(String),
}

/// Configuration trait.
pub trait Config: Debug + Serialize + serde::de::DeserializeOwned {
    /// Saves the configuration to a file.
    fn save<P: AsRef<std::path::Path>>(&self, file: P) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(file, json)
    }

    /// Loads the configuration from a file.
    fn load<P: AsRef<std::path::Path>>(file: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(file.as_ref())
            .map_err(|_| ConfigError::FileNotFound(file.as_ref().to_string_lossy().to_string()))?;
        config_from_str(&content)
    }

    /// Loads the configuration from a binary buffer.
    fn load_binary(data: &[u8]) -> Result<Self, ConfigError> {
        let content = core::str::from_utf8(data).map_err(|_| {
            ConfigError::InvalidFormat("Could not parse data as utf-8.".to_string())
        })?;
        config_from_str(content)
    }
}

/// Converts a configuration to a JSON string.
pub fn config_to_json<C: Config>(config: &C) -> Result<String, ConfigError> {
    serde_json::to_string_pretty(config).map_err(|err| ConfigError::InvalidFormat(format!("{err}")))
}

fn config_from_str<C: Config>(content: &str) -> Result<C, ConfigError> {
    serde_json::from_str(content).map_err(|err| ConfigError::InvalidFormat(format!("{err}")))
}

/// What a non-leaf rank records for each child fiber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OccupancyPolicy {
    /// Running total of child occupancy, which makes every entry an offset into the next rank.
    #[default]
    Cumulative,
    /// Occupancy of each child on its own.
    PerFiber,
}

/// Settings for encoding a tensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    pub(crate) descriptor: String,
    pub(crate) cache_size: usize,
    // One policy per rank, cumulative everywhere when absent.
    pub(crate) occupancy: Option<Vec<OccupancyPolicy>>,
    // Explicit extents overriding the tensor shape.
    pub(crate) shape: Option<Vec<usize>>,
}

impl Config for CodecConfig {}

impl Display for CodecConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let descriptor = &self.descriptor;
        let cache_size = self.cache_size;
        let occupancy = &self.occupancy;
        let shape = &self.shape;

        write!(
            f,
            r#"
CodecConfig {{
    descriptor: {descriptor:?},
    cache_size: {cache_size:?},
    occupancy: {occupancy:?},
    shape: {shape:?},
}}
"#
        )
    }
}

impl CodecConfig {
    /// Default number of entries held by the access cache.
    pub const DEFAULT_CACHE_SIZE: usize = 32;

    /// Creates a config for the given format descriptor, such as `"CU"`.
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into(),
            cache_size: Self::DEFAULT_CACHE_SIZE,
            occupancy: None,
            shape: None,
        }
    }

    /// Sets the number of entries the shared access cache can hold.
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    /// Selects the occupancy policy of every rank, outermost first.
    pub fn with_occupancy(mut self, occupancy: Vec<OccupancyPolicy>) -> Self {
        self.occupancy = Some(occupancy);
        self
    }

    /// Overrides the extent of every rank, outermost first.
    pub fn with_shape(mut self, shape: Vec<usize>) -> Self {
        self.shape = Some(shape);
        self
    }

    /// The format descriptor.
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// The access cache capacity.
    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    /// The explicit extents, if any.
    pub fn shape(&self) -> Option<&[usize]> {
        self.shape.as_deref()
    }

    /// The occupancy policy of every rank, if any were set.
    pub fn occupancy(&self) -> Option<&[OccupancyPolicy]> {
        self.occupancy.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_json() {
        let config = CodecConfig::new("CU")
            .with_cache_size(8)
            .with_occupancy(vec![OccupancyPolicy::PerFiber, OccupancyPolicy::Cumulative])
            .with_shape(vec![4, 6]);

        let json = config_to_json(&config).unwrap();
        let loaded = CodecConfig::load_binary(json.as_bytes()).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let config = CodecConfig::new("CC");

        assert_eq!(config.cache_size(), 32);
        assert_eq!(config.occupancy(), None);
        assert_eq!(config.shape(), None);
    }

    #[test]
    fn invalid_json_is_reported() {
        let result = CodecConfig::load_binary(b"{ \"descriptor\": 3 }");

        assert!(matches!(result, Err(ConfigError::InvalidFormat(_))));
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct PairKeyed {
        entries: std::collections::HashMap<(u8, u8), u8>,
    }

    impl Config for PairKeyed {}

    #[test]
    fn unserializable_config_is_reported() {
        let config = PairKeyed {
            entries: [((1, 2), 3)].into_iter().collect(),
        };
        let file = std::env::temp_dir().join("fibertree_pair_keyed_config.json");

        assert!(matches!(
            config_to_json(&config),
            Err(ConfigError::InvalidFormat(_))
        ));
        assert!(config.save(&file).is_err());
    }

    #[test]
    fn missing_file_is_reported() {
        let result = CodecConfig::load("/definitely/not/here/codec.json");

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
