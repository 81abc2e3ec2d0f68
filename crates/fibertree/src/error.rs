use crate::config::ConfigError;

/// Error type for recoverable setup failures.
///
/// Contract violations while encoding or merging (unordered operands, out of bounds handles,
/// role mismatches) are not represented here: they panic.
#[derive(Debug, thiserror::Error)]
pub enum FibertreeError {
    /// A format descriptor contained a tag with no known format.
    #[error("Unknown format tag '{0}'")]
    UnknownFormat(char),

    /// The format descriptor does not have one tag per tensor rank.
    #[error("Format descriptor declares {descriptor} ranks but the tensor has {tensor}")]
    DescriptorMismatch {
        /// Number of tags in the descriptor.
        descriptor: usize,
        /// Number of ranks in the tensor.
        tensor: usize,
    },

    /// A per-rank list does not have one entry per rank.
    #[error("Expected {expected} entries, one per rank, got {actual}")]
    RankMismatch {
        /// Number of ranks.
        expected: usize,
        /// Number of entries provided.
        actual: usize,
    },

    /// An explicit extent is smaller than the data of its rank.
    #[error("Extent {declared} of rank {rank} is smaller than the tensor extent {required}")]
    ExtentTooSmall {
        /// Rank whose extent was declared.
        rank: String,
        /// Declared extent.
        declared: usize,
        /// Extent the tensor data needs.
        required: usize,
    },

    /// The access cache needs room for at least one entry.
    #[error("Cache capacity must be at least one entry")]
    ZeroCacheCapacity,

    /// Configuration could not be read.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Encoded output could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias used by the fallible setup functions of this crate.
pub type FibertreeResult<T> = Result<T, FibertreeError>;
