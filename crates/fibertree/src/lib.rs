#![warn(missing_docs)]

//! # Fibertree
//!
//! Models sparse tensors as trees of fibers, one rank per level, and estimates what storing
//! and walking them costs.
//!
//! * [codec] encodes a [Tensor] rank by rank into concrete layouts ("C" coordinate lists and
//!   "U" dense arrays) picked by a format descriptor such as `"CU"`, producing flat output
//!   arrays and per-fiber access counters.
//! * [merge] combines ordered fibers lazily: intersection, union, xor, difference, populate
//!   and dense co-iteration.
//! * Traversals feed the process-wide counter bank re-exported as [metrics] while a collection
//!   is active.

#[macro_use]
extern crate derive_new;

/// Shared LRU access cache modelling an on-chip buffer.
pub mod cache;
/// Recursive encoder driving the formats of every rank.
pub mod codec;
/// Codec configuration and persistence.
pub mod config;
/// Fibers, payloads, source tensors and their iterators.
pub mod fiber;
/// Concrete fiber layouts and the handle based access they share.
pub mod format;
/// Lazy merge algebra over ordered fibers.
pub mod merge;
/// Simulated memory traffic counters.
pub mod stats;

mod error;

pub use error::*;

pub use codec::{Codec, CodecOutput, EncodedTensor};
pub use config::{CodecConfig, Config, OccupancyPolicy};
pub use fiber::{Coord, DenseArray, Fiber, Payload, Tensor};
pub use format::{FormatDescriptor, FormatKind};
pub use merge::{LazyFiber, Operand};

/// Counter bank fed by traversals.
pub use fibertree_metrics as metrics;
