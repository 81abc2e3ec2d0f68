//! Lazy merges over ordered fibers.
//!
//! Two-operand merges share one [MergeCursor] sweep and differ only in which steps they keep
//! and which side they drain. Their results are [LazyFiber]s that re-run the merge on every
//! traversal and can feed further merges.

mod assign;
mod base;
mod coiter;
mod cursor;
mod lazy;
mod nary;
mod operators;

pub use assign::*;
pub use base::*;
pub use coiter::*;
pub use cursor::*;
pub use lazy::*;
pub use nary::*;
pub use operators::*;
