#![warn(missing_docs)]

//! # Fibertree Metrics
//!
//! A process-wide counter bank fed by fiber traversals. Iterators record every coordinate
//! they touch against a named rank, together with the position it was read from and a trace
//! label, so that reuse and locality can be analysed after the fact.
//!
//! The bank is write-only from the point of view of the traversal code: nothing it records
//! changes what an iterator produces.

#[macro_use]
extern crate derive_new;

mod base;

pub use base::*;
