mod base;
mod coord_list;
mod kind;
mod uncompressed;

pub use base::{
    FiberFormat, FiberId, FormatCore, FormatFiber, FormatPayload, Handle, Insertion, Occupancy,
};
pub use coord_list::*;
pub use kind::*;
pub use uncompressed::*;
