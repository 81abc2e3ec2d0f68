mod base;
mod iter;
mod payload;
mod tensor;

pub use base::*;
pub use iter::{FiberElements, FiberIter, IterShapeRef, ShapeIter};
pub use payload::*;
pub use tensor::*;

pub(crate) use iter::Ticker;
