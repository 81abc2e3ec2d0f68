mod base;
mod context;
mod output;
mod tensor;

pub use base::*;
pub use context::*;
pub use output::*;
pub use tensor::*;
