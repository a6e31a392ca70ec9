pub mod docker;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod runtime;

pub use docker::*;
pub use error::*;
pub use lifecycle::*;
pub use memory::*;
pub use runtime::*;
