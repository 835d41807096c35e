pub mod collection;
pub mod error;
pub mod object;
pub mod sync;

pub use collection::Collection;
pub use error::*;
pub use object::{Handle, Object};
