// Utility functions
pub mod error;
pub mod object_id;

pub use error::*;
pub use object_id::*;
