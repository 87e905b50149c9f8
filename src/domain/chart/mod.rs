//! Chart aggregate: viewport state, coordinate mapping and colors.

pub mod value_objects;
pub mod viewport;

pub use value_objects::*;
pub use viewport::*;
