//! Utility types shared by the graph, property and codec layers.
//!
//! - [`ComponentType`] / [`ElementType`] - accessor storage tags
//! - [`TypedArray`] - flat numeric arrays with little-endian codecs
//! - [`Error`] / [`Result`] - error handling
//! - Math re-exports from glam and image header helpers

mod pod;
mod data_type;
mod array;
mod error;
mod math;
pub mod image;

pub use pod::*;
pub use data_type::*;
pub use array::*;
pub use error::*;
pub use math::*;
