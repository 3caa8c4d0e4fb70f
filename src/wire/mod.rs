//! The wire codec and instruction catalog.
//!
//! This protocol's element lengths are counted in Unicode code points
//! rather than bytes, so [`decoder::Decoder`] is a standalone state
//! machine over `&str` chunks rather than an implementor of
//! `tokio_util::codec::Decoder`.

pub mod decoder;
pub mod encoder;
pub mod instructions;
pub mod value;

pub use decoder::{Decoder, RawInstruction};
pub use encoder::encode;
pub use instructions::{parse, CatalogError, ServerInstruction};
pub use value::Value;
