//! Owned wrappers over the legacy engine's handle-based API

pub mod cursor;
pub mod fields;

pub use cursor::{Database, Search};
pub use fields::{FieldRef, RowReader, RowWriter};
