//! Utility implementations: in-memory legacy engine and static
//! collaborators for testing and development

pub mod memory_engine;

pub use memory_engine::{
    FixtureBuilder, LineRow, MemoryIsamEngine, StaticAddresses, StaticLetterheads,
};
