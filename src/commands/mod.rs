//! CLI command implementations
//!
//! Commands are generic over the registry, device opener and system
//! controller so they run unchanged against the Linux MTD backend or the
//! in-memory emulator.

mod write;

pub use write::{run_write, IndicatifProgress, WriteRequest};
