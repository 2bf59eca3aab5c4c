// Thin re-export module: implementation is in `blockchain/core.rs`, split into
// block/ledger types, verification and lifecycle state.

pub mod core;
pub use self::core::*;
