// core.rs splits ledger responsibilities into submodules: block and ledger
// types, chain verification, and ledger lifecycle state.
pub mod chain;
pub mod state;
pub mod validation;

pub use chain::*;
pub use state::*;
pub use validation::*;
