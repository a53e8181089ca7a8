//! Per-run shared context: the write-once store, immutable snapshots,
//! and run identity.

mod identity;
mod snapshot;
mod store;

pub use identity::RunIdentity;
pub use snapshot::ContextSnapshot;
pub use store::ContextStore;
