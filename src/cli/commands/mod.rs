//! CLI command implementations

pub mod identify;
pub mod key;
pub mod prune;
pub mod restore;
pub mod save;

pub use identify::execute as identify;
pub use key::execute as key;
pub use prune::execute as prune;
pub use restore::execute as restore;
pub use save::execute as save;
