//! Vaultsync Conflict - Placement collision handling
//!
//! Provides:
//! - Collision planning for add / copy / move destinations
//! - Numbered `name (n).ext` generation
//! - Uniform batch resolution (overwrite, rename, skip)

pub mod error;
pub mod namer;
pub mod resolver;

pub use error::ConflictError;
pub use namer::NumberedNamer;
pub use resolver::ConflictResolver;
