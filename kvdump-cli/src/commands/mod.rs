pub mod dump;
pub mod restore;
pub mod verify;

pub use dump::*;
pub use restore::*;
pub use verify::*;
