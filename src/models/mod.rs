pub mod actor;
pub mod event;
pub mod promotion;
pub mod transaction;

pub use actor::*;
pub use event::*;
pub use promotion::*;
pub use transaction::*;
