pub mod authorization;
pub mod balance_store;
pub mod event_pool;
pub mod event_service;
pub mod ledger_service;
pub mod promotion_evaluator;
pub mod promotion_service;
pub mod redemption_workflow;
pub mod suspicious_gate;
pub mod transfer_engine;

pub use authorization::{Permission, authorize};
pub use event_service::*;
pub use ledger_service::*;
pub use promotion_service::*;
