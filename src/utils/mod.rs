pub mod clock;
pub mod pagination;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use pagination::{PaginatedResponse, PaginationInfo, PaginationParams};
