pub mod event_guests;
pub mod event_organizers;
pub mod events;
pub mod promotion_redemptions;
pub mod promotions;
pub mod transaction_promotions;
pub mod transactions;
pub mod users;

pub use event_guests as event_guest_entity;
pub use event_organizers as event_organizer_entity;
pub use events as event_entity;
pub use promotion_redemptions as promotion_redemption_entity;
pub use promotions as promotion_entity;
pub use transaction_promotions as transaction_promotion_entity;
pub use transactions as transaction_entity;
pub use users as user_entity;

pub use promotions::PromotionType;
pub use transactions::TransactionType;
pub use users::Role;
