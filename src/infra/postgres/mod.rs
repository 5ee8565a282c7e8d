pub mod event_repo;
pub mod order_repo;
