pub mod error;
pub mod event;
pub mod id;
pub mod order;
pub mod phone;
