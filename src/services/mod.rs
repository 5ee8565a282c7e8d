pub mod reconcile;
pub mod reporter;
