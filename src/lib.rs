pub mod adapters;
pub mod domain;
pub mod infra;
pub mod services;

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
}
