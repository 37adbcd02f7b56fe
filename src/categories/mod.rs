use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod services;
pub mod slug;

pub use slug::CategoryInput;

pub fn router() -> Router<AppState> {
    handlers::category_routes()
}
