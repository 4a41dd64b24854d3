pub mod auth;

pub use auth::{optional_user, AuthMiddleware, CurrentUser};
