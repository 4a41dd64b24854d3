pub mod identity_service;
pub mod ownership;
pub mod recipe_service;
pub mod restaurant_service;
pub mod review_service;
pub mod token_service;
pub mod upload_service;
pub mod user_service;

pub use restaurant_service::{RestaurantLookup, YelpClient};
pub use token_service::{IdentityClaims, JwksVerifier, SecretVerifier, TokenVerifier};
pub use upload_service::UploadStore;
