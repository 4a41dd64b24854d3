use mongodb::bson::oid::ObjectId;

use crate::models::User;
use crate::utils::{AppError, AppResult};

/// Owner / non-owner check guarding every recipe and review mutation.
pub fn ensure_owner(owner: &ObjectId, user: &User) -> AppResult<()> {
    if *owner == user.id {
        Ok(())
    } else {
        log::warn!("🚫 User {} is not the owner ({})", user.id.to_hex(), owner.to_hex());
        Err(AppError::Forbidden("User not authorized".to_string()))
    }
}
