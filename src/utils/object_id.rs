use mongodb::bson::oid::ObjectId;

use super::error::AppError;

/// Parses a path id. A malformed id can never match a stored document, so it
/// is reported as missing rather than as a bad request.
pub fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw.trim()).map_err(|_| AppError::not_found(format!("{} not found", what)))
}
