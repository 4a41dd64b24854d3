pub mod recipe;
pub mod restaurant;
pub mod review;
pub mod user;

pub use recipe::*;
pub use restaurant::*;
pub use review::*;
pub use user::*;

use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;

pub(crate) fn to_chrono(value: BsonDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(value.timestamp_millis()).unwrap_or_default()
}
