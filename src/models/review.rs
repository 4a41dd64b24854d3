use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

use super::{to_chrono, AuthorSummary, RecipeSummary};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Author reference
    pub user_id: ObjectId,
    pub recipe_id: ObjectId,
    pub comment: String,
    pub timestamp: BsonDateTime,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub recipe_id: String,
    pub comment: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateReviewRequest {
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: String,
    pub user_id: String,
    pub recipe_id: String,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe: Option<RecipeSummary>,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        ReviewResponse {
            id: review.id.to_hex(),
            user_id: review.user_id.to_hex(),
            recipe_id: review.recipe_id.to_hex(),
            comment: review.comment,
            timestamp: to_chrono(review.timestamp),
            author: None,
            recipe: None,
        }
    }
}
