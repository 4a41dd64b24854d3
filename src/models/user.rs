use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

use super::to_chrono;

/// Local user record, linked to the identity provider through `auth0_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    /// Identity-provider subject id. Only identity reconciliation writes it.
    pub auth0_id: String,

    pub email: String,

    pub username: String,

    #[serde(default)]
    pub picture: Option<String>,

    /// Bookmarked recipes, kept duplicate-free.
    #[serde(default)]
    pub saved_recipes: Vec<ObjectId>,

    pub created_at: BsonDateTime,
}

/// Partial profile update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none()
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(username) = &self.username {
            user.username = username.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecipeRequest {
    pub recipe_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub auth0_id: String,
    pub email: String,
    pub username: String,
    pub picture: Option<String>,
    pub saved_recipes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id.to_hex(),
            auth0_id: user.auth0_id,
            email: user.email,
            username: user.username,
            picture: user.picture,
            saved_recipes: user.saved_recipes.iter().map(|id| id.to_hex()).collect(),
            created_at: to_chrono(user.created_at),
        }
    }
}

/// Public view of a review author.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AuthorSummary {
    pub id: String,
    pub username: String,
    pub picture: Option<String>,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        AuthorSummary {
            id: user.id.to_hex(),
            username: user.username.clone(),
            picture: user.picture.clone(),
        }
    }
}
