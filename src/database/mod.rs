//! Persistence for the three collections (users, recipes, reviews).
//!
//! Services only see the [`Store`] trait. `MongoStore` backs production,
//! `MemoryStore` backs tests and `STORE_BACKEND=memory` local runs.

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};

use crate::models::{Recipe, RecipePatch, Review, User, UserPatch};
use crate::utils::AppResult;

pub const USERS: &str = "users";
pub const RECIPES: &str = "recipes";
pub const REVIEWS: &str = "reviews";

/// Which recipes to list. Every listing is newest first.
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeFilter {
    All,
    Owner(ObjectId),
    /// Case-insensitive literal substring over name, description, ingredients.
    Search(String),
    Ids(Vec<ObjectId>),
}

/// Which reviews to list. Every listing is newest first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReviewFilter {
    Recipe(ObjectId),
    Author(ObjectId),
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Round-trips to the backend; used by the health endpoint.
    async fn ping(&self) -> AppResult<()>;

    async fn find_user_by_subject(&self, subject: &str) -> AppResult<Option<User>>;

    async fn find_user(&self, id: ObjectId) -> AppResult<Option<User>>;

    async fn find_users(&self, ids: &[ObjectId]) -> AppResult<Vec<User>>;

    /// Fails with `AppError::Conflict` when the subject id or email is taken.
    async fn insert_user(&self, user: &User) -> AppResult<()>;

    /// Fails with `AppError::Conflict` when the new email is taken.
    async fn update_user(&self, id: ObjectId, patch: &UserPatch) -> AppResult<Option<User>>;

    /// Appends `recipe_id` to the saved list in one conditional write.
    /// Returns `false` when it was already there.
    async fn add_saved_recipe(&self, user_id: ObjectId, recipe_id: ObjectId) -> AppResult<bool>;

    async fn remove_saved_recipe(&self, user_id: ObjectId, recipe_id: ObjectId) -> AppResult<Option<User>>;

    /// Drops `recipe_id` from every user's saved list.
    async fn forget_saved_recipe(&self, recipe_id: ObjectId) -> AppResult<u64>;

    async fn list_recipes(&self, filter: &RecipeFilter) -> AppResult<Vec<Recipe>>;

    async fn find_recipe(&self, id: ObjectId) -> AppResult<Option<Recipe>>;

    async fn insert_recipe(&self, recipe: &Recipe) -> AppResult<()>;

    async fn update_recipe(&self, id: ObjectId, patch: &RecipePatch) -> AppResult<Option<Recipe>>;

    async fn delete_recipe(&self, id: ObjectId) -> AppResult<bool>;

    async fn push_review_ref(&self, recipe_id: ObjectId, review_id: ObjectId) -> AppResult<()>;

    async fn pull_review_ref(&self, recipe_id: ObjectId, review_id: ObjectId) -> AppResult<()>;

    async fn list_reviews(&self, filter: ReviewFilter) -> AppResult<Vec<Review>>;

    async fn find_review(&self, id: ObjectId) -> AppResult<Option<Review>>;

    async fn insert_review(&self, review: &Review) -> AppResult<()>;

    async fn update_review(
        &self,
        id: ObjectId,
        comment: &str,
        timestamp: BsonDateTime,
    ) -> AppResult<Option<Review>>;

    async fn delete_review(&self, id: ObjectId) -> AppResult<bool>;

    async fn delete_reviews_for_recipe(&self, recipe_id: ObjectId) -> AppResult<u64>;
}
