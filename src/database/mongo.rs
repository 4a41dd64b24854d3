use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};

use super::{RecipeFilter, ReviewFilter, Store, RECIPES, REVIEWS, USERS};
use crate::models::{Recipe, RecipePatch, Review, User, UserPatch};
use crate::utils::{AppError, AppResult};

const DEFAULT_DATABASE: &str = "smartrecipe";
const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str) -> AppResult<Self> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(2);
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));
        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        let db_name = client_options
            .default_database
            .clone()
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let client = Client::with_options(client_options)?;
        let db = client.database(&db_name);

        // Test connection
        db.list_collection_names().await?;

        let store = Self { db };
        store.ensure_indexes().await?;

        Ok(store)
    }

    /// Creates the unique identity indexes and the listing indexes.
    async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("🔧 Creating database indexes...");

        let unique = || IndexOptions::builder().unique(true).build();

        let users = self.db.collection::<Document>(USERS);
        users
            .create_index(IndexModel::builder().keys(doc! { "auth0Id": 1 }).options(unique()).build())
            .await?;
        users
            .create_index(IndexModel::builder().keys(doc! { "email": 1 }).options(unique()).build())
            .await?;
        log::info!("   ✅ Index created: users(auth0Id) unique, users(email) unique");

        let recipes = self.db.collection::<Document>(RECIPES);
        for keys in [doc! { "userId": 1 }, doc! { "createdAt": -1 }] {
            if let Err(e) = recipes.create_index(IndexModel::builder().keys(keys).build()).await {
                log::debug!("   ℹ️  Index already exists: {}", e);
            }
        }
        log::info!("   ✅ Index created: recipes(userId), recipes(createdAt)");

        let reviews = self.db.collection::<Document>(REVIEWS);
        for keys in [doc! { "recipeId": 1 }, doc! { "userId": 1 }] {
            if let Err(e) = reviews.create_index(IndexModel::builder().keys(keys).build()).await {
                log::debug!("   ℹ️  Index already exists: {}", e);
            }
        }
        log::info!("   ✅ Index created: reviews(recipeId), reviews(userId)");

        log::info!("✅ Database indexes ready");
        Ok(())
    }

    fn users(&self) -> Collection<User> {
        self.db.collection(USERS)
    }

    fn recipes(&self) -> Collection<Recipe> {
        self.db.collection(RECIPES)
    }

    fn reviews(&self) -> Collection<Review> {
        self.db.collection(REVIEWS)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

fn conflict_or_database(err: mongodb::error::Error, what: &str) -> AppError {
    if is_duplicate_key(&err) {
        AppError::Conflict(format!("{} already exists", what))
    } else {
        AppError::from(err)
    }
}

/// Escapes regex metacharacters so user input is matched literally.
pub fn escape_regex(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if "\\.^$|?*+()[]{}-/".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn recipe_filter_doc(filter: &RecipeFilter) -> Document {
    match filter {
        RecipeFilter::All => doc! {},
        RecipeFilter::Owner(owner) => doc! { "userId": owner },
        RecipeFilter::Search(query) => {
            let pattern = escape_regex(query);
            doc! {
                "$or": [
                    { "recipeName": { "$regex": &pattern, "$options": "i" } },
                    { "description": { "$regex": &pattern, "$options": "i" } },
                    { "ingredients": { "$regex": &pattern, "$options": "i" } },
                ]
            }
        }
        RecipeFilter::Ids(ids) => doc! { "_id": { "$in": ids.clone() } },
    }
}

fn recipe_update_doc(patch: &RecipePatch) -> Document {
    let mut set = Document::new();
    let mut unset = Document::new();

    if let Some(name) = &patch.recipe_name {
        set.insert("recipeName", name.as_str());
    }
    if let Some(description) = &patch.description {
        set.insert("description", description.as_str());
    }
    if let Some(cooking_time) = patch.cooking_time {
        set.insert("cookingTime", i64::from(cooking_time));
    }
    match patch.calories {
        Some(Some(calories)) => {
            set.insert("calories", i64::from(calories));
        }
        Some(None) => {
            unset.insert("calories", "");
        }
        None => {}
    }
    if let Some(ingredients) = &patch.ingredients {
        set.insert("ingredients", ingredients.clone());
    }
    if let Some(instructions) = &patch.instructions {
        set.insert("instructions", instructions.as_str());
    }
    if let Some(image) = &patch.image {
        set.insert("image", image.as_str());
    }

    let mut update = Document::new();
    if !set.is_empty() {
        update.insert("$set", set);
    }
    if !unset.is_empty() {
        update.insert("$unset", unset);
    }
    update
}

#[async_trait]
impl Store for MongoStore {
    async fn ping(&self) -> AppResult<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn find_user_by_subject(&self, subject: &str) -> AppResult<Option<User>> {
        Ok(self.users().find_one(doc! { "auth0Id": subject }).await?)
    }

    async fn find_user(&self, id: ObjectId) -> AppResult<Option<User>> {
        Ok(self.users().find_one(doc! { "_id": id }).await?)
    }

    async fn find_users(&self, ids: &[ObjectId]) -> AppResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let cursor = self.users().find(doc! { "_id": { "$in": ids.to_vec() } }).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_user(&self, user: &User) -> AppResult<()> {
        self.users()
            .insert_one(user)
            .await
            .map_err(|e| conflict_or_database(e, "User"))?;
        Ok(())
    }

    async fn update_user(&self, id: ObjectId, patch: &UserPatch) -> AppResult<Option<User>> {
        let mut set = Document::new();
        if let Some(username) = &patch.username {
            set.insert("username", username.as_str());
        }
        if let Some(email) = &patch.email {
            set.insert("email", email.as_str());
        }
        if set.is_empty() {
            return self.find_user(id).await;
        }

        self.users()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| conflict_or_database(e, "Email"))
    }

    async fn add_saved_recipe(&self, user_id: ObjectId, recipe_id: ObjectId) -> AppResult<bool> {
        let result = self
            .users()
            .update_one(
                doc! { "_id": user_id, "savedRecipes": { "$ne": recipe_id } },
                doc! { "$push": { "savedRecipes": recipe_id } },
            )
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn remove_saved_recipe(&self, user_id: ObjectId, recipe_id: ObjectId) -> AppResult<Option<User>> {
        Ok(self
            .users()
            .find_one_and_update(
                doc! { "_id": user_id },
                doc! { "$pull": { "savedRecipes": recipe_id } },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn forget_saved_recipe(&self, recipe_id: ObjectId) -> AppResult<u64> {
        let result = self
            .users()
            .update_many(
                doc! { "savedRecipes": recipe_id },
                doc! { "$pull": { "savedRecipes": recipe_id } },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn list_recipes(&self, filter: &RecipeFilter) -> AppResult<Vec<Recipe>> {
        if let RecipeFilter::Ids(ids) = filter {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
        }
        let cursor = self
            .recipes()
            .find(recipe_filter_doc(filter))
            .sort(doc! { "createdAt": -1, "_id": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_recipe(&self, id: ObjectId) -> AppResult<Option<Recipe>> {
        Ok(self.recipes().find_one(doc! { "_id": id }).await?)
    }

    async fn insert_recipe(&self, recipe: &Recipe) -> AppResult<()> {
        self.recipes().insert_one(recipe).await?;
        Ok(())
    }

    async fn update_recipe(&self, id: ObjectId, patch: &RecipePatch) -> AppResult<Option<Recipe>> {
        let update = recipe_update_doc(patch);
        if update.is_empty() {
            return self.find_recipe(id).await;
        }
        Ok(self
            .recipes()
            .find_one_and_update(doc! { "_id": id }, update)
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn delete_recipe(&self, id: ObjectId) -> AppResult<bool> {
        let result = self.recipes().delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count == 1)
    }

    async fn push_review_ref(&self, recipe_id: ObjectId, review_id: ObjectId) -> AppResult<()> {
        self.recipes()
            .update_one(doc! { "_id": recipe_id }, doc! { "$push": { "reviews": review_id } })
            .await?;
        Ok(())
    }

    async fn pull_review_ref(&self, recipe_id: ObjectId, review_id: ObjectId) -> AppResult<()> {
        self.recipes()
            .update_one(doc! { "_id": recipe_id }, doc! { "$pull": { "reviews": review_id } })
            .await?;
        Ok(())
    }

    async fn list_reviews(&self, filter: ReviewFilter) -> AppResult<Vec<Review>> {
        let filter = match filter {
            ReviewFilter::Recipe(recipe_id) => doc! { "recipeId": recipe_id },
            ReviewFilter::Author(user_id) => doc! { "userId": user_id },
        };
        let cursor = self
            .reviews()
            .find(filter)
            .sort(doc! { "timestamp": -1, "_id": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_review(&self, id: ObjectId) -> AppResult<Option<Review>> {
        Ok(self.reviews().find_one(doc! { "_id": id }).await?)
    }

    async fn insert_review(&self, review: &Review) -> AppResult<()> {
        self.reviews().insert_one(review).await?;
        Ok(())
    }

    async fn update_review(
        &self,
        id: ObjectId,
        comment: &str,
        timestamp: BsonDateTime,
    ) -> AppResult<Option<Review>> {
        Ok(self
            .reviews()
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": { "comment": comment, "timestamp": timestamp } },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn delete_review(&self, id: ObjectId) -> AppResult<bool> {
        let result = self.reviews().delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count == 1)
    }

    async fn delete_reviews_for_recipe(&self, recipe_id: ObjectId) -> AppResult<u64> {
        let result = self.reviews().delete_many(doc! { "recipeId": recipe_id }).await?;
        Ok(result.deleted_count)
    }
}
