use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};

use super::{RecipeFilter, ReviewFilter, Store};
use crate::models::{Recipe, RecipePatch, Review, User, UserPatch};
use crate::utils::{AppError, AppResult};

#[derive(Default)]
struct Collections {
    users: Vec<User>,
    recipes: Vec<Recipe>,
    reviews: Vec<Review>,
}

/// Process-local store with the same uniqueness rules as the MongoDB indexes.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, Collections>> {
        self.inner
            .read()
            .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, Collections>> {
        self.inner
            .write()
            .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))
    }

    pub fn user_count(&self) -> usize {
        self.inner.read().map(|c| c.users.len()).unwrap_or_default()
    }
}

fn newest_recipes_first(recipes: &mut [Recipe]) {
    recipes.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
}

fn newest_reviews_first(reviews: &mut [Review]) {
    reviews.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        self.read().map(|_| ())
    }

    async fn find_user_by_subject(&self, subject: &str) -> AppResult<Option<User>> {
        Ok(self.read()?.users.iter().find(|u| u.auth0_id == subject).cloned())
    }

    async fn find_user(&self, id: ObjectId) -> AppResult<Option<User>> {
        Ok(self.read()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_users(&self, ids: &[ObjectId]) -> AppResult<Vec<User>> {
        Ok(self
            .read()?
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn insert_user(&self, user: &User) -> AppResult<()> {
        let mut state = self.write()?;
        if state
            .users
            .iter()
            .any(|u| u.auth0_id == user.auth0_id || u.email == user.email)
        {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        state.users.push(user.clone());
        Ok(())
    }

    async fn update_user(&self, id: ObjectId, patch: &UserPatch) -> AppResult<Option<User>> {
        let mut state = self.write()?;
        if let Some(email) = &patch.email {
            if state.users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(AppError::Conflict("Email already exists".to_string()));
            }
        }
        Ok(state.users.iter_mut().find(|u| u.id == id).map(|user| {
            patch.apply(user);
            user.clone()
        }))
    }

    async fn add_saved_recipe(&self, user_id: ObjectId, recipe_id: ObjectId) -> AppResult<bool> {
        let mut state = self.write()?;
        match state.users.iter_mut().find(|u| u.id == user_id) {
            Some(user) if !user.saved_recipes.contains(&recipe_id) => {
                user.saved_recipes.push(recipe_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove_saved_recipe(&self, user_id: ObjectId, recipe_id: ObjectId) -> AppResult<Option<User>> {
        let mut state = self.write()?;
        Ok(state.users.iter_mut().find(|u| u.id == user_id).map(|user| {
            user.saved_recipes.retain(|id| *id != recipe_id);
            user.clone()
        }))
    }

    async fn forget_saved_recipe(&self, recipe_id: ObjectId) -> AppResult<u64> {
        let mut state = self.write()?;
        let mut modified = 0;
        for user in state.users.iter_mut() {
            let before = user.saved_recipes.len();
            user.saved_recipes.retain(|id| *id != recipe_id);
            if user.saved_recipes.len() != before {
                modified += 1;
            }
        }
        Ok(modified)
    }

    async fn list_recipes(&self, filter: &RecipeFilter) -> AppResult<Vec<Recipe>> {
        let state = self.read()?;
        let needle = match filter {
            RecipeFilter::Search(query) => query.to_lowercase(),
            _ => String::new(),
        };
        let mut recipes: Vec<Recipe> = state
            .recipes
            .iter()
            .filter(|r| match filter {
                RecipeFilter::All => true,
                RecipeFilter::Owner(owner) => r.user_id == *owner,
                RecipeFilter::Search(_) => r.matches(&needle),
                RecipeFilter::Ids(ids) => ids.contains(&r.id),
            })
            .cloned()
            .collect();
        newest_recipes_first(&mut recipes);
        Ok(recipes)
    }

    async fn find_recipe(&self, id: ObjectId) -> AppResult<Option<Recipe>> {
        Ok(self.read()?.recipes.iter().find(|r| r.id == id).cloned())
    }

    async fn insert_recipe(&self, recipe: &Recipe) -> AppResult<()> {
        self.write()?.recipes.push(recipe.clone());
        Ok(())
    }

    async fn update_recipe(&self, id: ObjectId, patch: &RecipePatch) -> AppResult<Option<Recipe>> {
        let mut state = self.write()?;
        Ok(state.recipes.iter_mut().find(|r| r.id == id).map(|recipe| {
            patch.apply(recipe);
            recipe.clone()
        }))
    }

    async fn delete_recipe(&self, id: ObjectId) -> AppResult<bool> {
        let mut state = self.write()?;
        let before = state.recipes.len();
        state.recipes.retain(|r| r.id != id);
        Ok(state.recipes.len() != before)
    }

    async fn push_review_ref(&self, recipe_id: ObjectId, review_id: ObjectId) -> AppResult<()> {
        let mut state = self.write()?;
        if let Some(recipe) = state.recipes.iter_mut().find(|r| r.id == recipe_id) {
            recipe.reviews.push(review_id);
        }
        Ok(())
    }

    async fn pull_review_ref(&self, recipe_id: ObjectId, review_id: ObjectId) -> AppResult<()> {
        let mut state = self.write()?;
        if let Some(recipe) = state.recipes.iter_mut().find(|r| r.id == recipe_id) {
            recipe.reviews.retain(|id| *id != review_id);
        }
        Ok(())
    }

    async fn list_reviews(&self, filter: ReviewFilter) -> AppResult<Vec<Review>> {
        let state = self.read()?;
        let mut reviews: Vec<Review> = state
            .reviews
            .iter()
            .filter(|r| match filter {
                ReviewFilter::Recipe(recipe_id) => r.recipe_id == recipe_id,
                ReviewFilter::Author(user_id) => r.user_id == user_id,
            })
            .cloned()
            .collect();
        newest_reviews_first(&mut reviews);
        Ok(reviews)
    }

    async fn find_review(&self, id: ObjectId) -> AppResult<Option<Review>> {
        Ok(self.read()?.reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn insert_review(&self, review: &Review) -> AppResult<()> {
        self.write()?.reviews.push(review.clone());
        Ok(())
    }

    async fn update_review(
        &self,
        id: ObjectId,
        comment: &str,
        timestamp: BsonDateTime,
    ) -> AppResult<Option<Review>> {
        let mut state = self.write()?;
        Ok(state.reviews.iter_mut().find(|r| r.id == id).map(|review| {
            review.comment = comment.to_string();
            review.timestamp = timestamp;
            review.clone()
        }))
    }

    async fn delete_review(&self, id: ObjectId) -> AppResult<bool> {
        let mut state = self.write()?;
        let before = state.reviews.len();
        state.reviews.retain(|r| r.id != id);
        Ok(state.reviews.len() != before)
    }

    async fn delete_reviews_for_recipe(&self, recipe_id: ObjectId) -> AppResult<u64> {
        let mut state = self.write()?;
        let before = state.reviews.len();
        state.reviews.retain(|r| r.recipe_id != recipe_id);
        Ok((before - state.reviews.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(subject: &str, email: &str) -> User {
        User {
            id: ObjectId::new(),
            auth0_id: subject.into(),
            email: email.into(),
            username: "cook".into(),
            picture: None,
            saved_recipes: vec![],
            created_at: BsonDateTime::now(),
        }
    }

    #[tokio::test]
    async fn unique_subject_and_email() {
        let store = MemoryStore::new();
        store.insert_user(&user("auth0|1", "a@x.io")).await.unwrap();

        let same_subject = store.insert_user(&user("auth0|1", "b@x.io")).await;
        assert!(matches!(same_subject, Err(AppError::Conflict(_))));

        let same_email = store.insert_user(&user("auth0|2", "a@x.io")).await;
        assert!(matches!(same_email, Err(AppError::Conflict(_))));

        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn saved_recipes_stay_a_set() {
        let store = MemoryStore::new();
        let u = user("auth0|1", "a@x.io");
        store.insert_user(&u).await.unwrap();
        let recipe_id = ObjectId::new();

        assert!(store.add_saved_recipe(u.id, recipe_id).await.unwrap());
        assert!(!store.add_saved_recipe(u.id, recipe_id).await.unwrap());

        let stored = store.find_user(u.id).await.unwrap().unwrap();
        assert_eq!(stored.saved_recipes, vec![recipe_id]);
    }

    #[tokio::test]
    async fn reviews_list_newest_first() {
        let store = MemoryStore::new();
        let recipe_id = ObjectId::new();
        let author = ObjectId::new();
        for (i, millis) in [1_000i64, 3_000, 2_000].iter().enumerate() {
            store
                .insert_review(&Review {
                    id: ObjectId::new(),
                    user_id: author,
                    recipe_id,
                    comment: format!("review {}", i),
                    timestamp: BsonDateTime::from_millis(*millis),
                })
                .await
                .unwrap();
        }

        let comments: Vec<String> = store
            .list_reviews(ReviewFilter::Recipe(recipe_id))
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.comment)
            .collect();
        assert_eq!(comments, vec!["review 1", "review 2", "review 0"]);
    }
}
