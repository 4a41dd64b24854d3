use mongodb::bson::oid::ObjectId;

use crate::database::{RecipeFilter, Store};
use crate::models::{Recipe, UpdateProfileRequest, User, UserPatch};
use crate::utils::{parse_object_id, AppError, AppResult};

fn profile_patch(request: UpdateProfileRequest) -> AppResult<UserPatch> {
    let username = match request.username.as_deref().map(str::trim) {
        None => None,
        Some("") => return Err(AppError::validation("Username cannot be empty")),
        Some(name) => Some(name.to_string()),
    };

    let email = match request.email.as_deref().map(str::trim) {
        None => None,
        Some("") => return Err(AppError::validation("Email cannot be empty")),
        Some(email) if !looks_like_email(email) => {
            return Err(AppError::validation("Email is not valid"))
        }
        Some(email) => Some(email.to_lowercase()),
    };

    Ok(UserPatch { username, email })
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

pub async fn get_profile(store: &dyn Store, user: &User) -> AppResult<User> {
    store
        .find_user(user.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

pub async fn update_profile(
    store: &dyn Store,
    user: &User,
    request: UpdateProfileRequest,
) -> AppResult<User> {
    let patch = profile_patch(request)?;
    if patch.is_empty() {
        return Ok(user.clone());
    }

    let updated = store
        .update_user(user.id, &patch)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    log::info!("✅ Profile {} updated", updated.id.to_hex());
    Ok(updated)
}

/// Adds the recipe to the caller's saved list and returns the new list.
pub async fn save_recipe(store: &dyn Store, user: &User, recipe_id: &str) -> AppResult<Vec<ObjectId>> {
    let recipe_id = parse_object_id(recipe_id, "Recipe")?;
    if store.find_recipe(recipe_id).await?.is_none() {
        return Err(AppError::not_found("Recipe not found"));
    }

    if !store.add_saved_recipe(user.id, recipe_id).await? {
        return Err(AppError::validation("Recipe already saved"));
    }

    let user = store
        .find_user(user.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    log::info!("⭐ User {} saved recipe {}", user.id.to_hex(), recipe_id.to_hex());
    Ok(user.saved_recipes)
}

/// Removing a recipe that was never saved is a no-op.
pub async fn unsave_recipe(store: &dyn Store, user: &User, recipe_id: &str) -> AppResult<Vec<ObjectId>> {
    let recipe_id = match ObjectId::parse_str(recipe_id.trim()) {
        Ok(id) => id,
        Err(_) => return Ok(user.saved_recipes.clone()),
    };

    let user = store
        .remove_saved_recipe(user.id, recipe_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(user.saved_recipes)
}

/// Resolves the saved list. References to deleted recipes are skipped.
pub async fn list_saved_recipes(store: &dyn Store, user: &User) -> AppResult<Vec<Recipe>> {
    if user.saved_recipes.is_empty() {
        return Ok(Vec::new());
    }
    store
        .list_recipes(&RecipeFilter::Ids(user.saved_recipes.clone()))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use mongodb::bson::DateTime as BsonDateTime;

    async fn user(store: &MemoryStore, name: &str) -> User {
        let user = User {
            id: ObjectId::new(),
            auth0_id: format!("auth0|{}", name),
            email: format!("{}@example.com", name),
            username: name.to_string(),
            picture: None,
            saved_recipes: vec![],
            created_at: BsonDateTime::now(),
        };
        store.insert_user(&user).await.unwrap();
        user
    }

    async fn recipe(store: &MemoryStore, owner: &User) -> Recipe {
        let recipe = Recipe {
            id: ObjectId::new(),
            recipe_name: "Pancakes".into(),
            description: "Fluffy".into(),
            cooking_time: 20,
            calories: Some(400),
            ingredients: vec!["flour".into(), "milk".into()],
            instructions: "Mix\nFry".into(),
            user_id: owner.id,
            reviews: vec![],
            image: None,
            created_at: BsonDateTime::now(),
        };
        store.insert_recipe(&recipe).await.unwrap();
        recipe
    }

    #[tokio::test]
    async fn duplicate_save_is_rejected_and_list_unchanged() {
        let store = MemoryStore::new();
        let ana = user(&store, "ana").await;
        let pancakes = recipe(&store, &ana).await;
        let id = pancakes.id.to_hex();

        let saved = save_recipe(&store, &ana, &id).await.unwrap();
        assert_eq!(saved, vec![pancakes.id]);

        let again = save_recipe(&store, &ana, &id).await;
        assert!(matches!(again, Err(AppError::Validation(ref m)) if m == "Recipe already saved"));

        let stored = store.find_user(ana.id).await.unwrap().unwrap();
        assert_eq!(stored.saved_recipes, vec![pancakes.id]);
    }

    #[tokio::test]
    async fn save_requires_existing_recipe() {
        let store = MemoryStore::new();
        let ana = user(&store, "ana").await;

        let missing = save_recipe(&store, &ana, &ObjectId::new().to_hex()).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn unsave_is_idempotent() {
        let store = MemoryStore::new();
        let ana = user(&store, "ana").await;
        let pancakes = recipe(&store, &ana).await;
        save_recipe(&store, &ana, &pancakes.id.to_hex()).await.unwrap();

        assert!(unsave_recipe(&store, &ana, &pancakes.id.to_hex()).await.unwrap().is_empty());
        assert!(unsave_recipe(&store, &ana, &pancakes.id.to_hex()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn saved_listing_skips_deleted_recipes() {
        let store = MemoryStore::new();
        let ana = user(&store, "ana").await;
        let kept = recipe(&store, &ana).await;
        let gone = recipe(&store, &ana).await;
        save_recipe(&store, &ana, &kept.id.to_hex()).await.unwrap();
        save_recipe(&store, &ana, &gone.id.to_hex()).await.unwrap();
        store.delete_recipe(gone.id).await.unwrap();

        let ana = store.find_user(ana.id).await.unwrap().unwrap();
        let listed = list_saved_recipes(&store, &ana).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, kept.id);
    }

    #[tokio::test]
    async fn profile_update_merges_and_checks_email() {
        let store = MemoryStore::new();
        let ana = user(&store, "ana").await;
        user(&store, "bo").await;

        let renamed = update_profile(
            &store,
            &ana,
            UpdateProfileRequest {
                username: Some("Chef Ana".into()),
                email: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.username, "Chef Ana");
        assert_eq!(renamed.email, "ana@example.com");

        let taken = update_profile(
            &store,
            &renamed,
            UpdateProfileRequest {
                username: None,
                email: Some("BO@example.com".into()),
            },
        )
        .await;
        assert!(matches!(taken, Err(AppError::Conflict(_))));

        let blank = update_profile(
            &store,
            &renamed,
            UpdateProfileRequest {
                username: Some(" ".into()),
                email: None,
            },
        )
        .await;
        assert!(matches!(blank, Err(AppError::Validation(_))));
    }
}
