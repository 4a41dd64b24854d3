use std::collections::HashMap;

use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};

use crate::database::{RecipeFilter, Store};
use crate::models::{Recipe, RecipePatch, User};
use crate::services::ownership::ensure_owner;
use crate::utils::{parse_object_id, AppError, AppResult};

/// Text fields of a recipe form, keyed by their wire names.
pub type FormFields = HashMap<String, String>;

/// Validated input for a new recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipe {
    pub recipe_name: String,
    pub description: String,
    pub cooking_time: u32,
    pub calories: Option<u32>,
    pub ingredients: Vec<String>,
    pub instructions: String,
}

fn required_text(fields: &FormFields, key: &str) -> AppResult<String> {
    fields
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::validation(format!("{} is required", key)))
}

/// `None` when absent; blank is rejected.
fn present_text(fields: &FormFields, key: &str) -> AppResult<Option<String>> {
    match fields.get(key).map(|value| value.trim()) {
        None => Ok(None),
        Some("") => Err(AppError::validation(format!("{} cannot be empty", key))),
        Some(value) => Ok(Some(value.to_string())),
    }
}

fn parse_positive(key: &str, raw: &str) -> AppResult<u32> {
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(AppError::validation(format!("{} must be a positive integer", key))),
    }
}

/// Ingredients travel as a JSON array of strings.
pub fn parse_ingredients(raw: &str) -> AppResult<Vec<String>> {
    let items: Vec<String> = serde_json::from_str(raw)
        .map_err(|_| AppError::validation("ingredients must be a JSON array of strings"))?;

    let items: Vec<String> = items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();

    if items.is_empty() {
        return Err(AppError::validation("At least one ingredient is required"));
    }
    Ok(items)
}

pub fn parse_new_recipe(fields: &FormFields) -> AppResult<NewRecipe> {
    let calories = match fields.get("calories").map(|v| v.trim()) {
        None | Some("") => None,
        Some(raw) => Some(parse_positive("calories", raw)?),
    };

    Ok(NewRecipe {
        recipe_name: required_text(fields, "recipeName")?,
        description: required_text(fields, "description")?,
        cooking_time: parse_positive("cookingTime", &required_text(fields, "cookingTime")?)?,
        calories,
        ingredients: parse_ingredients(&required_text(fields, "ingredients")?)?,
        instructions: required_text(fields, "instructions")?,
    })
}

/// Omitted fields stay untouched. Blank `calories` clears the value.
pub fn parse_recipe_patch(fields: &FormFields) -> AppResult<RecipePatch> {
    let cooking_time = match present_text(fields, "cookingTime")? {
        Some(raw) => Some(parse_positive("cookingTime", &raw)?),
        None => None,
    };
    let calories = match fields.get("calories").map(|v| v.trim()) {
        None => None,
        Some("") => Some(None),
        Some(raw) => Some(Some(parse_positive("calories", raw)?)),
    };
    let ingredients = match present_text(fields, "ingredients")? {
        Some(raw) => Some(parse_ingredients(&raw)?),
        None => None,
    };

    Ok(RecipePatch {
        recipe_name: present_text(fields, "recipeName")?,
        description: present_text(fields, "description")?,
        cooking_time,
        calories,
        ingredients,
        instructions: present_text(fields, "instructions")?,
        image: None,
    })
}

pub async fn list_recipes(store: &dyn Store) -> AppResult<Vec<Recipe>> {
    store.list_recipes(&RecipeFilter::All).await
}

pub async fn get_recipe(store: &dyn Store, id: &str) -> AppResult<Recipe> {
    let id = parse_object_id(id, "Recipe")?;
    store
        .find_recipe(id)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe not found"))
}

pub async fn search_recipes(store: &dyn Store, query: &str) -> AppResult<Vec<Recipe>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::validation("Search query is required"));
    }
    store.list_recipes(&RecipeFilter::Search(query.to_string())).await
}

pub async fn list_by_owner(store: &dyn Store, user_id: &str) -> AppResult<Vec<Recipe>> {
    let owner = parse_object_id(user_id, "User")?;
    store.list_recipes(&RecipeFilter::Owner(owner)).await
}

pub async fn create_recipe(
    store: &dyn Store,
    owner: &User,
    input: NewRecipe,
    image: Option<String>,
) -> AppResult<Recipe> {
    let recipe = Recipe {
        id: ObjectId::new(),
        recipe_name: input.recipe_name,
        description: input.description,
        cooking_time: input.cooking_time,
        calories: input.calories,
        ingredients: input.ingredients,
        instructions: input.instructions,
        user_id: owner.id,
        reviews: Vec::new(),
        image,
        created_at: BsonDateTime::now(),
    };

    store.insert_recipe(&recipe).await?;
    log::info!("✅ Recipe {} created by {}", recipe.id.to_hex(), owner.id.to_hex());
    Ok(recipe)
}

/// Returns the stored recipe after the merge, plus the image it replaced.
pub async fn update_recipe(
    store: &dyn Store,
    user: &User,
    id: &str,
    patch: RecipePatch,
) -> AppResult<(Recipe, Option<String>)> {
    let current = get_recipe(store, id).await?;
    ensure_owner(&current.user_id, user)?;

    if patch.is_empty() {
        return Ok((current, None));
    }

    let replaced_image = match (&patch.image, &current.image) {
        (Some(new), Some(old)) if new != old => Some(old.clone()),
        _ => None,
    };

    let updated = store
        .update_recipe(current.id, &patch)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe not found"))?;

    log::info!("✅ Recipe {} updated", updated.id.to_hex());
    Ok((updated, replaced_image))
}

/// What a recipe deletion removed along with the record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDeletion {
    pub reviews_removed: u64,
    pub saves_removed: u64,
    pub image: Option<String>,
}

/// Deletes the record first, then its reviews and saved-list references.
pub async fn delete_recipe(store: &dyn Store, user: &User, id: &str) -> AppResult<RecipeDeletion> {
    let recipe = get_recipe(store, id).await?;
    ensure_owner(&recipe.user_id, user)?;

    if !store.delete_recipe(recipe.id).await? {
        return Err(AppError::not_found("Recipe not found"));
    }
    let reviews_removed = store.delete_reviews_for_recipe(recipe.id).await?;
    let saves_removed = store.forget_saved_recipe(recipe.id).await?;

    log::info!(
        "🗑️  Recipe {} deleted ({} reviews, {} saves)",
        recipe.id.to_hex(),
        reviews_removed,
        saves_removed
    );

    Ok(RecipeDeletion {
        reviews_removed,
        saves_removed,
        image: recipe.image,
    })
}
