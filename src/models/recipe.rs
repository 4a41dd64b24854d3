use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

use super::to_chrono;

/// Recipe document (stored in MongoDB)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub recipe_name: String,

    pub description: String,

    /// Minutes
    pub cooking_time: u32,

    #[serde(default)]
    pub calories: Option<u32>,

    pub ingredients: Vec<String>,

    /// One step per line
    pub instructions: String,

    /// Owner reference
    pub user_id: ObjectId,

    /// Back-reference list of review ids
    #[serde(default)]
    pub reviews: Vec<ObjectId>,

    #[serde(default)]
    pub image: Option<String>,

    pub created_at: BsonDateTime,
}

impl Recipe {
    /// Case-insensitive literal substring match over name, description and
    /// ingredients. `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.recipe_name.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
            || self
                .ingredients
                .iter()
                .any(|ingredient| ingredient.to_lowercase().contains(needle))
    }
}

/// Partial recipe update. Outer `None` means "not provided".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipePatch {
    pub recipe_name: Option<String>,
    pub description: Option<String>,
    pub cooking_time: Option<u32>,
    /// `Some(None)` clears the stored calories.
    pub calories: Option<Option<u32>>,
    pub ingredients: Option<Vec<String>>,
    pub instructions: Option<String>,
    pub image: Option<String>,
}

impl RecipePatch {
    pub fn is_empty(&self) -> bool {
        *self == RecipePatch::default()
    }

    pub fn apply(&self, recipe: &mut Recipe) {
        if let Some(name) = &self.recipe_name {
            recipe.recipe_name = name.clone();
        }
        if let Some(description) = &self.description {
            recipe.description = description.clone();
        }
        if let Some(cooking_time) = self.cooking_time {
            recipe.cooking_time = cooking_time;
        }
        if let Some(calories) = self.calories {
            recipe.calories = calories;
        }
        if let Some(ingredients) = &self.ingredients {
            recipe.ingredients = ingredients.clone();
        }
        if let Some(instructions) = &self.instructions {
            recipe.instructions = instructions.clone();
        }
        if let Some(image) = &self.image {
            recipe.image = Some(image.clone());
        }
    }
}

/// API view of a recipe
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecipeResponse {
    pub id: String,
    pub recipe_name: String,
    pub description: String,
    pub cooking_time: u32,
    pub calories: Option<u32>,
    pub ingredients: Vec<String>,
    pub instructions: String,
    pub user_id: String,
    pub reviews: Vec<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_saved: Option<bool>,
}

impl RecipeResponse {
    pub fn with_saved(mut self, saved: bool) -> Self {
        self.is_saved = Some(saved);
        self
    }
}

impl From<Recipe> for RecipeResponse {
    fn from(recipe: Recipe) -> Self {
        RecipeResponse {
            id: recipe.id.to_hex(),
            recipe_name: recipe.recipe_name,
            description: recipe.description,
            cooking_time: recipe.cooking_time,
            calories: recipe.calories,
            ingredients: recipe.ingredients,
            instructions: recipe.instructions,
            user_id: recipe.user_id.to_hex(),
            reviews: recipe.reviews.iter().map(|id| id.to_hex()).collect(),
            image: recipe.image,
            created_at: to_chrono(recipe.created_at),
            is_saved: None,
        }
    }
}

/// Short recipe reference embedded in review listings.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSummary {
    pub id: String,
    pub recipe_name: String,
}

impl From<&Recipe> for RecipeSummary {
    fn from(recipe: &Recipe) -> Self {
        RecipeSummary {
            id: recipe.id.to_hex(),
            recipe_name: recipe.recipe_name.clone(),
        }
    }
}
