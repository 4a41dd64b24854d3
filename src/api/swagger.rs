use utoipa::OpenApi;
use utoipa::openapi::security::{SecurityScheme, HttpAuthScheme, HttpBuilder};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SmartRecipe API",
        version = "1.0.0",
        description = "Recipe sharing back end. \n\n**Authentication:** write endpoints and everything under `/api/users` require an identity-provider bearer token.\n\n**Features:**\n- Recipe catalogue with search and image uploads\n- Reviews per recipe and per author\n- Saved recipes per user\n- Nearby restaurant suggestions",
    ),
    paths(
        // Health
        crate::api::health::health_check,
        crate::api::health::index,

        // Recipes
        crate::api::recipes::get_recipes,
        crate::api::recipes::search_recipes,
        crate::api::recipes::get_recipes_by_user,
        crate::api::recipes::get_recipe,
        crate::api::recipes::create_recipe,
        crate::api::recipes::update_recipe,
        crate::api::recipes::delete_recipe,

        // Reviews
        crate::api::reviews::get_reviews_by_recipe,
        crate::api::reviews::get_reviews_by_user,
        crate::api::reviews::get_review,
        crate::api::reviews::create_review,
        crate::api::reviews::update_review,
        crate::api::reviews::delete_review,

        // Users
        crate::api::users::get_profile,
        crate::api::users::update_profile,
        crate::api::users::save_recipe,
        crate::api::users::unsave_recipe,
        crate::api::users::get_saved_recipes,

        // Restaurants
        crate::api::restaurants::get_nearby_restaurants,
    ),
    components(
        schemas(
            crate::api::health::HealthResponse,
            crate::models::RecipeResponse,
            crate::models::RecipeSummary,
            crate::models::ReviewResponse,
            crate::models::CreateReviewRequest,
            crate::models::UpdateReviewRequest,
            crate::models::UserResponse,
            crate::models::AuthorSummary,
            crate::models::UpdateProfileRequest,
            crate::models::SaveRecipeRequest,
            crate::models::Restaurant,
            crate::models::Coordinates,
        )
    ),
    tags(
        (name = "Health", description = "Liveness and database connectivity."),
        (name = "Recipes", description = "Browse, search and manage recipes. Writes are owner only."),
        (name = "Reviews", description = "Comments on recipes. Edits and deletes are author only."),
        (name = "Users", description = "The caller's profile and saved recipes."),
        (name = "Restaurants", description = "Nearby restaurant suggestions from Yelp."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token issued by the identity provider"))
                        .build()
                ),
            );
        }
    }
}
