use actix_web::{web, HttpResponse};
use mongodb::bson::oid::ObjectId;

use crate::{
    database::Store,
    middleware::CurrentUser,
    models::{RecipeResponse, SaveRecipeRequest, UpdateProfileRequest, UserResponse},
    services::user_service,
    utils::AppError,
};

fn saved_ids(ids: Vec<ObjectId>) -> Vec<String> {
    ids.into_iter().map(|id| id.to_hex()).collect()
}

/// GET /api/users/profile
#[utoipa::path(
    get,
    path = "/api/users/profile",
    tag = "Users",
    responses(
        (status = 200, description = "Caller's profile", body = UserResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_profile(
    user: web::ReqData<CurrentUser>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let user = user_service::get_profile(store.get_ref(), &user.0).await?;
    log::info!("👤 GET /users/profile - {}", user.id.to_hex());
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "user": UserResponse::from(user)
    })))
}

/// PUT /api/users/profile - username and/or email
#[utoipa::path(
    put,
    path = "/api/users/profile",
    tag = "Users",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Blank or malformed value"),
        (status = 409, description = "Email already in use")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    user: web::ReqData<CurrentUser>,
    store: web::Data<dyn Store>,
    request: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, AppError> {
    let user = user.into_inner().0;
    log::info!("🔧 PUT /users/profile - {}", user.id.to_hex());

    let updated = user_service::update_profile(store.get_ref(), &user, request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "user": UserResponse::from(updated)
    })))
}

/// POST /api/users/save-recipe
#[utoipa::path(
    post,
    path = "/api/users/save-recipe",
    tag = "Users",
    request_body = SaveRecipeRequest,
    responses(
        (status = 200, description = "Recipe saved; returns the saved ids"),
        (status = 400, description = "Recipe already saved"),
        (status = 404, description = "Recipe not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn save_recipe(
    user: web::ReqData<CurrentUser>,
    store: web::Data<dyn Store>,
    request: web::Json<SaveRecipeRequest>,
) -> Result<HttpResponse, AppError> {
    let user = user.into_inner().0;
    log::info!("⭐ POST /users/save-recipe - {} by {}", request.recipe_id, user.id.to_hex());

    let saved = user_service::save_recipe(store.get_ref(), &user, &request.recipe_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Recipe saved",
        "savedRecipes": saved_ids(saved)
    })))
}

/// DELETE /api/users/unsave-recipe/{recipe_id}
#[utoipa::path(
    delete,
    path = "/api/users/unsave-recipe/{recipe_id}",
    tag = "Users",
    params(("recipe_id" = String, Path, description = "Recipe id")),
    responses((status = 200, description = "Recipe removed from the saved list")),
    security(("bearer_auth" = []))
)]
pub async fn unsave_recipe(
    user: web::ReqData<CurrentUser>,
    store: web::Data<dyn Store>,
    recipe_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user = user.into_inner().0;
    log::info!("☆ DELETE /users/unsave-recipe/{} - by {}", recipe_id, user.id.to_hex());

    let saved = user_service::unsave_recipe(store.get_ref(), &user, &recipe_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Recipe removed from saved",
        "savedRecipes": saved_ids(saved)
    })))
}

/// GET /api/users/saved-recipes
#[utoipa::path(
    get,
    path = "/api/users/saved-recipes",
    tag = "Users",
    responses((status = 200, description = "Saved recipes", body = [RecipeResponse])),
    security(("bearer_auth" = []))
)]
pub async fn get_saved_recipes(
    user: web::ReqData<CurrentUser>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let user = user.into_inner().0;
    let recipes = user_service::list_saved_recipes(store.get_ref(), &user).await?;
    log::info!("✅ {} saved recipes for {}", recipes.len(), user.id.to_hex());

    let recipes: Vec<RecipeResponse> = recipes
        .into_iter()
        .map(|recipe| RecipeResponse::from(recipe).with_saved(true))
        .collect();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "total": recipes.len(),
        "recipes": recipes
    })))
}
