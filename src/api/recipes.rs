use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use futures::TryStreamExt;
use serde::Deserialize;

use crate::{
    database::Store,
    middleware::{optional_user, CurrentUser},
    models::{Recipe, RecipeResponse},
    services::recipe_service::{self, FormFields},
    services::upload_service::{ImageUpload, UploadStore, MAX_IMAGE_BYTES},
    utils::AppError,
};

/// Text fields are small; anything bigger is not a recipe form.
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;
/// Upper bound on text parts per form.
const MAX_TEXT_FIELDS: usize = 16;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Matched against name, description and ingredients
    pub query: Option<String>,
}

/// Recipe form split into text fields and the optional image.
pub struct RecipeForm {
    pub fields: FormFields,
    pub image: Option<ImageUpload>,
}

fn multipart_error(e: impl std::fmt::Display) -> AppError {
    AppError::validation(format!("Invalid form data: {}", e))
}

pub async fn read_recipe_form(mut payload: Multipart) -> Result<RecipeForm, AppError> {
    let mut fields = FormFields::new();
    let mut image = None;
    let mut text_fields = 0;

    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "image" {
            let content_type = field
                .content_type()
                .map(|mime| mime.essence_str().to_string())
                .unwrap_or_default();
            let mut bytes = Vec::new();
            while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
                if bytes.len() + chunk.len() > MAX_IMAGE_BYTES {
                    return Err(AppError::validation("Image must be 5MB or smaller"));
                }
                bytes.extend_from_slice(&chunk);
            }
            // Browsers send an empty part when no file was picked.
            if !bytes.is_empty() {
                image = Some(ImageUpload { content_type, bytes });
            }
            continue;
        }

        text_fields += 1;
        if text_fields > MAX_TEXT_FIELDS {
            return Err(AppError::validation("Too many form fields"));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
            if bytes.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
                return Err(AppError::validation(format!("{} is too long", name)));
            }
            bytes.extend_from_slice(&chunk);
        }
        let value = String::from_utf8(bytes)
            .map_err(|_| AppError::validation(format!("{} must be UTF-8 text", name)))?;
        fields.insert(name, value);
    }

    Ok(RecipeForm { fields, image })
}

fn recipes_json(recipes: Vec<Recipe>) -> HttpResponse {
    let total = recipes.len();
    let recipes: Vec<RecipeResponse> = recipes.into_iter().map(RecipeResponse::from).collect();
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "recipes": recipes,
        "total": total
    }))
}

/// GET /api/recipes - All recipes, newest first
#[utoipa::path(
    get,
    path = "/api/recipes",
    tag = "Recipes",
    responses((status = 200, description = "All recipes, newest first", body = [RecipeResponse]))
)]
pub async fn get_recipes(store: web::Data<dyn Store>) -> Result<HttpResponse, AppError> {
    log::info!("📋 GET /recipes");
    let recipes = recipe_service::list_recipes(store.get_ref()).await?;
    log::info!("✅ Listed {} recipes", recipes.len());
    Ok(recipes_json(recipes))
}

/// GET /api/recipes/search?query=
#[utoipa::path(
    get,
    path = "/api/recipes/search",
    tag = "Recipes",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching recipes", body = [RecipeResponse]),
        (status = 400, description = "Blank query")
    )
)]
pub async fn search_recipes(
    store: web::Data<dyn Store>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner().query.unwrap_or_default();
    log::info!("🔍 GET /recipes/search - '{}'", query);
    let recipes = recipe_service::search_recipes(store.get_ref(), &query).await?;
    log::info!("✅ Search matched {} recipes", recipes.len());
    Ok(recipes_json(recipes))
}

/// GET /api/recipes/user/{user_id}
#[utoipa::path(
    get,
    path = "/api/recipes/user/{user_id}",
    tag = "Recipes",
    params(("user_id" = String, Path, description = "Owner id")),
    responses((status = 200, description = "Recipes by one owner", body = [RecipeResponse]))
)]
pub async fn get_recipes_by_user(
    store: web::Data<dyn Store>,
    user_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    log::info!("📋 GET /recipes/user/{}", user_id);
    let recipes = recipe_service::list_by_owner(store.get_ref(), &user_id).await?;
    Ok(recipes_json(recipes))
}

/// GET /api/recipes/{id} - `isSaved` reflects the caller when a token is sent
#[utoipa::path(
    get,
    path = "/api/recipes/{id}",
    tag = "Recipes",
    params(("id" = String, Path, description = "Recipe id")),
    responses(
        (status = 200, description = "Recipe", body = RecipeResponse),
        (status = 404, description = "Recipe not found")
    )
)]
pub async fn get_recipe(
    req: HttpRequest,
    store: web::Data<dyn Store>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔎 GET /recipes/{}", id);
    let recipe = recipe_service::get_recipe(store.get_ref(), &id).await?;

    let is_saved = optional_user(&req)
        .await
        .map(|user| user.saved_recipes.contains(&recipe.id))
        .unwrap_or(false);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "recipe": RecipeResponse::from(recipe).with_saved(is_saved)
    })))
}

/// POST /api/recipes - multipart form with optional `image`
#[utoipa::path(
    post,
    path = "/api/recipes",
    tag = "Recipes",
    responses(
        (status = 201, description = "Recipe created", body = RecipeResponse),
        (status = 400, description = "Invalid form"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_recipe(
    user: web::ReqData<CurrentUser>,
    store: web::Data<dyn Store>,
    uploads: web::Data<UploadStore>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let user = user.into_inner().0;
    log::info!("📝 POST /recipes - by {}", user.id.to_hex());

    let form = read_recipe_form(payload).await?;
    let input = recipe_service::parse_new_recipe(&form.fields)?;
    let image = match &form.image {
        Some(upload) => Some(uploads.save_recipe_image(upload).await?),
        None => None,
    };

    match recipe_service::create_recipe(store.get_ref(), &user, input, image.clone()).await {
        Ok(recipe) => Ok(HttpResponse::Created().json(serde_json::json!({
            "success": true,
            "recipe": RecipeResponse::from(recipe)
        }))),
        Err(e) => {
            if let Some(path) = &image {
                uploads.remove(path).await;
            }
            Err(e)
        }
    }
}

/// PUT /api/recipes/{id} - partial update, owner only
#[utoipa::path(
    put,
    path = "/api/recipes/{id}",
    tag = "Recipes",
    params(("id" = String, Path, description = "Recipe id")),
    responses(
        (status = 200, description = "Recipe updated", body = RecipeResponse),
        (status = 403, description = "Caller is not the owner"),
        (status = 404, description = "Recipe not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_recipe(
    user: web::ReqData<CurrentUser>,
    store: web::Data<dyn Store>,
    uploads: web::Data<UploadStore>,
    id: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let user = user.into_inner().0;
    log::info!("🔧 PUT /recipes/{} - by {}", id, user.id.to_hex());

    let form = read_recipe_form(payload).await?;
    let mut patch = recipe_service::parse_recipe_patch(&form.fields)?;
    if let Some(upload) = &form.image {
        patch.image = Some(uploads.save_recipe_image(upload).await?);
    }
    let new_image = patch.image.clone();

    match recipe_service::update_recipe(store.get_ref(), &user, &id, patch).await {
        Ok((recipe, replaced)) => {
            if let Some(old) = replaced {
                uploads.remove(&old).await;
            }
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "recipe": RecipeResponse::from(recipe)
            })))
        }
        Err(e) => {
            if let Some(path) = &new_image {
                uploads.remove(path).await;
            }
            Err(e)
        }
    }
}

/// DELETE /api/recipes/{id} - owner only, removes its reviews and saves
#[utoipa::path(
    delete,
    path = "/api/recipes/{id}",
    tag = "Recipes",
    params(("id" = String, Path, description = "Recipe id")),
    responses(
        (status = 200, description = "Recipe deleted"),
        (status = 403, description = "Caller is not the owner"),
        (status = 404, description = "Recipe not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_recipe(
    user: web::ReqData<CurrentUser>,
    store: web::Data<dyn Store>,
    uploads: web::Data<UploadStore>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user = user.into_inner().0;
    log::info!("🗑️  DELETE /recipes/{} - by {}", id, user.id.to_hex());

    let deletion = recipe_service::delete_recipe(store.get_ref(), &user, &id).await?;
    if let Some(path) = &deletion.image {
        uploads.remove(path).await;
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Recipe deleted",
        "reviewsRemoved": deletion.reviews_removed
    })))
}
