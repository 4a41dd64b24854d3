use actix_web::{web, HttpResponse};

use crate::{
    database::Store,
    middleware::CurrentUser,
    models::{CreateReviewRequest, ReviewResponse, UpdateReviewRequest},
    services::review_service,
    utils::AppError,
};

fn reviews_json(reviews: Vec<ReviewResponse>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "total": reviews.len(),
        "reviews": reviews
    }))
}

/// GET /api/reviews/recipe/{recipe_id} - newest first, with author
#[utoipa::path(
    get,
    path = "/api/reviews/recipe/{recipe_id}",
    tag = "Reviews",
    params(("recipe_id" = String, Path, description = "Recipe id")),
    responses((status = 200, description = "Reviews of one recipe", body = [ReviewResponse]))
)]
pub async fn get_reviews_by_recipe(
    store: web::Data<dyn Store>,
    recipe_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    log::info!("💬 GET /reviews/recipe/{}", recipe_id);
    let reviews = review_service::list_by_recipe(store.get_ref(), &recipe_id).await?;
    Ok(reviews_json(reviews))
}

/// GET /api/reviews/user/{user_id} - newest first, with recipe name
#[utoipa::path(
    get,
    path = "/api/reviews/user/{user_id}",
    tag = "Reviews",
    params(("user_id" = String, Path, description = "Author id")),
    responses((status = 200, description = "Reviews by one author", body = [ReviewResponse]))
)]
pub async fn get_reviews_by_user(
    store: web::Data<dyn Store>,
    user_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    log::info!("💬 GET /reviews/user/{}", user_id);
    let reviews = review_service::list_by_user(store.get_ref(), &user_id).await?;
    Ok(reviews_json(reviews))
}

#[utoipa::path(
    get,
    path = "/api/reviews/{id}",
    tag = "Reviews",
    params(("id" = String, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review", body = ReviewResponse),
        (status = 404, description = "Review not found")
    )
)]
pub async fn get_review(
    store: web::Data<dyn Store>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let review = review_service::get_review(store.get_ref(), &id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "review": review
    })))
}

#[utoipa::path(
    post,
    path = "/api/reviews",
    tag = "Reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ReviewResponse),
        (status = 400, description = "Blank comment"),
        (status = 404, description = "Recipe not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_review(
    user: web::ReqData<CurrentUser>,
    store: web::Data<dyn Store>,
    request: web::Json<CreateReviewRequest>,
) -> Result<HttpResponse, AppError> {
    let user = user.into_inner().0;
    let request = request.into_inner();
    log::info!("📝 POST /reviews - recipe {} by {}", request.recipe_id, user.id.to_hex());

    let review =
        review_service::create_review(store.get_ref(), &user, &request.recipe_id, &request.comment).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "review": review
    })))
}

#[utoipa::path(
    put,
    path = "/api/reviews/{id}",
    tag = "Reviews",
    params(("id" = String, Path, description = "Review id")),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Review updated", body = ReviewResponse),
        (status = 403, description = "Caller is not the author")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_review(
    user: web::ReqData<CurrentUser>,
    store: web::Data<dyn Store>,
    id: web::Path<String>,
    request: web::Json<UpdateReviewRequest>,
) -> Result<HttpResponse, AppError> {
    let user = user.into_inner().0;
    log::info!("🔧 PUT /reviews/{} - by {}", id, user.id.to_hex());

    let review = review_service::update_review(store.get_ref(), &user, &id, &request.comment).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "review": review
    })))
}

#[utoipa::path(
    delete,
    path = "/api/reviews/{id}",
    tag = "Reviews",
    params(("id" = String, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review deleted"),
        (status = 403, description = "Caller is not the author")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_review(
    user: web::ReqData<CurrentUser>,
    store: web::Data<dyn Store>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user = user.into_inner().0;
    log::info!("🗑️  DELETE /reviews/{} - by {}", id, user.id.to_hex());

    review_service::delete_review(store.get_ref(), &user, &id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Review deleted"
    })))
}
