use actix_web::{web, HttpResponse};

use crate::{
    models::Restaurant,
    services::restaurant_service::{self, RestaurantLookup, RestaurantQuery},
    utils::AppError,
};

/// GET /api/restaurants/nearby
///
/// Coordinates win over `location`; with neither, the configured default
/// location is searched.
#[utoipa::path(
    get,
    path = "/api/restaurants/nearby",
    tag = "Restaurants",
    params(RestaurantQuery),
    responses(
        (status = 200, description = "Restaurant suggestions", body = [Restaurant]),
        (status = 400, description = "Invalid query parameter"),
        (status = 502, description = "Restaurant provider unavailable")
    )
)]
pub async fn get_nearby_restaurants(
    lookup: web::Data<dyn RestaurantLookup>,
    query: web::Query<RestaurantQuery>,
) -> Result<HttpResponse, AppError> {
    let search = restaurant_service::build_search(&query)?;
    log::info!("🍽️  GET /restaurants/nearby - {:?}", search.area);

    let restaurants = lookup.search(&search).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "total": restaurants.len(),
        "restaurants": restaurants
    })))
}
