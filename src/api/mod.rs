pub mod health;
pub mod recipes;
pub mod restaurants;
pub mod reviews;
pub mod swagger;
pub mod users;

use actix_web::{error, guard, web};

use crate::middleware::AuthMiddleware;
use crate::utils::AppError;

/// Registers every `/api` route plus `/health`. Shared state (`Data<dyn
/// Store>`, `Data<dyn TokenVerifier>`, `Data<dyn RestaurantLookup>`,
/// `Data<UploadStore>`) is registered by the caller.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| {
        error::Error::from(AppError::validation(format!("Invalid JSON body: {}", err)))
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _| {
        error::Error::from(AppError::validation(format!("Invalid query string: {}", err)))
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _| {
        error::Error::from(AppError::not_found(format!("Not found: {}", err)))
    }))
    .route("/health", web::get().to(health::health_check))
    .service(
        web::scope("/api")
            .route("", web::get().to(health::index))
            .service(
                web::scope("/recipes")
                    .route("", web::get().to(recipes::get_recipes))
                    .route("/search", web::get().to(recipes::search_recipes))
                    .route("/user/{user_id}", web::get().to(recipes::get_recipes_by_user))
                    .route("/{id}", web::get().to(recipes::get_recipe))
                    .service(
                        web::resource("")
                            .guard(guard::Post())
                            .wrap(AuthMiddleware)
                            .route(web::post().to(recipes::create_recipe)),
                    )
                    .service(
                        web::resource("/{id}")
                            .guard(guard::Any(guard::Put()).or(guard::Delete()))
                            .wrap(AuthMiddleware)
                            .route(web::put().to(recipes::update_recipe))
                            .route(web::delete().to(recipes::delete_recipe)),
                    ),
            )
            .service(
                web::scope("/reviews")
                    .route("/recipe/{recipe_id}", web::get().to(reviews::get_reviews_by_recipe))
                    .route("/user/{user_id}", web::get().to(reviews::get_reviews_by_user))
                    .route("/{id}", web::get().to(reviews::get_review))
                    .service(
                        web::resource("")
                            .guard(guard::Post())
                            .wrap(AuthMiddleware)
                            .route(web::post().to(reviews::create_review)),
                    )
                    .service(
                        web::resource("/{id}")
                            .guard(guard::Any(guard::Put()).or(guard::Delete()))
                            .wrap(AuthMiddleware)
                            .route(web::put().to(reviews::update_review))
                            .route(web::delete().to(reviews::delete_review)),
                    ),
            )
            .service(
                web::scope("/users")
                    .wrap(AuthMiddleware)
                    .route("/profile", web::get().to(users::get_profile))
                    .route("/profile", web::put().to(users::update_profile))
                    .route("/save-recipe", web::post().to(users::save_recipe))
                    .route("/unsave-recipe/{recipe_id}", web::delete().to(users::unsave_recipe))
                    .route("/saved-recipes", web::get().to(users::get_saved_recipes)),
            )
            .service(
                web::scope("/restaurants")
                    .route("/nearby", web::get().to(restaurants::get_nearby_restaurants)),
            ),
    );
}
