use std::sync::{Arc, Mutex};

use actix_http::Request;
use actix_web::http::header::{AUTHORIZATION, CONTENT_TYPE};
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::http::header::{ACCEPT_ENCODING, CONTENT_ENCODING};
use actix_web::middleware::Compress;
use actix_web::{test, web, App};
use async_trait::async_trait;
use serde_json::Value;

use recipe_service::api;
use recipe_service::database::{MemoryStore, Store};
use recipe_service::models::{Coordinates, Restaurant};
use recipe_service::services::restaurant_service::{RestaurantLookup, RestaurantSearch, SearchArea};
use recipe_service::services::token_service::{sign_with_secret, IdentityClaims, SecretVerifier, TokenVerifier};
use recipe_service::services::UploadStore;
use recipe_service::utils::{AppError, AppResult};

const SECRET: &str = "integration-secret";
const BOUNDARY: &str = "----recipe-test-boundary";

struct FakeRestaurants {
    fail: bool,
    last: Mutex<Option<RestaurantSearch>>,
}

#[async_trait]
impl RestaurantLookup for FakeRestaurants {
    async fn search(&self, search: &RestaurantSearch) -> AppResult<Vec<Restaurant>> {
        if let Ok(mut last) = self.last.lock() {
            *last = Some(search.clone());
        }
        if self.fail {
            return Err(AppError::Upstream("Failed to fetch restaurants".to_string()));
        }
        Ok(vec![Restaurant {
            id: "abc".into(),
            name: "Noodle Bar".into(),
            image: None,
            url: None,
            price: "$$".into(),
            rating: Some(4.5),
            review_count: 10,
            distance: Some(3),
            categories: vec!["Noodles".into()],
            coordinates: Some(Coordinates {
                latitude: 49.2,
                longitude: -123.1,
            }),
            address: "123 Main St".into(),
        }])
    }
}

struct Ctx {
    memory: Arc<MemoryStore>,
    store: web::Data<dyn Store>,
    verifier: web::Data<dyn TokenVerifier>,
    restaurants: Arc<FakeRestaurants>,
    restaurants_data: web::Data<dyn RestaurantLookup>,
    uploads: web::Data<UploadStore>,
    dir: tempfile::TempDir,
}

impl Ctx {
    fn new() -> Self {
        Self::with_restaurants(false)
    }

    fn with_restaurants(fail: bool) -> Self {
        let memory = Arc::new(MemoryStore::new());
        let store: Arc<dyn Store> = memory.clone();
        let verifier: Arc<dyn TokenVerifier> = Arc::new(SecretVerifier::new(SECRET, None));
        let restaurants = Arc::new(FakeRestaurants {
            fail,
            last: Mutex::new(None),
        });
        let lookup: Arc<dyn RestaurantLookup> = restaurants.clone();
        let dir = tempfile::tempdir().unwrap();

        Ctx {
            memory,
            store: web::Data::from(store),
            verifier: web::Data::from(verifier),
            restaurants,
            restaurants_data: web::Data::from(lookup),
            uploads: web::Data::new(UploadStore::new(dir.path())),
            dir,
        }
    }
}

macro_rules! app {
    ($ctx:expr) => {
        test::init_service(
            App::new()
                .app_data($ctx.store.clone())
                .app_data($ctx.verifier.clone())
                .app_data($ctx.restaurants_data.clone())
                .app_data($ctx.uploads.clone())
                .configure(api::configure),
        )
        .await
    };
}

fn token(subject: &str, email: &str) -> String {
    let mut claims = IdentityClaims::new(subject, chrono::Duration::minutes(10));
    claims.email = Some(email.to_string());
    format!("Bearer {}", sign_with_secret(SECRET, &claims).unwrap())
}

struct Part<'a> {
    name: &'a str,
    value: &'a [u8],
    file: Option<(&'a str, &'a str)>,
}

fn text<'a>(name: &'a str, value: &'a str) -> Part<'a> {
    Part {
        name,
        value: value.as_bytes(),
        file: None,
    }
}

fn multipart(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.file {
            Some((file_name, content_type)) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    part.name, file_name, content_type
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name).as_bytes(),
            ),
        }
        body.extend_from_slice(part.value);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

fn soup_parts() -> Vec<Part<'static>> {
    vec![
        text("recipeName", "Tomato Soup"),
        text("description", "Warm and simple"),
        text("cookingTime", "30"),
        text("calories", "250"),
        text("ingredients", r#"["tomato","basil"]"#),
        text("instructions", "Chop\nSimmer"),
    ]
}


fn create_request(auth: &str, parts: &[Part<'_>]) -> Request {
    let (content_type, body) = multipart(parts);
    test::TestRequest::post()
        .uri("/api/recipes")
        .insert_header((AUTHORIZATION, auth.to_string()))
        .insert_header((CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request()
}

async fn call_json<S, B>(app: &S, req: Request) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let res = test::call_service(app, req).await;
    let status = res.status();
    let body: Value = test::read_body_json(res).await;
    (status, body)
}

async fn create_soup<S, B>(app: &S, auth: &str) -> String
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, body) = call_json(app, create_request(auth, &soup_parts())).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["recipe"]["id"].as_str().unwrap().to_string()
}

#[actix_web::test]
async fn search_finds_recipe_by_ingredient() {
    let ctx = Ctx::new();
    let app = app!(ctx);
    let ana = token("auth0|ana", "ana@example.com");
    create_soup(&app, &ana).await;

    let req = test::TestRequest::get().uri("/api/recipes/search?query=basil").to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["recipes"][0]["recipeName"], "Tomato Soup");

    let req = test::TestRequest::get().uri("/api/recipes/search?query=garlic").to_request();
    let (_, body) = call_json(&app, req).await;
    assert_eq!(body["recipes"].as_array().unwrap().len(), 0);

    let req = test::TestRequest::get().uri("/api/recipes/search?query=").to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn non_owner_cannot_delete_recipe() {
    let ctx = Ctx::new();
    let app = app!(ctx);
    let ana = token("auth0|ana", "ana@example.com");
    let bo = token("auth0|bo", "bo@example.com");
    let id = create_soup(&app, &ana).await;

    let req = test::TestRequest::delete()
        .uri(&format!("/api/recipes/{}", id))
        .insert_header((AUTHORIZATION, bo))
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let req = test::TestRequest::get().uri(&format!("/api/recipes/{}", id)).to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recipe"]["recipeName"], "Tomato Soup");
}

#[actix_web::test]
async fn owner_updates_and_deletes_recipe() {
    let ctx = Ctx::new();
    let app = app!(ctx);
    let ana = token("auth0|ana", "ana@example.com");
    let id = create_soup(&app, &ana).await;

    let (content_type, body) = multipart(&[text("cookingTime", "45"), text("calories", "")]);
    let req = test::TestRequest::put()
        .uri(&format!("/api/recipes/{}", id))
        .insert_header((AUTHORIZATION, ana.clone()))
        .insert_header((CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["recipe"]["cookingTime"], 45);
    assert_eq!(body["recipe"]["calories"], Value::Null);
    assert_eq!(body["recipe"]["recipeName"], "Tomato Soup");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/recipes/{}", id))
        .insert_header((AUTHORIZATION, ana))
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = test::TestRequest::get().uri(&format!("/api/recipes/{}", id)).to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Recipe not found");
}

#[actix_web::test]
async fn duplicate_save_is_rejected() {
    let ctx = Ctx::new();
    let app = app!(ctx);
    let ana = token("auth0|ana", "ana@example.com");
    let id = create_soup(&app, &ana).await;

    let save = || {
        test::TestRequest::post()
            .uri("/api/users/save-recipe")
            .insert_header((AUTHORIZATION, ana.clone()))
            .set_json(serde_json::json!({ "recipeId": id }))
            .to_request()
    };

    let (status, body) = call_json(&app, save()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["savedRecipes"], serde_json::json!([id]));

    let (status, body) = call_json(&app, save()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Recipe already saved");

    let req = test::TestRequest::get()
        .uri("/api/users/profile")
        .insert_header((AUTHORIZATION, ana.clone()))
        .to_request();
    let (_, body) = call_json(&app, req).await;
    assert_eq!(body["user"]["savedRecipes"].as_array().unwrap().len(), 1);

    // isSaved follows the caller
    let req = test::TestRequest::get()
        .uri(&format!("/api/recipes/{}", id))
        .insert_header((AUTHORIZATION, ana.clone()))
        .to_request();
    let (_, body) = call_json(&app, req).await;
    assert_eq!(body["recipe"]["isSaved"], true);

    let req = test::TestRequest::get().uri(&format!("/api/recipes/{}", id)).to_request();
    let (_, body) = call_json(&app, req).await;
    assert_eq!(body["recipe"]["isSaved"], false);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/users/unsave-recipe/{}", id))
        .insert_header((AUTHORIZATION, ana.clone()))
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["savedRecipes"], serde_json::json!([]));
}

#[actix_web::test]
async fn review_delete_pulls_back_reference() {
    let ctx = Ctx::new();
    let app = app!(ctx);
    let ana = token("auth0|ana", "ana@example.com");
    let id = create_soup(&app, &ana).await;

    let req = test::TestRequest::post()
        .uri("/api/reviews")
        .insert_header((AUTHORIZATION, ana.clone()))
        .set_json(serde_json::json!({ "recipeId": id, "comment": "Lovely" }))
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let review_id = body["review"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::get().uri(&format!("/api/recipes/{}", id)).to_request();
    let (_, body) = call_json(&app, req).await;
    assert_eq!(body["recipe"]["reviews"], serde_json::json!([review_id]));

    let req = test::TestRequest::get().uri(&format!("/api/reviews/recipe/{}", id)).to_request();
    let (_, body) = call_json(&app, req).await;
    assert_eq!(body["reviews"][0]["author"]["username"], "ana");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/reviews/{}", review_id))
        .insert_header((AUTHORIZATION, ana))
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = test::TestRequest::get().uri(&format!("/api/recipes/{}", id)).to_request();
    let (_, body) = call_json(&app, req).await;
    assert_eq!(body["recipe"]["reviews"], serde_json::json!([]));
}

#[actix_web::test]
async fn oversized_form_is_rejected() {
    let ctx = Ctx::new();
    let app = app!(ctx);
    let ana = token("auth0|ana", "ana@example.com");

    let names: Vec<String> = (0..20).map(|i| format!("extra{}", i)).collect();
    let mut parts: Vec<Part<'_>> = soup_parts();
    parts.extend(names.iter().map(|name| text(name, "x")));

    let (status, body) = call_json(&app, create_request(&ana, &parts)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Too many form fields");

    let (_, body) = call_json(&app, test::TestRequest::get().uri("/api/recipes").to_request()).await;
    assert_eq!(body["total"], 0);
}

#[actix_web::test]
async fn non_author_cannot_change_review() {
    let ctx = Ctx::new();
    let app = app!(ctx);
    let ana = token("auth0|ana", "ana@example.com");
    let bo = token("auth0|bo", "bo@example.com");
    let id = create_soup(&app, &ana).await;

    let req = test::TestRequest::post()
        .uri("/api/reviews")
        .insert_header((AUTHORIZATION, ana.clone()))
        .set_json(serde_json::json!({ "recipeId": id, "comment": "Great" }))
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let review_id = body["review"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::put()
        .uri(&format!("/api/reviews/{}", review_id))
        .insert_header((AUTHORIZATION, bo.clone()))
        .set_json(serde_json::json!({ "comment": "Bad" }))
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/reviews/{}", review_id))
        .insert_header((AUTHORIZATION, bo))
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = test::TestRequest::get().uri(&format!("/api/reviews/{}", review_id)).to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["review"]["comment"], "Great");

    let req = test::TestRequest::get().uri(&format!("/api/recipes/{}", id)).to_request();
    let (_, body) = call_json(&app, req).await;
    assert_eq!(body["recipe"]["reviews"], serde_json::json!([review_id]));
}

#[actix_web::test]
async fn concurrent_first_requests_create_one_user() {
    let ctx = Ctx::new();
    let app = app!(ctx);
    let fresh = token("auth0|new", "new@example.com");

    let profile = || {
        test::TestRequest::get()
            .uri("/api/users/profile")
            .insert_header((AUTHORIZATION, fresh.clone()))
            .to_request()
    };
    let (first, second) = futures::join!(call_json(&app, profile()), call_json(&app, profile()));

    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::OK);
    assert_eq!(first.1["user"]["id"], second.1["user"]["id"]);
    assert_eq!(ctx.memory.user_count(), 1);
}

#[actix_web::test]
async fn protected_routes_need_a_valid_token() {
    let ctx = Ctx::new();
    let app = app!(ctx);

    let req = test::TestRequest::get().uri("/api/users/profile").to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Missing authorization token");

    let req = test::TestRequest::post()
        .uri("/api/reviews")
        .insert_header((AUTHORIZATION, "Bearer not-a-jwt"))
        .set_json(serde_json::json!({ "recipeId": "x", "comment": "Hi" }))
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(ctx.memory.user_count(), 0);
}

#[actix_web::test]
async fn malformed_ids_are_not_found() {
    let ctx = Ctx::new();
    let app = app!(ctx);

    let req = test::TestRequest::get().uri("/api/recipes/not-an-id").to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Recipe not found");

    let req = test::TestRequest::get().uri("/api/reviews/not-an-id").to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn image_upload_is_stored_and_validated() {
    let ctx = Ctx::new();
    let app = app!(ctx);
    let ana = token("auth0|ana", "ana@example.com");

    let png = [0x89u8, b'P', b'N', b'G', 0x0d, 0x0a];
    let mut parts = soup_parts();
    parts.push(Part {
        name: "image",
        value: &png,
        file: Some(("soup.png", "image/png")),
    });
    let (status, body) = call_json(&app, create_request(&ana, &parts)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let image = body["recipe"]["image"].as_str().unwrap();
    assert!(image.starts_with("/uploads/recipes/"));
    let file_name = image.trim_start_matches("/uploads/recipes/");
    assert!(ctx.dir.path().join("recipes").join(file_name).exists());

    let mut parts = soup_parts();
    parts.push(Part {
        name: "image",
        value: b"GIF89a",
        file: Some(("soup.gif", "image/gif")),
    });
    let (status, body) = call_json(&app, create_request(&ana, &parts)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Only JPEG and PNG images are allowed");
}

#[actix_web::test]
async fn nearby_restaurants_use_lookup() {
    let ctx = Ctx::new();
    let app = app!(ctx);

    let req = test::TestRequest::get()
        .uri("/api/restaurants/nearby?latitude=49.28&longitude=-123.12&limit=2")
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["restaurants"][0]["name"], "Noodle Bar");
    assert_eq!(body["restaurants"][0]["reviewCount"], 10);

    let last = ctx.restaurants.last.lock().unwrap().clone().unwrap();
    assert_eq!(
        last.area,
        SearchArea::Coordinates {
            latitude: 49.28,
            longitude: -123.12
        }
    );
    assert_eq!(last.limit, 2);

    let req = test::TestRequest::get()
        .uri("/api/restaurants/nearby?limit=lots")
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn provider_failure_is_bad_gateway() {
    let ctx = Ctx::with_restaurants(true);
    let app = app!(ctx);

    let req = test::TestRequest::get().uri("/api/restaurants/nearby").to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Failed to fetch restaurants");
}

#[actix_web::test]
async fn health_and_index_respond() {
    let ctx = Ctx::new();
    let app = app!(ctx);

    let (status, body) = call_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = call_json(&app, test::TestRequest::get().uri("/api").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[actix_web::test]
async fn responses_are_gzipped_when_accepted() {
    let ctx = Ctx::new();
    let app = test::init_service(
        App::new()
            .app_data(ctx.store.clone())
            .app_data(ctx.verifier.clone())
            .app_data(ctx.restaurants_data.clone())
            .app_data(ctx.uploads.clone())
            .wrap(Compress::default())
            .configure(api::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/recipes")
        .insert_header((ACCEPT_ENCODING, "gzip"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get(CONTENT_ENCODING).unwrap(), "gzip");
}
