//! Typed HTTP client for the REST surface, used by front ends and
//! integration tooling.
//!
//! Every protected call goes through [`ApiClient::authorized`], which asks
//! the configured [`TokenSource`] for a fresh access token and attaches it
//! as `Authorization: Bearer <token>`.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{multipart, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::{RecipeResponse, Restaurant, ReviewResponse, UserResponse};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("No access token: {0}")]
    Token(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Supplies access tokens, typically from the identity provider SDK.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> ClientResult<String>;
}

/// A fixed token, for scripts and tests.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> ClientResult<String> {
        Ok(self.0.clone())
    }
}

/// Fields of a recipe create/update form. `None` fields are not sent.
#[derive(Debug, Clone, Default)]
pub struct RecipeDraft {
    pub recipe_name: Option<String>,
    pub description: Option<String>,
    pub cooking_time: Option<u32>,
    /// `Some(None)` sends a blank value, which clears calories on update.
    pub calories: Option<Option<u32>>,
    pub ingredients: Option<Vec<String>>,
    pub instructions: Option<String>,
    pub image: Option<ImageFile>,
}

#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl RecipeDraft {
    fn text_fields(&self) -> ClientResult<Vec<(&'static str, String)>> {
        let mut fields = Vec::new();
        if let Some(v) = &self.recipe_name {
            fields.push(("recipeName", v.clone()));
        }
        if let Some(v) = &self.description {
            fields.push(("description", v.clone()));
        }
        if let Some(v) = self.cooking_time {
            fields.push(("cookingTime", v.to_string()));
        }
        if let Some(v) = self.calories {
            fields.push(("calories", v.map(|c| c.to_string()).unwrap_or_default()));
        }
        if let Some(v) = &self.ingredients {
            fields.push(("ingredients", serde_json::to_string(v)?));
        }
        if let Some(v) = &self.instructions {
            fields.push(("instructions", v.clone()));
        }
        Ok(fields)
    }

    fn into_form(self) -> ClientResult<multipart::Form> {
        let mut form = multipart::Form::new();
        for (name, value) in self.text_fields()? {
            form = form.text(name, value);
        }
        if let Some(image) = self.image {
            let part = multipart::Part::bytes(image.bytes)
                .file_name(image.file_name)
                .mime_str(&image.content_type)?;
            form = form.part("image", part);
        }
        Ok(form)
    }
}

/// Query for [`ApiClient::nearby_restaurants`].
#[derive(Debug, Clone, Default)]
pub struct NearbyParams {
    pub location: Option<String>,
    pub coordinates: Option<(f64, f64)>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub term: Option<String>,
    pub radius: Option<u32>,
}

impl NearbyParams {
    fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(location) = &self.location {
            pairs.push(("location", location.clone()));
        }
        if let Some((lat, lon)) = self.coordinates {
            pairs.push(("latitude", lat.to_string()));
            pairs.push(("longitude", lon.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        if let Some(term) = &self.term {
            pairs.push(("term", term.clone()));
        }
        if let Some(radius) = self.radius {
            pairs.push(("radius", radius.to_string()));
        }
        pairs
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Option<Arc<dyn TokenSource>>,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://localhost:5001`.
    pub fn new(base_url: &str) -> Self {
        ApiClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens: None,
        }
    }

    pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}/api{}", self.base_url, path))
    }

    /// Attaches the bearer token. Fails when no token source is configured.
    pub async fn authorized(&self, builder: RequestBuilder) -> ClientResult<RequestBuilder> {
        let tokens = self
            .tokens
            .as_ref()
            .ok_or_else(|| ClientError::Token("no token source configured".to_string()))?;
        Ok(builder.bearer_auth(tokens.access_token().await?))
    }

    /// Attaches the bearer token when one is available.
    async fn maybe_authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.tokens {
            Some(tokens) => match tokens.access_token().await {
                Ok(token) => builder.bearer_auth(token),
                Err(_) => builder,
            },
            None => builder,
        }
    }

    /// Checks the envelope and pulls `key` out of it.
    async fn decode<T: DeserializeOwned>(response: Response, key: &str) -> ClientResult<T> {
        let status = response.status();
        let mut body: serde_json::Value = response.json().await?;

        if !status.is_success() || body["success"] != serde_json::Value::Bool(true) {
            let message = body["error"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(serde_json::from_value(body[key].take())?)
    }

    async fn expect_success(response: Response) -> ClientResult<()> {
        Self::decode::<serde_json::Value>(response, "success").await.map(|_| ())
    }

    // Recipes

    pub async fn list_recipes(&self) -> ClientResult<Vec<RecipeResponse>> {
        let response = self.request(Method::GET, "/recipes").send().await?;
        Self::decode(response, "recipes").await
    }

    pub async fn search_recipes(&self, query: &str) -> ClientResult<Vec<RecipeResponse>> {
        let response = self
            .request(Method::GET, "/recipes/search")
            .query(&[("query", query)])
            .send()
            .await?;
        Self::decode(response, "recipes").await
    }

    pub async fn recipes_by_user(&self, user_id: &str) -> ClientResult<Vec<RecipeResponse>> {
        let path = format!("/recipes/user/{}", urlencoding::encode(user_id));
        let response = self.request(Method::GET, &path).send().await?;
        Self::decode(response, "recipes").await
    }

    /// Sends the token when available so `isSaved` reflects the caller.
    pub async fn get_recipe(&self, id: &str) -> ClientResult<RecipeResponse> {
        let path = format!("/recipes/{}", urlencoding::encode(id));
        let builder = self.maybe_authorized(self.request(Method::GET, &path)).await;
        Self::decode(builder.send().await?, "recipe").await
    }

    pub async fn create_recipe(&self, draft: RecipeDraft) -> ClientResult<RecipeResponse> {
        let builder = self.request(Method::POST, "/recipes").multipart(draft.into_form()?);
        let response = self.authorized(builder).await?.send().await?;
        Self::decode(response, "recipe").await
    }

    pub async fn update_recipe(&self, id: &str, draft: RecipeDraft) -> ClientResult<RecipeResponse> {
        let path = format!("/recipes/{}", urlencoding::encode(id));
        let builder = self.request(Method::PUT, &path).multipart(draft.into_form()?);
        let response = self.authorized(builder).await?.send().await?;
        Self::decode(response, "recipe").await
    }

    pub async fn delete_recipe(&self, id: &str) -> ClientResult<()> {
        let path = format!("/recipes/{}", urlencoding::encode(id));
        let response = self.authorized(self.request(Method::DELETE, &path)).await?.send().await?;
        Self::expect_success(response).await
    }

    // Reviews

    pub async fn reviews_for_recipe(&self, recipe_id: &str) -> ClientResult<Vec<ReviewResponse>> {
        let path = format!("/reviews/recipe/{}", urlencoding::encode(recipe_id));
        let response = self.request(Method::GET, &path).send().await?;
        Self::decode(response, "reviews").await
    }

    pub async fn reviews_by_user(&self, user_id: &str) -> ClientResult<Vec<ReviewResponse>> {
        let path = format!("/reviews/user/{}", urlencoding::encode(user_id));
        let response = self.request(Method::GET, &path).send().await?;
        Self::decode(response, "reviews").await
    }

    pub async fn get_review(&self, id: &str) -> ClientResult<ReviewResponse> {
        let path = format!("/reviews/{}", urlencoding::encode(id));
        let response = self.request(Method::GET, &path).send().await?;
        Self::decode(response, "review").await
    }

    pub async fn create_review(&self, recipe_id: &str, comment: &str) -> ClientResult<ReviewResponse> {
        let builder = self
            .request(Method::POST, "/reviews")
            .json(&serde_json::json!({ "recipeId": recipe_id, "comment": comment }));
        let response = self.authorized(builder).await?.send().await?;
        Self::decode(response, "review").await
    }

    pub async fn update_review(&self, id: &str, comment: &str) -> ClientResult<ReviewResponse> {
        let path = format!("/reviews/{}", urlencoding::encode(id));
        let builder = self
            .request(Method::PUT, &path)
            .json(&serde_json::json!({ "comment": comment }));
        let response = self.authorized(builder).await?.send().await?;
        Self::decode(response, "review").await
    }

    pub async fn delete_review(&self, id: &str) -> ClientResult<()> {
        let path = format!("/reviews/{}", urlencoding::encode(id));
        let response = self.authorized(self.request(Method::DELETE, &path)).await?.send().await?;
        Self::expect_success(response).await
    }

    // Users

    pub async fn profile(&self) -> ClientResult<UserResponse> {
        let response = self
            .authorized(self.request(Method::GET, "/users/profile"))
            .await?
            .send()
            .await?;
        Self::decode(response, "user").await
    }

    pub async fn update_profile(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> ClientResult<UserResponse> {
        let mut body = serde_json::Map::new();
        if let Some(username) = username {
            body.insert("username".into(), username.into());
        }
        if let Some(email) = email {
            body.insert("email".into(), email.into());
        }
        let builder = self.request(Method::PUT, "/users/profile").json(&body);
        let response = self.authorized(builder).await?.send().await?;
        Self::decode(response, "user").await
    }

    /// Returns the saved recipe ids after the change.
    pub async fn save_recipe(&self, recipe_id: &str) -> ClientResult<Vec<String>> {
        let builder = self
            .request(Method::POST, "/users/save-recipe")
            .json(&serde_json::json!({ "recipeId": recipe_id }));
        let response = self.authorized(builder).await?.send().await?;
        Self::decode(response, "savedRecipes").await
    }

    pub async fn unsave_recipe(&self, recipe_id: &str) -> ClientResult<Vec<String>> {
        let path = format!("/users/unsave-recipe/{}", urlencoding::encode(recipe_id));
        let response = self.authorized(self.request(Method::DELETE, &path)).await?.send().await?;
        Self::decode(response, "savedRecipes").await
    }

    pub async fn saved_recipes(&self) -> ClientResult<Vec<RecipeResponse>> {
        let response = self
            .authorized(self.request(Method::GET, "/users/saved-recipes"))
            .await?
            .send()
            .await?;
        Self::decode(response, "recipes").await
    }

    // Restaurants

    pub async fn nearby_restaurants(&self, params: &NearbyParams) -> ClientResult<Vec<Restaurant>> {
        let response = self
            .request(Method::GET, "/restaurants/nearby")
            .query(&params.pairs())
            .send()
            .await?;
        Self::decode(response, "restaurants").await
    }
}
