use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{Coordinates, Restaurant};
use crate::utils::{AppError, AppResult};

const DEFAULT_LIMIT: u32 = 4;
const MAX_LIMIT: u32 = 50;
const DEFAULT_TERM: &str = "restaurants";
const DEFAULT_RADIUS_METERS: u32 = 10_000;
const MAX_RADIUS_METERS: u32 = 40_000;
const DEFAULT_PRICE: &str = "$";
/// Meters covered in one minute at city driving speed.
const METERS_PER_MINUTE: f64 = 160.934;

/// Raw `/restaurants/nearby` query string. Parsed by [`build_search`] so bad
/// numbers come back through the regular error envelope.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RestaurantQuery {
    pub location: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub term: Option<String>,
    pub radius: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchArea {
    Coordinates { latitude: f64, longitude: f64 },
    Location(String),
    /// Resolved by the lookup to its configured default location.
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestaurantSearch {
    pub area: SearchArea,
    pub limit: u32,
    pub offset: u32,
    pub term: String,
    pub radius: u32,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &Option<String>) -> AppResult<Option<T>> {
    match non_blank(value) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::validation(format!("{} must be a number", key))),
    }
}

pub fn build_search(query: &RestaurantQuery) -> AppResult<RestaurantSearch> {
    let latitude: Option<f64> = parse_number("latitude", &query.latitude)?;
    let longitude: Option<f64> = parse_number("longitude", &query.longitude)?;

    let area = match (latitude, longitude) {
        (Some(lat), Some(lon)) => {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                return Err(AppError::validation("Coordinates are out of range"));
            }
            SearchArea::Coordinates {
                latitude: lat,
                longitude: lon,
            }
        }
        _ => match non_blank(&query.location) {
            Some(location) => SearchArea::Location(location.to_string()),
            None => SearchArea::Default,
        },
    };

    let limit = match parse_number::<u32>("limit", &query.limit)? {
        Some(0) => return Err(AppError::validation("limit must be at least 1")),
        Some(limit) => limit.min(MAX_LIMIT),
        None => DEFAULT_LIMIT,
    };
    let radius = parse_number::<u32>("radius", &query.radius)?
        .unwrap_or(DEFAULT_RADIUS_METERS)
        .min(MAX_RADIUS_METERS);

    Ok(RestaurantSearch {
        area,
        limit,
        offset: parse_number("offset", &query.offset)?.unwrap_or(0),
        term: non_blank(&query.term).unwrap_or(DEFAULT_TERM).to_string(),
        radius,
    })
}

#[async_trait]
pub trait RestaurantLookup: Send + Sync {
    async fn search(&self, search: &RestaurantSearch) -> AppResult<Vec<Restaurant>>;
}

#[derive(Debug, Deserialize)]
pub struct YelpSearchResponse {
    #[serde(default)]
    pub businesses: Vec<YelpBusiness>,
}

#[derive(Debug, Deserialize)]
pub struct YelpBusiness {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: Option<u32>,
    /// Meters from the search point
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub categories: Vec<YelpCategory>,
    #[serde(default)]
    pub coordinates: Option<YelpCoordinates>,
    #[serde(default)]
    pub location: Option<YelpLocation>,
}

#[derive(Debug, Deserialize)]
pub struct YelpCategory {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct YelpCoordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct YelpLocation {
    #[serde(default)]
    pub display_address: Vec<String>,
}

impl From<YelpBusiness> for Restaurant {
    fn from(business: YelpBusiness) -> Self {
        let coordinates = business.coordinates.and_then(|c| match (c.latitude, c.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
            _ => None,
        });

        Restaurant {
            id: business.id,
            name: business.name,
            image: business.image_url.filter(|url| !url.is_empty()),
            url: business.url,
            price: business
                .price
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_PRICE.to_string()),
            rating: business.rating,
            review_count: business.review_count.unwrap_or(0),
            distance: business
                .distance
                .map(|meters| (meters / METERS_PER_MINUTE).round() as u32),
            categories: business.categories.into_iter().map(|c| c.title).collect(),
            coordinates,
            address: business
                .location
                .map(|l| l.display_address.join(", "))
                .unwrap_or_default(),
        }
    }
}

/// Yelp Fusion business search.
pub struct YelpClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    default_location: String,
}

impl YelpClient {
    pub fn new(base_url: &str, api_key: Option<String>, default_location: &str) -> Self {
        YelpClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            default_location: default_location.to_string(),
        }
    }

    pub fn query_params(&self, search: &RestaurantSearch) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(8);
        match &search.area {
            SearchArea::Coordinates { latitude, longitude } => {
                params.push(("latitude", latitude.to_string()));
                params.push(("longitude", longitude.to_string()));
            }
            SearchArea::Location(location) => params.push(("location", location.clone())),
            SearchArea::Default => params.push(("location", self.default_location.clone())),
        }
        params.push(("term", search.term.clone()));
        params.push(("categories", "restaurants".to_string()));
        params.push(("sort_by", "rating".to_string()));
        params.push(("limit", search.limit.to_string()));
        params.push(("offset", search.offset.to_string()));
        params.push(("radius", search.radius.to_string()));
        params
    }

    async fn fetch(&self, search: &RestaurantSearch) -> Result<YelpSearchResponse, String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| "YELP_API_KEY is not configured".to_string())?;

        let url = format!("{}/businesses/search", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(api_key)
            .header("Accept", "application/json")
            .query(&self.query_params(search))
            .send()
            .await
            .map_err(|e| format!("Failed to reach Yelp: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Yelp API error: {}", response.status()));
        }

        response
            .json::<YelpSearchResponse>()
            .await
            .map_err(|e| format!("Failed to parse Yelp response: {}", e))
    }
}

#[async_trait]
impl RestaurantLookup for YelpClient {
    async fn search(&self, search: &RestaurantSearch) -> AppResult<Vec<Restaurant>> {
        log::info!("🍽️  Searching Yelp: {:?} term={}", search.area, search.term);

        let body = self.fetch(search).await.map_err(|e| {
            log::error!("❌ {}", e);
            AppError::Upstream("Failed to fetch restaurants".to_string())
        })?;

        let restaurants: Vec<Restaurant> = body.businesses.into_iter().map(Restaurant::from).collect();
        log::info!("✅ Yelp returned {} restaurants", restaurants.len());
        Ok(restaurants)
    }
}
