use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Restaurant suggestion in the shape the client renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    /// Provider detail page
    pub url: Option<String>,
    pub price: String,
    pub rating: Option<f64>,
    pub review_count: u32,
    /// Approximate travel time in minutes
    pub distance: Option<u32>,
    pub categories: Vec<String>,
    pub coordinates: Option<Coordinates>,
    pub address: String,
}
