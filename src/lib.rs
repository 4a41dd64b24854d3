//! SmartRecipe back end: recipes, reviews, saved lists and nearby
//! restaurant suggestions behind an identity-provider bearer token.

pub mod api;
pub mod client;
pub mod config;
pub mod database;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;
