//! Shared domain types and configuration for the cardscout pipeline.

pub mod config;
pub mod types;

pub use config::AppConfig;
pub use types::{
    base_categories, CardRecord, CardSource, CategoryDetail, Dataset, PointValue, RewardType,
    RotatingCategories, CATEGORIES,
};
