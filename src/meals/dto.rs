use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Deserialize)]
pub struct CreateMealRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub datetime: OffsetDateTime,
    pub is_on_diet: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMealRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub datetime: Option<OffsetDateTime>,
    pub is_on_diet: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct MealFilter {
    pub is_on_diet: Option<bool>,
}

/// Adherence metrics over all of a user's meals.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MetricsResponse {
    pub total_meals: usize,
    pub within_diet_meals: usize,
    pub out_diet_meals: usize,
    pub best_diet_streak: usize,
}
