use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::dto::MessageResponse;
use crate::auth::guard::CurrentUser;
use crate::auth::validate::FieldError;
use crate::error::AppError;
use crate::meals::dto::{CreateMealRequest, MealFilter, MetricsResponse, UpdateMealRequest};
use crate::meals::repo::{self, Meal};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals).post(create_meal))
        .route(
            "/meals/:id",
            get(get_meal).put(update_meal).delete(delete_meal),
        )
        .route("/me/metrics", get(get_metrics))
}

fn require_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(body)| body).map_err(|_| {
        AppError::Validation(vec![FieldError::new("", "Request body is required")])
    })
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
async fn create_meal(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Result<Json<CreateMealRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Meal>), AppError> {
    let body = require_body(payload)?;
    if body.name.trim().is_empty() {
        return Err(AppError::Validation(vec![FieldError::new(
            "name",
            "Name must not be empty",
        )]));
    }
    let meal = repo::create(
        &state.db,
        user.id,
        &body.name,
        body.description.as_deref().unwrap_or(""),
        body.datetime,
        body.is_on_diet,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(meal)))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn list_meals(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<MealFilter>,
) -> Result<Json<Vec<Meal>>, AppError> {
    let meals = repo::list_by_user(&state.db, user.id, filter.is_on_diet).await?;
    Ok(Json(meals))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn get_meal(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Meal>, AppError> {
    let meal = repo::get_one(&state.db, user.id, id)
        .await?
        .ok_or(AppError::MealNotFound)?;
    Ok(Json(meal))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
async fn update_meal(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateMealRequest>, JsonRejection>,
) -> Result<Json<Meal>, AppError> {
    let body = require_body(payload)?;
    let meal = repo::update(
        &state.db,
        user.id,
        id,
        body.name.as_deref(),
        body.description.as_deref(),
        body.datetime,
        body.is_on_diet,
    )
    .await?
    .ok_or(AppError::MealNotFound)?;
    Ok(Json(meal))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn delete_meal(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let deleted = repo::delete(&state.db, user.id, id).await?;
    if deleted == 0 {
        return Err(AppError::MealNotFound);
    }
    Ok(Json(MessageResponse {
        message: "Meal deleted successfully",
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn get_metrics(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<MetricsResponse>, AppError> {
    let flags = repo::diet_flags_by_creation(&state.db, user.id).await?;
    Ok(Json(compute_metrics(&flags)))
}

/// Fold over meals in creation order: totals plus the longest run of
/// consecutive on-diet meals.
fn compute_metrics(diet_flags: &[bool]) -> MetricsResponse {
    let mut current_streak = 0usize;
    let mut best_streak = 0usize;
    let mut within = 0usize;
    for &on_diet in diet_flags {
        if on_diet {
            within += 1;
            current_streak += 1;
            best_streak = best_streak.max(current_streak);
        } else {
            current_streak = 0;
        }
    }
    MetricsResponse {
        total_meals: diet_flags.len(),
        within_diet_meals: within,
        out_diet_meals: diet_flags.len() - within,
        best_diet_streak: best_streak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_over_no_meals_are_zero() {
        assert_eq!(
            compute_metrics(&[]),
            MetricsResponse {
                total_meals: 0,
                within_diet_meals: 0,
                out_diet_meals: 0,
                best_diet_streak: 0,
            }
        );
    }

    #[test]
    fn streak_resets_on_off_diet_meal() {
        let flags = [true, true, false, true, true, true, false];
        assert_eq!(
            compute_metrics(&flags),
            MetricsResponse {
                total_meals: 7,
                within_diet_meals: 5,
                out_diet_meals: 2,
                best_diet_streak: 3,
            }
        );
    }

    #[test]
    fn all_on_diet_is_one_long_streak() {
        let flags = [true; 5];
        assert_eq!(compute_metrics(&flags).best_diet_streak, 5);
        assert_eq!(compute_metrics(&flags).out_diet_meals, 0);
    }
}
