use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Meal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub datetime: OffsetDateTime,
    pub is_on_diet: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

pub async fn create(
    db: &PgPool,
    user_id: Uuid,
    name: &str,
    description: &str,
    datetime: OffsetDateTime,
    is_on_diet: bool,
) -> anyhow::Result<Meal> {
    let meal = sqlx::query_as::<_, Meal>(
        r#"
        INSERT INTO meals (user_id, name, description, datetime, is_on_diet)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, user_id, name, description, datetime, is_on_diet, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(description)
    .bind(datetime)
    .bind(is_on_diet)
    .fetch_one(db)
    .await?;
    Ok(meal)
}

/// Partial update; absent fields keep their current value. Ownership is
/// part of the WHERE clause, a foreign meal id reads as not-found.
pub async fn update(
    db: &PgPool,
    user_id: Uuid,
    meal_id: Uuid,
    name: Option<&str>,
    description: Option<&str>,
    datetime: Option<OffsetDateTime>,
    is_on_diet: Option<bool>,
) -> anyhow::Result<Option<Meal>> {
    let meal = sqlx::query_as::<_, Meal>(
        r#"
        UPDATE meals
        SET name        = COALESCE($3, name),
            description = COALESCE($4, description),
            datetime    = COALESCE($5, datetime),
            is_on_diet  = COALESCE($6, is_on_diet),
            updated_at  = now()
        WHERE id = $1 AND user_id = $2
        RETURNING id, user_id, name, description, datetime, is_on_diet, created_at, updated_at
        "#,
    )
    .bind(meal_id)
    .bind(user_id)
    .bind(name)
    .bind(description)
    .bind(datetime)
    .bind(is_on_diet)
    .fetch_optional(db)
    .await?;
    Ok(meal)
}

pub async fn list_by_user(
    db: &PgPool,
    user_id: Uuid,
    is_on_diet: Option<bool>,
) -> anyhow::Result<Vec<Meal>> {
    let meals = sqlx::query_as::<_, Meal>(
        r#"
        SELECT id, user_id, name, description, datetime, is_on_diet, created_at, updated_at
        FROM meals
        WHERE user_id = $1 AND ($2::boolean IS NULL OR is_on_diet = $2)
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(is_on_diet)
    .fetch_all(db)
    .await?;
    Ok(meals)
}

pub async fn get_one(db: &PgPool, user_id: Uuid, meal_id: Uuid) -> anyhow::Result<Option<Meal>> {
    let meal = sqlx::query_as::<_, Meal>(
        r#"
        SELECT id, user_id, name, description, datetime, is_on_diet, created_at, updated_at
        FROM meals
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(meal_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(meal)
}

/// Returns the affected-row count; 0 means no such meal for this user.
pub async fn delete(db: &PgPool, user_id: Uuid, meal_id: Uuid) -> anyhow::Result<u64> {
    let result = sqlx::query(r#"DELETE FROM meals WHERE id = $1 AND user_id = $2"#)
        .bind(meal_id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

/// On-diet flags in creation order, the input of the metrics fold.
pub async fn diet_flags_by_creation(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<bool>> {
    let rows = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT is_on_diet
        FROM meals
        WHERE user_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
