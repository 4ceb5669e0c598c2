use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

use super::validation::not_blank;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Type)]
#[sqlx(type_name = "exercise_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExerciseCategory {
    Cardio,
    Strength,
    Mobility,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Exercise {
    pub id: Uuid,
    pub name: String,
    pub category: ExerciseCategory,
    pub description: String,
    pub duration_min: i32,
    pub difficulty: i16, // 1-5
    pub video_url: String,
    pub created_by: Option<Uuid>,
    pub is_custom: bool,
    pub instructions: String,
    pub muscles: String,
    pub equipment: String,
    pub precautions: String,
    pub contraindications: String,
    pub variations: String,
    pub created_at: DateTime<Utc>,
}

/// Free-form exercise metadata kept only in the document store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExerciseDetails {
    #[serde(default)]
    pub variations: Vec<String>,
    #[serde(default)]
    pub tips: Vec<String>,
    #[serde(default)]
    pub equipment: Vec<String>,
    #[serde(default)]
    pub muscles: Vec<String>,
    #[serde(default)]
    pub recommended_level: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ExerciseDetails {
    pub fn is_empty(&self) -> bool {
        self.variations.is_empty()
            && self.tips.is_empty()
            && self.equipment.is_empty()
            && self.muscles.is_empty()
            && self.recommended_level.is_empty()
            && self.tags.is_empty()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExerciseRequest {
    #[validate(
        length(min = 1, max = 120, message = "name must be 1-120 characters"),
        custom(function = "not_blank")
    )]
    pub name: String,
    pub category: ExerciseCategory,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0, max = 600))]
    #[serde(default)]
    pub duration_min: i32,
    #[validate(range(min = 1, max = 5, message = "difficulty must be between 1 and 5"))]
    #[serde(default = "default_difficulty")]
    pub difficulty: i16,
    #[validate(url)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub instructions: String,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub muscles: String,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub equipment: String,
    #[serde(default)]
    pub precautions: String,
    #[serde(default)]
    pub contraindications: String,
    #[serde(default)]
    pub variations: String,
    #[serde(default)]
    pub details: Option<ExerciseDetails>,
}

fn default_difficulty() -> i16 {
    1
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateExerciseRequest {
    #[validate(length(min = 1, max = 120), custom(function = "not_blank"))]
    pub name: Option<String>,
    pub category: Option<ExerciseCategory>,
    pub description: Option<String>,
    #[validate(range(min = 0, max = 600))]
    pub duration_min: Option<i32>,
    #[validate(range(min = 1, max = 5))]
    pub difficulty: Option<i16>,
    #[validate(url)]
    pub video_url: Option<String>,
    pub instructions: Option<String>,
    #[validate(length(max = 500))]
    pub muscles: Option<String>,
    #[validate(length(max = 500))]
    pub equipment: Option<String>,
    pub precautions: Option<String>,
    pub contraindications: Option<String>,
    pub variations: Option<String>,
    pub details: Option<ExerciseDetails>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExerciseQuery {
    pub category: Option<ExerciseCategory>,
    pub difficulty: Option<i16>,
    pub search: Option<String>,
    pub custom_only: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ExerciseView {
    pub exercise: Exercise,
    /// Mirror document, `None` when absent or the store is unavailable.
    pub details: Option<Value>,
}
