use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HealthProfile {
    pub account_id: Uuid,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<i32>,
    pub medical_conditions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HealthProfile {
    /// Body mass index rounded to one decimal, when weight and height are known.
    pub fn bmi(&self) -> Option<f64> {
        let weight = self.weight_kg?;
        let height_m = f64::from(self.height_cm?) / 100.0;
        if height_m <= 0.0 {
            return None;
        }
        Some((weight / (height_m * height_m) * 10.0).round() / 10.0)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertHealthProfileRequest {
    #[validate(range(min = 1.0, max = 500.0, message = "weight must be between 1 and 500 kg"))]
    pub weight_kg: Option<f64>,
    #[validate(range(min = 50, max = 300, message = "height must be between 50 and 300 cm"))]
    pub height_cm: Option<i32>,
    #[serde(default)]
    pub medical_conditions: String,
}

#[derive(Debug, Serialize)]
pub struct HealthProfileView {
    #[serde(flatten)]
    pub profile: HealthProfile,
    pub bmi: Option<f64>,
}
