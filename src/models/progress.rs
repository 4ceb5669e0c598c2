use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProgressLog {
    pub id: Uuid,
    pub account_id: Uuid,
    pub routine_id: Uuid,
    pub logged_on: NaiveDate,
    pub repetitions: Option<i32>,
    pub seconds: Option<i32>,
    pub effort: i16, // 1-10
    pub weight_kg: Option<f64>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProgressRequest {
    pub routine_id: Uuid,
    /// Defaults to today.
    pub logged_on: Option<NaiveDate>,
    #[validate(range(min = 0))]
    pub repetitions: Option<i32>,
    #[validate(range(min = 0, max = 86400))]
    pub seconds: Option<i32>,
    #[validate(range(min = 1, max = 10, message = "effort must be between 1 and 10"))]
    #[serde(default = "default_effort")]
    pub effort: i16,
    #[validate(range(min = 0.0, max = 1000.0))]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub notes: String,
    /// Exercise the session focused on, mirrored only.
    pub exercise_id: Option<Uuid>,
    /// Sensor readings and other free-form metrics, mirrored only.
    #[serde(default)]
    pub metrics: Option<Value>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_effort() -> i16 {
    5
}

#[derive(Debug, Default, Deserialize)]
pub struct ProgressQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub routine_id: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Mirrored session documents for one calendar month, newest first.
#[derive(Debug, Serialize)]
pub struct ProgressHistory {
    pub year: i32,
    pub month: u32,
    pub entries: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct ProgressDetail {
    pub log: ProgressLog,
    pub details: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(effort: i16) -> CreateProgressRequest {
        CreateProgressRequest {
            routine_id: Uuid::new_v4(),
            logged_on: None,
            repetitions: Some(20),
            seconds: None,
            effort,
            weight_kg: Some(40.0),
            notes: String::new(),
            exercise_id: None,
            metrics: None,
            photos: vec![],
            tags: vec![],
        }
    }

    #[test]
    fn effort_is_bounded() {
        assert!(request(1).validate().is_ok());
        assert!(request(10).validate().is_ok());
        assert!(request(0).validate().is_err());
        assert!(request(11).validate().is_err());
    }

    #[test]
    fn effort_defaults_to_five() {
        let parsed: CreateProgressRequest =
            serde_json::from_value(serde_json::json!({ "routine_id": Uuid::new_v4() })).unwrap();
        assert_eq!(parsed.effort, 5);
        assert!(parsed.logged_on.is_none());
    }
}
