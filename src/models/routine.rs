use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::ExerciseCategory;
use super::validation::not_blank;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Type)]
#[sqlx(type_name = "routine_frequency", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoutineFrequency {
    Daily,
    #[default]
    Weekly,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Routine {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    pub is_template: bool,
    pub author_trainer_id: Option<Uuid>,
    pub frequency: RoutineFrequency,
    pub weekdays: String,
    pub personal_goal: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoutineItem {
    pub id: Uuid,
    pub routine_id: Uuid,
    pub exercise_id: Uuid,
    pub position: i32,
    pub sets: Option<i32>,
    pub reps: Option<i32>,
    pub seconds: Option<i32>,
    pub notes: String,
}

/// Routine item joined with the exercise it prescribes.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RoutineItemView {
    pub id: Uuid,
    pub exercise_id: Uuid,
    pub exercise_name: String,
    pub exercise_category: ExerciseCategory,
    pub position: i32,
    pub sets: Option<i32>,
    pub reps: Option<i32>,
    pub seconds: Option<i32>,
    pub notes: String,
}

#[derive(Debug, Serialize)]
pub struct RoutineDetail {
    pub routine: Routine,
    pub items: Vec<RoutineItemView>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoutineRequest {
    #[validate(
        length(min = 1, max = 120, message = "name must be 1-120 characters"),
        custom(function = "not_blank")
    )]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub frequency: RoutineFrequency,
    #[validate(length(max = 50))]
    #[serde(default)]
    pub weekdays: String,
    #[serde(default)]
    pub personal_goal: String,
}

/// An item needs a duration, or both sets and reps.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_item_volume"))]
pub struct AddRoutineItemRequest {
    pub exercise_id: Uuid,
    #[validate(range(min = 1))]
    pub position: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub sets: Option<i32>,
    #[validate(range(min = 0, max = 1000))]
    pub reps: Option<i32>,
    #[validate(range(min = 0, max = 86400))]
    pub seconds: Option<i32>,
    #[validate(length(max = 255))]
    #[serde(default)]
    pub notes: String,
}

fn validate_item_volume(item: &AddRoutineItemRequest) -> Result<(), ValidationError> {
    if has_volume(item.sets, item.reps, item.seconds) {
        Ok(())
    } else {
        let mut error = ValidationError::new("item_volume");
        error.message = Some("define seconds, or both sets and reps".into());
        Err(error)
    }
}

pub fn has_volume(sets: Option<i32>, reps: Option<i32>, seconds: Option<i32>) -> bool {
    let positive = |v: Option<i32>| v.map_or(false, |v| v > 0);
    positive(seconds) || (positive(sets) && positive(reps))
}

/// Name given to a routine adopted from a preset.
pub fn adopted_name(preset_name: &str) -> String {
    format!("{} (my copy)", preset_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(sets: Option<i32>, reps: Option<i32>, seconds: Option<i32>) -> AddRoutineItemRequest {
        AddRoutineItemRequest {
            exercise_id: Uuid::new_v4(),
            position: None,
            sets,
            reps,
            seconds,
            notes: String::new(),
        }
    }

    #[test]
    fn item_requires_time_or_sets_and_reps() {
        assert!(item(None, None, Some(60)).validate().is_ok());
        assert!(item(Some(3), Some(12), None).validate().is_ok());
        assert!(item(Some(3), None, None).validate().is_err());
        assert!(item(None, Some(10), None).validate().is_err());
        assert!(item(None, None, None).validate().is_err());
        assert!(item(Some(0), Some(10), Some(0)).validate().is_err());
    }

    #[test]
    fn adopted_routine_name_marks_the_copy() {
        assert_eq!(adopted_name("Full body"), "Full body (my copy)");
    }

    #[test]
    fn routine_name_must_not_be_empty() {
        let request = CreateRoutineRequest {
            name: String::new(),
            description: String::new(),
            frequency: RoutineFrequency::Weekly,
            weekdays: String::new(),
            personal_goal: String::new(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn whitespace_only_name_is_rejected() {
        let request = CreateRoutineRequest {
            name: "   ".into(),
            description: String::new(),
            frequency: RoutineFrequency::Weekly,
            weekdays: String::new(),
            personal_goal: String::new(),
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }
}
