use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::validation::not_blank;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Type)]
#[sqlx(type_name = "event_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Workshop,
    Event,
    Class,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub event_type: EventType,
    pub location: String,
    pub capacity: Option<i32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_event_window"))]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 200), custom(function = "not_blank"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub event_type: EventType,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub location: String,
    #[validate(range(min = 1))]
    pub capacity: Option<i32>,
}

fn validate_event_window(event: &CreateEventRequest) -> Result<(), ValidationError> {
    if event.starts_at < event.ends_at {
        Ok(())
    } else {
        let mut error = ValidationError::new("event_window");
        error.message = Some("event must end after it starts".into());
        Err(error)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventRegistration {
    pub id: Uuid,
    pub account_id: Uuid,
    pub event_id: Uuid,
    pub attended: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct EventDetail {
    pub event: Event,
    pub registrations: i64,
    pub spots_left: Option<i64>,
    pub registered: bool,
}

pub fn spots_left(capacity: Option<i32>, registrations: i64) -> Option<i64> {
    capacity.map(|c| (i64::from(c) - registrations).max(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn event_must_end_after_start() {
        let start = Utc::now();
        let mut request = CreateEventRequest {
            title: "Mobility workshop".to_string(),
            description: String::new(),
            starts_at: start,
            ends_at: start + Duration::hours(2),
            event_type: EventType::Workshop,
            location: "Main gym".to_string(),
            capacity: Some(20),
        };
        assert!(request.validate().is_ok());

        request.ends_at = start;
        assert!(request.validate().is_err());
    }

    #[test]
    fn blank_title_is_rejected() {
        let start = Utc::now();
        let request = CreateEventRequest {
            title: "  ".to_string(),
            description: String::new(),
            starts_at: start,
            ends_at: start + Duration::hours(1),
            event_type: EventType::Workshop,
            location: String::new(),
            capacity: None,
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
    }

    #[test]
    fn spots_never_go_negative() {
        assert_eq!(spots_left(Some(20), 5), Some(15));
        assert_eq!(spots_left(Some(2), 3), Some(0));
        assert_eq!(spots_left(None, 100), None);
    }
}
