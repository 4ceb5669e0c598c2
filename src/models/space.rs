use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::validation::not_blank;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Type)]
#[sqlx(type_name = "space_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SpaceType {
    Gym,
    Court,
    Pool,
    Room,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Space {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub space_type: SpaceType,
    pub capacity: Option<i32>,
    pub location: String,
    pub active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSpaceRequest {
    #[validate(length(min = 1, max = 200), custom(function = "not_blank"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub space_type: SpaceType,
    #[validate(range(min = 1))]
    pub capacity: Option<i32>,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Type)]
#[sqlx(type_name = "reservation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: Uuid,
    pub account_id: Uuid,
    pub space_id: Uuid,
    pub reserved_on: NaiveDate,
    pub starts_at: NaiveTime,
    pub ends_at: NaiveTime,
    pub status: ReservationStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_slot"))]
pub struct CreateReservationRequest {
    pub space_id: Uuid,
    pub reserved_on: NaiveDate,
    pub starts_at: NaiveTime,
    pub ends_at: NaiveTime,
    #[serde(default)]
    pub notes: String,
}

fn validate_slot(request: &CreateReservationRequest) -> Result<(), ValidationError> {
    if request.starts_at < request.ends_at {
        Ok(())
    } else {
        let mut error = ValidationError::new("reservation_slot");
        error.message = Some("reservation must end after it starts".into());
        Err(error)
    }
}

/// Two half-open time slots on the same day overlap.
pub fn slots_overlap(a: (NaiveTime, NaiveTime), b: (NaiveTime, NaiveTime)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn adjacent_slots_do_not_overlap() {
        assert!(!slots_overlap((t(10, 0), t(11, 0)), (t(11, 0), t(12, 0))));
        assert!(!slots_overlap((t(11, 0), t(12, 0)), (t(10, 0), t(11, 0))));
    }

    #[test]
    fn intersecting_slots_overlap() {
        assert!(slots_overlap((t(10, 0), t(11, 0)), (t(10, 30), t(11, 30))));
        assert!(slots_overlap((t(9, 0), t(12, 0)), (t(10, 0), t(11, 0))));
        assert!(slots_overlap((t(10, 0), t(11, 0)), (t(10, 0), t(11, 0))));
    }

    #[test]
    fn reservation_must_end_after_start() {
        let request = CreateReservationRequest {
            space_id: Uuid::new_v4(),
            reserved_on: NaiveDate::from_ymd_opt(2030, 1, 10).unwrap(),
            starts_at: t(11, 0),
            ends_at: t(10, 0),
            notes: String::new(),
        };
        assert!(request.validate().is_err());
    }
}
