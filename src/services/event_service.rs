use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::api::{ApiError, ApiResult};
use crate::models::{spots_left, CreateEventRequest, Event, EventDetail, EventRegistration};

const EVENT_COLUMNS: &str =
    "id, title, description, starts_at, ends_at, event_type, location, capacity, active, created_at";

#[derive(Debug, Clone)]
pub struct EventService {
    db: PgPool,
}

impl EventService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, request: CreateEventRequest) -> ApiResult<Event> {
        request.validate()?;

        let event = sqlx::query_as::<_, Event>(&format!(
            "INSERT INTO events (id, title, description, starts_at, ends_at, event_type, location, capacity)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {}",
            EVENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(request.title.trim())
        .bind(&request.description)
        .bind(request.starts_at)
        .bind(request.ends_at)
        .bind(request.event_type)
        .bind(&request.location)
        .bind(request.capacity)
        .fetch_one(&self.db)
        .await?;

        info!(event_id = %event.id, "event created");
        Ok(event)
    }

    pub async fn deactivate(&self, id: Uuid) -> ApiResult<Event> {
        sqlx::query_as::<_, Event>(&format!(
            "UPDATE events SET active = FALSE WHERE id = $1 RETURNING {}",
            EVENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ApiError::NotFound("event"))
    }

    /// Active events that have not finished yet, soonest first.
    pub async fn list_upcoming(&self) -> ApiResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM events WHERE active AND ends_at > NOW() ORDER BY starts_at",
            EVENT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(events)
    }

    pub async fn count_upcoming(&self) -> ApiResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE active AND ends_at > NOW()")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    pub async fn detail(&self, account_id: Uuid, id: Uuid) -> ApiResult<EventDetail> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM events WHERE id = $1 AND active",
            EVENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ApiError::NotFound("event"))?;

        let (registrations, registered): (i64, bool) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(BOOL_OR(account_id = $2), FALSE)
             FROM event_registrations WHERE event_id = $1",
        )
        .bind(id)
        .bind(account_id)
        .fetch_one(&self.db)
        .await?;

        Ok(EventDetail {
            spots_left: spots_left(event.capacity, registrations),
            event,
            registrations,
            registered,
        })
    }

    /// The event row is locked while counting so two registrations cannot
    /// both take the last spot.
    #[tracing::instrument(skip(self))]
    pub async fn register(&self, account_id: Uuid, event_id: Uuid) -> ApiResult<EventRegistration> {
        let mut tx = self.db.begin().await?;

        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM events WHERE id = $1 AND active FOR UPDATE",
            EVENT_COLUMNS
        ))
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("event"))?;

        if event.ends_at <= Utc::now() {
            return Err(ApiError::BadRequest("this event has already finished".to_string()));
        }

        let registrations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM event_registrations WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(&mut *tx)
            .await?;
        if spots_left(event.capacity, registrations) == Some(0) {
            return Err(ApiError::Conflict("event is full".to_string()));
        }

        let registration = sqlx::query_as::<_, EventRegistration>(
            "INSERT INTO event_registrations (id, account_id, event_id)
             VALUES ($1, $2, $3)
             ON CONFLICT (account_id, event_id) DO NOTHING
             RETURNING id, account_id, event_id, attended, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(account_id)
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::Conflict("already registered for this event".to_string()))?;

        tx.commit().await?;
        info!(event_id = %event_id, "registered for event");
        Ok(registration)
    }

    pub async fn unregister(&self, account_id: Uuid, event_id: Uuid) -> ApiResult<()> {
        let removed = sqlx::query("DELETE FROM event_registrations WHERE account_id = $1 AND event_id = $2")
            .bind(account_id)
            .bind(event_id)
            .execute(&self.db)
            .await?
            .rows_affected();

        if removed == 0 {
            return Err(ApiError::NotFound("registration"));
        }
        Ok(())
    }
}
