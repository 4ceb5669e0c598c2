use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::api::{ApiError, ApiResult};
use crate::auth::UserSession;
use crate::models::{CreateReservationRequest, CreateSpaceRequest, Reservation, ReservationStatus, Space};

const SPACE_COLUMNS: &str = "id, name, description, space_type, capacity, location, active";
const RESERVATION_COLUMNS: &str =
    "id, account_id, space_id, reserved_on, starts_at, ends_at, status, notes, created_at";

#[derive(Debug, Clone)]
pub struct SpaceService {
    db: PgPool,
}

impl SpaceService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_space(&self, request: CreateSpaceRequest) -> ApiResult<Space> {
        request.validate()?;

        let space = sqlx::query_as::<_, Space>(&format!(
            "INSERT INTO spaces (id, name, description, space_type, capacity, location)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            SPACE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(request.name.trim())
        .bind(&request.description)
        .bind(request.space_type)
        .bind(request.capacity)
        .bind(&request.location)
        .fetch_one(&self.db)
        .await?;

        info!(space_id = %space.id, "space created");
        Ok(space)
    }

    pub async fn list_spaces(&self) -> ApiResult<Vec<Space>> {
        let spaces = sqlx::query_as::<_, Space>(&format!(
            "SELECT {} FROM spaces WHERE active ORDER BY name",
            SPACE_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(spaces)
    }

    pub async fn space(&self, id: Uuid) -> ApiResult<Space> {
        sqlx::query_as::<_, Space>(&format!("SELECT {} FROM spaces WHERE id = $1 AND active", SPACE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(ApiError::NotFound("space"))
    }

    /// Book a slot. Any non-cancelled reservation of the same space that
    /// overlaps the slot blocks the booking.
    #[tracing::instrument(skip(self, session, request), fields(account_id = %session.account_id))]
    pub async fn reserve(&self, session: &UserSession, request: CreateReservationRequest) -> ApiResult<Reservation> {
        request.validate()?;
        if request.reserved_on < Utc::now().date_naive() {
            return Err(ApiError::BadRequest("reservations cannot be made in the past".to_string()));
        }

        let mut tx = self.db.begin().await?;

        // Locking the space serializes bookings for it.
        let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM spaces WHERE id = $1 AND active FOR UPDATE")
            .bind(request.space_id)
            .fetch_optional(&mut *tx)
            .await?;
        if found.is_none() {
            return Err(ApiError::NotFound("space"));
        }

        let overlapping: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM reservations
                 WHERE space_id = $1 AND reserved_on = $2 AND status <> 'cancelled'
                   AND starts_at < $4 AND ends_at > $3
             )",
        )
        .bind(request.space_id)
        .bind(request.reserved_on)
        .bind(request.starts_at)
        .bind(request.ends_at)
        .fetch_one(&mut *tx)
        .await?;
        if overlapping {
            return Err(ApiError::Conflict("the space is already booked for that time".to_string()));
        }

        let reservation = sqlx::query_as::<_, Reservation>(&format!(
            "INSERT INTO reservations (id, account_id, space_id, reserved_on, starts_at, ends_at, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            RESERVATION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(session.account_id)
        .bind(request.space_id)
        .bind(request.reserved_on)
        .bind(request.starts_at)
        .bind(request.ends_at)
        .bind(&request.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(reservation_id = %reservation.id, "space reserved");
        Ok(reservation)
    }

    pub async fn list_own(&self, account_id: Uuid) -> ApiResult<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {} FROM reservations WHERE account_id = $1 ORDER BY reserved_on, starts_at",
            RESERVATION_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        Ok(reservations)
    }

    pub async fn count_pending(&self) -> ApiResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM reservations WHERE status = 'pending'")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    /// Cancelling an already cancelled reservation changes nothing.
    pub async fn cancel(&self, session: &UserSession, id: Uuid) -> ApiResult<Reservation> {
        let reservation = self.find(id).await?;
        if reservation.account_id != session.account_id {
            return Err(ApiError::Forbidden("this reservation belongs to someone else"));
        }
        if reservation.status == ReservationStatus::Cancelled {
            return Ok(reservation);
        }

        self.set_status(id, ReservationStatus::Cancelled).await
    }

    pub async fn confirm(&self, id: Uuid) -> ApiResult<Reservation> {
        let reservation = self.find(id).await?;
        match reservation.status {
            ReservationStatus::Confirmed => Ok(reservation),
            ReservationStatus::Cancelled => {
                Err(ApiError::Conflict("a cancelled reservation cannot be confirmed".to_string()))
            }
            ReservationStatus::Pending => self.set_status(id, ReservationStatus::Confirmed).await,
        }
    }

    async fn find(&self, id: Uuid) -> ApiResult<Reservation> {
        sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {} FROM reservations WHERE id = $1",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ApiError::NotFound("reservation"))
    }

    async fn set_status(&self, id: Uuid, status: ReservationStatus) -> ApiResult<Reservation> {
        let reservation = sqlx::query_as::<_, Reservation>(&format!(
            "UPDATE reservations SET status = $2 WHERE id = $1 RETURNING {}",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .bind(status)
        .fetch_one(&self.db)
        .await?;

        info!(reservation_id = %id, status = ?status, "reservation status changed");
        Ok(reservation)
    }
}
