//! Seat inventory: the single point of truth for ticket capacity.

use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::instrument;
use uuid::Uuid;

use crate::entities::ticket_type::{self, Entity as TicketTypeEntity};
use crate::errors::ServiceError;

/// Service guarding `ticket_types.sold`.
///
/// Stateless: every operation runs against the caller's connection so that
/// payment confirmation can compose the seat reservation with booking updates
/// inside one transaction.
#[derive(Clone, Default)]
pub struct SeatInventoryService;

impl SeatInventoryService {
    pub fn new() -> Self {
        Self
    }

    /// Reserves one seat and returns the seat sequence (the new `sold`).
    ///
    /// The check-and-increment is a single conditional UPDATE guarded by
    /// `sold < capacity`, so two confirmations racing for the last seat
    /// cannot both succeed; the loser gets `SoldOut`.
    #[instrument(skip(self, conn))]
    pub async fn reserve_seat<C: ConnectionTrait>(
        &self,
        conn: &C,
        ticket_type_id: Uuid,
    ) -> Result<i32, ServiceError> {
        let claimed = TicketTypeEntity::update_many()
            .col_expr(
                ticket_type::Column::Sold,
                Expr::col(ticket_type::Column::Sold).add(1),
            )
            .col_expr(
                ticket_type::Column::UpdatedAt,
                Expr::value(chrono::Utc::now()),
            )
            .filter(ticket_type::Column::Id.eq(ticket_type_id))
            .filter(Expr::col(ticket_type::Column::Sold).lt(Expr::col(ticket_type::Column::Capacity)))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;

        if claimed.rows_affected == 0 {
            let ticket = self.get_ticket_type(conn, ticket_type_id).await?;
            return Err(ServiceError::SoldOut(format!(
                "ticket type {} is sold out ({}/{})",
                ticket_type_id, ticket.sold, ticket.capacity
            )));
        }

        let ticket = self.get_ticket_type(conn, ticket_type_id).await?;
        Ok(ticket.sold)
    }

    /// Advisory remaining-capacity read; the reservation above is the only
    /// authority at confirmation time.
    #[instrument(skip(self, conn))]
    pub async fn remaining<C: ConnectionTrait>(
        &self,
        conn: &C,
        ticket_type_id: Uuid,
    ) -> Result<i32, ServiceError> {
        let ticket = self.get_ticket_type(conn, ticket_type_id).await?;
        Ok(ticket.remaining())
    }

    pub async fn get_ticket_type<C: ConnectionTrait>(
        &self,
        conn: &C,
        ticket_type_id: Uuid,
    ) -> Result<ticket_type::Model, ServiceError> {
        TicketTypeEntity::find_by_id(ticket_type_id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("ticket type {} not found", ticket_type_id))
            })
    }
}
