use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Publication status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Upcoming,
    Past,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "UPCOMING",
            EventStatus::Past => "PAST",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "UPCOMING" => Some(EventStatus::Upcoming),
            "PAST" => Some(EventStatus::Past),
            _ => None,
        }
    }
}

/// How payments for this event are collected on the M-Pesa side.
///
/// TILL maps to CustomerBuyGoodsOnline, PAYBILL to CustomerPayBillOnline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Till,
    Paybill,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Till => "TILL",
            PaymentMethod::Paybill => "PAYBILL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "TILL" => Some(PaymentMethod::Till),
            "PAYBILL" => Some(PaymentMethod::Paybill),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: Option<String>,
    /// Stored as a storefront-relative path, e.g. /events/poster.jpg
    pub poster_url: Option<String>,
    pub status: String,
    pub payment_method: String,
    /// Till number (Buy Goods) or Paybill shortcode, depending on payment_method
    pub payment_number: Option<String>,
    /// Optional account reference shown to users paying manually via Paybill
    pub paybill_account: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ticket_type::Entity")]
    TicketTypes,
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::ticket_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TicketTypes.def()
    }
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            active_model.created_at = Set(now);
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
        }

        active_model.updated_at = Set(Some(now));

        Ok(active_model)
    }
}
