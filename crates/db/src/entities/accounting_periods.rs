//! `SeaORM` Entity for the accounting_periods table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::PeriodStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "accounting_periods")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub year: i32,
    pub month: i32,
    pub status: PeriodStatus,
    pub closed_by: Option<Uuid>,
    pub closed_at: Option<DateTimeWithTimeZone>,
    pub locked_by: Option<Uuid>,
    pub locked_at: Option<DateTimeWithTimeZone>,
    pub closing_entry_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::period_events::Entity")]
    PeriodEvents,
}

impl Related<super::period_events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PeriodEvents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
