//! `SeaORM` Entity for the period_events table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::PeriodAction;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "period_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub period_id: Uuid,
    pub action: PeriodAction,
    pub actor_id: Uuid,
    #[sea_orm(column_type = "Text", nullable)]
    pub reason: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounting_periods::Entity",
        from = "Column::PeriodId",
        to = "super::accounting_periods::Column::Id"
    )]
    AccountingPeriods,
}

impl Related<super::accounting_periods::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccountingPeriods.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
