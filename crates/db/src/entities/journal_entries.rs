//! `SeaORM` Entity for the journal_entries table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{EntrySource, EntryStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "journal_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub entry_number: String,
    pub entry_date: Date,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub source_type: EntrySource,
    pub reference: Option<String>,
    pub status: EntryStatus,
    #[sea_orm(column_type = "Decimal(Some((20, 4)))")]
    pub total_debit: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 4)))")]
    pub total_credit: Decimal,
    pub is_balanced: bool,
    pub reversal_of: Option<Uuid>,
    pub reversed_by_entry: Option<Uuid>,
    #[sea_orm(column_type = "Text", nullable)]
    pub reversal_reason: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub posted_by: Option<Uuid>,
    pub posted_at: Option<DateTimeWithTimeZone>,
    pub reversed_by: Option<Uuid>,
    pub reversed_at: Option<DateTimeWithTimeZone>,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::journal_lines::Entity")]
    JournalLines,
}

impl Related<super::journal_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JournalLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
