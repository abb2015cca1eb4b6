use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::features::transactions::models::{Transaction, TransactionKind, TransactionStatus};

/// Response DTO for transaction
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionResponseDto {
    pub id: Uuid,
    pub report_id: Uuid,
    pub kind: TransactionKind,
    #[schema(value_type = String, example = "200")]
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub provider: Option<String>,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponseDto {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id,
            report_id: t.report_id,
            kind: t.kind,
            amount: t.amount,
            status: t.status,
            provider: t.provider,
            phone_number: t.phone_number,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RepairResponseDto {
    /// Match links whose setup finished during this repair
    pub settled: usize,
}
