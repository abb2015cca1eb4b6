use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::features::matching::dtos::MatchLinkDto;
use crate::features::recoveries::services::{RecoverySide, RecoveryStatus};
use crate::features::transactions::dtos::TransactionResponseDto;
use crate::features::transactions::models::PaymentDetails;

/// Mobile money details for paying the recovery fee or receiving a reward
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PaymentRequestDto {
    /// Mobile money provider, e.g. `mpesa` or `airtel_money`
    #[validate(length(min = 1, max = 32, message = "Provider must be 1-32 characters"))]
    pub provider: String,

    /// Phone number in local (`07..`) or international (`+2547..`) form
    #[validate(length(min = 9, max = 20, message = "Phone number must be 9-20 characters"))]
    pub phone_number: String,
}

impl From<PaymentRequestDto> for PaymentDetails {
    fn from(dto: PaymentRequestDto) -> Self {
        Self {
            provider: dto.provider,
            phone_number: dto.phone_number,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CollectionPointDto {
    /// Where the found document can be picked up
    pub collection_point: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecoverySideDto {
    Owner,
    Finder,
}

/// State of a match for one of its two parties
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecoveryStatusDto {
    #[serde(rename = "match")]
    pub link: MatchLinkDto,
    pub side: RecoverySideDto,
    pub transaction: Option<TransactionResponseDto>,
    pub collection_point: Option<String>,
}

impl From<RecoveryStatus> for RecoveryStatusDto {
    fn from(status: RecoveryStatus) -> Self {
        Self {
            link: status.link.into(),
            side: match status.side {
                RecoverySide::Owner => RecoverySideDto::Owner,
                RecoverySide::Finder => RecoverySideDto::Finder,
            },
            transaction: status.transaction.map(Into::into),
            collection_point: status.collection_point,
        }
    }
}
