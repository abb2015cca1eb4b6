//! Notification message templates (Jinja2 syntax, rendered with minijinja).

use minijinja::{Environment, Value};
use std::sync::OnceLock;
use thiserror::Error;

static TEMPLATE_ENV: OnceLock<Environment<'static>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTemplate {
    /// To the owner of a lost report when a found report matches it
    MatchFoundOwner,
    /// To the finder when their found report matches a lost report
    MatchFoundFinder,
    /// To the owner after verification: pay the recovery fee
    PayRecoveryFee,
    /// To the finder after the owner verified
    OwnerVerified,
    /// To the owner after payment: where to collect the document
    LocationRevealed,
    /// To the finder after the owner paid
    RewardAvailable,
    /// To the finder after the payout was requested
    RewardClaimed,
}

impl NotificationTemplate {
    pub const ALL: [NotificationTemplate; 7] = [
        NotificationTemplate::MatchFoundOwner,
        NotificationTemplate::MatchFoundFinder,
        NotificationTemplate::PayRecoveryFee,
        NotificationTemplate::OwnerVerified,
        NotificationTemplate::LocationRevealed,
        NotificationTemplate::RewardAvailable,
        NotificationTemplate::RewardClaimed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NotificationTemplate::MatchFoundOwner => "match_found_owner",
            NotificationTemplate::MatchFoundFinder => "match_found_finder",
            NotificationTemplate::PayRecoveryFee => "pay_recovery_fee",
            NotificationTemplate::OwnerVerified => "owner_verified",
            NotificationTemplate::LocationRevealed => "location_revealed",
            NotificationTemplate::RewardAvailable => "reward_available",
            NotificationTemplate::RewardClaimed => "reward_claimed",
        }
    }

    fn source(self) -> &'static str {
        match self {
            NotificationTemplate::MatchFoundOwner => {
                "Good news! A {{ document_type | replace('_', ' ') }} matching your lost report \
                 has been found. Verify that it is yours to continue."
            }
            NotificationTemplate::MatchFoundFinder => {
                "The {{ document_type | replace('_', ' ') }} you found matches a lost report. \
                 We will let you know once the owner verifies it."
            }
            NotificationTemplate::PayRecoveryFee => {
                "Ownership verified. Pay the recovery fee of KES {{ amount }} to see where \
                 to collect your document."
            }
            NotificationTemplate::OwnerVerified => {
                "The owner has verified the document you found. Your reward is on hold until \
                 they pay the recovery fee."
            }
            NotificationTemplate::LocationRevealed => {
                "Payment received. Collect your document at: {{ collection_point }}."
            }
            NotificationTemplate::RewardAvailable => {
                "The owner has paid for their document. Claim your reward of KES {{ amount }}."
            }
            NotificationTemplate::RewardClaimed => {
                "Your reward of KES {{ amount }} is on its way to {{ phone_number }}."
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template '{0}' not found")]
    NotFound(&'static str),

    #[error("Failed to render template: {0}")]
    RenderError(String),
}

fn init_environment() -> Environment<'static> {
    let mut env = Environment::new();
    for template in NotificationTemplate::ALL {
        if let Err(e) = env.add_template(template.name(), template.source()) {
            tracing::warn!("Failed to load template {}: {}", template.name(), e);
        }
    }
    env
}

fn get_environment() -> &'static Environment<'static> {
    TEMPLATE_ENV.get_or_init(init_environment)
}

/// Render a notification message.
///
/// # Example
/// ```ignore
/// let message = render(
///     NotificationTemplate::LocationRevealed,
///     minijinja::context! { collection_point => "Huduma Centre, GPO" },
/// )?;
/// ```
pub fn render(template: NotificationTemplate, ctx: Value) -> Result<String, TemplateError> {
    get_environment()
        .get_template(template.name())
        .map_err(|_| TemplateError::NotFound(template.name()))?
        .render(ctx)
        .map_err(|e| TemplateError::RenderError(e.to_string()))
}
