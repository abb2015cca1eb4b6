/// Default page size for pagination
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size allowed
pub const MAX_PAGE_SIZE: i64 = 100;

/// Recovery fee charged to the owner when the lost report carries none
pub const DEFAULT_RECOVERY_FEE: i64 = 200;

/// Reward paid to the finder when the found report carries none
pub const DEFAULT_REWARD_AMOUNT: i64 = 100;

/// Maximum documents attached to a single report
pub const MAX_DOCUMENTS_PER_REPORT: u64 = 10;

/// Maximum document photo upload size
pub const MAX_PHOTO_SIZE: usize = 5 * 1024 * 1024;

// =============================================================================
// ROLE CONSTANTS
// =============================================================================

/// Global admin
pub const ROLE_SUPER_ADMIN: &str = "super_admin";

/// Platform operator - can trigger matcher runs and repair stuck matches
pub const ROLE_ADMIN: &str = "admin";

// =============================================================================
// CACHE KEYS
// =============================================================================

pub const CACHE_KEY_REPORT_STATS: &str = "stats:reports";

pub fn cache_key_user_reports(user_id: &str) -> String {
    format!("reports:user:{}", user_id)
}

/// Every user's report listing
pub const CACHE_PATTERN_USER_REPORTS: &str = "reports:user:*";

pub fn cache_key_unread_count(user_id: &str) -> String {
    format!("notifications:unread:{}", user_id)
}
