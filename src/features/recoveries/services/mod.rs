mod recovery_service;

pub use recovery_service::{RecoveryContext, RecoveryService, RecoverySide, RecoveryStatus};
