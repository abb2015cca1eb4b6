mod notification;

pub use notification::{
    CreateNotification, Notification, NotificationFilter, NotificationKind, NotificationStatus,
};
