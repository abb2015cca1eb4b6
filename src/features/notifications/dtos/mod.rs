mod notification_dto;

pub use notification_dto::{
    MarkAllReadResponseDto, NotificationListQuery, NotificationResponseDto, UnreadCountDto,
    UnreadSnapshotDto,
};
