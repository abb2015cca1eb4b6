mod recovery_dto;

pub use recovery_dto::{
    CollectionPointDto, PaymentRequestDto, RecoverySideDto, RecoveryStatusDto,
};
