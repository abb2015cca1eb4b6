mod match_dto;

pub use match_dto::{MatchLinkDto, MatchRunResponseDto, MyMatchDto};
