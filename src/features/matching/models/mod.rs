mod match_link;

pub use match_link::{CreateMatchLink, LinkInsert, MatchLink, MatchLinkStatus, SetupStep};
