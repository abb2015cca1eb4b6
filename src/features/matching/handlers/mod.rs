pub mod match_handler;

pub use match_handler::*;
