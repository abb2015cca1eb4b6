pub mod dtos;
pub mod handlers;
pub mod matcher;
pub mod models;
pub mod routes;
pub mod services;
pub mod workers;

pub use services::MatchService;
pub use workers::MatchProcessor;
