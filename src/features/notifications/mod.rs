pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod templates;

pub use services::{NotificationOptions, NotificationService};
pub use templates::NotificationTemplate;
