pub mod auth;
pub mod channels;
pub mod error;
pub mod middleware;
pub mod username;
