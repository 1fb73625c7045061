pub mod auth;
pub mod cookies;
pub mod error;
pub mod middleware;
pub mod profile;
pub mod routes;
pub mod todos;
pub mod tokens;
