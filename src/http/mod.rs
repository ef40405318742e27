//! HTTP surface: router, handlers and result pages

pub mod pages;
pub mod routes;

pub use routes::build_router;
