pub mod auto_search;
pub mod handlers;
pub mod middleware;
pub mod query_tools;
pub mod routes;

pub use routes::create_router;
