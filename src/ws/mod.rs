pub mod handler;
pub mod protocol;
pub mod routes;

pub use handler::AppState;
pub use routes::create_router;
