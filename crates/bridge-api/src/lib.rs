pub mod auth;
pub mod params;
pub mod routes;
pub mod server;
pub mod state;

pub use auth::StaticApiKeyAuthoriser;
pub use server::{ApiBuilder, ApiHandle};
pub use state::AppState;
