pub mod handlers;
pub mod logging;
pub mod server;
pub mod state;

pub use server::{configure_routes, run_server, ServerSettings};
pub use state::AppState;
