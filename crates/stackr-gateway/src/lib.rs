mod routes;
mod server;
mod state;

pub use server::GatewayServer;
pub use state::AppState;
