// HTTP API: OAuth connect flows and connection management

pub mod connections;
pub mod oauth;

pub use connections::{create_connections_router, ConnectionsAppState};
pub use oauth::{
    create_oauth_router, run_pending_cleanup, OAuthAppState, PendingSecrets, Platform,
};
