mod auth;
mod context;
mod docs;
mod errors;
mod schemas;
mod serialized;
mod sse;
mod stations;

use std::{
    env, io,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::routing::get;
use lockstep_collab::Collab;
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use context::ServerContext;
pub use errors::*;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

pub type Router = axum::Router<ServerContext>;

/// Starts the lockstep server, serving until it fails
pub async fn run_server(collab: Arc<Collab>) -> io::Result<()> {
    let port = match env::var("LOCKSTEP_SERVER_PORT") {
        Ok(port) => port.parse::<u16>().map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "LOCKSTEP_SERVER_PORT must be a number")
        })?,
        Err(_) => DEFAULT_PORT,
    };

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/stations", stations::router())
        .nest("/events", sse::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(ServerContext { collab });

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, root_router).await
}
