pub mod auth;
pub mod db;
pub mod emails;
pub mod notify;
pub mod routes;
pub mod routing;

use routing::RoutingEngine;

#[derive(Clone)]
pub struct AppState {
    pub db: db::DbPool,
    pub engine: RoutingEngine,
    pub base_url: String,
}
