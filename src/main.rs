use std::io;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::info;

use pow_gossip_node::api::{self, AppState};
use pow_gossip_node::blockchain::Blockchain;
use pow_gossip_node::config::NodeConfig;
use pow_gossip_node::p2p::{P2pServer, ReportChains, VerifyingHandler};

#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config =
        NodeConfig::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    info!(
        "⛓️ difficulty={} mine_rate={}ms peers={:?}",
        config.pow.difficulty, config.pow.mine_rate_ms, config.p2p.peers
    );

    let chain = Blockchain::shared(config.pow);

    let verifier = VerifyingHandler::new(&config.pow, ReportChains::new(chain.clone()));
    let p2p = Arc::new(
        P2pServer::new(config.p2p.clone(), chain.clone()).with_handler(Arc::new(verifier)),
    );
    p2p.clone().start().await.map_err(io::Error::other)?;

    let state = web::Data::new(AppState::new(chain, p2p.registry()));

    info!(
        "Starting node API at http://{}:{}",
        config.host, config.http_port
    );
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((config.host.as_str(), config.http_port))?
    .run()
    .await
}
