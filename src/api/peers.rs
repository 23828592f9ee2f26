use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, PeersResponse};

/// Live peer connections.
#[get("/peers/")]
pub async fn get_peers(state: web::Data<AppState>) -> impl Responder {
    let peers = state.peers.peers();
    HttpResponse::Ok().json(PeersResponse {
        connected: peers.len(),
        peers,
    })
}
