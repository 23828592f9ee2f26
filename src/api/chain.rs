use actix_web::{HttpResponse, Responder, get, post, web};
use log::info;

use super::models::{AppState, CancelResponse, ChainResponse, MineRequest};
use crate::miner::MiningOutcome;

/// Get the full blockchain.
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    let bc = state.blockchain.lock().expect("mutex poisoned");
    HttpResponse::Ok().json(ChainResponse {
        length: bc.len(),
        chain: &bc.chain,
    })
}

/// Mine a block carrying `data` on top of the current tip.
/// The search runs on the blocking pool; the chain lock is not held meanwhile.
#[post("/mine/")]
pub async fn mine_block(state: web::Data<AppState>, req: web::Json<MineRequest>) -> impl Responder {
    let data = req.into_inner().data;
    match state.miner.mine_next(state.blockchain.clone(), data).await {
        MiningOutcome::Mined(block) => {
            info!("API - mined {block}");
            HttpResponse::Ok().json(block)
        }
        MiningOutcome::Stale(_) => HttpResponse::Conflict().body("tip moved while mining"),
        MiningOutcome::Cancelled => HttpResponse::Conflict().body("mining cancelled"),
    }
}

/// Cancel every mining round in flight. Later rounds are unaffected.
#[post("/mine/cancel/")]
pub async fn cancel_mining(state: web::Data<AppState>) -> impl Responder {
    let cancelled = state.miner.cancel();
    info!("API - cancelled {cancelled} mining round(s)");
    HttpResponse::Ok().json(CancelResponse { cancelled })
}
