use actix_web::{HttpResponse, Result, web};
use chrono::Utc;
use serde_json::json;

use crate::database::{DbPool, ping};

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "服務正常"),
        (status = 503, description = "數據庫不可用")
    )
)]
pub async fn health(pool: web::Data<DbPool>) -> Result<HttpResponse> {
    let timestamp = Utc::now().to_rfc3339();
    if ping(&pool).await {
        Ok(HttpResponse::Ok().json(json!({
            "status": "ok",
            "database": "connected",
            "timestamp": timestamp
        })))
    } else {
        Ok(HttpResponse::ServiceUnavailable().json(json!({
            "status": "error",
            "database": "disconnected",
            "timestamp": timestamp
        })))
    }
}

pub fn health_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health));
}
