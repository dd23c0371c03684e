use actix_web::{HttpRequest, HttpResponse, Result, ResponseError, web};

use crate::error::AppError;
use crate::middlewares::current_claims;
use crate::models::*;
use crate::services::AuthService;

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "user",
    params(
        ("id" = i64, Path, description = "用戶 ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "獲取用戶資料成功", body = UserResponse),
        (status = 401, description = "未授權"),
        (status = 404, description = "用戶不存在")
    )
)]
pub async fn get_user(
    auth_service: web::Data<AuthService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();

    // 只能查看自己的资料
    let caller = current_claims(&req).and_then(|claims| claims.user_id());
    match caller {
        Ok(id) if id == user_id => {}
        Ok(_) => return Ok(AppError::AuthError("未授權".to_string()).error_response()),
        Err(e) => return Ok(e.error_response()),
    }

    match auth_service.get_user(user_id).await {
        Ok(user) => Ok(HttpResponse::Ok().json(ApiResponse::success(user))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn user_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/users").route("/{id}", web::get().to(get_user)));
}
