use actix_web::{HttpRequest, HttpResponse, Result, ResponseError, web};
use serde_json::json;

use crate::middlewares::current_claims;
use crate::models::*;
use crate::services::AuthService;

#[utoipa::path(
    post,
    path = "/api/v1/auth/send-code",
    tag = "auth",
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "驗證碼已發送", body = SendCodeResponse),
        (status = 400, description = "請求參數錯誤"),
        (status = 502, description = "短信發送失敗")
    )
)]
pub async fn send_code(
    auth_service: web::Data<AuthService>,
    request: web::Json<SendCodeRequest>,
) -> Result<HttpResponse> {
    match auth_service.send_verification_code(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            response,
            "驗證碼已發送",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "註冊成功", body = UserResponse),
        (status = 400, description = "請求參數錯誤或驗證碼無效"),
        (status = 409, description = "帳號或手機號碼已被使用")
    )
)]
pub async fn register(
    auth_service: web::Data<AuthService>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    match auth_service.register(request.into_inner()).await {
        Ok(user) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(user, "註冊成功"))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "登入成功", body = LoginResponse),
        (status = 401, description = "帳號或密碼錯誤"),
        (status = 400, description = "請求參數錯誤")
    )
)]
pub async fn login(
    auth_service: web::Data<AuthService>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    match auth_service.login(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            response,
            "登入成功",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/password-recovery",
    tag = "auth",
    request_body = PasswordRecoveryRequest,
    responses(
        (status = 200, description = "密碼重置成功"),
        (status = 400, description = "請求參數錯誤或驗證碼無效"),
        (status = 404, description = "帳號不存在")
    )
)]
pub async fn password_recovery(
    auth_service: web::Data<AuthService>,
    request: web::Json<PasswordRecoveryRequest>,
) -> Result<HttpResponse> {
    match auth_service.recover_password(request.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::message("密碼重置成功"))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/change-password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "密碼修改成功"),
        (status = 400, description = "請求參數錯誤"),
        (status = 401, description = "未授權或原密碼錯誤")
    )
)]
pub async fn change_password(
    auth_service: web::Data<AuthService>,
    req: HttpRequest,
    request: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse> {
    let claims = match current_claims(&req) {
        Ok(claims) => claims,
        Err(e) => return Ok(e.error_response()),
    };

    match auth_service.change_password(&claims, request.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "密碼修改成功"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn auth_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/send-code", web::post().to(send_code))
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/password-recovery", web::post().to(password_recovery))
            .route("/change-password", web::post().to(change_password)),
    );
}
