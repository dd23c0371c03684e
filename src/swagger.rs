use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::Scene;
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::send_code,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::password_recovery,
        handlers::auth::change_password,
        handlers::user::get_user,
        handlers::integration::get_banner_list,
        handlers::integration::sync_application,
        handlers::integration::upload_file,
        handlers::integration::download_file,
        handlers::sm2::self_test,
        handlers::health::health,
    ),
    components(
        schemas(
            Scene,
            SendCodeRequest,
            SendCodeResponse,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            PasswordRecoveryRequest,
            ChangePasswordRequest,
            UserResponse,
            PartnerEnvelope,
            SyncApplicationRequest,
            UploadFileForm,
            UseType,
            Sm2SelfTestResponse,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and password API"),
        (name = "user", description = "User profile API"),
        (name = "integration", description = "Asset management platform integration API"),
        (name = "sm2", description = "SM2 codec diagnostics"),
        (name = "health", description = "Service health"),
    ),
    info(
        title = "Loan Portal Backend API",
        version = "1.0.0",
        description = "Loan portal backend REST API documentation"
    ),
    servers(
        (url = "/", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
