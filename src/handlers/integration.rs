use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::http::header::CONTENT_DISPOSITION;
use actix_web::{HttpResponse, Result, ResponseError, web};
use futures_util::TryStreamExt;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::{IntegrationService, MAX_UPLOAD_BYTES};

fn partner_response(reply: PartnerReply) -> HttpResponse {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
    HttpResponse::build(status).json(reply.body)
}

#[utoipa::path(
    get,
    path = "/api/v1/integration/banners",
    tag = "integration",
    params(BannerQuery),
    responses(
        (status = 200, description = "合作方返回的 banner 列表", body = PartnerEnvelope),
        (status = 500, description = "合作方未配置"),
        (status = 502, description = "合作方接口不可用")
    )
)]
pub async fn get_banner_list(
    integration_service: web::Data<IntegrationService>,
    query: web::Query<BannerQuery>,
) -> Result<HttpResponse> {
    match integration_service.get_banner_list(query.into_inner()).await {
        Ok(reply) => Ok(partner_response(reply)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/integration/sync-application",
    tag = "integration",
    request_body = SyncApplicationRequest,
    responses(
        (status = 200, description = "同步成功", body = PartnerEnvelope),
        (status = 400, description = "缺少必填字段")
    )
)]
pub async fn sync_application(
    integration_service: web::Data<IntegrationService>,
    request: web::Json<SyncApplicationRequest>,
) -> Result<HttpResponse> {
    match integration_service.sync_application(request.into_inner()).await {
        Ok(reply) => Ok(partner_response(reply)),
        Err(e) => Ok(e.error_response()),
    }
}

/// 读取 multipart 表单中的 `file` 与 `useType` 字段
async fn read_upload_form(
    mut payload: Multipart,
) -> AppResult<(Option<UploadedFile>, Option<String>)> {
    let mut file = None;
    let mut use_type = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::ValidationError(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let content_type = field.content_type().map(|m| m.to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| AppError::ValidationError(format!("Invalid multipart body: {e}")))?
        {
            if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(AppError::ValidationError(
                    "File too large, maximum size is 50MB".to_string(),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "file" => {
                file = Some(UploadedFile {
                    file_name: file_name.unwrap_or_else(|| "upload".to_string()),
                    content_type,
                    bytes,
                });
            }
            "useType" => {
                use_type = Some(String::from_utf8_lossy(&bytes).trim().to_string());
            }
            _ => {}
        }
    }

    Ok((file, use_type))
}

#[utoipa::path(
    post,
    path = "/api/v1/integration/upload/file",
    tag = "integration",
    request_body(content = UploadFileForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "上傳成功", body = PartnerEnvelope),
        (status = 400, description = "缺少文件、useType 無效或文件超過 50MB")
    )
)]
pub async fn upload_file(
    integration_service: web::Data<IntegrationService>,
    payload: Multipart,
) -> Result<HttpResponse> {
    let (file, use_type) = match read_upload_form(payload).await {
        Ok(form) => form,
        Err(e) => return Ok(e.error_response()),
    };

    match integration_service.upload_file(file, use_type).await {
        Ok(reply) => Ok(partner_response(reply)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/integration/down/file",
    tag = "integration",
    params(DownFileQuery),
    responses(
        (status = 200, description = "文件內容", content_type = "application/octet-stream"),
        (status = 400, description = "缺少 id")
    )
)]
pub async fn download_file(
    integration_service: web::Data<IntegrationService>,
    query: web::Query<DownFileQuery>,
) -> Result<HttpResponse> {
    match integration_service.download_file(query.into_inner()).await {
        Ok(DownloadOutcome::File(file)) => {
            let mut builder = HttpResponse::Ok();
            builder.content_type(file.content_type);
            if let Some(disposition) = file.content_disposition {
                builder.insert_header((CONTENT_DISPOSITION, disposition));
            }
            Ok(builder.body(file.bytes))
        }
        Ok(DownloadOutcome::Rejected { status, error }) => {
            let status_code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            Ok(HttpResponse::build(status_code).json(json!({
                "code": status,
                "message": "Failed to download file from external API",
                "error": error
            })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

pub fn integration_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/integration")
            .route("/banners", web::get().to(get_banner_list))
            .route("/sync-application", web::post().to(sync_application))
            .route("/upload/file", web::post().to(upload_file))
            .route("/down/file", web::get().to(download_file)),
    );
}
