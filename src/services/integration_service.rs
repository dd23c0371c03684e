use crate::error::{AppError, AppResult};
use crate::external::PartnerClient;
use crate::models::*;

/// 单个上传文件上限 50 MiB
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

const DEFAULT_BANNER_PAGE: u32 = 1;
const DEFAULT_BANNER_SIZE: u32 = 100;

/// 合作方接口的参数校验与转发
#[derive(Clone)]
pub struct IntegrationService {
    partner: PartnerClient,
}

impl IntegrationService {
    pub fn new(partner: PartnerClient) -> Self {
        Self { partner }
    }

    pub async fn get_banner_list(&self, query: BannerQuery) -> AppResult<PartnerReply> {
        let current = query.current.filter(|c| *c > 0).unwrap_or(DEFAULT_BANNER_PAGE);
        let size = query.size.filter(|s| *s > 0).unwrap_or(DEFAULT_BANNER_SIZE);
        self.partner.get_banner_list(current, size).await
    }

    pub async fn sync_application(
        &self,
        request: SyncApplicationRequest,
    ) -> AppResult<PartnerReply> {
        if request.app_key.is_empty()
            || request.app_secret.is_empty()
            || request.encrypt_data.is_empty()
        {
            return Err(AppError::ValidationError(
                "Missing required fields: appKey, appSecret, and encryptData are required"
                    .to_string(),
            ));
        }
        self.partner.sync_application(&request).await
    }

    pub async fn upload_file(
        &self,
        file: Option<UploadedFile>,
        use_type: Option<String>,
    ) -> AppResult<PartnerReply> {
        let file = file.ok_or_else(|| {
            AppError::ValidationError("Missing required field: file is required".to_string())
        })?;
        let use_type = use_type.filter(|u| !u.trim().is_empty()).ok_or_else(|| {
            AppError::ValidationError("Missing required field: useType is required".to_string())
        })?;
        let use_type: UseType = use_type.parse().map_err(|_| {
            AppError::ValidationError(format!(
                "Invalid useType. Must be one of: 20, 21, 22 ({})",
                "20: customer photo, 21: monthly statement, 22: other attachments"
            ))
        })?;
        if file.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::ValidationError(
                "File too large, maximum size is 50MB".to_string(),
            ));
        }
        self.partner.upload_file(file, use_type).await
    }

    pub async fn download_file(&self, query: DownFileQuery) -> AppResult<DownloadOutcome> {
        let id = query.id.filter(|id| !id.trim().is_empty()).ok_or_else(|| {
            AppError::ValidationError("Missing required parameter: id is required".to_string())
        })?;
        self.partner.download_file(id.trim()).await
    }
}
