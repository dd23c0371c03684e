use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_DISPOSITION, CONTENT_TYPE, HeaderName};
use reqwest::{Client, Response, multipart};
use serde_json::json;

use crate::config::PartnerConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    DownloadOutcome, DownloadedFile, PartnerEnvelope, PartnerReply, SyncApplicationRequest,
    UploadedFile, UseType,
};
use crate::utils::Sm2Codec;

/// 资产管理平台 API 客户端
///
/// 查询类接口的业务参数以 SM2 (C1C2C3) 加密后放入 `encryptData`，
/// 与 `appKey`/`appSecret` 一起发送。
#[derive(Clone)]
pub struct PartnerClient {
    client: Client,
    config: PartnerConfig,
    codec: Arc<Sm2Codec>,
}

impl PartnerClient {
    pub fn new(config: PartnerConfig, codec: Arc<Sm2Codec>) -> Self {
        Self {
            client: Client::new(),
            config,
            codec,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/integration/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn credentials(&self) -> AppResult<(&str, &str)> {
        if self.config.app_key.is_empty() || self.config.app_secret.is_empty() {
            return Err(AppError::ConfigError(
                "partner app_key/app_secret not configured".to_string(),
            ));
        }
        Ok((&self.config.app_key, &self.config.app_secret))
    }

    /// 用合作方公钥加密业务参数；输出已含 C1 的 04 前缀，可直接作为 `encryptData`
    pub fn encrypt_payload(&self, plaintext: &str) -> AppResult<String> {
        if self.config.public_key.is_empty() {
            return Err(AppError::ConfigError(
                "partner public key not configured".to_string(),
            ));
        }
        Ok(self.codec.encrypt(plaintext, &self.config.public_key)?)
    }

    /// 启动时校验密钥配置：公钥格式必须有效；配置了私钥时须与公钥成对
    pub fn check_key_pair(&self) -> AppResult<()> {
        if self.config.public_key.is_empty() {
            return Ok(());
        }
        let configured = crate::utils::normalize_public_key(&self.config.public_key)
            .map_err(|e| AppError::ConfigError(format!("invalid partner public key: {e}")))?;

        let Some(private_key) = self.config.private_key.as_deref().filter(|k| !k.is_empty()) else {
            return Ok(());
        };
        let derived = self
            .codec
            .derive_public_key(private_key)
            .map_err(|e| AppError::ConfigError(format!("invalid partner private key: {e}")))?;
        if derived != configured {
            return Err(AppError::ConfigError(
                "partner private key does not match public key".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn get_banner_list(&self, current: u32, size: u32) -> AppResult<PartnerReply> {
        let (app_key, app_secret) = self.credentials()?;
        let payload = json!({
            "current": current.to_string(),
            "size": size.to_string(),
        })
        .to_string();
        let encrypt_data = self.encrypt_payload(&payload)?;

        log::info!(
            "[Partner] getBannerList current={current} size={size} encrypted_len={}",
            encrypt_data.len()
        );

        let response = self
            .client
            .get(self.endpoint("getBannerList"))
            .header(ACCEPT, "application/json")
            .query(&[
                ("appKey", app_key),
                ("appSecret", app_secret),
                ("encryptData", encrypt_data.as_str()),
            ])
            .send()
            .await?;

        Self::read_envelope(response).await
    }

    pub async fn sync_application(
        &self,
        request: &SyncApplicationRequest,
    ) -> AppResult<PartnerReply> {
        log::info!("[Partner] syncApplication appKey={}", request.app_key);

        let response = self
            .client
            .post(self.endpoint("syncApplication"))
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        Self::read_envelope(response).await
    }

    pub async fn upload_file(
        &self,
        file: UploadedFile,
        use_type: UseType,
    ) -> AppResult<PartnerReply> {
        let (app_key, app_secret) = self.credentials()?;

        log::info!(
            "[Partner] upload/file name={} size={} useType={}",
            file.file_name,
            file.bytes.len(),
            use_type.code()
        );

        let content_type = file
            .content_type
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let part = multipart::Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&content_type)
            .map_err(|_| {
                AppError::ValidationError(format!("Invalid content type: {content_type}"))
            })?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("useType", use_type.code())
            .text("appKey", app_key.to_string())
            .text("appSecret", app_secret.to_string());

        let response = self
            .client
            .post(self.endpoint("upload/file"))
            .multipart(form)
            .send()
            .await?;

        Self::read_envelope(response).await
    }

    pub async fn download_file(&self, id: &str) -> AppResult<DownloadOutcome> {
        let (app_key, app_secret) = self.credentials()?;
        let encrypt_data = self.encrypt_payload(id)?;

        log::info!("[Partner] down/file id={id}");

        let response = self
            .client
            .get(self.endpoint("down/file"))
            .header(ACCEPT, "*/*")
            .query(&[
                ("appKey", app_key),
                ("appSecret", app_secret),
                ("encryptData", encrypt_data.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            log::warn!("[Partner] down/file rejected: status={status} body={error}");
            return Ok(DownloadOutcome::Rejected {
                status: status.as_u16(),
                error,
            });
        }

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type =
            header(CONTENT_TYPE).unwrap_or_else(|| "application/octet-stream".to_string());
        let content_disposition = header(CONTENT_DISPOSITION);
        let bytes = response.bytes().await?.to_vec();

        Ok(DownloadOutcome::File(DownloadedFile {
            content_type,
            content_disposition,
            bytes,
        }))
    }

    async fn read_envelope(response: Response) -> AppResult<PartnerReply> {
        let status = response.status();
        let text = response.text().await?;
        let parsed = serde_json::from_str::<PartnerEnvelope>(&text);

        log::info!("[Partner] response status={status}");

        if status.is_success() {
            let body = parsed.map_err(|e| {
                AppError::ExternalApiError(format!("Invalid partner response: {e}"))
            })?;
            Ok(PartnerReply {
                status: status.as_u16(),
                body,
            })
        } else {
            Ok(PartnerReply {
                status: status.as_u16(),
                body: PartnerEnvelope::from_failure(status.as_u16(), parsed.ok()),
            })
        }
    }
}
