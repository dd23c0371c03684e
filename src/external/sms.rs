use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::SmsConfig;
use crate::error::{AppError, AppResult};

/// 短信发送端口；失败统一返回 `AppError::DeliveryError`
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_verification_code(&self, phone: &str, code: &str, ttl_minutes: i64)
    -> AppResult<()>;
}

#[derive(Debug, Deserialize)]
pub struct SendSmsResponse {
    pub sid: Option<String>,
    pub status: Option<String>,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
}

#[derive(Clone)]
pub struct TwilioService {
    client: Client,
    config: SmsConfig,
}

impl TwilioService {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn message_body(code: &str, ttl_minutes: i64) -> String {
        format!("您的驗證碼為 {code}，{ttl_minutes} 分鐘內有效，請勿洩露給他人。")
    }
}

#[async_trait]
impl SmsSender for TwilioService {
    async fn send_verification_code(
        &self,
        phone: &str,
        code: &str,
        ttl_minutes: i64,
    ) -> AppResult<()> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.config.account_sid
        );

        let body = Self::message_body(code, ttl_minutes);
        let params = [
            ("To", phone),
            ("From", self.config.from_phone.as_str()),
            ("Body", body.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::DeliveryError(format!("SMS request failed: {e}")))?;

        if response.status().is_success() {
            let sent: Option<SendSmsResponse> = response.json().await.ok();
            log::info!(
                "Verification code SMS sent: {phone}, sid={}",
                sent.and_then(|s| s.sid).unwrap_or_default()
            );
            Ok(())
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            log::error!(
                "Verification code SMS failed to send: {phone}, status={status}, error={error_text}"
            );
            Err(AppError::DeliveryError(format!(
                "SMS sending failed with status {status}"
            )))
        }
    }
}

/// 未配置短信网关时使用：仅写日志
#[derive(Clone, Default)]
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send_verification_code(
        &self,
        phone: &str,
        code: &str,
        ttl_minutes: i64,
    ) -> AppResult<()> {
        log::warn!("[MOCK SMS] Verification code for {phone}: {code} (valid {ttl_minutes} min)");
        Ok(())
    }
}

/// 根据配置选择发送实现
pub fn build_sms_sender(config: &SmsConfig) -> std::sync::Arc<dyn SmsSender> {
    if config.account_sid.is_empty() {
        log::warn!("TWILIO_ACCOUNT_SID not configured, SMS will only be logged");
        std::sync::Arc::new(LogSmsSender)
    } else {
        std::sync::Arc::new(TwilioService::new(config.clone()))
    }
}
