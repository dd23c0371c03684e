use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::database::VerificationCodeStore;
use crate::entities::Scene;
use crate::error::AppResult;
use crate::models::NewVerificationCode;
use crate::utils::generate_six_digit_code;

/// 验证码生命周期：签发 -> (核销 | 过期)
///
/// 签发时先删除同一 (phone, scene) 的旧记录；核销依赖存储层的条件更新，
/// 同一验证码并发核销时至多一次成功。
#[derive(Clone)]
pub struct VerificationCodeManager {
    store: Arc<dyn VerificationCodeStore>,
    ttl: Duration,
}

impl VerificationCodeManager {
    pub fn new(store: Arc<dyn VerificationCodeStore>, ttl_minutes: i64) -> Self {
        Self {
            store,
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn ttl_minutes(&self) -> i64 {
        self.ttl.num_minutes()
    }

    /// 生成并保存验证码，返回明文供调用方发送
    pub async fn issue(&self, phone: &str, scene: Scene) -> AppResult<String> {
        self.issue_at(phone, scene, Utc::now()).await
    }

    pub async fn issue_at(
        &self,
        phone: &str,
        scene: Scene,
        now: DateTime<Utc>,
    ) -> AppResult<String> {
        let code = generate_six_digit_code();
        let record = self
            .store
            .replace(NewVerificationCode {
                phone: phone.to_string(),
                code: code.clone(),
                scene,
                expires_at: now + self.ttl,
            })
            .await?;
        log::debug!("Verification code issued: id={} scene={scene}", record.id);
        Ok(code)
    }

    /// 核销验证码。错误码、已过期、已使用一律返回 `false`；存储故障照常返回错误
    pub async fn verify(&self, phone: &str, code: &str, scene: Scene) -> AppResult<bool> {
        self.verify_at(phone, code, scene, Utc::now()).await
    }

    pub async fn verify_at(
        &self,
        phone: &str,
        code: &str,
        scene: Scene,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }

        let Some(record) = self.store.find_active(phone, code, scene, now).await? else {
            return Ok(false);
        };

        self.store.mark_used_if_unused(record.id).await
    }

    /// 清理过期超过 `retention` 的记录
    pub async fn purge_expired(&self, retention: Duration) -> AppResult<u64> {
        self.store.purge_expired(Utc::now() - retention).await
    }
}
