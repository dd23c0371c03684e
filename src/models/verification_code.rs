use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{Scene, verification_code_entity as verification_codes};

/// 一条验证码记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationCode {
    pub id: i64,
    pub phone: String,
    pub code: String,
    pub scene: Scene,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl VerificationCode {
    /// 未使用且未过期
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.used && self.expires_at > now
    }
}

#[derive(Debug, Clone)]
pub struct NewVerificationCode {
    pub phone: String,
    pub code: String,
    pub scene: Scene,
    pub expires_at: DateTime<Utc>,
}

impl From<verification_codes::Model> for VerificationCode {
    fn from(m: verification_codes::Model) -> Self {
        Self {
            id: m.id,
            phone: m.phone,
            code: m.code,
            scene: m.scene,
            expires_at: m.expires_at,
            used: m.used,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SendCodeRequest {
    #[serde(default)]
    #[schema(example = "85251738110")]
    pub phone: String,
    #[serde(default)]
    #[schema(example = "register")]
    pub scene: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SendCodeResponse {
    pub expires_in: i64,
}
