use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// 合作方统一返回结构 `{code, message, data}`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PartnerEnvelope {
    #[schema(value_type = Object)]
    pub code: serde_json::Value,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Option<serde_json::Value>,
}

impl PartnerEnvelope {
    /// 非 2xx 响应统一改写为 `{code: status, message, data}`
    pub fn from_failure(status: u16, upstream: Option<PartnerEnvelope>) -> Self {
        let (message, data) = match upstream {
            Some(env) => (env.message, env.data),
            None => (None, None),
        };
        Self {
            code: serde_json::Value::from(status),
            message: Some(message.unwrap_or_else(|| "External API error".to_string())),
            data: Some(data.unwrap_or(serde_json::Value::Null)),
        }
    }
}

/// 合作方响应：状态码与返回体原样转交给前端
#[derive(Debug, Clone)]
pub struct PartnerReply {
    pub status: u16,
    pub body: PartnerEnvelope,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BannerQuery {
    /// 页码，默认 1
    pub current: Option<u32>,
    /// 每页条数，默认 100
    pub size: Option<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct SyncApplicationRequest {
    #[serde(default, rename = "appKey")]
    pub app_key: String,
    #[serde(default, rename = "appSecret")]
    pub app_secret: String,
    #[serde(default, rename = "encryptData")]
    pub encrypt_data: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownFileQuery {
    /// banner id (getBannerList 返回)
    pub id: Option<String>,
}

/// 上传文件用途
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum UseType {
    /// 20: 客户照片
    CustomerPhoto,
    /// 21: 月结单
    MonthlyStatement,
    /// 22: 其它附件
    OtherAttachment,
}

impl UseType {
    pub fn code(&self) -> &'static str {
        match self {
            UseType::CustomerPhoto => "20",
            UseType::MonthlyStatement => "21",
            UseType::OtherAttachment => "22",
        }
    }
}

impl std::str::FromStr for UseType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "20" => Ok(UseType::CustomerPhoto),
            "21" => Ok(UseType::MonthlyStatement),
            "22" => Ok(UseType::OtherAttachment),
            _ => Err(()),
        }
    }
}

/// 上传接口的 multipart 表单，仅用于文档
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// 20 客戶照片 / 21 月結單 / 22 其他附件
    pub use_type: String,
}

/// 待转发的上传文件
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// 合作方下载接口返回的文件
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub content_type: String,
    pub content_disposition: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum DownloadOutcome {
    File(DownloadedFile),
    Rejected { status: u16, error: String },
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Sm2SelfTestQuery {
    /// 待加密明文
    pub data: Option<String>,
    #[serde(alias = "publicKey")]
    pub public_key: Option<String>,
    #[serde(alias = "privateKey")]
    pub private_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Sm2SelfTestResponse {
    pub original: String,
    pub encrypted: String,
    pub decrypted: String,
    #[serde(rename = "match")]
    pub matched: bool,
    pub message: String,
    pub test_mode: String,
}
