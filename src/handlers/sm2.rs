use actix_web::{HttpResponse, Result, ResponseError, web};

use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::Sm2Codec;

const SAMPLE_PLAINTEXT: &str = "17601600216";

/// 加密后立即解密并比对。三个参数都提供时使用自定义模式；都不提供时用新生成的密钥对与示例明文
pub fn run_self_test(codec: &Sm2Codec, query: Sm2SelfTestQuery) -> AppResult<Sm2SelfTestResponse> {
    let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
    let (data, public_key, private_key) = (
        non_empty(query.data),
        non_empty(query.public_key),
        non_empty(query.private_key),
    );

    let (original, public_key, private_key, test_mode) = match (data, public_key, private_key) {
        (None, None, None) => {
            let pair = codec.generate_key_pair()?;
            (SAMPLE_PLAINTEXT.to_string(), pair.public_key, pair.private_key, "default")
        }
        (Some(data), Some(public_key), Some(private_key)) => {
            (data, public_key, private_key, "custom")
        }
        (None, _, _) => {
            return Err(AppError::ValidationError("Missing required parameter: data".into()));
        }
        (_, None, _) => {
            return Err(AppError::ValidationError("Missing required parameter: public_key".into()));
        }
        (_, _, None) => {
            return Err(AppError::ValidationError(
                "Missing required parameter: private_key (required for decryption test)".into(),
            ));
        }
    };

    let encrypted = codec.encrypt(&original, &public_key)?;
    let decrypted = codec.decrypt(&encrypted, &private_key)?;
    let matched = decrypted == original;

    Ok(Sm2SelfTestResponse {
        message: if matched {
            "Test passed: Encryption/Decryption successful".to_string()
        } else {
            "Test failed: Decrypted data does not match original".to_string()
        },
        original,
        encrypted,
        decrypted,
        matched,
        test_mode: test_mode.to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/sm2/self-test",
    tag = "sm2",
    params(Sm2SelfTestQuery),
    responses(
        (status = 200, description = "加解密自檢結果", body = Sm2SelfTestResponse),
        (status = 400, description = "參數不完整或密鑰格式錯誤"),
        (status = 422, description = "私鑰與公鑰不匹配")
    )
)]
pub async fn self_test(
    codec: web::Data<Sm2Codec>,
    query: web::Query<Sm2SelfTestQuery>,
) -> Result<HttpResponse> {
    match run_self_test(&codec, query.into_inner()) {
        Ok(report) => Ok(HttpResponse::Ok().json(ApiResponse::success(report))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn sm2_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/sm2").route("/self-test", web::get().to(self_test)));
}
