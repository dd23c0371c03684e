use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub sms: SmsConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    pub partner: PartnerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in: i64, // seconds
}

/// Twilio 短信配置；account_sid 为空时使用日志模拟发送
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SmsConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    pub ttl_minutes: i64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self { ttl_minutes: 10 }
    }
}

/// 资产管理平台 (合作方) 接口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerConfig {
    pub base_url: String,
    pub app_key: String,
    pub app_secret: String,
    /// 合作方 SM2 公钥，128 或 130 位十六进制
    pub public_key: String,
    #[serde(default)]
    pub private_key: Option<String>,
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                toml::from_str(&config_str).map_err(|e| format!("解析配置文件失败: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                // 数据库 URL 在无配置文件时必须提供
                let database_url = get_env("DATABASE_URL")
                    .ok_or("缺少 DATABASE_URL 环境变量，且未找到配置文件 config.toml")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                        expires_in: get_env_parse("JWT_EXPIRES_IN", 2_592_000i64),
                    },
                    sms: SmsConfig {
                        account_sid: get_env("TWILIO_ACCOUNT_SID").unwrap_or_default(),
                        auth_token: get_env("TWILIO_AUTH_TOKEN").unwrap_or_default(),
                        from_phone: get_env("TWILIO_FROM_PHONE").unwrap_or_default(),
                    },
                    verification: VerificationConfig {
                        ttl_minutes: get_env_parse("VERIFICATION_TTL_MINUTES", 10i64),
                    },
                    partner: PartnerConfig {
                        base_url: get_env("PARTNER_BASE_URL")
                            .unwrap_or_else(|| "http://localhost:9999/asset/api".to_string()),
                        app_key: get_env("PARTNER_APP_KEY").unwrap_or_default(),
                        app_secret: get_env("PARTNER_APP_SECRET").unwrap_or_default(),
                        public_key: get_env("PARTNER_PUBLIC_KEY").unwrap_or_default(),
                        private_key: get_env("PARTNER_PRIVATE_KEY"),
                    },
                }
            }
            Err(e) => {
                return Err(format!("无法读取配置文件 {config_path}: {e}").into());
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            config.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            config.jwt.expires_in = n;
        }
        if let Ok(v) = env::var("TWILIO_ACCOUNT_SID") {
            config.sms.account_sid = v;
        }
        if let Ok(v) = env::var("TWILIO_AUTH_TOKEN") {
            config.sms.auth_token = v;
        }
        if let Ok(v) = env::var("TWILIO_FROM_PHONE") {
            config.sms.from_phone = v;
        }
        if let Ok(v) = env::var("VERIFICATION_TTL_MINUTES")
            && let Ok(n) = v.parse()
        {
            config.verification.ttl_minutes = n;
        }

        // 合作方
        if let Ok(v) = env::var("PARTNER_BASE_URL") {
            config.partner.base_url = v;
        }
        if let Ok(v) = env::var("PARTNER_APP_KEY") {
            config.partner.app_key = v;
        }
        if let Ok(v) = env::var("PARTNER_APP_SECRET") {
            config.partner.app_secret = v;
        }
        if let Ok(v) = env::var("PARTNER_PUBLIC_KEY") {
            config.partner.public_key = v;
        }
        if let Ok(v) = env::var("PARTNER_PRIVATE_KEY") {
            config.partner.private_key = Some(v);
        }

        Ok(config)
    }
}
