use actix_web::{App, HttpServer, middleware::Logger, web};
use env_logger::{Env, Target};
use chrono::Local;
use std::io::Write;
use std::sync::Arc;

use loan_portal_backend::{
    AppError,
    config::Config,
    database::{SeaOrmCodeStore, create_pool, run_migrations},
    external::{PartnerClient, build_sms_sender},
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    tasks,
    utils::{JwtService, Sm2Codec},
};

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    log::error!("{context}: {err}");
    std::io::Error::other(format!("{context}: {err}"))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().map_err(|e| startup_error("Failed to load configuration", e))?;

    // 创建数据库连接池
    let pool = create_pool(&config.database)
        .await
        .map(Arc::new)
        .map_err(|e| startup_error("Failed to create database connection pool", e))?;

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .map_err(|e| startup_error("Failed to run database migrations", e))?;

    let jwt_service = JwtService::new(&config.jwt.secret, config.jwt.expires_in);
    let codec = Arc::new(Sm2Codec::new());

    // 外部服务
    let sms_sender = build_sms_sender(&config.sms);
    let partner_client = PartnerClient::new(config.partner.clone(), codec.clone());
    if config.partner.public_key.is_empty() {
        log::warn!("PARTNER_PUBLIC_KEY not configured, integration endpoints will fail");
    }
    partner_client
        .check_key_pair()
        .map_err(|e| startup_error("Invalid partner key material", e))?;

    // 服务
    let codes = VerificationCodeManager::new(
        Arc::new(SeaOrmCodeStore::new(pool.clone())),
        config.verification.ttl_minutes,
    );
    let auth_service = web::Data::new(AuthService::new(
        pool.clone(),
        jwt_service.clone(),
        codes.clone(),
        sms_sender,
    ));
    let integration_service = web::Data::new(IntegrationService::new(partner_client));

    // 后台任务
    tasks::spawn_all(codes);

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let pool_data = web::Data::from(pool);
    let codec_data = web::Data::from(codec);
    HttpServer::new(move || {
        App::new()
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .wrap(create_cors())
            .wrap(Logger::default())
            .app_data(pool_data.clone())
            .app_data(auth_service.clone())
            .app_data(integration_service.clone())
            .app_data(codec_data.clone())
            .app_data(web::JsonConfig::default().error_handler(|err, _| {
                AppError::ValidationError(format!("Invalid JSON body: {err}")).into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _| {
                AppError::ValidationError(format!("Invalid query: {err}")).into()
            }))
            .configure(swagger_config)
            .configure(handlers::health_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::auth_config)
                    .configure(handlers::user_config)
                    .configure(handlers::integration_config)
                    .configure(handlers::sm2_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
