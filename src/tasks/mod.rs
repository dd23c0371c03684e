//! Background scheduled tasks for the application.
//!
//! Verification codes are filtered by expiry on every lookup, so the purge below is
//! housekeeping only. Call `spawn_all` once during startup.

use chrono::Duration;

use crate::services::VerificationCodeManager;

/// 过期验证码保留时长
const CODE_RETENTION_DAYS: i64 = 1;
const PURGE_INTERVAL_SECS: u64 = 3600;

/// Spawn all background tasks. Detaches via `tokio::spawn`; does not block.
pub fn spawn_all(codes: VerificationCodeManager) {
    // 过期验证码清理（每小时）
    tokio::spawn(async move {
        loop {
            match codes.purge_expired(Duration::days(CODE_RETENTION_DAYS)).await {
                Ok(n) if n > 0 => log::info!("Expired verification codes purged: {n}"),
                Ok(_) => {}
                Err(e) => log::error!("Failed to purge verification codes: {e:?}"),
            }
            tokio::time::sleep(std::time::Duration::from_secs(PURGE_INTERVAL_SECS)).await;
        }
    });
}
