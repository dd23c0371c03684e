use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tokio::sync::Mutex;

use crate::entities::{Scene, verification_code_entity as verification_codes};
use crate::error::AppResult;
use crate::models::{NewVerificationCode, VerificationCode};

/// 验证码存储
///
/// 同一 (phone, scene) 至多保留一条有效记录；`mark_used_if_unused` 必须是原子的，
/// 并发核销同一条记录时只有一方返回 `true`。
#[async_trait]
pub trait VerificationCodeStore: Send + Sync {
    /// 删除该手机号与场景下的旧记录并写入新记录
    async fn replace(&self, new_code: NewVerificationCode) -> AppResult<VerificationCode>;

    /// 查找匹配且未使用、未过期的记录
    async fn find_active(
        &self,
        phone: &str,
        code: &str,
        scene: Scene,
        now: DateTime<Utc>,
    ) -> AppResult<Option<VerificationCode>>;

    /// 条件更新 used=false -> true，返回本次调用是否完成了核销
    async fn mark_used_if_unused(&self, id: i64) -> AppResult<bool>;

    /// 删除在 `before` 之前过期的记录，返回删除条数
    async fn purge_expired(&self, before: DateTime<Utc>) -> AppResult<u64>;
}

pub struct SeaOrmCodeStore {
    pool: Arc<DatabaseConnection>,
}

impl SeaOrmCodeStore {
    pub fn new(pool: Arc<DatabaseConnection>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VerificationCodeStore for SeaOrmCodeStore {
    async fn replace(&self, new_code: NewVerificationCode) -> AppResult<VerificationCode> {
        let txn = self.pool.begin().await?;

        verification_codes::Entity::delete_many()
            .filter(verification_codes::Column::Phone.eq(new_code.phone.as_str()))
            .filter(verification_codes::Column::Scene.eq(new_code.scene))
            .exec(&txn)
            .await?;

        let model = verification_codes::ActiveModel {
            phone: Set(new_code.phone),
            code: Set(new_code.code),
            scene: Set(new_code.scene),
            expires_at: Set(new_code.expires_at),
            used: Set(false),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(model.into())
    }

    async fn find_active(
        &self,
        phone: &str,
        code: &str,
        scene: Scene,
        now: DateTime<Utc>,
    ) -> AppResult<Option<VerificationCode>> {
        let model = verification_codes::Entity::find()
            .filter(verification_codes::Column::Phone.eq(phone))
            .filter(verification_codes::Column::Code.eq(code))
            .filter(verification_codes::Column::Scene.eq(scene))
            .filter(verification_codes::Column::Used.eq(false))
            .filter(verification_codes::Column::ExpiresAt.gt(now))
            .order_by_desc(verification_codes::Column::Id)
            .one(self.pool.as_ref())
            .await?;
        Ok(model.map(Into::into))
    }

    async fn mark_used_if_unused(&self, id: i64) -> AppResult<bool> {
        let result = verification_codes::Entity::update_many()
            .col_expr(verification_codes::Column::Used, Expr::value(true))
            .filter(verification_codes::Column::Id.eq(id))
            .filter(verification_codes::Column::Used.eq(false))
            .exec(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn purge_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = verification_codes::Entity::delete_many()
            .filter(verification_codes::Column::ExpiresAt.lt(before))
            .exec(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected)
    }
}

/// 进程内存储，用于测试与无数据库的本地调试
#[derive(Default)]
pub struct InMemoryCodeStore {
    inner: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    next_id: i64,
    records: Vec<VerificationCode>,
}

impl InMemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_count(&self) -> usize {
        self.inner.lock().await.records.len()
    }
}

#[async_trait]
impl VerificationCodeStore for InMemoryCodeStore {
    async fn replace(&self, new_code: NewVerificationCode) -> AppResult<VerificationCode> {
        let mut state = self.inner.lock().await;
        state
            .records
            .retain(|r| !(r.phone == new_code.phone && r.scene == new_code.scene));
        state.next_id += 1;
        let record = VerificationCode {
            id: state.next_id,
            phone: new_code.phone,
            code: new_code.code,
            scene: new_code.scene,
            expires_at: new_code.expires_at,
            used: false,
        };
        state.records.push(record.clone());
        Ok(record)
    }

    async fn find_active(
        &self,
        phone: &str,
        code: &str,
        scene: Scene,
        now: DateTime<Utc>,
    ) -> AppResult<Option<VerificationCode>> {
        let state = self.inner.lock().await;
        Ok(state
            .records
            .iter()
            .rev()
            .find(|r| r.phone == phone && r.code == code && r.scene == scene && r.is_active(now))
            .cloned())
    }

    async fn mark_used_if_unused(&self, id: i64) -> AppResult<bool> {
        let mut state = self.inner.lock().await;
        match state.records.iter_mut().find(|r| r.id == id && !r.used) {
            Some(record) => {
                record.used = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn purge_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.inner.lock().await;
        let original = state.records.len();
        state.records.retain(|r| r.expires_at >= before);
        Ok((original - state.records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    const PHONE: &str = "85251738110";

    fn new_code(
        phone: &str,
        code: &str,
        scene: Scene,
        expires_at: DateTime<Utc>,
    ) -> NewVerificationCode {
        NewVerificationCode {
            phone: phone.to_string(),
            code: code.to_string(),
            scene,
            expires_at,
        }
    }

    async fn is_active(store: &InMemoryCodeStore, code: &str, scene: Scene) -> bool {
        store
            .find_active(PHONE, code, scene, Utc::now())
            .await
            .unwrap()
            .is_some()
    }

    #[tokio::test]
    async fn test_in_memory_replace_keeps_one_per_phone_and_scene() {
        let store = InMemoryCodeStore::new();
        let expires = Utc::now() + Duration::minutes(10);

        for (code, scene) in [
            ("111111", Scene::Register),
            ("222222", Scene::Register),
            ("333333", Scene::Reset),
        ] {
            store
                .replace(new_code(PHONE, code, scene, expires))
                .await
                .unwrap();
        }

        assert_eq!(store.record_count().await, 2);
        assert!(!is_active(&store, "111111", Scene::Register).await);
        assert!(is_active(&store, "222222", Scene::Register).await);
        assert!(!is_active(&store, "333333", Scene::Register).await);
        assert!(is_active(&store, "333333", Scene::Reset).await);
    }

    #[tokio::test]
    async fn test_in_memory_mark_used_only_once() {
        let store = InMemoryCodeStore::new();
        let expires = Utc::now() + Duration::minutes(10);
        let record = store
            .replace(new_code(PHONE, "123456", Scene::Register, expires))
            .await
            .unwrap();

        assert!(store.mark_used_if_unused(record.id).await.unwrap());
        assert!(!store.mark_used_if_unused(record.id).await.unwrap());
        assert!(!is_active(&store, "123456", Scene::Register).await);
    }

    #[tokio::test]
    async fn test_in_memory_purge_expired() {
        let store = InMemoryCodeStore::new();
        let now = Utc::now();
        let stale = new_code("1111111111", "111111", Scene::Register, now - Duration::days(2));
        let fresh = new_code("2222222222", "222222", Scene::Register, now + Duration::minutes(5));
        store.replace(stale).await.unwrap();
        store.replace(fresh).await.unwrap();

        let purged = store.purge_expired(now - Duration::days(1)).await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.record_count().await, 1);
    }

    #[tokio::test]
    async fn test_sea_orm_mark_used_reports_rows_affected() {
        let pool = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    MockExecResult { last_insert_id: 0, rows_affected: 1 },
                    MockExecResult { last_insert_id: 0, rows_affected: 0 },
                ])
                .into_connection(),
        );
        let store = SeaOrmCodeStore::new(pool.clone());

        assert!(store.mark_used_if_unused(7).await.unwrap());
        assert!(!store.mark_used_if_unused(7).await.unwrap());

        drop(store);
        let Ok(pool) = Arc::try_unwrap(pool) else {
            panic!("store still holds the connection");
        };
        let log = pool.into_transaction_log();
        assert_eq!(log.len(), 2);
        let sql = &log[0].statements()[0].sql;
        assert!(sql.starts_with(r#"UPDATE "verification_codes" SET "used""#));
        assert!(sql.contains(r#""verification_codes"."used" = "#));
    }

    #[tokio::test]
    async fn test_sea_orm_replace_returns_inserted_record() {
        let expires_at = Utc::now() + Duration::minutes(10);
        let inserted = verification_codes::Model {
            id: 42,
            phone: PHONE.to_string(),
            code: "654321".to_string(),
            scene: Scene::Reset,
            expires_at,
            used: false,
            created_at: Some(Utc::now()),
        };
        let pool = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }])
            .append_query_results([vec![inserted]])
            .into_connection();
        let store = SeaOrmCodeStore::new(Arc::new(pool));

        let record = store
            .replace(new_code(PHONE, "654321", Scene::Reset, expires_at))
            .await
            .unwrap();
        assert_eq!(record.id, 42);
        assert_eq!(record.scene, Scene::Reset);
        assert!(!record.used);
    }
}
