use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr,
};

use crate::entities::{Scene, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::external::SmsSender;
use crate::models::*;
use crate::services::VerificationCodeManager;
use crate::utils::*;

const DEFAULT_USER_SEX: &str = "男";
const CODE_INVALID_MESSAGE: &str = "驗證碼錯誤或已過期";
const BAD_CREDENTIALS_MESSAGE: &str = "帳號或密碼錯誤";

pub struct AuthService {
    pool: Arc<DatabaseConnection>,
    jwt_service: JwtService,
    codes: VerificationCodeManager,
    sms: Arc<dyn SmsSender>,
}

impl AuthService {
    pub fn new(
        pool: Arc<DatabaseConnection>,
        jwt_service: JwtService,
        codes: VerificationCodeManager,
        sms: Arc<dyn SmsSender>,
    ) -> Self {
        Self {
            pool,
            jwt_service,
            codes,
            sms,
        }
    }

    pub async fn send_verification_code(
        &self,
        request: SendCodeRequest,
    ) -> AppResult<SendCodeResponse> {
        if request.phone.trim().is_empty() {
            return Err(AppError::ValidationError("請輸入手機號碼".to_string()));
        }
        let scene: Scene = request
            .scene
            .parse()
            .map_err(|_| AppError::ValidationError("無效的場景參數".to_string()))?;
        let phone = validate_phone(&request.phone)?;

        let code = self.codes.issue(&phone, scene).await?;
        self.sms
            .send_verification_code(&phone, &code, self.codes.ttl_minutes())
            .await?;

        Ok(SendCodeResponse {
            expires_in: self.codes.ttl_seconds(),
        })
    }

    pub async fn register(&self, request: RegisterRequest) -> AppResult<UserResponse> {
        if [
            &request.user_name,
            &request.user_account,
            &request.user_mobile_number,
            &request.user_password,
            &request.user_age,
            &request.vcode,
        ]
        .iter()
        .any(|field| field.trim().is_empty())
        {
            return Err(AppError::ValidationError("請填寫完整信息".to_string()));
        }

        validate_password(&request.user_password)?;
        if request.user_password != request.user_password_sure {
            return Err(AppError::ValidationError("密碼不一致".to_string()));
        }
        let phone = validate_phone(&request.user_mobile_number)?;
        let account = request.user_account.trim().to_string();

        // 先查重再核销，避免已占用的帐号浪费验证码
        if self.find_by_account(&account).await?.is_some() {
            return Err(AppError::Conflict("此帳號已被使用".to_string()));
        }
        if self.find_by_phone(&phone).await?.is_some() {
            return Err(AppError::Conflict("此手機號碼已被使用".to_string()));
        }

        if !self.codes.verify(&phone, request.vcode.trim(), Scene::Register).await? {
            return Err(AppError::ValidationError(CODE_INVALID_MESSAGE.to_string()));
        }

        let password_hash = hash_password(&request.user_password)?;
        let user_sex = request
            .user_sex
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_SEX.to_string());

        let now = Utc::now();
        let user = users::ActiveModel {
            user_account: Set(account),
            user_name: Set(Some(request.user_name)),
            user_mobile_number: Set(phone),
            user_age: Set(Some(request.user_age)),
            user_sex: Set(Some(user_sex)),
            password_hash: Set(password_hash),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(self.pool.as_ref())
        .await
        .map_err(map_unique_violation)?;

        log::info!("User registered: id={} account={}", user.id, user.user_account);
        Ok(UserResponse::from(user))
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<LoginResponse> {
        if request.user_account.trim().is_empty() || request.user_password.is_empty() {
            return Err(AppError::ValidationError("請輸入帳號或密碼".to_string()));
        }

        let user = self
            .find_by_account(request.user_account.trim())
            .await?
            .ok_or_else(|| AppError::AuthError(BAD_CREDENTIALS_MESSAGE.to_string()))?;

        if !verify_password(&request.user_password, &user.password_hash)? {
            return Err(AppError::AuthError(BAD_CREDENTIALS_MESSAGE.to_string()));
        }

        let token = self.jwt_service.generate_token(
            user.id,
            &user.user_account,
            &user.user_mobile_number,
        )?;

        users::Entity::update_many()
            .col_expr(users::Column::UserCookie, Expr::value(token.clone()))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(user.id))
            .exec(self.pool.as_ref())
            .await?;

        log::info!("User logged in: id={}", user.id);
        Ok(LoginResponse {
            user: UserResponse::from(user),
            user_cookie: token,
            expires_in: self.jwt_service.get_expires_in(),
        })
    }

    pub async fn recover_password(&self, request: PasswordRecoveryRequest) -> AppResult<()> {
        if [
            &request.user_account,
            &request.phone,
            &request.vcode,
            &request.new_password,
        ]
        .iter()
        .any(|field| field.trim().is_empty())
        {
            return Err(AppError::ValidationError("請輸入完整的信息".to_string()));
        }
        validate_password(&request.new_password)?;

        let user = self
            .find_by_account(request.user_account.trim())
            .await?
            .ok_or_else(|| AppError::NotFound("帳號不存在".to_string()))?;

        let phone = validate_phone(&request.phone)?;
        if user.user_mobile_number != phone {
            return Err(AppError::ValidationError("手機號碼與帳號不匹配".to_string()));
        }

        if !self.codes.verify(&phone, request.vcode.trim(), Scene::Reset).await? {
            return Err(AppError::ValidationError(CODE_INVALID_MESSAGE.to_string()));
        }

        self.update_password(user.id, &request.new_password).await?;
        log::info!("Password reset: id={}", user.id);
        Ok(())
    }

    pub async fn change_password(
        &self,
        claims: &Claims,
        request: ChangePasswordRequest,
    ) -> AppResult<()> {
        if [
            &request.user_account,
            &request.user_password,
            &request.new_password,
            &request.new_password_sure,
        ]
        .iter()
        .any(|field| field.is_empty())
        {
            return Err(AppError::ValidationError("請輸入完整密碼".to_string()));
        }
        validate_password(&request.new_password)?;
        if request.new_password != request.new_password_sure {
            return Err(AppError::ValidationError("密碼不一致".to_string()));
        }

        if claims.user_account != request.user_account.trim() {
            return Err(AppError::AuthError("未授權".to_string()));
        }

        let user = self
            .find_by_account(request.user_account.trim())
            .await?
            .ok_or_else(|| AppError::NotFound("用戶不存在".to_string()))?;

        if !verify_password(&request.user_password, &user.password_hash)? {
            return Err(AppError::AuthError("原密碼錯誤".to_string()));
        }

        self.update_password(user.id, &request.new_password).await?;
        log::info!("Password changed: id={}", user.id);
        Ok(())
    }

    pub async fn get_user(&self, user_id: i64) -> AppResult<UserResponse> {
        users::Entity::find_by_id(user_id)
            .one(self.pool.as_ref())
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| AppError::NotFound("用戶不存在".to_string()))
    }

    async fn update_password(&self, user_id: i64, new_password: &str) -> AppResult<()> {
        let password_hash = hash_password(new_password)?;
        users::Entity::update_many()
            .col_expr(users::Column::PasswordHash, Expr::value(password_hash))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(user_id))
            .exec(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn find_by_account(&self, account: &str) -> AppResult<Option<users::Model>> {
        Ok(users::Entity::find()
            .filter(users::Column::UserAccount.eq(account))
            .one(self.pool.as_ref())
            .await?)
    }

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<users::Model>> {
        Ok(users::Entity::find()
            .filter(users::Column::UserMobileNumber.eq(phone))
            .one(self.pool.as_ref())
            .await?)
    }
}

// 并发注册时唯一索引兜底
fn map_unique_violation(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("此帳號或手機號碼已被使用".to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryCodeStore;
    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use tokio::sync::Mutex;

    const PHONE: &str = "85251738110";

    #[derive(Default)]
    struct RecordingSms {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl SmsSender for RecordingSms {
        async fn send_verification_code(&self, phone: &str, code: &str, _: i64) -> AppResult<()> {
            if self.fail {
                return Err(AppError::DeliveryError("gateway down".into()));
            }
            self.sent.lock().await.push((phone.to_string(), code.to_string()));
            Ok(())
        }
    }

    struct Fixture {
        service: AuthService,
        codes: VerificationCodeManager,
        sms: Arc<RecordingSms>,
    }

    fn fixture(db: MockDatabase, sms: RecordingSms) -> Fixture {
        let codes = VerificationCodeManager::new(Arc::new(InMemoryCodeStore::new()), 10);
        let sms = Arc::new(sms);
        let service = AuthService::new(
            Arc::new(db.into_connection()),
            JwtService::new("test-secret", 3600),
            codes.clone(),
            sms.clone(),
        );
        Fixture { service, codes, sms }
    }

    fn empty_db() -> MockDatabase {
        MockDatabase::new(DatabaseBackend::Postgres)
    }

    fn user(id: i64, account: &str, password: &str) -> users::Model {
        users::Model {
            id,
            user_account: account.to_string(),
            user_name: Some("張三".to_string()),
            user_mobile_number: PHONE.to_string(),
            user_age: Some("30".to_string()),
            user_sex: Some("男".to_string()),
            password_hash: hash_password(password).unwrap(),
            user_cookie: None,
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        }
    }

    fn register_request(vcode: &str) -> RegisterRequest {
        RegisterRequest {
            user_name: "張三".into(),
            user_account: "zhangsan".into(),
            user_mobile_number: PHONE.into(),
            user_password: "password123".into(),
            user_password_sure: "password123".into(),
            user_age: "30".into(),
            user_sex: None,
            vcode: vcode.into(),
        }
    }

    #[tokio::test]
    async fn test_send_code_delivers_issued_code() {
        let f = fixture(empty_db(), RecordingSms::default());
        let response = f
            .service
            .send_verification_code(SendCodeRequest {
                phone: "+852 5173 8110".into(),
                scene: "register".into(),
            })
            .await
            .unwrap();
        assert_eq!(response.expires_in, 600);

        let sent = f.sms.sent.lock().await.clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+85251738110");
        assert!(f.codes.verify("+85251738110", &sent[0].1, Scene::Register).await.unwrap());
    }

    #[tokio::test]
    async fn test_send_code_rejects_bad_input() {
        let f = fixture(empty_db(), RecordingSms::default());
        let bad_scene = f
            .service
            .send_verification_code(SendCodeRequest { phone: PHONE.into(), scene: "login".into() })
            .await;
        assert!(matches!(bad_scene, Err(AppError::ValidationError(_))));

        let bad_phone = f
            .service
            .send_verification_code(SendCodeRequest {
                phone: "12345".into(),
                scene: "reset".into(),
            })
            .await;
        assert!(matches!(bad_phone, Err(AppError::ValidationError(_))));
        assert!(f.sms.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_send_code_surfaces_delivery_failure() {
        let f = fixture(empty_db(), RecordingSms { fail: true, ..Default::default() });
        let result = f
            .service
            .send_verification_code(SendCodeRequest {
                phone: PHONE.into(),
                scene: "register".into(),
            })
            .await;
        assert!(matches!(result, Err(AppError::DeliveryError(_))));
    }

    #[tokio::test]
    async fn test_register_creates_user() {
        let created = user(1, "zhangsan", "password123");
        let db = empty_db()
            .append_query_results([Vec::<users::Model>::new(), Vec::new(), vec![created]]);
        let f = fixture(db, RecordingSms::default());
        let code = f.codes.issue(PHONE, Scene::Register).await.unwrap();

        let response = f.service.register(register_request(&code)).await.unwrap();
        assert_eq!(response.id, 1);
        assert_eq!(response.user_account, "zhangsan");
        // 验证码已被核销
        assert!(!f.codes.verify(PHONE, &code, Scene::Register).await.unwrap());
    }

    #[tokio::test]
    async fn test_register_with_taken_account_keeps_code() {
        let db = empty_db().append_query_results([vec![user(1, "zhangsan", "password123")]]);
        let f = fixture(db, RecordingSms::default());
        let code = f.codes.issue(PHONE, Scene::Register).await.unwrap();

        let result = f.service.register(register_request(&code)).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(f.codes.verify(PHONE, &code, Scene::Register).await.unwrap());
    }

    #[tokio::test]
    async fn test_register_rejects_wrong_code_and_bad_password() {
        let db = empty_db().append_query_results([Vec::<users::Model>::new(), Vec::new()]);
        let f = fixture(db, RecordingSms::default());
        f.codes.issue(PHONE, Scene::Register).await.unwrap();

        let wrong_code = f.service.register(register_request("000000")).await;
        assert!(matches!(wrong_code, Err(AppError::ValidationError(_))));

        let mut weak = register_request("123456");
        weak.user_password = "short1".into();
        weak.user_password_sure = "short1".into();
        assert!(matches!(
            f.service.register(weak).await,
            Err(AppError::ValidationError(_))
        ));

        let mut mismatch = register_request("123456");
        mismatch.user_password_sure = "password124".into();
        assert!(matches!(
            f.service.register(mismatch).await,
            Err(AppError::ValidationError(_))
        ));

        let mut missing = register_request("123456");
        missing.user_age = String::new();
        assert!(matches!(
            f.service.register(missing).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_login_issues_token() {
        let db = empty_db()
            .append_query_results([vec![user(5, "zhangsan", "password123")]])
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }]);
        let f = fixture(db, RecordingSms::default());

        let response = f
            .service
            .login(LoginRequest {
                user_account: "zhangsan".into(),
                user_password: "password123".into(),
            })
            .await
            .unwrap();

        assert_eq!(response.user.id, 5);
        assert_eq!(response.expires_in, 3600);
        let claims = JwtService::new("test-secret", 3600)
            .verify_token(&response.user_cookie)
            .unwrap();
        assert_eq!(claims.user_account, "zhangsan");
        assert_eq!(claims.user_mobile_number, PHONE);
    }

    #[tokio::test]
    async fn test_login_hides_which_credential_failed() {
        let db = empty_db()
            .append_query_results([Vec::<users::Model>::new()])
            .append_query_results([vec![user(5, "zhangsan", "password123")]]);
        let f = fixture(db, RecordingSms::default());

        let unknown = f
            .service
            .login(LoginRequest {
                user_account: "nobody".into(),
                user_password: "password123".into(),
            })
            .await;
        let wrong = f
            .service
            .login(LoginRequest {
                user_account: "zhangsan".into(),
                user_password: "password999".into(),
            })
            .await;

        match (unknown, wrong) {
            (Err(AppError::AuthError(a)), Err(AppError::AuthError(b))) => assert_eq!(a, b),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_recover_password() {
        let db = empty_db()
            .append_query_results([vec![user(5, "zhangsan", "password123")]])
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }]);
        let f = fixture(db, RecordingSms::default());
        let code = f.codes.issue(PHONE, Scene::Reset).await.unwrap();

        f.service
            .recover_password(PasswordRecoveryRequest {
                user_account: "zhangsan".into(),
                phone: PHONE.into(),
                vcode: code,
                new_password: "newpassword1".into(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_recover_password_checks_phone_and_scene() {
        let db = empty_db()
            .append_query_results([vec![user(5, "zhangsan", "password123")]])
            .append_query_results([vec![user(5, "zhangsan", "password123")]])
            .append_query_results([Vec::<users::Model>::new()]);
        let f = fixture(db, RecordingSms::default());
        // register 场景的验证码不能用于重置密码
        let code = f.codes.issue(PHONE, Scene::Register).await.unwrap();
        let request = |phone: &str, account: &str| PasswordRecoveryRequest {
            user_account: account.into(),
            phone: phone.into(),
            vcode: code.clone(),
            new_password: "newpassword1".into(),
        };

        assert!(matches!(
            f.service.recover_password(request("85251738119", "zhangsan")).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            f.service.recover_password(request(PHONE, "zhangsan")).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            f.service.recover_password(request(PHONE, "nobody")).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_change_password_requires_matching_token() {
        let db = empty_db()
            .append_query_results([vec![user(5, "zhangsan", "password123")]])
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }]);
        let f = fixture(db, RecordingSms::default());
        let jwt = JwtService::new("test-secret", 3600);
        let claims = |account: &str| {
            jwt.verify_token(&jwt.generate_token(5, account, PHONE).unwrap())
                .unwrap()
        };
        let request = || ChangePasswordRequest {
            user_account: "zhangsan".into(),
            user_password: "password123".into(),
            new_password: "newpassword1".into(),
            new_password_sure: "newpassword1".into(),
        };

        assert!(matches!(
            f.service.change_password(&claims("lisi"), request()).await,
            Err(AppError::AuthError(_))
        ));
        f.service
            .change_password(&claims("zhangsan"), request())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let db = empty_db().append_query_results([Vec::<users::Model>::new()]);
        let f = fixture(db, RecordingSms::default());
        assert!(matches!(f.service.get_user(99).await, Err(AppError::NotFound(_))));
    }
}
