use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::user_entity as users;
use crate::models::common::string_or_number;

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    #[schema(example = "張三")]
    pub user_name: String,
    #[serde(default)]
    #[schema(example = "zhangsan")]
    pub user_account: String,
    #[serde(default)]
    #[schema(example = "85251738110")]
    pub user_mobile_number: String,
    #[serde(default)]
    #[schema(example = "password123")]
    pub user_password: String,
    #[serde(default)]
    #[schema(example = "password123")]
    pub user_password_sure: String,
    #[serde(default, deserialize_with = "string_or_number")]
    #[schema(example = "30")]
    pub user_age: String,
    #[serde(default)]
    #[schema(example = "男")]
    pub user_sex: Option<String>,
    #[serde(default, rename = "Vcode")]
    #[schema(example = "123456")]
    pub vcode: String,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    #[schema(example = "zhangsan")]
    pub user_account: String,
    #[serde(default)]
    #[schema(example = "password123")]
    pub user_password: String,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct PasswordRecoveryRequest {
    #[serde(default)]
    pub user_account: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, rename = "Vcode")]
    pub vcode: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub user_account: String,
    #[serde(default)]
    pub user_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub new_password_sure: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub user_account: String,
    pub user_name: Option<String>,
    pub user_mobile_number: String,
    pub user_age: Option<String>,
    pub user_sex: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub user_cookie: String,
    pub expires_in: i64,
}

impl From<users::Model> for UserResponse {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            user_account: user.user_account,
            user_name: user.user_name,
            user_mobile_number: user.user_mobile_number,
            user_age: user.user_age,
            user_sex: user.user_sex,
            created_at: user.created_at,
        }
    }
}
