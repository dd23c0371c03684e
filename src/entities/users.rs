use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub user_account: String,
    pub user_name: Option<String>,
    #[sea_orm(unique)]
    pub user_mobile_number: String,
    pub user_age: Option<String>,
    pub user_sex: Option<String>,
    pub password_hash: String,
    // 最近一次登录签发的令牌
    pub user_cookie: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
