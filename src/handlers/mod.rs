pub mod auth;
pub mod health;
pub mod integration;
pub mod sm2;
pub mod user;

pub use auth::auth_config;
pub use health::health_config;
pub use integration::integration_config;
pub use sm2::sm2_config;
pub use user::user_config;
