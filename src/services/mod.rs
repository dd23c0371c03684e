pub mod auth_service;
pub mod integration_service;
pub mod verification_code_service;

pub use auth_service::*;
pub use integration_service::*;
pub use verification_code_service::*;
