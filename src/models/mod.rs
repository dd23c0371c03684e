pub mod common;
pub mod partner;
pub mod user;
pub mod verification_code;

pub use common::*;
pub use partner::*;
pub use user::*;
pub use verification_code::*;
