pub mod code_generator;
pub mod jwt;
pub mod password;
pub mod phone;
pub mod sm2;

pub use code_generator::generate_six_digit_code;
pub use jwt::*;
pub use password::*;
pub use phone::*;
pub use sm2::{Sm2Codec, Sm2Error, Sm2KeyPair, normalize_public_key};
