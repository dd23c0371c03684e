pub mod users;
pub mod verification_codes;

pub use users as user_entity;
pub use verification_codes as verification_code_entity;
pub use verification_codes::Scene;
