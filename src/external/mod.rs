pub mod partner;
pub mod sms;

pub use partner::*;
pub use sms::*;
