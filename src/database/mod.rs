pub mod code_store;
pub mod connection;

pub use code_store::*;
pub use connection::*;
