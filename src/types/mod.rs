pub mod audit;
pub mod data_request;
pub mod errors;
pub mod user;

pub use audit::*;
pub use data_request::*;
pub use errors::*;
pub use user::*;
