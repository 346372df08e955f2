pub mod contract;
pub mod request;
pub mod schema;
