pub mod employee;
pub mod request;
