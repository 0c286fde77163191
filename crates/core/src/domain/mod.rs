pub mod employee;
pub mod policy;
