pub mod business;
pub mod leave;
