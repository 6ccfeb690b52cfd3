pub mod identity;
pub mod jwt;
pub mod password;
pub mod s3;
pub mod validation;
