pub mod init;
pub mod tools;
