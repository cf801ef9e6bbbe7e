pub mod attendance;
pub mod fee;
pub mod message;
pub mod school;
pub mod student;
pub mod trust;
pub mod user;
