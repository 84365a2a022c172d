pub mod attendance;
pub mod auth;
pub mod core;
pub mod courses;
pub mod grades;
pub mod rollcall;
pub mod snapshot;
pub mod students;
