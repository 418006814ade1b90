//! Database models split into domain-specific modules.

pub mod appointment;
pub mod credential;
pub mod notification;
pub mod user;

pub use appointment::*;
pub use credential::*;
pub use notification::*;
pub use user::*;
