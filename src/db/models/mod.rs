//! Database models split into domain-specific modules.

pub mod bid;
pub mod booking;
pub mod password_reset;
pub mod user;
pub mod vehicle;

pub use bid::*;
pub use booking::*;
pub use password_reset::*;
pub use user::*;
pub use vehicle::*;
