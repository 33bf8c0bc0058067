//! Data models for the moderator backend.
//!
//! Wire names match the meeting tab's TypeScript interfaces (camelCase).

mod breakout;
mod event;
mod requests;
mod user;

pub use breakout::*;
pub use event::*;
pub use requests::*;
pub use user::*;
