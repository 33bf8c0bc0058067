//! Breakout orchestration.
//!
//! Grouping of meeting attendees, provisioning of the backing team with one
//! channel and online meeting per group, persistence of the assignment on the
//! calendar event, and teardown.

mod archive;
mod broadcast;
mod events;
mod jobs;
mod message;
mod partition;
mod poll;
mod provision;
mod roster;
mod session;
mod store;

pub use archive::archive;
pub use broadcast::send_to_all_breakouts;
pub use events::{BreakoutEvent, Notifier};
pub use jobs::{JobRegistry, JobView};
pub use message::chat_id_from_join_url;
pub use partition::{partition, validate_group_size};
pub use provision::{ProvisionPlan, ProvisionSettings, Provisioner};
pub use roster::Roster;
pub use session::{Session, SessionStore};
pub use store::BreakoutStore;
