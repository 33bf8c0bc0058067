//! Moderator / participant roster of one opened event.

use std::collections::HashSet;

use crate::errors::AppError;
use crate::models::User;

use super::partition::{validate_group_size, MIN_GROUP_SIZE};

/// Illegal roster changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    #[error("{0} is already a moderator")]
    AlreadyModerator(String),
    #[error("{0} is not an attendee of this meeting")]
    NotAnAttendee(String),
    #[error("{0} is not a moderator")]
    NotAModerator(String),
    #[error("the signed-in user cannot stop moderating")]
    SelfRemoval,
}

impl From<RosterError> for AppError {
    fn from(err: RosterError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Two disjoint lists: moderators and the participants to be grouped.
///
/// The signed-in user is always a moderator, so `moderators` is never empty.
#[derive(Debug, Clone)]
pub struct Roster {
    current_user: User,
    moderators: Vec<User>,
    participants: Vec<User>,
}

impl Roster {
    /// Build a roster from the meeting attendees.
    ///
    /// `stored_moderators` comes from a rehydrated assignment; without it the
    /// signed-in user is the only moderator.
    pub fn new(current_user: User, attendees: Vec<User>, stored_moderators: Option<Vec<User>>) -> Self {
        let mut moderators: Vec<User> = Vec::new();
        for m in stored_moderators.unwrap_or_default() {
            if !moderators.contains(&m) {
                moderators.push(m);
            }
        }
        if !moderators.contains(&current_user) {
            moderators.insert(0, current_user.clone());
        }

        let mut participants: Vec<User> = Vec::new();
        for a in attendees {
            if !moderators.contains(&a) && !participants.contains(&a) {
                participants.push(a);
            }
        }

        Self {
            current_user,
            moderators,
            participants,
        }
    }

    pub fn current_user(&self) -> &User {
        &self.current_user
    }

    pub fn moderators(&self) -> &[User] {
        &self.moderators
    }

    pub fn participants(&self) -> &[User] {
        &self.participants
    }

    /// Promote a participant to moderator.
    pub fn add_moderator(&mut self, user: &User) -> Result<(), RosterError> {
        if self.moderators.contains(user) {
            return Err(RosterError::AlreadyModerator(user.id.clone()));
        }
        let pos = self
            .participants
            .iter()
            .position(|p| p == user)
            .ok_or_else(|| RosterError::NotAnAttendee(user.id.clone()))?;

        let user = self.participants.remove(pos);
        self.moderators.push(user);
        Ok(())
    }

    /// Return a moderator to the participants.
    pub fn remove_moderator(&mut self, user_id: &str) -> Result<User, RosterError> {
        if self.current_user.id == user_id {
            return Err(RosterError::SelfRemoval);
        }
        let pos = self
            .moderators
            .iter()
            .position(|m| m.id == user_id)
            .ok_or_else(|| RosterError::NotAModerator(user_id.to_string()))?;

        let user = self.moderators.remove(pos);
        self.participants.insert(0, user.clone());
        Ok(user)
    }

    /// Check caller-supplied groups against the current participants.
    ///
    /// Each participant must appear in exactly one group and no group may hold
    /// a moderator or a stranger. The groups must have the shape `partition`
    /// produces: every group but the last holds exactly `group_size` members,
    /// the last holds the remainder. Without an explicit size the first
    /// group's length is taken. Returns the group size.
    pub fn check_groups(&self, groups: &[Vec<User>], group_size: Option<usize>) -> Result<usize, AppError> {
        let Some(first) = groups.first() else {
            return Err(AppError::Validation("There are no groups".to_string()));
        };
        let group_size = match group_size {
            Some(size) => size,
            None if groups.len() == 1 => first.len().max(MIN_GROUP_SIZE),
            None => first.len(),
        };
        let group_size = validate_group_size(group_size)?;

        let expected_groups = self.participants.len().div_ceil(group_size);
        if groups.len() != expected_groups {
            return Err(AppError::Validation(format!(
                "{} participants in groups of {} make {} groups, got {}",
                self.participants.len(),
                group_size,
                expected_groups,
                groups.len()
            )));
        }

        let last = groups.len() - 1;
        for (i, group) in groups.iter().enumerate() {
            let fits = if i == last {
                (1..=group_size).contains(&group.len())
            } else {
                group.len() == group_size
            };
            if !fits {
                return Err(AppError::Validation(format!(
                    "Group {} has {} members, expected {}",
                    i + 1,
                    group.len(),
                    if i == last {
                        format!("1 to {}", group_size)
                    } else {
                        group_size.to_string()
                    }
                )));
            }
        }

        let participants: HashSet<&str> = self.participants.iter().map(|p| p.id.as_str()).collect();
        let mut seen: HashSet<&str> = HashSet::new();

        for group in groups {
            for user in group {
                if !participants.contains(user.id.as_str()) {
                    return Err(AppError::Validation(format!(
                        "{} is not a participant",
                        user.id
                    )));
                }
                if !seen.insert(user.id.as_str()) {
                    return Err(AppError::Validation(format!(
                        "{} appears in more than one group",
                        user.id
                    )));
                }
            }
        }

        if seen.len() != participants.len() {
            return Err(AppError::Validation(
                "Every participant must be assigned to a group".to_string(),
            ));
        }
        Ok(group_size)
    }
}
