//! Random grouping of participants into fixed-size breakout groups.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::errors::AppError;
use crate::models::User;

pub const MIN_GROUP_SIZE: usize = 2;
pub const MAX_GROUP_SIZE: usize = 10;

/// Reject group sizes outside `[2, 10]`.
pub fn validate_group_size(group_size: usize) -> Result<usize, AppError> {
    if (MIN_GROUP_SIZE..=MAX_GROUP_SIZE).contains(&group_size) {
        Ok(group_size)
    } else {
        Err(AppError::Validation(format!(
            "Group size must be between {} and {}, got {}",
            MIN_GROUP_SIZE, MAX_GROUP_SIZE, group_size
        )))
    }
}

/// Shuffle `users` and slice them into groups of `group_size`.
///
/// Every group but the last has exactly `group_size` members; the last holds
/// the remainder. An empty input yields no groups.
pub fn partition<R: Rng + ?Sized>(users: &[User], group_size: usize, rng: &mut R) -> Vec<Vec<User>> {
    let mut shuffled = users.to_vec();
    shuffled.shuffle(rng);

    shuffled
        .chunks(group_size.max(1))
        .map(<[User]>::to_vec)
        .collect()
}
