use thiserror::Error;

use crate::stats::InvalidInputError;

pub type Result<T> = std::result::Result<T, FifadosError>;

#[derive(Debug, Error)]
pub enum FifadosError {
    #[error("all fields are required")]
    AllFieldsRequired,
    #[error("invalid goal count: {0:?}")]
    InvalidGoals(String),
    #[error("equal scores cannot be recorded under the current draw policy")]
    DrawNotAllowed,
    #[error("username must be at least {min} characters")]
    UsernameTooShort { min: usize },
    #[error("username already taken: {0}")]
    UsernameTaken(String),
    #[error("email already registered: {0}")]
    EmailTaken(String),
    #[error("user {0} is already registered")]
    AlreadyRegistered(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("profile for {0} is incomplete")]
    ProfileIncomplete(String),
    #[error("profile for {0} is not pending")]
    ProfileNotPending(String),
    #[error("you cannot invite yourself")]
    SelfInvite,
    #[error("already connected with {0}")]
    AlreadyConnected(String),
    #[error("rival link not found: {0}")]
    RivalNotFound(i64),
    #[error(transparent)]
    Stats(#[from] InvalidInputError),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}
