use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::info;

use crate::db;
use crate::error::{FifadosError, Result};
use crate::model::{UserProfile, UserStatus, format_timestamp};

pub const MIN_USERNAME_LEN: usize = 3;

/// Identity of the user a command runs as. Obtained once at the entry point
/// and passed to whatever needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub username: String,
}

impl Session {
    fn from_profile(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.user_id.clone(),
            email: profile.email.clone(),
            username: profile.username.clone(),
        }
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn check_username(raw: &str) -> Result<String> {
    let username = raw.trim();
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(FifadosError::UsernameTooShort {
            min: MIN_USERNAME_LEN,
        });
    }
    Ok(username.to_string())
}

/// Creates the profile for an authenticated `user_id`.
///
/// A provisional profile left behind by an invitation to the same email is
/// claimed: its id is rewritten to `user_id`, its pending rival links are
/// accepted and the invitations sent to it are closed.
pub fn register(
    conn: &mut Connection,
    user_id: &str,
    email: &str,
    username: &str,
    now: DateTime<Utc>,
) -> Result<Session> {
    let email = normalize_email(email);
    let username = check_username(username)?;
    if email.is_empty() || user_id.trim().is_empty() {
        return Err(FifadosError::AllFieldsRequired);
    }

    let tx = conn.transaction()?;
    if db::username_reserved(&tx, &username)? {
        return Err(FifadosError::UsernameTaken(username));
    }

    if db::load_user(&tx, user_id)?.is_some() {
        return Err(FifadosError::AlreadyRegistered(user_id.to_string()));
    }

    let stamp = format_timestamp(now);
    let provisional = match db::find_user_by_email(&tx, &email)? {
        Some(existing) if existing.status == UserStatus::Active => {
            return Err(FifadosError::EmailTaken(email));
        }
        other => other,
    };

    match provisional {
        Some(existing) => {
            db::rename_user(&tx, &existing.user_id, user_id)?;
            db::update_profile(&tx, user_id, &username, UserStatus::Active, &stamp)?;
            let accepted = db::accept_pending_rivals_of(&tx, user_id)?;
            db::set_invitations_status(&tx, &email, "accepted")?;
            info!(
                user_id,
                provisional_id = %existing.user_id,
                accepted,
                "claimed provisional profile"
            );
        }
        None => {
            db::insert_user(
                &tx,
                &UserProfile {
                    user_id: user_id.to_string(),
                    email: email.clone(),
                    username: username.clone(),
                    status: UserStatus::Active,
                    created_at: stamp,
                    updated_at: None,
                },
            )?;
            info!(user_id, %username, "registered user");
        }
    }
    db::reserve_username(&tx, &username, user_id)?;
    tx.commit()?;

    Ok(Session {
        user_id: user_id.to_string(),
        email,
        username,
    })
}

/// Opens a session for an existing, completed profile.
pub fn login(conn: &Connection, user_id: &str) -> Result<Session> {
    let profile =
        db::load_user(conn, user_id)?.ok_or_else(|| FifadosError::UserNotFound(user_id.to_string()))?;
    if profile.status == UserStatus::Pending {
        return Err(FifadosError::ProfileIncomplete(profile.user_id));
    }
    Ok(Session::from_profile(&profile))
}

/// Turns a pending profile into an active one under the chosen username.
pub fn complete_profile(
    conn: &mut Connection,
    user_id: &str,
    username: &str,
    now: DateTime<Utc>,
) -> Result<Session> {
    let username = check_username(username)?;
    let tx = conn.transaction()?;
    let profile =
        db::load_user(&tx, user_id)?.ok_or_else(|| FifadosError::UserNotFound(user_id.to_string()))?;
    if profile.status != UserStatus::Pending {
        return Err(FifadosError::ProfileNotPending(profile.user_id));
    }
    if db::username_reserved(&tx, &username)? {
        return Err(FifadosError::UsernameTaken(username));
    }
    db::update_profile(
        &tx,
        user_id,
        &username,
        UserStatus::Active,
        &format_timestamp(now),
    )?;
    db::reserve_username(&tx, &username, user_id)?;
    tx.commit()?;
    info!(user_id, %username, "completed profile");

    Ok(Session {
        user_id: profile.user_id,
        email: profile.email,
        username,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_usernames_are_rejected() {
        assert!(matches!(
            check_username(" ab "),
            Err(FifadosError::UsernameTooShort { min: 3 })
        ));
        assert_eq!(check_username(" ana ").expect("valid"), "ana");
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ana@Example.COM "), "ana@example.com");
    }
}
