use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::accounts::{Session, normalize_email};
use crate::db;
use crate::error::{FifadosError, Result};
use crate::invite_email::{InvitationEmail, render_invitation};
use crate::model::{
    Invitation, RivalLink, RivalStatus, RivalSummary, UserProfile, UserStatus, format_timestamp,
    sorted_pair,
};

#[derive(Debug, Clone)]
pub struct InviteOutcome {
    pub link: RivalLink,
    /// Present when the invitee had no account and must be emailed.
    pub email: Option<InvitationEmail>,
}

/// One rival link as the session user sees it, pending or accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RivalOverview {
    pub link_id: i64,
    pub status: RivalStatus,
    pub requested_by: String,
    pub rival: RivalSummary,
}

/// `pending_<millis>`, suffixed with `_<n>` while the id is already taken.
fn provisional_id(conn: &Connection, now: DateTime<Utc>) -> Result<String> {
    let base = format!("pending_{}", now.timestamp_millis());
    let mut candidate = base.clone();
    let mut n = 1;
    while db::load_user(conn, &candidate)?.is_some() {
        n += 1;
        candidate = format!("{base}_{n}");
    }
    Ok(candidate)
}

/// Connects the session user with whoever owns `email`.
///
/// Unknown addresses get a provisional pending profile and an invitation;
/// the link stays pending until that profile is claimed.
pub fn invite_rival(
    conn: &mut Connection,
    session: &Session,
    email: &str,
    app_url: &str,
    now: DateTime<Utc>,
) -> Result<InviteOutcome> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(FifadosError::AllFieldsRequired);
    }
    if email == session.email {
        return Err(FifadosError::SelfInvite);
    }

    let stamp = format_timestamp(now);
    let tx = conn.transaction()?;

    let mut outgoing = None;
    let rival = match db::find_user_by_email(&tx, &email)? {
        Some(existing) => existing,
        None => {
            let provisional = UserProfile {
                user_id: provisional_id(&tx, now)?,
                email: email.clone(),
                username: email
                    .split('@')
                    .next()
                    .unwrap_or_default()
                    .to_string(),
                status: UserStatus::Pending,
                created_at: stamp.clone(),
                updated_at: None,
            };
            db::insert_user(&tx, &provisional)?;
            db::insert_invitation(
                &tx,
                &Invitation {
                    id: 0,
                    email: email.clone(),
                    invited_by: session.user_id.clone(),
                    status: "pending".to_string(),
                    created_at: stamp.clone(),
                },
            )?;
            outgoing = Some(render_invitation(Some(&session.username), &email, app_url));
            info!(
                invited_by = %session.user_id,
                provisional_id = %provisional.user_id,
                "created provisional profile"
            );
            provisional
        }
    };

    if rival.user_id == session.user_id {
        return Err(FifadosError::SelfInvite);
    }

    let participants = sorted_pair(&session.user_id, &rival.user_id);
    if db::find_rival_by_pair(&tx, &participants)?.is_some() {
        return Err(FifadosError::AlreadyConnected(rival.username));
    }

    let mut link = RivalLink {
        id: 0,
        participants,
        status: match rival.status {
            UserStatus::Pending => RivalStatus::Pending,
            UserStatus::Active => RivalStatus::Accepted,
        },
        requested_by: session.user_id.clone(),
        created_at: stamp,
        username: rival.username,
        email: rival.email,
    };
    link.id = db::insert_rival(&tx, &link)?;
    tx.commit()?;

    info!(
        user_id = %session.user_id,
        rival_id = link.id,
        status = link.status.as_str(),
        "added rival"
    );
    Ok(InviteOutcome {
        link,
        email: outgoing,
    })
}

/// Accepts a pending link. Only the participant who did not send it may.
pub fn accept_rival(conn: &Connection, session: &Session, link_id: i64) -> Result<RivalLink> {
    let mut link = db::load_rival(conn, link_id)?
        .filter(|link| link.other_participant(&session.user_id).is_some())
        .filter(|link| link.requested_by != session.user_id)
        .ok_or(FifadosError::RivalNotFound(link_id))?;
    if link.status == RivalStatus::Accepted {
        return Ok(link);
    }
    db::set_rival_status(conn, link_id, RivalStatus::Accepted)?;
    link.status = RivalStatus::Accepted;
    info!(user_id = %session.user_id, rival_id = link_id, "accepted rival");
    Ok(link)
}

pub fn list_rivals(conn: &Connection, session: &Session) -> Result<Vec<RivalLink>> {
    db::rivals_for(conn, &session.user_id)
}

/// The participant of `link` who is not `user_id`, from their current profile.
///
/// The link's stored name describes the invitee, which may be `user_id` itself,
/// so it is only used when the profile is gone.
fn counterpart(
    conn: &Connection,
    link: &RivalLink,
    user_id: &str,
) -> Result<Option<RivalSummary>> {
    let Some(other) = link.other_participant(user_id) else {
        return Ok(None);
    };
    let summary = match db::load_user(conn, other)? {
        Some(profile) => RivalSummary {
            user_id: profile.user_id,
            username: profile.username,
            email: profile.email,
        },
        None => RivalSummary {
            user_id: other.to_string(),
            username: link.username.clone(),
            email: link.email.clone(),
        },
    };
    Ok(Some(summary))
}

/// Every link of the session user, each naming the other participant.
pub fn rival_overview(conn: &Connection, session: &Session) -> Result<Vec<RivalOverview>> {
    let mut out = Vec::new();
    for link in db::rivals_for(conn, &session.user_id)? {
        if let Some(rival) = counterpart(conn, &link, &session.user_id)? {
            out.push(RivalOverview {
                link_id: link.id,
                status: link.status,
                requested_by: link.requested_by,
                rival,
            });
        }
    }
    Ok(out)
}

/// Accepted rivals, described from the session user's side.
pub fn accepted_rivals(conn: &Connection, session: &Session) -> Result<Vec<RivalSummary>> {
    let mut out = Vec::new();
    for link in db::rivals_for(conn, &session.user_id)? {
        if link.status != RivalStatus::Accepted {
            continue;
        }
        if let Some(summary) = counterpart(conn, &link, &session.user_id)? {
            out.push(summary);
        }
    }
    debug!(user_id = %session.user_id, count = out.len(), "accepted rivals");
    Ok(out)
}

/// Case-insensitive username substring search. An empty term keeps everything.
pub fn filter_rivals<'a>(rivals: &'a [RivalSummary], term: &str) -> Vec<&'a RivalSummary> {
    let needle = term.trim().to_lowercase();
    rivals
        .iter()
        .filter(|r| r.username.to_lowercase().contains(&needle))
        .collect()
}
