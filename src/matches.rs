use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::accounts::Session;
use crate::db;
use crate::error::{FifadosError, Result};
use crate::model::{MatchRecord, PlayerSide, RivalSummary, format_timestamp, sorted_pair};
use crate::stats::{self, FrequencyTable, StatsSummary};

/// How many recent matches feed the frequent-rival shortlist.
pub const RECENT_MATCH_WINDOW: usize = 20;
pub const FREQUENT_RIVALS_MAX: usize = 6;

/// What to do when both players scored the same number of goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawPolicy {
    /// Refuse to record the match.
    #[default]
    Reject,
    /// Award the match to the rival (player2), as older clients did.
    RivalWins,
}

impl DrawPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "reject" => Some(DrawPolicy::Reject),
            "rival-wins" | "rival_wins" => Some(DrawPolicy::RivalWins),
            _ => None,
        }
    }
}

/// Match entry as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct NewMatchForm {
    pub rival_id: String,
    pub my_team: String,
    pub rival_team: String,
    pub my_goals: String,
    pub rival_goals: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedMatch {
    pub rival_id: String,
    pub my_team: String,
    pub rival_team: String,
    pub my_goals: u32,
    pub rival_goals: u32,
}

impl NewMatchForm {
    pub fn validate(&self) -> Result<ValidatedMatch> {
        let fields = [
            &self.rival_id,
            &self.my_team,
            &self.rival_team,
            &self.my_goals,
            &self.rival_goals,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(FifadosError::AllFieldsRequired);
        }
        Ok(ValidatedMatch {
            rival_id: self.rival_id.trim().to_string(),
            my_team: self.my_team.trim().to_string(),
            rival_team: self.rival_team.trim().to_string(),
            my_goals: parse_goals(&self.my_goals)?,
            rival_goals: parse_goals(&self.rival_goals)?,
        })
    }
}

fn parse_goals(raw: &str) -> Result<u32> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| FifadosError::InvalidGoals(raw.to_string()))
}

/// Winner id for a validated entry, or `DrawNotAllowed`.
pub fn decide_winner(
    me: &str,
    entry: &ValidatedMatch,
    policy: DrawPolicy,
) -> Result<String> {
    if entry.my_goals > entry.rival_goals {
        return Ok(me.to_string());
    }
    if entry.my_goals < entry.rival_goals {
        return Ok(entry.rival_id.clone());
    }
    match policy {
        DrawPolicy::Reject => Err(FifadosError::DrawNotAllowed),
        DrawPolicy::RivalWins => Ok(entry.rival_id.clone()),
    }
}

/// Records a match with the session user as player1.
pub fn record_match(
    conn: &Connection,
    session: &Session,
    form: &NewMatchForm,
    policy: DrawPolicy,
    now: DateTime<Utc>,
) -> Result<MatchRecord> {
    let entry = form.validate()?;
    if entry.rival_id == session.user_id {
        return Err(FifadosError::SelfInvite);
    }
    if db::load_user(conn, &entry.rival_id)?.is_none() {
        return Err(FifadosError::UserNotFound(entry.rival_id));
    }
    let winner = decide_winner(&session.user_id, &entry, policy)?;

    let mut record = MatchRecord {
        id: String::new(),
        date: format_timestamp(now),
        participants: sorted_pair(&session.user_id, &entry.rival_id),
        player1: PlayerSide {
            user_id: session.user_id.clone(),
            username: None,
            team: entry.my_team,
            goals: entry.my_goals,
        },
        player2: PlayerSide {
            user_id: entry.rival_id,
            username: None,
            team: entry.rival_team,
            goals: entry.rival_goals,
        },
        winner,
    };
    record.id = db::insert_match(conn, &record)?.to_string();
    info!(
        match_id = %record.id,
        player1 = %record.player1.user_id,
        player2 = %record.player2.user_id,
        score = %format!("{}-{}", record.player1.goals, record.player2.goals),
        "recorded match"
    );
    Ok(record)
}

/// Opponent ids from recent matches, most frequent first. Ties keep the
/// order in which opponents were first seen (most recent first).
pub fn frequent_opponent_ids(recent: &[MatchRecord], me: &str, max: usize) -> Vec<String> {
    let mut counts = FrequencyTable::default();
    for m in recent {
        if let Some(opponent) = m.opponent_of(me) {
            counts.bump(&opponent.user_id);
        }
    }
    let mut ranked: Vec<(&str, u32)> = counts.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
        .into_iter()
        .take(max)
        .map(|(id, _)| id.to_string())
        .collect()
}

/// Shortlist of rivals played most often in the last few matches.
pub fn frequent_rivals(conn: &Connection, session: &Session) -> Result<Vec<RivalSummary>> {
    let recent = db::load_recent_matches_for(conn, &session.user_id, RECENT_MATCH_WINDOW)?;
    let ids = frequent_opponent_ids(&recent, &session.user_id, FREQUENT_RIVALS_MAX);
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        let Some(profile) = db::load_user(conn, &id)? else {
            debug!(user_id = %id, "skipping frequent rival without profile");
            continue;
        };
        out.push(RivalSummary {
            user_id: profile.user_id,
            username: profile.username,
            email: profile.email,
        });
    }
    Ok(out)
}

/// Statistics for the session user, or `None` before their first match.
pub fn personal_stats(conn: &Connection, session: &Session) -> Result<Option<StatsSummary>> {
    let matches = db::load_matches_for(conn, &session.user_id)?;
    if matches.is_empty() {
        return Ok(None);
    }
    let ids: Vec<&str> = matches
        .iter()
        .flat_map(|m| [m.player1.user_id.as_str(), m.player2.user_id.as_str()])
        .collect();
    let names = db::username_directory(conn, &ids)?;
    let summary = stats::aggregate_with(&matches, &session.user_id, &names)?;
    debug!(
        user_id = %session.user_id,
        total = summary.total_matches,
        "computed stats"
    );
    Ok(Some(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(my: &str, rival: &str) -> NewMatchForm {
        NewMatchForm {
            rival_id: "r".to_string(),
            my_team: "Boca".to_string(),
            rival_team: "River".to_string(),
            my_goals: my.to_string(),
            rival_goals: rival.to_string(),
        }
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut f = form("1", "0");
        f.my_team = "  ".to_string();
        assert!(matches!(f.validate(), Err(FifadosError::AllFieldsRequired)));
    }

    #[test]
    fn goals_must_be_non_negative_integers() {
        assert!(matches!(
            form("-1", "0").validate(),
            Err(FifadosError::InvalidGoals(_))
        ));
        assert!(matches!(
            form("2", "x").validate(),
            Err(FifadosError::InvalidGoals(_))
        ));
        assert_eq!(form(" 3 ", "0").validate().expect("valid").my_goals, 3);
    }

    #[test]
    fn winner_follows_score_and_draw_policy() {
        let win = form("2", "1").validate().expect("valid");
        let loss = form("0", "1").validate().expect("valid");
        let draw = form("1", "1").validate().expect("valid");
        assert_eq!(decide_winner("me", &win, DrawPolicy::Reject).expect("winner"), "me");
        assert_eq!(decide_winner("me", &loss, DrawPolicy::Reject).expect("winner"), "r");
        assert!(matches!(
            decide_winner("me", &draw, DrawPolicy::Reject),
            Err(FifadosError::DrawNotAllowed)
        ));
        assert_eq!(
            decide_winner("me", &draw, DrawPolicy::RivalWins).expect("winner"),
            "r"
        );
    }

    #[test]
    fn draw_policy_parses_both_spellings() {
        assert_eq!(DrawPolicy::parse("rival_wins"), Some(DrawPolicy::RivalWins));
        assert_eq!(DrawPolicy::parse("REJECT"), Some(DrawPolicy::Reject));
        assert_eq!(DrawPolicy::parse(""), None);
    }
}
