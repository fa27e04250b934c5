//! Personal statistics derived from a subject's match history.
//!
//! [`aggregate`] folds an ascending-by-date list of matches into a
//! [`StatsSummary`] in a single pass. The summary is recomputed on demand and
//! never stored.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use thiserror::Error;

use crate::model::{MatchRecord, PlayerSide};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInputError {
    #[error("no matches to aggregate")]
    Empty,
    #[error("subject {subject} is not on exactly one side of match {match_id}")]
    SubjectMismatch { match_id: String, subject: String },
}

/// Resolves a user id to a display name.
pub trait UsernameLookup {
    fn username(&self, user_id: &str) -> Option<&str>;
}

impl UsernameLookup for HashMap<String, String> {
    fn username(&self, user_id: &str) -> Option<&str> {
        self.get(user_id).map(String::as_str)
    }
}

/// Lookup that knows nobody; names come from the records themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedNames;

impl UsernameLookup for EmbeddedNames {
    fn username(&self, _user_id: &str) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamCount {
    pub team: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpponentCount {
    pub username: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalDifference {
    pub opponent: String,
    pub difference: u32,
    #[serde(rename = "match")]
    pub match_record: MatchRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalsInMatch {
    pub goals: u32,
    #[serde(rename = "match")]
    pub match_record: MatchRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressionPoint {
    pub date: String,
    pub goals: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total_matches: u32,
    pub wins: u32,
    pub losses: u32,
    pub most_used_team: TeamCount,
    pub most_frequent_opponent: OpponentCount,
    pub most_wins_against: OpponentCount,
    pub most_losses_against: OpponentCount,
    pub biggest_goal_difference: GoalDifference,
    pub most_goals_in_match: GoalsInMatch,
    pub goals_progression: Vec<ProgressionPoint>,
}

impl StatsSummary {
    /// Share of matches won, as a percentage.
    pub fn win_rate(&self) -> f64 {
        if self.total_matches == 0 {
            return 0.0;
        }
        (self.wins as f64) / (self.total_matches as f64) * 100.0
    }
}

/// Insertion-ordered counter. Iteration order is first-seen order, which is
/// what the first-wins tie-break relies on.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    entries: Vec<(String, u32)>,
    index: HashMap<String, usize>,
}

impl FrequencyTable {
    pub fn bump(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&idx) => self.entries[idx].1 += 1,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), 1));
            }
        }
    }

    pub fn get(&self, key: &str) -> u32 {
        self.index
            .get(key)
            .map(|&idx| self.entries[idx].1)
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(k, c)| (k.as_str(), *c))
    }

    /// Highest count, first-seen on ties; `("", 0)` when empty.
    pub fn leader(&self) -> (String, u32) {
        let (key, count) = argmax_first(self.iter());
        (key.to_string(), count)
    }
}

/// Argmax with a strict `>`: a later entry only wins with a larger count.
pub fn argmax_first<'a, I>(entries: I) -> (&'a str, u32)
where
    I: IntoIterator<Item = (&'a str, u32)>,
{
    entries
        .into_iter()
        .fold(("", 0), |best, (key, count)| {
            if count > best.1 { (key, count) } else { best }
        })
}

pub fn aggregate(
    matches: &[MatchRecord],
    subject: &str,
) -> Result<StatsSummary, InvalidInputError> {
    aggregate_with(matches, subject, &EmbeddedNames)
}

/// Like [`aggregate`], resolving opponent names through `names` first, then
/// any name embedded in the record, then the raw user id.
pub fn aggregate_with<L>(
    matches: &[MatchRecord],
    subject: &str,
    names: &L,
) -> Result<StatsSummary, InvalidInputError>
where
    L: UsernameLookup + ?Sized,
{
    let first = matches.first().ok_or(InvalidInputError::Empty)?;

    let mut wins = 0u32;
    let mut losses = 0u32;
    let mut teams = FrequencyTable::default();
    let mut opponents = FrequencyTable::default();
    let mut wins_against = FrequencyTable::default();
    let mut losses_against = FrequencyTable::default();
    let mut biggest = GoalDifference {
        opponent: String::new(),
        difference: 0,
        match_record: first.clone(),
    };
    let mut most_goals = GoalsInMatch {
        goals: 0,
        match_record: first.clone(),
    };
    let mut progression = Vec::with_capacity(matches.len());

    for m in matches {
        let (player, opponent) = split_sides(m, subject)?;
        let opponent_name = resolve_name(opponent, names);
        let won = m.winner == subject;

        if won {
            wins += 1;
            wins_against.bump(&opponent_name);
        } else {
            losses += 1;
            losses_against.bump(&opponent_name);
        }
        teams.bump(&player.team);
        opponents.bump(&opponent_name);

        let difference = m.goal_difference();
        if difference > biggest.difference {
            biggest = GoalDifference {
                opponent: opponent_name.clone(),
                difference,
                match_record: m.clone(),
            };
        }

        if player.goals > most_goals.goals {
            most_goals = GoalsInMatch {
                goals: player.goals,
                match_record: m.clone(),
            };
        }

        progression.push(ProgressionPoint {
            date: display_date(&m.date),
            goals: player.goals,
        });
    }

    let (team, team_count) = teams.leader();
    Ok(StatsSummary {
        total_matches: wins + losses,
        wins,
        losses,
        most_used_team: TeamCount {
            team,
            count: team_count,
        },
        most_frequent_opponent: opponent_count(&opponents),
        most_wins_against: opponent_count(&wins_against),
        most_losses_against: opponent_count(&losses_against),
        biggest_goal_difference: biggest,
        most_goals_in_match: most_goals,
        goals_progression: progression,
    })
}

fn split_sides<'a>(
    m: &'a MatchRecord,
    subject: &str,
) -> Result<(&'a PlayerSide, &'a PlayerSide), InvalidInputError> {
    let is_player1 = m.player1.user_id == subject;
    let is_player2 = m.player2.user_id == subject;
    match (is_player1, is_player2) {
        (true, false) => Ok((&m.player1, &m.player2)),
        (false, true) => Ok((&m.player2, &m.player1)),
        _ => Err(InvalidInputError::SubjectMismatch {
            match_id: m.id.clone(),
            subject: subject.to_string(),
        }),
    }
}

fn resolve_name<L>(side: &PlayerSide, names: &L) -> String
where
    L: UsernameLookup + ?Sized,
{
    names
        .username(&side.user_id)
        .or(side.username.as_deref())
        .unwrap_or(side.user_id.as_str())
        .to_string()
}

fn opponent_count(table: &FrequencyTable) -> OpponentCount {
    let (username, count) = table.leader();
    OpponentCount { username, count }
}

/// Calendar date for chart labels. Unparseable dates are shown as stored.
fn display_date(raw: &str) -> String {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.date_naive().format("%Y-%m-%d").to_string();
    }
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return day.format("%Y-%m-%d").to_string();
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_keeps_first_on_ties() {
        let entries = vec![("a", 2), ("b", 3), ("c", 3), ("d", 1)];
        assert_eq!(argmax_first(entries), ("b", 3));
    }

    #[test]
    fn argmax_of_nothing_is_sentinel() {
        assert_eq!(argmax_first(Vec::new()), ("", 0));
    }

    #[test]
    fn frequency_table_preserves_first_seen_order() {
        let mut table = FrequencyTable::default();
        table.bump("Boca");
        table.bump("River");
        table.bump("River");
        table.bump("Boca");
        assert_eq!(table.get("Boca"), 2);
        assert_eq!(table.get("Racing"), 0);
        assert_eq!(table.leader(), ("Boca".to_string(), 2));
        let keys: Vec<&str> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Boca", "River"]);
    }

    #[test]
    fn empty_table_reports_through_leader() {
        let table = FrequencyTable::default();
        assert_eq!(table.leader(), (String::new(), 0));
        assert_eq!(table.iter().count(), 0);
    }

    #[test]
    fn display_date_accepts_rfc3339_and_plain_dates() {
        assert_eq!(display_date("2024-03-05T21:10:00.000Z"), "2024-03-05");
        assert_eq!(display_date("2024-03-05"), "2024-03-05");
        assert_eq!(display_date("yesterday"), "yesterday");
    }
}
