use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One side of a recorded 1v1 match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSide {
    pub user_id: String,
    // Display name, when the record carries one. Stored matches do not; the
    // aggregator resolves names through a lookup instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub team: String,
    pub goals: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub id: String,
    pub date: String,
    pub participants: [String; 2],
    pub player1: PlayerSide,
    pub player2: PlayerSide,
    pub winner: String,
}

impl MatchRecord {
    pub fn goal_difference(&self) -> u32 {
        self.player1.goals.abs_diff(self.player2.goals)
    }

    /// The opponent of `user_id` in this match, if `user_id` played it.
    pub fn opponent_of(&self, user_id: &str) -> Option<&PlayerSide> {
        if self.player1.user_id == user_id {
            Some(&self.player2)
        } else if self.player2.user_id == user_id {
            Some(&self.player1)
        } else {
            None
        }
    }
}

/// Sorted pair, the shape used for membership queries and uniqueness checks.
pub fn sorted_pair(a: &str, b: &str) -> [String; 2] {
    if a <= b {
        [a.to_string(), b.to_string()]
    } else {
        [b.to_string(), a.to_string()]
    }
}

/// Stored timestamps are RFC 3339 UTC with millisecond precision, so they
/// sort lexically in chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Pending,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Pending => "pending",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(UserStatus::Active),
            "pending" => Some(UserStatus::Pending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub status: UserStatus,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RivalStatus {
    Pending,
    Accepted,
}

impl RivalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RivalStatus::Pending => "pending",
            RivalStatus::Accepted => "accepted",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(RivalStatus::Pending),
            "accepted" => Some(RivalStatus::Accepted),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RivalStatus::Pending => "Pendiente",
            RivalStatus::Accepted => "Conectado",
        }
    }
}

/// A rival relationship. `username`/`email` describe the invited user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RivalLink {
    pub id: i64,
    pub participants: [String; 2],
    pub status: RivalStatus,
    pub requested_by: String,
    pub created_at: String,
    pub username: String,
    pub email: String,
}

impl RivalLink {
    pub fn other_participant(&self, user_id: &str) -> Option<&str> {
        let [a, b] = &self.participants;
        if a == user_id {
            Some(b)
        } else if b == user_id {
            Some(a)
        } else {
            None
        }
    }
}

/// A rival as seen from the session user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RivalSummary {
    pub user_id: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: i64,
    pub email: String,
    pub invited_by: String,
    pub status: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side(user_id: &str, goals: u32) -> PlayerSide {
        PlayerSide {
            user_id: user_id.to_string(),
            username: None,
            team: "Team".to_string(),
            goals,
        }
    }

    #[test]
    fn sorted_pair_orders_lexically() {
        assert_eq!(sorted_pair("b", "a"), ["a".to_string(), "b".to_string()]);
        assert_eq!(sorted_pair("a", "b"), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn opponent_of_handles_both_sides_and_strangers() {
        let m = MatchRecord {
            id: "1".to_string(),
            date: "2024-01-01T00:00:00Z".to_string(),
            participants: sorted_pair("u1", "u2"),
            player1: side("u1", 3),
            player2: side("u2", 1),
            winner: "u1".to_string(),
        };
        assert_eq!(m.opponent_of("u1").map(|s| s.user_id.as_str()), Some("u2"));
        assert_eq!(m.opponent_of("u2").map(|s| s.user_id.as_str()), Some("u1"));
        assert!(m.opponent_of("u3").is_none());
        assert_eq!(m.goal_difference(), 2);
    }

    #[test]
    fn match_record_uses_camel_case_json() {
        let raw = r#"{"id":"m","date":"2024-01-01","participants":["a","b"],
            "player1":{"userId":"a","username":"Ana","team":"Boca","goals":2},
            "player2":{"userId":"b","team":"River","goals":1},"winner":"a"}"#;
        let m: MatchRecord = serde_json::from_str(raw).expect("valid match json");
        assert_eq!(m.player1.username.as_deref(), Some("Ana"));
        assert!(m.player2.username.is_none());
    }
}
