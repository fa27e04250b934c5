use std::env;
use std::path::PathBuf;

use tracing::warn;

use crate::db;
use crate::matches::DrawPolicy;

const DEFAULT_APP_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: Option<PathBuf>,
    pub app_url: String,
    pub draw_policy: DrawPolicy,
}

impl Config {
    /// Reads `FIFADOS_*` variables. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Self {
        let db_path = env::var("FIFADOS_DB")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .or_else(db::default_db_path);
        let app_url = env::var("FIFADOS_APP_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_APP_URL.to_string());
        let draw_policy = match env::var("FIFADOS_DRAW_POLICY") {
            Ok(raw) => parse_draw_policy(&raw),
            Err(_) => DrawPolicy::default(),
        };

        Self {
            db_path,
            app_url,
            draw_policy,
        }
    }
}

fn parse_draw_policy(raw: &str) -> DrawPolicy {
    DrawPolicy::parse(raw).unwrap_or_else(|| {
        warn!(value = raw, "unknown FIFADOS_DRAW_POLICY, using default");
        DrawPolicy::default()
    })
}
