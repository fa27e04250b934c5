use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use rusqlite::Connection;

use fifados::accounts::{self, Session};
use fifados::config::Config;
use fifados::db;
use fifados::matches::{self, NewMatchForm};
use fifados::rivals;
use fifados::stats::StatsSummary;

const USAGE: &str = "\
usage: fifados [--db PATH] [--json] <command> [args]

commands:
  register <uid> <email> <username>
  complete-profile <uid> <username>
  invite <uid> <email>
  accept <uid> <link-id>
  rivals <uid> [search]
  record <uid> <rival-id> <my-team> <rival-team> <my-goals> <rival-goals>
  frequent <uid>
  stats <uid>";

struct Cli {
    db_path: Option<PathBuf>,
    json: bool,
    command: String,
    args: Vec<String>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(cli) = parse_args(std::env::args().skip(1).collect())? else {
        println!("{USAGE}");
        return Ok(());
    };
    let config = Config::from_env();
    let db_path = cli
        .db_path
        .clone()
        .or_else(|| config.db_path.clone())
        .context("unable to resolve sqlite path")?;
    let mut conn = db::open_db(&db_path)
        .with_context(|| format!("open database {}", db_path.display()))?;

    run(&mut conn, &config, &cli)
}

fn parse_args(raw: Vec<String>) -> Result<Option<Cli>> {
    let mut db_path = None;
    let mut json = false;
    let mut rest = Vec::new();
    let mut iter = raw.into_iter();
    while let Some(arg) = iter.next() {
        if let Some(path) = arg.strip_prefix("--db=") {
            db_path = Some(PathBuf::from(path.trim()));
        } else if arg == "--db" {
            let next = iter.next().context("--db needs a path")?;
            db_path = Some(PathBuf::from(next));
        } else if arg == "--json" {
            json = true;
        } else if arg == "-h" || arg == "--help" {
            return Ok(None);
        } else {
            rest.push(arg);
        }
    }
    if rest.is_empty() {
        return Ok(None);
    }
    let command = rest.remove(0);
    Ok(Some(Cli {
        db_path,
        json,
        command,
        args: rest,
    }))
}

fn arg<'a>(cli: &'a Cli, idx: usize, name: &str) -> Result<&'a str> {
    cli.args
        .get(idx)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing <{name}> for `{}`\n\n{USAGE}", cli.command))
}

fn session(conn: &Connection, cli: &Cli) -> Result<Session> {
    let uid = arg(cli, 0, "uid")?;
    accounts::login(conn, uid).with_context(|| format!("login as {uid}"))
}

fn run(conn: &mut Connection, config: &Config, cli: &Cli) -> Result<()> {
    let now = Utc::now();
    match cli.command.as_str() {
        "register" => {
            let s = accounts::register(
                conn,
                arg(cli, 0, "uid")?,
                arg(cli, 1, "email")?,
                arg(cli, 2, "username")?,
                now,
            )?;
            println!("Registered {} <{}>", s.username, s.email);
        }
        "complete-profile" => {
            let s = accounts::complete_profile(
                conn,
                arg(cli, 0, "uid")?,
                arg(cli, 1, "username")?,
                now,
            )?;
            println!("Profile completed for {}", s.username);
        }
        "invite" => {
            let s = session(conn, cli)?;
            let outcome =
                rivals::invite_rival(conn, &s, arg(cli, 1, "email")?, &config.app_url, now)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome.link)?);
            } else {
                println!(
                    "Rival #{} {} <{}>: {}",
                    outcome.link.id,
                    outcome.link.username,
                    outcome.link.email,
                    outcome.link.status.label()
                );
            }
            if let Some(mail) = outcome.email {
                println!("Invitation email for {}: {}", mail.to, mail.subject);
            }
        }
        "accept" => {
            let s = session(conn, cli)?;
            let id = arg(cli, 1, "link-id")?
                .parse::<i64>()
                .context("link id must be a number")?;
            let link = rivals::accept_rival(conn, &s, id)?;
            println!("Rival #{} {}", link.id, link.status.label());
        }
        "rivals" => {
            let s = session(conn, cli)?;
            match cli.args.get(1) {
                Some(term) => {
                    let accepted = rivals::accepted_rivals(conn, &s)?;
                    let found = rivals::filter_rivals(&accepted, term);
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&found)?);
                    } else {
                        for r in found {
                            println!("{}  {} <{}>", r.user_id, r.username, r.email);
                        }
                    }
                }
                None => {
                    let overview = rivals::rival_overview(conn, &s)?;
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&overview)?);
                    } else if overview.is_empty() {
                        println!("No rivals yet");
                    } else {
                        for entry in overview {
                            println!(
                                "#{:<4} {} <{}>  {}",
                                entry.link_id,
                                entry.rival.username,
                                entry.rival.email,
                                entry.status.label()
                            );
                        }
                    }
                }
            }
        }
        "record" => {
            let s = session(conn, cli)?;
            let form = NewMatchForm {
                rival_id: arg(cli, 1, "rival-id")?.to_string(),
                my_team: arg(cli, 2, "my-team")?.to_string(),
                rival_team: arg(cli, 3, "rival-team")?.to_string(),
                my_goals: arg(cli, 4, "my-goals")?.to_string(),
                rival_goals: arg(cli, 5, "rival-goals")?.to_string(),
            };
            let record = matches::record_match(conn, &s, &form, config.draw_policy, now)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!(
                    "Match #{}: {} {} - {} {}",
                    record.id,
                    record.player1.team,
                    record.player1.goals,
                    record.player2.goals,
                    record.player2.team
                );
            }
        }
        "frequent" => {
            let s = session(conn, cli)?;
            let frequent = matches::frequent_rivals(conn, &s)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&frequent)?);
            } else {
                for r in frequent {
                    println!("{}  {}", r.user_id, r.username);
                }
            }
        }
        "stats" => {
            let s = session(conn, cli)?;
            match matches::personal_stats(conn, &s)? {
                None => println!("No matches recorded yet"),
                Some(summary) if cli.json => {
                    println!("{}", serde_json::to_string_pretty(&summary)?)
                }
                Some(summary) => print_stats(&summary),
            }
        }
        other => bail!("unknown command `{other}`\n\n{USAGE}"),
    }
    Ok(())
}

fn print_stats(s: &StatsSummary) {
    println!("Matches: {}", s.total_matches);
    println!("Wins: {}", s.wins);
    println!("Losses: {}", s.losses);
    println!("Win rate: {:.1}%", s.win_rate());
    println!(
        "Most used team: {} ({} matches)",
        s.most_used_team.team, s.most_used_team.count
    );
    println!(
        "Most frequent rival: {} ({} matches)",
        s.most_frequent_opponent.username, s.most_frequent_opponent.count
    );
    println!(
        "Most wins against: {} ({})",
        s.most_wins_against.username, s.most_wins_against.count
    );
    println!(
        "Most losses against: {} ({})",
        s.most_losses_against.username, s.most_losses_against.count
    );
    println!(
        "Biggest goal difference: {} vs {}",
        s.biggest_goal_difference.difference, s.biggest_goal_difference.opponent
    );
    println!(
        "Most goals in a match: {} on {}",
        s.most_goals_in_match.goals, s.most_goals_in_match.match_record.date
    );
    println!("Goals progression:");
    for point in &s.goals_progression {
        println!("  {}  {}", point.date, point.goals);
    }
}
