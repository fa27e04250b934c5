use std::collections::HashMap;

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use fifados::model::{MatchRecord, PlayerSide, sorted_pair};
use fifados::stats::{aggregate, aggregate_with};

const TEAMS: [&str; 5] = ["Boca", "River", "Racing", "Real Madrid", "Barcelona"];

fn history(len: u32, opponents: u32) -> Vec<MatchRecord> {
    (0..len)
        .map(|idx| {
            let opponent = format!("rival-{}", idx % opponents);
            let mine = (idx * 7) % 6;
            let theirs = (idx * 5) % 4;
            MatchRecord {
                id: idx.to_string(),
                date: format!("2024-{:02}-{:02}T20:00:00.000Z", idx % 12 + 1, idx % 28 + 1),
                participants: sorted_pair("me", &opponent),
                player1: PlayerSide {
                    user_id: "me".to_string(),
                    username: None,
                    team: TEAMS[(idx as usize) % TEAMS.len()].to_string(),
                    goals: mine,
                },
                player2: PlayerSide {
                    user_id: opponent.clone(),
                    username: Some(format!("Rival {}", idx % opponents)),
                    team: "Rival FC".to_string(),
                    goals: theirs,
                },
                winner: if mine > theirs { "me".to_string() } else { opponent },
            }
        })
        .collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let matches = history(500, 12);
    c.bench_function("aggregate_500_matches", |b| {
        b.iter(|| {
            let summary = aggregate(black_box(&matches), black_box("me")).unwrap();
            black_box(summary.total_matches);
        })
    });
}

fn bench_aggregate_with_lookup(c: &mut Criterion) {
    let matches = history(500, 12);
    let names: HashMap<String, String> = (0..12)
        .map(|idx| (format!("rival-{idx}"), format!("Directory {idx}")))
        .collect();
    c.bench_function("aggregate_500_matches_lookup", |b| {
        b.iter(|| {
            let summary = aggregate_with(black_box(&matches), "me", &names).unwrap();
            black_box(summary.wins);
        })
    });
}

criterion_group!(benches, bench_aggregate, bench_aggregate_with_lookup);
criterion_main!(benches);
