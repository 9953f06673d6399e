// Criterion benchmarks for founder match scoring

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use founder_match::core::{calculate_skill_points, industry_signal, Matcher};
use founder_match::models::{Availability, Commitment, Industry, Stage, StartupPosting, TalentProfile};
use chrono::Utc;
use std::collections::BTreeSet;

const SKILLS: [&str; 12] = [
    "react", "node.js", "python", "rust", "sql", "design", "sales", "marketing", "go", "figma",
    "kubernetes", "finance",
];

fn create_talent(id: usize) -> TalentProfile {
    TalentProfile {
        talent_id: format!("talent_{}", id),
        name: None,
        skills: (0..4).map(|k| SKILLS[(id + k * 3) % SKILLS.len()].to_string()).collect(),
        availability: Availability::FullTime,
        commitment: Commitment::Employee,
        bio: format!(
            "Engineer with {} years in fintech and healthcare, building cloud software for startups",
            id % 15
        ),
        updated_at: None,
    }
}

fn create_startup(id: usize) -> StartupPosting {
    StartupPosting {
        startup_id: format!("startup_{}", id),
        founder_id: format!("founder_{}", id % 7),
        name: format!("Startup {}", id),
        industry: Industry::ALL[id % Industry::ALL.len()],
        stage: Stage::ALL[id % Stage::ALL.len()],
        skills_needed: (0..3).map(|k| SKILLS[(id * 5 + k) % SKILLS.len()].to_string()).collect(),
        description: None,
        created_at: Utc::now(),
    }
}

fn bench_skill_points(c: &mut Criterion) {
    let talent = create_talent(1);
    let startup = create_startup(1);

    c.bench_function("skill_points", |b| {
        b.iter(|| calculate_skill_points(black_box(&talent.skills), black_box(&startup.skills_needed)));
    });
}

fn bench_industry_signal(c: &mut Criterion) {
    let talent = create_talent(3);

    c.bench_function("industry_signal", |b| {
        b.iter(|| industry_signal(black_box(&talent), black_box(Industry::Finance)));
    });
}

fn bench_score_pair(c: &mut Criterion) {
    let matcher = Matcher::default();
    let talent = create_talent(2);
    let startup = create_startup(2);

    c.bench_function("score_pair", |b| {
        b.iter(|| matcher.score(black_box(&talent), black_box(&startup)));
    });
}

fn bench_cross_product(c: &mut Criterion) {
    let matcher = Matcher::default();
    let mut group = c.benchmark_group("score_pairs");

    for size in [10, 50, 100].iter() {
        let talents: Vec<TalentProfile> = (0..*size).map(create_talent).collect();
        let startups: Vec<StartupPosting> = (0..*size).map(create_startup).collect();

        group.bench_with_input(BenchmarkId::new("cross_product", size), size, |b, _| {
            b.iter(|| matcher.score_pairs(black_box(&talents), black_box(&startups)));
        });
    }

    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let matcher = Matcher::default();
    let talent = create_talent(4);
    let matched = BTreeSet::new();
    let mut group = c.benchmark_group("fan_out");

    for candidate_count in [100, 500, 1000].iter() {
        let candidates: Vec<StartupPosting> = (0..*candidate_count).map(create_startup).collect();

        group.bench_with_input(
            BenchmarkId::new("score_startup_candidates", candidate_count),
            candidate_count,
            |b, _| {
                b.iter(|| matcher.score_startup_candidates(black_box(&talent), black_box(&candidates), &matched));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_skill_points,
    bench_industry_signal,
    bench_score_pair,
    bench_cross_product,
    bench_fan_out
);

criterion_main!(benches);
