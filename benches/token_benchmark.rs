use criterion::{criterion_group, criterion_main, Criterion};
use otp_notes_api::routes::auth::{sign_state, verify_state};
use otp_notes_api::services::{otp, TokenIssuer, TokenKind};
use std::hint::black_box;

fn benchmark_tokens(c: &mut Criterion) {
    let issuer = TokenIssuer::new(
        b"bench_access_secret_32_bytes_min",
        b"bench_refresh_secret_32_bytes_mi",
    );
    let pair = issuer.issue("bench-user").expect("Failed to issue tokens");

    let mut group = c.benchmark_group("tokens");

    group.bench_function("issue_pair", |b| {
        b.iter(|| issuer.issue(black_box("bench-user")))
    });

    group.bench_function("verify_access", |b| {
        b.iter(|| issuer.verify(black_box(&pair.access_token), TokenKind::Access))
    });

    // Wrong key: the common failure path for a replayed access token.
    group.bench_function("reject_access_as_refresh", |b| {
        b.iter(|| issuer.verify(black_box(&pair.access_token), TokenKind::Refresh))
    });

    group.finish();
}

fn benchmark_otp_and_state(c: &mut Criterion) {
    let key = b"bench_oauth_state_key_32_bytes!!";
    let now = chrono::Utc::now();
    let state = sign_state(key, now).expect("Failed to sign state");

    let mut group = c.benchmark_group("otp_and_state");

    group.bench_function("generate_otp", |b| b.iter(otp::generate_otp));

    group.bench_function("codes_match", |b| {
        b.iter(|| otp::codes_match(black_box("482913"), black_box("482914")))
    });

    group.bench_function("verify_oauth_state", |b| {
        b.iter(|| verify_state(black_box(&state), key, now))
    });

    group.finish();
}

criterion_group!(benches, benchmark_tokens, benchmark_otp_and_state);
criterion_main!(benches);
