//! # CS-BFT Message Benchmarks
//!
//! Every round message is signed once by its sender and checked by every
//! receiver, so these paths run on each vote.
//!
//! | Path | Per message |
//! |------|-------------|
//! | `content_hash` | bincode + Keccak256 |
//! | `sign_with` | content hash + secp256k1 sign |
//! | `valid` | content hash + public key recovery |

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cs_01_consensus_messages::{KeyPairSigner, SignableMessage, VoteMsg};
use shared_types::keccak256;

fn bench_vote_signing(c: &mut Criterion) {
    let mut group = c.benchmark_group("cs-01-messages");
    let signer = KeyPairSigner::generate();
    let vote = VoteMsg::pre_vote(42, 3, keccak256(b"bench block"));
    let signed = vote.clone().sign_with(&signer).unwrap();

    group.bench_function("content_hash", |b| {
        b.iter(|| black_box(&vote).content_hash())
    });
    group.bench_function("sign_with", |b| {
        b.iter(|| black_box(vote.clone()).sign_with(&signer).unwrap())
    });
    group.bench_function("valid", |b| b.iter(|| black_box(&signed).valid().unwrap()));

    group.finish();
}

criterion_group!(benches, bench_vote_signing);
criterion_main!(benches);
