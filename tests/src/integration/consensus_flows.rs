//! # Consensus Flows
//!
//! Whole clusters of `CsBftNode`s deciding blocks over the in-memory
//! network:
//!
//! 1. **Happy path**: four honest verifiers commit consecutive heights
//! 2. **Missing proposer**: a silent proposer costs its round
//! 3. **Byzantine conflicting votes**: an equivocating verifier cannot split
//!    the honest ones or get its blocks committed
//! 4. **Committee rotation**: every commit is signed by the committee that
//!    owned its height

#[cfg(test)]
mod tests {
    use super::super::harness::{commit_signers, devnet_of, key_signers, CommitLog, HEIGHT_BUDGET};
    use cs_01_consensus_messages::{
        ConsensusMessage, MsgSigner, NewRoundMsg, SignableMessage, VoteMsg,
    };
    use cs_05_bft_state_machine::ChainReader;
    use shared_types::{keccak256, Block};
    use std::collections::HashSet;

    // =============================================================================
    // HAPPY PATH
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_four_verifiers_commit_consecutive_heights() {
        let keys = key_signers(4);
        let (devnet, _home) = devnet_of(&keys, |_| {});
        let mut log = CommitLog::new(devnet.network().subscribe_blocks());

        devnet.start();
        assert!(devnet.nodes().iter().all(|n| n.is_running()));
        assert!(devnet.wait_for_height(3, HEIGHT_BUDGET).await);

        let decided = log.check();
        for height in 1..=3 {
            let stored = devnet.chain().block_at(height).unwrap();
            assert_eq!(decided.get(&height), Some(&stored.hash()));

            let commits = devnet.chain().get_seen_commit(height);
            assert!(commits.len() >= 3, "height {height} has {} commits", commits.len());
            assert!(commits.iter().all(|v| v.block_id == stored.hash()));
            assert!(commits.iter().all(|v| v.valid().is_ok()));
        }
        devnet.stop();
    }

    // =============================================================================
    // MISSING PROPOSER
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_silent_proposer_round_times_out_and_next_proposer_commits() {
        let keys = key_signers(4);
        let (devnet, _home) = devnet_of(&keys, |_| {});
        // Height 1 opens at round 1, which belongs to the second verifier.
        let silent = keys[1].address();
        assert_eq!(devnet.chain().get_curr_verifiers()[1], silent);
        devnet.network().set_muted(silent, true);

        devnet.start();
        assert!(devnet.wait_for_height(1, HEIGHT_BUDGET).await);

        let commits = devnet.chain().get_seen_commit(1);
        assert!(!commits.is_empty());
        assert!(commits.iter().all(|v| v.round > 1));
        assert!(!commit_signers(&devnet, 1).contains(&silent));
        assert_ne!(devnet.chain().block_at(1).unwrap().producer, silent);
        devnet.stop();
    }

    // =============================================================================
    // BYZANTINE CONFLICTING VOTES
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_equivocating_verifier_cannot_split_honest_nodes() {
        let keys = key_signers(4);
        let (devnet, _home) = devnet_of(&keys, |_| {});
        let byzantine = &keys[0];
        devnet.network().set_muted(byzantine.address(), true);
        let mut log = CommitLog::new(devnet.network().subscribe_blocks());

        devnet.start();

        // Every honest node hears a different block from the Byzantine
        // verifier, in each of the first rounds of height 1.
        let mut bogus = HashSet::new();
        for round in 1..=3u64 {
            for (index, node) in devnet.nodes().iter().enumerate().skip(1) {
                let block_id = keccak256(&[round as u8, index as u8]);
                bogus.insert(block_id);
                let messages = vec![
                    ConsensusMessage::NewRound(NewRoundMsg::new(1, round).sign_with(byzantine).unwrap()),
                    ConsensusMessage::PreVote(
                        VoteMsg::pre_vote(1, round, block_id).sign_with(byzantine).unwrap(),
                    ),
                    ConsensusMessage::Vote(
                        VoteMsg::pre_commit(1, round, block_id).sign_with(byzantine).unwrap(),
                    ),
                ];
                for msg in messages {
                    node.on_new_p2p_msg(byzantine.address(), msg).await;
                }
            }
        }

        assert!(devnet.wait_for_height(2, HEIGHT_BUDGET).await);

        let decided = log.check().clone();
        for height in 1..=2 {
            let stored = devnet.chain().block_at(height).unwrap();
            assert!(!bogus.contains(&stored.hash()));
            assert_eq!(decided.get(&height), Some(&stored.hash()));

            let commits = devnet.chain().get_seen_commit(height);
            assert!(commits.len() >= 3);
            assert!(commits.iter().all(|v| v.block_id == stored.hash()));
            assert!(!commit_signers(&devnet, height).contains(&byzantine.address()));
        }
        devnet.stop();
    }

    // =============================================================================
    // COMMITTEE ROTATION
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_commits_follow_rotating_committee() {
        let keys = key_signers(5);
        let (devnet, _home) = devnet_of(&keys, |config| {
            config.verifier_number = 4;
            config.change_point_period = 2;
        });
        let mut log = CommitLog::new(devnet.network().subscribe_blocks());
        assert_ne!(devnet.chain().verifiers_at(1), devnet.chain().verifiers_at(2));

        devnet.start();
        // The fifth candidate waits for its first epoch.
        assert!(!devnet.nodes()[4].is_running());
        assert!(devnet.wait_for_height(5, HEIGHT_BUDGET).await);

        log.check();
        for height in 1..=5 {
            let committee = devnet.chain().verifiers_at(height);
            let signers = commit_signers(&devnet, height);
            assert!(signers.len() >= 3, "height {height} has {} signers", signers.len());
            assert!(
                signers.iter().all(|s| committee.contains(s)),
                "height {height} signed outside its committee"
            );
        }
        devnet.stop();
    }
}
