//! NewRound bookkeeping.

use super::two_thirds_majority;
use cs_01_consensus_messages::{MessageError, MessageResult, NewRoundMsg, SignableMessage};
use shared_types::Address;
use std::collections::{BTreeMap, HashMap};

/// NewRound messages of one height, first message per `(round, verifier)`.
#[derive(Debug, Clone, Default)]
pub struct NewRoundSet {
    height: u64,
    verifiers: Vec<Address>,
    rounds: BTreeMap<u64, HashMap<Address, NewRoundMsg>>,
    maj32: u64,
}

impl NewRoundSet {
    pub fn new(height: u64, verifiers: Vec<Address>) -> Self {
        Self {
            height,
            verifiers,
            rounds: BTreeMap::new(),
            maj32: 0,
        }
    }

    /// Record `msg`. A repeat from the same verifier for the same round is
    /// accepted and ignored.
    pub fn add(&mut self, msg: &NewRoundMsg) -> MessageResult<()> {
        if msg.height != self.height {
            return Err(MessageError::WrongHeight {
                expected: self.height,
                actual: msg.height,
            });
        }
        msg.valid()?;
        let signer = msg.signer().ok_or(MessageError::MissingWitness)?;
        if !self.verifiers.contains(&signer) {
            return Err(MessageError::NotCurrentVerifier(signer));
        }

        self.rounds
            .entry(msg.round)
            .or_default()
            .entry(signer)
            .or_insert_with(|| msg.clone());

        if msg.round > self.maj32 && self.enough_at_round(msg.round) {
            self.maj32 = msg.round;
        }
        Ok(())
    }

    /// Strictly more than two thirds of the verifiers announced `round`.
    pub fn enough_at_round(&self, round: u64) -> bool {
        !self.verifiers.is_empty()
            && self.count_at_round(round) >= two_thirds_majority(self.verifiers.len())
    }

    pub fn count_at_round(&self, round: u64) -> usize {
        self.rounds.get(&round).map_or(0, HashMap::len)
    }

    /// Highest round announced by more than two thirds of the verifiers.
    pub fn maj32(&self) -> u64 {
        self.maj32
    }

    /// Verifiers with no NewRound for `round`, in verifier order.
    pub fn missing_at_round(&self, round: u64) -> Vec<Address> {
        let seen = self.rounds.get(&round);
        self.verifiers
            .iter()
            .filter(|v| seen.map_or(true, |msgs| !msgs.contains_key(v)))
            .copied()
            .collect()
    }
}
