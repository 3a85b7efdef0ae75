//! Commit-reveal pipeline for provably fair draws.
//!
//! Every round is bound to a reveal value before it opens for bets. Only the commitment is
//! published while betting is open; the reveal is disclosed with the outcome.
//!
//! ## Commit-Reveal Flow
//!
//! 1. **Generate** - When a round is created, derive its reveal and commitment
//! 2. **Commit** - Publish the commitment in every snapshot of the open round
//! 3. **Reveal** - Seed the draw from the reveal when the round resolves
//! 4. **Verify** - Anyone can check `hash(reveal) == commit` and replay the draw
//!
//! ## Hash Chain
//!
//! Reveals for sequential rounds come from a server-side master secret:
//! ```text
//! reveal[n] = hash(master_secret || round_id)
//! commit[n] = hash(reveal[n])
//! ```

use colorpot_types::{RoundRecord, COMMITMENT_LEN};
use commonware_cryptography::sha256::Sha256;
use commonware_cryptography::Hasher;
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::{resolver, Pool};

/// A commit-reveal pair bound to one round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitRevealPair {
    /// Hash of the reveal. Published while the round is open.
    pub commit: [u8; COMMITMENT_LEN],
    /// Pre-image of the commit. Disclosed with the outcome.
    pub reveal: [u8; COMMITMENT_LEN],
}

impl CommitRevealPair {
    /// Verify that the commit matches hash(reveal).
    pub fn verify(&self) -> bool {
        verify_commit_reveal(&self.commit, &self.reveal)
    }
}

/// Compute a commitment from a reveal value.
///
/// Uses SHA256: `commit = hash(reveal)`
pub fn compute_commit(reveal: &[u8; COMMITMENT_LEN]) -> [u8; COMMITMENT_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(reveal);
    hasher.finalize().0
}

/// Returns `true` if `commit == hash(reveal)`.
pub fn verify_commit_reveal(commit: &[u8; COMMITMENT_LEN], reveal: &[u8; COMMITMENT_LEN]) -> bool {
    let expected_commit = compute_commit(reveal);
    commit == &expected_commit
}

/// Deterministic generator for a round's draw.
///
/// ChaCha20 keeps the stream stable across platforms and releases, so published reveals can be
/// replayed by third parties.
pub fn draw_rng(reveal: &[u8; COMMITMENT_LEN]) -> ChaCha20Rng {
    ChaCha20Rng::from_seed(*reveal)
}

/// Recompute the draw a round with `bank` would take from `reveal`.
pub fn replay_draw(reveal: &[u8; COMMITMENT_LEN], bank: u64) -> Result<u64, crate::EngineError> {
    resolver::sample_draw(&mut draw_rng(reveal), bank)
}

/// Errors raised when an archived round fails verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitRevealError {
    /// The round closed without participants; there is nothing to verify.
    Voided,
    /// Commit-reveal verification failed (hash mismatch).
    VerificationFailed,
    /// Replaying the reveal gives a different draw.
    DrawMismatch { expected: u64, recorded: u64 },
    /// The recorded winner is not the stake the draw selects.
    WinnerMismatch,
    /// Recorded bank disagrees with the archived stakes.
    BankMismatch { expected: u64, recorded: u64 },
}

impl std::fmt::Display for CommitRevealError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Voided => write!(f, "round was voided"),
            Self::VerificationFailed => write!(f, "commit-reveal verification failed"),
            Self::DrawMismatch { expected, recorded } => {
                write!(f, "draw mismatch: replayed {expected}, recorded {recorded}")
            }
            Self::WinnerMismatch => write!(f, "winner does not match replayed draw"),
            Self::BankMismatch { expected, recorded } => {
                write!(f, "bank mismatch: stakes sum to {expected}, recorded {recorded}")
            }
        }
    }
}

impl std::error::Error for CommitRevealError {}

/// Check an archived round end to end: commitment, draw, bank and winner.
pub fn verify_record(record: &RoundRecord) -> Result<(), CommitRevealError> {
    let outcome = record.outcome.as_ref().ok_or(CommitRevealError::Voided)?;
    if !verify_commit_reveal(&record.commit, &outcome.reveal) {
        return Err(CommitRevealError::VerificationFailed);
    }

    let pool = Pool::from_stakes(record.stakes.iter().cloned())
        .map_err(|_| CommitRevealError::WinnerMismatch)?;
    if pool.bank() != outcome.bank {
        return Err(CommitRevealError::BankMismatch {
            expected: pool.bank(),
            recorded: outcome.bank,
        });
    }

    let expected = replay_draw(&outcome.reveal, pool.bank())
        .map_err(|_| CommitRevealError::WinnerMismatch)?;
    if expected != outcome.draw_value {
        return Err(CommitRevealError::DrawMismatch {
            expected,
            recorded: outcome.draw_value,
        });
    }

    let (_, winner) =
        resolver::resolve(&pool, expected).map_err(|_| CommitRevealError::WinnerMismatch)?;
    if winner != &outcome.winning_stake {
        return Err(CommitRevealError::WinnerMismatch);
    }
    Ok(())
}

/// Hash chain state for generating per-round commit-reveal pairs.
#[derive(Clone)]
pub struct HashChain {
    master_secret: [u8; COMMITMENT_LEN],
}

impl HashChain {
    /// Create a hash chain from an explicit master secret.
    pub fn from_secret(master_secret: [u8; COMMITMENT_LEN]) -> Self {
        Self { master_secret }
    }

    /// Create a hash chain with a fresh secret from a cryptographic generator.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut master_secret = [0u8; COMMITMENT_LEN];
        rng.fill_bytes(&mut master_secret);
        Self { master_secret }
    }

    /// Independent chain for one table, so tables sharing a master secret never share reveals.
    pub fn for_table(&self, currency: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(&self.master_secret);
        hasher.update(b"table");
        hasher.update(currency.as_bytes());
        Self {
            master_secret: hasher.finalize().0,
        }
    }

    /// Generate the commit-reveal pair for a round.
    pub fn generate(&self, round_id: u64) -> CommitRevealPair {
        let reveal = self.derive_reveal(round_id);
        let commit = compute_commit(&reveal);
        CommitRevealPair { commit, reveal }
    }

    /// Derive just the reveal value for a round.
    pub fn derive_reveal(&self, round_id: u64) -> [u8; COMMITMENT_LEN] {
        let mut hasher = Sha256::new();
        hasher.update(&self.master_secret);
        hasher.update(&round_id.to_be_bytes());
        hasher.update(b"reveal"); // Domain separator
        hasher.finalize().0
    }
}

impl std::fmt::Debug for HashChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashChain").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colorpot_types::{Outcome, Stake};
    use rand::rngs::StdRng;

    fn chain() -> HashChain {
        HashChain::from_secret([7u8; COMMITMENT_LEN])
    }

    fn stakes() -> Vec<Stake> {
        vec![
            Stake {
                user_id: "alice".into(),
                color_label: "red".into(),
                amount: 40,
                placed_at_sequence: 0,
            },
            Stake {
                user_id: "bob".into(),
                color_label: "black".into(),
                amount: 60,
                placed_at_sequence: 1,
            },
        ]
    }

    fn settled_record(round_id: u64) -> RoundRecord {
        let pair = chain().generate(round_id);
        let stakes = stakes();
        let pool = Pool::from_stakes(stakes.clone()).unwrap();
        let draw = replay_draw(&pair.reveal, pool.bank()).unwrap();
        let (_, winner) = resolver::resolve(&pool, draw).unwrap();
        RoundRecord {
            round_id,
            commit: pair.commit,
            outcome: Some(Outcome {
                winning_stake: winner.clone(),
                draw_value: draw,
                bank: pool.bank(),
                payout: pool.bank(),
                commission: 0,
                reveal: pair.reveal,
            }),
            stakes,
        }
    }

    #[test]
    fn test_generate_deterministic() {
        assert_eq!(chain().generate(1), chain().generate(1));
    }

    #[test]
    fn test_different_rounds_differ() {
        let chain = chain();
        let pair1 = chain.generate(1);
        let pair2 = chain.generate(2);
        assert_ne!(pair1.reveal, pair2.reveal);
        assert_ne!(pair1.commit, pair2.commit);
    }

    #[test]
    fn test_different_secrets_differ() {
        let other = HashChain::from_secret([8u8; COMMITMENT_LEN]);
        assert_ne!(chain().generate(1).reveal, other.generate(1).reveal);
    }

    #[test]
    fn test_table_chains_are_independent() {
        let stars = chain().for_table("stars");
        let ton = chain().for_table("ton");
        assert_eq!(stars.generate(1), chain().for_table("stars").generate(1));
        assert_ne!(stars.generate(1).reveal, ton.generate(1).reveal);
        assert_ne!(stars.generate(1).reveal, chain().generate(1).reveal);
    }

    #[test]
    fn test_pair_verifies() {
        let pair = chain().generate(3);
        assert!(pair.verify());

        let mut tampered = pair.clone();
        tampered.reveal[0] ^= 0xff;
        assert!(!tampered.verify());
    }

    #[test]
    fn test_random_chain_uses_generator() {
        let mut rng = StdRng::seed_from_u64(42);
        let a = HashChain::random(&mut rng);
        let b = HashChain::random(&mut rng);
        assert_ne!(a.generate(1), b.generate(1));
    }

    #[test]
    fn test_replay_draw_is_stable() {
        let reveal = chain().derive_reveal(9);
        let first = replay_draw(&reveal, 1_000).unwrap();
        assert_eq!(replay_draw(&reveal, 1_000).unwrap(), first);
        assert!(first < 1_000);
    }

    #[test]
    fn test_verify_record_accepts_honest_round() {
        assert_eq!(verify_record(&settled_record(5)), Ok(()));
    }

    #[test]
    fn test_verify_record_rejects_tampering() {
        let mut bad_commit = settled_record(5);
        bad_commit.commit[0] ^= 1;
        assert_eq!(
            verify_record(&bad_commit),
            Err(CommitRevealError::VerificationFailed)
        );

        let mut bad_draw = settled_record(5);
        let outcome = bad_draw.outcome.as_mut().unwrap();
        let recorded = (outcome.draw_value + 1) % 100;
        outcome.draw_value = recorded;
        assert!(matches!(
            verify_record(&bad_draw),
            Err(CommitRevealError::DrawMismatch { .. })
        ));

        let mut bad_winner = settled_record(5);
        let outcome = bad_winner.outcome.as_mut().unwrap();
        outcome.winning_stake.user_id = "mallory".into();
        assert_eq!(
            verify_record(&bad_winner),
            Err(CommitRevealError::WinnerMismatch)
        );

        let mut bad_bank = settled_record(5);
        bad_bank.stakes[0].amount += 1;
        assert!(matches!(
            verify_record(&bad_bank),
            Err(CommitRevealError::BankMismatch { expected: 101, recorded: 100 })
        ));
    }

    #[test]
    fn test_verify_record_voided() {
        let record = RoundRecord {
            round_id: 1,
            commit: chain().generate(1).commit,
            stakes: Vec::new(),
            outcome: None,
        };
        assert_eq!(verify_record(&record), Err(CommitRevealError::Voided));
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", chain());
        assert!(!rendered.contains('7'));
    }
}
