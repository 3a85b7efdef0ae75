//! Statistical fairness of the draw.
//!
//! Over many rounds with independent reveals, each stake must win in proportion to
//! `amount / bank`. Secrets come from a seeded generator so the runs are reproducible.

#[cfg(test)]
mod tests {
    use crate::rng_pipeline::HashChain;
    use crate::{PayoutRule, Round, Wallet};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Chi-square critical value for 2 degrees of freedom at p = 0.001.
    const CHI_SQUARE_CRITICAL_DF2: f64 = 13.816;

    /// Plays `rounds` rounds with the given stakes and counts wins per stake index.
    fn play(stakes: &[(&str, u64)], rounds: u64, seed: u64) -> Vec<u64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let chain = HashChain::random(&mut rng);
        let rule = PayoutRule::winner_take_all();
        let mut wins = vec![0u64; stakes.len()];

        for round_id in 1..=rounds {
            let mut wallet = Wallet::from_balances(stakes.iter().copied());
            let mut round = Round::new(round_id, chain.generate(round_id));
            for (user, amount) in stakes {
                round.place_bet(&mut wallet, user, *amount, "red").unwrap();
            }
            round.lock().unwrap();
            let outcome = round.resolve(&mut wallet, &rule).unwrap();
            let index = outcome.winning_stake.placed_at_sequence as usize;
            wins[index] += 1;
        }
        wins
    }

    #[test]
    fn test_win_frequency_matches_share() {
        let stakes = [("a", 10), ("b", 30), ("c", 60)];
        let bank: u64 = stakes.iter().map(|(_, amount)| amount).sum();
        let rounds = 6_000;
        let wins = play(&stakes, rounds, 0xC0105);

        let chi_square: f64 = stakes
            .iter()
            .zip(&wins)
            .map(|((_, amount), observed)| {
                let expected = rounds as f64 * *amount as f64 / bank as f64;
                let diff = *observed as f64 - expected;
                diff * diff / expected
            })
            .sum();

        assert_eq!(wins.iter().sum::<u64>(), rounds);
        assert!(
            chi_square < CHI_SQUARE_CRITICAL_DF2,
            "chi-square {chi_square:.3} too large for wins {wins:?}"
        );
    }

    #[test]
    fn test_small_stake_still_wins() {
        let wins = play(&[("whale", 99), ("minnow", 1)], 6_000, 42);
        // Expected 60 minnow wins, standard deviation about 7.7.
        assert!(
            (25..=95).contains(&wins[1]),
            "minnow won {} times",
            wins[1]
        );
    }

    #[test]
    fn test_same_reveal_same_winner() {
        let stakes = [("a", 5), ("b", 5), ("c", 5)];
        assert_eq!(play(&stakes, 50, 9), play(&stakes, 50, 9));
    }
}
