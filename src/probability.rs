//! Closed-form attack-roll probability.
//!
//! Converts attack bonus, target AC, and an advantage state into hit and
//! critical-hit probabilities. Advantage and disadvantage are composed
//! algebraically (roll-twice-keep-better is `1-(1-p)^2`, keep-worse is
//! `p^2`); the Elven Accuracy triple roll uses exponent 3.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Natural 1 always misses: the hit probability never drops below 1/20.
pub const MIN_HIT: f64 = 0.05;
/// Natural 20 always hits: the hit probability never exceeds 19/20.
pub const MAX_HIT: f64 = 0.95;

/// The resolved advantage state for a roll.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum AdvantageState {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
    TripleAdvantage,
}

impl AdvantageState {
    pub fn name(&self) -> &'static str {
        match self {
            AdvantageState::Normal => "normal",
            AdvantageState::Advantage => "advantage",
            AdvantageState::Disadvantage => "disadvantage",
            AdvantageState::TripleAdvantage => "triple-advantage",
        }
    }

    pub fn all() -> [AdvantageState; 4] {
        [
            AdvantageState::Normal,
            AdvantageState::Advantage,
            AdvantageState::Disadvantage,
            AdvantageState::TripleAdvantage,
        ]
    }

    /// Number of d20s rolled in this state.
    pub fn rolls(&self) -> u32 {
        match self {
            AdvantageState::Normal => 1,
            AdvantageState::Advantage | AdvantageState::Disadvantage => 2,
            AdvantageState::TripleAdvantage => 3,
        }
    }
}

impl fmt::Display for AdvantageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Hit and crit probability for one attack roll.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AttackProbability {
    pub state: AdvantageState,
    /// The minimum d20 face that hits, clamped to [2, 20].
    pub needed_roll: i32,
    pub hit: f64,
    pub crit: f64,
}

/// Resolve attack bonus, target AC, and advantage state into hit/crit
/// probability. `crit_range` is the number of crit faces (1 for 20 only,
/// 2 for 19-20, 3 for 18-20).
pub fn resolve(
    attack_bonus: i32,
    target_ac: i32,
    state: AdvantageState,
    crit_range: u32,
) -> AttackProbability {
    let needed_roll = (target_ac - attack_bonus + 1).clamp(2, 20);
    let raw_hit = (21 - needed_roll) as f64 / 20.0;
    let base_hit = raw_hit.clamp(MIN_HIT, MAX_HIT);
    let base_crit = crit_range.clamp(1, 3) as f64 / 20.0;

    let (hit, crit) = match state {
        AdvantageState::Normal => (base_hit, base_crit),
        AdvantageState::Advantage => (keep_best(base_hit, 2), keep_best(base_crit, 2)),
        AdvantageState::Disadvantage => (base_hit * base_hit, base_crit * base_crit),
        AdvantageState::TripleAdvantage => (keep_best(base_hit, 3), keep_best(base_crit, 3)),
    };

    AttackProbability {
        state,
        needed_roll,
        hit,
        crit: crit.min(hit),
    }
}

/// Probability that at least one of `rolls` independent tries succeeds.
fn keep_best(p: f64, rolls: u32) -> f64 {
    1.0 - (1.0 - p).powi(rolls as i32)
}

/// Probabilities for all four advantage states at once, for the
/// comparison tables the orchestrator reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProbabilityTable {
    pub normal: AttackProbability,
    pub advantage: AttackProbability,
    pub disadvantage: AttackProbability,
    pub triple_advantage: AttackProbability,
}

impl ProbabilityTable {
    pub fn get(&self, state: AdvantageState) -> AttackProbability {
        match state {
            AdvantageState::Normal => self.normal,
            AdvantageState::Advantage => self.advantage,
            AdvantageState::Disadvantage => self.disadvantage,
            AdvantageState::TripleAdvantage => self.triple_advantage,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = AttackProbability> {
        AdvantageState::all().map(|s| self.get(s)).into_iter()
    }
}

/// Compute the full four-state probability table.
pub fn table(attack_bonus: i32, target_ac: i32, crit_range: u32) -> ProbabilityTable {
    ProbabilityTable {
        normal: resolve(attack_bonus, target_ac, AdvantageState::Normal, crit_range),
        advantage: resolve(attack_bonus, target_ac, AdvantageState::Advantage, crit_range),
        disadvantage: resolve(
            attack_bonus,
            target_ac,
            AdvantageState::Disadvantage,
            crit_range,
        ),
        triple_advantage: resolve(
            attack_bonus,
            target_ac,
            AdvantageState::TripleAdvantage,
            crit_range,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_scenario() {
        // +5 vs AC 15: needs an 11, hits half the time.
        let p = resolve(5, 15, AdvantageState::Normal, 1);
        assert_eq!(p.needed_roll, 11);
        assert!((p.hit - 0.50).abs() < 1e-12);
    }

    #[test]
    fn test_hit_clamps() {
        // Overwhelming bonus still misses on a natural 1.
        let p = resolve(30, 10, AdvantageState::Normal, 1);
        assert_eq!(p.hit, MAX_HIT);

        // Hopeless attack still hits on a natural 20.
        let p = resolve(0, 40, AdvantageState::Normal, 1);
        assert_eq!(p.hit, MIN_HIT);
    }

    #[test]
    fn test_advantage_algebra() {
        let normal = resolve(5, 15, AdvantageState::Normal, 1);
        let adv = resolve(5, 15, AdvantageState::Advantage, 1);
        let dis = resolve(5, 15, AdvantageState::Disadvantage, 1);
        let triple = resolve(5, 15, AdvantageState::TripleAdvantage, 1);

        let h = normal.hit;
        assert!((adv.hit - (1.0 - (1.0 - h) * (1.0 - h))).abs() < 1e-12);
        assert!((dis.hit - h * h).abs() < 1e-12);
        assert!((triple.hit - (1.0 - (1.0 - h).powi(3))).abs() < 1e-12);

        // Monotonic: disadvantage <= normal <= advantage <= triple.
        assert!(dis.hit <= normal.hit);
        assert!(normal.hit <= adv.hit);
        assert!(adv.hit <= triple.hit);
    }

    #[test]
    fn test_crit_range() {
        let p = resolve(5, 15, AdvantageState::Normal, 1);
        assert!((p.crit - 0.05).abs() < 1e-12);

        let improved = resolve(5, 15, AdvantageState::Normal, 2);
        assert!((improved.crit - 0.10).abs() < 1e-12);

        let adv = resolve(5, 15, AdvantageState::Advantage, 1);
        assert!((adv.crit - (1.0 - 0.95 * 0.95)).abs() < 1e-12);
    }

    #[test]
    fn test_crit_never_exceeds_hit() {
        for state in AdvantageState::all() {
            for crit_range in 1..=3 {
                // A hopeless attack: hit floors at 0.05 while a wide crit
                // range would exceed it without the cap.
                let p = resolve(-10, 35, state, crit_range);
                assert!(p.crit <= p.hit, "crit > hit for {state} range {crit_range}");
            }
        }
    }

    #[test]
    fn test_state_roll_counts() {
        assert_eq!(AdvantageState::Normal.rolls(), 1);
        assert_eq!(AdvantageState::Advantage.rolls(), 2);
        assert_eq!(AdvantageState::TripleAdvantage.rolls(), 3);
    }

    #[test]
    fn test_table_matches_resolve() {
        let t = table(7, 16, 1);
        for state in AdvantageState::all() {
            let direct = resolve(7, 16, state, 1);
            assert_eq!(t.get(state).hit, direct.hit);
            assert_eq!(t.get(state).crit, direct.crit);
        }
    }
}
