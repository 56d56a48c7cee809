//! Power-attack trade-off analysis.
//!
//! Sharpshooter and Great Weapon Master trade -5 to hit for +10 damage.
//! Whether that wins depends on target AC and advantage state; this module
//! compares the two curves, finds the break-even AC, and produces sweep
//! rows for charting.

use crate::character::Target;
use crate::damage::{self, AttackSequence, DamageOrigin};
use crate::probability::{self, AdvantageState};
use serde::{Deserialize, Serialize};

/// To-hit penalty taken by a power attack.
pub const ATTACK_PENALTY: i32 = 5;
/// Flat damage added by a power attack.
pub const DAMAGE_BONUS: i32 = 10;

/// Integral AC range swept for the break-even search.
pub const SWEEP_MIN_AC: i32 = 10;
pub const SWEEP_MAX_AC: i32 = 30;

/// Comparison of the baseline and power-attack damage curves at one AC.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerAttackAnalysis {
    pub normal_dpr: f64,
    pub power_attack_dpr: f64,
    pub should_use: bool,
    /// Highest AC (within the sweep range) at which the power attack is
    /// still at least break-even. One below the sweep floor when it never
    /// is.
    pub break_even_ac: i32,
    pub delta: f64,
}

/// One AC point of a sweep, for charting collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerAttackRow {
    pub ac: i32,
    pub normal_dpr: f64,
    pub power_attack_dpr: f64,
    pub should_use: bool,
}

/// Break-even AC for one advantage state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvantageThreshold {
    pub state: AdvantageState,
    pub break_even_ac: i32,
}

/// The sequence with the +10 applied to the primary weapon damage source
/// (first weapon-origin source, falling back to the first source).
fn powered_sequence(sequence: &AttackSequence) -> AttackSequence {
    let mut powered = sequence.clone();
    let index = powered
        .normal_damage
        .iter()
        .position(|s| s.origin == DamageOrigin::Weapon)
        .unwrap_or(0);
    if let Some(source) = powered.normal_damage.get_mut(index) {
        source.dice = source.dice.plus(DAMAGE_BONUS);
    }
    powered
}

/// DPR for a sequence with probabilities re-resolved at the given bonus
/// and AC.
fn dpr_at(
    attack_bonus: i32,
    target_ac: i32,
    sequence: &AttackSequence,
    state: AdvantageState,
    crit_range: u32,
    target: Option<&Target>,
) -> f64 {
    let p = probability::resolve(attack_bonus, target_ac, state, crit_range);
    let mut resolved = sequence.clone();
    resolved.hit_probability = p.hit;
    resolved.crit_probability = p.crit;
    damage::dpr(&resolved, target)
}

/// Compare baseline and power-attack DPR at one AC and find the
/// break-even point.
pub fn analyze(
    attack_bonus: i32,
    target_ac: i32,
    sequence: &AttackSequence,
    state: AdvantageState,
    crit_range: u32,
    target: Option<&Target>,
) -> PowerAttackAnalysis {
    let powered = powered_sequence(sequence);
    let normal_dpr = dpr_at(attack_bonus, target_ac, sequence, state, crit_range, target);
    let power_attack_dpr = dpr_at(
        attack_bonus - ATTACK_PENALTY,
        target_ac,
        &powered,
        state,
        crit_range,
        target,
    );

    PowerAttackAnalysis {
        normal_dpr,
        power_attack_dpr,
        should_use: power_attack_dpr > normal_dpr,
        break_even_ac: break_even_ac(attack_bonus, sequence, state, crit_range, target),
        delta: power_attack_dpr - normal_dpr,
    }
}

/// The last AC of the initial favorable run of the sweep. Both hit
/// probabilities floor at 5%, so the curves can cross back at extreme AC;
/// the initial run is the one that matters for play.
pub fn break_even_ac(
    attack_bonus: i32,
    sequence: &AttackSequence,
    state: AdvantageState,
    crit_range: u32,
    target: Option<&Target>,
) -> i32 {
    let powered = powered_sequence(sequence);
    let mut last_favorable = SWEEP_MIN_AC - 1;
    for ac in SWEEP_MIN_AC..=SWEEP_MAX_AC {
        let normal = dpr_at(attack_bonus, ac, sequence, state, crit_range, target);
        let power = dpr_at(
            attack_bonus - ATTACK_PENALTY,
            ac,
            &powered,
            state,
            crit_range,
            target,
        );
        if power + 1e-9 >= normal {
            last_favorable = ac;
        } else {
            break;
        }
    }
    last_favorable
}

/// One comparison row per AC in `ac_range`.
pub fn sweep(
    attack_bonus: i32,
    sequence: &AttackSequence,
    state: AdvantageState,
    crit_range: u32,
    target: Option<&Target>,
    ac_range: std::ops::RangeInclusive<i32>,
) -> Vec<PowerAttackRow> {
    let powered = powered_sequence(sequence);
    ac_range
        .map(|ac| {
            let normal_dpr = dpr_at(attack_bonus, ac, sequence, state, crit_range, target);
            let power_attack_dpr = dpr_at(
                attack_bonus - ATTACK_PENALTY,
                ac,
                &powered,
                state,
                crit_range,
                target,
            );
            PowerAttackRow {
                ac,
                normal_dpr,
                power_attack_dpr,
                should_use: power_attack_dpr > normal_dpr,
            }
        })
        .collect()
}

/// Break-even AC for each advantage state. Advantage pushes the
/// threshold up (the penalty is cheaper when a second roll backs it up);
/// disadvantage pulls it down.
pub fn thresholds_by_advantage_state(
    attack_bonus: i32,
    sequence: &AttackSequence,
    crit_range: u32,
    target: Option<&Target>,
) -> Vec<AdvantageThreshold> {
    AdvantageState::all()
        .iter()
        .map(|&state| AdvantageThreshold {
            state,
            break_even_ac: break_even_ac(attack_bonus, sequence, state, crit_range, target),
        })
        .collect()
}
