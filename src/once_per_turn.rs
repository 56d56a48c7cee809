//! Once-per-turn effect selection.
//!
//! Sneak attack, smites, and similar limited-use riders may contribute to
//! at most one attack per turn. Given the turn's attack probabilities,
//! this module picks the (effect, attack) pair with the highest expected
//! value, with ties broken by effect priority and then by earlier attack.

use crate::character::{CombatContext, Target};
use crate::damage::{self, DamageSource};
use crate::effects::{ConditionExpr, EffectContext};
use crate::probability::AttackProbability;
use crate::resources::ResourceCost;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for once-per-turn effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectId(pub Uuid);

impl EffectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A limited-use bonus-damage effect; at most one may fire per turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OncePerTurnEffect {
    pub id: EffectId,
    pub name: String,
    /// Higher priority wins expected-value ties.
    pub priority: i32,
    pub trigger: ConditionExpr,
    pub damage: DamageSource,
    pub resource_cost: Option<ResourceCost>,
}

impl OncePerTurnEffect {
    pub fn new(name: impl Into<String>, priority: i32, damage: DamageSource) -> Self {
        Self {
            id: EffectId::new(),
            name: name.into(),
            priority,
            trigger: ConditionExpr::Always,
            damage,
            resource_cost: None,
        }
    }

    pub fn with_trigger(mut self, trigger: ConditionExpr) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_resource_cost(mut self, cost: ResourceCost) -> Self {
        self.resource_cost = Some(cost);
        self
    }
}

/// A candidate placement: which attack carries the effect and what it is
/// worth there.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub attack_index: usize,
    pub expected_damage: f64,
}

/// Per-effect analysis: the best placement plus every eligible one, in
/// attack order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectAnalysis {
    pub effect_id: EffectId,
    pub name: String,
    pub priority: i32,
    pub best: Placement,
    pub placements: Vec<Placement>,
}

/// Number of runner-up effects reported for display.
const MAX_ALTERNATIVES: usize = 3;

/// The full selection result.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OncePerTurnAnalysis {
    pub selected: Option<EffectAnalysis>,
    pub alternatives: Vec<EffectAnalysis>,
}

/// Selection policy: `FirstHit` favors a consistent rotation, `BestHit`
/// the analysis optimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum OncePerTurnPolicy {
    FirstHit,
    #[default]
    BestHit,
}

/// Expected bonus damage when the effect rides on an attack with the
/// given probabilities.
fn expected_effect_damage(
    effect: &OncePerTurnEffect,
    probability: &AttackProbability,
    target: &Target,
) -> f64 {
    let source = std::slice::from_ref(&effect.damage);
    let base = damage::total(source, false, Some(target)).total;
    let crit = damage::total(source, true, Some(target)).total;
    (probability.hit - probability.crit).max(0.0) * base + probability.crit * crit
}

/// Evaluate every effect against every attack slot and pick the best
/// eligible pairing.
///
/// Effects are considered in descending priority so that expected-value
/// ties resolve toward higher priority; within one effect, ties resolve
/// toward the earlier attack.
pub fn analyze(
    effects: &[OncePerTurnEffect],
    target: &Target,
    combat: &CombatContext,
    attacks: &[AttackProbability],
    is_melee: bool,
) -> OncePerTurnAnalysis {
    let mut ordered: Vec<&OncePerTurnEffect> = effects.iter().collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut analyses: Vec<EffectAnalysis> = Vec::new();
    for effect in ordered {
        let mut placements: Vec<Placement> = Vec::new();
        for (attack_index, probability) in attacks.iter().enumerate() {
            let context = EffectContext {
                target,
                combat,
                attack_index,
                is_melee,
                advantage: probability.state,
            };
            if !effect.trigger.evaluate(&context) {
                continue;
            }
            placements.push(Placement {
                attack_index,
                expected_damage: expected_effect_damage(effect, probability, target),
            });
        }

        let Some(best) = placements
            .iter()
            .copied()
            // Strictly-greater keeps the earliest attack on ties.
            .reduce(|best, p| {
                if p.expected_damage > best.expected_damage {
                    p
                } else {
                    best
                }
            })
        else {
            continue;
        };

        analyses.push(EffectAnalysis {
            effect_id: effect.id,
            name: effect.name.clone(),
            priority: effect.priority,
            best,
            placements,
        });
    }

    // Strictly-greater keeps the first (highest-priority) effect on ties.
    let selected_index = analyses
        .iter()
        .enumerate()
        .reduce(|best, candidate| {
            if candidate.1.best.expected_damage > best.1.best.expected_damage {
                candidate
            } else {
                best
            }
        })
        .map(|(index, _)| index);

    let Some(selected_index) = selected_index else {
        return OncePerTurnAnalysis::default();
    };

    let selected = analyses.remove(selected_index);
    let mut alternatives = analyses;
    alternatives.sort_by(|a, b| {
        b.best
            .expected_damage
            .partial_cmp(&a.best.expected_damage)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    alternatives.truncate(MAX_ALTERNATIVES);

    OncePerTurnAnalysis {
        selected: Some(selected),
        alternatives,
    }
}

/// Resolve the analysis into a concrete placement under the build's
/// policy.
pub fn apply_policy(
    analysis: &OncePerTurnAnalysis,
    policy: OncePerTurnPolicy,
) -> Option<Placement> {
    let selected = analysis.selected.as_ref()?;
    match policy {
        OncePerTurnPolicy::FirstHit => selected.placements.first().copied(),
        OncePerTurnPolicy::BestHit => Some(selected.best),
    }
}

/// Probability that the once-per-turn condition lands at least once
/// across the turn's eligible attacks: `1 - prod(1 - hit_i)`.
pub fn trigger_probability_across_attacks(hit_probs: &[f64], eligibility: &[bool]) -> f64 {
    let miss_all: f64 = hit_probs
        .iter()
        .zip(eligibility.iter())
        .filter(|(_, &eligible)| eligible)
        .map(|(&hit, _)| 1.0 - hit.clamp(0.0, 1.0))
        .product();
    1.0 - miss_all
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::{DamageType, DiceExpression};
    use crate::probability::AdvantageState;

    fn attack(hit: f64, crit: f64) -> AttackProbability {
        AttackProbability {
            state: AdvantageState::Normal,
            needed_roll: 10,
            hit,
            crit,
        }
    }

    fn sneak_attack(priority: i32) -> OncePerTurnEffect {
        OncePerTurnEffect::new(
            "Sneak Attack",
            priority,
            DamageSource::feature(
                "Sneak Attack",
                DiceExpression::new(3, 6, 0),
                DamageType::Piercing,
            ),
        )
    }

    #[test]
    fn test_selects_highest_ev_attack() {
        let target = Target::new(15);
        let combat = CombatContext::new();
        // Second attack has better probabilities.
        let attacks = [attack(0.5, 0.05), attack(0.7, 0.1)];
        let analysis = analyze(&[sneak_attack(1)], &target, &combat, &attacks, false);

        let selected = analysis.selected.unwrap();
        assert_eq!(selected.best.attack_index, 1);
        assert_eq!(selected.placements.len(), 2);
    }

    #[test]
    fn test_equal_ev_prefers_earlier_attack() {
        let target = Target::new(15);
        let combat = CombatContext::new();
        let attacks = [attack(0.6, 0.05), attack(0.6, 0.05)];
        let analysis = analyze(&[sneak_attack(1)], &target, &combat, &attacks, false);
        assert_eq!(analysis.selected.unwrap().best.attack_index, 0);
    }

    #[test]
    fn test_tie_prefers_higher_priority() {
        let target = Target::new(15);
        let combat = CombatContext::new();
        let attacks = [attack(0.6, 0.05)];

        let low = sneak_attack(1);
        let mut high = sneak_attack(5);
        high.name = "Divine Fury".to_string();

        let analysis = analyze(
            &[low.clone(), high.clone()],
            &target,
            &combat,
            &attacks,
            true,
        );
        assert_eq!(analysis.selected.unwrap().name, "Divine Fury");

        // Input order does not matter.
        let analysis = analyze(&[high, low], &target, &combat, &attacks, true);
        assert_eq!(analysis.selected.unwrap().name, "Divine Fury");
    }

    #[test]
    fn test_trigger_gating() {
        let target = Target::new(15);
        let combat = CombatContext::new();
        let attacks = [attack(0.6, 0.05), attack(0.6, 0.05)];

        let gated = sneak_attack(1).with_trigger(ConditionExpr::FirstAttackOnly);
        let analysis = analyze(&[gated], &target, &combat, &attacks, false);
        let selected = analysis.selected.unwrap();
        assert_eq!(selected.placements.len(), 1);
        assert_eq!(selected.best.attack_index, 0);

        let never = sneak_attack(1).with_trigger(ConditionExpr::Not(Box::new(
            ConditionExpr::Always,
        )));
        let analysis = analyze(&[never], &target, &combat, &attacks, false);
        assert!(analysis.selected.is_none());
    }

    #[test]
    fn test_best_hit_beats_first_hit() {
        let target = Target::new(15);
        let combat = CombatContext::new();
        let attacks = [attack(0.4, 0.05), attack(0.8, 0.1)];
        let analysis = analyze(&[sneak_attack(1)], &target, &combat, &attacks, false);

        let first = apply_policy(&analysis, OncePerTurnPolicy::FirstHit).unwrap();
        let best = apply_policy(&analysis, OncePerTurnPolicy::BestHit).unwrap();
        assert_eq!(first.attack_index, 0);
        assert_eq!(best.attack_index, 1);
        assert!(best.expected_damage >= first.expected_damage);
    }

    #[test]
    fn test_alternatives_ranked_and_capped() {
        let target = Target::new(15);
        let combat = CombatContext::new();
        let attacks = [attack(0.6, 0.05)];

        let mut effects = Vec::new();
        for (i, dice) in [(1, 6), (2, 8), (3, 4), (4, 10), (5, 12)].iter().enumerate() {
            effects.push(OncePerTurnEffect::new(
                format!("Effect {i}"),
                0,
                DamageSource::feature(
                    format!("Effect {i}"),
                    DiceExpression::new(dice.0, dice.1, 0),
                    DamageType::Force,
                ),
            ));
        }
        let analysis = analyze(&effects, &target, &combat, &attacks, true);
        // 5d12 wins; three alternatives survive the cap.
        assert_eq!(analysis.selected.unwrap().name, "Effect 4");
        assert_eq!(analysis.alternatives.len(), 3);
        let evs: Vec<f64> = analysis
            .alternatives
            .iter()
            .map(|a| a.best.expected_damage)
            .collect();
        assert!(evs.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_crit_weighting() {
        let target = Target::new(15);
        let combat = CombatContext::new();
        // Pure-crit attack doubles the dice.
        let attacks = [attack(0.5, 0.5)];
        let analysis = analyze(&[sneak_attack(1)], &target, &combat, &attacks, false);
        let ev = analysis.selected.unwrap().best.expected_damage;
        assert!((ev - 0.5 * 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_trigger_probability() {
        let hit_probs = [0.5, 0.5, 0.5];
        let all = [true, true, true];
        assert!((trigger_probability_across_attacks(&hit_probs, &all) - 0.875).abs() < 1e-12);

        let one = [true, false, false];
        assert!((trigger_probability_across_attacks(&hit_probs, &one) - 0.5).abs() < 1e-12);

        let none = [false, false, false];
        assert!(trigger_probability_across_attacks(&hit_probs, &none).abs() < 1e-12);
    }
}
