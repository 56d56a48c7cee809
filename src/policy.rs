//! Declarative combat policies and the decisions they produce.
//!
//! Each decision axis (resource spend, power attack, targeting,
//! positioning, once-per-turn placement) is a pure function from a policy
//! enum plus context to a [`PolicyDecision`] carrying the chosen action,
//! a human-readable rationale, the expected value at stake, and a
//! confidence score. Unrecognized or inapplicable situations never error;
//! they resolve to a neutral no-special-action decision.

use crate::character::{CombatContext, Target};
use crate::once_per_turn::{self, OncePerTurnAnalysis, OncePerTurnPolicy};
use crate::power_attack::PowerAttackAnalysis;
use crate::resources::{ResourceCost, ResourceKind, ResourceManager};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

// ============================================================================
// Policy enums
// ============================================================================

/// When to spend limited resources on bonus damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ResourcePolicy {
    Never,
    OnCrit,
    #[default]
    Optimal,
    Always,
}

/// When to take the -5/+10 trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PowerAttackPolicy {
    Never,
    Always,
    #[default]
    Optimal,
}

/// How to choose among candidate targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum TargetingPolicy {
    #[default]
    Optimal,
    LowestHp,
    HighestThreat,
}

/// Whether to consider repositioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PositioningPolicy {
    Static,
    #[default]
    Optimal,
}

/// The build's full policy block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BuildPolicies {
    pub resource: ResourcePolicy,
    pub power_attack: PowerAttackPolicy,
    pub once_per_turn: OncePerTurnPolicy,
    pub targeting: TargetingPolicy,
    pub positioning: PositioningPolicy,
}

// ============================================================================
// Decisions
// ============================================================================

/// A concrete action recommended by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyAction {
    UseResource {
        kind: ResourceKind,
        slot_level: Option<u8>,
    },
    HoldResource,
    UsePowerAttack,
    SkipPowerAttack,
    UseOncePerTurn {
        effect: String,
        attack_index: usize,
    },
    HoldOncePerTurn,
    AttackTarget {
        name: String,
    },
    Reposition {
        reason: String,
    },
    HoldPosition,
    NoSpecialAction,
}

impl fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyAction::UseResource { kind, slot_level } => match slot_level {
                Some(level) => write!(f, "spend a level {level} {kind}"),
                None => write!(f, "spend {kind}"),
            },
            PolicyAction::HoldResource => write!(f, "hold resources"),
            PolicyAction::UsePowerAttack => write!(f, "take the -5/+10 power attack"),
            PolicyAction::SkipPowerAttack => write!(f, "attack normally"),
            PolicyAction::UseOncePerTurn {
                effect,
                attack_index,
            } => write!(f, "apply {effect} to attack {}", attack_index + 1),
            PolicyAction::HoldOncePerTurn => write!(f, "hold the once-per-turn effect"),
            PolicyAction::AttackTarget { name } => write!(f, "attack {name}"),
            PolicyAction::Reposition { reason } => write!(f, "reposition ({reason})"),
            PolicyAction::HoldPosition => write!(f, "stay put"),
            PolicyAction::NoSpecialAction => write!(f, "no special action"),
        }
    }
}

/// A rejected or runner-up option, kept for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAlternative {
    pub action: PolicyAction,
    pub expected_value: f64,
    pub reasoning: String,
}

/// The outcome of one policy evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDecision {
    pub action: PolicyAction,
    pub reasoning: String,
    pub expected_value: f64,
    pub confidence: f64,
    pub alternatives: Vec<PolicyAlternative>,
}

impl PolicyDecision {
    fn new(action: PolicyAction, reasoning: impl Into<String>, expected_value: f64, confidence: f64) -> Self {
        Self {
            action,
            reasoning: reasoning.into(),
            expected_value,
            confidence,
            alternatives: Vec::new(),
        }
    }

    fn with_alternative(mut self, alternative: PolicyAlternative) -> Self {
        self.alternatives.push(alternative);
        self
    }

    /// The neutral fallback: nothing special to do, and sure of it.
    pub fn no_special_action(reasoning: impl Into<String>) -> Self {
        Self::new(PolicyAction::NoSpecialAction, reasoning, 0.0, 1.0)
    }
}

/// Context shared by every decision axis.
#[derive(Debug, Clone, Copy)]
pub struct CombatPolicyContext<'a> {
    pub target: &'a Target,
    pub combat: &'a CombatContext,
    pub round: u32,
    pub resources: &'a ResourceManager,
    pub party: Option<&'a PartyContext>,
}

/// What the engine knows about the rest of the party.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PartyContext {
    pub ally_count: u32,
    pub ally_adjacent_to_target: bool,
}

/// Confidence for expected-value comparisons scales with how decisive the
/// margin is: a sliver of EV is a coin flip, a big gap is near-certain.
fn confidence_for_delta(delta: f64, axis_default: f64) -> f64 {
    let magnitude = delta.abs();
    if magnitude < 0.5 {
        0.6
    } else if magnitude > 2.0 {
        0.95
    } else {
        axis_default
    }
}

// ============================================================================
// Resource usage
// ============================================================================

/// Decide whether to spend `cost` on a bonus-damage effect.
///
/// `effect_ev` is the expected damage gained by spending now,
/// `baseline_ev` the expected damage without spending, and `crit_ev` the
/// expected gain from reserving the spend for critical hits only.
pub fn decide_resource_use(
    context: &CombatPolicyContext<'_>,
    policy: ResourcePolicy,
    cost: &ResourceCost,
    effect_ev: f64,
    baseline_ev: f64,
    crit_ev: f64,
) -> PolicyDecision {
    let decision = match policy {
        ResourcePolicy::Never => PolicyDecision::new(
            PolicyAction::HoldResource,
            "Policy forbids spending this resource.",
            baseline_ev,
            1.0,
        ),
        _ if !context.resources.can_afford(cost) => PolicyDecision::new(
            PolicyAction::HoldResource,
            format!("No {} remaining.", cost.kind),
            baseline_ev,
            1.0,
        ),
        ResourcePolicy::OnCrit => {
            if crit_ev > effect_ev {
                PolicyDecision::new(
                    PolicyAction::UseResource {
                        kind: cost.kind,
                        slot_level: cost.min_slot_level,
                    },
                    format!(
                        "Reserving for crits pays off here ({crit_ev:.1} vs {effect_ev:.1} expected)."
                    ),
                    crit_ev,
                    0.8,
                )
            } else {
                PolicyDecision::new(
                    PolicyAction::HoldResource,
                    "Waiting for a critical hit.",
                    baseline_ev,
                    0.8,
                )
            }
        }
        ResourcePolicy::Optimal => {
            let delta = effect_ev - baseline_ev;
            if delta > 0.0 {
                PolicyDecision::new(
                    PolicyAction::UseResource {
                        kind: cost.kind,
                        slot_level: cost.min_slot_level,
                    },
                    format!("Spending now gains {delta:.1} expected damage."),
                    effect_ev,
                    confidence_for_delta(delta, 0.9),
                )
                .with_alternative(PolicyAlternative {
                    action: PolicyAction::HoldResource,
                    expected_value: baseline_ev,
                    reasoning: "Save the resource for a later round.".to_string(),
                })
            } else {
                PolicyDecision::new(
                    PolicyAction::HoldResource,
                    format!("Spending now loses {:.1} expected damage.", -delta),
                    baseline_ev,
                    confidence_for_delta(delta, 0.9),
                )
            }
        }
        ResourcePolicy::Always => PolicyDecision::new(
            PolicyAction::UseResource {
                kind: cost.kind,
                slot_level: cost.min_slot_level,
            },
            "Policy spends whenever the resource is available.",
            effect_ev,
            // May be wasteful against weak enemies.
            0.7,
        ),
    };

    debug!(round = context.round, action = %decision.action, "resource decision");
    decision
}

// ============================================================================
// Power attack
// ============================================================================

/// Map the build's power-attack policy onto an analysis.
pub fn decide_power_attack(
    context: &CombatPolicyContext<'_>,
    policy: PowerAttackPolicy,
    analysis: &PowerAttackAnalysis,
) -> PolicyDecision {
    let decision = match policy {
        PowerAttackPolicy::Never => PolicyDecision::new(
            PolicyAction::SkipPowerAttack,
            "Policy never takes the penalty.",
            analysis.normal_dpr,
            1.0,
        ),
        PowerAttackPolicy::Always => PolicyDecision::new(
            PolicyAction::UsePowerAttack,
            "Policy always takes the -5/+10 trade.",
            analysis.power_attack_dpr,
            0.7,
        )
        .with_alternative(PolicyAlternative {
            action: PolicyAction::SkipPowerAttack,
            expected_value: analysis.normal_dpr,
            reasoning: "Baseline attack without the penalty.".to_string(),
        }),
        PowerAttackPolicy::Optimal => {
            let confidence = confidence_for_delta(analysis.delta, 0.9);
            if analysis.should_use {
                PolicyDecision::new(
                    PolicyAction::UsePowerAttack,
                    format!(
                        "Power attack gains {:.1} DPR; favorable up to AC {}.",
                        analysis.delta, analysis.break_even_ac
                    ),
                    analysis.power_attack_dpr,
                    confidence,
                )
                .with_alternative(PolicyAlternative {
                    action: PolicyAction::SkipPowerAttack,
                    expected_value: analysis.normal_dpr,
                    reasoning: "Baseline attack without the penalty.".to_string(),
                })
            } else {
                PolicyDecision::new(
                    PolicyAction::SkipPowerAttack,
                    format!(
                        "Power attack loses {:.1} DPR here; favorable only at AC {} or less.",
                        -analysis.delta, analysis.break_even_ac
                    ),
                    analysis.normal_dpr,
                    confidence,
                )
                .with_alternative(PolicyAlternative {
                    action: PolicyAction::UsePowerAttack,
                    expected_value: analysis.power_attack_dpr,
                    reasoning: "Take the -5/+10 trade anyway.".to_string(),
                })
            }
        }
    };

    debug!(round = context.round, action = %decision.action, "power attack decision");
    decision
}

// ============================================================================
// Targeting
// ============================================================================

/// A candidate the targeting axis scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCandidate {
    pub name: String,
    pub expected_damage: f64,
    pub hp_fraction: Option<f64>,
    /// Healers, casters, and other kill-first targets.
    pub priority: bool,
    /// Conditions on the candidate that favor attacking it.
    pub favorable_conditions: u32,
}

/// Tactical value beyond raw expected damage: finishing wounded enemies,
/// removing priority threats, and exploiting conditions.
fn tactical_value(candidate: &TargetCandidate) -> f64 {
    let wounded = candidate
        .hp_fraction
        .map(|fraction| (1.0 - fraction.clamp(0.0, 1.0)) * 5.0)
        .unwrap_or(0.0);
    let priority = if candidate.priority { 3.0 } else { 0.0 };
    wounded + priority + candidate.favorable_conditions as f64
}

/// Choose a target. Empty candidate lists resolve to the neutral
/// decision rather than an error.
pub fn decide_targeting(
    context: &CombatPolicyContext<'_>,
    policy: TargetingPolicy,
    candidates: &[TargetCandidate],
) -> PolicyDecision {
    if candidates.is_empty() {
        return PolicyDecision::no_special_action("No targets to choose between.");
    }

    let score = |candidate: &TargetCandidate| -> f64 {
        match policy {
            TargetingPolicy::Optimal => candidate.expected_damage + tactical_value(candidate),
            TargetingPolicy::LowestHp => {
                // Lower remaining HP scores higher; unknown HP sinks to
                // the bottom.
                candidate
                    .hp_fraction
                    .map(|fraction| 1.0 - fraction)
                    .unwrap_or(-1.0)
            }
            TargetingPolicy::HighestThreat => {
                (if candidate.priority { 100.0 } else { 0.0 }) + candidate.expected_damage
            }
        }
    };

    let mut ranked: Vec<&TargetCandidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let chosen = ranked[0];
    let decision = PolicyDecision {
        action: PolicyAction::AttackTarget {
            name: chosen.name.clone(),
        },
        reasoning: format!(
            "{} scores best ({:.1} expected damage, {:.1} tactical value).",
            chosen.name,
            chosen.expected_damage,
            tactical_value(chosen)
        ),
        expected_value: chosen.expected_damage,
        confidence: 0.9,
        alternatives: ranked
            .iter()
            .skip(1)
            .take(3)
            .map(|candidate| PolicyAlternative {
                action: PolicyAction::AttackTarget {
                    name: candidate.name.clone(),
                },
                expected_value: candidate.expected_damage,
                reasoning: format!("Scores {:.1}.", score(candidate)),
            })
            .collect(),
    };

    debug!(round = context.round, action = %decision.action, "targeting decision");
    decision
}

// ============================================================================
// Positioning
// ============================================================================

/// Expected-value gain a move must clear before the engine recommends
/// spending movement on it.
pub const REPOSITION_THRESHOLD: f64 = 1.0;

/// Decide whether repositioning (flanking, escaping cover) is worth it.
pub fn decide_positioning(
    context: &CombatPolicyContext<'_>,
    policy: PositioningPolicy,
    current_ev: f64,
    repositioned_ev: f64,
    move_reason: &str,
) -> PolicyDecision {
    let decision = match policy {
        PositioningPolicy::Static => PolicyDecision::new(
            PolicyAction::HoldPosition,
            "Policy holds position.",
            current_ev,
            1.0,
        ),
        PositioningPolicy::Optimal => {
            let gain = repositioned_ev - current_ev;
            if gain > REPOSITION_THRESHOLD {
                PolicyDecision::new(
                    PolicyAction::Reposition {
                        reason: move_reason.to_string(),
                    },
                    format!("Moving gains {gain:.1} expected damage."),
                    repositioned_ev,
                    confidence_for_delta(gain, 0.9),
                )
                .with_alternative(PolicyAlternative {
                    action: PolicyAction::HoldPosition,
                    expected_value: current_ev,
                    reasoning: "Attack from the current position.".to_string(),
                })
            } else {
                PolicyDecision::new(
                    PolicyAction::HoldPosition,
                    format!(
                        "Moving gains only {gain:.1} expected damage; not worth the movement."
                    ),
                    current_ev,
                    confidence_for_delta(gain, 0.9),
                )
            }
        }
    };

    debug!(round = context.round, action = %decision.action, "positioning decision");
    decision
}

// ============================================================================
// Once per turn
// ============================================================================

/// Map the once-per-turn policy onto a selector analysis.
pub fn decide_once_per_turn(
    context: &CombatPolicyContext<'_>,
    policy: OncePerTurnPolicy,
    analysis: &OncePerTurnAnalysis,
) -> PolicyDecision {
    let Some(selected) = analysis.selected.as_ref() else {
        return PolicyDecision::no_special_action("No once-per-turn effect is eligible.");
    };
    let Some(placement) = once_per_turn::apply_policy(analysis, policy) else {
        return PolicyDecision::no_special_action("No eligible attack for the effect.");
    };

    let (reasoning, confidence) = match policy {
        OncePerTurnPolicy::BestHit => (
            format!(
                "{} rides attack {} for {:.1} expected damage.",
                selected.name,
                placement.attack_index + 1,
                placement.expected_damage
            ),
            0.9,
        ),
        OncePerTurnPolicy::FirstHit => (
            format!(
                "{} fires on the first qualifying attack for consistency.",
                selected.name
            ),
            0.8,
        ),
    };

    let mut decision = PolicyDecision::new(
        PolicyAction::UseOncePerTurn {
            effect: selected.name.clone(),
            attack_index: placement.attack_index,
        },
        reasoning,
        placement.expected_damage,
        confidence,
    );
    for alternative in &analysis.alternatives {
        decision = decision.with_alternative(PolicyAlternative {
            action: PolicyAction::UseOncePerTurn {
                effect: alternative.name.clone(),
                attack_index: alternative.best.attack_index,
            },
            expected_value: alternative.best.expected_damage,
            reasoning: format!("{} instead.", alternative.name),
        });
    }

    debug!(round = context.round, action = %decision.action, "once-per-turn decision");
    decision
}
