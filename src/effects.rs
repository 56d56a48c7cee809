//! Effect-descriptor DSL.
//!
//! Homebrew and feature effects are data, not code: a trigger tag, a
//! condition expression, and a serializable payload, interpreted by a
//! small bounded evaluator. User-authored script text is never executed;
//! anything a custom effect wants to express has to fit this closed
//! vocabulary.

use crate::character::{CombatContext, Condition, Target, TargetType};
use crate::damage::DamageSource;
use crate::probability::AdvantageState;
use serde::{Deserialize, Serialize};

/// Nested condition expressions deeper than this evaluate to false
/// rather than recursing further.
const MAX_CONDITION_DEPTH: u32 = 32;

/// When an effect fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectTrigger {
    OnAttackRoll,
    OnHit,
    OnCrit,
    OnDamageRoll,
    OnSave,
    OnTurnStart,
    OnTurnEnd,
    OnKill,
}

/// The closed condition vocabulary. Composable with `All`/`Any`/`Not`;
/// evaluated against an [`EffectContext`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionExpr {
    Always,
    TargetHasCondition(Condition),
    TargetIsType(TargetType),
    /// True when the target's remaining HP fraction is strictly below
    /// the threshold. Unknown HP evaluates to false.
    TargetBelowHpFraction(f64),
    AttackIsMelee,
    AttackIsRanged,
    AdvantageIs(AdvantageState),
    /// Only the first attack of the turn qualifies.
    FirstAttackOnly,
    All(Vec<ConditionExpr>),
    Any(Vec<ConditionExpr>),
    Not(Box<ConditionExpr>),
}

/// The context a condition expression is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct EffectContext<'a> {
    pub target: &'a Target,
    pub combat: &'a CombatContext,
    pub attack_index: usize,
    pub is_melee: bool,
    pub advantage: AdvantageState,
}

impl ConditionExpr {
    /// Evaluate against a context. An expression nested past the depth
    /// bound fails closed: the whole evaluation is false, never a
    /// partially-negated result.
    pub fn evaluate(&self, context: &EffectContext<'_>) -> bool {
        self.evaluate_at_depth(context, 0).unwrap_or(false)
    }

    fn evaluate_at_depth(&self, context: &EffectContext<'_>, depth: u32) -> Option<bool> {
        if depth > MAX_CONDITION_DEPTH {
            return None;
        }
        let result = match self {
            ConditionExpr::Always => true,
            ConditionExpr::TargetHasCondition(condition) => context.target.has_condition(*condition),
            ConditionExpr::TargetIsType(target_type) => context.target.target_type == *target_type,
            ConditionExpr::TargetBelowHpFraction(threshold) => context
                .target
                .hp_fraction()
                .map(|fraction| fraction < *threshold)
                .unwrap_or(false),
            ConditionExpr::AttackIsMelee => context.is_melee,
            ConditionExpr::AttackIsRanged => !context.is_melee,
            ConditionExpr::AdvantageIs(state) => context.advantage == *state,
            ConditionExpr::FirstAttackOnly => context.attack_index == 0,
            ConditionExpr::All(expressions) => {
                for expression in expressions {
                    if !expression.evaluate_at_depth(context, depth + 1)? {
                        return Some(false);
                    }
                }
                true
            }
            ConditionExpr::Any(expressions) => {
                for expression in expressions {
                    if expression.evaluate_at_depth(context, depth + 1)? {
                        return Some(true);
                    }
                }
                false
            }
            ConditionExpr::Not(expression) => !expression.evaluate_at_depth(context, depth + 1)?,
        };
        Some(result)
    }
}

/// A homebrew effect as the engine sees it: trigger, gate, and numeric
/// payload. This is the exchange format for the (external, untrusted)
/// custom-effect editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectDescriptor {
    pub name: String,
    pub trigger: EffectTrigger,
    pub condition: ConditionExpr,
    /// Extra damage added when the effect fires.
    pub damage: Option<DamageSource>,
    /// Flat to-hit adjustment while the effect applies.
    pub attack_bonus_mod: i32,
    /// Flat damage adjustment while the effect applies.
    pub damage_bonus_mod: i32,
}

impl EffectDescriptor {
    pub fn new(name: impl Into<String>, trigger: EffectTrigger) -> Self {
        Self {
            name: name.into(),
            trigger,
            condition: ConditionExpr::Always,
            damage: None,
            attack_bonus_mod: 0,
            damage_bonus_mod: 0,
        }
    }

    pub fn with_condition(mut self, condition: ConditionExpr) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_damage(mut self, damage: DamageSource) -> Self {
        self.damage = Some(damage);
        self
    }

    pub fn with_attack_bonus_mod(mut self, bonus: i32) -> Self {
        self.attack_bonus_mod = bonus;
        self
    }

    pub fn with_damage_bonus_mod(mut self, bonus: i32) -> Self {
        self.damage_bonus_mod = bonus;
        self
    }
}

/// The descriptors with a given trigger whose conditions pass in this
/// context.
pub fn applicable<'a>(
    descriptors: &'a [EffectDescriptor],
    trigger: EffectTrigger,
    context: &EffectContext<'_>,
) -> Vec<&'a EffectDescriptor> {
    descriptors
        .iter()
        .filter(|d| d.trigger == trigger && d.condition.evaluate(context))
        .collect()
}
