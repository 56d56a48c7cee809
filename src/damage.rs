//! Expected-damage aggregation.
//!
//! Sums tagged damage sources into a per-attack expectation, doubling dice
//! on crits per source, applying reroll mechanics, and folding in target
//! resistance, immunity, and vulnerability exactly once per damage type.

use crate::character::Target;
use crate::dice::{DamageType, DiceExpression, RerollMechanic};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a damage source comes from. Resistance applies per damage type,
/// but the origin matters for power attack (+10 lands on the weapon) and
/// display grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageOrigin {
    Weapon,
    Spell,
    Feature,
}

/// One named contribution to an attack's damage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DamageSource {
    pub name: String,
    pub dice: DiceExpression,
    pub damage_type: DamageType,
    pub origin: DamageOrigin,
    /// Whether a critical hit doubles this source's dice.
    pub on_crit_double: bool,
    pub reroll: RerollMechanic,
}

impl DamageSource {
    pub fn new(
        name: impl Into<String>,
        dice: DiceExpression,
        damage_type: DamageType,
        origin: DamageOrigin,
    ) -> Self {
        Self {
            name: name.into(),
            dice,
            damage_type,
            origin,
            on_crit_double: true,
            reroll: RerollMechanic::None,
        }
    }

    pub fn weapon(name: impl Into<String>, dice: DiceExpression, damage_type: DamageType) -> Self {
        Self::new(name, dice, damage_type, DamageOrigin::Weapon)
    }

    pub fn spell(name: impl Into<String>, dice: DiceExpression, damage_type: DamageType) -> Self {
        Self::new(name, dice, damage_type, DamageOrigin::Spell)
    }

    pub fn feature(name: impl Into<String>, dice: DiceExpression, damage_type: DamageType) -> Self {
        Self::new(name, dice, damage_type, DamageOrigin::Feature)
    }

    pub fn with_reroll(mut self, reroll: RerollMechanic) -> Self {
        self.reroll = reroll;
        self
    }

    /// Flat effects (a paladin aura, a magic item rider) keep their value
    /// on a crit instead of doubling.
    pub fn without_crit_double(mut self) -> Self {
        self.on_crit_double = false;
        self
    }

    /// Expected value of this source for a normal hit or a crit.
    pub fn expected_value(&self, is_crit: bool) -> f64 {
        let dice = if is_crit && self.on_crit_double {
            self.dice.doubled()
        } else {
            self.dice
        };
        dice.expected_with_reroll(self.reroll)
    }
}

/// Per-type damage totals after target defenses, plus the per-source
/// contributions before them.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DamageBreakdown {
    /// Expected damage per type, after resistance/immunity/vulnerability.
    pub by_type: BTreeMap<DamageType, f64>,
    /// Per-source expected values before target defenses.
    pub entries: Vec<DamageEntry>,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageEntry {
    pub name: String,
    pub damage_type: DamageType,
    pub expected: f64,
}

impl DamageBreakdown {
    /// Fold another breakdown into this one.
    pub fn merge(&mut self, other: DamageBreakdown) {
        for (damage_type, value) in other.by_type {
            *self.by_type.entry(damage_type).or_insert(0.0) += value;
        }
        self.entries.extend(other.entries);
        self.total += other.total;
    }

    /// Scale every total by a constant factor.
    pub fn scale(&mut self, factor: f64) {
        for value in self.by_type.values_mut() {
            *value *= factor;
        }
        for entry in &mut self.entries {
            entry.expected *= factor;
        }
        self.total *= factor;
    }
}

/// A resolved attack routine: probabilities plus the damage rolled on a
/// hit and the extra dice rolled only on a crit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackSequence {
    pub hit_probability: f64,
    pub crit_probability: f64,
    pub normal_damage: Vec<DamageSource>,
    /// Additional sources that apply only on a critical hit (brutal
    /// critical dice and the like), on top of `normal_damage`.
    pub crit_damage: Vec<DamageSource>,
    pub num_attacks: u32,
}

impl AttackSequence {
    pub fn new(hit_probability: f64, crit_probability: f64, num_attacks: u32) -> Self {
        Self {
            hit_probability,
            crit_probability: crit_probability.min(hit_probability),
            normal_damage: Vec::new(),
            crit_damage: Vec::new(),
            num_attacks: num_attacks.max(1),
        }
    }

    pub fn with_damage(mut self, source: DamageSource) -> Self {
        self.normal_damage.push(source);
        self
    }

    pub fn with_crit_damage(mut self, source: DamageSource) -> Self {
        self.crit_damage.push(source);
        self
    }
}

/// Apply immunity, resistance, and vulnerability to one damage-type
/// total. Precedence: immunity, then resistance, then vulnerability;
/// exactly one transform applies.
fn apply_target_defenses(target: &Target, damage_type: DamageType, value: f64) -> f64 {
    if target.immunities.contains(&damage_type) {
        0.0
    } else if target.resistances.contains(&damage_type) {
        (value / 2.0).floor()
    } else if target.vulnerabilities.contains(&damage_type) {
        value * 2.0
    } else {
        value
    }
}

/// Sum damage sources into a per-type breakdown.
///
/// Crit doubling and reroll mechanics are applied per source; target
/// defenses are applied once per damage-type total, never per source.
pub fn total(
    sources: &[DamageSource],
    is_crit: bool,
    target: Option<&Target>,
) -> DamageBreakdown {
    let mut by_type: BTreeMap<DamageType, f64> = BTreeMap::new();
    let mut entries = Vec::with_capacity(sources.len());

    for source in sources {
        let expected = source.expected_value(is_crit);
        *by_type.entry(source.damage_type).or_insert(0.0) += expected;
        entries.push(DamageEntry {
            name: source.name.clone(),
            damage_type: source.damage_type,
            expected,
        });
    }

    if let Some(target) = target {
        for (damage_type, value) in by_type.iter_mut() {
            *value = apply_target_defenses(target, *damage_type, *value);
        }
    }

    let total = by_type.values().sum();
    DamageBreakdown {
        by_type,
        entries,
        total,
    }
}

/// Expected damage per round for a full attack sequence, decomposed by
/// damage type.
///
/// Normal hits land with probability `hit - crit` and crits with
/// probability `crit`; crit damage aggregates the normal sources (dice
/// doubled) plus the crit-only sources.
pub fn dpr_breakdown(sequence: &AttackSequence, target: Option<&Target>) -> DamageBreakdown {
    let normal_hit = (sequence.hit_probability - sequence.crit_probability).max(0.0);

    let mut normal = total(&sequence.normal_damage, false, target);
    normal.scale(normal_hit);

    let combined: Vec<DamageSource> = sequence
        .normal_damage
        .iter()
        .chain(sequence.crit_damage.iter())
        .cloned()
        .collect();
    let mut crit = total(&combined, true, target);
    crit.scale(sequence.crit_probability);

    normal.merge(crit);
    normal.scale(sequence.num_attacks as f64);

    // The normal and crit branches list the same sources; fold them into
    // one entry each.
    let mut entries: Vec<DamageEntry> = Vec::new();
    for entry in normal.entries.drain(..) {
        match entries
            .iter_mut()
            .find(|e| e.name == entry.name && e.damage_type == entry.damage_type)
        {
            Some(existing) => existing.expected += entry.expected,
            None => entries.push(entry),
        }
    }
    normal.entries = entries;
    normal
}

/// Expected damage per round for a full attack sequence.
pub fn dpr(sequence: &AttackSequence, target: Option<&Target>) -> f64 {
    dpr_breakdown(sequence, target).total
}
