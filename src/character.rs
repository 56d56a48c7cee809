//! Immutable build, target, and combat-context snapshots.
//!
//! These are constructed by the (out-of-scope) editor layer and passed by
//! value into every engine call. The engine itself holds no build-scoped
//! state; the only mutable entity is the
//! [`ResourceManager`](crate::resources::ResourceManager).

use crate::damage::DamageSource;
use crate::dice::{DamageType, DiceExpression};
use crate::effects::EffectDescriptor;
use crate::once_per_turn::OncePerTurnEffect;
use crate::policy::BuildPolicies;
use crate::resources::PoolSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildId(pub Uuid);

impl BuildId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BuildId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

/// Ability scores container. Validated to [1, 30] by the upstream schema
/// layer; the engine only reads them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl AbilityScores {
    pub fn new(str: u8, dex: u8, con: u8, int: u8, wis: u8, cha: u8) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    pub fn score(&self, ability: Ability) -> u8 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    /// Standard 5e modifier: (score - 10) / 2, rounded down.
    pub fn modifier(&self, ability: Ability) -> i32 {
        (self.score(ability) as i32 - 10).div_euclid(2)
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// The 5e condition list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Blinded,
    Charmed,
    Deafened,
    Frightened,
    Grappled,
    Incapacitated,
    Invisible,
    Paralyzed,
    Petrified,
    Poisoned,
    Prone,
    Restrained,
    Stunned,
    Unconscious,
}

impl Condition {
    pub fn name(&self) -> &'static str {
        match self {
            Condition::Blinded => "Blinded",
            Condition::Charmed => "Charmed",
            Condition::Deafened => "Deafened",
            Condition::Frightened => "Frightened",
            Condition::Grappled => "Grappled",
            Condition::Incapacitated => "Incapacitated",
            Condition::Invisible => "Invisible",
            Condition::Paralyzed => "Paralyzed",
            Condition::Petrified => "Petrified",
            Condition::Poisoned => "Poisoned",
            Condition::Prone => "Prone",
            Condition::Restrained => "Restrained",
            Condition::Stunned => "Stunned",
            Condition::Unconscious => "Unconscious",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Weapons
// ============================================================================

/// Weapon properties relevant to attack analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponProperty {
    Finesse,
    Light,
    Heavy,
    Reach,
    Thrown,
    TwoHanded,
    Versatile,
    Ranged,
    Loading,
}

/// A weapon as the damage analysis sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    pub damage: DiceExpression,
    pub damage_type: DamageType,
    pub properties: Vec<WeaponProperty>,
}

impl Weapon {
    pub fn new(name: impl Into<String>, damage: DiceExpression, damage_type: DamageType) -> Self {
        Self {
            name: name.into(),
            damage,
            damage_type,
            properties: Vec::new(),
        }
    }

    pub fn with_properties(mut self, properties: Vec<WeaponProperty>) -> Self {
        self.properties = properties;
        self
    }

    pub fn has_property(&self, property: WeaponProperty) -> bool {
        self.properties.contains(&property)
    }

    pub fn is_finesse(&self) -> bool {
        self.has_property(WeaponProperty::Finesse)
    }

    pub fn is_ranged(&self) -> bool {
        self.has_property(WeaponProperty::Ranged)
    }

    pub fn is_light(&self) -> bool {
        self.has_property(WeaponProperty::Light)
    }

    pub fn is_heavy(&self) -> bool {
        self.has_property(WeaponProperty::Heavy)
    }

    pub fn is_two_handed(&self) -> bool {
        self.has_property(WeaponProperty::TwoHanded)
    }
}

// ============================================================================
// Styles, Feats, Features
// ============================================================================

/// Fighting styles that affect the to-hit/damage math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FightingStyle {
    Archery,
    Defense,
    Dueling,
    GreatWeaponFighting,
    TwoWeaponFighting,
}

/// Feats with combat-math consequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feat {
    Sharpshooter,
    GreatWeaponMaster,
    ElvenAccuracy,
    CrossbowExpert,
    PolearmMaster,
    ElementalAdept,
}

/// Class features with combat-math consequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassFeature {
    RecklessAttack,
    PackTactics,
    /// Crit on 19-20.
    ImprovedCritical,
    /// Crit on 18-20.
    SuperiorCritical,
}

// ============================================================================
// Build
// ============================================================================

/// An immutable character-build snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    pub id: BuildId,
    pub name: String,
    pub level: u8,
    pub ability_scores: AbilityScores,
    pub main_hand: Option<Weapon>,
    pub off_hand: Option<Weapon>,
    pub fighting_styles: HashSet<FightingStyle>,
    pub feats: HashSet<Feat>,
    pub features: HashSet<ClassFeature>,
    /// Overrides the level-derived attacks-per-turn count when set.
    pub attacks_override: Option<u32>,
    /// Limited-use bonus-damage effects (sneak attack, smite, ...).
    pub once_per_turn_effects: Vec<OncePerTurnEffect>,
    /// Per-hit rider from a precast concentration spell (hunter's mark,
    /// hex, ...).
    pub concentration_effect: Option<DamageSource>,
    /// Homebrew effect descriptors, interpreted by the effects DSL.
    pub custom_effects: Vec<EffectDescriptor>,
    /// Caster level for spell-slot initialization; 0 for non-casters.
    pub caster_level: u8,
    /// Class resource pools (ki, superiority dice, ...).
    pub resource_pools: Vec<PoolSpec>,
    pub policies: BuildPolicies,
}

impl Build {
    pub fn new(name: impl Into<String>, level: u8, ability_scores: AbilityScores) -> Self {
        Self {
            id: BuildId::new(),
            name: name.into(),
            level,
            ability_scores,
            main_hand: None,
            off_hand: None,
            fighting_styles: HashSet::new(),
            feats: HashSet::new(),
            features: HashSet::new(),
            attacks_override: None,
            once_per_turn_effects: Vec::new(),
            concentration_effect: None,
            custom_effects: Vec::new(),
            caster_level: 0,
            resource_pools: Vec::new(),
            policies: BuildPolicies::default(),
        }
    }

    pub fn with_main_hand(mut self, weapon: Weapon) -> Self {
        self.main_hand = Some(weapon);
        self
    }

    pub fn with_off_hand(mut self, weapon: Weapon) -> Self {
        self.off_hand = Some(weapon);
        self
    }

    pub fn with_fighting_style(mut self, style: FightingStyle) -> Self {
        self.fighting_styles.insert(style);
        self
    }

    pub fn with_feat(mut self, feat: Feat) -> Self {
        self.feats.insert(feat);
        self
    }

    pub fn with_feature(mut self, feature: ClassFeature) -> Self {
        self.features.insert(feature);
        self
    }

    pub fn with_once_per_turn_effect(mut self, effect: OncePerTurnEffect) -> Self {
        self.once_per_turn_effects.push(effect);
        self
    }

    pub fn with_concentration_effect(mut self, source: DamageSource) -> Self {
        self.concentration_effect = Some(source);
        self
    }

    pub fn with_custom_effect(mut self, effect: EffectDescriptor) -> Self {
        self.custom_effects.push(effect);
        self
    }

    pub fn with_caster_level(mut self, level: u8) -> Self {
        self.caster_level = level;
        self
    }

    pub fn with_resource_pool(mut self, spec: PoolSpec) -> Self {
        self.resource_pools.push(spec);
        self
    }

    pub fn with_policies(mut self, policies: BuildPolicies) -> Self {
        self.policies = policies;
        self
    }

    pub fn has_feat(&self, feat: Feat) -> bool {
        self.feats.contains(&feat)
    }

    pub fn has_feature(&self, feature: ClassFeature) -> bool {
        self.features.contains(&feature)
    }

    pub fn has_style(&self, style: FightingStyle) -> bool {
        self.fighting_styles.contains(&style)
    }
}

// ============================================================================
// Target
// ============================================================================

/// Broad creature categories, used for targeting priority and effect
/// conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[default]
    Humanoid,
    Beast,
    Undead,
    Fiend,
    Dragon,
    Construct,
    Elemental,
    Other,
}

/// An immutable target snapshot. AC is validated to [5, 30] upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub armor_class: i32,
    pub resistances: HashSet<DamageType>,
    pub immunities: HashSet<DamageType>,
    pub vulnerabilities: HashSet<DamageType>,
    pub current_hp: Option<i32>,
    pub max_hp: Option<i32>,
    pub conditions: HashSet<Condition>,
    pub target_type: TargetType,
}

impl Target {
    pub fn new(armor_class: i32) -> Self {
        Self {
            armor_class,
            resistances: HashSet::new(),
            immunities: HashSet::new(),
            vulnerabilities: HashSet::new(),
            current_hp: None,
            max_hp: None,
            conditions: HashSet::new(),
            target_type: TargetType::default(),
        }
    }

    pub fn with_resistance(mut self, damage_type: DamageType) -> Self {
        self.resistances.insert(damage_type);
        self
    }

    pub fn with_immunity(mut self, damage_type: DamageType) -> Self {
        self.immunities.insert(damage_type);
        self
    }

    pub fn with_vulnerability(mut self, damage_type: DamageType) -> Self {
        self.vulnerabilities.insert(damage_type);
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.insert(condition);
        self
    }

    pub fn with_hp(mut self, current: i32, max: i32) -> Self {
        self.current_hp = Some(current);
        self.max_hp = Some(max);
        self
    }

    pub fn with_type(mut self, target_type: TargetType) -> Self {
        self.target_type = target_type;
        self
    }

    pub fn has_condition(&self, condition: Condition) -> bool {
        self.conditions.contains(&condition)
    }

    /// Remaining HP as a fraction of maximum, when both are known.
    pub fn hp_fraction(&self) -> Option<f64> {
        match (self.current_hp, self.max_hp) {
            (Some(current), Some(max)) if max > 0 => {
                Some((current.max(0) as f64 / max as f64).min(1.0))
            }
            _ => None,
        }
    }
}

// ============================================================================
// Combat Context
// ============================================================================

/// Degree of cover between attacker and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CoverLevel {
    #[default]
    None,
    Half,
    ThreeQuarters,
    Total,
}

/// An immutable snapshot of the tactical situation for one round.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CombatContext {
    pub round: u32,
    /// Attacker and an ally are on opposite sides of the target.
    pub flanking: bool,
    /// Attacker is hidden/unseen by the target.
    pub hidden: bool,
    /// Attacking at long range.
    pub long_range: bool,
    pub cover: CoverLevel,
    /// Fighting in darkness.
    pub darkness: bool,
    pub attacker_darkvision: bool,
    /// An ally is within 5 feet of the target (pack tactics).
    pub ally_adjacent: bool,
    /// Reckless Attack declared this turn.
    pub reckless: bool,
    pub attacker_conditions: HashSet<Condition>,
}

impl CombatContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attacker_has(&self, condition: Condition) -> bool {
        self.attacker_conditions.contains(&condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ability_modifiers() {
        let scores = AbilityScores::new(16, 14, 13, 10, 8, 7);
        assert_eq!(scores.modifier(Ability::Strength), 3);
        assert_eq!(scores.modifier(Ability::Dexterity), 2);
        assert_eq!(scores.modifier(Ability::Constitution), 1);
        assert_eq!(scores.modifier(Ability::Intelligence), 0);
        assert_eq!(scores.modifier(Ability::Wisdom), -1);
        assert_eq!(scores.modifier(Ability::Charisma), -2);
    }

    #[test]
    fn test_hp_fraction() {
        let target = Target::new(15).with_hp(25, 100);
        assert_eq!(target.hp_fraction(), Some(0.25));

        let unknown = Target::new(15);
        assert_eq!(unknown.hp_fraction(), None);

        let overhealed = Target::new(15).with_hp(120, 100);
        assert_eq!(overhealed.hp_fraction(), Some(1.0));
    }

    #[test]
    fn test_weapon_properties() {
        let weapon = Weapon::new("Rapier", DiceExpression::new(1, 8, 0), DamageType::Piercing)
            .with_properties(vec![WeaponProperty::Finesse]);
        assert!(weapon.is_finesse());
        assert!(!weapon.is_ranged());
        assert!(!weapon.is_heavy());
    }

    #[test]
    fn test_build_builder() {
        let build = Build::new("Test Fighter", 5, AbilityScores::new(16, 12, 14, 10, 10, 8))
            .with_feat(Feat::GreatWeaponMaster)
            .with_fighting_style(FightingStyle::GreatWeaponFighting);
        assert!(build.has_feat(Feat::GreatWeaponMaster));
        assert!(build.has_style(FightingStyle::GreatWeaponFighting));
        assert!(!build.has_feat(Feat::Sharpshooter));
    }
}
