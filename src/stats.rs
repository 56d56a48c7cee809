//! Derived build statistics.
//!
//! Attack bonus, damage bonus, attacks per turn, crit range, and fighting
//! style adjustments are all derived here, once, and consumed by every
//! downstream component. Keeping a single deriver stops the to-hit math
//! from drifting between near-duplicate implementations.

use crate::character::{Ability, Build, ClassFeature, Feat, FightingStyle, Weapon};
use crate::dice::RerollMechanic;
use crate::items;

/// Everything downstream components need to know about a build's attack
/// routine, derived once per analysis.
#[derive(Debug, Clone)]
pub struct BuildStats {
    pub proficiency_bonus: i32,
    /// Main-hand to-hit bonus (ability + proficiency + style).
    pub attack_bonus: i32,
    /// Main-hand flat damage bonus (ability + style).
    pub damage_bonus: i32,
    /// Off-hand flat damage bonus; zero without Two-Weapon Fighting.
    pub off_hand_damage_bonus: i32,
    /// Main-hand attacks per turn.
    pub num_attacks: u32,
    /// Number of crit faces (1 = 20 only, 2 = 19-20, 3 = 18-20).
    pub crit_range: u32,
    /// Reroll mechanic applied to main-hand weapon dice.
    pub weapon_reroll: RerollMechanic,
    pub uses_ranged: bool,
    /// The power-attack feat this build qualifies for, if any.
    pub power_attack_feat: Option<Feat>,
    /// Elven Accuracy: advantage upgrades to roll-three-keep-best.
    pub triple_advantage_capable: bool,
    pub has_reckless_attack: bool,
    pub has_pack_tactics: bool,
    /// Resolved main hand; unarmed strike when the build carries none.
    pub main_hand: Weapon,
    pub off_hand: Option<Weapon>,
}

impl BuildStats {
    /// Derive the full stat block from a build snapshot.
    pub fn derive(build: &Build) -> BuildStats {
        let main_hand = build
            .main_hand
            .clone()
            .unwrap_or_else(items::unarmed_strike);
        let off_hand = build.off_hand.clone();

        let proficiency_bonus = proficiency_bonus(build.level);
        let str_mod = build.ability_scores.modifier(Ability::Strength);
        let dex_mod = build.ability_scores.modifier(Ability::Dexterity);

        // Ranged: DEX. Finesse: better of STR/DEX. Melee: STR.
        let uses_ranged = main_hand.is_ranged();
        let ability_mod = if uses_ranged {
            dex_mod
        } else if main_hand.is_finesse() {
            str_mod.max(dex_mod)
        } else {
            str_mod
        };

        let style_hit_bonus = if uses_ranged && build.has_style(FightingStyle::Archery) {
            2
        } else {
            0
        };
        let attack_bonus = ability_mod + proficiency_bonus + style_hit_bonus;

        let dueling = build.has_style(FightingStyle::Dueling)
            && !uses_ranged
            && !main_hand.is_two_handed()
            && off_hand.is_none();
        let damage_bonus = ability_mod + if dueling { 2 } else { 0 };

        let off_hand_damage_bonus = if build.has_style(FightingStyle::TwoWeaponFighting) {
            ability_mod
        } else {
            0
        };

        let num_attacks = build.attacks_override.unwrap_or_else(|| attacks_at_level(build.level));

        let crit_range = if build.has_feature(ClassFeature::SuperiorCritical) {
            3
        } else if build.has_feature(ClassFeature::ImprovedCritical) {
            2
        } else {
            1
        };

        let weapon_reroll = if build.has_style(FightingStyle::GreatWeaponFighting)
            && !uses_ranged
            && main_hand.is_two_handed()
        {
            RerollMechanic::RerollLow
        } else {
            RerollMechanic::None
        };

        let power_attack_feat = if uses_ranged && build.has_feat(Feat::Sharpshooter) {
            Some(Feat::Sharpshooter)
        } else if !uses_ranged && main_hand.is_heavy() && build.has_feat(Feat::GreatWeaponMaster) {
            Some(Feat::GreatWeaponMaster)
        } else {
            None
        };

        BuildStats {
            proficiency_bonus,
            attack_bonus,
            damage_bonus,
            off_hand_damage_bonus,
            num_attacks,
            crit_range,
            weapon_reroll,
            uses_ranged,
            power_attack_feat,
            triple_advantage_capable: build.has_feat(Feat::ElvenAccuracy),
            has_reckless_attack: build.has_feature(ClassFeature::RecklessAttack),
            has_pack_tactics: build.has_feature(ClassFeature::PackTactics),
            main_hand,
            off_hand,
        }
    }

    /// Total attacks per turn, counting the off-hand bonus attack.
    pub fn total_attacks(&self) -> u32 {
        self.num_attacks + if self.off_hand.is_some() { 1 } else { 0 }
    }
}

/// Proficiency bonus by character level: +2 at 1st, +6 at 17th.
pub fn proficiency_bonus(level: u8) -> i32 {
    2 + (level.clamp(1, 20) as i32 - 1) / 4
}

/// Martial attacks-per-turn progression: 1, then 2 at 5th, 3 at 11th,
/// 4 at 20th.
pub fn attacks_at_level(level: u8) -> u32 {
    match level {
        0..=4 => 1,
        5..=10 => 2,
        11..=19 => 3,
        _ => 4,
    }
}
