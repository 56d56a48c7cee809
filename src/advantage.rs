//! Advantage source resolution.
//!
//! A catalog of independently-triggered advantage and disadvantage sources
//! is evaluated against the tactical context and merged into one net
//! [`AdvantageState`]. Any advantage plus any disadvantage cancels to
//! normal, regardless of counts; an uncancelled advantage upgrades to the
//! triple roll when the build has Elven Accuracy.

use crate::character::{CombatContext, Condition, CoverLevel, Target};
use crate::probability::AdvantageState;
use crate::stats::BuildStats;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// Whether a source grants advantage or imposes disadvantage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Advantage,
    Disadvantage,
}

/// The closed set of trigger predicates an advantage source can use.
/// Evaluated against the current context; never a user-supplied callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceCondition {
    Flanking,
    HiddenAttacker,
    TargetProneMelee,
    TargetProneRanged,
    TargetRestrained,
    TargetParalyzed,
    TargetStunned,
    TargetBlinded,
    TargetInvisible,
    AttackerBlinded,
    AttackerPoisoned,
    AttackerFrightened,
    AttackerProne,
    AttackerRestrained,
    LongRange,
    ThreeQuartersCover,
    DarknessWithoutDarkvision,
    RecklessAttack,
    PackTactics,
}

impl SourceCondition {
    fn evaluate(&self, stats: &BuildStats, target: &Target, combat: &CombatContext) -> bool {
        match self {
            SourceCondition::Flanking => combat.flanking && !stats.uses_ranged,
            SourceCondition::HiddenAttacker => combat.hidden,
            SourceCondition::TargetProneMelee => {
                target.has_condition(Condition::Prone) && !stats.uses_ranged
            }
            SourceCondition::TargetProneRanged => {
                target.has_condition(Condition::Prone) && stats.uses_ranged
            }
            SourceCondition::TargetRestrained => target.has_condition(Condition::Restrained),
            SourceCondition::TargetParalyzed => target.has_condition(Condition::Paralyzed),
            SourceCondition::TargetStunned => target.has_condition(Condition::Stunned),
            SourceCondition::TargetBlinded => target.has_condition(Condition::Blinded),
            SourceCondition::TargetInvisible => target.has_condition(Condition::Invisible),
            SourceCondition::AttackerBlinded => combat.attacker_has(Condition::Blinded),
            SourceCondition::AttackerPoisoned => combat.attacker_has(Condition::Poisoned),
            SourceCondition::AttackerFrightened => combat.attacker_has(Condition::Frightened),
            SourceCondition::AttackerProne => combat.attacker_has(Condition::Prone),
            SourceCondition::AttackerRestrained => combat.attacker_has(Condition::Restrained),
            SourceCondition::LongRange => combat.long_range && stats.uses_ranged,
            SourceCondition::ThreeQuartersCover => {
                matches!(combat.cover, CoverLevel::ThreeQuarters)
            }
            SourceCondition::DarknessWithoutDarkvision => {
                combat.darkness && !combat.attacker_darkvision
            }
            SourceCondition::RecklessAttack => {
                stats.has_reckless_attack && combat.reckless && !stats.uses_ranged
            }
            SourceCondition::PackTactics => stats.has_pack_tactics && combat.ally_adjacent,
        }
    }
}

/// One entry in the advantage source catalog.
#[derive(Debug, Clone, Serialize)]
pub struct AdvantageSource {
    pub id: &'static str,
    pub kind: SourceKind,
    pub condition: SourceCondition,
    pub description: &'static str,
}

lazy_static! {
    /// The standard advantage/disadvantage source catalog, in evaluation
    /// order.
    pub static ref ADVANTAGE_SOURCES: Vec<AdvantageSource> = vec![
        AdvantageSource {
            id: "flanking",
            kind: SourceKind::Advantage,
            condition: SourceCondition::Flanking,
            description: "Flanking the target with an ally",
        },
        AdvantageSource {
            id: "hidden",
            kind: SourceKind::Advantage,
            condition: SourceCondition::HiddenAttacker,
            description: "Attacking from hiding",
        },
        AdvantageSource {
            id: "target-prone-melee",
            kind: SourceKind::Advantage,
            condition: SourceCondition::TargetProneMelee,
            description: "Target is prone (melee attack)",
        },
        AdvantageSource {
            id: "target-restrained",
            kind: SourceKind::Advantage,
            condition: SourceCondition::TargetRestrained,
            description: "Target is restrained",
        },
        AdvantageSource {
            id: "target-paralyzed",
            kind: SourceKind::Advantage,
            condition: SourceCondition::TargetParalyzed,
            description: "Target is paralyzed",
        },
        AdvantageSource {
            id: "target-stunned",
            kind: SourceKind::Advantage,
            condition: SourceCondition::TargetStunned,
            description: "Target is stunned",
        },
        AdvantageSource {
            id: "target-blinded",
            kind: SourceKind::Advantage,
            condition: SourceCondition::TargetBlinded,
            description: "Target is blinded",
        },
        AdvantageSource {
            id: "reckless-attack",
            kind: SourceKind::Advantage,
            condition: SourceCondition::RecklessAttack,
            description: "Reckless Attack",
        },
        AdvantageSource {
            id: "pack-tactics",
            kind: SourceKind::Advantage,
            condition: SourceCondition::PackTactics,
            description: "Pack Tactics (ally adjacent to target)",
        },
        AdvantageSource {
            id: "target-prone-ranged",
            kind: SourceKind::Disadvantage,
            condition: SourceCondition::TargetProneRanged,
            description: "Target is prone (ranged attack)",
        },
        AdvantageSource {
            id: "target-invisible",
            kind: SourceKind::Disadvantage,
            condition: SourceCondition::TargetInvisible,
            description: "Target is invisible",
        },
        AdvantageSource {
            id: "attacker-blinded",
            kind: SourceKind::Disadvantage,
            condition: SourceCondition::AttackerBlinded,
            description: "Attacker is blinded",
        },
        AdvantageSource {
            id: "attacker-poisoned",
            kind: SourceKind::Disadvantage,
            condition: SourceCondition::AttackerPoisoned,
            description: "Attacker is poisoned",
        },
        AdvantageSource {
            id: "attacker-frightened",
            kind: SourceKind::Disadvantage,
            condition: SourceCondition::AttackerFrightened,
            description: "Attacker is frightened with the source in sight",
        },
        AdvantageSource {
            id: "attacker-prone",
            kind: SourceKind::Disadvantage,
            condition: SourceCondition::AttackerProne,
            description: "Attacker is prone",
        },
        AdvantageSource {
            id: "attacker-restrained",
            kind: SourceKind::Disadvantage,
            condition: SourceCondition::AttackerRestrained,
            description: "Attacker is restrained",
        },
        AdvantageSource {
            id: "long-range",
            kind: SourceKind::Disadvantage,
            condition: SourceCondition::LongRange,
            description: "Attacking at long range",
        },
        AdvantageSource {
            id: "three-quarters-cover",
            kind: SourceKind::Disadvantage,
            condition: SourceCondition::ThreeQuartersCover,
            description: "Target has three-quarters cover",
        },
        AdvantageSource {
            id: "darkness",
            kind: SourceKind::Disadvantage,
            condition: SourceCondition::DarknessWithoutDarkvision,
            description: "Fighting in darkness without darkvision",
        },
    ];
}

/// The outcome of advantage resolution, with the contributing sources
/// spelled out for display and test assertions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvantageAnalysis {
    pub state: AdvantageState,
    pub advantage_sources: Vec<String>,
    pub disadvantage_sources: Vec<String>,
    pub reasoning: String,
}

/// Resolve the standard catalog against the current context.
pub fn resolve(stats: &BuildStats, target: &Target, combat: &CombatContext) -> AdvantageAnalysis {
    resolve_with_sources(&ADVANTAGE_SOURCES, stats, target, combat)
}

/// Resolve an explicit source catalog, for callers that extend or replace
/// the standard one.
pub fn resolve_with_sources(
    sources: &[AdvantageSource],
    stats: &BuildStats,
    target: &Target,
    combat: &CombatContext,
) -> AdvantageAnalysis {
    let mut advantage_sources = Vec::new();
    let mut disadvantage_sources = Vec::new();

    for source in sources {
        if source.condition.evaluate(stats, target, combat) {
            match source.kind {
                SourceKind::Advantage => advantage_sources.push(source.description.to_string()),
                SourceKind::Disadvantage => {
                    disadvantage_sources.push(source.description.to_string())
                }
            }
        }
    }

    let (state, reasoning) = match (advantage_sources.is_empty(), disadvantage_sources.is_empty()) {
        (false, false) => (
            AdvantageState::Normal,
            format!(
                "Advantage ({}) cancels disadvantage ({}); attacks are normal.",
                advantage_sources.join(", "),
                disadvantage_sources.join(", ")
            ),
        ),
        (false, true) => {
            if stats.triple_advantage_capable {
                (
                    AdvantageState::TripleAdvantage,
                    format!(
                        "Advantage from {}; Elven Accuracy upgrades to a triple roll.",
                        advantage_sources.join(", ")
                    ),
                )
            } else {
                (
                    AdvantageState::Advantage,
                    format!("Advantage from {}.", advantage_sources.join(", ")),
                )
            }
        }
        (true, false) => (
            AdvantageState::Disadvantage,
            format!(
                "Disadvantage from {}.",
                disadvantage_sources.join(", ")
            ),
        ),
        (true, true) => (
            AdvantageState::Normal,
            "No advantage or disadvantage sources apply.".to_string(),
        ),
    };

    AdvantageAnalysis {
        state,
        advantage_sources,
        disadvantage_sources,
        reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{AbilityScores, Build};
    use crate::character::{ClassFeature, Feat};

    fn stats_for(build: &Build) -> BuildStats {
        BuildStats::derive(build)
    }

    fn basic_build() -> Build {
        Build::new("Test", 5, AbilityScores::new(16, 12, 14, 10, 10, 8))
    }

    #[test]
    fn test_no_sources() {
        let build = basic_build();
        let analysis = resolve(
            &stats_for(&build),
            &Target::new(15),
            &CombatContext::new(),
        );
        assert_eq!(analysis.state, AdvantageState::Normal);
        assert!(analysis.advantage_sources.is_empty());
        assert_eq!(
            analysis.reasoning,
            "No advantage or disadvantage sources apply."
        );
    }

    #[test]
    fn test_single_advantage() {
        let build = basic_build();
        let combat = CombatContext {
            flanking: true,
            ..CombatContext::new()
        };
        let analysis = resolve(&stats_for(&build), &Target::new(15), &combat);
        assert_eq!(analysis.state, AdvantageState::Advantage);
        assert_eq!(
            analysis.advantage_sources,
            vec!["Flanking the target with an ally".to_string()]
        );
    }

    #[test]
    fn test_cancellation_ignores_counts() {
        // Two advantage sources against one disadvantage still cancels.
        let build = basic_build();
        let target = Target::new(15).with_condition(Condition::Restrained);
        let combat = CombatContext {
            flanking: true,
            darkness: true,
            ..CombatContext::new()
        };
        let analysis = resolve(&stats_for(&build), &target, &combat);
        assert_eq!(analysis.state, AdvantageState::Normal);
        assert_eq!(analysis.advantage_sources.len(), 2);
        assert_eq!(analysis.disadvantage_sources.len(), 1);
        assert!(analysis.reasoning.contains("cancels"));
    }

    #[test]
    fn test_elven_accuracy_upgrade() {
        let build = basic_build().with_feat(Feat::ElvenAccuracy);
        let combat = CombatContext {
            hidden: true,
            ..CombatContext::new()
        };
        let analysis = resolve(&stats_for(&build), &Target::new(15), &combat);
        assert_eq!(analysis.state, AdvantageState::TripleAdvantage);
        assert!(analysis.reasoning.contains("Elven Accuracy"));
    }

    #[test]
    fn test_disadvantage_only() {
        let build = basic_build();
        let mut combat = CombatContext::new();
        combat.attacker_conditions.insert(Condition::Poisoned);
        let analysis = resolve(&stats_for(&build), &Target::new(15), &combat);
        assert_eq!(analysis.state, AdvantageState::Disadvantage);
        assert_eq!(
            analysis.disadvantage_sources,
            vec!["Attacker is poisoned".to_string()]
        );
    }

    #[test]
    fn test_reckless_requires_feature() {
        let combat = CombatContext {
            reckless: true,
            ..CombatContext::new()
        };

        let plain = basic_build();
        let analysis = resolve(&stats_for(&plain), &Target::new(15), &combat);
        assert_eq!(analysis.state, AdvantageState::Normal);

        let barbarian = basic_build().with_feature(ClassFeature::RecklessAttack);
        let analysis = resolve(&stats_for(&barbarian), &Target::new(15), &combat);
        assert_eq!(analysis.state, AdvantageState::Advantage);
    }

    #[test]
    fn test_prone_direction_sensitive() {
        use crate::character::{Weapon, WeaponProperty};
        use crate::dice::{DamageType, DiceExpression};

        let target = Target::new(15).with_condition(Condition::Prone);
        let combat = CombatContext::new();

        let melee = basic_build();
        let analysis = resolve(&stats_for(&melee), &target, &combat);
        assert_eq!(analysis.state, AdvantageState::Advantage);

        let archer = basic_build().with_main_hand(
            Weapon::new("Longbow", DiceExpression::new(1, 8, 0), DamageType::Piercing)
                .with_properties(vec![WeaponProperty::Ranged]),
        );
        let analysis = resolve(&stats_for(&archer), &target, &combat);
        assert_eq!(analysis.state, AdvantageState::Disadvantage);
    }
}
