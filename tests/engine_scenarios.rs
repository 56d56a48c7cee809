//! End-to-end scenarios through the public API.
//!
//! These exercise the full pipeline the way a build editor would: snapshot
//! in, analysis record out, with resource state carried across rounds.

use dpr_core::character::{AbilityScores, Build, Condition, Feat, Weapon, WeaponProperty};
use dpr_core::damage::DamageSource;
use dpr_core::dice::{DamageType, DiceExpression};
use dpr_core::once_per_turn::{self, OncePerTurnEffect, OncePerTurnPolicy};
use dpr_core::orchestrator::{resources_for_build, DprOrchestrator};
use dpr_core::power_attack;
use dpr_core::probability::{AdvantageState, AttackProbability};
use dpr_core::resources::{ResourceCost, ResourceManager};
use dpr_core::{AttackSequence, CombatContext, Target};

fn greatsword() -> Weapon {
    Weapon::new(
        "Greatsword",
        DiceExpression::new(2, 6, 0),
        DamageType::Slashing,
    )
    .with_properties(vec![WeaponProperty::Heavy, WeaponProperty::TwoHanded])
}

fn longbow() -> Weapon {
    Weapon::new("Longbow", DiceExpression::new(1, 8, 0), DamageType::Piercing).with_properties(
        vec![
            WeaponProperty::Ranged,
            WeaponProperty::Heavy,
            WeaponProperty::TwoHanded,
        ],
    )
}

#[test]
fn sharpshooter_break_even_matches_curve_crossing() {
    // Sharpshooter at +7 with a 1d8+3 longbow: the spec's canonical
    // break-even scenario. The computed threshold must be the point
    // where the favorable run ends.
    let sequence = AttackSequence::new(0.0, 0.0, 1).with_damage(DamageSource::weapon(
        "Longbow",
        DiceExpression::new(1, 8, 3),
        DamageType::Piercing,
    ));
    let break_even = power_attack::break_even_ac(7, &sequence, AdvantageState::Normal, 1, None);

    let rows = power_attack::sweep(7, &sequence, AdvantageState::Normal, 1, None, 10..=30);
    for row in &rows {
        if row.ac <= break_even {
            assert!(
                row.power_attack_dpr + 1e-9 >= row.normal_dpr,
                "power attack should be favorable at AC {}",
                row.ac
            );
        } else if row.ac == break_even + 1 {
            assert!(
                row.normal_dpr > row.power_attack_dpr,
                "baseline should win just past the break-even AC"
            );
        }
    }

    // At the boundary the curves are equal to within one AC step of the
    // steeper curve.
    let boundary = rows.iter().find(|r| r.ac == break_even).unwrap();
    assert!((boundary.power_attack_dpr - boundary.normal_dpr).abs() < 17.5 / 20.0);
}

#[test]
fn smite_consumes_highest_slots_first_across_rounds() {
    let smite = OncePerTurnEffect::new(
        "Divine Smite",
        10,
        DamageSource::feature(
            "Divine Smite",
            DiceExpression::new(2, 8, 0),
            DamageType::Radiant,
        ),
    )
    .with_resource_cost(ResourceCost::spell_slot(1));

    let build = Build::new("Paladin", 5, AbilityScores::new(16, 10, 14, 8, 10, 16))
        .with_main_hand(greatsword())
        .with_once_per_turn_effect(smite);

    // Half-caster slots at level 5: four 1st, two 2nd.
    let mut resources = ResourceManager::half_caster(5);
    let target = Target::new(15);
    let result = DprOrchestrator::with_rounds(8).analyze(
        &build,
        &target,
        &CombatContext::new(),
        &mut resources,
    );

    // Six slots feed six rounds of smites; rounds seven and eight go dry.
    assert_eq!(result.resource_usage.len(), 6);
    assert_eq!(result.resource_usage[0].slot_level, Some(2));
    assert_eq!(result.resource_usage[1].slot_level, Some(2));
    assert_eq!(result.resource_usage[2].slot_level, Some(1));
    assert!(result.dpr.by_round[5].once_per_turn > 0.0);
    assert_eq!(result.dpr.by_round[6].once_per_turn, 0.0);
    assert_eq!(result.dpr.by_round[7].once_per_turn, 0.0);

    // A long rest restores every level to its maximum exactly.
    resources.long_rest();
    assert_eq!(resources.slots()[0].available(), 4);
    assert_eq!(resources.slots()[1].available(), 2);
}

#[test]
fn best_hit_policy_dominates_first_hit() {
    // First attack at disadvantage, second clean: the optimal placement
    // is the second attack, and bestHit must never do worse than
    // firstHit.
    let sneak = OncePerTurnEffect::new(
        "Sneak Attack",
        5,
        DamageSource::feature(
            "Sneak Attack",
            DiceExpression::new(3, 6, 0),
            DamageType::Piercing,
        ),
    );
    let attacks = [
        AttackProbability {
            state: AdvantageState::Disadvantage,
            needed_roll: 11,
            hit: 0.25,
            crit: 0.0025,
        },
        AttackProbability {
            state: AdvantageState::Normal,
            needed_roll: 11,
            hit: 0.50,
            crit: 0.05,
        },
    ];
    let target = Target::new(15);
    let combat = CombatContext::new();
    let analysis = once_per_turn::analyze(&[sneak], &target, &combat, &attacks, false);

    let first = once_per_turn::apply_policy(&analysis, OncePerTurnPolicy::FirstHit).unwrap();
    let best = once_per_turn::apply_policy(&analysis, OncePerTurnPolicy::BestHit).unwrap();
    assert_eq!(first.attack_index, 0);
    assert_eq!(best.attack_index, 1);
    assert!(best.expected_damage >= first.expected_damage);
}

#[test]
fn advantage_raises_dpr() {
    let build = Build::new("Fighter", 5, AbilityScores::new(16, 12, 14, 10, 10, 8))
        .with_main_hand(greatsword());
    let target = Target::new(16);
    let orchestrator = DprOrchestrator::with_rounds(1);

    let mut resources = resources_for_build(&build);
    let flat = orchestrator
        .analyze(&build, &target, &CombatContext::new(), &mut resources)
        .dpr
        .total;

    let flanking = CombatContext {
        flanking: true,
        ..CombatContext::new()
    };
    let mut resources = resources_for_build(&build);
    let advantaged = orchestrator
        .analyze(&build, &target, &flanking, &mut resources)
        .dpr
        .total;

    assert!(advantaged > flat);
}

#[test]
fn resistance_halves_weapon_damage() {
    let build = Build::new("Fighter", 5, AbilityScores::new(16, 12, 14, 10, 10, 8))
        .with_main_hand(greatsword());
    let orchestrator = DprOrchestrator::with_rounds(1);

    let mut resources = resources_for_build(&build);
    let plain = orchestrator
        .analyze(&build, &Target::new(16), &CombatContext::new(), &mut resources)
        .dpr
        .total;

    let mut resources = resources_for_build(&build);
    let resisted = orchestrator
        .analyze(
            &build,
            &Target::new(16).with_resistance(DamageType::Slashing),
            &CombatContext::new(),
            &mut resources,
        )
        .dpr
        .total;

    assert!(resisted < plain);
    // Floor rounding keeps the resisted value at or above a strict half.
    assert!(resisted >= plain / 2.0 - 1.0);
}

#[test]
fn paralyzed_target_grants_advantage_and_notes_it() {
    let build = Build::new("Fighter", 5, AbilityScores::new(16, 12, 14, 10, 10, 8))
        .with_main_hand(greatsword());
    let target = Target::new(16).with_condition(Condition::Paralyzed);
    let mut resources = resources_for_build(&build);
    let result = DprOrchestrator::with_rounds(1).analyze(
        &build,
        &target,
        &CombatContext::new(),
        &mut resources,
    );

    let normal_hit = result.hit_chances[&AdvantageState::Normal];
    let advantage_hit = result.hit_chances[&AdvantageState::Advantage];
    assert!((advantage_hit - (1.0 - (1.0 - normal_hit) * (1.0 - normal_hit))).abs() < 1e-12);
    assert!(result
        .dpr
        .conditions
        .iter()
        .any(|c| c.contains("paralyzed")));
}

#[test]
fn sharpshooter_archer_uses_power_attack_against_low_ac() {
    let build = Build::new("Archer", 5, AbilityScores::new(10, 18, 12, 10, 10, 8))
        .with_main_hand(longbow())
        .with_feat(Feat::Sharpshooter);
    let mut resources = resources_for_build(&build);
    let result = DprOrchestrator::with_rounds(1).analyze(
        &build,
        &Target::new(13),
        &CombatContext::new(),
        &mut resources,
    );

    let analysis = result.power_attack.expect("Sharpshooter produces an analysis");
    assert!(analysis.should_use);
    assert!(analysis.power_attack_dpr > analysis.normal_dpr);
    assert!(result
        .dpr
        .conditions
        .iter()
        .any(|c| c.contains("power attack")));
}

#[test]
fn result_serializes_with_contract_field_names() {
    let build = Build::new("Fighter", 5, AbilityScores::new(16, 12, 14, 10, 10, 8))
        .with_main_hand(greatsword());
    let mut resources = resources_for_build(&build);
    let result = DprOrchestrator::with_rounds(2).analyze(
        &build,
        &Target::new(16),
        &CombatContext::new(),
        &mut resources,
    );

    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("dpr").is_some());
    assert!(json["dpr"].get("total").is_some());
    assert!(json["dpr"].get("byRound").is_some());
    assert!(json["dpr"].get("breakdown").is_some());
    assert!(json["dpr"].get("conditions").is_some());
    assert!(json.get("hitChances").is_some());
    assert!(json["hitChances"].get("normal").is_some());
    assert!(json["hitChances"].get("triple-advantage").is_some());
    assert!(json.get("critChances").is_some());
    assert!(json.as_object().unwrap().contains_key("powerAttack"));
    assert!(json
        .as_object()
        .unwrap()
        .contains_key("oncePerTurnAnalysis"));
    assert!(json.get("resourceUsage").is_some());

    assert_eq!(json["dpr"]["byRound"].as_array().unwrap().len(), 2);
    assert_eq!(json["dpr"]["byRound"][0]["round"], 1);
}
