//! Standard weapon database.
//!
//! The analysis-relevant slice of the 5e weapon list: damage dice, damage
//! type, and the properties that change the to-hit/damage derivation.

use crate::character::{Weapon, WeaponProperty};
use crate::dice::{DamageType, DiceExpression};

/// Get a standard weapon by name, case-insensitively.
pub fn get_weapon(name: &str) -> Option<Weapon> {
    let name_lower = name.to_lowercase();
    WEAPONS
        .iter()
        .find(|w| w.name.to_lowercase() == name_lower)
        .cloned()
}

/// The fallback attack when a build has no main-hand weapon.
pub fn unarmed_strike() -> Weapon {
    Weapon::new(
        "Unarmed Strike",
        DiceExpression::new(1, 4, 0),
        DamageType::Bludgeoning,
    )
}

lazy_static::lazy_static! {
    /// Standard weapons.
    pub static ref WEAPONS: Vec<Weapon> = vec![
        // Simple melee
        Weapon::new("Club", DiceExpression::new(1, 4, 0), DamageType::Bludgeoning)
            .with_properties(vec![WeaponProperty::Light]),
        Weapon::new("Dagger", DiceExpression::new(1, 4, 0), DamageType::Piercing)
            .with_properties(vec![WeaponProperty::Finesse, WeaponProperty::Light, WeaponProperty::Thrown]),
        Weapon::new("Handaxe", DiceExpression::new(1, 6, 0), DamageType::Slashing)
            .with_properties(vec![WeaponProperty::Light, WeaponProperty::Thrown]),
        Weapon::new("Mace", DiceExpression::new(1, 6, 0), DamageType::Bludgeoning),
        Weapon::new("Quarterstaff", DiceExpression::new(1, 6, 0), DamageType::Bludgeoning)
            .with_properties(vec![WeaponProperty::Versatile]),
        Weapon::new("Spear", DiceExpression::new(1, 6, 0), DamageType::Piercing)
            .with_properties(vec![WeaponProperty::Thrown, WeaponProperty::Versatile]),

        // Martial melee
        Weapon::new("Battleaxe", DiceExpression::new(1, 8, 0), DamageType::Slashing)
            .with_properties(vec![WeaponProperty::Versatile]),
        Weapon::new("Glaive", DiceExpression::new(1, 10, 0), DamageType::Slashing)
            .with_properties(vec![WeaponProperty::Heavy, WeaponProperty::Reach, WeaponProperty::TwoHanded]),
        Weapon::new("Greataxe", DiceExpression::new(1, 12, 0), DamageType::Slashing)
            .with_properties(vec![WeaponProperty::Heavy, WeaponProperty::TwoHanded]),
        Weapon::new("Greatsword", DiceExpression::new(2, 6, 0), DamageType::Slashing)
            .with_properties(vec![WeaponProperty::Heavy, WeaponProperty::TwoHanded]),
        Weapon::new("Halberd", DiceExpression::new(1, 10, 0), DamageType::Slashing)
            .with_properties(vec![WeaponProperty::Heavy, WeaponProperty::Reach, WeaponProperty::TwoHanded]),
        Weapon::new("Longsword", DiceExpression::new(1, 8, 0), DamageType::Slashing)
            .with_properties(vec![WeaponProperty::Versatile]),
        Weapon::new("Maul", DiceExpression::new(2, 6, 0), DamageType::Bludgeoning)
            .with_properties(vec![WeaponProperty::Heavy, WeaponProperty::TwoHanded]),
        Weapon::new("Rapier", DiceExpression::new(1, 8, 0), DamageType::Piercing)
            .with_properties(vec![WeaponProperty::Finesse]),
        Weapon::new("Scimitar", DiceExpression::new(1, 6, 0), DamageType::Slashing)
            .with_properties(vec![WeaponProperty::Finesse, WeaponProperty::Light]),
        Weapon::new("Shortsword", DiceExpression::new(1, 6, 0), DamageType::Piercing)
            .with_properties(vec![WeaponProperty::Finesse, WeaponProperty::Light]),
        Weapon::new("Warhammer", DiceExpression::new(1, 8, 0), DamageType::Bludgeoning)
            .with_properties(vec![WeaponProperty::Versatile]),

        // Ranged
        Weapon::new("Shortbow", DiceExpression::new(1, 6, 0), DamageType::Piercing)
            .with_properties(vec![WeaponProperty::Ranged, WeaponProperty::TwoHanded]),
        Weapon::new("Light Crossbow", DiceExpression::new(1, 8, 0), DamageType::Piercing)
            .with_properties(vec![WeaponProperty::Ranged, WeaponProperty::Loading, WeaponProperty::TwoHanded]),
        Weapon::new("Longbow", DiceExpression::new(1, 8, 0), DamageType::Piercing)
            .with_properties(vec![WeaponProperty::Ranged, WeaponProperty::Heavy, WeaponProperty::TwoHanded]),
        Weapon::new("Heavy Crossbow", DiceExpression::new(1, 10, 0), DamageType::Piercing)
            .with_properties(vec![WeaponProperty::Ranged, WeaponProperty::Heavy, WeaponProperty::Loading, WeaponProperty::TwoHanded]),
        Weapon::new("Hand Crossbow", DiceExpression::new(1, 6, 0), DamageType::Piercing)
            .with_properties(vec![WeaponProperty::Ranged, WeaponProperty::Light, WeaponProperty::Loading]),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_case_insensitive() {
        let weapon = get_weapon("greatsword").unwrap();
        assert_eq!(weapon.name, "Greatsword");
        assert_eq!(weapon.damage, DiceExpression::new(2, 6, 0));
        assert!(weapon.is_heavy());
    }

    #[test]
    fn test_unknown_weapon() {
        assert!(get_weapon("vorpal sword").is_none());
    }

    #[test]
    fn test_unarmed_strike() {
        let unarmed = unarmed_strike();
        assert_eq!(unarmed.damage.expected_value(), 2.5);
        assert_eq!(unarmed.damage_type, DamageType::Bludgeoning);
    }

    #[test]
    fn test_ranged_weapons_marked() {
        for name in ["Longbow", "Shortbow", "Heavy Crossbow", "Hand Crossbow"] {
            assert!(get_weapon(name).unwrap().is_ranged(), "{name} should be ranged");
        }
        assert!(!get_weapon("Greatsword").unwrap().is_ranged());
    }
}
