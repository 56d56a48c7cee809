//! Dice expression modeling for expected-value analysis.
//!
//! Parses standard damage notation (`2d6+3`, `1d8`, bare integers) and
//! computes closed-form expectations: no rolling happens anywhere in this
//! crate. Also covers the two reroll mechanics that matter for damage
//! analysis: reroll-low-once (Great Weapon Fighting) and
//! raise-minimum-face (treat 1s as 2s).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for dice notation parsing.
#[derive(Debug, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
}

/// The 5e damage types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    #[default]
    Slashing,
    Piercing,
    Bludgeoning,
    Fire,
    Cold,
    Lightning,
    Thunder,
    Acid,
    Poison,
    Necrotic,
    Radiant,
    Force,
    Psychic,
}

impl DamageType {
    pub fn name(&self) -> &'static str {
        match self {
            DamageType::Slashing => "slashing",
            DamageType::Piercing => "piercing",
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Fire => "fire",
            DamageType::Cold => "cold",
            DamageType::Lightning => "lightning",
            DamageType::Thunder => "thunder",
            DamageType::Acid => "acid",
            DamageType::Poison => "poison",
            DamageType::Necrotic => "necrotic",
            DamageType::Radiant => "radiant",
            DamageType::Force => "force",
            DamageType::Psychic => "psychic",
        }
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Reroll mechanic attached to a damage source.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum RerollMechanic {
    #[default]
    None,
    /// Reroll faces of 2 or less once, keeping the new result.
    RerollLow,
    /// Treat every rolled 1 as a 2.
    RaiseMin,
}

/// A single dice term: `count` dice of `sides` sides plus a flat bonus.
///
/// A `count` of zero contributes only the bonus (a flat damage source).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub count: u32,
    pub sides: u32,
    pub bonus: i32,
}

impl DiceExpression {
    pub fn new(count: u32, sides: u32, bonus: i32) -> Self {
        Self {
            count,
            sides,
            bonus,
        }
    }

    /// A flat amount with no dice.
    pub fn flat(bonus: i32) -> Self {
        Self {
            count: 0,
            sides: 0,
            bonus,
        }
    }

    /// Parse `NdM`, `NdM+B`, `NdM-B`, or a bare integer.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let cleaned: String = notation
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if cleaned.is_empty() {
            return Err(DiceError::InvalidNotation(notation.to_string()));
        }

        let Some(d_pos) = cleaned.find('d') else {
            // Bare integer, e.g. "3" or "-2"
            let bonus: i32 = cleaned
                .parse()
                .map_err(|_| DiceError::InvalidNotation(notation.to_string()))?;
            return Ok(Self::flat(bonus));
        };

        let count_str = &cleaned[..d_pos];
        let rest = &cleaned[d_pos + 1..];

        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(notation.to_string()))?
        };

        let (sides_str, bonus) = if let Some(pos) = rest.find(['+', '-']) {
            let sign: i32 = if rest.as_bytes()[pos] == b'+' { 1 } else { -1 };
            let value: i32 = rest[pos + 1..]
                .parse()
                .map_err(|_| DiceError::InvalidNotation(notation.to_string()))?;
            (&rest[..pos], sign * value)
        } else {
            (rest, 0)
        };

        let sides: u32 = sides_str
            .parse()
            .map_err(|_| DiceError::InvalidNotation(notation.to_string()))?;
        if sides == 0 && count > 0 {
            return Err(DiceError::InvalidNotation(notation.to_string()));
        }

        Ok(Self {
            count,
            sides,
            bonus,
        })
    }

    /// Expected value of the expression.
    pub fn expected_value(&self) -> f64 {
        if self.count == 0 {
            return self.bonus as f64;
        }
        self.count as f64 * (self.sides as f64 + 1.0) / 2.0 + self.bonus as f64
    }

    /// Minimum result, floored at zero.
    pub fn min_value(&self) -> f64 {
        (self.count as i64 + self.bonus as i64).max(0) as f64
    }

    /// Maximum result.
    pub fn max_value(&self) -> f64 {
        (self.count as i64 * self.sides as i64 + self.bonus as i64) as f64
    }

    /// Expected value under a reroll mechanic.
    ///
    /// Reroll-low rerolls faces of 2 or less once: the per-die average
    /// becomes `(sum of faces 3..=s + 2 * avg) / s`. For two or fewer
    /// sides every face is rerolled, which reproduces the original
    /// distribution, so the plain average is returned.
    ///
    /// Raise-min replaces face 1 with 2: `(s*(s+1)/2 + 1) / s` per die.
    pub fn expected_with_reroll(&self, mechanic: RerollMechanic) -> f64 {
        if self.count == 0 {
            return self.bonus as f64;
        }
        let s = self.sides as f64;
        let per_die = match mechanic {
            RerollMechanic::None => (s + 1.0) / 2.0,
            RerollMechanic::RerollLow => {
                if self.sides <= 2 {
                    (s + 1.0) / 2.0
                } else {
                    let kept = s * (s + 1.0) / 2.0 - 3.0;
                    let rerolled = 2.0 * (s + 1.0) / 2.0;
                    (kept + rerolled) / s
                }
            }
            RerollMechanic::RaiseMin => (s * (s + 1.0) / 2.0 + 1.0) / s,
        };
        self.count as f64 * per_die + self.bonus as f64
    }

    /// The same term with the dice count doubled (critical hits double
    /// dice, never the flat bonus).
    pub fn doubled(&self) -> Self {
        Self {
            count: self.count * 2,
            sides: self.sides,
            bonus: self.bonus,
        }
    }

    /// The same term with an extra flat bonus.
    pub fn plus(&self, bonus: i32) -> Self {
        Self {
            count: self.count,
            sides: self.sides,
            bonus: self.bonus + bonus,
        }
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            return write!(f, "{}", self.bonus);
        }
        write!(f, "{}d{}", self.count, self.sides)?;
        if self.bonus > 0 {
            write!(f, "+{}", self.bonus)?;
        } else if self.bonus < 0 {
            write!(f, "{}", self.bonus)?;
        }
        Ok(())
    }
}
