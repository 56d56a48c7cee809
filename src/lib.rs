//! Closed-form damage-per-round analysis for D&D 5e character builds.
//!
//! This crate provides:
//! - Dice expression parsing and expected-value math, including reroll
//!   mechanics
//! - Attack probability resolution with advantage/disadvantage composition
//! - Damage aggregation with crit doubling and resistance handling
//! - Power-attack (-5/+10) break-even analysis
//! - Once-per-turn effect selection and policy-driven decisions
//! - A per-round DPR orchestrator with resource tracking
//!
//! Everything is expected-value algebra; no dice are rolled anywhere.
//! Build, target, and combat-context snapshots are immutable inputs; the
//! only mutable state is the per-build [`ResourceManager`].
//!
//! # Quick Start
//!
//! ```
//! use dpr_core::dice::DiceExpression;
//! use dpr_core::probability::{self, AdvantageState};
//!
//! let greatsword = DiceExpression::parse("2d6+3")?;
//! assert_eq!(greatsword.expected_value(), 10.0);
//!
//! let p = probability::resolve(5, 15, AdvantageState::Normal, 1);
//! assert_eq!(p.hit, 0.50);
//! # Ok::<(), dpr_core::dice::DiceError>(())
//! ```

pub mod advantage;
pub mod character;
pub mod damage;
pub mod dice;
pub mod effects;
pub mod items;
pub mod once_per_turn;
pub mod orchestrator;
pub mod policy;
pub mod power_attack;
pub mod probability;
pub mod resources;
pub mod stats;

// Primary public API
pub use character::{
    AbilityScores, Build, BuildId, CombatContext, Condition, Target, TargetType, Weapon,
};
pub use damage::{AttackSequence, DamageBreakdown, DamageSource};
pub use dice::{DamageType, DiceError, DiceExpression, RerollMechanic};
pub use orchestrator::{resources_for_build, DprOrchestrator, DprResult};
pub use policy::{BuildPolicies, PolicyAction, PolicyDecision};
pub use probability::{AdvantageState, AttackProbability};
pub use resources::{ResourceCost, ResourceError, ResourceKind, ResourceManager};
