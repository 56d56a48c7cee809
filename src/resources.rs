//! Depletable resource tracking.
//!
//! The one stateful entity in the engine: spell slots and class pools
//! (ki, superiority dice, rage uses, ...) consumed by policy decisions
//! and restored by short/long rests. Mutation is `&mut self` only; a
//! caller parallelizing across builds gives each build its own manager.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// The closed set of resource tags shared with the external layers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    SpellSlot,
    SuperiorityDie,
    Ki,
    Rage,
    Bardic,
    Sorcery,
    Warlock,
    Other,
}

impl ResourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::SpellSlot => "spell slot",
            ResourceKind::SuperiorityDie => "superiority die",
            ResourceKind::Ki => "ki",
            ResourceKind::Rage => "rage",
            ResourceKind::Bardic => "bardic inspiration",
            ResourceKind::Sorcery => "sorcery point",
            ResourceKind::Warlock => "pact slot",
            ResourceKind::Other => "resource",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// When a pool refills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RechargeType {
    ShortRest,
    LongRest,
}

/// Error type for resource spending.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Insufficient {kind}: requested {requested}, available {available}")]
    Insufficient {
        kind: ResourceKind,
        requested: u32,
        available: u32,
    },
    #[error("No spell slot of level {min_level} or higher available")]
    NoSlotAvailable { min_level: u8 },
}

/// One spell-slot level.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SlotInfo {
    pub total: u8,
    pub used: u8,
}

impl SlotInfo {
    pub fn available(&self) -> u8 {
        self.total.saturating_sub(self.used)
    }
}

/// One named class pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolInfo {
    pub current: u32,
    pub maximum: u32,
    pub recharge: RechargeType,
}

/// Build-supplied pool definition, used to initialize a manager.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSpec {
    pub kind: ResourceKind,
    pub maximum: u32,
    pub recharge: RechargeType,
}

impl PoolSpec {
    pub fn new(kind: ResourceKind, maximum: u32, recharge: RechargeType) -> Self {
        Self {
            kind,
            maximum,
            recharge,
        }
    }
}

/// What a decision wants to spend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCost {
    pub kind: ResourceKind,
    pub amount: u32,
    /// For spell slots: the lowest slot level that satisfies the cost.
    pub min_slot_level: Option<u8>,
}

impl ResourceCost {
    /// A single spell slot of at least `min_level`.
    pub fn spell_slot(min_level: u8) -> Self {
        Self {
            kind: ResourceKind::SpellSlot,
            amount: 1,
            min_slot_level: Some(min_level),
        }
    }

    /// `amount` points from a named pool.
    pub fn pool(kind: ResourceKind, amount: u32) -> Self {
        Self {
            kind,
            amount,
            min_slot_level: None,
        }
    }
}

/// Record of one successful spend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUse {
    pub round: u32,
    pub kind: ResourceKind,
    pub amount: u32,
    /// The slot level actually consumed, for spell-slot spends.
    pub slot_level: Option<u8>,
}

/// Per-level spell slots for a full caster, levels 1-20.
pub const FULL_CASTER_SLOTS: [[u8; 9]; 20] = [
    [2, 0, 0, 0, 0, 0, 0, 0, 0],
    [3, 0, 0, 0, 0, 0, 0, 0, 0],
    [4, 2, 0, 0, 0, 0, 0, 0, 0],
    [4, 3, 0, 0, 0, 0, 0, 0, 0],
    [4, 3, 2, 0, 0, 0, 0, 0, 0],
    [4, 3, 3, 0, 0, 0, 0, 0, 0],
    [4, 3, 3, 1, 0, 0, 0, 0, 0],
    [4, 3, 3, 2, 0, 0, 0, 0, 0],
    [4, 3, 3, 3, 1, 0, 0, 0, 0],
    [4, 3, 3, 3, 2, 0, 0, 0, 0],
    [4, 3, 3, 3, 2, 1, 0, 0, 0],
    [4, 3, 3, 3, 2, 1, 0, 0, 0],
    [4, 3, 3, 3, 2, 1, 1, 0, 0],
    [4, 3, 3, 3, 2, 1, 1, 0, 0],
    [4, 3, 3, 3, 2, 1, 1, 1, 0],
    [4, 3, 3, 3, 2, 1, 1, 1, 0],
    [4, 3, 3, 3, 2, 1, 1, 1, 1],
    [4, 3, 3, 3, 3, 1, 1, 1, 1],
    [4, 3, 3, 3, 3, 2, 1, 1, 1],
    [4, 3, 3, 3, 3, 2, 2, 1, 1],
];

/// Half-caster progression (paladin, ranger): no slots at 1st level,
/// then full-caster slots at half the level rounded up.
pub fn half_caster_slots(level: u8) -> [u8; 9] {
    if level <= 1 {
        return [0; 9];
    }
    let effective = (level as usize + 1) / 2;
    FULL_CASTER_SLOTS[(effective - 1).min(19)]
}

/// Tracks one build's depletable resources across rounds and encounters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceManager {
    slots: [SlotInfo; 9],
    pools: BTreeMap<ResourceKind, PoolInfo>,
    usage: Vec<ResourceUse>,
    current_round: u32,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager with full-caster slots for the given level.
    pub fn full_caster(level: u8) -> Self {
        let mut manager = Self::new();
        if level >= 1 {
            manager.set_slots(FULL_CASTER_SLOTS[(level as usize - 1).min(19)]);
        }
        manager
    }

    /// A manager with half-caster slots for the given level.
    pub fn half_caster(level: u8) -> Self {
        let mut manager = Self::new();
        manager.set_slots(half_caster_slots(level));
        manager
    }

    pub fn set_slots(&mut self, totals: [u8; 9]) {
        for (slot, total) in self.slots.iter_mut().zip(totals) {
            *slot = SlotInfo { total, used: 0 };
        }
    }

    pub fn add_pool(&mut self, spec: PoolSpec) {
        self.pools.insert(
            spec.kind,
            PoolInfo {
                current: spec.maximum,
                maximum: spec.maximum,
                recharge: spec.recharge,
            },
        );
    }

    pub fn with_pool(mut self, spec: PoolSpec) -> Self {
        self.add_pool(spec);
        self
    }

    /// Tag subsequent spends with the round they happened in.
    pub fn begin_round(&mut self, round: u32) {
        self.current_round = round;
    }

    pub fn slots(&self) -> &[SlotInfo; 9] {
        &self.slots
    }

    pub fn pool(&self, kind: ResourceKind) -> Option<&PoolInfo> {
        self.pools.get(&kind)
    }

    /// Units available for a kind: total unspent slots, or pool balance.
    pub fn available(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::SpellSlot => {
                self.slots.iter().map(|s| s.available() as u32).sum()
            }
            _ => self.pools.get(&kind).map(|p| p.current).unwrap_or(0),
        }
    }

    /// Whether a cost could be paid right now.
    pub fn can_afford(&self, cost: &ResourceCost) -> bool {
        match cost.kind {
            ResourceKind::SpellSlot => {
                let min = cost.min_slot_level.unwrap_or(1).clamp(1, 9);
                (min..=9).any(|level| self.slots[level as usize - 1].available() > 0)
            }
            kind => self.available(kind) >= cost.amount,
        }
    }

    /// Spend a resource. Spell slots are consumed from the highest
    /// available level first; underflow is rejected, never carried
    /// negative.
    pub fn use_resource(&mut self, cost: &ResourceCost) -> Result<ResourceUse, ResourceError> {
        let spend = match cost.kind {
            ResourceKind::SpellSlot => {
                let min = cost.min_slot_level.unwrap_or(1).clamp(1, 9);
                let level = (min..=9)
                    .rev()
                    .find(|&level| self.slots[level as usize - 1].available() > 0)
                    .ok_or(ResourceError::NoSlotAvailable { min_level: min })?;
                self.slots[level as usize - 1].used += 1;
                ResourceUse {
                    round: self.current_round,
                    kind: ResourceKind::SpellSlot,
                    amount: 1,
                    slot_level: Some(level),
                }
            }
            kind => {
                let pool = self
                    .pools
                    .get_mut(&kind)
                    .ok_or(ResourceError::Insufficient {
                        kind,
                        requested: cost.amount,
                        available: 0,
                    })?;
                if pool.current < cost.amount {
                    return Err(ResourceError::Insufficient {
                        kind,
                        requested: cost.amount,
                        available: pool.current,
                    });
                }
                pool.current -= cost.amount;
                ResourceUse {
                    round: self.current_round,
                    kind,
                    amount: cost.amount,
                    slot_level: None,
                }
            }
        };

        debug!(
            kind = %spend.kind,
            amount = spend.amount,
            slot_level = ?spend.slot_level,
            round = spend.round,
            "resource spent"
        );
        self.usage.push(spend);
        Ok(spend)
    }

    /// Refill short-rest pools.
    pub fn short_rest(&mut self) {
        for pool in self.pools.values_mut() {
            if pool.recharge == RechargeType::ShortRest {
                pool.current = pool.maximum;
            }
        }
        debug!("short rest taken");
    }

    /// Refill everything: spell slots lowest level first up to each
    /// level's maximum, then every pool.
    pub fn long_rest(&mut self) {
        for level in 1..=9u8 {
            self.slots[level as usize - 1].used = 0;
        }
        for pool in self.pools.values_mut() {
            pool.current = pool.maximum;
        }
        debug!("long rest taken");
    }

    /// Ordered record of every spend since creation.
    pub fn usage_log(&self) -> &[ResourceUse] {
        &self.usage
    }

    /// Spends recorded during the given round.
    pub fn usage_in_round(&self, round: u32) -> Vec<ResourceUse> {
        self.usage
            .iter()
            .filter(|u| u.round == round)
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highest_slot_first() {
        let mut manager = ResourceManager::new();
        manager.set_slots([2, 1, 0, 0, 0, 0, 0, 0, 0]);

        let spend = manager.use_resource(&ResourceCost::spell_slot(1)).unwrap();
        assert_eq!(spend.slot_level, Some(2));
        assert_eq!(manager.slots()[0].available(), 2);
        assert_eq!(manager.slots()[1].available(), 0);
    }

    #[test]
    fn test_min_slot_level_respected() {
        let mut manager = ResourceManager::new();
        manager.set_slots([4, 3, 2, 0, 0, 0, 0, 0, 0]);

        let spend = manager.use_resource(&ResourceCost::spell_slot(2)).unwrap();
        assert_eq!(spend.slot_level, Some(3));

        // Exhaust level 3 and 2; a level-2 request must not dip into
        // level-1 slots.
        manager.use_resource(&ResourceCost::spell_slot(2)).unwrap();
        for _ in 0..3 {
            manager.use_resource(&ResourceCost::spell_slot(2)).unwrap();
        }
        let result = manager.use_resource(&ResourceCost::spell_slot(2));
        assert!(matches!(
            result,
            Err(ResourceError::NoSlotAvailable { min_level: 2 })
        ));
        assert_eq!(manager.slots()[0].available(), 4);
    }

    #[test]
    fn test_long_rest_restores_exactly() {
        let mut manager = ResourceManager::full_caster(5);
        for _ in 0..4 {
            manager.use_resource(&ResourceCost::spell_slot(1)).unwrap();
        }
        manager.long_rest();
        assert_eq!(manager.slots()[0].available(), 4);
        assert_eq!(manager.slots()[1].available(), 3);
        assert_eq!(manager.slots()[2].available(), 2);
    }

    #[test]
    fn test_pool_underflow_rejected() {
        let mut manager = ResourceManager::new().with_pool(PoolSpec::new(
            ResourceKind::Ki,
            3,
            RechargeType::ShortRest,
        ));

        manager
            .use_resource(&ResourceCost::pool(ResourceKind::Ki, 2))
            .unwrap();
        let result = manager.use_resource(&ResourceCost::pool(ResourceKind::Ki, 2));
        assert!(matches!(
            result,
            Err(ResourceError::Insufficient {
                kind: ResourceKind::Ki,
                requested: 2,
                available: 1,
            })
        ));
        // Balance untouched by the rejected spend.
        assert_eq!(manager.available(ResourceKind::Ki), 1);
    }

    #[test]
    fn test_rest_recharge_types() {
        let mut manager = ResourceManager::new()
            .with_pool(PoolSpec::new(
                ResourceKind::SuperiorityDie,
                4,
                RechargeType::ShortRest,
            ))
            .with_pool(PoolSpec::new(ResourceKind::Rage, 3, RechargeType::LongRest));

        manager
            .use_resource(&ResourceCost::pool(ResourceKind::SuperiorityDie, 4))
            .unwrap();
        manager
            .use_resource(&ResourceCost::pool(ResourceKind::Rage, 1))
            .unwrap();

        manager.short_rest();
        assert_eq!(manager.available(ResourceKind::SuperiorityDie), 4);
        assert_eq!(manager.available(ResourceKind::Rage), 2);

        manager.long_rest();
        assert_eq!(manager.available(ResourceKind::Rage), 3);
    }

    #[test]
    fn test_usage_log() {
        let mut manager = ResourceManager::full_caster(3);
        manager.begin_round(1);
        manager.use_resource(&ResourceCost::spell_slot(1)).unwrap();
        manager.begin_round(2);
        manager.use_resource(&ResourceCost::spell_slot(1)).unwrap();

        assert_eq!(manager.usage_log().len(), 2);
        assert_eq!(manager.usage_in_round(2).len(), 1);
        assert_eq!(manager.usage_log()[0].round, 1);
    }

    #[test]
    fn test_half_caster_progression() {
        assert_eq!(half_caster_slots(1), [0; 9]);
        assert_eq!(half_caster_slots(5)[0], 4);
        assert_eq!(half_caster_slots(5)[1], 2);
        assert_eq!(half_caster_slots(20)[4], 2);
    }

    #[test]
    fn test_unknown_pool() {
        let mut manager = ResourceManager::new();
        let result = manager.use_resource(&ResourceCost::pool(ResourceKind::Sorcery, 1));
        assert!(result.is_err());
    }

    #[test]
    fn test_full_caster_table_shape() {
        // Totals grow monotonically with level.
        for level in 1..20 {
            let lower: u32 = FULL_CASTER_SLOTS[level - 1].iter().map(|&n| n as u32).sum();
            let upper: u32 = FULL_CASTER_SLOTS[level].iter().map(|&n| n as u32).sum();
            assert!(upper >= lower, "slot count shrank at level {}", level + 1);
        }
    }
}
