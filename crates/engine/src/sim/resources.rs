use serde::{Deserialize, Serialize};

pub const STARTING_WOOD: u32 = 10;
pub const STARTING_STONE: u32 = 5;
pub const STARTING_FOOD: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Wood,
    Stone,
    Food,
    Gold,
}

impl ResourceKind {
    pub fn as_token(self) -> &'static str {
        match self {
            Self::Wood => "wood",
            Self::Stone => "stone",
            Self::Food => "food",
            Self::Gold => "gold",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_token())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cost {
    pub resource: ResourceKind,
    pub amount: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    pub resource: ResourceKind,
    pub needed: u32,
    pub available: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub wood: u32,
    pub stone: u32,
    #[serde(default)]
    pub food: u32,
    #[serde(default)]
    pub gold: u32,
}

impl Resources {
    pub fn starting() -> Self {
        Self {
            wood: STARTING_WOOD,
            stone: STARTING_STONE,
            food: STARTING_FOOD,
            gold: 0,
        }
    }

    pub fn amount(&self, resource: ResourceKind) -> u32 {
        match resource {
            ResourceKind::Wood => self.wood,
            ResourceKind::Stone => self.stone,
            ResourceKind::Food => self.food,
            ResourceKind::Gold => self.gold,
        }
    }

    fn slot_mut(&mut self, resource: ResourceKind) -> &mut u32 {
        match resource {
            ResourceKind::Wood => &mut self.wood,
            ResourceKind::Stone => &mut self.stone,
            ResourceKind::Food => &mut self.food,
            ResourceKind::Gold => &mut self.gold,
        }
    }

    pub fn credit(&mut self, resource: ResourceKind, amount: u32) {
        let slot = self.slot_mut(resource);
        *slot = slot.saturating_add(amount);
    }

    /// Debits the whole cost or nothing.
    pub fn try_debit(&mut self, cost: Cost) -> Result<(), Shortfall> {
        let available = self.amount(cost.resource);
        if available < cost.amount {
            return Err(Shortfall {
                resource: cost.resource,
                needed: cost.amount,
                available,
            });
        }
        *self.slot_mut(cost.resource) = available - cost.amount;
        Ok(())
    }
}
