use serde::{Deserialize, Serialize};

use stockflow_core::WarehouseId;
use stockflow_inventory::{Item, LedgerSnapshot};

/// Portion of the ledger a computation covers.
///
/// - `All`: every warehouse (system-wide pool).
/// - `Warehouse`: only items held in the given warehouse.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    All,
    Warehouse(WarehouseId),
}

impl Scope {
    pub fn allows(&self, warehouse_id: WarehouseId) -> bool {
        match self {
            Scope::All => true,
            Scope::Warehouse(w) => *w == warehouse_id,
        }
    }

    /// Items of the snapshot inside this scope, in id order.
    pub fn items<'a>(&self, snapshot: &'a LedgerSnapshot) -> impl Iterator<Item = &'a Item> + 'a {
        let scope = *self;
        snapshot
            .items()
            .iter()
            .filter(move |item| scope.allows(item.warehouse_id))
    }
}

impl From<Option<WarehouseId>> for Scope {
    fn from(value: Option<WarehouseId>) -> Self {
        value.map_or(Scope::All, Scope::Warehouse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warehouse_scope_only_allows_its_warehouse() {
        let north = WarehouseId::from_u128(1);
        let south = WarehouseId::from_u128(2);
        assert!(Scope::All.allows(north));
        assert!(Scope::Warehouse(north).allows(north));
        assert!(!Scope::Warehouse(north).allows(south));
        assert_eq!(Scope::from(None), Scope::All);
    }
}
