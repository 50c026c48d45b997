use serde::{Deserialize, Serialize};

use stockflow_core::{EngineError, EngineResult, Entity, ItemId, WarehouseId};

/// A stock item held in one warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub warehouse_id: WarehouseId,
    #[serde(default)]
    pub name: String,
    pub category: String,
    /// Unit of measure (kg, sack, litre, ...).
    pub unit: String,
    pub minimum_quantity: i64,
    pub current_quantity: i64,
    /// Cost of one unit, when known. Used for stock valuation.
    #[serde(default)]
    pub unit_cost: Option<f64>,
}

impl Item {
    pub fn new(
        id: ItemId,
        warehouse_id: WarehouseId,
        category: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            id,
            warehouse_id,
            name: String::new(),
            category: category.into(),
            unit: unit.into(),
            minimum_quantity: 0,
            current_quantity: 0,
            unit_cost: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.current_quantity = quantity;
        self
    }

    pub fn with_minimum(mut self, minimum: i64) -> Self {
        self.minimum_quantity = minimum;
        self
    }

    pub fn with_unit_cost(mut self, unit_cost: f64) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    /// Check the record invariants (non-negative quantities, sane cost).
    pub fn validate(&self) -> EngineResult<()> {
        if self.current_quantity < 0 {
            return Err(EngineError::validation(format!(
                "item {}: current quantity cannot be negative",
                self.id
            )));
        }
        if self.minimum_quantity < 0 {
            return Err(EngineError::validation(format!(
                "item {}: minimum quantity cannot be negative",
                self.id
            )));
        }
        if self.category.trim().is_empty() {
            return Err(EngineError::validation(format!(
                "item {}: category cannot be empty",
                self.id
            )));
        }
        if let Some(cost) = self.unit_cost {
            if !(cost.is_finite() && cost >= 0.0) {
                return Err(EngineError::validation(format!(
                    "item {}: unit cost must be a finite non-negative number",
                    self.id
                )));
            }
        }
        Ok(())
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.current_quantity == 0
    }

    pub fn is_at_or_below_minimum(&self) -> bool {
        self.current_quantity <= self.minimum_quantity
    }

    /// Units missing to get back to the minimum threshold.
    pub fn shortfall(&self) -> i64 {
        (self.minimum_quantity - self.current_quantity).max(0)
    }

    /// Units held above the minimum threshold.
    pub fn excess(&self) -> i64 {
        (self.current_quantity - self.minimum_quantity).max(0)
    }

    /// `current / minimum × 100`; `None` when no minimum is set.
    pub fn stock_percentage(&self) -> Option<f64> {
        if self.minimum_quantity > 0 {
            Some(self.current_quantity as f64 / self.minimum_quantity as f64 * 100.0)
        } else {
            None
        }
    }

    /// Value of the current stock; zero when the unit cost is unknown.
    pub fn stock_value(&self) -> f64 {
        self.unit_cost.unwrap_or(0.0) * self.current_quantity as f64
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> ItemId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rice() -> Item {
        Item::new(ItemId::from_u128(1), WarehouseId::from_u128(10), "grain", "kg")
            .with_name("Rice")
            .with_quantity(40)
            .with_minimum(50)
    }

    #[test]
    fn negative_quantities_fail_validation() {
        assert!(rice().validate().is_ok());
        assert!(rice().with_quantity(-1).validate().is_err());
        assert!(rice().with_minimum(-5).validate().is_err());
    }

    #[test]
    fn non_finite_unit_cost_fails_validation() {
        assert!(rice().with_unit_cost(f64::NAN).validate().is_err());
        assert!(rice().with_unit_cost(-2.0).validate().is_err());
        assert!(rice().with_unit_cost(12.5).validate().is_ok());
    }

    #[test]
    fn threshold_helpers() {
        let item = rice();
        assert!(item.is_at_or_below_minimum());
        assert_eq!(item.shortfall(), 10);
        assert_eq!(item.excess(), 0);
        assert_eq!(item.stock_percentage(), Some(80.0));
        assert_eq!(item.clone().with_minimum(0).stock_percentage(), None);
    }

    #[test]
    fn stock_value_defaults_to_zero_without_cost() {
        assert_eq!(rice().stock_value(), 0.0);
        assert_eq!(rice().with_unit_cost(2.5).stock_value(), 100.0);
    }

    #[test]
    fn deserializes_without_optional_fields() {
        let json = serde_json::json!({
            "id": ItemId::from_u128(3),
            "warehouse_id": WarehouseId::from_u128(4),
            "category": "seed",
            "unit": "sack",
            "minimum_quantity": 5,
            "current_quantity": 9
        });
        let item: Item = serde_json::from_value(json).unwrap();
        assert_eq!(item.name, "");
        assert_eq!(item.unit_cost, None);
    }
}
