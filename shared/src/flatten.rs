//! One-level flattening of compound ingredients through their formulations
//!
//! Compounds stay allocatable inventory items of their own. Flattening only
//! feeds the compatibility check and ingredient listings.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Formulation, RecipeLine};
use crate::types::IngredientId;

/// All known formulations, indexed by compound
#[derive(Debug, Clone, Default)]
pub struct FormulationBook {
    by_compound: HashMap<IngredientId, Vec<Formulation>>,
}

impl FormulationBook {
    pub fn new(formulations: impl IntoIterator<Item = Formulation>) -> Self {
        let mut by_compound: HashMap<IngredientId, Vec<Formulation>> = HashMap::new();
        for formulation in formulations {
            by_compound.entry(formulation.compound_id).or_default().push(formulation);
        }
        Self { by_compound }
    }

    /// Formulations of a compound active on `on`, at most one per supplier,
    /// latest effective start first
    pub fn active_on(&self, compound_id: IngredientId, on: NaiveDate) -> Vec<&Formulation> {
        let mut active: Vec<&Formulation> = self
            .by_compound
            .get(&compound_id)
            .map(|all| all.iter().filter(|f| f.is_active_on(on)).collect())
            .unwrap_or_default();
        active.sort_by(|a, b| {
            b.effective
                .start
                .cmp(&a.effective.start)
                .then_with(|| a.supplier_id.cmp(&b.supplier_id))
        });
        active
    }

    /// The formulation used to expand a compound in listings
    pub fn primary_on(&self, compound_id: IngredientId, on: NaiveDate) -> Option<&Formulation> {
        self.active_on(compound_id, on).into_iter().next()
    }
}

/// Top-level ingredients plus the atomic ingredients of every active
/// formulation of any compound among them
pub fn flattened_ingredient_set(lines: &[RecipeLine], book: &FormulationBook, on: NaiveDate) -> BTreeSet<IngredientId> {
    let mut ingredients = BTreeSet::new();
    for line in lines {
        ingredients.insert(line.ingredient_id);
        for formulation in book.active_on(line.ingredient_id, on) {
            ingredients.extend(formulation.lines.iter().map(|l| l.atomic_ingredient_id));
        }
    }
    ingredients
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedComponent {
    pub ingredient_id: IngredientId,
    pub quantity: Decimal,
}

/// A recipe line with its compound expanded one level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedIngredient {
    pub ingredient_id: IngredientId,
    pub quantity: Decimal,
    pub components: Vec<ListedComponent>,
}

fn by_quantity_desc(a: (Decimal, IngredientId), b: (Decimal, IngredientId)) -> std::cmp::Ordering {
    b.0.cmp(&a.0).then(a.1.cmp(&b.1))
}

/// Recipe lines ordered by descending quantity, compounds expanded
///
/// A component's quantity is its share of the compound line:
/// `line quantity / pack size * component quantity`.
pub fn flatten_for_listing(lines: &[RecipeLine], book: &FormulationBook, on: NaiveDate) -> Vec<ListedIngredient> {
    let mut listed: Vec<ListedIngredient> = lines
        .iter()
        .map(|line| {
            let mut components: Vec<ListedComponent> = book
                .primary_on(line.ingredient_id, on)
                .and_then(|f| {
                    let packs = line.quantity.checked_div(f.pack_size)?;
                    Some(
                        f.lines
                            .iter()
                            .map(|component| ListedComponent {
                                ingredient_id: component.atomic_ingredient_id,
                                quantity: packs * component.quantity,
                            })
                            .collect(),
                    )
                })
                .unwrap_or_default();
            components.sort_by(|a, b| by_quantity_desc((a.quantity, a.ingredient_id), (b.quantity, b.ingredient_id)));

            ListedIngredient {
                ingredient_id: line.ingredient_id,
                quantity: line.quantity,
                components,
            }
        })
        .collect();
    listed.sort_by(|a, b| by_quantity_desc((a.quantity, a.ingredient_id), (b.quantity, b.ingredient_id)));
    listed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FormulationLine;
    use crate::types::DateRange;
    use uuid::Uuid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn formulation(compound_id: IngredientId, supplier: &str, start: NaiveDate, end: NaiveDate, atoms: &[(IngredientId, i64)]) -> Formulation {
        Formulation {
            id: Uuid::new_v4(),
            compound_id,
            supplier_id: supplier.to_string(),
            version: 1,
            effective: DateRange::new(start, end).unwrap(),
            unit_price: Decimal::from(10),
            pack_size: Decimal::from(2),
            lines: atoms
                .iter()
                .map(|&(id, q)| FormulationLine {
                    atomic_ingredient_id: id,
                    quantity: Decimal::from(q),
                })
                .collect(),
        }
    }

    fn line(ingredient_id: IngredientId, quantity: i64) -> RecipeLine {
        RecipeLine {
            ingredient_id,
            quantity: Decimal::from(quantity),
        }
    }

    #[test]
    fn test_flattened_set_includes_active_atoms_only() {
        let book = FormulationBook::new(vec![
            formulation(10, "S1", d(2024, 1, 1), d(2024, 6, 30), &[(1, 1), (2, 1)]),
            formulation(10, "S1", d(2023, 1, 1), d(2023, 12, 31), &[(3, 1)]),
        ]);
        let set = flattened_ingredient_set(&[line(10, 4), line(5, 1)], &book, d(2024, 3, 1));
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![1, 2, 5, 10]);
    }

    #[test]
    fn test_listing_orders_by_quantity_and_scales_components() {
        let book = FormulationBook::new(vec![formulation(10, "S1", d(2024, 1, 1), d(2024, 12, 31), &[(1, 1), (2, 3)])]);
        let listed = flatten_for_listing(&[line(5, 1), line(10, 4)], &book, d(2024, 3, 1));
        assert_eq!(listed[0].ingredient_id, 10);
        assert_eq!(listed[0].components[0].ingredient_id, 2);
        assert_eq!(listed[0].components[0].quantity, Decimal::from(6));
        assert_eq!(listed[0].components[1].quantity, Decimal::from(2));
        assert!(listed[1].components.is_empty());
    }

    #[test]
    fn test_active_on_orders_suppliers() {
        let book = FormulationBook::new(vec![
            formulation(10, "S2", d(2024, 1, 1), d(2024, 12, 31), &[(1, 1)]),
            formulation(10, "S1", d(2024, 1, 1), d(2024, 12, 31), &[(2, 1)]),
            formulation(10, "S3", d(2024, 2, 1), d(2024, 12, 31), &[(3, 1)]),
        ]);
        let suppliers: Vec<_> = book
            .active_on(10, d(2024, 3, 1))
            .into_iter()
            .map(|f| f.supplier_id.as_str())
            .collect();
        assert_eq!(suppliers, vec!["S3", "S1", "S2"]);
    }
}
