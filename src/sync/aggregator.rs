//! Product frequency aggregation
//!
//! Folds the lines of one order into the product map. Merging is pure: the
//! caller owns the map and decides when to persist it. Applying the same order
//! twice counts it twice, so exactly-once delivery is the coordinator's job.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::models::{OrderLine, Product, ProductMap};

/// Stateless product aggregator
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductAggregator;

impl ProductAggregator {
    /// Fold one order's lines into `current`
    pub fn merge(
        &self,
        current: ProductMap,
        lines: &[OrderLine],
        order_timestamp: DateTime<Utc>,
    ) -> ProductMap {
        merge(current, lines, order_timestamp)
    }

    /// Number of distinct products referenced by an order
    pub fn products_found(&self, lines: &[OrderLine]) -> usize {
        products_found(lines)
    }
}

/// Per-product contribution of a single order
struct Contribution<'a> {
    name: &'a str,
    quantity: f64,
    category: Option<&'a str>,
}

/// Fold one order's lines into `current` and return the updated map
///
/// Every product referenced by the order gains one to its frequency, however
/// many lines mention it; the quantities of those lines are summed. Name and
/// category are taken from the newest order, and a missing category is filled
/// in from any order.
pub fn merge(mut current: ProductMap, lines: &[OrderLine], order_timestamp: DateTime<Utc>) -> ProductMap {
    let mut contributions: BTreeMap<&str, Contribution<'_>> = BTreeMap::new();
    for line in lines {
        contributions
            .entry(line.product_id.as_str())
            .and_modify(|c| {
                c.quantity += line.quantity;
                if c.category.is_none() {
                    c.category = line.category.as_deref();
                }
            })
            .or_insert(Contribution {
                name: &line.name,
                quantity: line.quantity,
                category: line.category.as_deref(),
            });
    }

    for (product_id, contribution) in contributions {
        match current.get_mut(product_id) {
            Some(product) => {
                let newer = order_timestamp >= product.last_purchase;

                product.frequency += 1;
                product.total_quantity += contribution.quantity;

                if newer {
                    product.last_purchase = order_timestamp;
                    product.name = contribution.name.to_string();
                    if contribution.category.is_some() {
                        product.category = contribution.category.map(str::to_string);
                    }
                } else if product.category.is_none() {
                    product.category = contribution.category.map(str::to_string);
                }
            }
            None => {
                current.insert(
                    product_id.to_string(),
                    Product {
                        id: product_id.to_string(),
                        name: contribution.name.to_string(),
                        frequency: 1,
                        last_purchase: order_timestamp,
                        total_quantity: contribution.quantity,
                        category: contribution.category.map(str::to_string),
                    },
                );
            }
        }
    }

    current
}

/// Number of distinct product ids in an order
pub fn products_found(lines: &[OrderLine]) -> usize {
    lines
        .iter()
        .map(|line| line.product_id.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Products ranked by frequency, then total quantity, then id
pub fn top_products(products: &ProductMap, limit: usize) -> Vec<&Product> {
    let mut ranked: Vec<&Product> = products.values().collect();
    ranked.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then_with(|| {
                b.total_quantity
                    .partial_cmp(&a.total_quantity)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.id.cmp(&b.id))
    });
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn line(product_id: &str, quantity: f64) -> OrderLine {
        OrderLine {
            product_id: product_id.to_string(),
            name: format!("Product {}", product_id),
            quantity,
            category: None,
        }
    }

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    // Test 1: Two orders folded in sequence
    #[test]
    fn test_merge_two_orders() {
        let t1 = ts(8);
        let t2 = ts(12);

        let map = merge(ProductMap::new(), &[line("A", 2.0), line("B", 1.0)], t1);
        assert_eq!(map.len(), 2);
        assert_eq!(map["A"].frequency, 1);
        assert_eq!(map["A"].total_quantity, 2.0);
        assert_eq!(map["A"].last_purchase, t1);
        assert_eq!(map["B"].frequency, 1);
        assert_eq!(map["B"].total_quantity, 1.0);

        let map = merge(map, &[line("A", 3.0)], t2);
        assert_eq!(map["A"].frequency, 2);
        assert_eq!(map["A"].total_quantity, 5.0);
        assert_eq!(map["A"].last_purchase, t2);
        assert_eq!(map["B"].frequency, 1);
        assert_eq!(map["B"].total_quantity, 1.0);
        assert_eq!(map["B"].last_purchase, t1);
    }

    // Test 2: Older order does not move last_purchase back
    #[test]
    fn test_last_purchase_is_max() {
        let map = merge(ProductMap::new(), &[line("A", 1.0)], ts(12));
        let map = merge(map, &[line("A", 1.0)], ts(8));

        assert_eq!(map["A"].frequency, 2);
        assert_eq!(map["A"].last_purchase, ts(12));
    }

    // Test 3: Repeated product within one order counts once
    #[test]
    fn test_repeated_line_counts_once() {
        let map = merge(
            ProductMap::new(),
            &[line("A", 1.0), line("A", 0.5), line("B", 2.0)],
            ts(9),
        );

        assert_eq!(map["A"].frequency, 1);
        assert_eq!(map["A"].total_quantity, 1.5);
        assert_eq!(products_found(&[line("A", 1.0), line("A", 0.5), line("B", 2.0)]), 2);
    }

    // Test 4: Line order within an order does not matter
    #[test]
    fn test_line_order_independent() {
        let forward = merge(ProductMap::new(), &[line("A", 1.0), line("B", 2.0)], ts(9));
        let backward = merge(ProductMap::new(), &[line("B", 2.0), line("A", 1.0)], ts(9));

        assert_eq!(forward, backward);
    }

    // Test 5: Empty order leaves the map untouched
    #[test]
    fn test_empty_order() {
        let map = merge(ProductMap::new(), &[line("A", 1.0)], ts(9));
        let after = merge(map.clone(), &[], ts(10));

        assert_eq!(after, map);
        assert_eq!(products_found(&[]), 0);
    }

    // Test 6: Category filled from a later order, name follows the newest
    #[test]
    fn test_category_and_name() {
        let map = merge(ProductMap::new(), &[line("A", 1.0)], ts(9));
        assert!(map["A"].category.is_none());

        let renamed = OrderLine {
            name: "Organic A".to_string(),
            category: Some("dairy".to_string()),
            ..line("A", 1.0)
        };
        let map = merge(map, &[renamed], ts(10));

        assert_eq!(map["A"].name, "Organic A");
        assert_eq!(map["A"].category.as_deref(), Some("dairy"));

        let older = OrderLine {
            name: "Old A".to_string(),
            category: Some("misc".to_string()),
            ..line("A", 1.0)
        };
        let map = merge(map, &[older], ts(7));

        assert_eq!(map["A"].name, "Organic A");
        assert_eq!(map["A"].category.as_deref(), Some("dairy"));
        assert_eq!(map["A"].frequency, 3);
    }

    // Test 7: Ranking by frequency then quantity
    #[test]
    fn test_top_products() {
        let map = merge(ProductMap::new(), &[line("A", 1.0), line("B", 5.0), line("C", 2.0)], ts(8));
        let map = merge(map, &[line("C", 1.0)], ts(9));

        let top: Vec<_> = top_products(&map, 2).iter().map(|p| p.id.as_str()).collect();
        assert_eq!(top, vec!["C", "B"]);
        assert_eq!(top_products(&map, 10).len(), 3);
    }

    // Test 8: Struct wrapper delegates
    #[test]
    fn test_aggregator_wrapper() {
        let aggregator = ProductAggregator;
        let map = aggregator.merge(ProductMap::new(), &[line("A", 4.0)], ts(9));

        assert_eq!(map["A"].total_quantity, 4.0);
        assert_eq!(aggregator.products_found(&[line("A", 4.0)]), 1);
    }
}
