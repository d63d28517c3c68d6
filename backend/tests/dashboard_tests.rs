//! Dashboard aggregation tests
//!
//! Verifies the classification rules behind the dashboard counters: a
//! product's total stock across all warehouses is compared to its reorder
//! level, and out-of-stock products are a subset of low-stock products.

use proptest::prelude::*;

/// One product's classification inputs
#[derive(Debug, Clone)]
struct ProductTotals {
    total: i64,
    reorder_level: i64,
}

fn is_low_stock(p: &ProductTotals) -> bool {
    p.total <= p.reorder_level
}

fn is_out_of_stock(p: &ProductTotals) -> bool {
    p.total == 0
}

fn count_stats(products: &[ProductTotals]) -> (i64, i64, i64) {
    let total = products.len() as i64;
    let low = products.iter().filter(|p| is_low_stock(p)).count() as i64;
    let out = products.iter().filter(|p| is_out_of_stock(p)).count() as i64;
    (total, low, out)
}

mod unit_tests {
    use super::*;

    #[test]
    fn test_product_at_reorder_level_is_low() {
        let p = ProductTotals { total: 5, reorder_level: 5 };
        assert!(is_low_stock(&p));
        assert!(!is_out_of_stock(&p));
    }

    #[test]
    fn test_product_above_reorder_level_is_healthy() {
        let p = ProductTotals { total: 6, reorder_level: 5 };
        assert!(!is_low_stock(&p));
    }

    #[test]
    fn test_zero_stock_counts_in_both_figures() {
        let p = ProductTotals { total: 0, reorder_level: 5 };
        assert!(is_low_stock(&p));
        assert!(is_out_of_stock(&p));
    }

    #[test]
    fn test_zero_stock_with_zero_reorder_level() {
        // A product that never materialized a stock row totals zero and is
        // still out of stock even with reorder level 0
        let p = ProductTotals { total: 0, reorder_level: 0 };
        assert!(is_low_stock(&p));
        assert!(is_out_of_stock(&p));
    }

    #[test]
    fn test_counts_over_mixed_catalog() {
        let products = vec![
            ProductTotals { total: 0, reorder_level: 10 },
            ProductTotals { total: 3, reorder_level: 10 },
            ProductTotals { total: 50, reorder_level: 10 },
            ProductTotals { total: 10, reorder_level: 10 },
        ];

        let (total, low, out) = count_stats(&products);
        assert_eq!(total, 4);
        assert_eq!(low, 3);
        assert_eq!(out, 1);
    }

    #[test]
    fn test_empty_catalog() {
        assert_eq!(count_stats(&[]), (0, 0, 0));
    }
}

mod property_tests {
    use super::*;

    fn product_strategy() -> impl Strategy<Value = ProductTotals> {
        (0i64..1000, 0i64..100)
            .prop_map(|(total, reorder_level)| ProductTotals { total, reorder_level })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Out-of-stock products are always a subset of low-stock products
        #[test]
        fn prop_out_of_stock_subset_of_low(
            products in prop::collection::vec(product_strategy(), 0..50)
        ) {
            let (_, low, out) = count_stats(&products);
            prop_assert!(out <= low);
        }

        /// No count can exceed the catalog size
        #[test]
        fn prop_counts_bounded_by_total(
            products in prop::collection::vec(product_strategy(), 0..50)
        ) {
            let (total, low, out) = count_stats(&products);
            prop_assert!(low <= total);
            prop_assert!(out <= total);
        }

        /// Raising the reorder level never shrinks the low-stock count
        #[test]
        fn prop_low_stock_monotone_in_reorder_level(
            products in prop::collection::vec(product_strategy(), 1..50),
            bump in 1i64..100
        ) {
            let (_, low_before, _) = count_stats(&products);

            let raised: Vec<ProductTotals> = products
                .iter()
                .map(|p| ProductTotals {
                    total: p.total,
                    reorder_level: p.reorder_level + bump,
                })
                .collect();
            let (_, low_after, _) = count_stats(&raised);

            prop_assert!(low_after >= low_before);
        }
    }
}
