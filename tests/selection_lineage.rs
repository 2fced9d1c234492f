//! # Selection and Lineage Integration Tests
//!
//! End-to-end behavior of row identities across selection, mutation, and
//! merging.
//!
//! ## Test Coverage
//!
//! 1. Selection
//!    - Comparisons return aligned sub-tables
//!    - Sub-tables share the ancestor's stamp
//!    - Set algebra recombines selections
//!
//! 2. Identity Stability
//!    - Growth allocates fresh identities
//!    - Shrink-then-grow never resurrects rows
//!    - Concatenation starts a fresh lineage
//!
//! 3. Ordering
//!    - Mixed-type sorts follow the fixed total order

use coldeck::{
    Assign, Cell, CmpOp, Column, ColumnVariant, Context, Key, Table, Target,
};

fn numbers(ctx: &std::sync::Arc<Context>, values: &[i64]) -> Table {
    let mut t = Table::new(ctx, values.len());
    t.insert("a", &ColumnVariant::Int).unwrap();
    t.col_mut("a")
        .unwrap()
        .set(
            &Key::All,
            &Assign::Seq(values.iter().map(|&v| Cell::Int(v)).collect()),
        )
        .unwrap();
    t
}

// ============================================================================
// Selection Tests
// ============================================================================

#[test]
fn test_comparison_selects_aligned_sub_table() {
    let ctx = Context::new();
    let t = numbers(&ctx, &[1, 2, 3]);

    let big = t
        .select("a", CmpOp::Gt, &Target::Scalar(Cell::Int(1)))
        .unwrap();
    assert_eq!(big.len(), 2);
    assert_eq!(big.rowindex().ids(), &[1, 2]);
    assert_eq!(big.id(), t.id());

    // Every column of the selection carries the same identities.
    for (_, col) in big.columns() {
        assert_eq!(col.rowid().ids(), big.rowindex().ids());
    }
}

#[test]
fn test_disjunction_via_union_restores_both_selections() {
    let ctx = Context::new();
    let t = numbers(&ctx, &[1, 2, 3]);

    let two = t
        .select("a", CmpOp::Eq, &Target::Scalar(Cell::Int(2)))
        .unwrap();
    let three = t
        .select("a", CmpOp::Eq, &Target::Scalar(Cell::Int(3)))
        .unwrap();
    let either = two.union(&three).unwrap();
    assert_eq!(either.rowindex().ids(), &[1, 2]);

    let same = t
        .select("a", CmpOp::Gt, &Target::Scalar(Cell::Int(1)))
        .unwrap();
    assert_eq!(either.rowindex().ids(), same.rowindex().ids());
}

#[test]
fn test_intersection_and_symmetric_difference() {
    let ctx = Context::new();
    let t = numbers(&ctx, &[1, 2, 3, 4]);

    let low = t
        .select("a", CmpOp::Le, &Target::Scalar(Cell::Int(3)))
        .unwrap();
    let high = t
        .select("a", CmpOp::Ge, &Target::Scalar(Cell::Int(2)))
        .unwrap();

    assert_eq!(low.intersect(&high).unwrap().rowindex().ids(), &[1, 2]);
    assert_eq!(low.symdiff(&high).unwrap().rowindex().ids(), &[0, 3]);
    assert_eq!(low.union(&high).unwrap().rowindex().ids(), &[0, 1, 2, 3]);
}

#[test]
fn test_selection_survives_reordering() {
    let ctx = Context::new();
    let t = numbers(&ctx, &[3, 1, 2]);
    let sorted = t.sort_by("a").unwrap();
    assert_eq!(sorted.rowindex().ids(), &[1, 2, 0]);

    // The sorted table is still the same lineage; selecting from it keeps
    // the original identities.
    let big = sorted
        .select("a", CmpOp::Ge, &Target::Scalar(Cell::Int(2)))
        .unwrap();
    assert_eq!(big.rowindex().ids(), &[2, 0]);
    assert!(t.intersect(&big).is_ok());
}

// ============================================================================
// Identity Stability Tests
// ============================================================================

#[test]
fn test_shrink_keeps_leading_identities() {
    let ctx = Context::new();
    let mut t = Table::new(&ctx, 0);
    t.insert("a", &ColumnVariant::Mixed).unwrap();
    t.set_length(5).unwrap();
    t.set_length(2).unwrap();
    assert_eq!(t.rowindex().ids(), &[0, 1]);
    assert_eq!(t.col("a").unwrap().len(), 2);
}

#[test]
fn test_mutation_breaks_lineage_with_prior_selections() {
    let ctx = Context::new();
    let mut t = numbers(&ctx, &[1, 2, 3]);
    let sub = t
        .select("a", CmpOp::Gt, &Target::Scalar(Cell::Int(1)))
        .unwrap();
    assert!(t.intersect(&sub).is_ok());

    t.set_length(4).unwrap();
    assert!(t.intersect(&sub).is_err());
}

#[test]
fn test_concat_starts_a_fresh_lineage_with_defaults() {
    let ctx = Context::new();
    let mut t = Table::new(&ctx, 2);
    t.insert("a", &ColumnVariant::Int).unwrap();
    t.insert("b", &ColumnVariant::Float).unwrap();
    let mut u = Table::new(&ctx, 2);
    u.insert("a", &ColumnVariant::Int).unwrap();
    u.insert("c", &ColumnVariant::Mixed).unwrap();

    let cat = t.concat(&u).unwrap();
    assert_eq!(cat.len(), 4);
    assert_eq!(cat.rowindex().ids(), &[0, 1, 2, 3]);
    assert_ne!(cat.id(), t.id());
    assert_ne!(cat.id(), u.id());

    let names: Vec<&str> = cat.column_names().collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    match cat.col("b").unwrap() {
        Column::Float(c) => {
            assert!(c.get(2).is_nan());
            assert!(c.get(3).is_nan());
        }
        other => panic!("expected float, got {:?}", other),
    }
    match cat.col("c").unwrap() {
        Column::Mixed(c) => assert!(c.cell(0).is_missing()),
        other => panic!("expected mixed, got {:?}", other),
    }
}

// ============================================================================
// Ordering Tests
// ============================================================================

#[test]
fn test_mixed_type_sort_follows_the_total_order() {
    let ctx = Context::new();
    let mut t = Table::new(&ctx, 6);
    t.insert("a", &ColumnVariant::Mixed).unwrap();
    t.col_mut("a")
        .unwrap()
        .set(
            &Key::All,
            &Assign::Seq(vec![
                Cell::from("banana"),
                Cell::Float(f64::NAN),
                Cell::Int(7),
                Cell::Missing,
                Cell::from("12"),
                Cell::from("apple"),
            ]),
        )
        .unwrap();
    let sorted = t.sort_by("a").unwrap();
    // numbers (numeric text included) < text < missing < NaN
    assert_eq!(sorted.rowindex().ids(), &[2, 4, 5, 0, 3, 1]);

    // Re-sorting is the identity.
    let again = sorted.sort_by("a").unwrap();
    assert_eq!(again.rowindex().ids(), sorted.rowindex().ids());
}

#[test]
fn test_nan_selects_reflexively() {
    let ctx = Context::new();
    let mut t = Table::new(&ctx, 3);
    t.insert("x", &ColumnVariant::Float).unwrap();
    t.col_mut("x")
        .unwrap()
        .set(
            &Key::All,
            &Assign::Seq(vec![
                Cell::Float(1.0),
                Cell::Float(f64::NAN),
                Cell::Float(f64::INFINITY),
            ]),
        )
        .unwrap();
    let invalid = t
        .select("x", CmpOp::Eq, &Target::Scalar(Cell::Float(f64::NAN)))
        .unwrap();
    assert_eq!(invalid.rowindex().ids(), &[1]);
    let infinite = t
        .select("x", CmpOp::Eq, &Target::Scalar(Cell::Float(f64::INFINITY)))
        .unwrap();
    assert_eq!(infinite.rowindex().ids(), &[2]);
}
