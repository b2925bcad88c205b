//! List diffing.
//!
//! [`diff`] turns a baseline list and its updated form into a minimal
//! sequence of [`FieldOp::ListRemove`] and [`FieldOp::ListInsert`]
//! operations, using the longest common subsequence of the two lists under
//! wire-level equality.
//!
//! Indices are positions in the list *as it looks when the op is applied*,
//! so the ops must be replayed in the emitted order against the baseline.
//! Insert indices always equal the element's index in the updated list. The
//! ops come out sorted by index, and at a shared index removals precede
//! insertions:
//!
//! ```text
//! [a, b, c] -> [a, d, c]   =>   LD(1), LI(1, d)
//! ```

use rowsync_types::{equal, FieldOp, Value};

/// Compute the list operations that turn `baseline` into `updated`.
pub fn diff(baseline: &[Value], updated: &[Value]) -> Vec<FieldOp> {
    if baseline.is_empty() {
        return updated
            .iter()
            .enumerate()
            .map(|(i, v)| FieldOp::ListInsert(i, v.clone()))
            .collect();
    }
    if updated.is_empty() {
        return (0..baseline.len()).map(|_| FieldOp::ListRemove(0)).collect();
    }

    let table = lcs_table(baseline, updated);
    let mut ops = Vec::with_capacity(baseline.len() + updated.len());
    let (mut i, mut j, mut at) = (0, 0, 0);

    while i < baseline.len() && j < updated.len() {
        if equal(&baseline[i], &updated[j]) {
            i += 1;
            j += 1;
            at += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            ops.push(FieldOp::ListRemove(at));
            i += 1;
        } else {
            ops.push(FieldOp::ListInsert(at, updated[j].clone()));
            j += 1;
            at += 1;
        }
    }
    for _ in i..baseline.len() {
        ops.push(FieldOp::ListRemove(at));
    }
    for value in &updated[j..] {
        ops.push(FieldOp::ListInsert(at, value.clone()));
        at += 1;
    }
    ops
}

/// `table[i][j]` is the LCS length of `a[i..]` and `b[j..]`.
fn lcs_table(a: &[Value], b: &[Value]) -> Vec<Vec<usize>> {
    let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            table[i][j] = if equal(&a[i], &b[j]) {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::apply_field_op;
    use proptest::prelude::*;
    use rowsync_types::Fields;

    fn lcs_len(a: &[Value], b: &[Value]) -> usize {
        lcs_table(a, b)[0][0]
    }

    fn s(text: &str) -> Value {
        Value::String(text.to_string())
    }

    fn strings(items: &[&str]) -> Vec<Value> {
        items.iter().map(|t| s(t)).collect()
    }

    fn replay(baseline: &[Value], ops: &[FieldOp]) -> Vec<Value> {
        let mut fields = Fields::new();
        fields.insert("list".into(), Value::List(baseline.to_vec()));
        for op in ops {
            apply_field_op(&mut fields, "list", op).unwrap();
        }
        match fields.remove("list") {
            Some(Value::List(items)) => items,
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn replaced_element_removes_before_insert() {
        let ops = diff(&strings(&["a", "b", "c"]), &strings(&["a", "d", "c"]));
        assert_eq!(ops, vec![FieldOp::ListRemove(1), FieldOp::ListInsert(1, s("d"))]);
    }

    #[test]
    fn identical_lists_need_no_ops() {
        let list = strings(&["x", "y"]);
        assert!(diff(&list, &list).is_empty());
    }

    #[test]
    fn empty_baseline_is_all_inserts() {
        let ops = diff(&[], &strings(&["a", "b"]));
        assert_eq!(
            ops,
            vec![FieldOp::ListInsert(0, s("a")), FieldOp::ListInsert(1, s("b"))]
        );
    }

    #[test]
    fn empty_update_is_all_removes() {
        let baseline = strings(&["a", "b", "c"]);
        let ops = diff(&baseline, &[]);
        assert_eq!(ops, vec![FieldOp::ListRemove(0); 3]);
        assert!(replay(&baseline, &ops).is_empty());
    }

    #[test]
    fn shrinking_list_replays_correctly() {
        let baseline = strings(&["x", "y", "z"]);
        let updated = strings(&["a"]);
        let ops = diff(&baseline, &updated);
        assert_eq!(ops.len(), 4);
        assert_eq!(replay(&baseline, &ops), updated);
    }

    #[test]
    fn appends_and_prepends() {
        let baseline = strings(&["b", "c"]);
        let updated = strings(&["a", "b", "c", "d"]);
        let ops = diff(&baseline, &updated);
        assert_eq!(
            ops,
            vec![FieldOp::ListInsert(0, s("a")), FieldOp::ListInsert(3, s("d"))]
        );
    }

    #[test]
    fn equality_is_tag_sensitive() {
        let ops = diff(&[Value::Int(1)], &[Value::Float(1.0)]);
        assert_eq!(
            ops,
            vec![FieldOp::ListRemove(0), FieldOp::ListInsert(0, Value::Float(1.0))]
        );
    }

    #[test]
    fn ops_are_sorted_with_removes_first() {
        let baseline = strings(&["a", "b", "c", "d", "e"]);
        let updated = strings(&["b", "x", "d", "y", "z"]);
        let ops = diff(&baseline, &updated);
        let index = |op: &FieldOp| match op {
            FieldOp::ListRemove(i) | FieldOp::ListInsert(i, _) => *i,
            other => panic!("unexpected op {:?}", other),
        };
        for pair in ops.windows(2) {
            assert!(index(&pair[0]) <= index(&pair[1]));
            if index(&pair[0]) == index(&pair[1]) {
                assert!(!matches!(
                    (&pair[0], &pair[1]),
                    (FieldOp::ListInsert(..), FieldOp::ListRemove(_))
                ));
            }
        }
        assert_eq!(replay(&baseline, &ops), updated);
    }

    fn small_list() -> impl Strategy<Value = Vec<Value>> {
        prop::collection::vec(
            prop_oneof![
                (0..4i64).prop_map(Value::Int),
                "[a-d]".prop_map(Value::String),
            ],
            0..12,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        /// Replaying the diff against the baseline always yields the update.
        #[test]
        fn replay_reproduces_update(a in small_list(), b in small_list()) {
            let ops = diff(&a, &b);
            prop_assert_eq!(replay(&a, &ops), b);
        }

        /// The diff never emits more ops than the LCS allows.
        #[test]
        fn diff_is_minimal(a in small_list(), b in small_list()) {
            let ops = diff(&a, &b);
            prop_assert_eq!(ops.len(), a.len() + b.len() - 2 * lcs_len(&a, &b));
        }
    }
}
