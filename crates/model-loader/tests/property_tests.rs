//! Property-based tests for fingerprints and chunk planning.

use model_loader::{fingerprint, plan_chunks, Args};
use proptest::prelude::*;
use serde_json::{json, Value};

// ── Strategies ──────────────────────────────────────────────────────────────

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-z0-9 ]{0,12}".prop_map(Value::from),
        Just(Value::Null),
    ]
}

/// Argument lists with distinct keys, in generation order.
fn arb_args() -> impl Strategy<Value = Args> {
    prop::collection::btree_map("[a-z]{1,8}", arb_value(), 1..6)
        .prop_map(|map| map.into_iter().collect())
}

// ── Property tests ───────────────────────────────────────────────────────────

proptest! {
    /// Identical input always yields the identical key.
    #[test]
    fn fingerprint_is_deterministic(model_type in "[A-Z][a-zA-Z]{0,15}", args in arb_args()) {
        let copy = args.clone();
        prop_assert_eq!(fingerprint(&model_type, &args), fingerprint(&model_type, &copy));
    }

    /// Changing any single argument value changes the key.
    #[test]
    fn fingerprint_changes_with_any_single_argument(
        args in arb_args(),
        pick in any::<prop::sample::Index>(),
    ) {
        let key = args.keys().nth(pick.index(args.len())).cloned().unwrap();
        let mut changed = args.clone();
        changed.insert(key.clone(), json!({ "changed": args[&key].clone() }));
        prop_assert_ne!(fingerprint("Ticket", &args), fingerprint("Ticket", &changed));
    }

    /// The model type is part of the key.
    #[test]
    fn fingerprint_depends_on_model_type(args in arb_args()) {
        prop_assert_ne!(fingerprint("Ticket", &args), fingerprint("TicketList", &args));
    }

    /// Chunks tile `0..min(total, max)` exactly, none larger than the per-command ceiling.
    #[test]
    fn chunks_tile_the_requested_range(
        total in 0usize..500,
        max in prop::option::of(0usize..600),
        per_command in 1usize..60,
    ) {
        let chunks = plan_chunks(total, max, per_command);
        let expected = max.map_or(total, |m| m.min(total));

        let mut next = 0;
        for chunk in &chunks {
            prop_assert_eq!(chunk.offset, next);
            prop_assert!(chunk.limit > 0 && chunk.limit <= per_command);
            next += chunk.limit;
        }
        prop_assert_eq!(next, expected);
        prop_assert_eq!(chunks.len(), expected.div_ceil(per_command));
    }
}
