//! Property-based tests for the mapping engine

mod test_support;

use facet::Facet;
use mapwise_core::{Mapper};
use proptest::prelude::*;
use std::collections::HashMap;
use test_support::*;

#[derive(Debug, Default, Clone, PartialEq, Facet)]
struct Inventory {
    sku: String,
    counts: Vec<i32>,
    note: Option<String>,
    bins: HashMap<String, u16>,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
struct InventoryView {
    sku: String,
    counts: Vec<i64>,
    note: Option<Box<String>>,
    bins: HashMap<String, u32>,
}

fn inventory_strategy() -> impl Strategy<Value = Inventory> {
    (
        "[A-Z]{2}-[0-9]{1,4}",
        prop::collection::vec(any::<i32>(), 0..8),
        prop::option::of("[a-z ]{0,12}"),
        prop::collection::hash_map("[a-z]{1,3}", any::<u16>(), 0..5),
    )
        .prop_map(|(sku, counts, note, bins)| Inventory {
            sku,
            counts,
            note,
            bins,
        })
}

fn user_strategy() -> impl Strategy<Value = User> {
    ("[A-Za-z]{0,10}", "[A-Za-z]{0,10}", any::<i32>(), "[a-z@.]{0,16}").prop_map(
        |(first_name, last_name, age, email)| User {
            first_name,
            last_name,
            age,
            email,
        },
    )
}

proptest! {
    #[test]
    fn prop_identity_mapping_preserves_value(inventory in inventory_strategy()) {
        let mapper = Mapper::new();
        let copy: Inventory = mapper.map(&inventory).unwrap();
        prop_assert_eq!(copy, inventory);
    }

    #[test]
    fn prop_widening_and_back_preserves_value(inventory in inventory_strategy()) {
        let mapper = Mapper::new();
        let view: InventoryView = mapper.map(&inventory).unwrap();
        prop_assert_eq!(view.counts.len(), inventory.counts.len());
        prop_assert_eq!(view.note.as_deref().cloned(), inventory.note.clone());

        let back: Inventory = mapper.map(&view).unwrap();
        prop_assert_eq!(back, inventory);
    }

    #[test]
    fn prop_mapping_is_idempotent(user in user_strategy(), seed in user_strategy()) {
        let mapper = Mapper::new();
        let mut once: UserDto = mapper.map(&seed).unwrap();
        mapper.map_to(&user, &mut once).unwrap();
        let mut twice = once.clone();
        mapper.map_to(&user, &mut twice).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_array_takes_prefix_and_pads(values in prop::collection::vec(any::<i16>(), 0..12)) {
        let mapper = Mapper::new();
        let array: [i32; 6] = mapper.map(&values).unwrap();
        for (index, slot) in array.iter().enumerate() {
            let expected = values.get(index).map_or(0, |v| i32::from(*v));
            prop_assert_eq!(*slot, expected);
        }
    }
}
