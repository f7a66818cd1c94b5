#![no_main]

//! Drives a draft with arbitrary get/set/finalize sequences and checks it
//! against a model of original plus overlay.

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use draft_state_core::{AccessMode, Draft, DraftConfig, finalize, shared};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Get(u8),
    Set(u8, i16),
    External(u8, i16),
    Finalize,
}

#[derive(Debug, Arbitrary)]
struct Input {
    permissive: bool,
    original: Vec<(u8, i16)>,
    ops: Vec<Op>,
}

fn key(k: u8) -> String {
    format!("k{}", k % 8)
}

fuzz_target!(|input: Input| {
    let start: BTreeMap<String, i16> = input
        .original
        .iter()
        .map(|(k, v)| (key(*k), *v))
        .collect();
    let original = shared(start.clone());
    let access = if input.permissive {
        AccessMode::Permissive
    } else {
        AccessMode::Strict
    };
    let Ok(draft) = Draft::with_config(&original, &DraftConfig::default().with_access(access))
    else {
        return;
    };

    let mut model_original = start;
    let mut model_overlay: BTreeMap<String, i16> = BTreeMap::new();

    for op in input.ops.into_iter().take(256) {
        match op {
            Op::Get(k) => {
                let k = key(k);
                let got = draft.get(&k);
                if model_original.contains_key(&k) {
                    let expected = model_overlay.get(&k).or_else(|| model_original.get(&k));
                    assert_eq!(got.ok().flatten().as_ref(), expected);
                } else if input.permissive {
                    assert_eq!(got.ok().flatten().as_ref(), model_overlay.get(&k));
                } else {
                    assert!(got.is_err());
                }
            }
            Op::Set(k, v) => {
                let k = key(k);
                let result = draft.set(&k, v);
                if model_original.contains_key(&k) || input.permissive {
                    assert!(result.is_ok());
                    model_overlay.insert(k, v);
                } else {
                    assert!(result.is_err());
                }
            }
            Op::External(k, v) => {
                let k = key(k);
                if let Some(slot) = original.borrow_mut().get_mut(&k) {
                    *slot = v;
                }
                if let Some(slot) = model_original.get_mut(&k) {
                    *slot = v;
                }
            }
            Op::Finalize => {
                finalize(&draft);
                model_original.extend(std::mem::take(&mut model_overlay));
            }
        }
        assert_eq!(*original.borrow(), model_original);
    }
});
