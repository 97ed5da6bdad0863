//! The skip-list has no interior mutability, so a harness can share it under
//! a multiple-readers / single-writer lock. One writer churns inserts and
//! removals while reader threads hammer lookups; nothing observed may ever
//! contradict the ordering contract.

use std::{
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use stash_store::SkipList;

const WRITER_OPS: i64 = 10_000;

#[test]
fn readers_observe_consistent_list() {
    let list = Arc::new(RwLock::new(SkipList::new(18)));
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|seed| {
            let list = Arc::clone(&list);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut lookups = 0u64;
                while !done.load(Ordering::Relaxed) {
                    let guard = list.read().unwrap();
                    // a hit must return the member the writer stored for
                    // that exact score
                    let score = (seed * 37 + lookups as i64) % WRITER_OPS;
                    if let Some(member) = guard.get(score) {
                        assert_eq!(member, score.to_string().as_bytes());
                    }
                    lookups += 1;
                }
                lookups
            })
        })
        .collect();

    {
        for score in 0..WRITER_OPS {
            let mut guard = list.write().unwrap();
            assert!(guard.insert(score, score.to_string().as_bytes()));
            if score % 3 == 0 {
                assert!(guard.remove(score));
            }
        }
    }
    done.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }

    let guard = list.read().unwrap();
    assert_eq!(
        guard.len() as i64,
        WRITER_OPS - (WRITER_OPS as u64).div_ceil(3) as i64
    );
    let scores: Vec<i64> = guard.iter().map(|(score, _)| score).collect();
    assert!(scores.windows(2).all(|pair| pair[0] < pair[1]));
}
