//! A small thread-local pool of reusable [`Wah`] builders.
//!
//! Building a map up from scratch means growing its `Vec<u32>` storage
//! from empty; reusing a previously-finished map's allocation avoids
//! that growth on the next build. Each thread keeps up to
//! [`POOL_CAPACITY`] maps around for this purpose.

use std::cell::RefCell;
use std::ops::{Deref, DerefMut};

use crate::wah::Wah;

const POOL_CAPACITY: usize = 16;

thread_local! {
    static POOL: RefCell<Vec<Wah>> = const { RefCell::new(Vec::new()) };
}

/// A [`Wah`] borrowed from the thread-local pool. Resets and returns
/// itself to the pool on drop (if the pool has room).
pub struct PooledWah(Option<Wah>);

impl Deref for PooledWah {
    type Target = Wah;

    fn deref(&self) -> &Wah {
        self.0.as_ref().expect("PooledWah is only empty after drop")
    }
}

impl DerefMut for PooledWah {
    fn deref_mut(&mut self) -> &mut Wah {
        self.0.as_mut().expect("PooledWah is only empty after drop")
    }
}

impl Drop for PooledWah {
    fn drop(&mut self) {
        if let Some(mut map) = self.0.take() {
            map.reset();
            POOL.with(|pool| {
                let mut pool = pool.borrow_mut();
                if pool.len() < POOL_CAPACITY {
                    pool.push(map);
                }
            });
        }
    }
}

/// Borrows an empty map from the pool, allocating a new one if the pool
/// is currently empty.
pub fn acquire() -> PooledWah {
    let map = POOL.with(|pool| pool.borrow_mut().pop()).unwrap_or_default();
    PooledWah(Some(map))
}
