//! Word-aligned hybrid (WAH) compressed bitmaps.
//!
//! A [`Wah`] map is built by appending runs of bits
//! ([`Wah::add0s`]/[`Wah::add1s`]), arbitrary bytes ([`Wah::add`]), or
//! single set bits at the current or a later position
//! ([`Wah::add1_at`]). Long runs of identical words compress to a
//! single header; everything else is stored as literal words.
//!
//! Bitwise combination of maps is provided by [`and`], [`and_not`],
//! [`not_and`], [`or`] and [`multi_or`]. [`for_each_1`]/[`for_each_0`]
//! iterate set/unset bit positions without materializing the
//! decompressed bitmap. [`pool::acquire`] hands out a reusable,
//! thread-local builder for callers that build and discard many maps.

mod enumerator;
mod ops;
pub mod pool;
mod scratch;
mod wah;
mod word;

pub use enumerator::BitEnum;
pub use ops::{and, and_assign, and_not, and_not_assign, multi_or, not_and, or, or_assign};
pub use wah::{Wah, WahError};

/// Calls `f` with the position of every set bit, in increasing order.
pub fn for_each_1(map: &Wah, mut f: impl FnMut(u64)) {
    let mut en = BitEnum::start(map, false);
    while !en.is_done() {
        f(en.key());
        en.advance();
    }
}

/// Calls `f` with the position of every unset bit, in increasing order.
pub fn for_each_0(map: &Wah, mut f: impl FnMut(u64)) {
    let mut en = BitEnum::start(map, true);
    while !en.is_done() {
        f(en.key());
        en.advance();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_each_1_visits_only_set_bits_in_order() {
        let mut map = Wah::new();
        map.add0s(3);
        map.add1s(2);
        map.add0s(5);
        map.add1s(1);

        let mut seen = Vec::new();
        for_each_1(&map, |pos| seen.push(pos));
        assert_eq!(seen, vec![3, 4, 10]);
    }

    #[test]
    fn for_each_0_visits_only_unset_bits_in_order() {
        let mut map = Wah::new();
        map.add1s(2);
        map.add0s(3);

        let mut seen = Vec::new();
        for_each_0(&map, |pos| seen.push(pos));
        assert_eq!(seen, vec![2, 3, 4]);
    }
}
