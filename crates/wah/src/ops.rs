//! Bitwise operators between maps: `and`, `and_not`, `not_and` and `or`,
//! plus their in-place `_assign` counterparts.
//!
//! Every binary operator is built on top of [`merge_into`], which walks
//! both operands' [`WordEnum`]s in lock step, batching whole runs into a
//! single push instead of materializing them word by word. The value
//! -returning operators (`and`, `or`, ...) write into a fresh map; the
//! `_assign` operators write into `dst` itself, first snapshotting its
//! current word buffer into the scratch stack allocator (see
//! [`crate::scratch`]) since the rebuild resets `dst` before it can read
//! the words being folded into it.

use crate::enumerator::{WordEnum, WordSource};
use crate::scratch;
use crate::wah::Wah;
use crate::word::{mask_lt, WORD_BITS};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Op {
    And,
    Or,
}

impl Op {
    #[inline]
    fn apply(self, a: u32, b: u32) -> u32 {
        match self {
            Op::And => a & b,
            Op::Or => a | b,
        }
    }
}

fn push_run(result: &mut Wah, value: u32, words: u64) {
    if words == 0 {
        return;
    }
    if value == 0 {
        result.add0s(words * u64::from(WORD_BITS));
    } else {
        debug_assert_eq!(value, u32::MAX, "a run word must be all-zero or all-one");
        result.add1s(words * u64::from(WORD_BITS));
    }
}

/// Appends a run of literal words to `dst`, scrubbing any word that is
/// actually all-zero or all-one through [`Wah::add0s`]/[`Wah::add1s`] so
/// the result stays normalized instead of storing a trivial word as a
/// literal next to a run of the same polarity.
fn flush_literal_buf(dst: &mut Wah, buf: &[u32]) {
    let mut i = 0;
    while i < buf.len() {
        let word = buf[i];
        if word == 0 || word == u32::MAX {
            let mut run = 1;
            while i + run < buf.len() && buf[i + run] == word {
                run += 1;
            }
            if word == 0 {
                dst.add0s(run as u64 * u64::from(WORD_BITS));
            } else {
                dst.add1s(run as u64 * u64::from(WORD_BITS));
            }
            i += run;
        } else {
            let start = i;
            while i < buf.len() && buf[i] != 0 && buf[i] != u32::MAX {
                i += 1;
            }
            dst.append_literal_words(&buf[start..i]);
        }
    }
}

/// Runs both operands' word enumerators in lock step over their shared
/// length (the shorter operand zero-extends), applying `op` to every
/// word, and writes the result into `dst`, which is reset first.
fn merge_into(dst: &mut Wah, a: WordSource<'_>, a_not: bool, b: WordSource<'_>, b_not: bool, op: Op) {
    dst.reset();
    let target_len = a.len.max(b.len);
    let target_words = target_len / u64::from(WORD_BITS);
    let tail_bits = (target_len % u64::from(WORD_BITS)) as u32;

    let mut ea = WordEnum::start(a, a_not);
    let mut eb = WordEnum::start(b, b_not);
    let mut done = 0u64;
    let mut buf = Vec::new();

    while done < target_words {
        let remaining = target_words - done;
        if ea.is_run_or_end() && eb.is_run_or_end() {
            let n = ea.words_available(remaining).min(eb.words_available(remaining)).min(remaining);
            push_run(dst, op.apply(ea.current, eb.current), n);
            ea.skip(n);
            eb.skip(n);
            done += n;
        } else {
            buf.clear();
            while done + (buf.len() as u64) < target_words && !(ea.is_run_or_end() && eb.is_run_or_end()) {
                buf.push(op.apply(ea.current, eb.current));
                ea.next();
                eb.next();
            }
            done += buf.len() as u64;
            flush_literal_buf(dst, &buf);
        }
    }

    if tail_bits > 0 {
        let word = op.apply(ea.current, eb.current) & mask_lt(tail_bits);
        for bit in 0..tail_bits {
            if word & (1 << bit) != 0 {
                dst.add1s(1);
            } else {
                dst.add0s(1);
            }
        }
    }
}

/// Runs [`merge_into`] into a fresh map sized for roughly the expected
/// number of chunks.
fn merge(a: &Wah, a_not: bool, b: &Wah, b_not: bool, op: Op) -> Wah {
    let target_words = a.len().max(b.len()) / u64::from(WORD_BITS);
    let mut result = Wah::with_capacity((target_words as usize / 64).max(1));
    merge_into(&mut result, WordSource::from(a), a_not, WordSource::from(b), b_not, op);
    result
}

/// `a AND b`.
pub fn and(a: &Wah, b: &Wah) -> Wah {
    merge(a, false, b, false, Op::And)
}

/// `a AND (NOT b)`.
pub fn and_not(a: &Wah, b: &Wah) -> Wah {
    merge(a, false, b, true, Op::And)
}

/// `(NOT a) AND b`.
pub fn not_and(a: &Wah, b: &Wah) -> Wah {
    merge(a, true, b, false, Op::And)
}

/// `a OR b`.
pub fn or(a: &Wah, b: &Wah) -> Wah {
    merge(a, false, b, false, Op::Or)
}

/// `OR` of every map in `maps`, folded pairwise. Returns an empty map
/// when `maps` is empty.
pub fn multi_or(maps: &[Wah]) -> Wah {
    let mut iter = maps.iter();
    let Some(first) = iter.next() else { return Wah::new() };
    iter.fold(first.clone(), |acc, next| or(&acc, next))
}

/// In-place `dst := dst op src`: snapshots `dst`'s current word buffer
/// into the scratch stack allocator, then rebuilds `dst` from that
/// snapshot and `src`.
fn merge_assign(dst: &mut Wah, src: &Wah, src_not: bool, op: Op) {
    let dst_len = dst.len();
    let dst_pending = dst.pending;
    // Move dst's buffer out so it can be snapshotted independently of
    // `dst` itself, which the rebuild below needs to borrow mutably.
    let original_data = std::mem::take(&mut dst.data);
    let src_view = WordSource::from(src);
    scratch::with_snapshot(&original_data, |snapshot| {
        let dst_view = WordSource { len: dst_len, pending: dst_pending, data: snapshot };
        merge_into(dst, dst_view, false, src_view, src_not, op);
    });
}

/// `dst := dst AND src`.
pub fn and_assign(dst: &mut Wah, src: &Wah) {
    merge_assign(dst, src, false, Op::And);
}

/// `dst := dst AND (NOT src)`.
pub fn and_not_assign(dst: &mut Wah, src: &Wah) {
    merge_assign(dst, src, true, Op::And);
}

/// `dst := dst OR src`.
pub fn or_assign(dst: &mut Wah, src: &Wah) {
    merge_assign(dst, src, false, Op::Or);
}


#[cfg(test)]
mod tests {
    use super::*;

    fn from_bits(bits: &[bool]) -> Wah {
        let mut map = Wah::new();
        for &b in bits {
            if b {
                map.add1s(1);
            } else {
                map.add0s(1);
            }
        }
        map
    }

    fn to_bits(map: &Wah) -> Vec<bool> {
        (0..map.len()).map(|i| map.get(i)).collect()
    }

    #[test]
    fn and_matches_bitwise_truth_table() {
        let a = from_bits(&[true, true, false, false, true]);
        let b = from_bits(&[true, false, true, false, true]);
        assert_eq!(to_bits(&and(&a, &b)), vec![true, false, false, false, true]);
    }

    #[test]
    fn or_matches_bitwise_truth_table() {
        let a = from_bits(&[true, true, false, false]);
        let b = from_bits(&[true, false, true, false]);
        assert_eq!(to_bits(&or(&a, &b)), vec![true, true, true, false]);
    }

    #[test]
    fn or_zero_extends_the_shorter_operand() {
        let mut a = Wah::new();
        a.add1s(40);
        let mut b = Wah::new();
        b.add1s(8);
        let merged = or(&a, &b);
        assert_eq!(merged.len(), 40);
        assert_eq!(merged.active(), 40);
    }

    #[test]
    fn and_not_matches_bitwise_truth_table() {
        let a = from_bits(&[true, true, false, false]);
        let b = from_bits(&[true, false, true, false]);
        assert_eq!(to_bits(&and_not(&a, &b)), vec![false, true, false, false]);
    }

    #[test]
    fn multi_or_of_empty_slice_is_empty() {
        let merged = multi_or(&[]);
        assert_eq!(merged.len(), 0);
    }

    #[test]
    fn multi_or_unions_every_operand() {
        let a = from_bits(&[true, false, false]);
        let b = from_bits(&[false, true, false]);
        let c = from_bits(&[false, false, true]);
        let merged = multi_or(&[a, b, c]);
        assert_eq!(to_bits(&merged), vec![true, true, true]);
    }

    #[test]
    fn non_reg_and_forced_active_bound_holds() {
        // Directly forces the builder's internal state to a fixed chunk
        // stream, the way a deserialized/corrupted-by-construction map
        // would look, rather than building it up through add0s/add1s.
        let mut src = Wah::new();
        src.data = vec![0x0000_0519, 0, 0x8000_0101, 0];
        src.pending = 0x1_ffff;
        src.active = 8241;
        src.len = 50001;

        let mut other = Wah::new();
        other.data = vec![0, 2, 0x8000_0010, 3, 0x1d, 1, 0x7e00, 0x1e, 0];
        other.pending = 0x60_0000;
        other.active = 12;
        other.len = 2007;

        let result = and(&src, &other);
        assert_eq!(result.len(), 50001);
        assert!(result.active() <= 12);
    }

    #[test]
    fn and_not_over_huge_run_against_all_zero_map_is_identity() {
        let zeros = 84_969_209_384u64;
        let ones = 85_038_314_623u64 - zeros + 1;
        let mut a = Wah::new();
        a.add0s(zeros);
        a.add1s(ones);

        let mut b = Wah::new();
        b.add0s(21 * 32);

        let result = and_not(&a, &b);
        assert_eq!(result.len(), a.len());
        assert_eq!(result.active(), a.active());
    }

    #[test]
    fn and_not_over_huge_all_one_map_against_small_zero_map_is_identity() {
        let count = 68_719_476_704u64 * 2 + 11_395_279_936 + 31;
        let mut a = Wah::new();
        a.add1s(count);

        let mut b = Wah::new();
        b.add0s(960);

        let result = and_not(&a, &b);
        assert_eq!(result.len(), a.len());
        assert_eq!(result.active(), a.active());
    }

    #[test]
    fn and_of_large_runs_stays_compressed() {
        let mut a = Wah::new();
        a.add1s(10_000);
        let mut b = Wah::new();
        b.add1s(10_000);
        let mut merged = and(&a, &b);
        assert_eq!(merged.len(), 10_000);
        assert_eq!(merged.active(), 10_000);
        merged.pad32();
        assert!(merged.as_wire_words().len() < 100);
    }

    #[test]
    fn and_against_a_literal_chunk_keeps_an_all_zero_result_as_a_run() {
        // `a` is an all-zero run; `b`'s first (and only) chunk is a pair
        // of literal words, so the merge takes the literal branch even
        // though the AND of every word is trivially zero. The output
        // must still normalize to a run, not two literal-zero words
        // sitting next to the empty skeleton run.
        let mut a = Wah::new();
        a.add0s(64);

        let mut b = Wah::new();
        b.data = vec![0, 2, 0x1234_5678, 0x9abc_def0];
        b.pending = 0;
        b.active = 16;
        b.len = 64;

        let mut merged = and(&a, &b);
        assert_eq!(merged.len(), 64);
        assert_eq!(merged.active(), 0);
        merged.pad32();
        assert_eq!(merged.as_wire_words().len(), 2);
    }

    #[test]
    fn or_against_a_literal_chunk_keeps_an_all_one_result_as_a_run() {
        let mut a = Wah::new();
        a.add1s(64);

        let mut b = Wah::new();
        b.data = vec![0, 2, 0x1234_5678, 0x9abc_def0];
        b.pending = 0;
        b.active = 16;
        b.len = 64;

        let mut merged = or(&a, &b);
        assert_eq!(merged.len(), 64);
        assert_eq!(merged.active(), 64);
        merged.pad32();
        assert_eq!(merged.as_wire_words().len(), 2);
    }

    #[test]
    fn and_assign_matches_the_value_returning_and() {
        let a = from_bits(&[true, true, false, false, true]);
        let b = from_bits(&[true, false, true, false, true]);
        let expected = to_bits(&and(&a, &b));

        let mut dst = a;
        and_assign(&mut dst, &b);
        assert_eq!(to_bits(&dst), expected);
    }

    #[test]
    fn and_not_assign_matches_the_value_returning_and_not() {
        let a = from_bits(&[true, true, false, false]);
        let b = from_bits(&[true, false, true, false]);
        let expected = to_bits(&and_not(&a, &b));

        let mut dst = a;
        and_not_assign(&mut dst, &b);
        assert_eq!(to_bits(&dst), expected);
    }

    #[test]
    fn or_assign_matches_the_value_returning_or() {
        let a = from_bits(&[true, false, false]);
        let b = from_bits(&[false, true, false]);
        let expected = to_bits(&or(&a, &b));

        let mut dst = a;
        or_assign(&mut dst, &b);
        assert_eq!(to_bits(&dst), expected);
    }

    #[test]
    fn and_assign_over_huge_run_matches_value_returning_and_not() {
        // Exercises the scratch-snapshot path with a buffer large enough
        // that it cannot plausibly be mistaken for an inlined/elided copy.
        let zeros = 84_969_209_384u64;
        let ones = 85_038_314_623u64 - zeros + 1;
        let mut a = Wah::new();
        a.add0s(zeros);
        a.add1s(ones);

        let mut b = Wah::new();
        b.add0s(21 * 32);

        let expected = and_not(&a, &b);
        let mut dst = a;
        and_not_assign(&mut dst, &b);
        assert_eq!(dst.len(), expected.len());
        assert_eq!(dst.active(), expected.active());
    }
}
