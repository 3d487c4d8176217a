//! The compressed bitmap itself: builder operations, random-access `get`,
//! in-place `not`, and the wire encoding used by [`Wah::from_wire_words`]
//! and [`Wah::as_wire_words`].

use crate::word::{mask_lt, Header, MAX_WORDS_IN_RUN, WORD_BITS};

/// A word-aligned hybrid compressed bitmap.
///
/// Bits are appended sequentially with [`add0s`](Self::add0s),
/// [`add1s`](Self::add1s) or [`add`](Self::add); the map does not support
/// writing at an arbitrary position except by extending its current
/// length (see [`add1_at`](Self::add1_at)).
#[derive(Debug, Clone)]
pub struct Wah {
    pub(crate) len: u64,
    pub(crate) active: u64,
    pub(crate) pending: u32,
    pub(crate) data: Vec<u32>,
    pub(crate) last_run_pos: usize,
    pub(crate) previous_run_pos: Option<usize>,
}

/// Failure reading a [`Wah`] back from raw wire words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WahError {
    /// The word stream is too short, or a chunk's header/count claims
    /// more literal words than the stream actually holds.
    #[error("corrupt wah stream")]
    CorruptStream,
}

impl Default for Wah {
    fn default() -> Self {
        Self::new()
    }
}

impl Wah {
    /// Creates an empty bitmap.
    pub fn new() -> Self {
        let mut map = Self { len: 0, active: 0, pending: 0, data: Vec::new(), last_run_pos: 0, previous_run_pos: None };
        map.reset();
        map
    }

    /// Creates an empty bitmap with `data` storage pre-sized for roughly
    /// `expected_chunks` chunks.
    pub fn with_capacity(expected_chunks: usize) -> Self {
        let mut map = Self {
            len: 0,
            active: 0,
            pending: 0,
            data: Vec::with_capacity(expected_chunks * 2 + 2),
            last_run_pos: 0,
            previous_run_pos: None,
        };
        map.reset();
        map
    }

    /// Resets the map to the empty state, keeping the underlying storage
    /// allocated.
    pub fn reset(&mut self) {
        self.len = 0;
        self.active = 0;
        self.pending = 0;
        self.data.clear();
        self.data.extend_from_slice(&[0, 0]);
        self.last_run_pos = 0;
        self.previous_run_pos = None;
    }

    /// Number of bits appended so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the map contains no bits.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of set (`1`) bits.
    pub fn active(&self) -> u64 {
        self.active
    }

    fn last_run_header(&self) -> Header {
        Header::decode(self.data[self.last_run_pos])
    }

    fn set_last_run_header(&mut self, head: Header) {
        self.data[self.last_run_pos] = head.encode();
    }

    fn last_run_count(&self) -> u32 {
        self.data[self.last_run_pos + 1]
    }

    fn last_run_count_mut(&mut self) -> &mut u32 {
        &mut self.data[self.last_run_pos + 1]
    }

    fn append_header(&mut self, head: Header) {
        self.data.push(head.encode());
        self.data.push(0);
    }

    fn append_literal(&mut self, value: u32) {
        self.data.push(value);
    }

    /// Appends a contiguous slice of literal (uncompressed) words,
    /// updating `len`/`active` to match.
    pub(crate) fn append_literal_words(&mut self, words: &[u32]) {
        if words.is_empty() {
            return;
        }
        self.flatten_last_run();
        *self.last_run_count_mut() += words.len() as u32;
        self.data.extend_from_slice(words);
        self.len += words.len() as u64 * u64::from(WORD_BITS);
        self.active += words.iter().map(|w| u64::from(w.count_ones())).sum::<u64>();
    }

    /// Turns a trailing one-word run back into a literal, so it can be
    /// merged with (or replaced by) whatever comes next. The builder
    /// keeps a one-word run "open" rather than eagerly deciding whether
    /// it will grow, since a following call might extend it.
    fn flatten_last_run(&mut self) {
        let head = self.last_run_header();
        if head.words != 1 {
            return;
        }
        debug_assert_eq!(self.last_run_count(), 0);
        debug_assert_eq!(self.data.len(), self.last_run_pos + 2);

        if self.last_run_pos > 0 {
            self.data.truncate(self.data.len() - 2);
            let prev = self.previous_run_pos.expect("non-zero last_run_pos implies a previous run");
            self.data[prev + 1] += 1;
            self.last_run_pos = prev;
            self.previous_run_pos = None;
        } else {
            self.set_last_run_header(Header { bit: head.bit, words: 0 });
            self.data[1] = 1;
        }
        self.append_literal(if head.bit { u32::MAX } else { 0 });
    }

    /// Commits `words` words equal to `self.pending` into the chunk
    /// stream, merging into the trailing run where possible.
    fn push_pending(&mut self, mut words: u64) {
        let is_trivial = self.pending == u32::MAX || self.pending == 0;

        if !is_trivial {
            self.flatten_last_run();
            *self.last_run_count_mut() += words as u32;
            while words > 0 {
                self.append_literal(self.pending);
                words -= 1;
            }
        } else {
            let mut head = self.last_run_header();
            let pending_bit = self.pending != 0;

            if self.last_run_count() == 0 && (head.bit == pending_bit || head.words == 0) {
                let to_add = words.min(u64::from(MAX_WORDS_IN_RUN - head.words));
                head.words += to_add as u32;
                head.bit = pending_bit;
                self.set_last_run_header(head);
                words -= to_add;
            }
            if self.last_run_header().words < 2 {
                self.flatten_last_run();
            }
            while words > 0 {
                let to_add = words.min(u64::from(MAX_WORDS_IN_RUN));
                words -= to_add;
                self.previous_run_pos = Some(self.last_run_pos);
                self.last_run_pos = self.data.len();
                self.append_header(Header { bit: pending_bit, words: to_add as u32 });
            }
        }
        self.pending = 0;
    }

    /// Appends `count` zero bits.
    pub fn add0s(&mut self, mut count: u64) {
        let remain = self.len % u64::from(WORD_BITS);
        if remain + count < u64::from(WORD_BITS) {
            self.len += count;
            return;
        }
        if remain > 0 {
            let fill = u64::from(WORD_BITS) - remain;
            count -= fill;
            self.len += fill;
            self.push_pending(1);
        }
        if count >= u64::from(WORD_BITS) {
            self.push_pending(count / u64::from(WORD_BITS));
        }
        self.len += count;
    }

    /// Appends `count` one bits.
    pub fn add1s(&mut self, mut count: u64) {
        let remain = self.len % u64::from(WORD_BITS);
        if remain + count < u64::from(WORD_BITS) {
            self.pending |= mask_lt(count as u32) << remain;
            self.len += count;
            self.active += count;
            return;
        }
        if remain > 0 {
            self.pending |= !mask_lt(remain as u32);
            let fill = u64::from(WORD_BITS) - remain;
            self.len += fill;
            self.active += fill;
            count -= fill;
            self.push_pending(1);
        }
        if count >= u64::from(WORD_BITS) {
            self.pending = u32::MAX;
            self.push_pending(count / u64::from(WORD_BITS));
        }
        self.pending = mask_lt((count % u64::from(WORD_BITS)) as u32);
        self.len += count;
        self.active += count;
    }

    /// Sets bit `pos`, which must not be before the current end of the
    /// map (no random-access mutation is supported).
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `pos < self.len()`.
    pub fn add1_at(&mut self, pos: u64) {
        debug_assert!(pos >= self.len, "add1_at: position already passed by the builder");
        if pos != self.len {
            self.add0s(pos - self.len);
        }
        self.add1s(1);
    }

    /// Pads the map up to the next word boundary with zero bits.
    ///
    /// Required before [`as_wire_words`](Self::as_wire_words) so that no
    /// bits are left uncommitted in `pending`.
    pub fn pad32(&mut self) {
        let remain = self.len % u64::from(WORD_BITS);
        if remain != 0 {
            self.add0s(u64::from(WORD_BITS) - remain);
        }
    }

    /// Appends `bit_count` bits read from `data` (little-endian bit
    /// order within each byte), detecting runs of all-zero or all-one
    /// words along the way.
    pub fn add(&mut self, data: &[u8], bit_count: u64) {
        let mut consumed = 0u64;

        while consumed < bit_count && self.len % u64::from(WORD_BITS) != 0 {
            if bit_at(data, consumed) {
                self.add1s(1);
            } else {
                self.add0s(1);
            }
            consumed += 1;
        }

        while consumed + u64::from(WORD_BITS) <= bit_count {
            let word = read_u32_le(data, consumed);
            match word {
                0 => {
                    let mut run = u64::from(WORD_BITS);
                    while consumed + run + u64::from(WORD_BITS) <= bit_count
                        && read_u32_le(data, consumed + run) == 0
                    {
                        run += u64::from(WORD_BITS);
                    }
                    self.add0s(run);
                    consumed += run;
                }
                u32::MAX => {
                    let mut run = u64::from(WORD_BITS);
                    while consumed + run + u64::from(WORD_BITS) <= bit_count
                        && read_u32_le(data, consumed + run) == u32::MAX
                    {
                        run += u64::from(WORD_BITS);
                    }
                    self.add1s(run);
                    consumed += run;
                }
                _ => {
                    let mut words = Vec::new();
                    loop {
                        let w = read_u32_le(data, consumed);
                        if w == 0 || w == u32::MAX {
                            break;
                        }
                        words.push(w);
                        consumed += u64::from(WORD_BITS);
                        if consumed + u64::from(WORD_BITS) > bit_count {
                            break;
                        }
                    }
                    self.append_literal_words(&words);
                }
            }
        }

        while consumed < bit_count {
            if bit_at(data, consumed) {
                self.add1s(1);
            } else {
                self.add0s(1);
            }
            consumed += 1;
        }
    }

    /// Reads the bit at `pos`. Returns `false` (rather than panicking)
    /// when `pos` is at or past the end of the map, matching a bitmap
    /// that is implicitly zero-filled beyond its declared length.
    pub fn get(&self, pos: u64) -> bool {
        if pos >= self.len {
            return false;
        }

        let mut pos = pos;
        let mut i = 0usize;
        while i < self.data.len() {
            let head = Header::decode(self.data[i]);
            let count = self.data[i + 1];
            i += 2;

            let run_bits = u64::from(head.words) * u64::from(WORD_BITS);
            if pos < run_bits {
                return head.bit;
            }
            pos -= run_bits;

            let lit_bits = u64::from(count) * u64::from(WORD_BITS);
            if pos < lit_bits {
                let word_idx = (pos / u64::from(WORD_BITS)) as usize;
                let bit_idx = (pos % u64::from(WORD_BITS)) as u32;
                return (self.data[i + word_idx] >> bit_idx) & 1 != 0;
            }
            pos -= lit_bits;
            i += count as usize;
        }

        let bit_idx = pos as u32;
        (self.pending >> bit_idx) & 1 != 0
    }

    /// Flips every bit in place.
    pub fn not(&mut self) {
        let mut i = 0usize;
        while i < self.data.len() {
            let head = Header::decode(self.data[i]);
            let count = self.data[i + 1];
            self.data[i] = Header { bit: !head.bit, words: head.words }.encode();
            i += 2;
            for word in &mut self.data[i..i + count as usize] {
                *word = !*word;
            }
            i += count as usize;
        }
        if self.len % u64::from(WORD_BITS) != 0 {
            self.pending = !self.pending & mask_lt((self.len % u64::from(WORD_BITS)) as u32);
        }
        self.active = self.len - self.active;
    }

    /// Returns the raw wire words (`HEADER, COUNT, literals...` chunks).
    ///
    /// # Panics
    ///
    /// In debug builds, panics if the map has pending bits that have not
    /// been flushed with [`pad32`](Self::pad32).
    pub fn as_wire_words(&self) -> &[u32] {
        debug_assert_eq!(self.len % u64::from(WORD_BITS), 0, "call pad32 before reading wire words");
        &self.data
    }

    /// Rebuilds a map from raw wire words previously returned by
    /// [`as_wire_words`](Self::as_wire_words), validating chunk bounds.
    pub fn from_wire_words(data: &[u32]) -> Result<Self, WahError> {
        if data.len() < 2 {
            return Err(WahError::CorruptStream);
        }

        let mut len = 0u64;
        let mut active = 0u64;
        let mut last_run_pos = None;
        let mut previous_run_pos = None;
        let mut pos = 0usize;

        while pos < data.len() - 1 {
            let head = Header::decode(data[pos]);
            pos += 1;
            let words = data[pos] as u64;
            pos += 1;

            if words > data.len() as u64 || pos as u64 > data.len() as u64 - words {
                return Err(WahError::CorruptStream);
            }

            previous_run_pos = last_run_pos;
            last_run_pos = Some(pos - 2);

            if head.bit {
                active += u64::from(WORD_BITS) * u64::from(head.words);
            }
            if words > 0 {
                active += data[pos..pos + words as usize].iter().map(|w| u64::from(w.count_ones())).sum::<u64>();
            }
            len += u64::from(WORD_BITS) * (u64::from(head.words) + words);
            pos += words as usize;
        }

        if pos != data.len() {
            return Err(WahError::CorruptStream);
        }

        Ok(Self {
            len,
            active,
            pending: 0,
            data: data.to_vec(),
            last_run_pos: last_run_pos.expect("scan loop runs at least once for data.len() >= 2"),
            previous_run_pos,
        })
    }
}

fn bit_at(data: &[u8], idx: u64) -> bool {
    let byte = data[(idx / 8) as usize];
    (byte >> (idx % 8)) & 1 != 0
}

fn read_u32_le(data: &[u8], bit_offset: u64) -> u32 {
    let byte_offset = (bit_offset / 8) as usize;
    u32::from_le_bytes(data[byte_offset..byte_offset + 4].try_into().unwrap())
}
