/// A compact, growable bit vector.
///
/// Bits are stored little-endian within each `u64` word:
/// - bit 0 is the LSB of word 0
/// - bit 63 is the MSB of word 0
///
/// Bits past `len` are always zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitVec {
    words: Vec<u64>,
    len: usize,
    ones: usize,
}

#[inline]
fn words_for(bits: usize) -> usize {
    bits.div_ceil(64)
}

impl BitVec {
    /// Creates a bit vector of `bits` zeros.
    pub fn with_len_all_false(bits: usize) -> Self {
        Self {
            words: vec![0u64; words_for(bits)],
            len: bits,
            ones: 0,
        }
    }

    /// Reconstructs a bit vector from its raw words and bit length.
    ///
    /// Returns `None` if the word count does not match the length or
    /// any bit past the length is set.
    pub fn from_words(words: Vec<u64>, len: usize) -> Option<Self> {
        if words.len() != words_for(len) {
            return None;
        }

        let rem_bits = len % 64;
        if rem_bits != 0 {
            let last = words.last().copied().unwrap_or(0);
            if last >> rem_bits != 0 {
                return None;
            }
        }

        let ones = words.iter().map(|w| w.count_ones() as usize).sum();
        Some(Self { words, len, ones })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn as_words(&self) -> &[u64] {
        &self.words
    }

    pub fn count_ones(&self) -> usize {
        self.ones
    }

    pub fn push(&mut self, value: bool) {
        let bit = self.len % 64;
        if bit == 0 {
            self.words.push(0);
        }

        if value {
            let word = self.len / 64;
            self.words[word] |= 1u64 << bit;
            self.ones += 1;
        }

        self.len += 1;
    }

    pub fn get(&self, index: usize) -> bool {
        debug_assert!(index < self.len, "BitVec index out of bounds");
        let word = self.words[index / 64];
        ((word >> (index % 64)) & 1) == 1
    }

    pub fn set(&mut self, index: usize, value: bool) {
        debug_assert!(index < self.len, "BitVec index out of bounds");
        let word_idx = index / 64;
        let mask = 1u64 << (index % 64);
        let was_set = (self.words[word_idx] & mask) != 0;

        match (was_set, value) {
            (true, false) => {
                self.words[word_idx] &= !mask;
                self.ones -= 1;
            },
            (false, true) => {
                self.words[word_idx] |= mask;
                self.ones += 1;
            },
            _ => {},
        }
    }

    /// Removes the bit at `index`, shifting every following bit down by one.
    ///
    /// Returns the value of the removed bit.
    pub fn remove(&mut self, index: usize) -> bool {
        assert!(index < self.len, "BitVec index out of bounds");
        let word_idx = index / 64;
        let bit = index % 64;

        let word = self.words[word_idx];
        let removed = ((word >> bit) & 1) == 1;
        let low_mask = (1u64 << bit) - 1;
        let high = if bit == 63 { 0 } else { (word >> (bit + 1)) << bit };
        self.words[word_idx] = (word & low_mask) | high;

        for i in (word_idx + 1)..self.words.len() {
            let carry = self.words[i] & 1;
            self.words[i - 1] |= carry << 63;
            self.words[i] >>= 1;
        }

        self.len -= 1;
        self.words.truncate(words_for(self.len));
        if removed {
            self.ones -= 1;
        }

        removed
    }

    /// Returns an iterator over the positions of all set bits.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(word_idx, &word)| {
                let mut remaining = word;
                std::iter::from_fn(move || {
                    if remaining == 0 {
                        return None;
                    }
                    let bit = remaining.trailing_zeros() as usize;
                    remaining &= remaining - 1;
                    Some(word_idx * 64 + bit)
                })
            })
    }
}
