// ========================================================================================
//
//                          THE TRI-STATE BIT-VECTOR CODEC
//
// ========================================================================================
//
// Upstream thresholding reduces each gene to one byte per sample:
//
//   '0' low      '1' ambiguous      '2' high      ' ' missing
//
// A gene is carried through the engine as two bit-sets of equal width: `value`
// (sample is high) and `confidence` (sample is usably classified). Any other byte
// decodes as neither high nor confident, so corrupt input is excluded rather than
// counted as a low call.
//
// Every bit-set built here keeps the unused bits of its last storage word at zero,
// so the pair statistic can popcount raw `u64` words without masking the tail.

use bitvec::prelude::*;

pub type Bits = BitVec<u64, Lsb0>;

pub const LOW: u8 = b'0';
pub const AMBIGUOUS: u8 = b'1';
pub const HIGH: u8 = b'2';
pub const MISSING: u8 = b' ';

/// The decoded (and usually phenotype-projected) form of one gene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneProfile {
    value: Bits,
    confidence: Bits,
}

impl GeneProfile {
    /// # Panics
    /// Panics if the two bit-sets differ in width.
    pub fn new(value: Bits, confidence: Bits) -> Self {
        assert_eq!(
            value.len(),
            confidence.len(),
            "value and confidence bit-sets must have the same width"
        );
        Self { value, confidence }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.value.len()
    }

    #[inline]
    pub fn value(&self) -> &BitSlice<u64, Lsb0> {
        &self.value
    }

    #[inline]
    pub fn confidence(&self) -> &BitSlice<u64, Lsb0> {
        &self.confidence
    }

    #[inline]
    pub(crate) fn value_words(&self) -> &[u64] {
        self.value.as_raw_slice()
    }

    #[inline]
    pub(crate) fn confidence_words(&self) -> &[u64] {
        self.confidence.as_raw_slice()
    }

    /// Samples with the high bit set, whether or not they are confident.
    pub fn high_count(&self) -> usize {
        self.value.count_ones()
    }

    /// Samples confidently called low (`confidence & !value`).
    pub fn confident_low_count(&self) -> usize {
        count_and_not(self.confidence_words(), self.value_words())
    }

    pub fn confident_count(&self) -> usize {
        self.confidence.count_ones()
    }
}

/// Decodes one tri-state string into its `(value, confidence)` profile.
///
/// `value[i]` is set iff byte `i` is `'2'`; `confidence[i]` is set iff byte `i`
/// is `'0'` or `'2'`. Both bit-sets have width `text.len()`.
pub fn decode(text: &[u8]) -> GeneProfile {
    let width = text.len();
    let n_words = width.div_ceil(64);
    let mut value = vec![0u64; n_words];
    let mut confidence = vec![0u64; n_words];

    for (word_idx, chunk) in text.chunks(64).enumerate() {
        let mut v = 0u64;
        let mut c = 0u64;
        for (bit, &byte) in chunk.iter().enumerate() {
            v |= ((byte == HIGH) as u64) << bit;
            c |= ((byte == LOW || byte == HIGH) as u64) << bit;
        }
        value[word_idx] = v;
        confidence[word_idx] = c;
    }

    GeneProfile::new(words_to_bits(value, width), words_to_bits(confidence, width))
}

fn words_to_bits(words: Vec<u64>, width: usize) -> Bits {
    let mut bits = Bits::from_vec(words);
    bits.truncate(width);
    bits
}

/// `|a & !b|` over two equally sized word slices.
#[inline]
pub(crate) fn count_and_not(a: &[u64], b: &[u64]) -> usize {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x & !y).count_ones() as usize)
        .sum()
}
