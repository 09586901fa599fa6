// Suffix array and LCP array construction.
//
// The suffix array comes from `divsufsort`.  The LCP array is derived with
// Kärkkäinen's permuted-LCP (Phi) method in O(n) time and then clamped to the
// range the match finder works with: values below MIN_MATCH become 0 and
// values above MAX_MATCH_LEN are capped.

use super::config::{MAX_MATCH_LEN, MIN_MATCH};

/// Suffix array plus clamped LCP array of one input buffer.
#[derive(Debug, Clone, Default)]
pub struct SuffixIndex {
    /// Starting positions of all suffixes in lexicographic order.
    suffix_array: Vec<u32>,
    /// `lcp[r]` = common prefix length of suffixes `sa[r - 1]` and `sa[r]`
    /// (clamped); `lcp[0]` is 0.
    lcp: Vec<u32>,
}

impl SuffixIndex {
    /// Build the index for `input`.
    ///
    /// The caller has checked that `input.len()` fits in an `i32`.
    pub fn build(input: &[u8]) -> Self {
        let n = input.len();
        if n == 0 {
            return Self::default();
        }

        let mut sa = vec![0i32; n];
        divsufsort::sort_in_place(input, &mut sa);
        let suffix_array: Vec<u32> = sa.into_iter().map(|p| p as u32).collect();

        let lcp = build_lcp(input, &suffix_array);
        log::trace!("suffix index: {} suffixes", n);

        Self { suffix_array, lcp }
    }

    pub fn suffix_array(&self) -> &[u32] {
        &self.suffix_array
    }

    pub fn lcp(&self) -> &[u32] {
        &self.lcp
    }

    pub fn len(&self) -> usize {
        self.suffix_array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suffix_array.is_empty()
    }
}

/// Kärkkäinen-Manzini-Puglisi PLCP, then permuted back into rank order.
fn build_lcp(input: &[u8], sa: &[u32]) -> Vec<u32> {
    let n = sa.len();
    const NO_PREDECESSOR: u32 = u32::MAX;

    // phi[p] = suffix preceding suffix p in sorted order.
    let mut phi = vec![NO_PREDECESSOR; n];
    for r in 1..n {
        phi[sa[r] as usize] = sa[r - 1];
    }

    // Reuse phi as PLCP, indexed by text position.
    let mut h = 0usize;
    for i in 0..n {
        let j = phi[i];
        if j == NO_PREDECESSOR {
            phi[i] = 0;
            h = 0;
            continue;
        }
        let j = j as usize;
        while i + h < n && j + h < n && input[i + h] == input[j + h] {
            h += 1;
        }
        phi[i] = h as u32;
        h = h.saturating_sub(1);
    }

    sa.iter()
        .map(|&pos| clamp_lcp(phi[pos as usize] as usize))
        .collect()
}

#[inline]
fn clamp_lcp(h: usize) -> u32 {
    if h < MIN_MATCH {
        0
    } else {
        h.min(MAX_MATCH_LEN) as u32
    }
}
