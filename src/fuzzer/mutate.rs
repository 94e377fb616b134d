// SPDX-License-Identifier: PMPL-1.0-or-later

//! Mutation operators for the directed fuzzer, translated from
//! `fuzzer/mutation_strategies.py`. All operators are total: an empty
//! input is returned unchanged, and only `interesting_values` pads a
//! too-short input.

use crate::fuzzer::rng::Rng;

const INTERESTING_U32: [u32; 6] = [0, 0xFFFF_FFFF, 0x7FFF_FFFF, 0x8000_0000, 0x0000_FFFF, 0x0000_7FFF];

pub fn bit_flip(data: &[u8], rng: &mut Rng) -> Vec<u8> {
    if data.is_empty() {
        return data.to_vec();
    }
    let mut out = data.to_vec();
    let idx = rng.gen_range(out.len());
    let bit = rng.gen_range(8);
    out[idx] ^= 1 << bit;
    out
}

pub fn byte_flip(data: &[u8], rng: &mut Rng) -> Vec<u8> {
    if data.is_empty() {
        return data.to_vec();
    }
    let mut out = data.to_vec();
    let idx = rng.gen_range(out.len());
    out[idx] ^= 0xFF;
    out
}

pub fn arithmetic(data: &[u8], rng: &mut Rng) -> Vec<u8> {
    if data.is_empty() {
        return data.to_vec();
    }
    let mut out = data.to_vec();
    let idx = rng.gen_range(out.len());
    let delta = 1u8.wrapping_add(rng.gen_range(10) as u8);
    out[idx] = if rng.gen_bool() {
        out[idx].wrapping_add(delta)
    } else {
        out[idx].wrapping_sub(delta)
    };
    out
}

pub fn interesting_values(data: &[u8], rng: &mut Rng) -> Vec<u8> {
    if data.is_empty() {
        return data.to_vec();
    }
    let val = INTERESTING_U32[rng.gen_range(INTERESTING_U32.len())];
    let chunk = val.to_le_bytes();
    if data.len() < 4 {
        let mut out = data.to_vec();
        out.extend_from_slice(&chunk);
        return out;
    }
    let mut out = data.to_vec();
    let idx = rng.gen_range(out.len() - 3);
    out[idx..idx + 4].copy_from_slice(&chunk);
    out
}

pub fn splice(a: &[u8], b: &[u8], rng: &mut Rng) -> Vec<u8> {
    if a.is_empty() || b.is_empty() {
        return if a.is_empty() { b.to_vec() } else { a.to_vec() };
    }
    let cut_a = rng.gen_range(a.len() + 1);
    let cut_b = rng.gen_range(b.len() + 1);
    let mut out = a[..cut_a].to_vec();
    out.extend_from_slice(&b[cut_b..]);
    out
}

/// Apply exactly one of the four equal-weight single-parent mutation
/// operators. `splice` is intentionally excluded — it needs a second
/// parent, so the search loop calls it directly instead of through
/// `mutate`, the same split as the original `mutate()` dispatcher in
/// `mutation_strategies.py`.
pub fn mutate(data: &[u8], rng: &mut Rng) -> Vec<u8> {
    match rng.gen_range(4) {
        0 => bit_flip(data, rng),
        1 => byte_flip(data, rng),
        2 => arithmetic(data, rng),
        _ => interesting_values(data, rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_mutations_are_total_on_empty_input() {
        let mut rng = Rng::from_seed(1);
        assert!(bit_flip(&[], &mut rng).is_empty());
        assert!(byte_flip(&[], &mut rng).is_empty());
        assert!(arithmetic(&[], &mut rng).is_empty());
        assert!(interesting_values(&[], &mut rng).is_empty());
    }

    #[test]
    fn interesting_values_pads_short_input() {
        let mut rng = Rng::from_seed(2);
        let out = interesting_values(&[1, 2], &mut rng);
        assert_eq!(out.len(), 6);
        assert_eq!(&out[0..2], &[1, 2]);
    }

    #[test]
    fn bit_flip_changes_exactly_one_bit() {
        let mut rng = Rng::from_seed(3);
        let data = vec![0u8; 8];
        let out = bit_flip(&data, &mut rng);
        let diff_bits: u32 = data
            .iter()
            .zip(out.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        assert_eq!(diff_bits, 1);
    }

    #[test]
    fn splice_combines_prefix_and_suffix() {
        let mut rng = Rng::from_seed(4);
        let out = splice(b"hello", b"world", &mut rng);
        assert!(!out.is_empty());
    }

    #[test]
    fn mutate_preserves_length_or_grows_by_padding() {
        let mut rng = Rng::from_seed(5);
        let data = b"abcdefgh".to_vec();
        for _ in 0..20 {
            let out = mutate(&data, &mut rng);
            assert!(out.len() >= data.len());
        }
    }
}
