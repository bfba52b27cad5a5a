use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// Hash an author-given name into a stable 64-bit identifier.
///
/// `FxHasher` is unseeded, so the same name maps to the same id across runs
/// and across reloads.
#[must_use]
pub fn hash_name(name: &str) -> u64 {
    let mut hasher = FxHasher::default();
    name.hash(&mut hasher);
    hasher.finish()
}

/// Content hash of any hashable description, used to memoize GPU state
/// objects.
#[must_use]
pub fn content_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Hash a single `f32` by its bit pattern.
pub fn hash_f32(v: f32, hasher: &mut impl Hasher) {
    v.to_bits().hash(hasher);
}

/// Hash a slice of `f32` values by bit pattern, length-prefixed.
pub fn hash_f32_slice(values: &[f32], hasher: &mut impl Hasher) {
    values.len().hash(hasher);
    for v in values {
        hash_f32(*v, hasher);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_hash_is_stable_and_distinct() {
        assert_eq!(hash_name("main_colour"), hash_name("main_colour"));
        assert_ne!(hash_name("main_colour"), hash_name("main_depth"));
    }

    #[test]
    fn float_hash_distinguishes_bit_patterns() {
        let a = {
            let mut h = FxHasher::default();
            hash_f32_slice(&[0.0, 1.0], &mut h);
            h.finish()
        };
        let b = {
            let mut h = FxHasher::default();
            hash_f32_slice(&[0.0, 1.5], &mut h);
            h.finish()
        };
        assert_ne!(a, b);
    }
}
