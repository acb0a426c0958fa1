use rand::Rng;

/// In-place uniform permutation: for `i` from the last index down to 1, swap
/// element `i` with a uniformly chosen element at index `<= i`.
pub fn fisher_yates<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}
