//! Small combinatorial helpers shared by the basis layout and its tests.

/// Binomial coefficient C(n, k) in wide integer arithmetic.
///
/// Uses the multiplicative form, dividing at each step so intermediates stay
/// exact. Panics on overflow of `u128`, which is far beyond any basis size a
/// solve could allocate.
pub fn binomial(n: u64, k: u64) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * (n - i) as u128 / (i + 1) as u128;
    }
    acc
}

/// All non-negative integer vectors of length `dims` with entry sum at most
/// `max_total`, in no particular order.
pub fn bounded_vectors(dims: usize, max_total: u32) -> Vec<Vec<u32>> {
    let mut out = Vec::new();
    let mut current = vec![0u32; dims];
    fill(&mut out, &mut current, 0, max_total);
    out
}

fn fill(out: &mut Vec<Vec<u32>>, current: &mut Vec<u32>, dim: usize, budget: u32) {
    if dim == current.len() {
        out.push(current.clone());
        return;
    }
    for v in 0..=budget {
        current[dim] = v;
        fill(out, current, dim + 1, budget - v);
    }
    current[dim] = 0;
}
