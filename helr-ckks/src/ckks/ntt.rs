//! Number Theoretic Transform for O(N log N) negacyclic multiplication.
//!
//! Each prime q satisfies q ≡ 1 (mod 2N) so that a primitive 2N-th root of
//! unity ψ exists in Z_q. Forward transform twists by powers of ψ and runs a
//! cyclic Cooley-Tukey NTT, which evaluates the polynomial at the odd powers
//! of ψ, i.e. in Z_q[X]/(X^N + 1).

/// Modular exponentiation with i128 intermediates.
pub fn mod_pow(base: i64, mut exp: u64, modulus: i64) -> i64 {
    let m = modulus as i128;
    let mut result: i128 = 1;
    let mut b = (base as i128).rem_euclid(m);
    while exp > 0 {
        if exp & 1 == 1 {
            result = result * b % m;
        }
        exp >>= 1;
        b = b * b % m;
    }
    result as i64
}

/// Modular inverse by Fermat's little theorem (`p` prime, `a` nonzero mod p).
pub fn mod_inv(a: i64, p: i64) -> i64 {
    mod_pow(a, (p - 2) as u64, p)
}

/// `a * b mod q` for operands already reduced into [0, q).
#[inline]
pub fn mul_mod(a: i64, b: i64, q: i64) -> i64 {
    (a as i128 * b as i128 % q as i128) as i64
}

/// Deterministic Miller-Rabin for all 64-bit inputs.
pub fn is_prime(n: i64) -> bool {
    if n < 2 {
        return false;
    }
    const WITNESSES: [i64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
    for &p in &WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }
    let mut d = (n - 1) as u64;
    let mut r = 0;
    while d % 2 == 0 {
        d /= 2;
        r += 1;
    }
    'witness: for &a in &WITNESSES {
        let mut x = mod_pow(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..r {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Find `count` NTT-friendly primes below `2^bits` for ring dimension `n`,
/// largest first, skipping anything in `exclude`.
pub fn find_ntt_primes(bits: u32, count: usize, n: usize, exclude: &[i64]) -> Vec<i64> {
    let two_n = (2 * n) as i64;
    let mut k = ((1i64 << bits) - 1) / two_n;
    let mut primes = Vec::with_capacity(count);
    while primes.len() < count && k > 0 {
        let candidate = two_n * k + 1;
        if is_prime(candidate) && !exclude.contains(&candidate) {
            primes.push(candidate);
        }
        k -= 1;
    }
    primes
}

/// Find a primitive 2N-th root of unity modulo `q`.
pub fn find_primitive_root(q: i64, n: usize) -> Option<i64> {
    let exp = ((q - 1) as u64) / (2 * n as u64);
    (2..q.min(10_000))
        .map(|g| mod_pow(g, exp, q))
        .find(|&psi| mod_pow(psi, n as u64, q) == q - 1)
}

/// Precomputed tables for one prime.
#[derive(Clone, Debug)]
pub struct NttContext {
    pub q: i64,
    pub n: usize,
    n_inv: i64,
    psi_powers: Vec<i64>,
    psi_inv_powers: Vec<i64>,
    /// Per-stage roots of unity ψ^(2N/len), forward and inverse.
    stage_roots: Vec<(i64, i64)>,
}

impl NttContext {
    pub fn new(q: i64, n: usize) -> Option<Self> {
        let psi = find_primitive_root(q, n)?;
        let psi_inv = mod_inv(psi, q);
        let mut stage_roots = Vec::new();
        let mut len = 2;
        while len <= n {
            let e = (2 * n / len) as u64;
            stage_roots.push((mod_pow(psi, e, q), mod_pow(psi_inv, e, q)));
            len <<= 1;
        }
        Some(Self {
            q,
            n,
            n_inv: mod_inv(n as i64, q),
            psi_powers: powers(psi, q, n),
            psi_inv_powers: powers(psi_inv, q, n),
            stage_roots,
        })
    }

    /// Coefficient → evaluation domain. Input values must lie in [0, q).
    pub fn forward(&self, a: &[i64]) -> Vec<i64> {
        debug_assert_eq!(a.len(), self.n);
        let mut data: Vec<i64> = a
            .iter()
            .zip(&self.psi_powers)
            .map(|(&c, &p)| mul_mod(c, p, self.q))
            .collect();
        self.butterflies(&mut data, false);
        data
    }

    /// Evaluation → coefficient domain, output in [0, q).
    pub fn inverse(&self, a: &[i64]) -> Vec<i64> {
        debug_assert_eq!(a.len(), self.n);
        let mut data = a.to_vec();
        self.butterflies(&mut data, true);
        for (v, &p) in data.iter_mut().zip(&self.psi_inv_powers) {
            *v = mul_mod(mul_mod(*v, self.n_inv, self.q), p, self.q);
        }
        data
    }

    /// Negacyclic product of two coefficient vectors.
    #[cfg(test)]
    pub fn mul(&self, a: &[i64], b: &[i64]) -> Vec<i64> {
        let fa = self.forward(a);
        let fb = self.forward(b);
        let prod: Vec<i64> = fa
            .iter()
            .zip(&fb)
            .map(|(&x, &y)| mul_mod(x, y, self.q))
            .collect();
        self.inverse(&prod)
    }

    fn butterflies(&self, data: &mut [i64], inverse: bool) {
        let n = self.n;
        let q = self.q;
        bit_reverse_permutation(data);
        let mut len = 2;
        for &(w_fwd, w_inv) in &self.stage_roots {
            let w = if inverse { w_inv } else { w_fwd };
            let half = len / 2;
            let mut start = 0;
            while start < n {
                let mut wk = 1i64;
                for k in 0..half {
                    let u = data[start + k];
                    let v = mul_mod(data[start + k + half], wk, q);
                    data[start + k] = if u + v >= q { u + v - q } else { u + v };
                    data[start + k + half] = if u >= v { u - v } else { u - v + q };
                    wk = mul_mod(wk, w, q);
                }
                start += len;
            }
            len <<= 1;
        }
    }
}

fn powers(root: i64, q: i64, n: usize) -> Vec<i64> {
    let mut out = Vec::with_capacity(n);
    let mut acc = 1i64;
    for _ in 0..n {
        out.push(acc);
        acc = mul_mod(acc, root, q);
    }
    out
}

fn bit_reverse_permutation(data: &mut [i64]) {
    let n = data.len();
    let bits = n.trailing_zeros();
    if bits == 0 {
        return;
    }
    for i in 0..n {
        let j = i.reverse_bits() >> (usize::BITS - bits);
        if i < j {
            data.swap(i, j);
        }
    }
}
