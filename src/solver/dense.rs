//! Dense in-place LU factorization with partial pivoting.
//!
//! Row and column 0 belong to ground and are skipped: ground is fixed at
//! zero and never solved for. After [`DenseLu::factor`] the diagonal holds
//! reciprocal pivots and the strict lower triangle holds the elimination
//! multipliers.

use crate::error::{Result, SimError};

use super::mna::{density, MnaSystem};

/// First solved row/column; index 0 is ground.
const FIRST: usize = 1;

/// Working copy of an MNA system, factored and solved in place.
#[derive(Debug, Clone)]
pub struct DenseLu {
    n: usize,
    /// Row-major working matrix
    a: Vec<f64>,
    /// Right-hand side, becomes the solution
    b: Vec<f64>,
    factored: bool,
}

impl DenseLu {
    /// Create an n x n working system.
    pub fn new(n: usize) -> Self {
        Self {
            n,
            a: vec![0.0; n * n],
            b: vec![0.0; n],
            factored: false,
        }
    }

    /// Copy the working values of `system` in.
    pub fn load(&mut self, system: &MnaSystem) -> Result<()> {
        if system.size() != self.n {
            return Err(SimError::DimensionMismatch {
                expected: self.n,
                found: system.size(),
            });
        }
        for (dst, src) in self.a.iter_mut().zip(system.matrix_values()) {
            *dst = src;
        }
        for (dst, src) in self.b.iter_mut().zip(system.rhs_values()) {
            *dst = src;
        }
        self.factored = false;
        Ok(())
    }

    fn swap_rows(&mut self, p: usize, q: usize) {
        debug_assert!(p < q);
        let n = self.n;
        let (upper, lower) = self.a.split_at_mut(q * n);
        upper[p * n..(p + 1) * n].swap_with_slice(&mut lower[..n]);
        self.b.swap(p, q);
    }

    /// Gaussian elimination with partial pivoting.
    ///
    /// The right-hand side is permuted along with the rows. Fails with
    /// [`SimError::SingularMatrix`] on a zero pivot, or
    /// [`SimError::NumericalOverflow`] on a non-finite one; either way the
    /// matrix is left partially factored and must be reloaded.
    pub fn factor(&mut self) -> Result<()> {
        let n = self.n;
        for p in FIRST..n {
            let mut pr = p;
            for r in (p + 1)..n {
                if self.a[r * n + p].abs() > self.a[pr * n + p].abs() {
                    pr = r;
                }
            }
            if pr != p {
                self.swap_rows(p, pr);
            }

            let pivot = self.a[p * n + p];
            if pivot == 0.0 {
                return Err(SimError::SingularMatrix { net: p });
            }
            if !pivot.is_finite() {
                return Err(SimError::NumericalOverflow { net: p });
            }

            let d = 1.0 / pivot;
            self.a[p * n + p] = d;

            for r in (p + 1)..n {
                let m = self.a[r * n + p];
                if m == 0.0 {
                    continue;
                }
                let m = m * d;
                self.a[r * n + p] = m;
                for c in (p + 1)..n {
                    let u = self.a[p * n + c];
                    if u == 0.0 {
                        continue;
                    }
                    self.a[r * n + c] -= u * m;
                }
            }
        }
        self.factored = true;
        Ok(())
    }

    /// Forward elimination then back substitution on the right-hand side.
    /// Returns the solution, ground included as zero.
    pub fn solve(&mut self) -> &[f64] {
        debug_assert!(self.factored, "solve called before factor");
        let n = self.n;

        for p in FIRST..n {
            let bp = self.b[p];
            if bp == 0.0 {
                continue;
            }
            for r in (p + 1)..n {
                let m = self.a[r * n + p];
                if m != 0.0 {
                    self.b[r] -= bp * m;
                }
            }
        }

        for r in (FIRST..n).rev() {
            let mut acc = self.b[r];
            for s in (r + 1)..n {
                acc -= self.b[s] * self.a[r * n + s];
            }
            self.b[r] = acc * self.a[r * n + r];
        }

        if let Some(ground) = self.b.first_mut() {
            *ground = 0.0;
        }
        &self.b
    }

    /// Solution of the last solve.
    pub fn solution(&self) -> &[f64] {
        &self.b
    }

    /// Percentage of non-zero entries in the factored non-ground block.
    pub fn fill_density(&self) -> f64 {
        let n = self.n;
        let fill = (FIRST..n)
            .flat_map(|r| (FIRST..n).map(move |c| (r, c)))
            .filter(|&(r, c)| self.a[r * n + c] != 0.0)
            .count();
        density(fill, n)
    }
}
