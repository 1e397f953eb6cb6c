//! Newton-Raphson iteration for nonlinear components.

use log::{trace, warn};

use crate::circuit::Net;
use crate::components::Device;
use crate::error::{Result, SimError};

use super::dense::DenseLu;
use super::mna::MnaSystem;
use super::netlist::StepOutcome;
use super::{MAX_ITERATIONS, VOLTAGE_TOLERANCE};

/// Newton-Raphson solver for nonlinear circuits.
#[derive(Debug, Clone)]
pub struct NewtonRaphson {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Convergence tolerance
    pub tolerance: f64,
    /// Previous iterate, for the residual
    x_prev: Vec<f64>,
}

impl Default for NewtonRaphson {
    fn default() -> Self {
        Self::new()
    }
}

impl NewtonRaphson {
    /// Create a new Newton-Raphson solver.
    pub fn new() -> Self {
        Self::with_config(MAX_ITERATIONS, VOLTAGE_TOLERANCE)
    }

    /// Create a new Newton-Raphson solver with custom settings.
    pub fn with_config(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            tolerance,
            x_prev: Vec::new(),
        }
    }

    /// Iterate until every device accepts the solution.
    ///
    /// Returns the number of iterations used and how the loop ended. A
    /// singular pivot or a non-finite solution ends the loop early; in that
    /// case the system is left holding the last good iterate. Only a
    /// mismatch between `system` and `lu` is an error.
    pub fn solve(
        &mut self,
        devices: &mut [Device],
        system: &mut MnaSystem,
        lu: &mut DenseLu,
    ) -> Result<(usize, StepOutcome)> {
        let n = system.size();
        self.x_prev.clear();
        self.x_prev.extend((0..n).map(|k| system.solution(Net(k))));

        let mut residual = f64::INFINITY;
        for iter in 1..=self.max_iterations {
            system.refresh();
            lu.load(system)?;

            match lu.factor() {
                Ok(()) => {}
                Err(SimError::SingularMatrix { net }) => {
                    warn!("singular matrix at net {} in iteration {}", net, iter);
                    system.store_solution(&self.x_prev);
                    return Ok((iter, StepOutcome::Singular { net }));
                }
                Err(SimError::NumericalOverflow { net }) => {
                    warn!("non-finite pivot at net {} in iteration {}", net, iter);
                    system.store_solution(&self.x_prev);
                    return Ok((iter, StepOutcome::NonFinite { net }));
                }
                Err(e) => return Err(e),
            }

            let x = lu.solve();
            if let Some(net) = x.iter().position(|v| !v.is_finite()) {
                warn!("non-finite solution at net {} in iteration {}", net, iter);
                system.store_solution(&self.x_prev);
                return Ok((iter, StepOutcome::NonFinite { net }));
            }

            residual = x
                .iter()
                .zip(&self.x_prev)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f64, f64::max);
            self.x_prev.copy_from_slice(x);
            system.store_solution(x);

            // every device must get the chance to relinearize
            let mut done = true;
            for device in devices.iter_mut() {
                done &= device.newton(system, self.tolerance);
            }

            trace!("newton iteration {}: residual {:.3e}, done {}", iter, residual, done);

            if done {
                return Ok((iter, StepOutcome::Converged));
            }
        }

        warn!(
            "newton did not converge after {} iterations (residual {:.3e})",
            self.max_iterations, residual
        );
        Ok((
            self.max_iterations,
            StepOutcome::NotConverged {
                iterations: self.max_iterations,
                residual,
            },
        ))
    }
}
