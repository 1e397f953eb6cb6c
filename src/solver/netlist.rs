//! Netlist orchestration: device ownership, sizing and time stepping.

use log::{debug, info};

use crate::circuit::{DeviceId, Net, NetInfo};
use crate::components::Device;
use crate::error::{Result, SimError};

use super::dense::DenseLu;
use super::mna::MnaSystem;
use super::newton::NewtonRaphson;
use super::{MAX_ITERATIONS, VOLTAGE_TOLERANCE};

/// Configuration for the solver.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Maximum Newton-Raphson iterations per step.
    pub max_iterations: usize,
    /// Convergence tolerance for Newton-Raphson (volts).
    pub tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            tolerance: VOLTAGE_TOLERANCE,
        }
    }
}

impl SolverConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum Newton-Raphson iterations (at least one).
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Set the convergence tolerance (in volts).
    ///
    /// A junction whose solved voltage moves less than this from its last
    /// linearization point is considered settled.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Check the settings. A tolerance that is not positive and finite
    /// could never be met.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(SimError::invalid_parameter(
                "solver",
                "tolerance",
                format!("must be positive and finite, got {}", self.tolerance),
            ));
        }
        Ok(())
    }
}

/// How a step's Newton loop ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// Every device accepted the solution.
    Converged,
    /// The iteration cap was reached.
    NotConverged { iterations: usize, residual: f64 },
    /// Zero pivot while factoring the given net's column.
    Singular { net: usize },
    /// A pivot or solved value at the given net was not finite.
    NonFinite { net: usize },
}

impl StepOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, StepOutcome::Converged)
    }
}

/// Result of one simulated step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Simulation time after the step; unchanged if it did not converge.
    pub time: f64,
    /// Newton iterations used.
    pub iterations: usize,
    pub outcome: StepOutcome,
    /// Display value of every net, ground included.
    pub values: Vec<f64>,
    /// Fill density of the factored matrix, in percent; 0 for a singular
    /// or non-finite step.
    pub lu_density: f64,
}

impl StepReport {
    pub fn is_converged(&self) -> bool {
        self.outcome.is_converged()
    }

    /// Display value of a net.
    pub fn value(&self, net: Net) -> Option<f64> {
        self.values.get(net.0).copied()
    }

    /// Turn a failed outcome into the matching error.
    pub fn into_result(self) -> Result<Self> {
        match self.outcome {
            StepOutcome::Converged => Ok(self),
            StepOutcome::NotConverged { iterations, residual } => {
                Err(SimError::convergence_failure(iterations, residual))
            }
            StepOutcome::Singular { net } => Err(SimError::SingularMatrix { net }),
            StepOutcome::NonFinite { net } => Err(SimError::NumericalOverflow { net }),
        }
    }
}

/// State that exists only once the netlist is finalized.
#[derive(Debug, Clone)]
struct Engine {
    system: MnaSystem,
    lu: DenseLu,
    newton: NewtonRaphson,
    /// Current step size, 0 for DC
    step: f64,
}

/// A circuit under simulation.
///
/// Built in two phases: devices are added while the netlist is open, then
/// [`finalize`](Netlist::finalize) sizes and stamps the system exactly once.
/// After that the topology is frozen and only [`set_time_step`] and
/// [`step`] may be used.
///
/// [`set_time_step`]: Netlist::set_time_step
/// [`step`]: Netlist::step
#[derive(Debug, Clone)]
pub struct Netlist {
    node_count: usize,
    /// Running net counter: nodes plus internal nets claimed so far
    net_count: usize,
    devices: Vec<Device>,
    config: SolverConfig,
    engine: Option<Engine>,
}

impl Netlist {
    /// Create a netlist over `node_count` circuit nodes, ground included.
    pub fn new(node_count: usize) -> Self {
        Self::with_config(node_count, SolverConfig::default())
    }

    /// Create a netlist with custom solver settings.
    pub fn with_config(node_count: usize, config: SolverConfig) -> Self {
        let node_count = node_count.max(1);
        Self {
            node_count,
            net_count: node_count,
            devices: Vec::new(),
            config,
            engine: None,
        }
    }

    /// Number of circuit nodes, ground included.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Total unknowns: nodes plus every device's internal nets.
    pub fn net_count(&self) -> usize {
        self.net_count
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn is_finalized(&self) -> bool {
        self.engine.is_some()
    }

    /// Add a device, claiming its internal nets.
    pub fn add(&mut self, device: impl Into<Device>) -> Result<DeviceId> {
        if self.is_finalized() {
            return Err(SimError::AlreadyFinalized);
        }
        self.config.validate()?;
        let mut device = device.into();
        if let Some(bad) = device.pins().iter().find(|p| p.0 >= self.node_count) {
            return Err(SimError::NodeOutOfRange {
                net: bad.0,
                node_count: self.node_count,
            });
        }
        device.setup_nets(&mut self.net_count);
        self.devices.push(device);
        Ok(DeviceId(self.devices.len() - 1))
    }

    /// All devices, in the order they were added.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Look up a device.
    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(id.0)
    }

    /// Size the system and stamp every device. Allowed exactly once, and
    /// only with a valid [`SolverConfig`].
    pub fn finalize(&mut self) -> Result<()> {
        if self.is_finalized() {
            return Err(SimError::AlreadyFinalized);
        }

        let mut system = MnaSystem::new(self.net_count);
        for device in self.devices.iter_mut() {
            device.stamp(&mut system);
        }
        let density = system.set_step_scale(0.0);
        debug!(
            "finalized netlist: {} nodes, {} nets, {} devices, density {:.1}%",
            self.node_count,
            self.net_count,
            self.devices.len(),
            density
        );

        self.engine = Some(Engine {
            lu: DenseLu::new(self.net_count),
            newton: NewtonRaphson::with_config(self.config.max_iterations, self.config.tolerance),
            system,
            step: 0.0,
        });
        Ok(())
    }

    fn engine(&self) -> Result<&Engine> {
        self.engine.as_ref().ok_or(SimError::NotFinalized)
    }

    /// Switch to, or change, fixed-step transient analysis.
    ///
    /// Reactive devices rescale their stored state so a running simulation
    /// continues with the new step.
    pub fn set_time_step(&mut self, step: f64) -> Result<()> {
        if !(step.is_finite() && step > 0.0) {
            return Err(SimError::InvalidTimeStep { step });
        }
        let engine = self.engine.as_mut().ok_or(SimError::NotFinalized)?;

        let new_per_old = if engine.step > 0.0 { step / engine.step } else { 0.0 };
        for device in self.devices.iter_mut() {
            device.scale_time(new_per_old, &mut engine.system);
        }
        engine.step = step;
        let density = engine.system.set_step_scale(1.0 / step);
        info!("time step {:e} s, density {:.1}%", step, density);
        Ok(())
    }

    /// Current step size; 0 before [`set_time_step`](Netlist::set_time_step)
    /// (DC analysis).
    pub fn time_step(&self) -> f64 {
        self.engine.as_ref().map_or(0.0, |e| e.step)
    }

    /// Simulation time of the last converged step.
    pub fn time(&self) -> f64 {
        self.engine.as_ref().map_or(0.0, |e| e.system.time)
    }

    /// Advance one step.
    ///
    /// Numerical trouble is reported in [`StepReport::outcome`], not as an
    /// error. Time only advances, and reactive state only updates, when the
    /// step converged.
    pub fn step(&mut self) -> Result<StepReport> {
        let engine = self.engine.as_mut().ok_or(SimError::NotFinalized)?;
        let target = engine.system.time + engine.step;

        for device in self.devices.iter_mut() {
            device.prepare(target, &mut engine.system);
        }

        let (iterations, outcome) = engine
            .newton
            .solve(&mut self.devices, &mut engine.system, &mut engine.lu)?;

        // the working matrix may be left half factored
        let lu_density = match outcome {
            StepOutcome::Singular { .. } | StepOutcome::NonFinite { .. } => 0.0,
            _ => engine.lu.fill_density(),
        };

        if outcome.is_converged() {
            for device in self.devices.iter_mut() {
                device.update(&mut engine.system);
            }
            engine.system.time = target;
        }

        Ok(StepReport {
            time: engine.system.time,
            iterations,
            outcome,
            values: engine.system.display_values(),
            lu_density,
        })
    }

    /// Raw solved value of a net from the last step.
    pub fn solution(&self, net: Net) -> Result<f64> {
        let engine = self.engine()?;
        if net.0 >= self.net_count {
            return Err(SimError::NodeOutOfRange {
                net: net.0,
                node_count: self.net_count,
            });
        }
        Ok(engine.system.solution(net))
    }

    /// The assembled system.
    pub fn system(&self) -> Result<&MnaSystem> {
        Ok(&self.engine()?.system)
    }

    /// Display metadata of every net.
    pub fn net_info(&self) -> Result<&[NetInfo]> {
        Ok(self.engine()?.system.nets())
    }

    /// Display names of every net.
    pub fn net_names(&self) -> Result<Vec<String>> {
        Ok(self.net_info()?.iter().map(|i| i.name.clone()).collect())
    }

    /// Labelled matrix dump, for debugging.
    pub fn dump_matrix(&self) -> Result<String> {
        Ok(self.engine()?.system.dump())
    }
}
