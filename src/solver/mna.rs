//! MNA system assembly.
//!
//! The system is stamped exactly once. Each cell keeps its static and
//! time-scaled contributions apart, plus a list of handles into the live
//! value table for terms that change every Newton iteration. Refreshing a
//! cell is then just `pre + sum(live)`, with no re-stamping.

use std::fmt::Write as _;

use crate::circuit::{Net, NetInfo, NetKind};

/// Handle to a live scalar owned by the [`MnaSystem`].
///
/// Devices allocate one per nonlinear or state-dependent term and write
/// through it; every cell that depends on the term holds a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LiveId(usize);

/// A single entry of the system matrix or right-hand side.
#[derive(Debug, Clone, Default)]
pub struct MnaCell {
    /// Static contribution (e.g. resistor conductance)
    pub g: f64,
    /// Contribution scaled by 1/dt (e.g. capacitor conductance)
    pub g_timed: f64,
    /// Live values added in before every solve
    pub dynamic: Vec<LiveId>,
    /// Cached `g + g_timed / dt`
    pre: f64,
    /// Working value; after a solve the right-hand side cells hold the solution
    pub value: f64,
    /// Text version of the stamps, for the matrix dump
    pub label: String,
}

impl MnaCell {
    fn init(&mut self, step_scale: f64) {
        self.pre = self.g + self.g_timed * step_scale;
    }

    fn refresh(&mut self, live: &[f64]) {
        self.value = self.pre + self.dynamic.iter().map(|id| live[id.0]).sum::<f64>();
    }

    /// Whether anything was ever stamped here.
    pub fn is_structural(&self) -> bool {
        self.pre != 0.0 || !self.dynamic.is_empty()
    }
}

/// Stores A and b for `A * x - b = 0`, where x is the solution.
#[derive(Debug, Clone)]
pub struct MnaSystem {
    size: usize,
    /// Row-major matrix cells
    a: Vec<MnaCell>,
    b: Vec<MnaCell>,
    nets: Vec<NetInfo>,
    /// Display values that replace the solution, e.g. a capacitor's charge
    shown: Vec<Option<f64>>,
    live: Vec<f64>,
    step_scale: f64,
    /// Current simulation time in seconds
    pub time: f64,
}

impl MnaSystem {
    /// Create a zeroed system over `size` nets (ground included).
    pub fn new(size: usize) -> Self {
        Self {
            size,
            a: vec![MnaCell::default(); size * size],
            b: vec![MnaCell::default(); size],
            nets: (0..size).map(NetInfo::voltage).collect(),
            shown: vec![None; size],
            live: Vec::new(),
            step_scale: 0.0,
            time: 0.0,
        }
    }

    /// Number of nets, ground included.
    pub fn size(&self) -> usize {
        self.size
    }

    fn idx(&self, row: Net, col: Net) -> usize {
        debug_assert!(row.0 < self.size && col.0 < self.size);
        row.0 * self.size + col.0
    }

    /// Matrix cell at (row, col).
    pub fn cell(&self, row: Net, col: Net) -> &MnaCell {
        &self.a[self.idx(row, col)]
    }

    /// Right-hand side cell for a row.
    pub fn rhs(&self, row: Net) -> &MnaCell {
        &self.b[row.0]
    }

    /// Add a static value to A[row, col].
    pub fn stamp_static(&mut self, g: f64, row: Net, col: Net, label: &str) {
        let i = self.idx(row, col);
        self.a[i].g += g;
        self.a[i].label.push_str(label);
    }

    /// Add a value scaled by 1/dt to A[row, col].
    pub fn stamp_timed(&mut self, g: f64, row: Net, col: Net, label: &str) {
        let i = self.idx(row, col);
        self.a[i].g_timed += g;
        self.a[i].label.push_str(label);
    }

    /// Add a static value to b[row].
    pub fn stamp_rhs(&mut self, value: f64, row: Net, label: &str) {
        let cell = &mut self.b[row.0];
        cell.g += value;
        cell.label.push_str(label);
    }

    /// Allocate a live value, initialized to `value`.
    pub fn alloc_live(&mut self, value: f64) -> LiveId {
        self.live.push(value);
        LiveId(self.live.len() - 1)
    }

    /// Make A[row, col] include a live value.
    pub fn bind_live(&mut self, id: LiveId, row: Net, col: Net, label: &str) {
        let i = self.idx(row, col);
        self.a[i].dynamic.push(id);
        self.a[i].label.push_str(label);
    }

    /// Make b[row] include a live value.
    pub fn bind_live_rhs(&mut self, id: LiveId, row: Net, label: &str) {
        let cell = &mut self.b[row.0];
        cell.dynamic.push(id);
        cell.label.push_str(label);
    }

    /// Overwrite a live value; picked up by the next refresh.
    pub fn set_live(&mut self, id: LiveId, value: f64) {
        self.live[id.0] = value;
    }

    /// Read a live value.
    pub fn live(&self, id: LiveId) -> f64 {
        self.live[id.0]
    }

    /// Display metadata for a net.
    pub fn net_info(&self, net: Net) -> &NetInfo {
        &self.nets[net.0]
    }

    /// Rename a net and set its kind and display scale.
    pub fn describe_net(&mut self, net: Net, name: impl Into<String>, kind: NetKind, scale: f64) {
        self.nets[net.0] = NetInfo {
            kind,
            scale,
            name: name.into(),
        };
    }

    /// All net metadata, indexed by net.
    pub fn nets(&self) -> &[NetInfo] {
        &self.nets
    }

    /// Current reciprocal step size (0 for DC).
    pub fn step_scale(&self) -> f64 {
        self.step_scale
    }

    /// Recompute every cell's cached value for a new 1/dt and return the
    /// structural density of the non-ground block.
    pub fn set_step_scale(&mut self, step_scale: f64) -> f64 {
        self.step_scale = step_scale;
        for cell in self.a.iter_mut().chain(self.b.iter_mut()) {
            cell.init(step_scale);
        }
        let n = self.size;
        let fill = (1..n)
            .flat_map(|r| (1..n).map(move |c| (r, c)))
            .filter(|&(r, c)| self.a[r * n + c].is_structural())
            .count();
        density(fill, n)
    }

    /// Restore every cell from its cache and add the live values.
    pub fn refresh(&mut self) {
        let live = &self.live;
        for cell in self.a.iter_mut().chain(self.b.iter_mut()) {
            cell.refresh(live);
        }
    }

    /// Working matrix values, row-major.
    pub fn matrix_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.a.iter().map(|c| c.value)
    }

    /// Working right-hand side values.
    pub fn rhs_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.b.iter().map(|c| c.value)
    }

    /// Store a solution vector into the right-hand side cells. Ground is
    /// always written as zero.
    pub fn store_solution(&mut self, x: &[f64]) {
        debug_assert_eq!(x.len(), self.size);
        for (cell, &v) in self.b.iter_mut().zip(x) {
            cell.value = v;
        }
        if let Some(ground) = self.b.first_mut() {
            ground.value = 0.0;
        }
    }

    /// Solved value of a net.
    pub fn solution(&self, net: Net) -> f64 {
        self.b[net.0].value
    }

    /// Report `value` instead of the solved value of `net` in
    /// [`display_values`](MnaSystem::display_values). The solution itself
    /// is left untouched.
    pub fn set_display(&mut self, net: Net, value: f64) {
        self.shown[net.0] = Some(value);
    }

    /// Solved values with each net's display scale applied.
    pub fn display_values(&self) -> Vec<f64> {
        self.b
            .iter()
            .zip(&self.shown)
            .zip(&self.nets)
            .map(|((cell, shown), info)| shown.unwrap_or(cell.value) * info.scale)
            .collect()
    }

    /// Render the labelled matrix, one row per net.
    ///
    /// Unlabelled cells show `.` when zero and `#` otherwise.
    pub fn dump(&self) -> String {
        let n = self.size;
        let mut widths = vec![1usize; n];
        let name_width = self.nets.iter().map(|i| i.name.len()).max().unwrap_or(1);
        for r in 0..n {
            for (c, width) in widths.iter_mut().enumerate() {
                *width = (*width).max(self.a[r * n + c].label.len());
            }
        }

        let mut out = String::new();
        for r in 0..n {
            let _ = write!(out, "{:2}: | ", r);
            for (c, &width) in widths.iter().enumerate() {
                let cell = &self.a[r * n + c];
                let text = if !cell.label.is_empty() {
                    cell.label.as_str()
                } else if cell.value == 0.0 {
                    "."
                } else {
                    "#"
                };
                let _ = write!(out, " {:>width$} ", text, width = width);
            }
            let rhs = if !self.b[r].label.is_empty() {
                self.b[r].label.as_str()
            } else if r == 0 {
                "ground"
            } else {
                "0"
            };
            let _ = writeln!(
                out,
                " | {:<nw$} = {}",
                self.nets[r].name,
                rhs,
                nw = name_width
            );
        }
        out
    }
}

/// Percentage of filled cells in the (n-1)^2 non-ground block.
pub(crate) fn density(fill: usize, size: usize) -> f64 {
    if size < 2 {
        return 0.0;
    }
    let block = ((size - 1) * (size - 1)) as f64;
    100.0 * fill as f64 / block
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_contributions_accumulate() {
        let mut sys = MnaSystem::new(3);
        sys.stamp_static(1.0, Net(1), Net(1), "+a");
        sys.stamp_static(2.0, Net(1), Net(1), "+b");
        sys.stamp_timed(3.0, Net(1), Net(1), "+t");
        assert_relative_eq!(sys.cell(Net(1), Net(1)).g, 3.0);
        assert_relative_eq!(sys.cell(Net(1), Net(1)).g_timed, 3.0);
        assert_eq!(sys.cell(Net(1), Net(1)).label, "+a+b+t");
    }

    #[test]
    fn test_refresh_adds_live_values_to_cache() {
        let mut sys = MnaSystem::new(2);
        sys.stamp_static(1.0, Net(1), Net(1), "");
        sys.stamp_timed(2.0, Net(1), Net(1), "");
        let id = sys.alloc_live(0.5);
        sys.bind_live(id, Net(1), Net(1), "gm");
        sys.set_step_scale(10.0);
        sys.refresh();
        assert_relative_eq!(sys.cell(Net(1), Net(1)).value, 1.0 + 20.0 + 0.5);

        // a live update is seen without touching the structure
        sys.set_live(id, 4.0);
        sys.refresh();
        assert_relative_eq!(sys.cell(Net(1), Net(1)).value, 25.0);
        assert_relative_eq!(sys.cell(Net(1), Net(1)).pre, 21.0);
    }

    #[test]
    fn test_density_counts_live_cells() {
        let mut sys = MnaSystem::new(3);
        sys.stamp_static(1.0, Net(1), Net(1), "");
        let id = sys.alloc_live(0.0);
        sys.bind_live(id, Net(2), Net(2), "");
        // ground row/column does not count
        sys.stamp_static(1.0, Net(0), Net(0), "");
        let d = sys.set_step_scale(0.0);
        assert_relative_eq!(d, 50.0);
    }

    #[test]
    fn test_solution_and_display_scale() {
        let mut sys = MnaSystem::new(3);
        sys.describe_net(Net(2), "v:C", NetKind::Voltage, 0.5);
        sys.store_solution(&[9.0, 1.0, 4.0]);
        assert_eq!(sys.solution(Net::GROUND), 0.0);
        assert_eq!(sys.display_values(), vec![0.0, 1.0, 2.0]);

        // a display override leaves the solution alone
        sys.set_display(Net(2), 10.0);
        assert_eq!(sys.solution(Net(2)), 4.0);
        assert_eq!(sys.display_values(), vec![0.0, 1.0, 5.0]);
    }

    #[test]
    fn test_dump_marks_cells() {
        let mut sys = MnaSystem::new(2);
        sys.stamp_static(1.0, Net(1), Net(1), "+R1k");
        sys.stamp_rhs(5.0, Net(1), "+5V");
        let dump = sys.dump();
        assert!(dump.contains("+R1k"));
        assert!(dump.contains("ground"));
        assert!(dump.contains("= +5V"));
    }
}
