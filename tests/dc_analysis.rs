//! Integration tests for the DC operating point.

use approx::assert_relative_eq;
use mnasim::circuit::{validate_circuit, Net};
use mnasim::components::{Device, Diode, Resistor, VoltageSource};
use mnasim::{Circuit, Netlist, SimError, StepOutcome};

fn solved(src: &str) -> Circuit {
    let mut circuit = Circuit::from_source(src).unwrap();
    validate_circuit(&circuit).unwrap();
    circuit.netlist.finalize().unwrap();
    let report = circuit.netlist.step().unwrap();
    assert!(report.is_converged(), "DC did not converge: {:?}", report.outcome);
    circuit
}

fn voltage(circuit: &Circuit, node: &str) -> f64 {
    let net = circuit.find_node(node).unwrap();
    circuit.netlist.solution(net).unwrap()
}

/// Test a simple voltage divider:
///
/// ```text
///   V1 = 12V -> n1 -> R1 = 200k -> n2 -> R2 = 100k -> GND
/// ```
///
/// Expected: V(n2) = 4V exactly, in a single iteration.
#[test]
fn test_voltage_divider() {
    let mut netlist = Netlist::new(3);
    netlist.add(VoltageSource::new(12.0, Net(1), Net::GROUND).unwrap()).unwrap();
    netlist.add(Resistor::new(200e3, Net(1), Net(2)).unwrap()).unwrap();
    netlist.add(Resistor::new(100e3, Net(2), Net::GROUND).unwrap()).unwrap();
    netlist.finalize().unwrap();

    let report = netlist.step().unwrap();
    assert_eq!(report.outcome, StepOutcome::Converged);
    assert_eq!(report.iterations, 1);
    assert_relative_eq!(netlist.solution(Net(1)).unwrap(), 12.0, epsilon = 1e-12);
    assert_relative_eq!(netlist.solution(Net(2)).unwrap(), 4.0, epsilon = 1e-12);
    assert_eq!(netlist.solution(Net::GROUND).unwrap(), 0.0);
}

#[test]
fn test_probe_reads_differential_voltage() {
    let c = solved("V1 a 0 9\nR1 a b 1k\nR2 b 0 2k\nP1 a b");
    let names = c.netlist.net_names().unwrap();
    let probe = names.iter().position(|n| n == "v:probe").unwrap();
    assert_relative_eq!(c.netlist.solution(Net(probe)).unwrap(), 3.0, epsilon = 1e-9);
    // the probe draws no current
    assert_relative_eq!(voltage(&c, "b"), 6.0, epsilon = 1e-9);
}

#[test]
fn test_diode_obeys_junction_law() {
    let c = solved("V1 a 0 1\nR1 a b 1k\nD1 b 0");
    let Some(Device::Diode(d)) = c.netlist.device(c.device_id("D1").unwrap()) else {
        panic!("D1 is not a diode");
    };
    let vb = voltage(&c, "b");
    let vj = c.netlist.solution(d.junction_net()).unwrap();
    let i = c.netlist.solution(d.current_net()).unwrap();

    assert!(vb > 0.4 && vb < 0.8, "forward drop {}", vb);
    assert_relative_eq!(i, (1.0 - vb) / 1e3, max_relative = 1e-9);
    assert_relative_eq!(vj + d.params.rs * i, vb, epsilon = 1e-9);
    assert_relative_eq!(i, d.junction().current(vj), max_relative = 1e-3);
}

#[test]
fn test_reverse_diode_blocks() {
    let c = solved("V1 a 0 5\nR1 a b 1k\nD1 0 b");
    assert_relative_eq!(voltage(&c, "b"), 5.0, epsilon = 1e-4);
}

#[test]
fn test_npn_common_emitter_bias() {
    let c = solved(
        "V1 vcc 0 10\n\
         RB vcc b 1meg\n\
         RC vcc c 1k\n\
         Q1 b c 0",
    );
    let Some(Device::Bjt(q)) = c.netlist.device(c.device_id("Q1").unwrap()) else {
        panic!("Q1 is not a bjt");
    };
    let system = c.netlist.system().unwrap();
    let ib = q.base_current(system);
    let ic = q.collector_current(system);

    let vb = voltage(&c, "b");
    let vc = voltage(&c, "c");
    assert!(vb > 0.6 && vb < 1.0, "vbe {}", vb);
    assert_relative_eq!(ib, (10.0 - vb) / 1e6, max_relative = 1e-6);
    assert_relative_eq!(ic, (10.0 - vc) / 1e3, max_relative = 1e-6);
    // forward active: collector current is bf times base current
    assert_relative_eq!(ic / ib, q.params.bf, max_relative = 1e-4);
    assert!(vc > vb, "transistor saturated: vc = {}", vc);
}

#[test]
fn test_pnp_high_side_bias() {
    let c = solved(
        ".model QP PNP (bf=100)\n\
         V1 vcc 0 10\n\
         RB b 0 1meg\n\
         RC c 0 1k\n\
         Q1 b c vcc QP",
    );
    let Some(Device::Bjt(q)) = c.netlist.device(c.device_id("Q1").unwrap()) else {
        panic!("Q1 is not a bjt");
    };
    let system = c.netlist.system().unwrap();
    let ib = q.base_current(system);
    let ic = q.collector_current(system);

    let vb = voltage(&c, "b");
    let vc = voltage(&c, "c");
    // current flows out of base and collector
    assert!(ib < 0.0 && ic < 0.0);
    assert_relative_eq!(-ib, vb / 1e6, max_relative = 1e-6);
    assert_relative_eq!(-ic, vc / 1e3, max_relative = 1e-6);
    assert_relative_eq!(ic / ib, 100.0, max_relative = 1e-4);
    assert!(10.0 - vb > 0.6 && 10.0 - vb < 1.0, "veb {}", 10.0 - vb);
}

/// Re-solving a converged operating point reproduces it exactly, and the
/// junctions accept their linearization on the first iteration.
#[test]
fn test_repeated_dc_solve_is_identical() {
    let mut c = Circuit::from_source(
        "V1 vcc 0 5\n\
         R1 vcc a 1k\n\
         D1 a 0\n\
         C1 a 0 1u\n\
         RB vcc b 470k\n\
         RC vcc c 2k\n\
         Q1 b c 0",
    )
    .unwrap();
    validate_circuit(&c).unwrap();
    c.netlist.finalize().unwrap();

    let first = c.netlist.step().unwrap().into_result().unwrap();
    assert!(first.iterations > 1);
    let second = c.netlist.step().unwrap().into_result().unwrap();
    let third = c.netlist.step().unwrap().into_result().unwrap();

    assert_eq!(second.iterations, 1);
    assert_eq!(third.iterations, 1);
    assert_eq!(first.values, second.values);
    assert_eq!(second.values, third.values);
    assert_eq!(third.time, 0.0);
}

#[test]
fn test_zero_resistance_rejected() {
    assert!(matches!(
        Resistor::new(0.0, Net(1), Net::GROUND),
        Err(SimError::InvalidParameter { .. })
    ));
    assert!(matches!(
        Circuit::from_source("V1 a 0 1\nR1 a 0 0"),
        Err(SimError::InvalidComponent { .. })
    ));
}

#[test]
fn test_topology_errors() {
    let floating = Circuit::from_source("V1 a 0 1\nR1 a 0 1k\nR2 x y 1k").unwrap();
    assert!(matches!(validate_circuit(&floating), Err(SimError::FloatingNode { .. })));

    let shorted = Circuit::from_source("V1 a a 1\nR1 a 0 1k").unwrap();
    assert!(matches!(validate_circuit(&shorted), Err(SimError::InvalidTopology { .. })));

    let mut netlist = Netlist::new(2);
    assert!(matches!(
        netlist.add(Diode::new(Net(1), Net(2))),
        Err(SimError::NodeOutOfRange { net: 2, .. })
    ));
}

#[test]
fn test_capacitor_only_node_is_singular_in_dc() {
    let mut c = Circuit::from_source("F1 a 0 SIN(0 1 1k)\nC1 a b 1u\nC2 b 0 2u").unwrap();
    validate_circuit(&c).unwrap();
    c.netlist.finalize().unwrap();
    let report = c.netlist.step().unwrap();
    assert!(matches!(report.outcome, StepOutcome::Singular { .. }));
    assert_eq!(report.time, 0.0);
    assert_eq!(report.lu_density, 0.0);
    assert!(matches!(report.into_result(), Err(SimError::SingularMatrix { .. })));
}
