//! End-to-end tests: netlist text to simulation results.

use approx::assert_relative_eq;
use mnasim::circuit::validate_circuit;
use mnasim::dsl;
use mnasim::{Circuit, SimError};

const DIVIDER: &str = "\
# 12V into a 2:1 divider
.tran 1m 3
.options maxiter=20 vtol=1e-6

V1   top  0    12
R1   top  mid  200k
R2   mid  GND  100k
P1   mid  0
";

#[test]
fn test_divider_from_text() {
    let ast = dsl::parse(DIVIDER).unwrap();
    assert_eq!(ast.nodes, vec!["top".to_string(), "mid".to_string()]);

    let mut c = Circuit::from_ast(ast).unwrap();
    validate_circuit(&c).unwrap();
    assert_eq!(c.netlist.config().max_iterations, 20);

    c.netlist.finalize().unwrap();
    let dc = c.netlist.step().unwrap().into_result().unwrap();
    let mid = c.find_node("mid").unwrap();
    assert_relative_eq!(dc.value(mid).unwrap(), 4.0, epsilon = 1e-12);

    let names = c.netlist.net_names().unwrap();
    assert_eq!(&names[..3], &["v0", "v1", "v2"]);
    assert!(names.contains(&"i:V(+12):1,0".to_string()));
    assert!(names.contains(&"v:probe".to_string()));

    let tran = c.tran.unwrap();
    c.netlist.set_time_step(tran.step).unwrap();
    for _ in 0..tran.ticks {
        let report = c.netlist.step().unwrap().into_result().unwrap();
        assert_relative_eq!(report.value(mid).unwrap(), 4.0, epsilon = 1e-12);
    }
    assert_relative_eq!(c.netlist.time(), 3e-3, max_relative = 1e-12);
}

#[test]
fn test_models_from_text() {
    let src = "\
.model DSI D (is=1e-14 n=1 rs=0)
V1 a 0 1
R1 a b 1k
D1 b 0 DSI
";
    let mut c = Circuit::from_source(src).unwrap();
    c.netlist.finalize().unwrap();
    c.netlist.step().unwrap().into_result().unwrap();
    let vb = c.netlist.solution(c.find_node("b").unwrap()).unwrap();
    // ideal diode at about 0.4mA: 26mV * ln(4e-4 / 1e-14)
    assert!(vb > 0.55 && vb < 0.7, "vd = {}", vb);
}

#[test]
fn test_matrix_dump_is_labelled() {
    let mut c = Circuit::from_source("V1 a 0 5\nR1 a b 1k\nC1 b 0 1u").unwrap();
    c.netlist.finalize().unwrap();
    let dump = c.netlist.dump_matrix().unwrap();
    assert!(dump.contains("+R1k"));
    assert!(dump.contains("q:C:2,0"));
}

#[test]
fn test_text_errors_are_reported() {
    assert!(matches!(dsl::parse("R1 a 0 1k\nR1 b 0 1k"), Err(SimError::DuplicateComponent { .. })));
    assert!(matches!(dsl::parse("X1 a 0 1k"), Err(SimError::UnknownComponentType { .. })));
    assert!(matches!(
        Circuit::from_source("F1 a 0 SIN(1)\nR1 a 0 1k"),
        Err(SimError::InvalidComponent { .. })
    ));
    assert!(matches!(
        dsl::parse_file(std::path::Path::new("/nonexistent/circuit.cir")),
        Err(SimError::FileReadError { .. })
    ));
}

#[cfg(feature = "cli")]
#[test]
fn test_report_table() {
    use mnasim::report::TableWriter;

    let mut c = Circuit::from_source(DIVIDER).unwrap();
    c.netlist.finalize().unwrap();
    let mut table = TableWriter::new(Vec::new());
    table.write_header(&c.netlist.net_names().unwrap()).unwrap();
    table.write_row(&c.netlist.step().unwrap()).unwrap();

    let text = String::from_utf8(table.into_inner().unwrap()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("time\tv1\tv2\t"));
    let fields: Vec<f64> = lines[1].split('\t').map(|f| f.parse().unwrap()).collect();
    assert_eq!(fields.len(), c.netlist.net_count() - 1 + 3);
    assert_relative_eq!(fields[1], 12.0);
    assert_relative_eq!(fields[2], 4.0);
}
