//! Tabular output of simulation results (CLI only).
//!
//! Rows are tab-separated: simulation time, the display value of every net
//! (ground excluded), then the Newton iteration count and LU fill density.

use std::io::{self, BufWriter, Write};

use crate::error::{Result, SimError};
use crate::solver::StepReport;

fn output_error(e: io::Error) -> SimError {
    SimError::OutputError { source: e }
}

/// Buffered table writer for step reports.
pub struct TableWriter<W: Write> {
    out: BufWriter<W>,
}

impl TableWriter<io::Stdout> {
    /// Write the table to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TableWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
        }
    }

    /// Write the header line from the netlist's net names.
    ///
    /// `names[0]` is ground and is skipped.
    pub fn write_header(&mut self, names: &[String]) -> Result<()> {
        let mut line = String::from("time");
        for name in names.iter().skip(1) {
            line.push('\t');
            line.push_str(name);
        }
        line.push_str("\titer\tdensity%");
        writeln!(self.out, "{}", line).map_err(output_error)
    }

    /// Write one row for a step report.
    pub fn write_row(&mut self, report: &StepReport) -> Result<()> {
        let mut line = format!("{:.6e}", report.time);
        for value in report.values.iter().skip(1) {
            line.push_str(&format!("\t{:.6e}", value));
        }
        line.push_str(&format!("\t{}\t{:.1}", report.iterations, report.lu_density));
        writeln!(self.out, "{}", line).map_err(output_error)
    }

    /// Write a block of free text, such as a matrix dump, prefixed as a comment.
    pub fn write_comment(&mut self, text: &str) -> Result<()> {
        for line in text.lines() {
            writeln!(self.out, "# {}", line).map_err(output_error)?;
        }
        Ok(())
    }

    /// Flush the output stream.
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush().map_err(output_error)
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.out.into_inner().map_err(|e| output_error(e.into_error()))
    }
}
