//! Output handling for CLI
//!
//! Route listings go to stdout, one per line or as a single JSON array.

use std::io::{self, Write};

use super::errors::CliResult;

/// Write each line to stdout
pub fn write_lines(lines: &[String]) -> CliResult<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_lines_to(&mut handle, lines)?;
    handle.flush()?;
    Ok(())
}

/// Write the lines to stdout as one JSON array
pub fn write_json(lines: &[String]) -> CliResult<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer(&mut handle, lines)?;
    writeln!(handle)?;
    handle.flush()?;
    Ok(())
}

fn write_lines_to<W: Write>(out: &mut W, lines: &[String]) -> io::Result<()> {
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    Ok(())
}
