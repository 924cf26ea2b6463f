use crate::args::DecodeArgs;
use crate::shared::gga::parse_gga;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

// Public decode command entrypoint: one verdict per non-blank line.
pub fn run_decode(args: DecodeArgs) -> Result<()> {
    let verdicts = decode_file(&args.file)?;
    let accepted = verdicts
        .iter()
        .filter(|line| line.contains(": OK "))
        .count();
    for verdict in &verdicts {
        println!("{verdict}");
    }
    eprintln!(
        "Decoded {} line(s) from {}, {accepted} accepted",
        verdicts.len(),
        args.file.display()
    );
    Ok(())
}

fn decode_file(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading sentence file failed: {}", path.display()))?;
    Ok(contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| format!("{:>5}: {}", index + 1, decode_line(line.trim())))
        .collect())
}

fn decode_line(line: &str) -> String {
    match parse_gga(line.as_bytes()) {
        Ok(position) if position.is_valid() => format!(
            "OK {position} ({:.6}, {:.6})",
            position.latitude_deg(),
            position.longitude_deg()
        ),
        Ok(position) => format!("OUT OF RANGE {position}"),
        Err(err) => format!("REJECTED {err}"),
    }
}
