//! Dump the variable names and labels of an SPSS system file to CSV.
//!
//! ```text
//! export_labels <input.sav> [output.csv]
//! ```
//!
//! The output defaults to `variables_info.csv` in the working directory.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use survey_lens::data::export::{sav_label_rows, write_label_csv, DESCRIPTION_HEADER, VARIABLE_HEADER};
use survey_lens::data::sav::SavFile;

const DEFAULT_OUTPUT: &str = "variables_info.csv";
const PREVIEW_ROWS: usize = 5;

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args_os().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        bail!("usage: export_labels <input.sav> [output.csv]");
    };
    let output = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    let bytes = std::fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
    let file = SavFile::parse(&bytes).with_context(|| format!("decoding {}", input.display()))?;
    log::info!(
        "{}: {} variables, {} cases",
        input.display(),
        file.variables.len(),
        file.dataset.len()
    );

    let rows = sav_label_rows(&file);
    let out = File::create(&output).with_context(|| format!("creating {}", output.display()))?;
    let written = write_label_csv(out, rows.iter().map(|(n, d)| (n.as_str(), d.as_str())))?;
    log::info!("wrote {written} rows to {}", output.display());

    println!("{VARIABLE_HEADER}\t{DESCRIPTION_HEADER}");
    for (name, description) in rows.iter().take(PREVIEW_ROWS) {
        println!("{name}\t{description}");
    }
    Ok(())
}
