//! Console messages and logger setup for the `daas_dump` binary.

use crate::client::Selection;
use crate::merge::Merged;
use crate::request::SelectRequest;
use log::LevelFilter;
use std::path::Path;
use std::time::Duration;

/// Initialises `env_logger`; an explicit level wins over `RUST_LOG`.
pub fn init_logging(level: Option<LevelFilter>) {
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(level) = level {
        builder.filter_level(level);
    }
    // a second init (tests) is harmless
    let _ = builder.format_timestamp_secs().try_init();
}

pub fn show_greeting(server: &str) {
    println!("=== DAAS Data Dump ===");
    println!("Service endpoint: {}", server);
}

pub fn request_echo(request: &SelectRequest, outfile: &Path) {
    println!("\nRequest:");
    println!("  Data sources: {}", request.datasource.join(", "));
    let times: Vec<String> = request.inittime.iter().map(|t| t.to_string()).collect();
    println!("  Times: {}", times.join(", "));
    if !request.fh.is_empty() {
        let fhs: Vec<String> = request.fh.iter().map(|f| f.to_string()).collect();
        println!("  Forecast hours: {}", fhs.join(", "));
    }
    if !request.varname.is_empty() {
        println!("  Variables: {}", request.varname.join(", "));
    }
    println!("  Atomic requests: {}", request.combination_count());
    println!("  Output: {}", outfile.display());
}

pub fn show_selection_summary(selection: &Selection) {
    println!("\nResult:");
    if let Selection::Merged { merged, .. } = selection {
        match merged {
            Merged::Table(table) => println!("  Table: {} rows x {} columns", table.height(), table.frame.width()),
            Merged::Grids(ds) => {
                println!("  Grids: {} time steps on {}x{}", ds.time.len(), ds.lat.len(), ds.lon.len());
                for name in ds.variable_names() {
                    println!("    {}", name);
                }
            }
            Merged::Files(files) => println!("  Files: {}", files.len()),
            Merged::Vectors(vectors) => println!("  Vector fields: {}", vectors.len()),
        }
    }
    let missing = selection.missing();
    if !missing.is_empty() {
        println!("  Missing requests: {:?}", missing);
    }
}

pub fn show_farewell_with_timing(elapsed: Duration) {
    println!("\n=== Dump completed in {:.2?} ===", elapsed);
}
