//! # Output Module
//!
//! Writes a merged selection to disk, choosing the format from the file extension.
//!
//! ## Formats
//!
//! - **`.nc` / `.nc4`**: NetCDF-4 for gridded results (needs the `netcdf` feature)
//! - **`.csv` / `.txt`**: CSV through polars; grids are flattened to one row per point
//! - **`.parquet`**: Parquet through polars
//!
//! Files are written to a temporary file next to the target and moved into place once
//! complete, so a failed write never leaves a truncated output behind.

use crate::decode::{FileRecord, GridVector};
use crate::error::{DaasError, DaasResult};
use crate::merge::{GridDataset, Merged};
use log::debug;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tempfile::NamedTempFile;

/// Output formats understood by [`write_selection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    NetCdf,
    Csv,
    Parquet,
}

impl OutputFormat {
    /// Format implied by the extension of `path`.
    pub fn from_path(path: &Path) -> DaasResult<OutputFormat> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "nc" | "nc4" => Ok(OutputFormat::NetCdf),
            "csv" | "txt" => Ok(OutputFormat::Csv),
            "parquet" => Ok(OutputFormat::Parquet),
            other => Err(DaasError::Output(format!(
                "unsupported output extension '{}' for {}",
                other,
                path.display()
            ))),
        }
    }
}

/// Writes `merged` to `path`; `complevel` (0-9) only applies to NetCDF.
pub fn write_selection(merged: &Merged, path: &Path, complevel: u8) -> DaasResult<()> {
    let format = OutputFormat::from_path(path)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let staging = NamedTempFile::new_in(dir)?;

    match format {
        OutputFormat::NetCdf => match merged {
            Merged::Grids(ds) => write_netcdf(ds, staging.path(), complevel)?,
            _ => {
                return Err(DaasError::Output(
                    "NetCDF output needs a gridded selection".to_string(),
                ));
            }
        },
        OutputFormat::Csv => {
            let mut frame = selection_frame(merged)?;
            let mut file = File::create(staging.path())?;
            CsvWriter::new(&mut file).finish(&mut frame)?;
        }
        OutputFormat::Parquet => {
            let mut frame = selection_frame(merged)?;
            let file = File::create(staging.path())?;
            ParquetWriter::new(file).finish(&mut frame)?;
        }
    }

    staging
        .persist(path)
        .map_err(|e| DaasError::Output(format!("cannot move output to {}: {}", path.display(), e)))?;
    debug!("Wrote {:?} output to {}", format, path.display());
    Ok(())
}

/// Tabular view of any merged selection.
pub fn selection_frame(merged: &Merged) -> DaasResult<DataFrame> {
    let frame = match merged {
        Merged::Table(table) => table.frame.clone(),
        Merged::Grids(ds) => ds.to_frame()?,
        Merged::Files(files) => files_frame(files)?,
        Merged::Vectors(vectors) => vectors_frame(vectors)?,
    };
    debug!("Output frame shape: {:?}", frame.shape());
    debug!("Output frame schema:\n{:?}", frame.schema());
    Ok(frame)
}

fn files_frame(files: &[FileRecord]) -> DaasResult<DataFrame> {
    let column = |name: &str, values: Vec<String>| -> Column { Series::new(name.into(), values).into() };
    let pick = |f: fn(&FileRecord) -> String| files.iter().map(f).collect::<Vec<_>>();
    Ok(DataFrame::new(vec![
        column("file_name", pick(|f| f.file_name.clone())),
        column("save_path", pick(|f| f.save_path.clone())),
        column("suffix", pick(|f| f.suffix.clone())),
        column("size", pick(|f| f.size.clone())),
        column("file_url", pick(|f| f.file_url.clone())),
        column(
            "local_path",
            pick(|f| {
                f.local_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            }),
        ),
    ])?)
}

fn vectors_frame(vectors: &[GridVector]) -> DaasResult<DataFrame> {
    let mut frames = Vec::with_capacity(vectors.len());
    for vector in vectors {
        let (mut lat, mut lon) = (Vec::new(), Vec::new());
        for y in &vector.lat {
            for x in &vector.lon {
                lat.push(*y);
                lon.push(*x);
            }
        }
        let u: Vec<f32> = vector.u.iter().copied().collect();
        let v: Vec<f32> = vector.v.iter().copied().collect();
        let frame = DataFrame::new(vec![
            Series::new("lat".into(), lat).into(),
            Series::new("lon".into(), lon).into(),
            Series::new(vector.u_name.as_str().into(), u).into(),
            Series::new(vector.v_name.as_str().into(), v).into(),
        ])?;
        frames.push(frame.lazy());
    }
    if frames.is_empty() {
        return Ok(DataFrame::empty());
    }
    Ok(concat(frames, UnionArgs::default())?.collect()?)
}

#[cfg(feature = "netcdf")]
fn write_netcdf(ds: &GridDataset, path: &Path, complevel: u8) -> DaasResult<()> {
    const EPOCH_UNITS: &str = "hours since 1970-01-01 00:00:00";

    let mut file = netcdf::create(path)?;
    file.add_dimension("time", ds.time.len())?;
    if let Some(member) = &ds.member {
        file.add_dimension("number", member.len())?;
    }
    file.add_dimension("lat", ds.lat.len())?;
    file.add_dimension("lon", ds.lon.len())?;

    let hours = |values: &[chrono::NaiveDateTime]| -> Vec<f64> {
        values
            .iter()
            .map(|t| t.and_utc().timestamp() as f64 / 3600.0)
            .collect()
    };

    let mut time = file.add_variable::<f64>("time", &["time"])?;
    time.put_attribute("units", EPOCH_UNITS)?;
    time.put_attribute("calendar", "standard")?;
    time.put_values(&hours(&ds.time), ..)?;

    for (name, values) in [("inittime", &ds.inittime), ("leadtime", &ds.leadtime)] {
        if let Some(values) = values {
            let mut var = file.add_variable::<f64>(name, &["time"])?;
            var.put_attribute("units", EPOCH_UNITS)?;
            var.put_values(&hours(values), ..)?;
        }
    }

    if let Some(member) = &ds.member {
        let mut number = file.add_variable::<i32>("number", &["number"])?;
        number.put_attribute("long_name", "ensemble member")?;
        number.put_values(member, ..)?;
    }

    let mut lat = file.add_variable::<f64>("lat", &["lat"])?;
    lat.put_attribute("units", "degrees_north")?;
    lat.put_values(&ds.lat, ..)?;

    let mut lon = file.add_variable::<f64>("lon", &["lon"])?;
    lon.put_attribute("units", "degrees_east")?;
    lon.put_values(&ds.lon, ..)?;

    let dims: &[&str] = if ds.member.is_some() {
        &["time", "number", "lat", "lon"]
    } else {
        &["time", "lat", "lon"]
    };
    for variable in &ds.variables {
        let mut var = file.add_variable::<f32>(&variable.name, dims)?;
        if complevel > 0 {
            var.set_compression(i32::from(complevel.min(9)), true)?;
        }
        var.set_fill_value(f32::NAN)?;
        if !variable.units.is_empty() {
            var.put_attribute("units", variable.units.as_str())?;
        }
        let values: Vec<f32> = variable.data.iter().copied().collect();
        var.put_values(&values, ..)?;
    }
    debug!(
        "NetCDF: {} variables on {} time steps",
        ds.variables.len(),
        ds.time.len()
    );
    Ok(())
}

#[cfg(not(feature = "netcdf"))]
fn write_netcdf(_ds: &GridDataset, _path: &Path, _complevel: u8) -> DaasResult<()> {
    Err(DaasError::Output(
        "NetCDF output needs the 'netcdf' feature".to_string(),
    ))
}
