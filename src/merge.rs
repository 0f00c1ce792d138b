//! # Merge Stage
//!
//! Combines the successful results of a batch into one value:
//!
//! - tables are concatenated row-wise (column sets must match)
//! - grids become a [`GridDataset`]: one variable per name on a sorted union time axis,
//!   gaps filled with NaN
//! - file lists and vector fields are concatenated
//!
//! When a batch spans several initial times and every grid has the same valid time, the
//! time axis is re-indexed by initial time and the shared valid time is kept as the
//! `leadtime` coordinate.

use crate::decode::{Decoded, FileRecord, GridField, GridVector, Table};
use crate::error::{DaasError, DaasResult};
use crate::params::add_hours;
use chrono::NaiveDateTime;
use ndarray::{Array4, s};
use polars::prelude::*;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Grid variables sharing time, member and lat/lon axes
#[derive(Debug, Clone, PartialEq)]
pub struct GridDataset {
    pub time: Vec<NaiveDateTime>,
    pub inittime: Option<Vec<NaiveDateTime>>,
    pub leadtime: Option<Vec<NaiveDateTime>>,
    pub member: Option<Vec<i32>>,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub variables: Vec<GridVariable>,
}

/// One named `(time, number, lat, lon)` array of a [`GridDataset`]
#[derive(Debug, Clone, PartialEq)]
pub struct GridVariable {
    pub name: String,
    pub units: String,
    pub data: Array4<f32>,
}

impl GridDataset {
    pub fn variable(&self, name: &str) -> Option<&GridVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }

    /// Flattens the dataset into a long table, one row per grid point.
    ///
    /// Columns: `time`, then `inittime` / `leadtime` when present, `number` for
    /// ensembles, `lat`, `lon` and one column per variable.
    pub fn to_frame(&self) -> DaasResult<DataFrame> {
        let n_member = self.member.as_ref().map_or(1, Vec::len);
        let (ny, nx) = (self.lat.len(), self.lon.len());
        let rows = self.time.len() * n_member * ny * nx;

        let mut time = Vec::with_capacity(rows);
        let mut inittime = Vec::with_capacity(rows);
        let mut leadtime = Vec::with_capacity(rows);
        let mut number = Vec::with_capacity(rows);
        let mut lat = Vec::with_capacity(rows);
        let mut lon = Vec::with_capacity(rows);
        for (t, step) in self.time.iter().enumerate() {
            for m in 0..n_member {
                for y in &self.lat {
                    for x in &self.lon {
                        time.push(*step);
                        if let Some(values) = &self.inittime {
                            inittime.push(values[t]);
                        }
                        if let Some(values) = &self.leadtime {
                            leadtime.push(values[t]);
                        }
                        if let Some(members) = &self.member {
                            number.push(members[m]);
                        }
                        lat.push(*y);
                        lon.push(*x);
                    }
                }
            }
        }

        let stamp = |values: Vec<NaiveDateTime>| -> Vec<String> {
            values.iter().map(|t| t.format(DATETIME_FORMAT).to_string()).collect()
        };
        let mut columns: Vec<Column> = vec![Series::new("time".into(), stamp(time)).into()];
        if self.inittime.is_some() {
            columns.push(Series::new("inittime".into(), stamp(inittime)).into());
        }
        if self.leadtime.is_some() {
            columns.push(Series::new("leadtime".into(), stamp(leadtime)).into());
        }
        if self.member.is_some() {
            columns.push(Series::new("number".into(), number).into());
        }
        columns.push(Series::new("lat".into(), lat).into());
        columns.push(Series::new("lon".into(), lon).into());
        for variable in &self.variables {
            let values: Vec<f32> = variable.data.iter().copied().collect();
            columns.push(Series::new(variable.name.as_str().into(), values).into());
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Merged form of a batch
#[derive(Debug, Clone)]
pub enum Merged {
    Table(Table),
    Grids(GridDataset),
    Files(Vec<FileRecord>),
    Vectors(Vec<GridVector>),
}

impl Merged {
    /// Shifts the `time` index of gridded results by `hours`.
    ///
    /// Only the index moves: stored `inittime` and `leadtime` coordinates keep the
    /// times the service reported. Returns `Ok(false)` for results without a time axis.
    pub fn shift_time(&mut self, hours: i64) -> DaasResult<bool> {
        match self {
            Merged::Grids(ds) => {
                ds.time = ds
                    .time
                    .iter()
                    .map(|t| add_hours(*t, hours))
                    .collect::<DaasResult<_>>()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Renames a grid variable or a table column.
    pub fn rename(&mut self, from: &str, to: &str) -> DaasResult<()> {
        match self {
            Merged::Grids(ds) => {
                let variable = ds
                    .variables
                    .iter_mut()
                    .find(|v| v.name == from)
                    .ok_or_else(|| DaasError::Config(format!("no variable named '{}'", from)))?;
                variable.name = to.to_string();
                Ok(())
            }
            Merged::Table(table) => {
                table
                    .frame
                    .rename(from, to.into())
                    .map_err(|_| DaasError::Config(format!("no column named '{}'", from)))?;
                for index in table.index.iter_mut().filter(|i| i.as_str() == from) {
                    *index = to.to_string();
                }
                Ok(())
            }
            _ => Err(DaasError::Config("only grids and tables can be renamed".to_string())),
        }
    }
}

/// Merges decoded results; `inittime_count` is the number of initial times the
/// request named.
pub fn merge(results: Vec<Decoded>, inittime_count: usize) -> DaasResult<Merged> {
    let first_kind = results
        .first()
        .map(Decoded::kind)
        .ok_or_else(|| DaasError::EmptySelection("nothing to merge".to_string()))?;
    if let Some(other) = results.iter().find(|r| r.kind() != first_kind) {
        return Err(DaasError::IncompatibleMerge(format!(
            "cannot merge {} with {}",
            first_kind,
            other.kind()
        )));
    }

    match first_kind {
        "table" => merge_tables(
            results
                .into_iter()
                .filter_map(|r| match r {
                    Decoded::Table(t) => Some(t),
                    _ => None,
                })
                .collect(),
        )
        .map(Merged::Table),
        "grid" => merge_grids(
            results
                .into_iter()
                .filter_map(|r| match r {
                    Decoded::Grid(g) => Some(g),
                    _ => None,
                })
                .collect(),
            inittime_count,
        )
        .map(Merged::Grids),
        "files" => Ok(Merged::Files(
            results
                .into_iter()
                .flat_map(|r| match r {
                    Decoded::Files(f) => f,
                    _ => Vec::new(),
                })
                .collect(),
        )),
        _ => Ok(Merged::Vectors(
            results
                .into_iter()
                .filter_map(|r| match r {
                    Decoded::Vector(v) => Some(v),
                    _ => None,
                })
                .collect(),
        )),
    }
}

fn merge_tables(tables: Vec<Table>) -> DaasResult<Table> {
    let columns = tables[0].column_names();
    if let Some(other) = tables.iter().find(|t| t.column_names() != columns) {
        return Err(DaasError::IncompatibleMerge(format!(
            "table columns {:?} differ from {:?}",
            other.column_names(),
            columns
        )));
    }
    let index = tables[0].index.clone();
    let frames: Vec<LazyFrame> = tables.into_iter().map(|t| t.frame.lazy()).collect();
    let frame = concat(frames, UnionArgs::default())?.collect()?;
    Ok(Table { frame, index })
}

/// Re-indexes the time axis by initial time when every field has the same valid time.
fn align_leadtime(fields: &mut [GridField], inittime_count: usize) {
    if inittime_count <= 1 {
        return;
    }
    let reference = fields[0].time.clone();
    let aligned = fields
        .iter()
        .all(|f| f.time == reference && f.inittime.is_some());
    if !aligned {
        return;
    }
    for field in fields.iter_mut() {
        if let Some(inittime) = field.inittime.clone() {
            field.leadtime = Some(std::mem::replace(&mut field.time, inittime));
        }
    }
}

/// Value of an optional per-step coordinate at union position `t`, checking agreement.
fn place_coordinate(
    slot: &mut [Option<NaiveDateTime>],
    t: usize,
    value: NaiveDateTime,
    what: &str,
) -> DaasResult<()> {
    match slot[t] {
        Some(existing) if existing != value => Err(DaasError::IncompatibleMerge(format!(
            "conflicting {} at one time step: {} vs {}",
            what, existing, value
        ))),
        _ => {
            slot[t] = Some(value);
            Ok(())
        }
    }
}

fn merge_grids(mut fields: Vec<GridField>, inittime_count: usize) -> DaasResult<GridDataset> {
    align_leadtime(&mut fields, inittime_count);

    let first = &fields[0];
    let (lat, lon, member) = (first.lat.clone(), first.lon.clone(), first.member.clone());
    if let Some(other) = fields
        .iter()
        .find(|f| f.lat != lat || f.lon != lon || f.member != member)
    {
        return Err(DaasError::IncompatibleMerge(format!(
            "'{}' is on a different grid than '{}'",
            other.name, first.name
        )));
    }

    let mut time: Vec<NaiveDateTime> = fields.iter().flat_map(|f| f.time.iter().copied()).collect();
    time.sort();
    time.dedup();
    let n_member = fields[0].n_member();
    let (ny, nx) = (lat.len(), lon.len());

    let mut inittime = vec![None; time.len()];
    let mut leadtime = vec![None; time.len()];
    let mut variables: Vec<(GridVariable, Vec<bool>)> = Vec::new();

    for field in &fields {
        let position = match variables.iter().position(|(v, _)| v.name == field.name) {
            Some(p) => p,
            None => {
                variables.push((
                    GridVariable {
                        name: field.name.clone(),
                        units: field.units.clone(),
                        data: Array4::from_elem((time.len(), n_member, ny, nx), f32::NAN),
                    },
                    vec![false; time.len()],
                ));
                variables.len() - 1
            }
        };
        let (variable, filled) = &mut variables[position];

        for (k, step) in field.time.iter().enumerate() {
            let t = time.binary_search(step).map_err(|_| {
                DaasError::IncompatibleMerge(format!("time {} missing from union axis", step))
            })?;
            if filled[t] {
                return Err(DaasError::IncompatibleMerge(format!(
                    "'{}' has more than one field at {}",
                    field.name, step
                )));
            }
            filled[t] = true;
            variable
                .data
                .slice_mut(s![t, .., .., ..])
                .assign(&field.data.slice(s![k, .., .., ..]));
            if let Some(values) = &field.inittime {
                place_coordinate(&mut inittime, t, values[k], "inittime")?;
            }
            if let Some(values) = &field.leadtime {
                place_coordinate(&mut leadtime, t, values[k], "leadtime")?;
            }
        }
    }

    let complete = |coord: Vec<Option<NaiveDateTime>>| -> Option<Vec<NaiveDateTime>> {
        coord.into_iter().collect()
    };
    Ok(GridDataset {
        time,
        inittime: complete(inittime),
        leadtime: complete(leadtime),
        member,
        lat,
        lon,
        variables: variables.into_iter().map(|(v, _)| v).collect(),
    })
}
