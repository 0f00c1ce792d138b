//! # Response Decoder
//!
//! Turns protobuf response bodies into in-memory structures:
//!
//! - [`Table`]: string records in a polars `DataFrame`, optionally indexed
//! - [`Grid2D`]: one unlabeled 2-D field with its latitude/longitude axes
//! - [`GridField`]: labeled field with `(time, number, lat, lon)` axes
//! - [`GridVector`]: u/v components on a shared grid
//! - [`FileRecord`]: raw file descriptors
//!
//! The status block is checked first; no geometry is reconstructed for a failed call.

use crate::error::{DaasError, DaasResult};
use crate::resolver::DecodeContext;
use crate::wire::{
    RetArray2D, RetFilesInfo, RetGridArray2D, RetGridScalar2D, RetGridVector2D, WithRequestInfo,
    check_gateway,
};
use chrono::NaiveDateTime;
use ndarray::{Array2, Array4, ArrayView2, Axis, s};
use polars::prelude::*;
use prost::Message;
use std::path::PathBuf;

fn decode_message<M: Message + Default>(body: &[u8]) -> DaasResult<M> {
    check_gateway(body)?;
    Ok(M::decode(body)?)
}

/// Record table returned by element queries
#[derive(Debug, Clone)]
pub struct Table {
    pub frame: DataFrame,
    /// Columns acting as the record index
    pub index: Vec<String>,
}

impl Table {
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect()
    }

    /// Row-major values, the layout of the wire payload.
    pub fn to_flat(&self) -> DaasResult<Vec<String>> {
        let columns = self
            .frame
            .get_columns()
            .iter()
            .map(|c| c.as_materialized_series().str().cloned())
            .collect::<PolarsResult<Vec<_>>>()?;
        let mut flat = Vec::with_capacity(self.height() * columns.len());
        for row in 0..self.height() {
            for column in &columns {
                flat.push(column.get(row).unwrap_or_default().to_string());
            }
        }
        Ok(flat)
    }
}

/// Decodes a `callAPI_to_array2D` body.
///
/// The column count is `payload length / rowCount`; the payload must divide evenly and,
/// when element names are present, match their count.
pub fn decode_table(body: &[u8], index: &[String]) -> DaasResult<Table> {
    let msg: RetArray2D = decode_message(body)?;
    let rows = msg.check_status()?.row_count;
    if rows < 0 {
        return Err(DaasError::MalformedPayload(format!("negative row count {}", rows)));
    }
    let rows = rows as usize;
    let data = msg.data;
    let names = msg.element_names;

    let cols = if rows == 0 {
        if !data.is_empty() {
            return Err(DaasError::MalformedPayload(format!(
                "{} values for zero rows",
                data.len()
            )));
        }
        names.len()
    } else {
        if data.len() % rows != 0 {
            return Err(DaasError::MalformedPayload(format!(
                "{} values cannot form {} rows",
                data.len(),
                rows
            )));
        }
        data.len() / rows
    };
    if !names.is_empty() && names.len() != cols {
        return Err(DaasError::MalformedPayload(format!(
            "{} element names for {} columns",
            names.len(),
            cols
        )));
    }

    let columns: Vec<Column> = (0..cols)
        .map(|c| {
            let name = names.get(c).cloned().unwrap_or_else(|| format!("col_{}", c));
            let values: Vec<&str> = (0..rows).map(|r| data[r * cols + c].as_str()).collect();
            Series::new(name.into(), values).into()
        })
        .collect();
    let frame = DataFrame::new(columns)?;

    for column in index {
        if frame.column(column).is_err() {
            return Err(DaasError::MalformedPayload(format!(
                "index column '{}' not in response",
                column
            )));
        }
    }
    Ok(Table {
        frame,
        index: index.to_vec(),
    })
}

/// Evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Explicit coordinates when the payload carries them, otherwise a linear axis.
fn coordinate_axis(name: &str, start: f32, end: f32, count: i32, explicit: &[f32]) -> DaasResult<Vec<f64>> {
    if count < 0 {
        return Err(DaasError::MalformedPayload(format!("negative {} count {}", name, count)));
    }
    let count = count as usize;
    if explicit.is_empty() {
        return Ok(linspace(start as f64, end as f64, count));
    }
    if explicit.len() != count {
        return Err(DaasError::MalformedPayload(format!(
            "{} {} values for count {}",
            explicit.len(),
            name,
            count
        )));
    }
    Ok(explicit.iter().map(|v| *v as f64).collect())
}

fn reshape(data: Vec<f32>, ny: usize, nx: usize) -> DaasResult<Array2<f32>> {
    let len = data.len();
    Array2::from_shape_vec((ny, nx), data).map_err(|_| {
        DaasError::MalformedPayload(format!("{} values cannot form a {}x{} grid", len, ny, nx))
    })
}

/// Unlabeled 2-D field, row index along latitude
#[derive(Debug, Clone, PartialEq)]
pub struct Grid2D {
    pub name: String,
    pub units: String,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub data: Array2<f32>,
}

impl Grid2D {
    pub fn same_geometry(&self, other: &Grid2D) -> bool {
        self.lat == other.lat && self.lon == other.lon
    }
}

/// Decodes a `callAPI_to_gridArray2D` body.
pub fn decode_grid_array(body: &[u8]) -> DaasResult<Grid2D> {
    let msg: RetGridArray2D = decode_message(body)?;
    msg.check_status()?;
    let lat = coordinate_axis("lat", msg.start_lat, msg.end_lat, msg.lat_count, &msg.lats)?;
    let lon = coordinate_axis("lon", msg.start_lon, msg.end_lon, msg.lon_count, &msg.lons)?;
    let data = reshape(msg.data, lat.len(), lon.len())?;
    Ok(Grid2D {
        name: msg.user_ele_name,
        units: msg.units,
        lat,
        lon,
        data,
    })
}

/// Decodes a `callAPI_to_gridScalar2D` body.
pub fn decode_grid_scalar(body: &[u8]) -> DaasResult<Grid2D> {
    let msg: RetGridScalar2D = decode_message(body)?;
    msg.check_status()?;
    let lat = coordinate_axis("lat", msg.start_lat, msg.end_lat, msg.lat_count, &msg.lats)?;
    let lon = coordinate_axis("lon", msg.start_lon, msg.end_lon, msg.lon_count, &msg.lons)?;
    let data = reshape(msg.datas, lat.len(), lon.len())?;
    Ok(Grid2D {
        name: msg.user_ele_name,
        units: msg.units,
        lat,
        lon,
        data,
    })
}

/// Wind-like vector field
#[derive(Debug, Clone, PartialEq)]
pub struct GridVector {
    pub u_name: String,
    pub v_name: String,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub u: Array2<f32>,
    pub v: Array2<f32>,
}

/// Decodes a `callAPI_to_gridVector2D` body.
pub fn decode_grid_vector(body: &[u8]) -> DaasResult<GridVector> {
    let msg: RetGridVector2D = decode_message(body)?;
    msg.check_status()?;
    let lat = coordinate_axis("lat", msg.start_lat, msg.end_lat, msg.lat_count, &msg.lats)?;
    let lon = coordinate_axis("lon", msg.start_lon, msg.end_lon, msg.lon_count, &msg.lons)?;
    let u = reshape(msg.u_datas, lat.len(), lon.len())?;
    let v = reshape(msg.v_datas, lat.len(), lon.len())?;
    Ok(GridVector {
        u_name: msg.u_ele_name,
        v_name: msg.v_ele_name,
        lat,
        lon,
        u,
        v,
    })
}

/// Raw file descriptor
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileRecord {
    pub file_name: String,
    pub save_path: String,
    pub suffix: String,
    pub size: String,
    pub file_url: String,
    pub img_base64: String,
    pub attributes: Vec<String>,
    /// Set once the file has been downloaded
    pub local_path: Option<PathBuf>,
}

/// Decodes a `callAPI_to_fileList` body.
pub fn decode_file_list(body: &[u8]) -> DaasResult<Vec<FileRecord>> {
    let msg: RetFilesInfo = decode_message(body)?;
    msg.check_status()?;
    Ok(msg
        .file_infos
        .into_iter()
        .map(|f| FileRecord {
            file_name: f.file_name,
            save_path: f.save_path,
            suffix: f.suffix,
            size: f.size,
            file_url: f.file_url,
            img_base64: f.img_base64,
            attributes: f.attributes,
            local_path: None,
        })
        .collect())
}

/// Labeled gridded field with `(time, number, lat, lon)` axes.
///
/// Fields without ensemble members keep a `number` axis of length one and
/// `member == None`.
#[derive(Debug, Clone, PartialEq)]
pub struct GridField {
    pub name: String,
    pub units: String,
    pub time: Vec<NaiveDateTime>,
    /// Initial time per time step, for forecasts
    pub inittime: Option<Vec<NaiveDateTime>>,
    /// Valid time per step once the time axis holds initial times
    pub leadtime: Option<Vec<NaiveDateTime>>,
    pub member: Option<Vec<i32>>,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub data: Array4<f32>,
}

impl GridField {
    /// Labels a single decoded grid.
    pub fn from_grid(grid: Grid2D, context: &DecodeContext) -> DaasResult<GridField> {
        Self::from_members(vec![grid], None, context)
    }

    /// Stacks grids on the `number` axis; every grid must share the first one's geometry.
    pub fn from_members(
        grids: Vec<Grid2D>,
        member: Option<Vec<i32>>,
        context: &DecodeContext,
    ) -> DaasResult<GridField> {
        let first = grids
            .first()
            .ok_or_else(|| DaasError::MalformedPayload("no grid to label".to_string()))?;
        if let Some(bad) = grids.iter().position(|g| !g.same_geometry(first)) {
            return Err(DaasError::MalformedPayload(format!(
                "member {} grid differs from member 0",
                bad
            )));
        }
        if let Some(member) = &member
            && member.len() != grids.len()
        {
            return Err(DaasError::MalformedPayload(format!(
                "{} member labels for {} grids",
                member.len(),
                grids.len()
            )));
        }
        let time = context.valid_time.or(context.inittime).ok_or_else(|| {
            DaasError::InvalidTimeShape("gridded result has no time label".to_string())
        })?;

        let (ny, nx) = (first.lat.len(), first.lon.len());
        let name = if context.name.is_empty() {
            first.name.clone()
        } else {
            context.name.clone()
        };
        let units = first.units.clone();
        let lat = first.lat.clone();
        let lon = first.lon.clone();

        let mut data = Array4::<f32>::zeros((1, grids.len(), ny, nx));
        for (m, grid) in grids.into_iter().enumerate() {
            data.slice_mut(s![0, m, .., ..]).assign(&grid.data);
        }

        Ok(GridField {
            name,
            units,
            time: vec![time],
            inittime: context.inittime.map(|t| vec![t]),
            leadtime: None,
            member,
            lat,
            lon,
            data,
        })
    }

    pub fn n_time(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn n_member(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// The `(lat, lon)` slab at a time step and member.
    pub fn slab(&self, time: usize, member: usize) -> ArrayView2<'_, f32> {
        self.data.slice(s![time, member, .., ..])
    }
}

/// Result of one atomic request
#[derive(Debug, Clone)]
pub enum Decoded {
    Table(Table),
    Grid(GridField),
    Vector(GridVector),
    Files(Vec<FileRecord>),
}

impl Decoded {
    pub fn kind(&self) -> &'static str {
        match self {
            Decoded::Table(_) => "table",
            Decoded::Grid(_) => "grid",
            Decoded::Vector(_) => "vector",
            Decoded::Files(_) => "files",
        }
    }
}
