//! # CLI Module
//!
//! Command-line interface of `daas_dump`, which runs one selection and writes the merged
//! result to a file:
//! - Argument parsing with clap, including the compact time/coordinate syntax
//! - Client configuration from a file (`--config` / `DAAS_CONFIG`) with command-line
//!   and environment overrides
//! - Translation of the arguments into a [`SelectRequest`]

use crate::config::ClientConfig;
use crate::error::{DaasError, DaasResult};
use crate::params::{Coord, ForecastSpec, Level, TimeSpec, parse_time};
use crate::request::{Modifiers, SelectRequest};
use chrono::Duration;
use clap::{Parser, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;

/// Dump meteorological data from the DAAS service to a local file
#[derive(Parser, Debug)]
#[command(name = "daas_dump")]
#[command(about = "Query the DAAS data service and write the merged result to a file")]
#[command(version)]
#[command(long_about = "
daas_dump expands a query over data sources, times, forecast hours and variables,
sends one signed call per combination and merges the results into a single file.

TIME SYNTAX:
  2023021912               one instant (YYYYMMDDHH[MM[SS]])
  2023021900,2023021912    a list of instants
  2023021900:2023021912    a range, sent as one call
  2023021900:2023022000:6h a list stepping by 6 hours (also 1d or bare hours)

EXAMPLES:
  # Relative humidity at two forecast hours over a box
  daas_dump ECMWF_P 2023021912 -f 12,24 -v RHU -y 20:40 -x 110:130 -e rhu.nc

  # Hourly surface observations for a day, two stations
  daas_dump SURF_CHN_MUL_HOR 2023021900:2023022000 -v PRE_1H -l 58457,58238 -e pre.csv

  # List and download raw files
  daas_dump NAFP_FOR_FTM_HIGH_EC_GLB 2023021912 -d ./grib -e files.csv
")]
pub struct Cli {
    /// Data source code or alias; several may be joined with ','
    #[arg(value_name = "DATASOURCE")]
    pub datasource: String,

    /// Initial (forecast) or observation time
    #[arg(value_name = "INITTIME", value_parser = parse_time_list)]
    pub inittime: TimeList,

    /// Forecast hours: 24, 12,24, 0:72 (range) or 0:72:6 (list)
    #[arg(short = 'f', long, value_parser = parse_fh_list, allow_hyphen_values = true)]
    pub fh: Option<FhList>,

    /// Valid time(s), same syntax as INITTIME (instants only)
    #[arg(long, value_parser = parse_time_list)]
    pub leadtime: Option<TimeList>,

    /// Variable name, may be repeated
    #[arg(short = 'v', long)]
    pub varname: Vec<String>,

    /// Longitude: 120, 120,122 or 110:130
    #[arg(short = 'x', long, value_parser = parse_coord, allow_hyphen_values = true)]
    pub lon: Option<Coord>,

    /// Latitude: 30, 30,32 or 20:40
    #[arg(short = 'y', long, value_parser = parse_coord, allow_hyphen_values = true)]
    pub lat: Option<Coord>,

    /// Vertical level of model grids (default 0, surface)
    #[arg(short = 'p', long, allow_hyphen_values = true)]
    pub level: Option<f64>,

    /// Query model grids without any level
    #[arg(long, conflicts_with = "level")]
    pub no_level: bool,

    /// Explicit level type for model grids
    #[arg(long)]
    pub level_type: Option<String>,

    /// List raw files and download them into this directory
    #[arg(short = 'd', long, value_name = "DIR")]
    pub download: Option<PathBuf>,

    /// Station ids, comma separated
    #[arg(short = 'l', long)]
    pub sta_ids: Option<String>,

    /// List raw files instead of decoding elements
    #[arg(long)]
    pub read_from_file: bool,

    /// Extra columns requested and used as table index
    #[arg(long)]
    pub index_col: Option<String>,

    /// Region (administrative) codes
    #[arg(long)]
    pub admin_codes: Option<String>,

    #[arg(long)]
    pub sta_levels: Option<String>,

    #[arg(long)]
    pub ele_value_ranges: Option<String>,

    #[arg(long)]
    pub limit_cnt: Option<u32>,

    #[arg(long)]
    pub order_by: Option<String>,

    #[arg(long)]
    pub data_province_id: Option<String>,

    #[arg(long)]
    pub stat_ele_value_ranges: Option<String>,

    #[arg(long)]
    pub hour_separate: Option<u32>,

    #[arg(long)]
    pub min_separate: Option<u32>,

    /// Drop duplicated records (surface element queries)
    #[arg(long)]
    pub distinct: bool,

    /// Pressure layers for upper-air queries
    #[arg(long)]
    pub p_layers: Option<String>,

    /// Height layers for upper-air queries
    #[arg(long)]
    pub h_layers: Option<String>,

    #[arg(long)]
    pub report_centers: Option<String>,

    #[arg(long)]
    pub typh_names: Option<String>,

    #[arg(long)]
    pub typh_cids: Option<String>,

    #[arg(long)]
    pub typh_gids: Option<String>,

    /// Typhoon track query for severe-weather sources
    #[arg(long)]
    pub typhoon: bool,

    /// Shift the time coordinate of the result by this many hours
    #[arg(short = 't', long, allow_hyphen_values = true)]
    pub offset_inittime: Option<i64>,

    /// Rename a variable or column: old:new (can be used multiple times)
    #[arg(long = "name-map", value_parser = parse_name_map)]
    pub name_map: Vec<NameMapArg>,

    /// Number of calls in flight
    #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub njobs: u8,

    /// Output file; the extension selects the format (.nc, .nc4, .csv, .txt, .parquet)
    #[arg(short = 'e', long)]
    pub outfile: PathBuf,

    /// NetCDF compression level
    #[arg(short = 'c', long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(0..=9))]
    pub complevel: u8,

    /// Log level (falls back to RUST_LOG)
    #[arg(long, value_enum, env = "DAAS_LOG_LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Client configuration file (JSON or YAML)
    #[arg(long, env = "DAAS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Service host, overrides the configuration file
    #[arg(long, env = "DAAS_SERVER")]
    pub server: Option<String>,

    #[arg(long, env = "DAAS_PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "DAAS_SERVICE_NODE_ID")]
    pub service_node_id: Option<String>,

    #[arg(short = 'u', long, env = "DAAS_USER")]
    pub user: Option<String>,

    #[arg(short = 's', long, env = "DAAS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Parsed time argument
#[derive(Debug, Clone, PartialEq)]
pub struct TimeList(pub Vec<TimeSpec>);

/// Parsed forecast hour argument
#[derive(Debug, Clone, PartialEq)]
pub struct FhList(pub Vec<ForecastSpec>);

#[derive(Debug, Clone, PartialEq)]
pub struct NameMapArg {
    pub from: String,
    pub to: String,
}

/// Step of a `start:stop:STEP` list in hours: `6h`, `1d` or `6`.
fn parse_step_hours(s: &str) -> Result<i64, String> {
    let s = s.trim();
    let (number, scale) = if let Some(days) = s.strip_suffix('d') {
        (days, 24)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 1)
    } else {
        (s, 1)
    };
    let step = number
        .parse::<i64>()
        .map_err(|_| format!("Invalid step '{}'", s))?
        .checked_mul(scale)
        .ok_or_else(|| "Step out of range".to_string())?;
    if step <= 0 {
        return Err("Step must be positive".to_string());
    }
    Ok(step)
}

/// Parse a time argument
/// Format: t | t1,t2,... | start:stop | start:stop:STEP
pub fn parse_time_list(s: &str) -> Result<TimeList, String> {
    let time = |t: &str| parse_time(t.trim()).map_err(|e| e.to_string());
    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        [single] => {
            let times = single
                .split(',')
                .map(|t| time(t).map(TimeSpec::Point))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TimeList(times))
        }
        [start, stop] => {
            let (start, stop) = (time(*start)?, time(*stop)?);
            if start > stop {
                return Err("Range start must not be after its end".to_string());
            }
            Ok(TimeList(vec![TimeSpec::Range(start, stop)]))
        }
        [start, stop, step] => {
            let (start, stop) = (time(*start)?, time(*stop)?);
            if start > stop {
                return Err("Range start must not be after its end".to_string());
            }
            let step = Duration::try_hours(parse_step_hours(step)?)
                .ok_or_else(|| "Step out of range".to_string())?;
            let mut times = Vec::new();
            let mut next = Some(start);
            while let Some(t) = next
                && t <= stop
            {
                times.push(TimeSpec::Point(t));
                next = t.checked_add_signed(step);
            }
            Ok(TimeList(times))
        }
        _ => Err("Time must be 't', 't1,t2', 'start:stop' or 'start:stop:step'".to_string()),
    }
}

/// Parse forecast hours
/// Format: h | h1,h2,... | start:stop | start:stop:step
pub fn parse_fh_list(s: &str) -> Result<FhList, String> {
    let hour = |h: &str| {
        h.trim()
            .parse::<i64>()
            .map_err(|_| format!("Invalid forecast hour '{}'", h))
    };
    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        [single] => {
            let hours = single
                .split(',')
                .map(|h| hour(h).map(ForecastSpec::Hours))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(FhList(hours))
        }
        [start, stop] => {
            let (start, stop) = (hour(*start)?, hour(*stop)?);
            if start > stop {
                return Err("Range start must not be after its end".to_string());
            }
            Ok(FhList(vec![ForecastSpec::Range(start, stop)]))
        }
        [start, stop, step] => {
            let (start, stop) = (hour(*start)?, hour(*stop)?);
            let step = parse_step_hours(step)?;
            if start > stop {
                return Err("Range start must not be after its end".to_string());
            }
            Ok(FhList(
                (start..=stop)
                    .step_by(step as usize)
                    .map(ForecastSpec::Hours)
                    .collect(),
            ))
        }
        _ => Err("Forecast hours must be 'h', 'h1,h2', 'start:stop' or 'start:stop:step'".to_string()),
    }
}

/// Parse a coordinate
/// Format: v | v1,v2,... | min:max
pub fn parse_coord(s: &str) -> Result<Coord, String> {
    let value = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|_| format!("Invalid coordinate '{}'", v))
    };
    if let Some((min, max)) = s.split_once(':') {
        let (min, max) = (value(min)?, value(max)?);
        if min > max {
            return Err("Minimum value must not exceed maximum value".to_string());
        }
        return Ok(Coord::Range(min, max));
    }
    let values = s.split(',').map(value).collect::<Result<Vec<_>, _>>()?;
    match values.as_slice() {
        [single] => Ok(Coord::Scalar(*single)),
        _ => Ok(Coord::List(values)),
    }
}

/// Parse a rename
/// Format: old:new
fn parse_name_map(s: &str) -> Result<NameMapArg, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 || parts.iter().any(|p| p.trim().is_empty()) {
        return Err("Name map must be in format 'old_name:new_name'".to_string());
    }
    Ok(NameMapArg {
        from: parts[0].trim().to_string(),
        to: parts[1].trim().to_string(),
    })
}

impl Cli {
    /// Client configuration from `--config` plus command-line/environment overrides.
    pub fn client_config(&self) -> DaasResult<ClientConfig> {
        let mut config = match (&self.config, &self.server) {
            (Some(path), _) => ClientConfig::from_file(path)?,
            (None, Some(server)) => {
                ClientConfig::new(server.as_str(), self.service_node_id.clone().unwrap_or_default())
            }
            (None, None) => {
                return Err(DaasError::Config(
                    "either --config or --server is required".to_string(),
                ));
            }
        };
        if let Some(server) = &self.server {
            config.server = server.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(node) = &self.service_node_id {
            config.service_node_id = node.clone();
        }
        if let Some(user) = &self.user {
            config.user = user.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        config.validate()?;
        Ok(config)
    }

    fn modifiers(&self) -> Modifiers {
        Modifiers {
            level_type: self.level_type.clone(),
            sta_ids: self.sta_ids.clone(),
            admin_codes: self.admin_codes.clone(),
            index_col: self.index_col.clone(),
            sta_levels: self.sta_levels.clone(),
            ele_value_ranges: self.ele_value_ranges.clone(),
            limit_cnt: self.limit_cnt,
            order_by: self.order_by.clone(),
            data_province_id: self.data_province_id.clone(),
            stat_ele_value_ranges: self.stat_ele_value_ranges.clone(),
            hour_separate: self.hour_separate,
            min_separate: self.min_separate,
            distinct: self.distinct,
            p_layers: self.p_layers.clone(),
            h_layers: self.h_layers.clone(),
            report_centers: self.report_centers.clone(),
            typh_names: self.typh_names.clone(),
            typh_cids: self.typh_cids.clone(),
            typh_gids: self.typh_gids.clone(),
            typhoon: self.typhoon,
            read_from_file: self.read_from_file,
            download: self.download.clone(),
        }
    }

    /// The merged selection described by the arguments.
    pub fn to_select_request(&self) -> DaasResult<SelectRequest> {
        let datasource: Vec<String> = self
            .datasource
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from)
            .collect();

        let leadtime = match &self.leadtime {
            Some(TimeList(times)) => times
                .iter()
                .map(|t| {
                    t.point().ok_or_else(|| {
                        DaasError::InvalidTimeShape("leadtime must be one or more instants".to_string())
                    })
                })
                .collect::<DaasResult<Vec<_>>>()?,
            None => Vec::new(),
        };

        let level = if self.no_level {
            Level::Absent
        } else {
            Level::Value(self.level.unwrap_or(0.0))
        };

        Ok(SelectRequest {
            datasource,
            inittime: self.inittime.0.clone(),
            fh: self.fh.clone().map(|f| f.0).unwrap_or_default(),
            varname: self.varname.clone(),
            leadtime,
            lat: self.lat.clone(),
            lon: self.lon.clone(),
            level,
            merge: true,
            modifiers: self.modifiers(),
        })
    }
}
