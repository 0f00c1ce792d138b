//! # daas-client
//!
//! A client for a meteorological data query service. A compact, multi-dimensional query
//! (data sources × times × forecast hours × variables × lead times) is expanded into
//! atomic calls, each one signed, sent and decoded into a table or a labeled grid.
//!
//! ## Features
//!
//! - **Request expansion**: deterministic cartesian expansion with alias resolution
//! - **Interface resolution**: model grids, surface and upper-air observations, severe
//!   weather / typhoon tracks and raw file listings
//! - **Signed calls**: MD5 signature over canonical parameters, fresh nonce per call
//! - **Protobuf decoding**: tables into polars `DataFrame`s, grids into `ndarray`
//!   arrays, including the 51-member ensemble loop
//! - **Partial failure**: failed calls leave empty slots; only a fully failed batch errors
//! - **Merging and output**: grids merged on a common time axis, written as NetCDF,
//!   CSV or Parquet
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use daas_client::client::{DaasClient, Selection};
//! use daas_client::config::ClientConfig;
//! use daas_client::params::{Coord, ForecastSpec, parse_time};
//! use daas_client::request::SelectRequest;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_file("daas.yaml")?;
//! let client = DaasClient::new(config)?.with_parallelism(3);
//!
//! let request = SelectRequest::new("ECMWF_P")
//!     .inittime(parse_time("2023021912")?)
//!     .fhs([12, 24].map(ForecastSpec::Hours))
//!     .varname("RHU")
//!     .lat(Coord::Range(20.0, 40.0))
//!     .lon(Coord::Range(110.0, 130.0))
//!     .merge(true);
//!
//! if let Selection::Merged { merged, missing } = client.select(&request).await? {
//!     daas_client::output::write_selection(&merged, "rhu.nc".as_ref(), 4)?;
//!     println!("{} requests failed", missing.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod decode;
pub mod dispatch;
pub mod error;
pub mod log;
pub mod merge;
pub mod output;
pub mod params;
pub mod request;
pub mod resolver;
pub mod sign;
pub mod transport;
pub mod wire;

pub use client::{DaasClient, Selection};
pub use config::ClientConfig;
pub use error::{DaasError, DaasResult};
pub use request::{Modifiers, SelectRequest};


#[cfg(test)]
mod cli_tests;
