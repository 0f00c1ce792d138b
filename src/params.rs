//! # Parameter Codec
//!
//! Value types for the axes of a query and their wire rendering:
//!
//! - [`TimeSpec`]: a single instant, an inclusive range or a raw pass-through string
//! - [`ForecastSpec`]: forecast hour or forecast hour range
//! - [`Coord`] / [`Spatial`]: coordinate inputs and the spatial filter they form
//! - [`Level`]: vertical level, or explicitly no level
//! - [`ParameterSet`]: the immutable key/value map sent to the remote interface
//!
//! Instants render as `YYYYMMDDHHMMSS`, ranges as `[start,stop]`.

use crate::error::{DaasError, DaasResult};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::fmt;

/// Wire format for instants.
pub const TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Formats an instant as `YYYYMMDDHHMMSS`.
pub fn format_time(t: &NaiveDateTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

/// Parses an instant from the formats accepted on the command line and in configs.
///
/// Accepts `YYYYMMDDHH`, `YYYYMMDDHHMM`, `YYYYMMDDHHMMSS`, `YYYYMMDD` and
/// `YYYY-MM-DD HH:MM[:SS]`.
pub fn parse_time(s: &str) -> DaasResult<NaiveDateTime> {
    let s = s.trim();
    let digits = s.chars().all(|c| c.is_ascii_digit());
    let parsed = match (digits, s.len()) {
        (true, 8) => NaiveDate::parse_from_str(s, "%Y%m%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        (true, 10) => NaiveDateTime::parse_from_str(&format!("{}0000", s), TIME_FORMAT).ok(),
        (true, 12) => NaiveDateTime::parse_from_str(&format!("{}00", s), TIME_FORMAT).ok(),
        (true, 14) => NaiveDateTime::parse_from_str(s, TIME_FORMAT).ok(),
        _ => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
            .ok(),
    };
    parsed.ok_or_else(|| DaasError::InvalidTimeShape(format!("cannot parse time '{}'", s)))
}

/// Time axis value of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeSpec {
    /// A single instant
    Point(NaiveDateTime),
    /// Inclusive range `[start, stop]`
    Range(NaiveDateTime, NaiveDateTime),
    /// Sent untouched, e.g. a comma separated list of instants for observations
    Raw(String),
}

impl TimeSpec {
    /// Renders the value the way the remote interfaces expect it.
    pub fn to_wire(&self) -> String {
        match self {
            TimeSpec::Point(t) => format_time(t),
            TimeSpec::Range(start, stop) => format!("[{},{}]", format_time(start), format_time(stop)),
            TimeSpec::Raw(s) => s.clone(),
        }
    }

    pub fn point(&self) -> Option<NaiveDateTime> {
        match self {
            TimeSpec::Point(t) => Some(*t),
            _ => None,
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, TimeSpec::Range(..))
    }
}

impl From<NaiveDateTime> for TimeSpec {
    fn from(t: NaiveDateTime) -> Self {
        TimeSpec::Point(t)
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}

/// Forecast offset in hours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastSpec {
    Hours(i64),
    /// Inclusive range of forecast hours
    Range(i64, i64),
}

impl fmt::Display for ForecastSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecastSpec::Hours(h) => write!(f, "{}", h),
            ForecastSpec::Range(a, b) => write!(f, "{}:{}", a, b),
        }
    }
}

/// One coordinate axis as given by the caller
#[derive(Debug, Clone, PartialEq)]
pub enum Coord {
    Scalar(f64),
    List(Vec<f64>),
    Range(f64, f64),
}

/// Spatial filter built from a latitude and a longitude [`Coord`]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Spatial {
    #[default]
    None,
    /// `(lat, lon)` pairs
    Points(Vec<(f64, f64)>),
    Rect {
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
    },
}

impl Spatial {
    /// Combines the two axes into a spatial filter.
    ///
    /// Both axes must have the same shape: two ranges form a rectangle, two scalars one
    /// point, two lists of equal length a point list.
    pub fn from_coords(lat: Option<&Coord>, lon: Option<&Coord>) -> DaasResult<Spatial> {
        match (lat, lon) {
            (None, None) => Ok(Spatial::None),
            (Some(_), None) | (None, Some(_)) => Err(DaasError::InvalidSpatialShape(
                "latitude and longitude must be given together".to_string(),
            )),
            (Some(Coord::Range(a, b)), Some(Coord::Range(c, d))) => Ok(Spatial::Rect {
                min_lat: a.min(*b),
                max_lat: a.max(*b),
                min_lon: c.min(*d),
                max_lon: c.max(*d),
            }),
            (Some(Coord::Scalar(y)), Some(Coord::Scalar(x))) => Ok(Spatial::Points(vec![(*y, *x)])),
            (Some(Coord::List(ys)), Some(Coord::List(xs))) => {
                if ys.len() != xs.len() {
                    return Err(DaasError::InvalidSpatialShape(format!(
                        "{} latitudes but {} longitudes",
                        ys.len(),
                        xs.len()
                    )));
                }
                if ys.is_empty() {
                    return Err(DaasError::InvalidSpatialShape("empty point list".to_string()));
                }
                Ok(Spatial::Points(ys.iter().copied().zip(xs.iter().copied()).collect()))
            }
            (Some(lat), Some(lon)) => Err(DaasError::InvalidSpatialShape(format!(
                "latitude {:?} and longitude {:?} have different shapes",
                lat, lon
            ))),
        }
    }

    pub fn is_rect(&self) -> bool {
        matches!(self, Spatial::Rect { .. })
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Spatial::None)
    }

    /// `lat/lon` pairs joined with `,`.
    pub fn lat_lons(&self) -> Option<String> {
        match self {
            Spatial::Points(points) => Some(
                points
                    .iter()
                    .map(|(y, x)| format!("{}/{}", y, x))
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            _ => None,
        }
    }

    /// Adds the rectangle bounds to a parameter set; other shapes add nothing.
    pub fn apply_rect(&self, params: ParameterSet) -> ParameterSet {
        match self {
            Spatial::Rect {
                min_lat,
                max_lat,
                min_lon,
                max_lon,
            } => params
                .with("minLat", min_lat)
                .with("maxLat", max_lat)
                .with("minLon", min_lon)
                .with("maxLon", max_lon),
            _ => params,
        }
    }
}

/// Vertical level of a model grid request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Level {
    Value(f64),
    /// No level at all: sent as `levelType=-` without `fcstLevel`
    Absent,
}

impl Default for Level {
    fn default() -> Self {
        Level::Value(0.0)
    }
}

/// `t` moved by `hours`, or [`DaasError::InvalidTimeShape`] when the result leaves the
/// representable calendar.
pub fn add_hours(t: NaiveDateTime, hours: i64) -> DaasResult<NaiveDateTime> {
    Duration::try_hours(hours)
        .and_then(|d| t.checked_add_signed(d))
        .ok_or_else(|| {
            DaasError::InvalidTimeShape(format!("{} shifted by {}h is out of range", t, hours))
        })
}

/// Derives the missing member of `(inittime, fh, leadtime)`.
///
/// Returns the initial time and forecast offset to use for the call. `inittime` alone is
/// valid and means "no forecast offset" (observations). Any other combination with fewer
/// than two values is underspecified. A leadtime only combines with instants and
/// single forecast hours.
pub fn decode_leadtime(
    inittime: Option<&TimeSpec>,
    fh: Option<ForecastSpec>,
    leadtime: Option<NaiveDateTime>,
) -> DaasResult<(TimeSpec, Option<ForecastSpec>)> {
    match (inittime, fh, leadtime) {
        (Some(init), fh, None) => Ok((init.clone(), fh)),
        (Some(TimeSpec::Point(init)), None, Some(lead)) => {
            let delta = lead - *init;
            if delta.num_seconds() % 3600 != 0 {
                return Err(DaasError::InvalidTimeShape(format!(
                    "leadtime {} is not a whole number of hours after {}",
                    lead, init
                )));
            }
            Ok((TimeSpec::Point(*init), Some(ForecastSpec::Hours(delta.num_hours()))))
        }
        (Some(TimeSpec::Point(init)), Some(ForecastSpec::Hours(h)), Some(lead)) => {
            if add_hours(*init, h)? != lead {
                return Err(DaasError::InvalidTimeShape(format!(
                    "inittime {} + {}h does not match leadtime {}",
                    init, h, lead
                )));
            }
            Ok((TimeSpec::Point(*init), Some(ForecastSpec::Hours(h))))
        }
        (Some(init), _, Some(_)) => Err(DaasError::InvalidTimeShape(format!(
            "leadtime cannot be combined with inittime {} and this forecast offset",
            init
        ))),
        (None, Some(ForecastSpec::Hours(h)), Some(lead)) => {
            let init = h
                .checked_neg()
                .ok_or_else(|| DaasError::InvalidTimeShape(format!("forecast offset {}h is out of range", h)))
                .and_then(|back| add_hours(lead, back))?;
            Ok((TimeSpec::Point(init), Some(ForecastSpec::Hours(h))))
        }
        (None, Some(ForecastSpec::Range(..)), Some(_)) => Err(DaasError::InvalidTimeShape(
            "leadtime cannot be derived from a forecast hour range".to_string(),
        )),
        (None, _, _) => Err(DaasError::UnderspecifiedTime(
            "need inittime, or two of inittime, fh and leadtime".to_string(),
        )),
    }
}

/// Parameters of one remote call.
///
/// Built with a consuming builder so resolvers never share or mutate a map in place.
/// Keys are kept sorted, which is also the order the signature uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet(BTreeMap<String, String>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.0.insert(key.into(), value.to_string());
        self
    }

    pub fn with_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ParameterSet::new(), |params, (k, v)| params.with(k, v))
    }
}
