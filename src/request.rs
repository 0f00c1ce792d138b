//! # Request Expansion
//!
//! A [`SelectRequest`] names lists of values along five axes:
//! datasource, inittime, fh, varname and leadtime. Expansion takes their cartesian
//! product (datasource outermost, leadtime innermost) and produces one
//! [`AtomicRequest`] per combination. An empty axis contributes a single "unset" value.
//!
//! Everything that can be checked without the network is checked here: the spatial
//! shape, the lead-time decoding and the data source family. Any such error aborts the
//! whole selection.

use crate::config::ClientConfig;
use crate::error::{DaasError, DaasResult};
use crate::params::{Coord, ForecastSpec, Level, Spatial, TimeSpec, add_hours, decode_leadtime};
use crate::resolver::DataFamily;
use chrono::NaiveDateTime;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Auxiliary query options.
///
/// Each family reads the options it understands and ignores the rest:
///
/// | option | used by |
/// |---|---|
/// | `level_type` | model grid |
/// | `sta_ids` | surface, upper air, raw file |
/// | `admin_codes`, `index_col`, `ele_value_ranges`, `limit_cnt`, `order_by`, `data_province_id` | surface, upper air, severe weather (`admin_codes`: observations only) |
/// | `sta_levels` | surface |
/// | `distinct` | surface (plain element queries) |
/// | `stat_ele_value_ranges`, `hour_separate`, `min_separate` | surface statistics |
/// | `p_layers`, `h_layers` | upper air |
/// | `typhoon`, `typh_names`, `typh_cids`, `typh_gids`, `report_centers` | severe weather |
/// | `read_from_file`, `download` | every family, switches to raw file listing |
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modifiers {
    pub level_type: Option<String>,
    pub sta_ids: Option<String>,
    pub admin_codes: Option<String>,
    /// Comma separated columns requested alongside the variable and used as table index
    pub index_col: Option<String>,
    pub sta_levels: Option<String>,
    pub ele_value_ranges: Option<String>,
    pub limit_cnt: Option<u32>,
    pub order_by: Option<String>,
    pub data_province_id: Option<String>,
    pub stat_ele_value_ranges: Option<String>,
    pub hour_separate: Option<u32>,
    pub min_separate: Option<u32>,
    pub distinct: bool,
    pub p_layers: Option<String>,
    pub h_layers: Option<String>,
    pub report_centers: Option<String>,
    pub typh_names: Option<String>,
    pub typh_cids: Option<String>,
    pub typh_gids: Option<String>,
    /// Typhoon track query even without a name or id filter
    pub typhoon: bool,
    /// List the raw files instead of decoding elements
    pub read_from_file: bool,
    /// List the raw files and download them into this directory
    pub download: Option<PathBuf>,
}

impl Modifiers {
    pub fn wants_raw_files(&self) -> bool {
        self.read_from_file || self.download.is_some()
    }

    /// Index columns split on `,`.
    pub fn index_columns(&self) -> Vec<String> {
        self.index_col
            .as_deref()
            .map(|s| {
                s.split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A multi-dimensional query, expanded into atomic requests by [`SelectRequest::expand`].
///
/// ```rust
/// use daas_client::params::{Coord, ForecastSpec, parse_time};
/// use daas_client::request::SelectRequest;
///
/// let request = SelectRequest::new("ECMWF_P")
///     .inittime(parse_time("2023021912").unwrap())
///     .fhs([12, 24].map(ForecastSpec::Hours))
///     .varname("RHU")
///     .lat(Coord::Range(20.0, 40.0))
///     .lon(Coord::Range(110.0, 130.0));
/// assert_eq!(request.combination_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SelectRequest {
    pub datasource: Vec<String>,
    pub inittime: Vec<TimeSpec>,
    pub fh: Vec<ForecastSpec>,
    pub varname: Vec<String>,
    pub leadtime: Vec<NaiveDateTime>,
    pub lat: Option<Coord>,
    pub lon: Option<Coord>,
    pub level: Level,
    /// Merge the per-request results into one value
    pub merge: bool,
    pub modifiers: Modifiers,
}

impl SelectRequest {
    pub fn new(datasource: impl Into<String>) -> Self {
        SelectRequest {
            datasource: vec![datasource.into()],
            ..Default::default()
        }
    }

    pub fn datasource(mut self, datasource: impl Into<String>) -> Self {
        self.datasource.push(datasource.into());
        self
    }

    pub fn inittime(mut self, inittime: impl Into<TimeSpec>) -> Self {
        self.inittime.push(inittime.into());
        self
    }

    pub fn inittimes<I: IntoIterator<Item = TimeSpec>>(mut self, inittimes: I) -> Self {
        self.inittime.extend(inittimes);
        self
    }

    pub fn fh(mut self, fh: ForecastSpec) -> Self {
        self.fh.push(fh);
        self
    }

    pub fn fhs<I: IntoIterator<Item = ForecastSpec>>(mut self, fhs: I) -> Self {
        self.fh.extend(fhs);
        self
    }

    pub fn varname(mut self, varname: impl Into<String>) -> Self {
        self.varname.push(varname.into());
        self
    }

    pub fn varnames<I, S>(mut self, varnames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.varname.extend(varnames.into_iter().map(Into::into));
        self
    }

    pub fn leadtime(mut self, leadtime: NaiveDateTime) -> Self {
        self.leadtime.push(leadtime);
        self
    }

    pub fn lat(mut self, lat: Coord) -> Self {
        self.lat = Some(lat);
        self
    }

    pub fn lon(mut self, lon: Coord) -> Self {
        self.lon = Some(lon);
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }

    pub fn modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Number of atomic requests the expansion will produce.
    pub fn combination_count(&self) -> usize {
        [
            self.datasource.len(),
            self.inittime.len().max(1),
            self.fh.len().max(1),
            self.varname.len().max(1),
            self.leadtime.len().max(1),
        ]
        .iter()
        .product()
    }

    /// Expands the request into its atomic requests, in deterministic order.
    ///
    /// Data source aliases are resolved through `config`. The data source family of every
    /// combination is checked here so an unsupported code fails before anything is sent.
    pub fn expand(&self, config: &ClientConfig) -> DaasResult<Vec<AtomicRequest>> {
        if self.datasource.is_empty() {
            return Err(DaasError::EmptySelection("no data source given".to_string()));
        }
        let spatial = Spatial::from_coords(self.lat.as_ref(), self.lon.as_ref())?;
        let modifiers = Arc::new(self.modifiers.clone());

        let inittimes = axis(&self.inittime);
        let fhs = axis(&self.fh);
        let varnames = axis(&self.varname);
        let leadtimes = axis(&self.leadtime);

        let mut requests = Vec::with_capacity(self.combination_count());
        for datasource in &self.datasource {
            let data_code = config.resolve_alias(datasource).to_string();
            for inittime in &inittimes {
                for fh in &fhs {
                    for varname in &varnames {
                        for leadtime in &leadtimes {
                            let (inittime, fh) = decode_leadtime(*inittime, fh.copied(), leadtime.copied())?;
                            let request = AtomicRequest {
                                index: requests.len(),
                                datasource: datasource.clone(),
                                data_code: data_code.clone(),
                                inittime,
                                fh,
                                varname: varname.cloned(),
                                leadtime: leadtime.copied(),
                                spatial: spatial.clone(),
                                level: self.level,
                                modifiers: Arc::clone(&modifiers),
                            };
                            DataFamily::for_request(&request)?;
                            requests.push(request);
                        }
                    }
                }
            }
        }
        Ok(requests)
    }

    /// Number of distinct initial times named by the request.
    pub fn inittime_count(&self) -> usize {
        self.inittime.len()
    }
}

fn axis<T>(values: &[T]) -> Vec<Option<&T>> {
    if values.is_empty() {
        vec![None]
    } else {
        values.iter().map(Some).collect()
    }
}

/// One remote query: a single combination of the request axes.
#[derive(Debug, Clone)]
pub struct AtomicRequest {
    /// Position in expansion order
    pub index: usize,
    /// Data source as the caller named it
    pub datasource: String,
    /// Data code after alias resolution
    pub data_code: String,
    pub inittime: TimeSpec,
    pub fh: Option<ForecastSpec>,
    pub varname: Option<String>,
    pub leadtime: Option<NaiveDateTime>,
    pub spatial: Spatial,
    pub level: Level,
    pub modifiers: Arc<Modifiers>,
}

impl AtomicRequest {
    /// Upper-cased data code prefix before the first `_`.
    pub fn family_prefix(&self) -> String {
        self.data_code
            .split('_')
            .next()
            .unwrap_or_default()
            .to_uppercase()
    }

    /// Valid time of a point request: inittime plus the forecast hour, if any.
    ///
    /// `Ok(None)` for ranges and raw times; an offset past the calendar is an error.
    pub fn valid_time(&self) -> DaasResult<Option<NaiveDateTime>> {
        let Some(init) = self.inittime.point() else {
            return Ok(None);
        };
        match self.fh {
            Some(ForecastSpec::Hours(h)) => add_hours(init, h).map(Some),
            _ => Ok(Some(init)),
        }
    }

    pub fn varname_or_empty(&self) -> &str {
        self.varname.as_deref().unwrap_or("")
    }
}

impl fmt::Display for AtomicRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} time={}", self.index, self.data_code, self.inittime)?;
        if let Some(fh) = self.fh {
            write!(f, " fh={}", fh)?;
        }
        if let Some(var) = &self.varname {
            write!(f, " var={}", var)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::parse_time;

    fn config() -> ClientConfig {
        let mut config = ClientConfig::new("host", "node");
        config
            .alias
            .insert("ECMWF_P".to_string(), "NAFP_ECMF_FTM_HIGH_ANEA_FOR".to_string());
        config
    }

    fn t(s: &str) -> NaiveDateTime {
        parse_time(s).unwrap()
    }

    #[test]
    fn test_expansion_count_and_order() {
        let request = SelectRequest::new("ECMWF_P")
            .datasource("NAFP_CMA_GFS")
            .inittimes([TimeSpec::Point(t("2023021900")), TimeSpec::Point(t("2023021912"))])
            .fhs([ForecastSpec::Hours(12), ForecastSpec::Hours(24), ForecastSpec::Hours(36)])
            .varname("TEM");

        let atoms = request.expand(&config()).unwrap();
        assert_eq!(atoms.len(), 12);
        assert_eq!(request.combination_count(), 12);

        for (i, atom) in atoms.iter().enumerate() {
            assert_eq!(atom.index, i);
        }
        assert_eq!(atoms[0].data_code, "NAFP_ECMF_FTM_HIGH_ANEA_FOR");
        assert_eq!(atoms[0].fh, Some(ForecastSpec::Hours(12)));
        assert_eq!(atoms[2].fh, Some(ForecastSpec::Hours(36)));
        assert_eq!(atoms[3].inittime, TimeSpec::Point(t("2023021912")));
        assert_eq!(atoms[6].data_code, "NAFP_CMA_GFS");
    }

    #[test]
    fn test_leadtime_axis_is_innermost() {
        let request = SelectRequest::new("SURF_CHN_MUL_HOR")
            .fh(ForecastSpec::Hours(6))
            .leadtime(t("2023021912"))
            .leadtime(t("2023021918"))
            .varname("PRE_1H");

        let atoms = request.expand(&config()).unwrap();
        assert_eq!(atoms.len(), 2);
        assert_eq!(atoms[0].inittime, TimeSpec::Point(t("2023021906")));
        assert_eq!(atoms[1].inittime, TimeSpec::Point(t("2023021912")));
    }

    #[test]
    fn test_pre_send_errors_abort() {
        let no_time = SelectRequest::new("NAFP_X").varname("TEM");
        assert!(matches!(no_time.expand(&config()), Err(DaasError::UnderspecifiedTime(_))));

        let bad_family = SelectRequest::new("RADA_X").inittime(t("2023021912"));
        assert!(matches!(
            bad_family.expand(&config()),
            Err(DaasError::UnsupportedDataSourceFamily(_))
        ));

        let half_spatial = SelectRequest::new("NAFP_X")
            .inittime(t("2023021912"))
            .lat(Coord::Scalar(30.0));
        assert!(matches!(
            half_spatial.expand(&config()),
            Err(DaasError::InvalidSpatialShape(_))
        ));

        let empty = SelectRequest::default();
        assert!(matches!(empty.expand(&config()), Err(DaasError::EmptySelection(_))));
    }

    #[test]
    fn test_valid_time() {
        let atoms = SelectRequest::new("NAFP_X")
            .inittime(t("2023021912"))
            .fh(ForecastSpec::Hours(24))
            .expand(&config())
            .unwrap();
        assert_eq!(atoms[0].valid_time().unwrap(), Some(t("2023022012")));
        assert_eq!(atoms[0].family_prefix(), "NAFP");
        assert_eq!(atoms[0].to_string(), "#0 NAFP_X time=20230219120000 fh=24");

        let ranged = SelectRequest::new("SURF_X")
            .inittime(TimeSpec::Range(t("2023021900"), t("2023021912")))
            .expand(&config())
            .unwrap();
        assert_eq!(ranged[0].valid_time().unwrap(), None);

        let far = SelectRequest::new("NAFP_X")
            .inittime(t("2023021912"))
            .fh(ForecastSpec::Hours(i64::MAX))
            .expand(&config())
            .unwrap();
        assert!(matches!(far[0].valid_time(), Err(DaasError::InvalidTimeShape(_))));
    }

    #[test]
    fn test_index_columns() {
        let modifiers = Modifiers {
            index_col: Some("Station_Name, Datetime".to_string()),
            ..Default::default()
        };
        assert_eq!(modifiers.index_columns(), vec!["Station_Name", "Datetime"]);
        assert!(!modifiers.wants_raw_files());
    }
}
