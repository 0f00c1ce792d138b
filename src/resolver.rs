//! # Interface Resolver
//!
//! Maps an [`AtomicRequest`] onto a remote interface name, its parameters and the
//! response shape to decode. Interface names are assembled from tokens in a fixed order:
//!
//! ```text
//! base → [GridInRect | AtPoint | Grid | InRect | InRegion] → ByTime[Range]
//!      → [AndLevel] → [AndStaID | ByStaID | AndValidtime[Range] | AndPress | AndHeight]
//! ```
//!
//! The data source family is chosen from the data code prefix:
//!
//! | prefix | family |
//! |---|---|
//! | `NAFP` | model grid |
//! | `SURF` | surface observation (`SURF_CMPA*` are gridded analyses) |
//! | `UPAR` | upper-air observation |
//! | `SEVP` | severe weather / typhoon |
//!
//! Requests flagged with `read_from_file` or `download` resolve to the raw file listing
//! of their family instead.

use crate::error::{DaasError, DaasResult};
use crate::params::{ForecastSpec, Level, ParameterSet, Spatial, TimeSpec, format_time};
use crate::request::{AtomicRequest, Modifiers};
use chrono::NaiveDateTime;
use std::fmt;
use std::path::PathBuf;

/// The single ensemble product served one member per call.
pub const ENSEMBLE_DATA_CODE: &str = "NAFP_C3E_FOR_FTM_LOW_ASI";
/// Control forecast plus 50 perturbed members.
pub const ENSEMBLE_MEMBERS: i32 = 51;

const STATS_PREFIXES: [&str; 5] = ["SUM_", "MAX_", "MIN_", "AVG_", "COUNT_"];

/// Decoding shape of a response, tied to the remote method that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseShape {
    Table,
    GridArray,
    GridScalar,
    GridVector,
    FileList,
}

impl ResponseShape {
    /// Remote method name sent with the call.
    pub fn method(self) -> &'static str {
        match self {
            ResponseShape::Table => "callAPI_to_array2D",
            ResponseShape::GridArray => "callAPI_to_gridArray2D",
            ResponseShape::GridScalar => "callAPI_to_gridScalar2D",
            ResponseShape::GridVector => "callAPI_to_gridVector2D",
            ResponseShape::FileList => "callAPI_to_fileList",
        }
    }
}

impl fmt::Display for ResponseShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method())
    }
}

/// Labels the decoder attaches to the result of a call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeContext {
    /// Variable name of gridded results
    pub name: String,
    pub inittime: Option<NaiveDateTime>,
    /// Time coordinate of gridded results
    pub valid_time: Option<NaiveDateTime>,
    /// Table index columns
    pub index_col: Vec<String>,
    /// Raw files are downloaded here when set
    pub download_dir: Option<PathBuf>,
}

/// Everything needed to send and decode one atomic request
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCall {
    pub interface: String,
    pub params: ParameterSet,
    pub shape: ResponseShape,
    /// Number of ensemble members fetched one call each, `fcstLevel` carrying the member
    pub members: Option<i32>,
    pub context: DecodeContext,
}

/// Trait implemented by every data source family
pub trait InterfaceResolver {
    fn resolve(&self, request: &AtomicRequest) -> DaasResult<ResolvedCall>;
}

/// Data source families as a closed set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFamily {
    ModelGrid(ModelGridResolver),
    Surface(ObservationResolver),
    UpperAir(ObservationResolver),
    SevereWeather(SevereWeatherResolver),
    RawFile(RawFileResolver),
}

impl DataFamily {
    /// Selects the family for a request from its data code prefix and modifiers.
    ///
    /// # Errors
    /// `UnsupportedDataSourceFamily` for prefixes outside `NAFP`, `SURF`, `UPAR`, `SEVP`.
    pub fn for_request(request: &AtomicRequest) -> DaasResult<DataFamily> {
        let family = match request.family_prefix().as_str() {
            "NAFP" => DataFamily::ModelGrid(ModelGridResolver),
            "SURF" => DataFamily::Surface(ObservationResolver::new(ObservationKind::Surface)),
            "UPAR" => DataFamily::UpperAir(ObservationResolver::new(ObservationKind::UpperAir)),
            "SEVP" => DataFamily::SevereWeather(SevereWeatherResolver),
            _ => {
                return Err(DaasError::UnsupportedDataSourceFamily(
                    request.data_code.clone(),
                ));
            }
        };
        if request.modifiers.wants_raw_files() {
            return Ok(DataFamily::RawFile(RawFileResolver));
        }
        Ok(family)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataFamily::ModelGrid(_) => "model grid",
            DataFamily::Surface(_) => "surface",
            DataFamily::UpperAir(_) => "upper air",
            DataFamily::SevereWeather(_) => "severe weather",
            DataFamily::RawFile(_) => "raw file",
        }
    }
}

impl InterfaceResolver for DataFamily {
    fn resolve(&self, request: &AtomicRequest) -> DaasResult<ResolvedCall> {
        match self {
            DataFamily::ModelGrid(r) => r.resolve(request),
            DataFamily::Surface(r) | DataFamily::UpperAir(r) => r.resolve(request),
            DataFamily::SevereWeather(r) => r.resolve(request),
            DataFamily::RawFile(r) => r.resolve(request),
        }
    }
}

/// Resolves a request through its family.
pub fn resolve(request: &AtomicRequest) -> DaasResult<ResolvedCall> {
    DataFamily::for_request(request)?.resolve(request)
}

fn require_varname(request: &AtomicRequest) -> DaasResult<&str> {
    request
        .varname
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            DaasError::EmptySelection(format!("{} needs a variable name", request.data_code))
        })
}

fn require_point(request: &AtomicRequest, what: &str) -> DaasResult<NaiveDateTime> {
    request.inittime.point().ok_or_else(|| {
        DaasError::InvalidTimeShape(format!(
            "{} needs a single time, got {}",
            what, request.inittime
        ))
    })
}

/// Grid spatial token shared by model grids and gridded analyses.
fn grid_spatial(
    interface: &mut String,
    spatial: &Spatial,
    params: ParameterSet,
) -> (ParameterSet, ResponseShape) {
    match spatial {
        Spatial::Rect { .. } => {
            interface.push_str("GridInRect");
            (spatial.apply_rect(params), ResponseShape::GridArray)
        }
        Spatial::Points(_) => {
            interface.push_str("AtPoint");
            (
                params.with_opt("latLons", spatial.lat_lons()),
                ResponseShape::Table,
            )
        }
        Spatial::None => {
            interface.push_str("Grid");
            (params, ResponseShape::GridArray)
        }
    }
}

/// Model grid family (`NAFP`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelGridResolver;

impl InterfaceResolver for ModelGridResolver {
    fn resolve(&self, request: &AtomicRequest) -> DaasResult<ResolvedCall> {
        let var = require_varname(request)?;
        let init = require_point(request, "model grid query")?;
        let code = request.data_code.as_str();

        let mut interface = if code.starts_with("NAFP_GRID_ANA") {
            "getNafpAnaEle".to_string()
        } else {
            "getNafpEle".to_string()
        };
        let mut params = ParameterSet::new()
            .with("dataCode", code)
            .with("time", format_time(&init))
            .with("fcstEle", var);

        params = match request.level {
            Level::Absent => params.with("levelType", "-"),
            Level::Value(level) => {
                let default_type = if level == 0.0 { "1" } else { "100" };
                let level_type = request
                    .modifiers
                    .level_type
                    .clone()
                    .unwrap_or_else(|| default_type.to_string());
                params.with("levelType", level_type).with("fcstLevel", level)
            }
        };

        let (mut params, shape) = grid_spatial(&mut interface, &request.spatial, params);
        interface.push_str("ByTimeAndLevel");

        match request.fh {
            Some(ForecastSpec::Range(min, max)) => {
                interface.push_str("AndValidtimeRange");
                params = params.with("minVT", min).with("maxVT", max);
            }
            Some(ForecastSpec::Hours(h)) => {
                interface.push_str("AndValidtime");
                params = params.with("validTime", h);
            }
            None => {}
        }

        let members = (code == ENSEMBLE_DATA_CODE && shape == ResponseShape::GridArray)
            .then_some(ENSEMBLE_MEMBERS);

        Ok(ResolvedCall {
            interface,
            params,
            shape,
            members,
            context: DecodeContext {
                name: var.to_string(),
                inittime: Some(init),
                valid_time: request.valid_time()?,
                ..Default::default()
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationKind {
    Surface,
    UpperAir,
}

impl ObservationKind {
    fn token(self) -> &'static str {
        match self {
            ObservationKind::Surface => "Surf",
            ObservationKind::UpperAir => "Upar",
        }
    }
}

/// Station observation families (`SURF`, `UPAR`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationResolver {
    kind: ObservationKind,
}

impl ObservationResolver {
    pub fn new(kind: ObservationKind) -> Self {
        ObservationResolver { kind }
    }

    pub fn kind(&self) -> ObservationKind {
        self.kind
    }

    /// Gridded surface analyses (`SURF_CMPA*`).
    fn resolve_grid(&self, request: &AtomicRequest) -> DaasResult<ResolvedCall> {
        let var = require_varname(request)?;
        let time = require_point(request, "gridded analysis query")?;
        let mut interface = "getSurfEle".to_string();
        let params = ParameterSet::new()
            .with("dataCode", &request.data_code)
            .with("time", format_time(&time))
            .with("fcstEle", var);
        let (params, shape) = grid_spatial(&mut interface, &request.spatial, params);
        interface.push_str("ByTime");

        Ok(ResolvedCall {
            interface,
            params,
            shape,
            members: None,
            context: DecodeContext {
                name: var.to_string(),
                valid_time: Some(time),
                ..Default::default()
            },
        })
    }

    fn options(&self, stats: bool, m: &Modifiers, params: ParameterSet) -> ParameterSet {
        let params = params
            .with_opt("eleValueRanges", m.ele_value_ranges.as_ref())
            .with_opt("limitCnt", m.limit_cnt)
            .with_opt("orderBy", m.order_by.as_ref())
            .with_opt("dataProvinceId", m.data_province_id.as_ref());
        match (self.kind, stats) {
            (ObservationKind::Surface, false) => params
                .with_opt("staLevels", m.sta_levels.as_ref())
                .with_opt("distinct", m.distinct.then_some("true")),
            (ObservationKind::Surface, true) => params
                .with_opt("staLevels", m.sta_levels.as_ref())
                .with_opt("statEleValueRanges", m.stat_ele_value_ranges.as_ref())
                .with_opt("hourSeparate", m.hour_separate)
                .with_opt("minSeparate", m.min_separate),
            (ObservationKind::UpperAir, false) => params,
            (ObservationKind::UpperAir, true) => params
                .with_opt("statEleValueRanges", m.stat_ele_value_ranges.as_ref())
                .with_opt("hourSeparate", m.hour_separate)
                .with_opt("minSeparate", m.min_separate),
        }
    }
}

impl InterfaceResolver for ObservationResolver {
    fn resolve(&self, request: &AtomicRequest) -> DaasResult<ResolvedCall> {
        if self.kind == ObservationKind::Surface && request.data_code.starts_with("SURF_CMPA") {
            return self.resolve_grid(request);
        }

        let var = require_varname(request)?;
        let m = request.modifiers.as_ref();

        if m.sta_ids.is_some() && (request.spatial.is_rect() || m.admin_codes.is_some()) {
            return Err(DaasError::ConflictingSpatialFilter(
                "station ids cannot be combined with a rectangle or region".to_string(),
            ));
        }
        if let Spatial::Points(_) = request.spatial {
            return Err(DaasError::InvalidSpatialShape(
                "station observations take a latitude/longitude range, not points".to_string(),
            ));
        }

        let stats = STATS_PREFIXES.iter().any(|p| var.starts_with(p));
        let token = self.kind.token();
        let (mut interface, mut params) = if stats {
            (
                format!("stat{}Ele", token),
                ParameterSet::new()
                    .with_opt("elements", m.index_col.as_ref())
                    .with("statEles", var),
            )
        } else {
            let elements = match &m.index_col {
                Some(index) => format!("{},{}", var, index),
                None => var.to_string(),
            };
            (
                format!("get{}Ele", token),
                ParameterSet::new().with("elements", elements),
            )
        };
        params = params.with("dataCode", &request.data_code);

        if request.spatial.is_rect() {
            interface.push_str("InRect");
            params = request.spatial.apply_rect(params);
        } else if let Some(codes) = &m.admin_codes {
            interface.push_str("InRegion");
            params = params.with("adminCodes", codes);
        }

        match &request.inittime {
            TimeSpec::Range(..) => {
                if !stats {
                    interface.push_str("ByTimeRange");
                }
                params = params.with("timeRange", request.inittime.to_wire());
            }
            other => {
                interface.push_str("ByTime");
                params = params.with("times", other.to_wire());
            }
        }

        if let Some(ids) = &m.sta_ids {
            interface.push_str(if stats { "ByStaID" } else { "AndStaID" });
            params = params.with("staIds", ids);
        }

        if self.kind == ObservationKind::UpperAir {
            if let Some(layers) = &m.p_layers {
                interface.push_str("AndPress");
                params = params.with("pLayers", layers);
            } else if let Some(layers) = &m.h_layers {
                interface.push_str("AndHeight");
                params = params.with("hLayers", layers);
            }
        }

        let params = self.options(stats, m, params);
        Ok(ResolvedCall {
            interface,
            params,
            shape: ResponseShape::Table,
            members: None,
            context: DecodeContext {
                name: var.to_string(),
                index_col: m.index_columns(),
                ..Default::default()
            },
        })
    }
}

/// Typhoon track filter, highest priority first
#[derive(Debug, Clone, PartialEq, Eq)]
enum TyphoonFilter<'a> {
    Names(&'a str),
    CenterIds(&'a str),
    GroupIds(&'a str),
    Track,
}

impl<'a> TyphoonFilter<'a> {
    fn from_modifiers(m: &'a Modifiers) -> Option<Self> {
        match (&m.typh_names, &m.typh_cids, &m.typh_gids) {
            (Some(names), _, _) => Some(TyphoonFilter::Names(names)),
            (None, Some(cids), _) => Some(TyphoonFilter::CenterIds(cids)),
            (None, None, Some(gids)) => Some(TyphoonFilter::GroupIds(gids)),
            (None, None, None) if m.typhoon => Some(TyphoonFilter::Track),
            (None, None, None) => None,
        }
    }

    fn apply(&self, params: ParameterSet) -> (&'static str, ParameterSet) {
        match self {
            TyphoonFilter::Names(v) => ("getTyphByTimeRangeAndTyphNames", params.with("typhNames", v)),
            TyphoonFilter::CenterIds(v) => ("getTyphByTimeRangeAndTyphCids", params.with("typhCIds", v)),
            TyphoonFilter::GroupIds(v) => ("getTyphByTimeRangeAndTyphGids", params.with("typhGIds", v)),
            TyphoonFilter::Track => ("getTyphByTimeRange", params),
        }
    }
}

/// Severe weather and typhoon family (`SEVP`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SevereWeatherResolver;

impl InterfaceResolver for SevereWeatherResolver {
    fn resolve(&self, request: &AtomicRequest) -> DaasResult<ResolvedCall> {
        let var = require_varname(request)?;
        let m = request.modifiers.as_ref();
        let elements = match &m.index_col {
            Some(index) => format!("{},{}", var, index),
            None => var.to_string(),
        };
        let params = ParameterSet::new()
            .with("dataCode", &request.data_code)
            .with("elements", elements);

        let (interface, params) = match &request.inittime {
            TimeSpec::Range(..) => {
                let params = params.with("timeRange", request.inittime.to_wire());
                match TyphoonFilter::from_modifiers(m) {
                    Some(filter) => {
                        let (interface, params) = filter.apply(params);
                        (
                            interface.to_string(),
                            params.with_opt("reportCenters", m.report_centers.as_ref()),
                        )
                    }
                    None => ("getSevpEleByTimeRange".to_string(), params),
                }
            }
            other => (
                "getSevpEleByTime".to_string(),
                params.with("times", other.to_wire()),
            ),
        };

        let params = params
            .with_opt("eleValueRanges", m.ele_value_ranges.as_ref())
            .with_opt("limitCnt", m.limit_cnt)
            .with_opt("orderBy", m.order_by.as_ref())
            .with_opt("dataProvinceId", m.data_province_id.as_ref());

        Ok(ResolvedCall {
            interface,
            params,
            shape: ResponseShape::Table,
            members: None,
            context: DecodeContext {
                name: var.to_string(),
                index_col: m.index_columns(),
                ..Default::default()
            },
        })
    }
}

/// Raw file listing of any family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawFileResolver;

impl InterfaceResolver for RawFileResolver {
    fn resolve(&self, request: &AtomicRequest) -> DaasResult<ResolvedCall> {
        let prefix = request.family_prefix().to_lowercase();
        let mut chars = prefix.chars();
        let capitalized: String = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };

        let mut interface = format!("get{}File", capitalized);
        let mut params = ParameterSet::new().with("dataCode", &request.data_code);
        match &request.inittime {
            TimeSpec::Range(..) => {
                interface.push_str("ByTimeRange");
                params = params.with("timeRange", request.inittime.to_wire());
            }
            other => {
                interface.push_str("ByTime");
                params = params.with("time", other.to_wire());
            }
        }
        if let Some(ids) = &request.modifiers.sta_ids {
            interface.push_str("AndStaID");
            params = params.with("staIds", ids);
        }

        Ok(ResolvedCall {
            interface,
            params,
            shape: ResponseShape::FileList,
            members: None,
            context: DecodeContext {
                name: request.varname_or_empty().to_string(),
                inittime: request.inittime.point(),
                download_dir: request.modifiers.download.clone(),
                ..Default::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::params::{Coord, parse_time};
    use crate::request::SelectRequest;

    fn t(s: &str) -> NaiveDateTime {
        parse_time(s).unwrap()
    }

    fn atom(request: SelectRequest) -> AtomicRequest {
        request
            .expand(&ClientConfig::new("host", "node"))
            .unwrap()
            .remove(0)
    }

    fn surf(modifiers: Modifiers) -> SelectRequest {
        SelectRequest::new("SURF_CHN_MUL_HOR")
            .inittime(TimeSpec::Range(t("2023021912"), t("2023022012")))
            .varname("PRE_1H")
            .modifiers(modifiers)
    }

    #[test]
    fn test_model_grid_default_level_and_fh() {
        let call = resolve(&atom(
            SelectRequest::new("NAFP_ECMF_FTM_HIGH_ANEA_FOR")
                .inittime(t("2023021912"))
                .fh(ForecastSpec::Hours(24))
                .varname("TEM"),
        ))
        .unwrap();

        assert_eq!(call.interface, "getNafpEleGridByTimeAndLevelAndValidtime");
        assert_eq!(call.shape, ResponseShape::GridArray);
        assert_eq!(call.params.get("levelType"), Some("1"));
        assert_eq!(call.params.get("fcstLevel"), Some("0"));
        assert_eq!(call.params.get("validTime"), Some("24"));
        assert_eq!(call.params.get("time"), Some("20230219120000"));
        assert_eq!(call.context.valid_time, Some(t("2023022012")));
        assert_eq!(call.members, None);
    }

    #[test]
    fn test_model_grid_rect_and_level() {
        let call = resolve(&atom(
            SelectRequest::new("NAFP_ECMF_FTM_HIGH_ANEA_FOR")
                .inittime(t("2023021912"))
                .fh(ForecastSpec::Range(0, 72))
                .varname("RHU")
                .level(Level::Value(500.0))
                .lat(Coord::Range(20.0, 40.0))
                .lon(Coord::Range(110.0, 130.0)),
        ))
        .unwrap();

        assert_eq!(call.interface, "getNafpEleGridInRectByTimeAndLevelAndValidtimeRange");
        assert_eq!(call.params.get("levelType"), Some("100"));
        assert_eq!(call.params.get("fcstLevel"), Some("500"));
        assert_eq!(call.params.get("minVT"), Some("0"));
        assert_eq!(call.params.get("maxVT"), Some("72"));
        assert_eq!(call.params.get("minLat"), Some("20"));
        assert_eq!(call.params.get("maxLon"), Some("130"));
    }

    #[test]
    fn test_model_grid_points_use_table_shape() {
        let call = resolve(&atom(
            SelectRequest::new("NAFP_GRID_ANA_X")
                .inittime(t("2023021912"))
                .varname("TEM")
                .level(Level::Absent)
                .lat(Coord::List(vec![30.0, 40.0]))
                .lon(Coord::List(vec![120.0, 130.0])),
        ))
        .unwrap();

        assert_eq!(call.interface, "getNafpAnaEleAtPointByTimeAndLevel");
        assert_eq!(call.shape, ResponseShape::Table);
        assert_eq!(call.params.get("latLons"), Some("30/120,40/130"));
        assert_eq!(call.params.get("levelType"), Some("-"));
        assert!(!call.params.contains_key("fcstLevel"));
    }

    #[test]
    fn test_level_type_override() {
        let call = resolve(&atom(
            SelectRequest::new("NAFP_X")
                .inittime(t("2023021912"))
                .varname("TEM")
                .level(Level::Value(2.0))
                .modifiers(Modifiers {
                    level_type: Some("103".to_string()),
                    ..Default::default()
                }),
        ))
        .unwrap();
        assert_eq!(call.params.get("levelType"), Some("103"));
    }

    #[test]
    fn test_ensemble_members() {
        let call = resolve(&atom(
            SelectRequest::new(ENSEMBLE_DATA_CODE)
                .inittime(t("2023021912"))
                .fh(ForecastSpec::Hours(24))
                .varname("TEM"),
        ))
        .unwrap();
        assert_eq!(call.members, Some(51));
    }

    #[test]
    fn test_model_grid_requires_point_time() {
        let err = resolve(&atom(
            SelectRequest::new("NAFP_X")
                .inittime(TimeSpec::Range(t("2023021900"), t("2023021912")))
                .varname("TEM"),
        ))
        .unwrap_err();
        assert!(matches!(err, DaasError::InvalidTimeShape(_)));
    }

    #[test]
    fn test_model_grid_offset_out_of_range() {
        let err = resolve(&atom(
            SelectRequest::new("NAFP_X")
                .inittime(t("2023021912"))
                .fh(ForecastSpec::Hours(99_999_999_999_999))
                .varname("TEM"),
        ))
        .unwrap_err();
        assert!(matches!(err, DaasError::InvalidTimeShape(_)));
    }

    #[test]
    fn test_surface_time_range_with_stations() {
        let call = resolve(&atom(surf(Modifiers {
            sta_ids: Some("58457".to_string()),
            index_col: Some("Station_Name".to_string()),
            limit_cnt: Some(100),
            distinct: true,
            ..Default::default()
        })))
        .unwrap();

        assert_eq!(call.interface, "getSurfEleByTimeRangeAndStaID");
        assert_eq!(call.params.get("elements"), Some("PRE_1H,Station_Name"));
        assert_eq!(call.params.get("timeRange"), Some("[20230219120000,20230220120000]"));
        assert_eq!(call.params.get("staIds"), Some("58457"));
        assert_eq!(call.params.get("limitCnt"), Some("100"));
        assert_eq!(call.params.get("distinct"), Some("true"));
        assert_eq!(call.context.index_col, vec!["Station_Name"]);
    }

    #[test]
    fn test_surface_region_point_time() {
        let call = resolve(&atom(
            SelectRequest::new("SURF_CHN_MUL_HOR")
                .inittime(t("2023021912"))
                .varname("PRE_1H")
                .modifiers(Modifiers {
                    admin_codes: Some("330000".to_string()),
                    ..Default::default()
                }),
        ))
        .unwrap();
        assert_eq!(call.interface, "getSurfEleInRegionByTime");
        assert_eq!(call.params.get("times"), Some("20230219120000"));
        assert_eq!(call.params.get("adminCodes"), Some("330000"));
    }

    #[test]
    fn test_surface_statistics() {
        let call = resolve(&atom(
            SelectRequest::new("SURF_CHN_MUL_HOR")
                .inittime(TimeSpec::Range(t("2023021912"), t("2023022012")))
                .varname("SUM_PRE_1H")
                .lat(Coord::Range(27.0, 31.0))
                .lon(Coord::Range(118.0, 123.0))
                .modifiers(Modifiers {
                    index_col: Some("Station_Id_C".to_string()),
                    hour_separate: Some(24),
                    distinct: true,
                    ..Default::default()
                }),
        ))
        .unwrap();

        assert_eq!(call.interface, "statSurfEleInRect");
        assert_eq!(call.params.get("statEles"), Some("SUM_PRE_1H"));
        assert_eq!(call.params.get("elements"), Some("Station_Id_C"));
        assert_eq!(call.params.get("hourSeparate"), Some("24"));
        assert!(!call.params.contains_key("distinct"));
    }

    #[test]
    fn test_statistics_with_stations_use_by_sta_id() {
        let call = resolve(&atom(
            SelectRequest::new("SURF_CHN_MUL_HOR")
                .inittime(t("2023021912"))
                .varname("MAX_TEM")
                .modifiers(Modifiers {
                    sta_ids: Some("58457,58238".to_string()),
                    ..Default::default()
                }),
        ))
        .unwrap();
        assert_eq!(call.interface, "statSurfEleByTimeByStaID");
    }

    #[test]
    fn test_station_ids_conflict_with_rect() {
        let err = resolve(&atom(
            surf(Modifiers {
                sta_ids: Some("58457".to_string()),
                ..Default::default()
            })
            .lat(Coord::Range(27.0, 31.0))
            .lon(Coord::Range(118.0, 123.0)),
        ))
        .unwrap_err();
        assert!(matches!(err, DaasError::ConflictingSpatialFilter(_)));

        let err = resolve(&atom(surf(Modifiers {
            sta_ids: Some("58457".to_string()),
            admin_codes: Some("330000".to_string()),
            ..Default::default()
        })))
        .unwrap_err();
        assert!(matches!(err, DaasError::ConflictingSpatialFilter(_)));
    }

    #[test]
    fn test_gridded_surface_analysis() {
        let call = resolve(&atom(
            SelectRequest::new("SURF_CMPA_FRT_5KM_1H")
                .inittime(t("2023021912"))
                .varname("PRE")
                .lat(Coord::Range(20.0, 40.0))
                .lon(Coord::Range(110.0, 130.0)),
        ))
        .unwrap();
        assert_eq!(call.interface, "getSurfEleGridInRectByTime");
        assert_eq!(call.shape, ResponseShape::GridArray);
        assert_eq!(call.params.get("fcstEle"), Some("PRE"));
    }

    #[test]
    fn test_upper_air_layers() {
        let call = resolve(&atom(
            SelectRequest::new("UPAR_CHN_MUL_FTM")
                .inittime(t("2023021912"))
                .varname("TEM")
                .modifiers(Modifiers {
                    sta_ids: Some("54511".to_string()),
                    p_layers: Some("500,850".to_string()),
                    h_layers: Some("1000".to_string()),
                    sta_levels: Some("011".to_string()),
                    ..Default::default()
                }),
        ))
        .unwrap();
        assert_eq!(call.interface, "getUparEleByTimeAndStaIDAndPress");
        assert_eq!(call.params.get("pLayers"), Some("500,850"));
        assert!(!call.params.contains_key("hLayers"));
        assert!(!call.params.contains_key("staLevels"));
    }

    #[test]
    fn test_typhoon_priority() {
        let base = || {
            SelectRequest::new("SEVP_ZJ_WEFC_TYP_WT")
                .inittime(TimeSpec::Range(t("2023072612"), t("2023072912")))
                .varname("Datetime,TYPH_Name")
        };

        let call = resolve(&atom(base().modifiers(Modifiers {
            typh_names: Some("DOKSURI".to_string()),
            typh_cids: Some("2305".to_string()),
            report_centers: Some("BABJ".to_string()),
            ..Default::default()
        })))
        .unwrap();
        assert_eq!(call.interface, "getTyphByTimeRangeAndTyphNames");
        assert_eq!(call.params.get("typhNames"), Some("DOKSURI"));
        assert!(!call.params.contains_key("typhCIds"));
        assert_eq!(call.params.get("reportCenters"), Some("BABJ"));

        let call = resolve(&atom(base().modifiers(Modifiers {
            typh_cids: Some("2305".to_string()),
            typh_gids: Some("5".to_string()),
            ..Default::default()
        })))
        .unwrap();
        assert_eq!(call.interface, "getTyphByTimeRangeAndTyphCids");

        let call = resolve(&atom(base().modifiers(Modifiers {
            typh_gids: Some("5".to_string()),
            ..Default::default()
        })))
        .unwrap();
        assert_eq!(call.interface, "getTyphByTimeRangeAndTyphGids");

        let call = resolve(&atom(base().modifiers(Modifiers {
            typhoon: true,
            ..Default::default()
        })))
        .unwrap();
        assert_eq!(call.interface, "getTyphByTimeRange");

        let call = resolve(&atom(base())).unwrap();
        assert_eq!(call.interface, "getSevpEleByTimeRange");
    }

    #[test]
    fn test_raw_file_listing() {
        let call = resolve(&atom(
            SelectRequest::new("NAFP_CMA_SH3")
                .inittime(t("2023021912"))
                .modifiers(Modifiers {
                    download: Some(PathBuf::from("/tmp/sh3")),
                    sta_ids: Some("1".to_string()),
                    ..Default::default()
                }),
        ))
        .unwrap();
        assert_eq!(call.interface, "getNafpFileByTimeAndStaID");
        assert_eq!(call.shape, ResponseShape::FileList);
        assert_eq!(call.params.get("time"), Some("20230219120000"));
        assert_eq!(call.context.download_dir, Some(PathBuf::from("/tmp/sh3")));

        let call = resolve(&atom(surf(Modifiers {
            read_from_file: true,
            ..Default::default()
        })))
        .unwrap();
        assert_eq!(call.interface, "getSurfFileByTimeRange");
    }

    #[test]
    fn test_shape_methods() {
        assert_eq!(ResponseShape::Table.method(), "callAPI_to_array2D");
        assert_eq!(ResponseShape::GridVector.method(), "callAPI_to_gridVector2D");
        assert_eq!(ResponseShape::FileList.to_string(), "callAPI_to_fileList");
    }
}
