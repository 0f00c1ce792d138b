//! # Wire Messages
//!
//! Protobuf messages returned by the service (package `cma.music.pb`), declared with
//! `prost` derives, plus detection of the JSON replies the gateway sends instead of a
//! protobuf body when it rejects a call.

use crate::error::{DaasError, DaasResult, OTHER_ERROR};
use serde::Deserialize;

/// Status block carried by every response
#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestInfo {
    #[prost(int32, tag = "1")]
    pub error_code: i32,
    #[prost(string, tag = "2")]
    pub error_message: String,
    #[prost(string, tag = "3")]
    pub request_elems: String,
    #[prost(string, tag = "4")]
    pub request_params: String,
    #[prost(string, tag = "5")]
    pub request_time: String,
    #[prost(string, tag = "6")]
    pub response_time: String,
    #[prost(int32, tag = "7")]
    pub row_count: i32,
    #[prost(int32, tag = "8")]
    pub take_time: i32,
    #[prost(int32, tag = "9")]
    pub col_count: i32,
}

/// Flat string table
#[derive(Clone, PartialEq, prost::Message)]
pub struct RetArray2D {
    #[prost(string, repeated, tag = "1")]
    pub data: Vec<String>,
    #[prost(message, optional, tag = "2")]
    pub request: Option<RequestInfo>,
    #[prost(string, repeated, tag = "3")]
    pub element_names: Vec<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RetGridArray2D {
    #[prost(float, repeated, tag = "1")]
    pub data: Vec<f32>,
    #[prost(message, optional, tag = "2")]
    pub request: Option<RequestInfo>,
    #[prost(float, tag = "3")]
    pub start_lat: f32,
    #[prost(float, tag = "4")]
    pub start_lon: f32,
    #[prost(float, tag = "5")]
    pub end_lat: f32,
    #[prost(float, tag = "6")]
    pub end_lon: f32,
    #[prost(int32, tag = "7")]
    pub lat_count: i32,
    #[prost(int32, tag = "8")]
    pub lon_count: i32,
    #[prost(float, tag = "9")]
    pub lon_step: f32,
    #[prost(float, tag = "10")]
    pub lat_step: f32,
    #[prost(float, repeated, tag = "11")]
    pub lats: Vec<f32>,
    #[prost(float, repeated, tag = "12")]
    pub lons: Vec<f32>,
    #[prost(string, tag = "13")]
    pub units: String,
    #[prost(string, tag = "14")]
    pub user_ele_name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RetGridScalar2D {
    #[prost(float, repeated, tag = "1")]
    pub datas: Vec<f32>,
    #[prost(message, optional, tag = "2")]
    pub request: Option<RequestInfo>,
    #[prost(float, tag = "3")]
    pub start_lat: f32,
    #[prost(float, tag = "4")]
    pub start_lon: f32,
    #[prost(float, tag = "5")]
    pub end_lat: f32,
    #[prost(float, tag = "6")]
    pub end_lon: f32,
    #[prost(int32, tag = "7")]
    pub lat_count: i32,
    #[prost(int32, tag = "8")]
    pub lon_count: i32,
    #[prost(float, tag = "9")]
    pub lon_step: f32,
    #[prost(float, tag = "10")]
    pub lat_step: f32,
    #[prost(float, repeated, tag = "11")]
    pub lats: Vec<f32>,
    #[prost(float, repeated, tag = "12")]
    pub lons: Vec<f32>,
    #[prost(string, tag = "13")]
    pub units: String,
    #[prost(string, tag = "14")]
    pub user_ele_name: String,
}

/// u/v pair on one grid
#[derive(Clone, PartialEq, prost::Message)]
pub struct RetGridVector2D {
    #[prost(float, repeated, tag = "1")]
    pub u_datas: Vec<f32>,
    #[prost(float, repeated, tag = "2")]
    pub v_datas: Vec<f32>,
    #[prost(message, optional, tag = "3")]
    pub request: Option<RequestInfo>,
    #[prost(float, tag = "4")]
    pub start_lat: f32,
    #[prost(float, tag = "5")]
    pub start_lon: f32,
    #[prost(float, tag = "6")]
    pub end_lat: f32,
    #[prost(float, tag = "7")]
    pub end_lon: f32,
    #[prost(int32, tag = "8")]
    pub lat_count: i32,
    #[prost(int32, tag = "9")]
    pub lon_count: i32,
    #[prost(float, tag = "10")]
    pub lon_step: f32,
    #[prost(float, tag = "11")]
    pub lat_step: f32,
    #[prost(float, repeated, tag = "12")]
    pub lats: Vec<f32>,
    #[prost(float, repeated, tag = "13")]
    pub lons: Vec<f32>,
    #[prost(string, tag = "14")]
    pub u_ele_name: String,
    #[prost(string, tag = "15")]
    pub v_ele_name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FileInfo {
    #[prost(string, tag = "1")]
    pub file_name: String,
    #[prost(string, tag = "2")]
    pub save_path: String,
    #[prost(string, tag = "3")]
    pub suffix: String,
    #[prost(string, tag = "4")]
    pub size: String,
    #[prost(string, tag = "5")]
    pub file_url: String,
    #[prost(string, tag = "6")]
    pub img_base64: String,
    #[prost(string, repeated, tag = "7")]
    pub attributes: Vec<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RetFilesInfo {
    #[prost(message, repeated, tag = "1")]
    pub file_infos: Vec<FileInfo>,
    #[prost(message, optional, tag = "2")]
    pub request: Option<RequestInfo>,
}

/// Access to the status block shared by all response messages
pub trait WithRequestInfo {
    fn request_info(&self) -> Option<&RequestInfo>;

    /// Fails with the remote code when the status block reports an error.
    ///
    /// A missing status block is treated as malformed: the service always sends one.
    fn check_status(&self) -> DaasResult<&RequestInfo> {
        let info = self
            .request_info()
            .ok_or_else(|| DaasError::MalformedPayload("response has no request info".to_string()))?;
        if info.error_code != 0 {
            return Err(DaasError::RemoteQuery {
                code: info.error_code,
                message: info.error_message.clone(),
            });
        }
        Ok(info)
    }
}

macro_rules! impl_with_request_info {
    ($($ty:ty),*) => {
        $(impl WithRequestInfo for $ty {
            fn request_info(&self) -> Option<&RequestInfo> {
                self.request.as_ref()
            }
        })*
    };
}

impl_with_request_info!(RetArray2D, RetGridArray2D, RetGridScalar2D, RetGridVector2D, RetFilesInfo);

/// Marker the gateway puts in its JSON error replies.
pub const GATEWAY_FLAG: &str = "\"flag\":\"slb\"";

#[derive(Debug, Deserialize)]
struct GatewayReply {
    #[serde(rename = "returnCode")]
    return_code: serde_json::Value,
    #[serde(rename = "returnMessage", default)]
    return_message: String,
}

/// Returns an error when `body` is a gateway rejection rather than a protobuf payload.
pub fn check_gateway(body: &[u8]) -> DaasResult<()> {
    let flag = GATEWAY_FLAG.as_bytes();
    if !body.windows(flag.len()).any(|w| w == flag) {
        return Ok(());
    }
    match serde_json::from_slice::<GatewayReply>(body) {
        Ok(reply) => {
            let code = match &reply.return_code {
                serde_json::Value::Number(n) => n.as_i64().map(|c| c as i32),
                serde_json::Value::String(s) => s.trim().parse().ok(),
                _ => None,
            }
            .unwrap_or(OTHER_ERROR);
            Err(DaasError::RemoteQuery {
                code,
                message: reply.return_message,
            })
        }
        Err(_) => Err(DaasError::RemoteQuery {
            code: OTHER_ERROR,
            message: format!(
                "parse gateway return string error: {}",
                String::from_utf8_lossy(body)
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_gateway_reply_is_detected() {
        let body = br#"{"flag":"slb","returnCode":-2001,"returnMessage":"user unauthorized"}"#;
        match check_gateway(body) {
            Err(DaasError::RemoteQuery { code, message }) => {
                assert_eq!(code, -2001);
                assert_eq!(message, "user unauthorized");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_gateway_reply_with_string_code() {
        let body = br#"{"returnCode":"-5","flag":"slb","returnMessage":"busy"}"#;
        assert_eq!(check_gateway(body).unwrap_err().code(), -5);
    }

    #[test]
    fn test_unparsable_gateway_reply() {
        let body = br#"<html>"flag":"slb"</html>"#;
        assert_eq!(check_gateway(body).unwrap_err().code(), OTHER_ERROR);
    }

    #[test]
    fn test_protobuf_body_passes() {
        let msg = RetArray2D {
            data: vec!["1".into()],
            request: Some(RequestInfo::default()),
            element_names: vec!["a".into()],
        };
        assert!(check_gateway(&msg.encode_to_vec()).is_ok());
    }

    #[test]
    fn test_status_check() {
        let mut msg = RetFilesInfo::default();
        assert!(matches!(msg.check_status(), Err(DaasError::MalformedPayload(_))));

        msg.request = Some(RequestInfo {
            error_code: -1,
            error_message: "no data".into(),
            ..Default::default()
        });
        assert_eq!(msg.check_status().unwrap_err().code(), -1);

        msg.request = Some(RequestInfo::default());
        assert!(msg.check_status().is_ok());
    }
}
