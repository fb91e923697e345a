//! Typed operations over the transport + archive codec (spec §4.4).
//!
//! Every operation follows the same five-step contract: build a payload,
//! encode it, `send_request`, decode the envelope, surface `error` or
//! validate `data`'s shape.

use std::time::Duration;

use crate::archive::{self, Value};
use crate::error::Error;
use crate::frame::RequestCode;
use crate::hierarchy::{
    self, AppInfo, AttributesGroup, HierarchyInfo,
};
use crate::transport::Transport;

/// Per-operation default timeouts (spec §4.2).
pub mod defaults {
    use std::time::Duration;

    pub const PING: Duration = Duration::from_secs(5);
    pub const APP_INFO: Duration = Duration::from_secs(10);
    pub const HIERARCHY: Duration = Duration::from_secs(15);
    pub const ATTR_GROUPS: Duration = Duration::from_secs(15);
    pub const MODIFY: Duration = Duration::from_secs(10);
    pub const INVOKE: Duration = Duration::from_secs(10);
    pub const LIST_SELECTORS: Duration = Duration::from_secs(10);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingResult {
    pub alive: bool,
    pub app_is_in_background: bool,
}

/// Identifies the client across protocol versions when modifying attributes
/// (spec §6, `LookinAttributeModification.clientReadableVersion`).
pub const CLIENT_READABLE_VERSION: &str = "lookinmcp-rs/0.1";

#[derive(Clone)]
pub struct RequestManager {
    transport: Transport,
}

impl RequestManager {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    async fn call(&self, code: RequestCode, payload: Vec<u8>, timeout: Duration) -> Result<archive::ResponseEnvelope, Error> {
        let frame = self.transport.send_request(code.as_u32(), payload, timeout).await?;
        archive::decode_response(&frame.payload)
    }

    fn surface_error(envelope: &archive::ResponseEnvelope) -> Result<(), Error> {
        if let Some(err) = &envelope.error {
            let message = err
                .as_str()
                .map(str::to_string)
                .or_else(|| err.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| format!("{err:?}"));
            return Err(Error::ServerError(message));
        }
        Ok(())
    }

    fn require_data(envelope: archive::ResponseEnvelope) -> Result<Value, Error> {
        Self::surface_error(&envelope)?;
        envelope
            .data
            .ok_or_else(|| Error::InvalidFrame("response had no error but also no data".into()))
    }

    /// Code 200: ping. No request payload; `appIsInBackground` is
    /// significant on the envelope even though `data` is typically absent.
    pub async fn ping(&self, timeout: Option<Duration>) -> Result<PingResult, Error> {
        let envelope = self
            .call(RequestCode::Ping, Vec::new(), timeout.unwrap_or(defaults::PING))
            .await?;
        Self::surface_error(&envelope)?;
        Ok(PingResult {
            alive: true,
            app_is_in_background: envelope.app_is_in_background,
        })
    }

    /// Code 201: app info. The manager accepts either a bare `LookinAppInfo`
    /// or a `LookinHierarchyInfo` whose `.appInfo` is used (spec §9 open
    /// question).
    pub async fn app_info(&self, timeout: Option<Duration>) -> Result<AppInfo, Error> {
        let payload = archive::encode_attachment(Value::dict([
            ("needImages", Value::Bool(false)),
            ("local", Value::Array(Vec::new())),
        ]));
        let envelope = self.call(RequestCode::App, payload, timeout.unwrap_or(defaults::APP_INFO)).await?;
        let data = Self::require_data(envelope)?;

        match data.class_name() {
            Some("LookinHierarchyInfo") => {
                let hierarchy = HierarchyInfo::try_from(&data)?;
                hierarchy
                    .app_info
                    .ok_or_else(|| Error::InvalidFrame("hierarchy response had no appInfo".into()))
            }
            _ => AppInfo::try_from(&data),
        }
    }

    /// Code 202: hierarchy. No request payload.
    pub async fn hierarchy(&self, timeout: Option<Duration>) -> Result<HierarchyInfo, Error> {
        let envelope = self
            .call(RequestCode::Hierarchy, Vec::new(), timeout.unwrap_or(defaults::HIERARCHY))
            .await?;
        let data = Self::require_data(envelope)?;
        HierarchyInfo::try_from(&data)
    }

    /// Code 210: all attribute groups for a layer oid.
    pub async fn all_attr_groups(
        &self,
        layer_oid: u64,
        timeout: Option<Duration>,
    ) -> Result<Vec<AttributesGroup>, Error> {
        let payload = archive::encode_attachment(Value::Int(layer_oid as i64));
        let envelope = self
            .call(RequestCode::AllAttrGroups, payload, timeout.unwrap_or(defaults::ATTR_GROUPS))
            .await?;
        let data = Self::require_data(envelope)?;
        hierarchy::parse_attr_groups(&data)
    }

    /// Code 204: modify an attribute. Returns whether the server reported
    /// success.
    pub async fn modify_attribute(
        &self,
        target_oid: u64,
        setter_selector: &str,
        attr_type: i32,
        value: Value,
        timeout: Option<Duration>,
    ) -> Result<bool, Error> {
        let modification =
            hierarchy::build_modification(target_oid, setter_selector, attr_type, value, CLIENT_READABLE_VERSION);
        let payload = archive::encode_attachment(modification);
        let envelope = self
            .call(RequestCode::InbuiltAttrModification, payload, timeout.unwrap_or(defaults::MODIFY))
            .await?;
        let data = Self::require_data(envelope)?;
        hierarchy::parse_modification_success(&data)
    }

    /// Code 206: invoke a zero/one-arg selector on an object oid.
    pub async fn invoke_method(
        &self,
        oid: u64,
        selector_text: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, Error> {
        let payload = archive::encode_attachment(Value::dict([
            ("oid", Value::Int(oid as i64)),
            ("text", Value::Str(selector_text.to_string())),
        ]));
        let envelope = self
            .call(RequestCode::InvokeMethod, payload, timeout.unwrap_or(defaults::INVOKE))
            .await?;
        let data = Self::require_data(envelope)?;
        hierarchy::parse_invoke_description(&data)
    }

    /// Code 213: list selector names for a class.
    pub async fn list_selectors(
        &self,
        class_name: &str,
        has_arg: bool,
        timeout: Option<Duration>,
    ) -> Result<Vec<String>, Error> {
        let payload = archive::encode_attachment(Value::dict([
            ("className", Value::Str(class_name.to_string())),
            ("hasArg", Value::Bool(has_arg)),
        ]));
        let envelope = self
            .call(RequestCode::AllSelectorNames, payload, timeout.unwrap_or(defaults::LIST_SELECTORS))
            .await?;
        let data = Self::require_data(envelope)?;
        hierarchy::parse_string_list(&data)
    }
}
