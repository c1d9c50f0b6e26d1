use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// CloudEvents specification versions understood by the structured codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SpecVersion {
    V02,
    V03,
    #[default]
    V1,
}

impl SpecVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            SpecVersion::V02 => "0.2",
            SpecVersion::V03 => "0.3",
            SpecVersion::V1 => "1.0",
        }
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0.2" => Ok(SpecVersion::V02),
            "0.3" => Ok(SpecVersion::V03),
            "1.0" => Ok(SpecVersion::V1),
            other => Err(format!("unsupported specversion {other:?}")),
        }
    }
}

/// Event payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Json(Value),
    /// Plain text. Structured codecs label it `text/plain` when the event
    /// has no content type.
    Text(String),
    Binary(Vec<u8>),
}

impl From<Value> for Data {
    fn from(value: Value) -> Self {
        Data::Json(value)
    }
}

impl From<String> for Data {
    fn from(value: String) -> Self {
        Data::Text(value)
    }
}

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Data::Text(value.to_string())
    }
}

impl From<Vec<u8>> for Data {
    fn from(value: Vec<u8>) -> Self {
        Data::Binary(value)
    }
}

/// A CloudEvent: identity attributes, optional metadata and an opaque payload.
///
/// `data_schema` holds `dataschema` (1.0) or `schemaurl` (0.2/0.3), and
/// `data_content_type` holds `datacontenttype` (0.3/1.0) or `contenttype` (0.2).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Event {
    pub spec_version: SpecVersion,
    pub id: String,
    pub ty: String,
    pub source: String,
    pub time: Option<DateTime<Utc>>,
    pub subject: Option<String>,
    pub data_content_type: Option<String>,
    pub data_schema: Option<String>,
    pub extensions: BTreeMap<String, Value>,
    pub data: Option<Data>,
}

impl Event {
    pub fn builder() -> EventBuilder {
        EventBuilder::default()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ty(&self) -> &str {
        &self.ty
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.time
    }

    /// Deserializes JSON data into `T`. Text data is parsed as JSON as well.
    pub fn data_as<T: serde::de::DeserializeOwned>(&self) -> Result<Option<T>, String> {
        match &self.data {
            None => Ok(None),
            Some(Data::Json(v)) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| format!("data is not the requested shape: {e}")),
            Some(Data::Text(s)) => serde_json::from_str(s)
                .map(Some)
                .map_err(|e| format!("data is not the requested shape: {e}")),
            Some(Data::Binary(_)) => Err("binary data cannot be read as JSON".to_string()),
        }
    }

    /// Checks the attributes every spec version requires.
    pub fn validate(&self) -> Result<(), String> {
        let mut missing = Vec::new();
        if self.id.is_empty() {
            missing.push("id");
        }
        if self.ty.is_empty() {
            missing.push("type");
        }
        if self.source.is_empty() {
            missing.push("source");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("missing required attributes: {}", missing.join(", ")))
        }
    }
}

#[derive(Debug, Default)]
pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    pub fn spec_version(mut self, version: SpecVersion) -> Self {
        self.event.spec_version = version;
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.event.id = id.into();
        self
    }

    pub fn ty(mut self, ty: impl Into<String>) -> Self {
        self.event.ty = ty.into();
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.event.source = source.into();
        self
    }

    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.event.time = Some(time);
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.event.subject = Some(subject.into());
        self
    }

    pub fn data_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.event.data_content_type = Some(content_type.into());
        self
    }

    pub fn data_schema(mut self, schema: impl Into<String>) -> Self {
        self.event.data_schema = Some(schema.into());
        self
    }

    pub fn extension(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.event.extensions.insert(name.into(), value.into());
        self
    }

    pub fn data(mut self, data: impl Into<Data>) -> Self {
        self.event.data = Some(data.into());
        self
    }

    /// # Errors
    ///
    /// Returns an error naming the missing attributes if id, type or source is empty.
    pub fn build(self) -> Result<Event, String> {
        self.event.validate()?;
        Ok(self.event)
    }
}
