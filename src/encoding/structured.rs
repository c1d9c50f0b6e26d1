//! Structured-mode JSON codecs for CloudEvents 0.2, 0.3 and 1.0.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::{Codec, Message};
use crate::core::event::{Data, Event, SpecVersion};
use crate::errors::{Error, Result};

const COMMON_ATTRIBUTES: &[&str] = &["specversion", "id", "type", "source", "time", "data"];

/// Encodes events as a single JSON object.
///
/// A codec pinned to a version converts every event to that version on encode
/// and only accepts that version on decode. The unpinned codec (`Encoding::Default`)
/// keeps the event's own version and accepts any supported one.
///
/// Text data without a content type is sent as `text/plain` so it decodes
/// back to text. Version 0.2 has no `subject` attribute: a subject is sent as
/// the `subject` extension and decodes into `extensions`.
#[derive(Debug, Clone)]
pub struct StructuredCodec {
    version: Option<SpecVersion>,
    transport: &'static str,
}

impl StructuredCodec {
    pub fn new(version: Option<SpecVersion>, transport: &'static str) -> Self {
        Self { version, transport }
    }

    pub fn version(&self) -> Option<SpecVersion> {
        self.version
    }

    fn err(&self, message: impl Into<String>) -> Error {
        Error::codec(self.transport, message)
    }

    fn to_json(&self, event: &Event, version: SpecVersion) -> Result<Map<String, Value>> {
        event.validate().map_err(|e| self.err(e))?;

        let mut obj = Map::new();
        obj.insert("specversion".into(), version.as_str().into());
        obj.insert("id".into(), event.id.clone().into());
        obj.insert("type".into(), event.ty.clone().into());
        obj.insert("source".into(), event.source.clone().into());
        if let Some(time) = event.time {
            obj.insert(
                "time".into(),
                time.to_rfc3339_opts(SecondsFormat::AutoSi, true).into(),
            );
        }
        if let Some(subject) = &event.subject {
            if version == SpecVersion::V02 && event.extensions.contains_key("subject") {
                return Err(self.err("subject conflicts with the \"subject\" extension"));
            }
            obj.insert("subject".into(), subject.clone().into());
        }
        if let Some(content_type) = &event.data_content_type {
            obj.insert(content_type_key(version).into(), content_type.clone().into());
        }
        if let Some(schema) = &event.data_schema {
            obj.insert(schema_key(version).into(), schema.clone().into());
        }

        match &event.data {
            None => {}
            Some(Data::Json(value)) => {
                obj.insert("data".into(), value.clone());
            }
            Some(Data::Text(text)) => {
                if event.data_content_type.is_none() {
                    obj.insert(content_type_key(version).into(), "text/plain".into());
                }
                obj.insert("data".into(), text.clone().into());
            }
            Some(Data::Binary(bytes)) => match version {
                SpecVersion::V1 => {
                    obj.insert("data_base64".into(), BASE64.encode(bytes).into());
                }
                SpecVersion::V03 => {
                    obj.insert("datacontentencoding".into(), "base64".into());
                    obj.insert("data".into(), BASE64.encode(bytes).into());
                }
                SpecVersion::V02 => {
                    return Err(self.err("binary data cannot be carried by specversion 0.2"));
                }
            },
        }

        for (name, value) in &event.extensions {
            if is_reserved(version, name) {
                return Err(self.err(format!("extension {name:?} shadows a context attribute")));
            }
            obj.insert(name.clone(), value.clone());
        }

        Ok(obj)
    }

    fn from_json(&self, mut obj: Map<String, Value>) -> Result<Event> {
        let version = match obj.remove("specversion") {
            Some(Value::String(v)) => v.parse::<SpecVersion>().map_err(|e| self.err(e))?,
            Some(other) => return Err(self.err(format!("specversion must be a string, got {other}"))),
            None => return Err(self.err("missing specversion")),
        };
        if let Some(expected) = self.version {
            if expected != version {
                return Err(self.err(format!(
                    "expected specversion {expected}, got {version}"
                )));
            }
        }

        let id = take_string(&mut obj, "id").map_err(|e| self.err(e))?.unwrap_or_default();
        let ty = take_string(&mut obj, "type").map_err(|e| self.err(e))?.unwrap_or_default();
        let source = take_string(&mut obj, "source").map_err(|e| self.err(e))?.unwrap_or_default();
        let time = take_string(&mut obj, "time")
            .map_err(|e| self.err(e))?
            .map(|t| {
                DateTime::parse_from_rfc3339(&t)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| self.err(format!("invalid time {t:?}: {e}")))
            })
            .transpose()?;
        let subject = match version {
            SpecVersion::V02 => None,
            SpecVersion::V03 | SpecVersion::V1 => {
                take_string(&mut obj, "subject").map_err(|e| self.err(e))?
            }
        };
        let data_content_type =
            take_string(&mut obj, content_type_key(version)).map_err(|e| self.err(e))?;
        let data_schema = take_string(&mut obj, schema_key(version)).map_err(|e| self.err(e))?;

        let data = match version {
            SpecVersion::V1 => match take_string(&mut obj, "data_base64").map_err(|e| self.err(e))? {
                Some(encoded) => Some(Data::Binary(self.decode_base64(&encoded)?)),
                None => obj
                    .remove("data")
                    .map(|v| classify(v, data_content_type.as_deref())),
            },
            SpecVersion::V03 => {
                let content_encoding =
                    take_string(&mut obj, "datacontentencoding").map_err(|e| self.err(e))?;
                match (content_encoding.as_deref(), obj.remove("data")) {
                    (_, None) => None,
                    (Some(enc), Some(Value::String(encoded))) if enc.eq_ignore_ascii_case("base64") => {
                        Some(Data::Binary(self.decode_base64(&encoded)?))
                    }
                    (Some(enc), Some(_)) => {
                        return Err(self.err(format!("unsupported datacontentencoding {enc:?}")));
                    }
                    (None, Some(v)) => Some(classify(v, data_content_type.as_deref())),
                }
            }
            SpecVersion::V02 => obj
                .remove("data")
                .map(|v| classify(v, data_content_type.as_deref())),
        };

        let event = Event {
            spec_version: version,
            id,
            ty,
            source,
            time,
            subject,
            data_content_type,
            data_schema,
            extensions: obj.into_iter().collect(),
            data,
        };
        event.validate().map_err(|e| self.err(e))?;
        Ok(event)
    }

    fn decode_base64(&self, encoded: &str) -> Result<Vec<u8>> {
        BASE64
            .decode(encoded)
            .map_err(|e| self.err(format!("invalid base64 data: {e}")))
    }
}

impl Codec for StructuredCodec {
    fn encode(&self, event: &Event) -> Result<Message> {
        let version = self.version.unwrap_or(event.spec_version);
        let obj = self.to_json(event, version)?;
        let body = serde_json::to_vec(&Value::Object(obj)).map_err(|e| self.err(e.to_string()))?;
        Ok(Message { body })
    }

    fn decode(&self, message: &Message) -> Result<Event> {
        match serde_json::from_slice::<Value>(&message.body) {
            Ok(Value::Object(obj)) => self.from_json(obj),
            Ok(_) => Err(self.err("structured event must be a JSON object")),
            Err(e) => Err(self.err(format!("invalid JSON: {e}"))),
        }
    }
}

fn content_type_key(version: SpecVersion) -> &'static str {
    match version {
        SpecVersion::V02 => "contenttype",
        SpecVersion::V03 | SpecVersion::V1 => "datacontenttype",
    }
}

fn schema_key(version: SpecVersion) -> &'static str {
    match version {
        SpecVersion::V02 | SpecVersion::V03 => "schemaurl",
        SpecVersion::V1 => "dataschema",
    }
}

fn is_reserved(version: SpecVersion, name: &str) -> bool {
    COMMON_ATTRIBUTES.contains(&name)
        || (version != SpecVersion::V02 && name == "subject")
        || name == content_type_key(version)
        || name == schema_key(version)
        || (version == SpecVersion::V03 && name == "datacontentencoding")
        || (version == SpecVersion::V1 && name == "data_base64")
}

fn take_string(obj: &mut Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match obj.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(format!("attribute {key:?} must be a string, got {other}")),
    }
}

// A JSON string is text unless the declared content type is JSON.
fn classify(value: Value, content_type: Option<&str>) -> Data {
    match (value, content_type) {
        (Value::String(s), Some(ct)) if !ct.to_ascii_lowercase().contains("json") => Data::Text(s),
        (value, _) => Data::Json(value),
    }
}
