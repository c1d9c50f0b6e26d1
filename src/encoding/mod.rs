//! Event encodings: the `Encoding` modes a transport can be configured with,
//! the codec registry that maps a mode to a `Codec`, and the per-transport
//! codec cache.

pub mod sns_message;
pub mod structured;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::core::event::{Event, SpecVersion};
use crate::errors::{Error, Result};

pub use sns_message::SnsMessage;
pub use structured::StructuredCodec;

/// How events are laid out on the wire.
///
/// The binary modes exist in the CloudEvents model but none of the AWS
/// transports can carry attributes outside the body, so they have no codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    /// Structured JSON in the event's own spec version.
    #[default]
    Default,
    StructuredV02,
    StructuredV03,
    StructuredV1,
    BinaryV02,
    BinaryV03,
    BinaryV1,
}

impl Encoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Default => "default",
            Encoding::StructuredV02 => "structured-v0.2",
            Encoding::StructuredV03 => "structured-v0.3",
            Encoding::StructuredV1 => "structured-v1",
            Encoding::BinaryV02 => "binary-v0.2",
            Encoding::BinaryV03 => "binary-v0.3",
            Encoding::BinaryV1 => "binary-v1",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "default" => Ok(Encoding::Default),
            "structured-v0.2" | "structured-v02" => Ok(Encoding::StructuredV02),
            "structured-v0.3" | "structured-v03" => Ok(Encoding::StructuredV03),
            "structured-v1" | "structured-v1.0" => Ok(Encoding::StructuredV1),
            "binary-v0.2" | "binary-v02" => Ok(Encoding::BinaryV02),
            "binary-v0.3" | "binary-v03" => Ok(Encoding::BinaryV03),
            "binary-v1" | "binary-v1.0" => Ok(Encoding::BinaryV1),
            other => Err(Error::Config(format!("unknown encoding {other:?}"))),
        }
    }
}

/// Transport-neutral encoded event body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub body: Vec<u8>,
}

impl Message {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self { body: body.into() }
    }

    /// Queue and topic payloads are strings; a non UTF-8 body cannot be sent.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnexpectedMessage` if the body is not valid UTF-8.
    pub fn into_text(self) -> Result<String> {
        String::from_utf8(self.body)
            .map_err(|e| Error::UnexpectedMessage(format!("body is not UTF-8: {e}")))
    }
}

impl From<String> for Message {
    fn from(body: String) -> Self {
        Self {
            body: body.into_bytes(),
        }
    }
}

pub trait Codec: fmt::Debug + Send + Sync {
    /// # Errors
    ///
    /// Returns `Error::Codec` if the event cannot be represented in this encoding.
    fn encode(&self, event: &Event) -> Result<Message>;

    /// # Errors
    ///
    /// Returns `Error::Codec` if the body is not an event in this encoding.
    fn decode(&self, message: &Message) -> Result<Event>;
}

/// Looks up the codec for `encoding`.
///
/// # Errors
///
/// Returns `Error::UnsupportedEncoding` for modes with no codec on AWS transports.
pub fn codec_for(encoding: Encoding, transport: &'static str) -> Result<Arc<dyn Codec>> {
    let version = match encoding {
        Encoding::Default => None,
        Encoding::StructuredV02 => Some(SpecVersion::V02),
        Encoding::StructuredV03 => Some(SpecVersion::V03),
        Encoding::StructuredV1 => Some(SpecVersion::V1),
        Encoding::BinaryV02 | Encoding::BinaryV03 | Encoding::BinaryV1 => {
            return Err(Error::UnsupportedEncoding(encoding));
        }
    };
    Ok(Arc::new(StructuredCodec::new(version, transport)))
}

/// Lazily selected codec, resolved from the registry on first use and reused
/// for the lifetime of the transport.
#[derive(Debug)]
pub struct CodecCell {
    encoding: Encoding,
    transport: &'static str,
    codec: OnceCell<Arc<dyn Codec>>,
}

impl CodecCell {
    pub fn new(encoding: Encoding, transport: &'static str) -> Self {
        Self {
            encoding,
            transport,
            codec: OnceCell::new(),
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// # Errors
    ///
    /// Returns `Error::UnsupportedEncoding` if the configured mode has no codec.
    pub fn get(&self) -> Result<Arc<dyn Codec>> {
        self.codec
            .get_or_try_init(|| codec_for(self.encoding, self.transport))
            .cloned()
    }
}
