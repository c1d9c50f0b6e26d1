use std::env;
use std::fmt;
use std::str::FromStr;

use crate::encoding::Encoding;
use crate::errors::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Sqs,
    Sns,
    EventBridge,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportKind::Sqs => "sqs",
            TransportKind::Sns => "sns",
            TransportKind::EventBridge => "eventbridge",
        })
    }
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqs" | "queue" => Ok(TransportKind::Sqs),
            "sns" | "topic" => Ok(TransportKind::Sns),
            "eventbridge" | "bus" => Ok(TransportKind::EventBridge),
            other => Err(Error::Config(format!("CE_TRANSPORT: unknown transport {other:?}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub transport: TransportKind,
    /// Queue URL, topic ARN or event bus ARN, depending on `transport`.
    pub destination: String,
    pub encoding: Encoding,
    pub port: Option<i64>,
    pub path: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let transport = lookup("CE_TRANSPORT")
            .ok_or_else(|| Error::Config("CE_TRANSPORT: not set".to_string()))?
            .parse::<TransportKind>()?;
        let destination = lookup("CE_DESTINATION")
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| Error::Config("CE_DESTINATION: not set".to_string()))?;
        let encoding = match lookup("CE_ENCODING") {
            Some(e) => e.parse::<Encoding>()?,
            None => Encoding::Default,
        };
        let port = lookup("CE_PORT")
            .map(|p| {
                p.trim()
                    .parse::<i64>()
                    .map_err(|e| Error::Config(format!("CE_PORT: {e}")))
            })
            .transpose()?;

        Ok(Self {
            transport,
            destination,
            encoding,
            port,
            path: lookup("CE_PATH"),
        })
    }
}
