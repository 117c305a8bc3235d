use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which panel the overlay is showing.
///
/// `Queue` collects screenshots of the problem; `Solutions` and `Debug` collect
/// follow-up screenshots into the extra queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Queue,
    Solutions,
    Debug,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::Solutions => "solutions",
            Self::Debug => "debug",
        }
    }

    pub fn uses_extra_queue(self) -> bool {
        !matches!(self, Self::Queue)
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown view '{0}' (expected queue, solutions or debug)")]
pub struct ParseViewError(pub String);

impl FromStr for View {
    type Err = ParseViewError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queue" => Ok(Self::Queue),
            "solutions" => Ok(Self::Solutions),
            "debug" => Ok(Self::Debug),
            _ => Err(ParseViewError(raw.to_string())),
        }
    }
}
