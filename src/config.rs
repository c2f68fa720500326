use serde::Deserialize;

use crate::env::{
    env_opt, unescape, BATCH_SINK_BATCH_SIZE_ENV, BATCH_SINK_INSTANCE_NAME_ENV,
    BATCH_SINK_NEW_LINE_CHARACTER_ENV,
};
use crate::error::SinkError;

pub const DEFAULT_INSTANCE_NAME: &str = "Unnamed Instance";
pub const DEFAULT_BATCH_SIZE: usize = 3000;
pub const DEFAULT_NEW_LINE_CHARACTER: &str = "\n";

/// Settings shared by every sink instance.
///
/// **Fields**
/// - `instance_name`: label attached to every diagnostic line.
/// - `batch_size`: number of buffered records that triggers an automatic
///   flush on the next write. Must be positive.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub instance_name: String,
    pub batch_size: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            instance_name: DEFAULT_INSTANCE_NAME.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl SinkConfig {
    pub fn new(instance_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Defaults overridden by `BATCH_SINK_INSTANCE_NAME` and
    /// `BATCH_SINK_BATCH_SIZE`.
    pub fn from_env() -> Result<Self, SinkError> {
        let mut config = Self::default();
        if let Some(name) = env_opt(BATCH_SINK_INSTANCE_NAME_ENV) {
            config.instance_name = name;
        }
        if let Some(raw) = env_opt(BATCH_SINK_BATCH_SIZE_ENV) {
            config.batch_size = raw.trim().parse().map_err(|_| {
                SinkError::InvalidConfig(format!("{BATCH_SINK_BATCH_SIZE_ENV}={raw} is not a number"))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SinkError> {
        if self.batch_size == 0 {
            return Err(SinkError::InvalidConfig("batch_size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Settings for [`crate::file::FileSink`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileSinkConfig {
    #[serde(flatten)]
    pub sink: SinkConfig,
    /// Separator written between records and before appended batches.
    pub new_line_character: String,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            sink: SinkConfig::default(),
            new_line_character: DEFAULT_NEW_LINE_CHARACTER.to_string(),
        }
    }
}

impl FileSinkConfig {
    pub fn new(instance_name: impl Into<String>) -> Self {
        Self {
            sink: SinkConfig::new(instance_name),
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.sink.batch_size = batch_size;
        self
    }

    pub fn with_new_line_character(mut self, new_line_character: impl Into<String>) -> Self {
        self.new_line_character = new_line_character.into();
        self
    }

    /// [`SinkConfig::from_env`] plus `BATCH_SINK_NEW_LINE_CHARACTER`.
    pub fn from_env() -> Result<Self, SinkError> {
        let mut config = Self {
            sink: SinkConfig::from_env()?,
            ..Self::default()
        };
        if let Some(raw) = env_opt(BATCH_SINK_NEW_LINE_CHARACTER_ENV) {
            config.new_line_character = unescape(&raw);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SinkError> {
        self.sink.validate()?;
        line_terminator(&self.new_line_character).map(|_| ())
    }
}

/// Map a separator string onto the terminators the CSV writer supports.
pub(crate) fn line_terminator(separator: &str) -> Result<csv::Terminator, SinkError> {
    match separator.as_bytes() {
        b"\r\n" => Ok(csv::Terminator::CRLF),
        [byte] if byte.is_ascii() => Ok(csv::Terminator::Any(*byte)),
        _ => Err(SinkError::InvalidConfig(format!(
            "new_line_character must be \"\\r\\n\" or a single ASCII character, got {separator:?}"
        ))),
    }
}
