use crate::store::StoreError;

/// The category of object being stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreType {
    /// Reusable build cache, transferred as a zip archive.
    Cache,
    /// Build output, transferred verbatim.
    Artifact,
    /// Build step log, transferred verbatim.
    Log,
}

impl StoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Artifact => "artifact",
            Self::Log => "log",
        }
    }

    /// Cache entries are compressed on upload and extracted on download.
    pub fn is_archived(&self) -> bool {
        matches!(self, Self::Cache)
    }
}

impl std::fmt::Display for StoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StoreType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &*s.to_lowercase() {
            "cache" => Ok(Self::Cache),
            "artifact" => Ok(Self::Artifact),
            "log" => Ok(Self::Log),
            _ => Err(StoreError::InvalidParameters(format!(
                "unsupported store type: {s:?}"
            ))),
        }
    }
}

/// The dimension that partitions stored entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Event,
    Job,
    Pipeline,
    Build,
    Unscoped,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Job => "job",
            Self::Pipeline => "pipeline",
            Self::Build => "build",
            Self::Unscoped => "",
        }
    }

    /// Whether cache entries can be partitioned by this scope.
    pub fn is_cache_scope(&self) -> bool {
        matches!(self, Self::Event | Self::Job | Self::Pipeline)
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &*s.to_lowercase() {
            "event" => Ok(Self::Event),
            "job" => Ok(Self::Job),
            "pipeline" => Ok(Self::Pipeline),
            "build" => Ok(Self::Build),
            "" => Ok(Self::Unscoped),
            _ => Err(StoreError::InvalidParameters(format!(
                "unsupported scope: {s:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Get,
    Set,
    Remove,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Remove => "remove",
        }
    }

    /// Whether the action changes what is stored.
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::Get)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &*s.to_lowercase() {
            "get" => Ok(Self::Get),
            "set" => Ok(Self::Set),
            "remove" => Ok(Self::Remove),
            _ => Err(StoreError::InvalidParameters(format!(
                "unsupported action: {s:?}"
            ))),
        }
    }
}

/// Where cache entries live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheStrategy {
    #[default]
    Remote,
    Disk,
}

impl CacheStrategy {
    /// Only `disk` selects the disk backend, anything else means remote.
    pub fn from_setting(setting: &str) -> Self {
        if setting.trim().eq_ignore_ascii_case("disk") {
            Self::Disk
        } else {
            Self::Remote
        }
    }
}
