/// Settings read from the `SD_*` environment variables of a build.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(deserialize_with = "string_or_number")]
    pub store_url: String,
    #[serde(deserialize_with = "string_or_number")]
    pub token: String,
    #[serde(deserialize_with = "string_or_number")]
    pub build_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub job_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub event_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub pipeline_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub pull_request: String,
    #[serde(deserialize_with = "string_or_number")]
    pub pr_parent_job_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub cache_strategy: String,
    #[serde(deserialize_with = "size_or_zero")]
    pub cache_max_size_mb: u64,
    #[serde(deserialize_with = "string_or_number")]
    pub event_cache_dir: String,
    #[serde(deserialize_with = "string_or_number")]
    pub job_cache_dir: String,
    #[serde(deserialize_with = "string_or_number")]
    pub pipeline_cache_dir: String,
}

impl Config {
    pub const ENV_PREFIX: &'static str = "SD_";

    pub fn figment() -> figment::Figment {
        figment::Figment::new().merge(figment::providers::Env::prefixed(Self::ENV_PREFIX))
    }

    pub fn from_env() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }
}

/// Env values are type-guessed, so `SD_BUILD_ID=10038` arrives as a number
/// and `SD_TOKEN=true` as a bool. Every setting is read back as text.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Bool(bool),
    }

    let value = <StringOrNumber as serde::Deserialize>::deserialize(deserializer)?;
    Ok(match value {
        StringOrNumber::String(s) => s,
        StringOrNumber::Unsigned(n) => n.to_string(),
        StringOrNumber::Signed(n) => n.to_string(),
        StringOrNumber::Float(n) => n.to_string(),
        StringOrNumber::Bool(b) => b.to_string(),
    })
}

/// An unset or unparseable size means no limit.
fn size_or_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = string_or_number(deserializer)?;
    Ok(value.trim().parse().unwrap_or(0))
}
