use std::time::Duration;

use serde::Deserialize;

/// CORS configuration for the relay endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins (`"*"` or explicit list)
    #[serde(default)]
    pub origins: AnyOrArray,
    /// Allowed HTTP methods (`"*"` or explicit list)
    #[serde(default)]
    pub methods: AnyOrArray,
    /// Allowed request headers (`"*"` or explicit list)
    #[serde(default)]
    pub headers: AnyOrArray,
    /// Headers exposed to the browser
    #[serde(default)]
    pub expose_headers: Vec<String>,
    /// Allow credentials
    #[serde(default)]
    pub credentials: bool,
    /// Preflight cache lifetime in seconds
    #[serde(default)]
    pub max_age: Option<u64>,
}

impl CorsConfig {
    /// Preflight cache lifetime as a `Duration`
    pub fn max_age_duration(&self) -> Option<Duration> {
        self.max_age.map(Duration::from_secs)
    }
}

/// Either a wildcard or an explicit list of values
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawAnyOrArray")]
pub enum AnyOrArray {
    /// Match any value
    #[default]
    Any,
    /// Explicit list
    List(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAnyOrArray {
    One(String),
    Many(Vec<String>),
}

impl From<RawAnyOrArray> for AnyOrArray {
    fn from(raw: RawAnyOrArray) -> Self {
        let values = match raw {
            RawAnyOrArray::One(value) => vec![value],
            RawAnyOrArray::Many(values) => values,
        };

        if values.iter().any(|v| v == "*") {
            Self::Any
        } else {
            Self::List(values)
        }
    }
}
