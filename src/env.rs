use std::env;
use std::error;
use std::str::FromStr;

pub const THREADS_VAR: &str = "BATCHSTORE_THREADS";
pub const PARTITIONS_VAR: &str = "BATCHSTORE_PARTITIONS";
pub const MAX_DELTAS_PER_KEY_VAR: &str = "BATCHSTORE_MAX_DELTAS_PER_KEY";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("value of {0:?} environment variable is not a valid UTF-8 string")]
    NotUtf8(String),

    #[error("failed to parse {name:?} environment variable value {value:?}: {source}")]
    ParsingFailed {
        name: String,
        value: String,
        #[source]
        source: Box<dyn error::Error + Send + Sync>,
    },
}

/// Reads and parses the variable `name`. Unset and blank variables
/// both yield `Ok(None)`.
pub fn parse_env_var<T: FromStr>(name: &str) -> Result<Option<T>, Error>
where
    T::Err: error::Error + Send + Sync + 'static,
{
    let Some(raw) = env::var_os(name) else {
        return Ok(None);
    };
    let raw = raw
        .into_string()
        .map_err(|_| Error::NotUtf8(name.to_string()))?;
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|err| Error::ParsingFailed {
            name: name.to_string(),
            value: value.to_string(),
            source: Box::new(err),
        })
}

pub fn parse_env_var_or<T: FromStr>(name: &str, default: T) -> Result<T, Error>
where
    T::Err: error::Error + Send + Sync + 'static,
{
    Ok(parse_env_var(name)?.unwrap_or(default))
}
