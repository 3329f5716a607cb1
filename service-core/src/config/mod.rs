use crate::error::AppError;
use config::{Config as Cfg, Environment, File};
use serde::de::DeserializeOwned;

/// Load a layered configuration.
///
/// Values come from an optional `{file_name}` file (any format the `config`
/// crate understands) overridden by `{prefix}__SECTION__KEY` environment
/// variables. A `.env` file is honoured when present.
pub fn load<T: DeserializeOwned>(file_name: &str, prefix: &str) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let config = Cfg::builder()
        .add_source(File::with_name(file_name).required(false))
        .add_source(
            Environment::with_prefix(prefix)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("profile.sca_approaches")
                .with_list_parse_key("accounts.known_ibans")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default = "default_port")]
        port: u16,
    }

    fn default_port() -> u16 {
        8080
    }

    #[test]
    fn test_defaults_apply_without_sources() {
        let sample: Sample = load("does-not-exist", "SERVICE_CORE_TEST").unwrap();
        assert_eq!(sample.port, 8080);
    }
}
