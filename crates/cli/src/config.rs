use ub515_common::AppConfig;
use ub515_error::{ErrorCode, ErrorContext, Ub515Error};

/// Load and validate the configuration at `path`. Failures carry the file
/// path so they map to the configuration exit code.
pub fn load(path: &str) -> Result<AppConfig, Ub515Error> {
    AppConfig::from_file(path).map_err(|e| {
        Ub515Error::new(ErrorCode::InvalidConfig, format!("{:#}", e))
            .with_context(ErrorContext::Config {
                file_path: Some(path.to_string()),
                field: None,
            })
            .with_hint("Set database.* in the config file, UB515_DATABASE__* or DB_* variables")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_invalid_file_is_a_config_error() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "database:\n  backend: sqlite\n  pool_size: 0\n  path: ub515.db").unwrap();

        let err = load(file.path().to_str().unwrap()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfig);
        match err.context {
            Some(ErrorContext::Config { file_path, .. }) => {
                assert_eq!(file_path.as_deref(), file.path().to_str())
            }
            other => panic!("unexpected context: {other:?}"),
        }
    }
}
