//! `iiot-assistant init` — Write a default config file.

use iiot_assistant_config::AppConfig;
use std::path::Path;

use super::{CliResult, config_path};

pub fn run(path: Option<&Path>, force: bool) -> CliResult {
    let target = config_path(path);

    if target.exists() && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            target.display()
        )
        .into());
    }

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, AppConfig::default_toml())?;

    println!("Wrote default configuration to {}", target.display());
    println!("Set OPENAI_API_KEY (or api_key in the file) and run `iiot-assistant doctor`.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        run(Some(path.as_path()), false).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_model, "gpt-4o");
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_model = \"custom\"\n").unwrap();

        assert!(run(Some(path.as_path()), false).is_err());
        assert!(std::fs::read_to_string(&path).unwrap().contains("custom"));

        run(Some(path.as_path()), true).unwrap();
        assert!(!std::fs::read_to_string(&path).unwrap().contains("custom"));
    }
}
