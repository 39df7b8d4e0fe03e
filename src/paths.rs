use anyhow::Context;
use std::ffi::OsString;
use std::path::PathBuf;

const APP_DIR: &str = "cursorllm";

/// Where `config.toml` lives. The file does not have to exist.
///
/// Order: `$CURSORLLM_HOME/config`, `$XDG_CONFIG_HOME/cursorllm`,
/// `$HOME/.config/cursorllm`.
pub fn config_path() -> anyhow::Result<PathBuf> {
    config_path_from(|name| std::env::var_os(name))
}

fn config_path_from(var: impl Fn(&str) -> Option<OsString>) -> anyhow::Result<PathBuf> {
    let dir = if let Some(base) = var("CURSORLLM_HOME") {
        PathBuf::from(base).join("config")
    } else if let Some(xdg) = var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join(APP_DIR)
    } else {
        // On Unix, HOME is standard. (Windows support can be expanded later.)
        let home = var("HOME").context("HOME is not set")?;
        PathBuf::from(home).join(".config").join(APP_DIR)
    };
    Ok(dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn app_home_wins() {
        let p = config_path_from(lookup(&[
            ("CURSORLLM_HOME", "/opt/cl"),
            ("XDG_CONFIG_HOME", "/xdg"),
            ("HOME", "/home/u"),
        ]))
        .unwrap();
        assert_eq!(p, PathBuf::from("/opt/cl/config/config.toml"));
    }

    #[test]
    fn falls_back_to_xdg_then_home() {
        let p = config_path_from(lookup(&[("XDG_CONFIG_HOME", "/xdg"), ("HOME", "/home/u")])).unwrap();
        assert_eq!(p, PathBuf::from("/xdg/cursorllm/config.toml"));

        let p = config_path_from(lookup(&[("HOME", "/home/u")])).unwrap();
        assert_eq!(p, PathBuf::from("/home/u/.config/cursorllm/config.toml"));
    }

    #[test]
    fn errors_without_home() {
        assert!(config_path_from(lookup(&[])).is_err());
    }
}
