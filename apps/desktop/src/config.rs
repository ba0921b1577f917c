use std::{collections::HashMap, fs};

#[derive(Debug, PartialEq)]
pub struct Settings {
    pub api_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8080".into(),
        }
    }
}

/// Layers the optional `bucketlist.toml` file, then environment variables,
/// over the defaults. CLI flags take final precedence in `main`.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("bucketlist.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("api_url") {
                settings.api_url = v.clone();
            }
        }
    }

    if let Ok(v) = std::env::var("BUCKETLIST_API_URL") {
        settings.api_url = v;
    }
    if let Ok(v) = std::env::var("APP__API_URL") {
        settings.api_url = v;
    }

    settings
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;

    #[test]
    fn defaults_point_at_local_backend() {
        assert_eq!(Settings::default().api_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn env_var_overrides_default() {
        env::set_var("APP__API_URL", "https://backend.example.test");
        let settings = load_settings();
        env::remove_var("APP__API_URL");

        assert_eq!(settings.api_url, "https://backend.example.test");
    }
}
