//! Configuration loading: TOML file, then environment overrides
//!
//! ```toml
//! [gateway]
//! port = 18790
//! bind = "loopback"
//!
//! [agent]
//! model = "claude-sonnet-4-20250514"
//! max_steps = 25
//!
//! [provider]
//! kind = "anthropic"
//! ```
//!
//! CLI flags are applied on top by the binary.

use interlude_core::{Error, InterludeConfig, ProviderKind, Result};
use std::path::Path;
use tracing::debug;

pub fn load_config(path: Option<&Path>) -> Result<InterludeConfig> {
    let mut config = match path {
        Some(path) => {
            debug!("loading config from {}", path.display());
            let text = std::fs::read_to_string(path)?;
            from_toml(&text)?
        }
        None => InterludeConfig::default(),
    };
    apply_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

pub fn from_toml(text: &str) -> Result<InterludeConfig> {
    toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
}

/// Apply `INTERLUDE_*` overrides. `lookup` resolves a variable name.
pub fn apply_overrides(
    config: &mut InterludeConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(model) = lookup("INTERLUDE_MODEL") {
        config.agent.model = model;
    }
    if let Some(port) = lookup("INTERLUDE_PORT") {
        config.gateway.port = port
            .parse()
            .map_err(|_| Error::Config(format!("INTERLUDE_PORT is not a port: {}", port)))?;
    }
    if let Some(prompt) = lookup("INTERLUDE_SYSTEM_PROMPT") {
        config.agent.system_prompt = Some(prompt);
    }
    if let Some(steps) = lookup("INTERLUDE_MAX_STEPS") {
        config.agent.max_steps = steps
            .parse()
            .map_err(|_| Error::Config(format!("INTERLUDE_MAX_STEPS is not a number: {}", steps)))?;
    }
    if let Some(kind) = lookup("INTERLUDE_PROVIDER") {
        config.provider.kind = parse_provider(&kind)?;
    }
    if let Some(url) = lookup("ANTHROPIC_API_URL") {
        config.provider.api_url = Some(url);
    }
    Ok(())
}

pub fn parse_provider(s: &str) -> Result<ProviderKind> {
    match s {
        "anthropic" => Ok(ProviderKind::Anthropic),
        "scripted" | "echo" => Ok(ProviderKind::Scripted),
        other => Err(Error::Config(format!("unknown provider: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interlude_core::BindMode;
    use std::collections::HashMap;

    #[test]
    fn toml_sections_are_optional() {
        let config = from_toml("[gateway]\nport = 9000\nbind = \"lan\"\n").unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.bind, BindMode::Lan);
        assert_eq!(config.agent.max_steps, 25);
        assert!(from_toml("").is_ok());
        assert!(matches!(from_toml("[gateway]\nport = \"x\""), Err(Error::Config(_))));
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("INTERLUDE_MODEL", "claude-haiku-4-5"),
            ("INTERLUDE_PORT", "4000"),
            ("INTERLUDE_MAX_STEPS", "7"),
            ("INTERLUDE_PROVIDER", "scripted"),
        ]
        .into_iter()
        .collect();
        let mut config = from_toml("[agent]\nmax_steps = 3\n").unwrap();
        apply_overrides(&mut config, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.agent.model, "claude-haiku-4-5");
        assert_eq!(config.gateway.port, 4000);
        assert_eq!(config.agent.max_steps, 7);
        assert_eq!(config.provider.kind, ProviderKind::Scripted);
    }

    #[test]
    fn bad_override_is_a_config_error() {
        let mut config = InterludeConfig::default();
        let err = apply_overrides(&mut config, |k| {
            (k == "INTERLUDE_PORT").then(|| "not-a-port".to_string())
        })
        .unwrap_err();
        assert_eq!(err.code(), "config");
    }
}
