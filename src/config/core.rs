use anyhow::{Context, Result, ensure};
use figment::Figment;
use figment::providers::{Data, Env, Format, Json, Serialized, Toml, Yaml};
use std::path::Path;

use super::{ConfigOverrides, SweepConfig};

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Prefix of environment variables that override configuration keys
pub const ENV_PREFIX: &str = "PRIMESWEEP_";

impl SweepConfig {
    pub fn load(custom_config: Option<&str>, overrides: Option<&ConfigOverrides>) -> Result<Self> {
        let config: SweepConfig = Self::figment(custom_config, overrides)?
            .extract()
            .context("Failed to resolve primesweep configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// The layered provider stack, exposed for `config show`
    pub fn figment(
        custom_config: Option<&str>,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<Figment> {
        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG)); // Embedded defaults

        // A custom config replaces the user and repository files
        if let Some(custom_path) = custom_config {
            ensure!(
                Path::new(custom_path).is_file(),
                "Config file not found: {custom_path}"
            );
            figment = figment.merge(ConfigFile::detect(custom_path));
        } else {
            figment = figment
                .merge(Toml::file(Self::user_config_path()))
                .merge(Toml::file("primesweep.toml"))
                .merge(Json::file("primesweep.json"))
                .merge(Yaml::file("primesweep.yaml"))
                .merge(Yaml::file("primesweep.yml"));
        }

        // The runtime schedule is read when a sweep starts, not at load time
        figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["runtime_schedule"]));

        if let Some(overrides) = overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }

        Ok(figment)
    }

    fn user_config_path() -> String {
        match std::env::var("HOME") {
            Ok(home) => format!("{home}/.config/primesweep/config.toml"),
            Err(_) => "~/.config/primesweep/config.toml".to_string(),
        }
    }
}

/// Provider for a user-named file, picked by extension (TOML when unknown)
enum ConfigFile {
    Toml(Data<Toml>),
    Json(Data<Json>),
    Yaml(Data<Yaml>),
}

impl ConfigFile {
    fn detect(path: &str) -> Self {
        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match extension.as_str() {
            "json" => ConfigFile::Json(Json::file(path)),
            "yaml" | "yml" => ConfigFile::Yaml(Yaml::file(path)),
            _ => ConfigFile::Toml(Toml::file(path)),
        }
    }
}

impl figment::Provider for ConfigFile {
    fn metadata(&self) -> figment::Metadata {
        match self {
            ConfigFile::Toml(p) => p.metadata(),
            ConfigFile::Json(p) => p.metadata(),
            ConfigFile::Yaml(p) => p.metadata(),
        }
    }

    fn data(
        &self,
    ) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        match self {
            ConfigFile::Toml(p) => p.data(),
            ConfigFile::Json(p) => p.data(),
            ConfigFile::Yaml(p) => p.data(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::{Accumulation, Schedule, SchedulePolicy};
    use figment::Jail;

    #[test]
    fn test_config_loads_defaults() {
        Jail::expect_with(|_| {
            let config = SweepConfig::load(None, None).expect("Should load default config");
            assert_eq!(config.limit, 400_000_000);
            assert_eq!(config.workers, None);
            assert_eq!(config.thread_percentage, 100);
            assert_eq!(config.schedule, "runtime");
            assert_eq!(config.accumulation, Accumulation::LocalReduce);
            assert_eq!(config.warmup_limit, 1_000);
            Ok(())
        });
    }

    #[test]
    fn test_repository_file_and_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "primesweep.toml",
                r#"
                    limit = 5000
                    workers = 2
                    schedule = "guided"
                "#,
            )?;
            let config = SweepConfig::load(None, None).unwrap();
            assert_eq!(config.limit, 5_000);
            assert_eq!(config.workers, Some(2));
            assert_eq!(config.schedule(), Schedule::new(SchedulePolicy::Guided));

            // Environment beats the file
            jail.set_env("PRIMESWEEP_WORKERS", 6);
            jail.set_env("PRIMESWEEP_SCHEDULE", "dynamic,50");
            let config = SweepConfig::load(None, None).unwrap();
            assert_eq!(config.workers, Some(6));
            assert_eq!(
                config.schedule(),
                Schedule::new(SchedulePolicy::Dynamic).with_chunk_size(50)
            );

            // Command-line flags beat the environment
            let overrides = ConfigOverrides {
                workers: Some(3),
                ..Default::default()
            };
            let config = SweepConfig::load(None, Some(&overrides)).unwrap();
            assert_eq!(config.workers, Some(3));
            assert_eq!(config.limit, 5_000);
            Ok(())
        });
    }

    #[test]
    fn test_runtime_schedule_env_is_not_a_config_key() {
        Jail::expect_with(|jail| {
            jail.set_env("PRIMESWEEP_RUNTIME_SCHEDULE", "guided");
            let config = SweepConfig::load(None, None).unwrap();
            assert_eq!(config.schedule, "runtime");
            Ok(())
        });
    }

    #[test]
    fn test_custom_config_by_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("sweep.json", r#"{ "limit": 777, "accumulation": "atomic" }"#)?;
            jail.create_file("sweep.yml", "limit: 888\nchunk_size: 16\nschedule: static\n")?;
            // Ignored when a custom file is named
            jail.create_file("primesweep.toml", "limit = 999")?;

            let json = SweepConfig::load(Some("sweep.json"), None).unwrap();
            assert_eq!(json.limit, 777);
            assert_eq!(json.accumulation, Accumulation::SharedAtomic);

            let yaml = SweepConfig::load(Some("sweep.yml"), None).unwrap();
            assert_eq!(yaml.limit, 888);
            assert_eq!(
                yaml.schedule(),
                Schedule::new(SchedulePolicy::Static).with_chunk_size(16)
            );
            Ok(())
        });
    }

    #[test]
    fn test_missing_custom_config_is_an_error() {
        Jail::expect_with(|_| {
            let err = SweepConfig::load(Some("non_existent.toml"), None).unwrap_err();
            assert!(err.to_string().contains("not found"), "{err}");
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("primesweep.toml", "limit = 1")?;
            assert!(SweepConfig::load(None, None).is_err());

            jail.create_file("primesweep.toml", "workers = 0")?;
            assert!(SweepConfig::load(None, None).is_err());

            jail.create_file("primesweep.toml", "chunk_size = 0")?;
            assert!(SweepConfig::load(None, None).is_err());

            jail.create_file("primesweep.toml", "thread_percentage = 0")?;
            assert!(SweepConfig::load(None, None).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_unknown_schedule_falls_back_to_static() {
        let config = SweepConfig {
            schedule: "round-robin".to_string(),
            ..Default::default()
        };
        assert_eq!(config.schedule(), Schedule::default());
    }
}
