//! Run configuration.
//!
//! A [`NetworkConfig`] is a sparse set of options, read from a TOML file,
//! from command-line flags, or both; [`NetworkConfig::merge`] lets flags
//! override the file. [`NetworkConfig::resolve`] checks the combination and
//! produces the concrete [`NetworkSettings`] a run uses.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::expand::DirectionPolicy;

/// Geometry column values that mean "this network has no geometry".
const NO_GEOMETRY: [&str; 3] = ["NULL", "NONE", "NO"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct NetworkConfig {
    pub db_path: Option<PathBuf>,
    pub table: Option<String>,
    pub from_column: Option<String>,
    pub to_column: Option<String>,
    pub cost_column: Option<String>,
    pub geometry_column: Option<String>,
    pub name_column: Option<String>,
    pub oneway_tofrom: Option<String>,
    pub oneway_fromto: Option<String>,
    pub direction: Option<DirectionPolicy>,
    pub a_star: Option<bool>,
    pub output_table: Option<String>,
    pub virtual_table: Option<String>,
    pub overwrite_output: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("did you forget setting the --{0} argument ?")]
    Missing(&'static str),

    #[error("using --unidirectional combined with --oneway is forbidden")]
    OnewayNeedsBidirectional,

    #[error("using --oneway-tofrom requires --oneway-fromto as well")]
    OnewayPairIncomplete,

    #[error("NO-GEOMETRY strictly requires to specify some --cost-column argument")]
    NoGeometryNeedsCost,

    #[error("--virtual-table requires --output-table")]
    VirtualWithoutOutput,
}

/// Validated options for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSettings {
    pub table: String,
    pub from_column: String,
    pub to_column: String,
    pub cost_column: Option<String>,
    /// `None` when the network has no geometry.
    pub geometry_column: Option<String>,
    pub name_column: Option<String>,
    pub oneway_fromto: Option<String>,
    pub oneway_tofrom: Option<String>,
    pub policy: DirectionPolicy,
    /// Effective A* support; always false without geometry.
    pub a_star: bool,
    pub output_table: Option<String>,
    pub virtual_table: Option<String>,
    pub overwrite_output: bool,
}

impl NetworkSettings {
    /// Whether this run writes a NETWORK-DATA table.
    #[must_use]
    pub const fn builds_output(&self) -> bool {
        self.output_table.is_some()
    }
}

impl NetworkConfig {
    /// Read a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str::<Self>(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Overlay `overrides` on `self`; every option set in `overrides` wins.
    #[must_use]
    pub fn merge(self, overrides: Self) -> Self {
        Self {
            db_path: overrides.db_path.or(self.db_path),
            table: overrides.table.or(self.table),
            from_column: overrides.from_column.or(self.from_column),
            to_column: overrides.to_column.or(self.to_column),
            cost_column: overrides.cost_column.or(self.cost_column),
            geometry_column: overrides.geometry_column.or(self.geometry_column),
            name_column: overrides.name_column.or(self.name_column),
            oneway_tofrom: overrides.oneway_tofrom.or(self.oneway_tofrom),
            oneway_fromto: overrides.oneway_fromto.or(self.oneway_fromto),
            direction: overrides.direction.or(self.direction),
            a_star: overrides.a_star.or(self.a_star),
            output_table: overrides.output_table.or(self.output_table),
            virtual_table: overrides.virtual_table.or(self.virtual_table),
            overwrite_output: overrides.overwrite_output.or(self.overwrite_output),
        }
    }

    /// Check the option combination.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn resolve(&self) -> Result<NetworkSettings, ConfigError> {
        let table = required(self.table.as_ref(), "table")?;
        let from_column = required(self.from_column.as_ref(), "from-column")?;
        let to_column = required(self.to_column.as_ref(), "to-column")?;
        let geometry = required(self.geometry_column.as_ref(), "geometry-column")?;
        let policy = self.direction.unwrap_or_default();

        if self.oneway_tofrom.is_some() || self.oneway_fromto.is_some() {
            if policy == DirectionPolicy::Unidirectional {
                return Err(ConfigError::OnewayNeedsBidirectional);
            }
            if self.oneway_tofrom.is_none() || self.oneway_fromto.is_none() {
                return Err(ConfigError::OnewayPairIncomplete);
            }
        }

        let mut a_star = self.a_star.unwrap_or(true);
        let geometry_column = if NO_GEOMETRY
            .iter()
            .any(|word| word.eq_ignore_ascii_case(&geometry))
        {
            if self.cost_column.is_none() {
                return Err(ConfigError::NoGeometryNeedsCost);
            }
            if a_star {
                tracing::warn!("a NO-GEOMETRY graph will be processed; A* support is disabled");
            }
            a_star = false;
            None
        } else {
            Some(geometry)
        };

        if self.virtual_table.is_some() && self.output_table.is_none() {
            return Err(ConfigError::VirtualWithoutOutput);
        }

        Ok(NetworkSettings {
            table,
            from_column,
            to_column,
            cost_column: self.cost_column.clone(),
            geometry_column,
            name_column: self.name_column.clone(),
            oneway_fromto: self.oneway_fromto.clone(),
            oneway_tofrom: self.oneway_tofrom.clone(),
            policy,
            a_star,
            output_table: self.output_table.clone(),
            virtual_table: self.virtual_table.clone(),
            overwrite_output: self.overwrite_output.unwrap_or(false),
        })
    }
}

fn required(value: Option<&String>, flag: &'static str) -> Result<String, ConfigError> {
    value.cloned().ok_or(ConfigError::Missing(flag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn base() -> NetworkConfig {
        NetworkConfig {
            table: Some("roads".into()),
            from_column: Some("node_from".into()),
            to_column: Some("node_to".into()),
            geometry_column: Some("geom".into()),
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn defaults_are_bidirectional_with_a_star() {
        let settings = base().resolve().expect("valid");
        assert_eq!(settings.policy, DirectionPolicy::Bidirectional);
        assert!(settings.a_star);
        assert!(!settings.overwrite_output);
        assert!(!settings.builds_output());
    }

    #[test]
    fn missing_required_option_is_named() {
        let cfg = NetworkConfig {
            to_column: None,
            ..base()
        };
        assert_eq!(cfg.resolve(), Err(ConfigError::Missing("to-column")));
    }

    #[test]
    fn oneway_requires_bidirectional() {
        let cfg = NetworkConfig {
            oneway_fromto: Some("ft".into()),
            oneway_tofrom: Some("tf".into()),
            direction: Some(DirectionPolicy::Unidirectional),
            ..base()
        };
        assert_eq!(cfg.resolve(), Err(ConfigError::OnewayNeedsBidirectional));
    }

    #[test]
    fn oneway_columns_come_in_pairs() {
        let cfg = NetworkConfig {
            oneway_fromto: Some("ft".into()),
            ..base()
        };
        assert_eq!(cfg.resolve(), Err(ConfigError::OnewayPairIncomplete));
    }

    #[test]
    fn no_geometry_needs_cost_and_disables_a_star() {
        let cfg = NetworkConfig {
            geometry_column: Some("none".into()),
            ..base()
        };
        assert_eq!(cfg.resolve(), Err(ConfigError::NoGeometryNeedsCost));

        let settings = NetworkConfig {
            cost_column: Some("cost".into()),
            ..cfg
        }
        .resolve()
        .expect("valid");
        assert_eq!(settings.geometry_column, None);
        assert!(!settings.a_star);
    }

    #[test]
    fn virtual_table_needs_output_table() {
        let cfg = NetworkConfig {
            virtual_table: Some("v".into()),
            ..base()
        };
        assert_eq!(cfg.resolve(), Err(ConfigError::VirtualWithoutOutput));
    }

    #[test]
    fn flags_override_file_values() {
        let file = NetworkConfig {
            cost_column: Some("file_cost".into()),
            a_star: Some(false),
            ..base()
        };
        let flags = NetworkConfig {
            cost_column: Some("flag_cost".into()),
            ..NetworkConfig::default()
        };
        let merged = file.merge(flags);
        assert_eq!(merged.cost_column.as_deref(), Some("flag_cost"));
        assert_eq!(merged.a_star, Some(false));
        assert_eq!(merged.table.as_deref(), Some("roads"));
    }

    #[test]
    fn loads_kebab_case_toml() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"
table = "roads"
from-column = "a"
to-column = "b"
geometry-column = "geom"
direction = "unidirectional"
a-star = false
output-table = "roads_net"
"#
        )
        .expect("write config");

        let cfg = NetworkConfig::load(file.path()).expect("load");
        let settings = cfg.resolve().expect("valid");
        assert_eq!(settings.policy, DirectionPolicy::Unidirectional);
        assert!(!settings.a_star);
        assert_eq!(settings.output_table.as_deref(), Some("roads_net"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "tabel = \"roads\"").expect("write config");
        assert!(NetworkConfig::load(file.path()).is_err());
    }
}
