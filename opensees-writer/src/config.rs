//! Environment configuration, read once at startup

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::context::EmissionContext;
use crate::format::DoubleFormatter;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WriterConfig {
    pub opensees_path: String,
    pub opensees_mp_path: String,
    pub mpi_launcher: String,
    pub stko_install_dir: Option<PathBuf>,
    /// Terminal command and its leading arguments
    pub terminal: Vec<String>,
    pub indent_unit: String,
    pub precision: Option<usize>,
    pub host: String,
    pub port: u16,
    pub debug_export: Option<PathBuf>,
}

impl WriterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let opensees_path = lookup("OPENSEES_PATH").unwrap_or_else(|| {
            // Prefer a repo-local solver binary if present
            if Path::new("./bin/OpenSees").exists() {
                "./bin/OpenSees".to_string()
            } else {
                "OpenSees".to_string()
            }
        });
        // The runner script cds into the output directory, so relative paths would break
        let opensees_path = std::fs::canonicalize(&opensees_path)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or(opensees_path);

        let terminal = lookup("STKO_TERMINAL")
            .map(|t| t.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(default_terminal);

        let precision = lookup("STKO_TCL_PRECISION").and_then(|p| match p.trim().parse::<usize>() {
            Ok(0) | Err(_) => {
                tracing::warn!("Ignoring invalid STKO_TCL_PRECISION '{}'", p);
                None
            }
            Ok(digits) => Some(digits),
        });

        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(8085);

        Self {
            opensees_path,
            opensees_mp_path: lookup("OPENSEES_MP_PATH").unwrap_or_else(|| "OpenSeesMP".to_string()),
            mpi_launcher: lookup("MPI_LAUNCHER").unwrap_or_else(|| "mpiexec".to_string()),
            stko_install_dir: lookup("STKO_INSTALL_DIR").map(PathBuf::from),
            terminal,
            indent_unit: lookup("STKO_TCL_INDENT")
                .map(|i| i.replace("\\t", "\t"))
                .unwrap_or_else(|| "\t".to_string()),
            precision,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            debug_export: lookup("STKO_DEBUG_EXPORT").map(PathBuf::from),
        }
    }

    pub fn formatter(&self) -> DoubleFormatter {
        DoubleFormatter::new(self.precision)
    }

    /// Fresh emission context using the configured indent and precision
    pub fn context(&self, output_directory: &Path) -> EmissionContext {
        EmissionContext::new(output_directory).with_formatting(&self.indent_unit, self.formatter())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn default_terminal() -> Vec<String> {
    if cfg!(windows) {
        vec!["cmd".into(), "/C".into(), "start".into()]
    } else {
        vec!["x-terminal-emulator".into(), "-e".into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> WriterConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WriterConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]);
        assert_eq!(c.opensees_mp_path, "OpenSeesMP");
        assert_eq!(c.mpi_launcher, "mpiexec");
        assert_eq!(c.indent_unit, "\t");
        assert_eq!(c.precision, None);
        assert_eq!(c.bind_address(), "0.0.0.0:8085");
        assert!(c.stko_install_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            ("OPENSEES_PATH", "/opt/opensees/does-not-exist"),
            ("STKO_TCL_INDENT", "  "),
            ("STKO_TCL_PRECISION", "6"),
            ("STKO_TERMINAL", "xterm -hold -e"),
            ("PORT", "9000"),
        ]);
        assert_eq!(c.opensees_path, "/opt/opensees/does-not-exist");
        assert_eq!(c.indent_unit, "  ");
        assert_eq!(c.precision, Some(6));
        assert_eq!(c.terminal, vec!["xterm", "-hold", "-e"]);
        assert_eq!(c.port, 9000);
    }

    #[test]
    fn test_invalid_precision_ignored() {
        assert_eq!(config(&[("STKO_TCL_PRECISION", "0")]).precision, None);
        assert_eq!(config(&[("STKO_TCL_PRECISION", "many")]).precision, None);
        assert_eq!(config(&[("STKO_TCL_INDENT", "\\t\\t")]).indent_unit, "\t\t");
    }
}
