//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-pushpull-io`, `--debug-pushpull-transports`, etc.

use std::collections::BTreeSet;
use std::env;

use crate::KNOWN_CRATES;

/// Per-crate debug flags parsed from the command line and environment
///
/// # Example
/// ```rust
/// use pushpull_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-pushpull-io".to_string()]);
/// assert!(flags.is_enabled("pushpull-io"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrateDebugFlags {
    pub enabled_crates: BTreeSet<String>,
}

impl CrateDebugFlags {
    /// Parse debug flags from command-line arguments
    ///
    /// Looks for arguments matching `--debug-{crate-name}`; `--debug-all`
    /// enables every known crate. Unknown crate names are kept so external
    /// targets can be debugged too.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = CrateDebugFlags::default();

        for arg in args {
            if arg == "--debug-all" {
                flags.enable_all();
                continue;
            }
            if let Some(crate_name) = arg.strip_prefix("--debug-") {
                if !crate_name.is_empty() {
                    flags.enabled_crates.insert(crate_name.to_string());
                }
            }
        }

        flags
    }

    fn enable_all(&mut self) {
        for crate_name in KNOWN_CRATES {
            self.enabled_crates.insert(crate_name.to_string());
        }
    }

    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains(crate_name)
    }

    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// Returns `DEBUG` if enabled for the crate, `INFO` otherwise.
    pub fn log_level(&self, crate_name: &str) -> tracing::Level {
        if self.is_enabled(crate_name) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Build an `EnvFilter` directive string
    ///
    /// Crate names are converted to their module path form
    /// (`pushpull-io` → `pushpull_io`), since tracing targets use underscores.
    /// Format: `"<base>,pushpull_io=debug"`.
    pub fn to_filter_string(&self, base_level: &str) -> String {
        let mut filters = vec![base_level.to_lowercase()];
        for crate_name in &self.enabled_crates {
            filters.push(format!("{}=debug", crate_name.replace('-', "_")));
        }
        filters.join(",")
    }
}

/// Parse debug flags from `std::env::args()` and the `PUSHPULL_DEBUG` variable
///
/// `PUSHPULL_DEBUG` takes comma-separated crate names, or `all`.
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());
    if let Ok(env_var) = env::var("PUSHPULL_DEBUG") {
        merge_env_flags(&mut flags, &env_var);
    }
    flags
}

fn merge_env_flags(flags: &mut CrateDebugFlags, env_var: &str) {
    if env_var.trim() == "all" {
        flags.enable_all();
        return;
    }
    for crate_name in env_var.split(',') {
        let crate_name = crate_name.trim();
        if !crate_name.is_empty() {
            flags.enabled_crates.insert(crate_name.to_string());
        }
    }
}

/// Help text for debug flags
pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for specific crate

Available crates:
  {}

Environment Variable:
  PUSHPULL_DEBUG={{crate-name}}[,{{crate-name}}]
  PUSHPULL_DEBUG=all
"#,
        KNOWN_CRATES.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_crate_flag() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-pushpull-io".to_string()]);
        assert!(flags.is_enabled("pushpull-io"));
        assert!(!flags.is_enabled("pushpull-transports"));
    }

    #[test]
    fn test_debug_all() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-all".to_string()]);
        for crate_name in KNOWN_CRATES {
            assert!(flags.is_enabled(crate_name), "{} should be enabled", crate_name);
        }
    }

    #[test]
    fn test_non_debug_args_ignored() {
        let flags = CrateDebugFlags::from_args(vec![
            "--port".to_string(),
            "5560".to_string(),
            "--debug-".to_string(),
        ]);
        assert!(!flags.any_enabled());
    }

    #[test]
    fn test_filter_string_uses_module_paths() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-pushpull-io".to_string()]);
        assert_eq!(flags.to_filter_string("INFO"), "info,pushpull_io=debug");
    }

    #[test]
    fn test_env_merge() {
        let mut flags = CrateDebugFlags::default();
        merge_env_flags(&mut flags, "pushpull-transports, pushpull-io ,");
        assert!(flags.is_enabled("pushpull-transports"));
        assert!(flags.is_enabled("pushpull-io"));
        assert_eq!(flags.log_level("pushpull-io"), tracing::Level::DEBUG);
        assert_eq!(flags.log_level("pushpull-config"), tracing::Level::INFO);
    }
}
