use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use {
    anyhow::Result,
    herald_channels::ChannelRegistry,
    herald_config::{AlertRecord, HeraldConfig, Severity, ValidationResult},
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

pub fn check(explicit: Option<&Path>) -> Result<()> {
    let config = match herald_config::find_config_file(explicit) {
        Some(path) => {
            eprintln!("Checking {}\n", path.display());
            herald_config::load_config(&path)?
        },
        None => {
            eprintln!("No config file found; checking defaults.\n");
            HeraldConfig::default()
        },
    };

    let mut result = herald_config::validate(&config);
    if !result.has_errors()
        && let Err(e) = ChannelRegistry::from_config(&config.channels)
    {
        result.push(Severity::Error, "channels", e.to_string());
    }
    check_alerts(&config, Path::new(&config.alerts_path), &mut result);

    for d in &result.diagnostics {
        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
        };
        eprintln!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message);
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if !result.diagnostics.is_empty() {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

/// Validate every persisted alert definition under `dir`. Files the router
/// would skip at startup are reported as errors.
fn check_alerts(config: &HeraldConfig, dir: &Path, result: &mut ValidationResult) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            result.push(
                Severity::Warning,
                "alerts_path",
                format!("{} does not exist and will be created", dir.display()),
            );
            return;
        },
        Err(e) => {
            result.push(Severity::Error, "alerts_path", format!("{}: {e}", dir.display()));
            return;
        },
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("yml" | "yaml")
            )
        })
        .collect();
    paths.sort();

    let channel_ids: HashSet<&str> = config.channels.iter().map(|c| c.id()).collect();

    for path in paths {
        let label = path.display().to_string();
        let record = match std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| AlertRecord::from_yaml(&raw).map_err(anyhow::Error::from))
        {
            Ok(record) => record,
            Err(e) => {
                result.push(Severity::Error, label, e.to_string());
                continue;
            },
        };

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if stem != record.alert_id {
            result.push(
                Severity::Error,
                label,
                format!("file name does not match alert id '{}'", record.alert_id),
            );
            continue;
        }
        if let Err(e) = herald_routing::validate_definition(&record.alert_id, &record.schedule) {
            result.push(Severity::Error, label, e.to_string());
            continue;
        }
        for params in &record.schedule {
            if !channel_ids.contains(params.router_id.as_str()) {
                result.push(
                    Severity::Warning,
                    format!("{label} ({})", params.id),
                    format!("unknown channel '{}'", params.router_id),
                );
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_broken_and_misrouted_alert_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("greg.yml"),
            "alert: greg\nschedule:\n  - id: all_day\n    router_id: gmail\n",
        )
        .unwrap();
        std::fs::write(tmp.path().join("bad.yml"), "alert: [unterminated").unwrap();
        std::fs::write(
            tmp.path().join("cron.yaml"),
            "alert: cron\nschedule:\n  - id: a\n    router_id: gmail\n    start: sometimes\n",
        )
        .unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(
            tmp.path().join("old-name.yml"),
            "alert: db-down\nschedule:\n  - id: x\n    router_id: gmail\n",
        )
        .unwrap();

        let mut result = ValidationResult::default();
        check_alerts(&HeraldConfig::default(), tmp.path(), &mut result);

        assert_eq!(result.count(Severity::Error), 3);
        assert_eq!(result.count(Severity::Warning), 1);
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.severity == Severity::Warning && d.message.contains("gmail"))
        );
    }

    #[test]
    fn missing_alerts_dir_is_a_warning() {
        let tmp = tempfile::tempdir().unwrap();
        let mut result = ValidationResult::default();
        check_alerts(
            &HeraldConfig::default(),
            &tmp.path().join("absent"),
            &mut result,
        );
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 1);
    }
}
