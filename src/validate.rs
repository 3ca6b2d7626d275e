use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
};

use crate::{
    config::{ActionSpec, Config},
    error::VALIDATION_EXIT_CODE,
    journal::{ActionLog, LogEntry, Status},
};

/// A missing path or executable, keyed by the command or action label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub label: String,
    pub target: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.label, self.target)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Report {
    pub total_commands: usize,
    pub total_actions: usize,
    pub missing_paths: Vec<Finding>,
    pub missing_executables: Vec<Finding>,
}

impl Report {
    pub fn ok(&self) -> bool {
        self.missing_paths.is_empty() && self.missing_executables.is_empty()
    }

    pub fn exit_code(&self) -> i32 {
        if self.ok() {
            0
        } else {
            VALIDATION_EXIT_CODE
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CONFIG VALIDATION SUMMARY")?;
        writeln!(f, "  Total commands : {}", self.total_commands)?;
        writeln!(f, "  Total actions  : {}", self.total_actions)?;
        writeln!(f, "  Missing paths  : {}", self.missing_paths.len())?;
        for finding in &self.missing_paths {
            writeln!(f, "    PATH ! {}", finding)?;
        }
        writeln!(f, "  Missing execs  : {}", self.missing_executables.len())?;
        for finding in &self.missing_executables {
            writeln!(f, "    EXEC ! {}", finding)?;
        }
        if self.ok() {
            write!(f, "Result: OK")
        } else {
            write!(f, "Result: WARN (issues found)")
        }
    }
}

/// Checks every enabled command path and action executable. Missing things
/// become findings; nothing here fails.
pub fn validate(config: &Config, log: &dyn ActionLog) -> Report {
    let mut report = Report::default();
    let mut located: HashMap<String, Option<PathBuf>> = HashMap::new();

    for entry in config.commands() {
        report.total_commands += 1;
        let label = entry.label();

        if let Some(path) = config.command_path(entry.command) {
            let shown = path.to_string_lossy().to_string();
            if path.exists() {
                log.record(LogEntry::new(
                    Status::Ok,
                    "CONFIG_TEST_PATH_CHECK",
                    format!("{} | {} | OK", label, shown),
                ));
            } else {
                log.record(LogEntry::new(
                    Status::Warn,
                    "CONFIG_TEST_PATH_CHECK",
                    format!("{} | {} | MISSING", label, shown),
                ));
                report.missing_paths.push(Finding {
                    label: label.clone(),
                    target: shown,
                });
            }
        }

        for action in &entry.command.actions {
            report.total_actions += 1;
            let Some(program) = config.program_of(&action.spec) else {
                let target = match &action.spec {
                    ActionSpec::Generic {
                        executable_alias: Some(alias),
                        ..
                    } => {
                        log.record(LogEntry::new(Status::Warn, "ALIAS_MISSING", alias.as_str()));
                        format!("alias:{}", alias)
                    }
                    _ => action.spec.kind().to_string(),
                };
                report.missing_executables.push(Finding {
                    label: entry.action_label(action),
                    target,
                });
                continue;
            };
            let found = located
                .entry(program.clone())
                .or_insert_with(|| {
                    let found = locate_executable(&program);
                    log.record(match &found {
                        Some(at) => LogEntry::new(
                            Status::Ok,
                            "CONFIG_TEST_EXEC_CHECK",
                            format!("{} | {} | OK", program, at.to_string_lossy()),
                        ),
                        None => LogEntry::new(
                            Status::Warn,
                            "CONFIG_TEST_EXEC_CHECK",
                            format!("{} | MISSING", program),
                        ),
                    });
                    found
                });
            if found.is_none() {
                report.missing_executables.push(Finding {
                    label: entry.action_label(action),
                    target: program,
                });
            }
        }
    }

    for finding in &report.missing_paths {
        log.record(LogEntry::new(
            Status::Warn,
            "CONFIG_TEST_PATH_MISSING",
            finding.to_string(),
        ));
    }
    for finding in &report.missing_executables {
        log.record(LogEntry::new(
            Status::Warn,
            "CONFIG_TEST_EXEC_MISSING",
            finding.to_string(),
        ));
    }
    log.record(if report.ok() {
        LogEntry::new(Status::Ok, "CONFIG_TEST_RESULT", "OK")
    } else {
        LogEntry::new(
            Status::Warn,
            "CONFIG_TEST_RESULT",
            format!(
                "WARN paths={} execs={}",
                report.missing_paths.len(),
                report.missing_executables.len()
            ),
        )
    });
    report
}

/// `program` comes from [`Config::program_of`], so relative paths are
/// already anchored; anything else goes through `PATH`.
pub fn locate_executable(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.is_absolute() {
        return candidate.is_file().then(|| candidate.to_owned());
    }
    which::which(program).ok()
}
