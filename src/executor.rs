use std::{
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use tokio::process::Command;

use crate::{
    config::{Action, ActionSpec, CommandEntry, Config},
    error::ExecError,
    journal::{ActionLog, LogEntry, Status},
    template::{self, Context},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Run,
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn display(&self) -> String {
        template::display_command(&self.program, &self.args)
    }

    async fn run(&self) -> std::io::Result<ExitStatus> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        command.spawn()?.wait().await
    }
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub label: String,
    pub kind: &'static str,
    pub mode: Mode,
    pub command: Option<String>,
    pub cwd: Option<PathBuf>,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    /// Set after a successful run when the front end should close.
    pub close: bool,
}

pub struct Executor<'a> {
    config: &'a Config,
    log: &'a dyn ActionLog,
    close_on_action: bool,
}

impl<'a> Executor<'a> {
    pub fn new(config: &'a Config, log: &'a dyn ActionLog) -> Self {
        Self {
            config,
            log,
            close_on_action: config.settings.close_on_action,
        }
    }

    pub fn force_close(mut self, force: bool) -> Self {
        self.close_on_action |= force;
        self
    }

    pub fn resolve(&self, entry: &CommandEntry<'_>, action: &Action) -> Result<Invocation, ExecError> {
        let path = self.config.command_path(entry.command);
        let program = self
            .config
            .program_of(&action.spec)
            .ok_or_else(|| ExecError::MissingExecutable(entry.action_label(action)))?;
        match &action.spec {
            ActionSpec::GitBash => {
                let path = path.ok_or_else(|| ExecError::MissingPath(entry.label()))?;
                Ok(git_bash_invocation(program, &path))
            }
            ActionSpec::Generic { args_template, .. } => {
                let ctx = self.context(entry, path.as_deref());
                let args = template::substitute(args_template, &ctx).map_err(|err| match err {
                    ExecError::UnknownVariable(name) if name == "path" && path.is_none() => {
                        ExecError::MissingPath(entry.label())
                    }
                    other => other,
                })?;
                Ok(Invocation {
                    program,
                    args: template::split_args(&args)?,
                    cwd: path.filter(|path| path.is_dir()),
                })
            }
        }
    }

    pub async fn execute(&self, entry: &CommandEntry<'_>, action: &Action, mode: Mode) -> Outcome {
        let mut outcome = Outcome {
            label: entry.action_label(action),
            kind: action.spec.kind(),
            mode,
            command: None,
            cwd: None,
            success: false,
            exit_code: None,
            error: None,
            close: false,
        };

        let invocation = match self.resolve(entry, action) {
            Ok(invocation) => invocation,
            Err(err) => {
                outcome.error = Some(err.to_string());
                self.record(&outcome);
                return outcome;
            }
        };
        let command = invocation.display();
        outcome.command = Some(command.clone());
        outcome.cwd = invocation.cwd.clone();

        if mode == Mode::DryRun {
            outcome.success = true;
            self.record(&outcome);
            return outcome;
        }

        log::info!("running {}", command);
        match invocation.run().await {
            Ok(status) => {
                outcome.exit_code = status.code();
                if status.success() {
                    outcome.success = true;
                    outcome.close = self.close_on_action;
                } else {
                    outcome.error = Some(
                        ExecError::NonZeroExit {
                            command,
                            code: status.code(),
                        }
                        .to_string(),
                    );
                }
            }
            Err(source) => {
                outcome.error = Some(
                    ExecError::Launch {
                        program: invocation.program.clone(),
                        source,
                    }
                    .to_string(),
                );
            }
        }
        self.record(&outcome);
        outcome
    }

    fn context(&self, entry: &CommandEntry<'_>, path: Option<&Path>) -> Context {
        let ctx = Context::new()
            .with("label", entry.command.label.as_str())
            .with("group", entry.group.name.as_str())
            .with(
                "subgroup",
                entry.subgroup.map(|s| s.name.as_str()).unwrap_or_default(),
            )
            .with("configDir", self.config.config_dir().to_string_lossy());
        match path {
            Some(path) => ctx.with("path", path.to_string_lossy()),
            None => ctx,
        }
    }

    fn record(&self, outcome: &Outcome) {
        let event = match outcome.mode {
            Mode::Run => "EXECUTE",
            Mode::DryRun => "DRY_RUN",
        };
        let status = match (outcome.success, outcome.mode) {
            (false, _) => Status::Error,
            (true, Mode::Run) => Status::Ok,
            (true, Mode::DryRun) => Status::Info,
        };
        let mut detail = format!("{} [{}]", outcome.label, outcome.kind);
        if let Some(command) = &outcome.command {
            detail.push_str(&format!(" -> {}", command));
        }
        if let Some(code) = outcome.exit_code {
            detail.push_str(&format!(" (exit {})", code));
        }
        if let Some(error) = &outcome.error {
            detail.push_str(&format!(" ERROR {}", error));
        }
        self.log.record(LogEntry::new(status, event, detail));
    }
}

fn git_bash_invocation(program: String, path: &Path) -> Invocation {
    if cfg!(target_os = "windows") {
        Invocation {
            program,
            args: vec![format!("--cd={}", path.to_string_lossy())],
            cwd: None,
        }
    } else {
        Invocation {
            program,
            args: Vec::new(),
            cwd: Some(path.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::journal::testing::MemoryLog;

    fn config_in(dir: &Path, value: serde_json::Value) -> Config {
        Config::from_json(&value.to_string(), dir).unwrap()
    }

    fn example(dir: &Path) -> Config {
        config_in(
            dir,
            json!({
                "groups": [ { "name": "git", "subgroups": [ { "name": "repoA", "commands": [
                    { "label": "status", "actions": [
                        { "kind": "generic", "executable": "git", "argsTemplate": "status" }
                    ] },
                    { "label": "repo", "path": "repo", "actions": [
                        { "kind": "generic", "name": "log", "executable": "git", "argsTemplate": "-C {path} log --format=\"%h {{{label}}}\"" },
                        { "kind": "git-bash", "name": "bash" },
                        { "kind": "generic", "name": "bad", "executable": "git", "argsTemplate": "{nope}" }
                    ] },
                    { "label": "nopath", "actions": [
                        { "kind": "generic", "executable": "git", "argsTemplate": "-C {path}" },
                        { "kind": "git-bash", "name": "bash" }
                    ] }
                ] } ] } ]
            }),
        )
    }

    #[test]
    fn resolves_generic_action() {
        let dir = tempfile::tempdir().unwrap();
        let config = example(dir.path());
        let log = MemoryLog::default();
        let executor = Executor::new(&config, &log);
        let target = config.find("git/repoA/status").unwrap();
        let invocation = executor.resolve(&target.entry, target.actions[0]).unwrap();
        assert_eq!(invocation.program, "git");
        assert_eq!(invocation.args, vec!["status"]);
        assert_eq!(invocation.cwd, None);
        assert_eq!(invocation.display(), "git status");
    }

    #[test]
    fn substitutes_context_and_uses_existing_dir_as_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("repo")).unwrap();
        let config = example(dir.path());
        let log = MemoryLog::default();
        let executor = Executor::new(&config, &log);
        let target = config.find("git/repoA/repo/log").unwrap();
        let invocation = executor.resolve(&target.entry, target.actions[0]).unwrap();
        let repo = dir.path().join("repo");
        assert_eq!(
            invocation.args,
            vec![
                "-C".to_string(),
                repo.to_string_lossy().to_string(),
                "log".to_string(),
                "--format=%h {repo}".to_string(),
            ]
        );
        assert_eq!(invocation.cwd, Some(repo));
    }

    #[test]
    fn git_bash_targets_command_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = example(dir.path());
        let log = MemoryLog::default();
        let executor = Executor::new(&config, &log);
        let target = config.find("git/repoA/repo/bash").unwrap();
        let invocation = executor.resolve(&target.entry, target.actions[0]).unwrap();
        let repo = dir.path().join("repo");
        if cfg!(target_os = "windows") {
            assert_eq!(invocation.args, vec![format!("--cd={}", repo.to_string_lossy())]);
        } else {
            assert_eq!(invocation.program, "bash");
            assert_eq!(invocation.cwd, Some(repo));
        }
    }

    #[test]
    fn path_placeholders_without_path_fail_to_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let config = example(dir.path());
        let log = MemoryLog::default();
        let executor = Executor::new(&config, &log);
        let target = config.find("git/repoA/nopath").unwrap();
        for action in target.actions {
            let err = executor.resolve(&target.entry, action).unwrap_err();
            assert!(matches!(err, ExecError::MissingPath(ref label) if label == "git/repoA/nopath"));
        }
    }

    #[tokio::test]
    async fn dry_run_matches_run_resolution_and_does_not_invoke() {
        let dir = tempfile::tempdir().unwrap();
        let config = example(dir.path());
        let log = MemoryLog::default();
        let executor = Executor::new(&config, &log);
        let target = config.find("git/repoA/status").unwrap();
        let resolved = executor.resolve(&target.entry, target.actions[0]).unwrap();

        let first = executor
            .execute(&target.entry, target.actions[0], Mode::DryRun)
            .await;
        let second = executor
            .execute(&target.entry, target.actions[0], Mode::DryRun)
            .await;
        assert!(first.success);
        assert_eq!(first.exit_code, None);
        assert!(!first.close);
        assert_eq!(first.command.as_deref(), Some("git status"));
        assert_eq!(first.command, second.command);
        assert_eq!(first.command, Some(resolved.display()));
        let events = log.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, Status::Info);
        assert_eq!(events[0].1, "DRY_RUN");
        assert_eq!(events[0].2, "git/repoA/status/generic [generic] -> git status");
    }

    #[test]
    fn undefined_alias_fails_to_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(
            dir.path(),
            json!({ "groups": [ { "name": "g", "commands": [
                { "label": "c", "actions": [ { "kind": "generic", "executableAlias": "ghost" } ] }
            ] } ] }),
        );
        let log = MemoryLog::default();
        let executor = Executor::new(&config, &log);
        let target = config.find("g/c").unwrap();
        let err = executor.resolve(&target.entry, target.actions[0]).unwrap_err();
        assert!(matches!(err, ExecError::MissingExecutable(ref label) if label == "g/c/generic"));
    }

    #[tokio::test]
    async fn resolution_failure_is_isolated_to_the_action() {
        let dir = tempfile::tempdir().unwrap();
        let config = example(dir.path());
        let log = MemoryLog::default();
        let executor = Executor::new(&config, &log);
        let target = config.find("git/repoA/repo/bad").unwrap();
        let outcome = executor
            .execute(&target.entry, target.actions[0], Mode::Run)
            .await;
        assert!(!outcome.success);
        assert!(outcome.command.is_none());
        assert!(outcome.error.unwrap().contains("nope"));
        assert_eq!(log.events()[0].0, Status::Error);
    }

    #[tokio::test]
    async fn launch_failure_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(
            dir.path(),
            json!({ "groups": [ { "name": "g", "commands": [
                { "label": "c", "actions": [ { "kind": "generic", "executable": "command-board-no-such-tool-xyz" } ] }
            ] } ] }),
        );
        let log = MemoryLog::default();
        let executor = Executor::new(&config, &log).force_close(true);
        let target = config.find("g/c").unwrap();
        let outcome = executor
            .execute(&target.entry, target.actions[0], Mode::Run)
            .await;
        assert!(!outcome.success);
        assert!(!outcome.close);
        assert!(outcome.error.unwrap().contains("failed to launch"));
        assert!(log.has("EXECUTE"));
    }

    #[cfg(unix)]
    fn shell_config(dir: &Path, close_on_action: Option<bool>) -> Config {
        let mut value = json!({ "groups": [ { "name": "g", "commands": [
            { "label": "ok", "actions": [ { "kind": "generic", "executable": "sh", "argsTemplate": "-c 'exit 0'" } ] },
            { "label": "fail", "actions": [ { "kind": "generic", "executable": "sh", "argsTemplate": "-c 'exit 3'" } ] }
        ] } ] });
        if let Some(close) = close_on_action {
            value["settings"] = json!({ "closeOnAction": close });
        }
        config_in(dir, value)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_captures_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let config = shell_config(dir.path(), None);
        let log = MemoryLog::default();
        let executor = Executor::new(&config, &log);

        let target = config.find("g/ok").unwrap();
        let outcome = executor
            .execute(&target.entry, target.actions[0], Mode::Run)
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.exit_code, Some(0));
        assert!(!outcome.close);

        let target = config.find("g/fail").unwrap();
        let outcome = executor
            .execute(&target.entry, target.actions[0], Mode::Run)
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(3));
        let events = log.events();
        assert_eq!(events[1].0, Status::Error);
        assert!(events[1].2.contains("(exit 3)"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn close_follows_settings_and_override() {
        let dir = tempfile::tempdir().unwrap();
        let log = MemoryLog::default();

        let config = shell_config(dir.path(), Some(true));
        let target = config.find("g/ok").unwrap();
        let outcome = Executor::new(&config, &log)
            .execute(&target.entry, target.actions[0], Mode::Run)
            .await;
        assert!(outcome.close);

        let config = shell_config(dir.path(), Some(false));
        let target = config.find("g/ok").unwrap();
        let outcome = Executor::new(&config, &log)
            .force_close(true)
            .execute(&target.entry, target.actions[0], Mode::Run)
            .await;
        assert!(outcome.close);

        let target = config.find("g/fail").unwrap();
        let outcome = Executor::new(&config, &log)
            .force_close(true)
            .execute(&target.entry, target.actions[0], Mode::Run)
            .await;
        assert!(!outcome.close);
    }
}
