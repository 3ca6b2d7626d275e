use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use dialoguer::Select;
use tabled::{settings::Style, Table, Tabled};

use crate::{
    cli::Cli,
    config::{default_config_path, Action, CommandEntry, Config},
    error::{EXECUTION_EXIT_CODE, USAGE_EXIT_CODE},
    executor::{Executor, Mode, Outcome},
    journal::{ActionLog, FileLog, LogEntry, NullLog, Status},
    validate::validate,
};

#[derive(Tabled)]
struct Row {
    path: String,
    kind: &'static str,
    command: String,
}

pub struct Board {
    cli: Cli,
    config: Config,
    log: FileLog,
}

impl Board {
    pub async fn parse() -> anyhow::Result<Self> {
        let cli = Cli::parse();
        let config_file: PathBuf = match cli.config {
            Some(ref config) => config.to_owned(),
            None => default_config_path()
                .ok_or_else(|| anyhow!("cannot determine the default config location"))?,
        };
        let config = Config::load(&config_file).await?;
        let log = FileLog::new(config.log_file());
        Ok(Board { cli, config, log })
    }

    pub async fn run(&self) -> anyhow::Result<i32> {
        if self.cli.test_config {
            Ok(self.test_config())
        } else if self.cli.list {
            self.list();
            Ok(0)
        } else if let Some(ref path) = self.cli.run {
            let mode = if self.cli.dry_run {
                Mode::DryRun
            } else {
                Mode::Run
            };
            Ok(self.run_path(path, mode).await)
        } else {
            self.interactive().await
        }
    }

    fn executor(&self) -> Executor<'_> {
        Executor::new(&self.config, &self.log).force_close(self.cli.auto_close)
    }

    fn test_config(&self) -> i32 {
        self.log
            .record(LogEntry::new(Status::Info, "CONFIG_TEST", "cli started"));
        let report = validate(&self.config, &self.log);
        println!("{}", report);
        println!("Log file: {}", self.log.path().to_string_lossy());
        report.exit_code()
    }

    fn list(&self) {
        let executor = Executor::new(&self.config, &NullLog);
        let rows: Vec<Row> = self
            .config
            .commands()
            .flat_map(|entry| {
                let executor = &executor;
                entry.command.actions.iter().map(move |action| Row {
                    path: entry.action_label(action),
                    kind: action.spec.kind(),
                    command: executor
                        .resolve(&entry, action)
                        .map(|invocation| invocation.display())
                        .unwrap_or_else(|err| format!("<invalid: {}>", err)),
                })
            })
            .collect();
        for group in &self.config.groups {
            if let Some(ref description) = group.description {
                println!("{}: {}", group.name, description);
            }
        }
        println!("Available commands:");
        let mut table = Table::new(rows);
        table.with(Style::psql());
        println!("{}", table);
    }

    async fn run_path(&self, path: &str, mode: Mode) -> i32 {
        let Some(target) = self.config.find(path) else {
            eprintln!("No command with path \"{}\" found.", path.trim());
            return USAGE_EXIT_CODE;
        };
        let executor = self.executor();
        for action in target.actions {
            let outcome = executor.execute(&target.entry, action, mode).await;
            print_outcome(&outcome);
            if !outcome.success {
                return EXECUTION_EXIT_CODE;
            }
        }
        0
    }

    async fn interactive(&self) -> anyhow::Result<i32> {
        let actions: Vec<(CommandEntry<'_>, &Action)> = self
            .config
            .commands()
            .flat_map(|entry| entry.command.actions.iter().map(move |action| (entry, action)))
            .collect();
        if actions.is_empty() {
            println!("No commands configured.");
            return Ok(0);
        }
        let mut items: Vec<String> = actions
            .iter()
            .map(|(entry, action)| entry.action_label(action))
            .collect();
        items.push("Quit".to_string());

        self.log
            .record(LogEntry::new(Status::Info, "APP_START", "board opened"));
        let executor = self.executor();
        loop {
            let selection = Select::new()
                .with_prompt(self.config.settings.title.as_str())
                .items(&items)
                .default(0)
                .interact_opt()?;
            let Some((entry, action)) = selection.and_then(|index| actions.get(index)) else {
                break;
            };
            self.log.record(LogEntry::new(
                Status::Info,
                "SELECT",
                entry.action_label(action),
            ));
            let outcome = executor.execute(entry, action, Mode::Run).await;
            print_outcome(&outcome);
            if outcome.close {
                self.log.record(LogEntry::new(
                    Status::Info,
                    "APP_CLOSE",
                    "close after successful action",
                ));
                break;
            }
        }
        Ok(0)
    }
}

fn print_outcome(outcome: &Outcome) {
    let command = outcome.command.as_deref().unwrap_or_default();
    match (outcome.mode, outcome.success) {
        (Mode::DryRun, true) => {
            println!("DRY RUN: {}", command);
            if let Some(ref cwd) = outcome.cwd {
                println!("  in {}", cwd.to_string_lossy());
            }
        }
        (Mode::Run, true) => println!("Executed: {}", command),
        (_, false) => eprintln!(
            "Execution failed: {}: {}",
            outcome.label,
            outcome.error.as_deref().unwrap_or("unknown error")
        ),
    }
}
