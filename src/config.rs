use std::{
    collections::{BTreeMap, HashMap, HashSet},
    env::current_dir,
    path::{Path, PathBuf, MAIN_SEPARATOR},
};

use serde::Deserialize;

use crate::{error::ConfigError, template::expand_env};

pub const DEFAULT_LOG_FILE: &str = "action.log";
pub const DEFAULT_TITLE: &str = "Command Board";
const CONFIG_FILE_NAME: &str = "command_config.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default)]
    pub close_on_action: bool,
    #[serde(default)]
    pub git_bash: Option<String>,
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            close_on_action: false,
            git_bash: None,
            title: default_title(),
        }
    }
}

fn default_log_file() -> String {
    DEFAULT_LOG_FILE.to_string()
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ActionSpec {
    GitBash,
    #[serde(rename_all = "camelCase")]
    Generic {
        #[serde(default)]
        executable: Option<String>,
        #[serde(default)]
        executable_alias: Option<String>,
        #[serde(default)]
        args_template: String,
    },
}

impl ActionSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            ActionSpec::GitBash => "git-bash",
            ActionSpec::Generic { .. } => "generic",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Action {
    #[serde(default)]
    name: Option<String>,
    #[serde(flatten)]
    pub spec: ActionSpec,
}

impl Action {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.spec.kind())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Command {
    pub label: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subgroup {
    pub name: String,
    #[serde(default)]
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subgroups: Vec<Subgroup>,
    #[serde(default)]
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub groups: Vec<Group>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    #[serde(skip)]
    config_dir: PathBuf,
}

/// A command together with the group (and subgroup) it was found in.
#[derive(Debug, Clone, Copy)]
pub struct CommandEntry<'a> {
    pub group: &'a Group,
    pub subgroup: Option<&'a Subgroup>,
    pub command: &'a Command,
}

impl<'a> CommandEntry<'a> {
    pub fn label(&self) -> String {
        match self.subgroup {
            Some(subgroup) => format!(
                "{}/{}/{}",
                self.group.name, subgroup.name, self.command.label
            ),
            None => format!("{}/{}", self.group.name, self.command.label),
        }
    }

    pub fn action_label(&self, action: &Action) -> String {
        format!("{}/{}", self.label(), action.name())
    }
}

#[derive(Debug, Clone)]
pub struct Target<'a> {
    pub entry: CommandEntry<'a>,
    pub actions: Vec<&'a Action>,
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_owned(),
                source,
            })?;
        let config_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let config_dir = if config_dir.is_absolute() {
            config_dir.to_owned()
        } else {
            current_dir()
                .map(|cwd| cwd.join(config_dir))
                .unwrap_or_else(|_| config_dir.to_owned())
        };
        log::debug!("loading config {}", path.to_string_lossy());
        Self::from_json(&text, config_dir)
    }

    pub fn from_json(text: &str, config_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        let mut config: Config =
            serde_json::from_value(value).map_err(|err| ConfigError::Schema(err.to_string()))?;
        config.config_dir = config_dir.into();
        config.check()?;
        config.name_actions();
        Ok(config)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn log_file(&self) -> PathBuf {
        self.anchor(&self.settings.log_file)
    }

    /// Command path with env vars expanded, anchored to the config directory.
    pub fn command_path(&self, command: &Command) -> Option<PathBuf> {
        command
            .path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(|path| self.anchor(&expand_env(path)))
    }

    /// Aliases resolved, env vars expanded, relative paths anchored to the
    /// config directory. `None` for an alias missing from `aliases`.
    pub fn program_of(&self, spec: &ActionSpec) -> Option<String> {
        let program = match spec {
            ActionSpec::GitBash => self
                .settings
                .git_bash
                .clone()
                .filter(|exe| !exe.trim().is_empty())
                .unwrap_or_else(|| default_git_bash().to_string()),
            ActionSpec::Generic {
                executable,
                executable_alias,
                ..
            } => match executable_alias {
                Some(alias) => self.aliases.get(alias)?.clone(),
                None => executable.clone()?,
            },
        };
        let program = expand_env(program.trim());
        (!program.is_empty()).then(|| self.anchor_program(program))
    }

    fn anchor_program(&self, program: String) -> String {
        let path = Path::new(&program);
        if path.is_absolute() {
            return program;
        }
        if program.contains('/') || program.contains(MAIN_SEPARATOR) {
            return self.config_dir.join(path).to_string_lossy().into_owned();
        }
        let lower = program.to_lowercase();
        if (lower.ends_with(".bat") || lower.ends_with(".cmd")) && which::which(&program).is_err() {
            let beside = self.config_dir.join(path);
            if beside.is_file() {
                return beside.to_string_lossy().into_owned();
            }
        }
        program
    }

    pub fn commands(&self) -> impl Iterator<Item = CommandEntry<'_>> {
        self.groups
            .iter()
            .flat_map(|group| {
                let nested = group.subgroups.iter().flat_map(move |subgroup| {
                    subgroup.commands.iter().map(move |command| CommandEntry {
                        group,
                        subgroup: Some(subgroup),
                        command,
                    })
                });
                let direct = group.commands.iter().map(move |command| CommandEntry {
                    group,
                    subgroup: None,
                    command,
                });
                nested.chain(direct)
            })
            .filter(|entry| entry.command.enabled)
    }

    /// Looks up `group/[subgroup/]command[/action]`.
    pub fn find(&self, path: &str) -> Option<Target<'_>> {
        let path = path.trim().trim_matches('/');
        self.commands().find_map(|entry| {
            let label = entry.label();
            if label == path {
                return Some(Target {
                    entry,
                    actions: entry.command.actions.iter().collect(),
                });
            }
            let action_name = path.strip_prefix(label.as_str())?.strip_prefix('/')?;
            let action = entry
                .command
                .actions
                .iter()
                .find(|action| action.name() == action_name)?;
            Some(Target {
                entry,
                actions: vec![action],
            })
        })
    }

    fn anchor(&self, raw: &str) -> PathBuf {
        let path = PathBuf::from(raw);
        if path.is_absolute() {
            path
        } else {
            self.config_dir.join(path)
        }
    }

    fn check(&self) -> Result<(), ConfigError> {
        unique_names("group", "config", self.groups.iter().map(|g| g.name.as_str()))?;
        for group in &self.groups {
            unique_names(
                "subgroup or command",
                &group.name,
                group
                    .subgroups
                    .iter()
                    .map(|s| s.name.as_str())
                    .chain(group.commands.iter().map(|c| c.label.as_str())),
            )?;
            for subgroup in &group.subgroups {
                let scope = format!("{}/{}", group.name, subgroup.name);
                unique_names(
                    "command",
                    &scope,
                    subgroup.commands.iter().map(|c| c.label.as_str()),
                )?;
                for command in &subgroup.commands {
                    self.check_command(&scope, command)?;
                }
            }
            for command in &group.commands {
                self.check_command(&group.name, command)?;
            }
        }
        Ok(())
    }

    fn check_command(&self, scope: &str, command: &Command) -> Result<(), ConfigError> {
        let scope = format!("{}/{}", scope, command.label);
        unique_names(
            "action",
            &scope,
            command.actions.iter().filter_map(|a| a.name.as_deref()),
        )?;
        for action in &command.actions {
            if let ActionSpec::Generic {
                executable,
                executable_alias: None,
                ..
            } = &action.spec
            {
                if executable.as_deref().map(str::trim).unwrap_or_default().is_empty() {
                    return Err(ConfigError::Schema(format!(
                        "generic action '{}/{}' has no executable",
                        scope,
                        action.name()
                    )));
                }
            }
        }
        Ok(())
    }

    fn name_actions(&mut self) {
        for group in &mut self.groups {
            let nested = group.subgroups.iter_mut().flat_map(|s| s.commands.iter_mut());
            for command in nested.chain(group.commands.iter_mut()) {
                name_unnamed_actions(command);
            }
        }
    }
}

/// Unnamed actions take their kind as name, then `kind-2`, `kind-3`, ...
/// skipping anything already claimed by an explicit name.
fn name_unnamed_actions(command: &mut Command) {
    let taken: HashSet<String> = command
        .actions
        .iter()
        .filter_map(|a| a.name.clone())
        .collect();
    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    for action in command.actions.iter_mut().filter(|a| a.name.is_none()) {
        let kind = action.spec.kind();
        let count = counts.entry(kind).or_insert(0);
        let name = loop {
            *count += 1;
            let candidate = if *count == 1 {
                kind.to_string()
            } else {
                format!("{}-{}", kind, count)
            };
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        action.name = Some(name);
    }
}

/// Names are path segments: non-empty, free of '/', unique among siblings.
fn unique_names<'a>(
    what: &str,
    scope: &str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(ConfigError::Schema(format!("empty {} name in '{}'", what, scope)));
        }
        if name.contains('/') {
            return Err(ConfigError::Schema(format!(
                "{} name '{}' in '{}' must not contain '/'",
                what, name, scope
            )));
        }
        if !seen.insert(name) {
            return Err(ConfigError::Schema(format!(
                "duplicate {} name '{}' in '{}'",
                what, name, scope
            )));
        }
    }
    Ok(())
}

pub fn default_git_bash() -> &'static str {
    if cfg!(target_os = "windows") {
        r"C:\Program Files\Git\git-bash.exe"
    } else {
        "bash"
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "command-board")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
