use crate::engine::RunOptions;
use crate::errors::Result;
use crate::matcher::{PatternFlags, PatternKind, PatternSpec};
use serde::Deserialize;
use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};

/// One find/replace rule from a config file.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// The text (or regex, with `regex: true`) to search for.
    pub find: String,
    /// The replacement. In regex rules `$1` and `${name}` expand capture groups.
    pub replace: String,
    #[serde(default)]
    pub regex: bool,
    #[serde(default)]
    pub ignore_case: bool,
    #[serde(default)]
    pub whole_word: bool,
    #[serde(default)]
    pub multiline: bool,
}

impl RuleConfig {
    pub fn to_spec(&self) -> PatternSpec {
        PatternSpec {
            find: self.find.clone(),
            replace: self.replace.clone(),
            kind: if self.regex {
                PatternKind::Regex
            } else {
                PatternKind::Literal
            },
            flags: PatternFlags {
                ignore_case: self.ignore_case,
                whole_word: self.whole_word,
                multiline: self.multiline,
            },
        }
    }
}

/// Configuration for a replacement run.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ReplaceConfig {
    /// Rules applied in order to every text file.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    /// Gitignore-style globs for paths to leave out.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Size ceiling in bytes.
    pub max_file_size: Option<u64>,
    /// The number of parallel workers.
    pub workers: Option<usize>,
    /// Whether symlinks to files are followed.
    pub follow_symlinks: Option<bool>,
}

impl ReplaceConfig {
    /// The rules as compilable patterns, in file order.
    pub fn to_specs(&self) -> Vec<PatternSpec> {
        self.rules.iter().map(RuleConfig::to_spec).collect()
    }

    /// Copies the settings present in the file onto `options`.
    pub fn apply_to(&self, options: &mut RunOptions) {
        options.exclude_globs.extend(self.exclude.iter().cloned());
        if let Some(max) = self.max_file_size {
            options.max_file_size = max;
        }
        if let Some(workers) = self.workers {
            options.worker_count = workers;
        }
        if let Some(follow) = self.follow_symlinks {
            options.follow_file_symlinks = follow;
        }
    }
}

/// A utility for locating and loading configuration files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Finds the configuration file by searching in a prioritized list of locations.
    ///
    /// The search order is:
    /// 1. `config_path` itself (absolute, or relative to the current directory).
    /// 2. A path relative to the `working_dir`.
    /// 3. Inside the user config directory (`newtext/` under e.g. `~/.config`).
    /// 4. Next to the executable.
    /// 5. In the parent directory of the executable (to handle `target/release` builds).
    /// 6. In the grandparent directory of the executable.
    pub fn find_config(config_path: &Path, working_dir: &Path) -> Result<PathBuf> {
        let candidates = Self::search_locations(config_path, working_dir);
        if let Some(found) = candidates.iter().find(|p| p.is_file()) {
            return Ok(found.clone());
        }

        let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
        Err(format!(
            "Config file '{}' not found. Searched in:\n  - {}",
            config_path.display(),
            tried.join("\n  - ")
        )
        .into())
    }

    fn search_locations(config_path: &Path, working_dir: &Path) -> Vec<PathBuf> {
        let mut locations = vec![config_path.to_path_buf()];
        if config_path.is_absolute() {
            return locations;
        }

        locations.push(working_dir.join(config_path));

        if let Some(config_dir) = dirs::config_dir() {
            locations.push(config_dir.join("newtext").join(config_path));
        }

        if let Ok(exe_path) = env::current_exe() {
            // target/release and target/debug builds sit two levels below the project.
            for dir in exe_path.ancestors().skip(1).take(3) {
                locations.push(dir.join(config_path));
            }
        }
        locations
    }

    /// Loads a `ReplaceConfig` from a YAML file.
    pub fn load_replace_config(path: &Path) -> Result<ReplaceConfig> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }
}
