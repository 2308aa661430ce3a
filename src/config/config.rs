use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use std::{fs, io};
use tracing::{debug, error};

use crate::core::launcher::{LaunchConfig, LaunchOptions};
use crate::core::profile::Profile;
use crate::result::LaunchError;
use crate::utils::file_ops::{mpl_dir, mpl_subdir};

/// 轮询间隔下限，配置成 0 会让轮询循环空转
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Launcher {
    /// 启动器可执行文件（XIVLauncher）
    pub path: PathBuf,
    /// 角色沙盒根目录，留空则使用程序目录
    pub storage_root: PathBuf,
    pub debug: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LaunchSettings {
    pub game_process_names: Vec<String>,
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
    pub settle_delay_secs: u64,
    pub exit_poll_interval_ms: u64,
    pub documents_subdirs: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Group {
    pub id: u32,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub launcher: Launcher,
    pub launch: LaunchSettings,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<Profile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,
}

impl Default for Config {
    fn default() -> Self {
        get_default_config()
    }
}

/// 批量启动的目标：全部角色或某个分组
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSelector {
    All,
    Id(u32),
}

impl FromStr for GroupSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(GroupSelector::All);
        }
        s.parse::<u32>()
            .map(GroupSelector::Id)
            .map_err(|_| format!("'{}' is neither a group id nor 'all'", s))
    }
}

impl Config {
    pub fn find_profile(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id.as_str() == id)
    }

    /// 返回分组显示名与按配置顺序排列的角色
    pub fn resolve_group(&self, selector: GroupSelector) -> Result<(String, Vec<Profile>), LaunchError> {
        match selector {
            GroupSelector::All => Ok(("All".to_string(), self.profiles.clone())),
            GroupSelector::Id(id) => {
                let group = self
                    .groups
                    .iter()
                    .find(|g| g.id == id)
                    .ok_or(LaunchError::UnknownGroup(id))?;
                let members = self
                    .profiles
                    .iter()
                    .filter(|p| p.group_ids.contains(&id))
                    .cloned()
                    .collect();
                Ok((group.name.clone(), members))
            }
        }
    }

    pub fn launch_config(&self) -> LaunchConfig {
        let storage_root = if self.launcher.storage_root.as_os_str().is_empty() {
            mpl_dir()
        } else {
            self.launcher.storage_root.clone()
        };
        LaunchConfig {
            launcher_path: self.launcher.path.clone(),
            storage_root,
        }
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            game_process_names: self.launch.game_process_names.clone(),
            poll_interval: Duration::from_millis(self.launch.poll_interval_ms).max(MIN_POLL_INTERVAL),
            timeout: Duration::from_secs(self.launch.timeout_secs),
            documents_subdirs: self.launch.documents_subdirs.clone(),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.launch.settle_delay_secs)
    }

    pub fn exit_poll_interval(&self) -> Duration {
        Duration::from_millis(self.launch.exit_poll_interval_ms).max(MIN_POLL_INTERVAL)
    }
}

pub fn get_config_file_path() -> PathBuf {
    mpl_subdir("config").join("settings.toml")
}

pub fn get_default_config() -> Config {
    let defaults = LaunchOptions::default();
    Config {
        launcher: Launcher {
            path: PathBuf::new(),
            storage_root: PathBuf::new(),
            debug: false,
        },
        launch: LaunchSettings {
            game_process_names: defaults.game_process_names,
            poll_interval_ms: defaults.poll_interval.as_millis() as u64,
            timeout_secs: defaults.timeout.as_secs(),
            settle_delay_secs: 4,
            exit_poll_interval_ms: 1000,
            documents_subdirs: defaults.documents_subdirs,
        },
        profiles: Vec::new(),
        groups: Vec::new(),
    }
}

fn to_toml_string<T: Serialize>(value: &T) -> io::Result<String> {
    toml::to_string(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn ensure_config_file(path: &Path) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    if !path.exists() {
        let toml_content = to_toml_string(&get_default_config())?;
        let mut file = fs::File::create(path)?;
        file.write_all(toml_content.as_bytes())?;
    }
    Ok(())
}

/// 读取配置；文件缺失时写入默认值，缺字段时与默认值合并后回写
pub fn read_config(path: &Path) -> io::Result<Config> {
    ensure_config_file(path)?;
    let content = fs::read_to_string(path)?;

    let config: Config = match toml::from_str(&content) {
        Ok(parsed_config) => parsed_config,
        Err(err) => {
            error!("Failed to parse config on first attempt: {}", err);

            if let Ok(toml::Value::Table(existing_table)) = toml::from_str::<toml::Value>(&content) {
                if let Ok(toml::Value::Table(default_table)) = toml::Value::try_from(get_default_config()) {
                    let merged = merge_tables(default_table, existing_table);
                    fs::write(path, to_toml_string(&toml::Value::Table(merged))?)?;
                }
            }

            let updated_content = fs::read_to_string(path)?;
            toml::from_str(&updated_content).unwrap_or_else(|second_err| {
                error!("Failed to parse config on second attempt: {}", second_err);
                get_default_config()
            })
        }
    };

    debug!("Read config: {:?}", config);
    Ok(config)
}

fn merge_tables(
    mut default: toml::map::Map<String, toml::Value>,
    existing: toml::map::Map<String, toml::Value>,
) -> toml::map::Map<String, toml::Value> {
    for (key, existing_value) in existing {
        let merged = match (default.remove(&key), existing_value) {
            (Some(toml::Value::Table(default_table)), toml::Value::Table(existing_table)) => {
                toml::Value::Table(merge_tables(default_table, existing_table))
            }
            (_, value) => value,
        };
        default.insert(key, merged);
    }
    default
}

pub fn write_config(path: &Path, config: &Config) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let toml_content = to_toml_string(config)?;
    let mut file = fs::File::create(path)?;
    file.write_all(toml_content.as_bytes())?;
    Ok(())
}
