use crate::domain::{config::TermLineConfig, error::{TermLineError, TermLineResult}};
use std::path::{Path, PathBuf};
use std::fs;

/// Configuration manager
pub struct ConfigManager {
    global_config_path: PathBuf,
    project_config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> TermLineResult<Self> {
        let global_config_path = Self::get_global_config_path()?;
        let project_config_path = Self::find_project_config_path();

        Ok(Self {
            global_config_path,
            project_config_path,
        })
    }

    /// Load configuration, layering project settings over the global file
    pub fn load_config(&self) -> TermLineResult<TermLineConfig> {
        let mut config = TermLineConfig::default();

        if self.global_config_path.exists() {
            let global_config = self.load_config_from_path(&self.global_config_path)?;
            config.global = global_config.global;
        }

        // Project config overrides the terminal section
        if let Some(project_path) = &self.project_config_path {
            if project_path.exists() {
                let project_config = self.load_config_from_path(project_path)?;
                config.terminal = project_config.terminal;
            }
        }

        Ok(config)
    }

    /// Save configuration to files
    pub fn save_config(&self, config: &TermLineConfig) -> TermLineResult<()> {
        if let Some(parent) = self.global_config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| TermLineError::Config {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }
        self.save_config_to_path(&self.global_config_path, config)?;

        if let Some(project_path) = &self.project_config_path {
            if let Some(parent) = project_path.parent() {
                fs::create_dir_all(parent).map_err(|e| TermLineError::Config {
                    message: format!("Failed to create project config directory: {}", e),
                })?;
            }
            self.save_config_to_path(project_path, config)?;
        }

        Ok(())
    }

    /// Get global configuration path
    fn get_global_config_path() -> TermLineResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| TermLineError::Config {
            message: "Could not determine home directory".to_string(),
        })?;

        Ok(home.join(".config").join("termline").join("config.toml"))
    }

    /// Find project configuration path by walking up directory tree
    fn find_project_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut path = current_dir.as_path();

        loop {
            let config_path = path.join(".termline").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            path = path.parent()?;
        }
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> TermLineResult<TermLineConfig> {
        let content = fs::read_to_string(path).map_err(|e| TermLineError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| TermLineError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Save configuration to specific path
    pub fn save_config_to_path(&self, path: &Path, config: &TermLineConfig) -> TermLineResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| TermLineError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| TermLineError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    /// Create default project configuration
    pub fn init_project_config(&self, path: &Path) -> TermLineResult<()> {
        let config_dir = path.join(".termline");
        let config_file = config_dir.join("config.toml");

        if config_file.exists() {
            return Err(TermLineError::Config {
                message: "Project configuration already exists".to_string(),
            });
        }

        fs::create_dir_all(&config_dir).map_err(|e| TermLineError::Config {
            message: format!("Failed to create .termline directory: {}", e),
        })?;

        self.save_config_to_path(&config_file, &TermLineConfig::default())?;

        Ok(())
    }

    /// Get the current project config path (if any)
    pub fn get_project_config_path(&self) -> Option<&PathBuf> {
        self.project_config_path.as_ref()
    }

    /// Get the global config path
    pub fn get_global_config_path_ref(&self) -> &PathBuf {
        &self.global_config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::TransportConfig;
    use tempfile::TempDir;

    #[test]
    fn test_config_manager_creation() {
        let _manager = ConfigManager::new().unwrap();
    }

    #[test]
    fn test_init_project_config() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::new().unwrap();

        manager.init_project_config(temp_dir.path()).unwrap();

        let config_file = temp_dir.path().join(".termline").join("config.toml");
        assert!(config_file.exists());

        let content = fs::read_to_string(&config_file).unwrap();
        let config: TermLineConfig = toml::from_str(&content).unwrap();
        assert_eq!(config.global.log_level, "info");
    }

    #[test]
    fn test_init_project_config_twice_fails() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::new().unwrap();

        manager.init_project_config(temp_dir.path()).unwrap();
        assert!(manager.init_project_config(temp_dir.path()).is_err());
    }

    #[test]
    fn test_save_and_reload_from_path() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = TermLineConfig::default();
        config.terminal.transport = TransportConfig::Udp {
            local: "0.0.0.0:9000".to_string(),
            remote: "10.0.0.2:9001".to_string(),
        };
        config.terminal.buffers.rx_capacity = 4096;

        manager.save_config_to_path(&path, &config).unwrap();
        let loaded = manager.load_config_from_path(&path).unwrap();

        assert_eq!(loaded.terminal.buffers.rx_capacity, 4096);
        match loaded.terminal.transport {
            TransportConfig::Udp { remote, .. } => assert_eq!(remote, "10.0.0.2:9001"),
            other => panic!("unexpected transport: {:?}", other),
        }
    }
}
