//! 配置管理模块
//!
//! 加载顺序：内置默认值 → 可选配置文件（YAML/JSON，按扩展名判断）→
//! `KUBECRED_` 前缀的环境变量。命令行参数由调用方在加载后覆盖。

use config::{Config, Environment, File, FileFormat};
use kubecred_common::{Error, Result, MAX_EXPIRATION_DAYS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::ca::{PollPolicy, DEFAULT_SIGNER_NAME};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "KUBECRED";

/// Kubecred 配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubecredConfig {
    /// 身份目录根路径
    pub output_dir: PathBuf,
    /// 参考（管理员）kubeconfig 路径
    pub kubeconfig: PathBuf,
    /// CSR 签发者
    pub signer_name: String,
    /// 默认证书有效期（天）
    pub default_expiration_days: u32,
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 等待证书签发的最长时间（秒）
    pub certificate_timeout_secs: u64,
    /// 日志级别
    pub log_level: String,
}

impl Default for KubecredConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("~/.kubecred/users"),
            kubeconfig: PathBuf::from("~/.kube/config"),
            signer_name: DEFAULT_SIGNER_NAME.to_string(),
            default_expiration_days: 365,
            poll_interval_ms: 1000,
            certificate_timeout_secs: 30,
            log_level: "info".to_string(),
        }
    }
}

impl KubecredConfig {
    /// 证书轮询策略
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: self.certificate_timeout(),
        }
    }

    /// 等待证书签发的最长时间
    pub fn certificate_timeout(&self) -> Duration {
        Duration::from_secs(self.certificate_timeout_secs)
    }

    /// 校验配置取值
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(Error::Config("output_dir 不能为空".to_string()));
        }
        if self.signer_name.trim().is_empty() {
            return Err(Error::Config("signer_name 不能为空".to_string()));
        }
        if self.default_expiration_days == 0 || self.default_expiration_days > MAX_EXPIRATION_DAYS {
            return Err(Error::Config(format!(
                "default_expiration_days 必须在 1..={} 之间",
                MAX_EXPIRATION_DAYS
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms 必须大于 0".to_string()));
        }
        if self.certificate_timeout_secs == 0 {
            return Err(Error::Config("certificate_timeout_secs 必须大于 0".to_string()));
        }
        Ok(())
    }
}

/// 配置管理器
pub struct ConfigManager {
    /// 配置文件路径
    config_path: Option<PathBuf>,
    /// 当前配置
    config: KubecredConfig,
}

impl ConfigManager {
    /// 从可选配置文件与进程环境变量加载配置
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(config_path, None)
    }

    /// 加载配置，`env` 为 `None` 时读取进程环境变量
    fn load_with_env(config_path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let defaults = Config::try_from(&KubecredConfig::default()).map_err(config_error)?;
        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path.to_path_buf()).format(file_format(path)?));
        }

        let environment = Environment::with_prefix(ENV_PREFIX).try_parsing(true).source(env);
        let mut config = builder
            .add_source(environment)
            .build()
            .map_err(config_error)?
            .try_deserialize::<KubecredConfig>()
            .map_err(config_error)?;

        config.output_dir = expand_home(&config.output_dir)?;
        config.kubeconfig = expand_home(&config.kubeconfig)?;
        config.validate()?;

        debug!("已加载配置: {:?}", config);
        Ok(Self {
            config_path: config_path.map(Path::to_path_buf),
            config,
        })
    }

    /// 配置文件路径
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// 获取当前配置
    pub fn get_config(&self) -> &KubecredConfig {
        &self.config
    }

    /// 取出配置
    pub fn into_config(self) -> KubecredConfig {
        self.config
    }
}

fn file_format(path: &Path) -> Result<FileFormat> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => Ok(FileFormat::Yaml),
        Some("json") => Ok(FileFormat::Json),
        _ => Err(Error::Config(format!(
            "不支持的配置文件格式 {}，仅支持 YAML 或 JSON",
            path.display()
        ))),
    }
}

fn config_error(err: config::ConfigError) -> Error {
    Error::Config(err.to_string())
}

/// 展开路径开头的 `~`，无法确定主目录时返回配置错误
pub fn expand_home(path: &Path) -> Result<PathBuf> {
    expand_home_with(path, dirs::home_dir())
}

fn expand_home_with(path: &Path, home: Option<PathBuf>) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = home.ok_or_else(|| {
                Error::Config(format!("无法确定用户主目录，请显式配置 {}", path.display()))
            })?;
            Ok(home.join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}
