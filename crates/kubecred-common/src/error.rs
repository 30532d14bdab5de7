//! 错误处理模块
//!
//! 该模块提供 Kubecred 的统一错误处理机制。错误类型按照身份签发流程的
//! 失败类别划分：参数校验、密钥生成、证书签发、授权绑定以及本地文件 I/O，
//! 便于调用方判断失败发生在哪一步、是否可以重试。

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Kubecred 统一错误类型
#[derive(Error, Debug)]
pub enum Error {
    /// 参数校验错误，发生在任何副作用之前
    #[error("参数校验失败: {0}")]
    Validation(String),

    /// 密钥或 CSR 生成错误，不可重试
    #[error("密钥生成失败: {0}")]
    KeyGeneration(String),

    /// 证书签发服务错误（提交、批准或查询失败）
    #[error("证书签发失败: {0}")]
    CertificateAuthority(String),

    /// 在截止时间前未签发证书
    #[error("等待证书签发超时: {name} ({timeout:?})")]
    CertificateTimeout {
        /// 签名请求名称
        name: String,
        /// 等待时长
        timeout: Duration,
    },

    /// 对象已存在
    #[error("对象已存在: {0}")]
    AlreadyExists(String),

    /// 对象不存在
    #[error("对象不存在: {0}")]
    NotFound(String),

    /// 集群 API 调用错误
    #[error("集群 API 错误: {0}")]
    Api(String),

    /// 参考 kubeconfig 无法使用
    #[error("参考 kubeconfig 无效: {0}")]
    ReferenceBundle(String),

    /// 证书解析错误
    #[error("证书解析失败: {0}")]
    Certificate(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 某个创建步骤失败，附带步骤名称
    #[error("{step}: {source}")]
    Step {
        /// 失败的步骤
        step: &'static str,
        /// 原始错误
        #[source]
        source: Box<Error>,
    },

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] io::Error),

    /// YAML 错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON 错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),
}

/// Kubecred 结果类型别名
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// 为错误附加失败步骤名称
    pub fn step(step: &'static str, source: Error) -> Self {
        Error::Step {
            step,
            source: Box::new(source),
        }
    }

    /// 去掉步骤包装后的原始错误
    pub fn root(&self) -> &Error {
        match self {
            Error::Step { source, .. } => source.root(),
            other => other,
        }
    }

    /// 是否为“对象已存在”
    pub fn is_already_exists(&self) -> bool {
        matches!(self.root(), Error::AlreadyExists(_))
    }

    /// 是否为“对象不存在”
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Error::NotFound(_))
    }

    /// 是否为证书等待超时
    pub fn is_certificate_timeout(&self) -> bool {
        matches!(self.root(), Error::CertificateTimeout { .. })
    }
}

/// 为结果附加步骤上下文
pub trait StepContext<T> {
    /// 失败时用步骤名称包装错误
    fn step(self, step: &'static str) -> Result<T>;
}

impl<T> StepContext<T> for Result<T> {
    fn step(self, step: &'static str) -> Result<T> {
        self.map_err(|e| Error::step(step, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_wrapping_keeps_root() {
        let err: Result<()> = Err(Error::AlreadyExists("alice-view-binding".into()));
        let err = err.step("绑定 ClusterRole").unwrap_err();

        assert!(err.is_already_exists());
        assert!(!err.is_not_found());
        assert!(err.to_string().starts_with("绑定 ClusterRole: "));
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::CertificateTimeout {
            name: "alice-csr".into(),
            timeout: Duration::from_secs(30),
        };
        assert!(err.is_certificate_timeout());
        assert!(err.to_string().contains("alice-csr"));
    }
}
