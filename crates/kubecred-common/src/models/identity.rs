//! 用户身份模型
//!
//! 该模块定义了基于 X.509 客户端证书的集群用户身份，以及签发过程中使用的
//! 签名请求状态。证书 Subject 的 CN 必须等于用户名，O 字段等于用户组集合。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// 用户名最大长度
pub const MAX_USERNAME_LEN: usize = 63;

/// 证书有效期上限（天），保证换算成秒后不溢出 i32
pub const MAX_EXPIRATION_DAYS: u32 = (i32::MAX as u32) / SECONDS_PER_DAY;

const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9.]*[a-z0-9])?$").expect("用户名正则无效"));

/// 用户身份
///
/// 身份是持久化的基本单元，以用户名为唯一键。各路径指向本地身份目录中的文件。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// 用户名（证书 CN）
    pub username: String,
    /// 用户组（证书 O），保持请求时的顺序
    pub groups: Vec<String>,
    /// 证书有效期（天）
    pub certificate_lifetime_days: u32,
    /// 私钥路径
    pub key_path: PathBuf,
    /// CSR 路径
    pub csr_path: PathBuf,
    /// 已签发证书路径
    pub certificate_path: PathBuf,
    /// kubeconfig 连接文件路径
    pub bundle_path: PathBuf,
}

/// 签名请求生命周期状态
///
/// `Submitted → Approved → Issued`，`TimedOut` 为终止失败状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningRequestStatus {
    /// 已提交
    Submitted,
    /// 已批准，等待签发
    Approved,
    /// 证书已签发
    Issued,
    /// 截止时间内未签发
    TimedOut,
}

impl SigningRequestStatus {
    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(self, SigningRequestStatus::Issued | SigningRequestStatus::TimedOut)
    }
}

impl fmt::Display for SigningRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningRequestStatus::Submitted => write!(f, "submitted"),
            SigningRequestStatus::Approved => write!(f, "approved"),
            SigningRequestStatus::Issued => write!(f, "issued"),
            SigningRequestStatus::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// 签名请求名称：`{username}-csr`
pub fn signing_request_name(username: &str) -> String {
    format!("{}-csr", username)
}

/// kubeconfig 上下文名称：`{username}@{cluster}`
pub fn context_name(username: &str, cluster: &str) -> String {
    format!("{}@{}", username, cluster)
}

/// 校验用户名
///
/// 用户名会出现在 CSR 与 RoleBinding 的对象名中，因此采用 DNS 标签风格。
pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        return Err(Error::Validation("用户名不能为空".to_string()));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(Error::Validation(format!(
            "用户名过长: {} 个字符（上限 {}）",
            username.len(),
            MAX_USERNAME_LEN
        )));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(Error::Validation(format!(
            "无效的用户名: {}（仅允许小写字母、数字、'-' 和 '.'，且首尾为字母或数字）",
            username
        )));
    }
    Ok(())
}

/// 校验用户组名称
pub fn validate_group(group: &str) -> Result<()> {
    if group.trim().is_empty() {
        return Err(Error::Validation("用户组名称不能为空".to_string()));
    }
    if group.trim() != group || group.starts_with('#') {
        return Err(Error::Validation(format!("用户组名称首尾不能为空白或以 '#' 开头: {:?}", group)));
    }
    if group.chars().any(|c| c.is_control() || ",+\"\\<>;=".contains(c)) {
        return Err(Error::Validation(format!("用户组名称包含非法字符: {}", group)));
    }
    Ok(())
}

/// 校验并去重用户组，保留首次出现的顺序
pub fn normalize_groups<I, S>(groups: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut normalized: Vec<String> = Vec::new();
    for group in groups {
        let group = group.into();
        validate_group(&group)?;
        if !normalized.contains(&group) {
            normalized.push(group);
        }
    }
    Ok(normalized)
}

/// 将证书有效期（天）换算为签名请求使用的秒数
pub fn expiration_seconds(days: u32) -> Result<i32> {
    if days == 0 || days > MAX_EXPIRATION_DAYS {
        return Err(Error::Validation(format!(
            "无效的证书有效期: {} 天（允许范围 1..={}）",
            days, MAX_EXPIRATION_DAYS
        )));
    }
    Ok((days * SECONDS_PER_DAY) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("alice")]
    #[case("dev-ops.1")]
    #[case("a")]
    fn test_valid_usernames(#[case] name: &str) {
        assert!(validate_username(name).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("Alice")]
    #[case("-alice")]
    #[case("alice-")]
    #[case("alice/bob")]
    #[case("alice bob")]
    fn test_invalid_usernames(#[case] name: &str) {
        assert!(matches!(validate_username(name), Err(Error::Validation(_))));
    }

    #[test]
    fn test_username_length_limit() {
        let name = "a".repeat(MAX_USERNAME_LEN + 1);
        assert!(validate_username(&name).is_err());
        assert!(validate_username(&name[..MAX_USERNAME_LEN]).is_ok());
    }

    #[test]
    fn test_normalize_groups_dedupes_in_order() {
        let groups = normalize_groups(vec!["dev", "ops", "dev"]).unwrap();
        assert_eq!(groups, vec!["dev".to_string(), "ops".to_string()]);

        assert!(normalize_groups(Vec::<String>::new()).unwrap().is_empty());
        assert!(normalize_groups(vec!["a,b"]).is_err());
        assert!(normalize_groups(vec!["  "]).is_err());
        assert!(normalize_groups(vec![" dev"]).is_err());
        assert!(normalize_groups(vec!["system:masters"]).is_ok());
    }

    #[test]
    fn test_expiration_seconds() {
        assert_eq!(expiration_seconds(1).unwrap(), 86_400);
        assert_eq!(expiration_seconds(365).unwrap(), 31_536_000);
        assert!(expiration_seconds(0).is_err());
        assert!(expiration_seconds(MAX_EXPIRATION_DAYS).is_ok());
        assert!(expiration_seconds(MAX_EXPIRATION_DAYS + 1).is_err());
    }

    #[test]
    fn test_naming_conventions() {
        assert_eq!(signing_request_name("alice"), "alice-csr");
        assert_eq!(context_name("alice", "k8s-lab"), "alice@k8s-lab");
        assert!(SigningRequestStatus::TimedOut.is_terminal());
        assert!(!SigningRequestStatus::Approved.is_terminal());
    }
}
