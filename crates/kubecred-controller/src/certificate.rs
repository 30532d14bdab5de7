//! 证书解析
//!
//! 从 PEM 编码的证书或 CSR 中读取 Subject 的 CN 与 O 字段。身份列表显示的
//! 用户组直接取自已签发证书，证书文件即为事实来源。

use kubecred_common::{Error, Result};
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::*;

/// 证书主题信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectInfo {
    /// Subject CN
    pub common_name: Option<String>,
    /// Subject O，按证书中的顺序
    pub organizations: Vec<String>,
}

impl SubjectInfo {
    /// 判断主题是否与用户名、用户组一致（用户组不区分顺序）
    pub fn matches(&self, username: &str, groups: &[String]) -> bool {
        if self.common_name.as_deref() != Some(username) {
            return false;
        }
        let mut expected: Vec<&str> = groups.iter().map(String::as_str).collect();
        let mut actual: Vec<&str> = self.organizations.iter().map(String::as_str).collect();
        expected.sort_unstable();
        expected.dedup();
        actual.sort_unstable();
        actual.dedup();
        expected == actual
    }
}

fn subject_info(name: &X509Name<'_>) -> SubjectInfo {
    let common_name = name
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string);

    let organizations = name
        .iter_organization()
        .filter_map(|o| o.as_str().ok())
        .map(str::to_string)
        .collect();

    SubjectInfo {
        common_name,
        organizations,
    }
}

/// 解析 PEM 编码的证书
pub fn inspect_certificate(pem_data: &[u8]) -> Result<SubjectInfo> {
    let (_, pem) = parse_x509_pem(pem_data)
        .map_err(|e| Error::Certificate(format!("PEM 解析失败: {}", e)))?;
    let cert = pem
        .parse_x509()
        .map_err(|e| Error::Certificate(format!("证书解析失败: {}", e)))?;

    Ok(subject_info(cert.subject()))
}

/// 解析 PEM 编码的 CSR
pub fn inspect_request(pem_data: &[u8]) -> Result<SubjectInfo> {
    let (_, pem) = parse_x509_pem(pem_data)
        .map_err(|e| Error::Certificate(format!("PEM 解析失败: {}", e)))?;
    if pem.label != "CERTIFICATE REQUEST" {
        return Err(Error::Certificate(format!("不是 CSR: {}", pem.label)));
    }
    let (_, request) = X509CertificationRequest::from_der(&pem.contents)
        .map_err(|e| Error::Certificate(format!("CSR 解析失败: {}", e)))?;

    Ok(subject_info(&request.certification_request_info.subject))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_matches_ignores_group_order() {
        let info = SubjectInfo {
            common_name: Some("alice".into()),
            organizations: vec!["ops".into(), "dev".into()],
        };

        assert!(info.matches("alice", &["dev".into(), "ops".into()]));
        assert!(!info.matches("alice", &["dev".into()]));
        assert!(!info.matches("bob", &["dev".into(), "ops".into()]));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(inspect_certificate(b"not a pem"), Err(Error::Certificate(_))));
        assert!(matches!(inspect_request(b""), Err(Error::Certificate(_))));
    }
}
