//! 删除结果报告
//!
//! 删除身份是尽力而为的：每个清理步骤的失败都会被记录并跳过，而不会中断
//! 其余步骤。报告列出实际删除的对象与被跳过的步骤，供调用方与测试检查。

use kubecred_common::Error;
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// 被跳过的清理步骤
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedStep {
    /// 步骤描述
    pub step: String,
    /// 跳过原因
    pub reason: String,
    /// 是否仅仅因为对象不存在
    pub not_found: bool,
}

impl fmt::Display for SkippedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.reason)
    }
}

/// 删除身份的结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    /// 已删除的对象
    pub removed: Vec<String>,
    /// 被跳过的步骤
    pub skipped: Vec<SkippedStep>,
}

impl DeletionReport {
    /// 记录已删除的对象
    pub fn record_removed(&mut self, object: impl Into<String>) {
        self.removed.push(object.into());
    }

    /// 记录被跳过的步骤
    pub fn record_skipped(&mut self, step: impl Into<String>, error: &Error) {
        let step = step.into();
        let not_found = error.is_not_found();
        if not_found {
            tracing::debug!("跳过 {}: 对象不存在", step);
        } else {
            warn!("跳过 {}: {}", step, error);
        }
        self.skipped.push(SkippedStep {
            step,
            reason: error.to_string(),
            not_found,
        });
    }

    /// 除“对象不存在”以外的失败步骤
    pub fn failures(&self) -> impl Iterator<Item = &SkippedStep> {
        self.skipped.iter().filter(|s| !s.not_found)
    }

    /// 是否所有步骤都成功或仅因对象不存在而跳过
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_classifies_skips() {
        let mut report = DeletionReport::default();
        report.record_removed("ClusterRoleBinding/alice-view-binding");
        report.record_skipped("删除 CSR alice-csr", &Error::NotFound("alice-csr".into()));
        assert!(report.is_clean());

        report.record_skipped("列出命名空间", &Error::Api("forbidden".into()));
        assert!(!report.is_clean());
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.skipped.len(), 2);
    }
}
