//! 证书签发客户端
//!
//! 驱动单个签名请求的状态机：`Submitted → Approved → Issued`，若截止时间内
//! 没有签发证书则进入 `TimedOut`。轮询间隔与截止时间由 [`PollPolicy`] 配置，
//! 轮询是整个签发流程中唯一的等待点。

use chrono::Utc;
use k8s_openapi::api::certificates::v1::{
    CertificateSigningRequest, CertificateSigningRequestCondition, CertificateSigningRequestSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use k8s_openapi::ByteString;
use kubecred_common::{Error, Result, SigningRequestStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::api::CertificateSigningApi;
use crate::utils::format_duration;

/// 仅用于客户端认证的签发者
pub const DEFAULT_SIGNER_NAME: &str = "kubernetes.io/kube-apiserver-client";

/// 客户端认证用途
pub const CLIENT_AUTH_USAGE: &str = "client auth";

/// 批准原因
pub const APPROVAL_REASON: &str = "ApprovedByKubecred";

/// 批准说明
pub const APPROVAL_MESSAGE: &str = "Approved by kubecred identity controller";

/// 证书轮询策略：固定间隔 + 硬性截止时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// 轮询间隔
    pub interval: Duration,
    /// 最长等待时间
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

/// 证书签发客户端
pub struct CertificateAuthorityClient {
    /// 签发服务
    api: Arc<dyn CertificateSigningApi>,
    /// 签发者名称
    signer_name: String,
    /// 轮询策略
    poll: PollPolicy,
}

impl CertificateAuthorityClient {
    /// 创建新的签发客户端
    pub fn new(api: Arc<dyn CertificateSigningApi>, signer_name: impl Into<String>, poll: PollPolicy) -> Self {
        Self {
            api,
            signer_name: signer_name.into(),
            poll,
        }
    }

    /// 提交签名请求
    ///
    /// 先删除同名的残留请求，保证重复提交不会因对象已存在而失败。
    pub async fn submit(&self, name: &str, csr_pem: &[u8], lifetime_seconds: i32) -> Result<SigningRequestStatus> {
        match self.api.delete(name).await {
            Ok(()) => info!("已删除残留的签名请求 {}", name),
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!("删除残留的签名请求 {} 失败: {}", name, e),
        }

        let request = CertificateSigningRequest {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: CertificateSigningRequestSpec {
                request: ByteString(csr_pem.to_vec()),
                signer_name: self.signer_name.clone(),
                expiration_seconds: Some(lifetime_seconds),
                usages: Some(vec![CLIENT_AUTH_USAGE.to_string()]),
                ..Default::default()
            },
            status: None,
        };

        self.api
            .create(&request)
            .await
            .map_err(|e| Error::CertificateAuthority(format!("提交签名请求 {} 失败: {}", name, e)))?;

        debug!("签名请求 {} 状态: {}", name, SigningRequestStatus::Submitted);
        Ok(SigningRequestStatus::Submitted)
    }

    /// 批准签名请求
    ///
    /// 批准前重新获取最新对象，基于最新的 resourceVersion 追加 Approved 条件。
    pub async fn approve(&self, name: &str) -> Result<SigningRequestStatus> {
        let mut request = self
            .api
            .get(name)
            .await
            .map_err(|e| Error::CertificateAuthority(format!("获取签名请求 {} 失败: {}", name, e)))?;

        let status = request.status.get_or_insert_with(Default::default);
        status
            .conditions
            .get_or_insert_with(Vec::new)
            .push(CertificateSigningRequestCondition {
                type_: "Approved".to_string(),
                status: "True".to_string(),
                reason: Some(APPROVAL_REASON.to_string()),
                message: Some(APPROVAL_MESSAGE.to_string()),
                last_update_time: Some(Time(Utc::now())),
                ..Default::default()
            });

        self.api
            .replace_approval(name, &request)
            .await
            .map_err(|e| Error::CertificateAuthority(format!("批准签名请求 {} 失败: {}", name, e)))?;

        debug!("签名请求 {} 状态: {}", name, SigningRequestStatus::Approved);
        Ok(SigningRequestStatus::Approved)
    }

    /// 等待证书签发
    ///
    /// 按 [`PollPolicy`] 的间隔轮询，直到签名请求带有证书或超过其截止时间。
    /// 签名请求被拒绝、签发失败或读取失败时立即返回错误。
    pub async fn wait_for_certificate(&self, name: &str) -> Result<Vec<u8>> {
        let timeout = self.poll.timeout;
        let deadline = Instant::now() + timeout;

        loop {
            let request = self
                .api
                .get(name)
                .await
                .map_err(|e| Error::CertificateAuthority(format!("获取签名请求 {} 失败: {}", name, e)))?;

            if let Some(certificate) = issued_certificate(&request) {
                debug!("签名请求 {} 状态: {}", name, SigningRequestStatus::Issued);
                return Ok(certificate);
            }

            if let Some(reason) = rejection(&request) {
                return Err(Error::CertificateAuthority(format!("签名请求 {} 未通过: {}", name, reason)));
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "签名请求 {} 状态: {}（等待 {}）",
                    name,
                    SigningRequestStatus::TimedOut,
                    format_duration(timeout)
                );
                return Err(Error::CertificateTimeout {
                    name: name.to_string(),
                    timeout,
                });
            }

            tokio::time::sleep(self.poll.interval.min(deadline - now)).await;
        }
    }

    /// 删除签名请求，错误原样返回
    pub async fn delete_request(&self, name: &str) -> Result<()> {
        self.api.delete(name).await
    }

    /// 尽力删除签名请求，失败只记录日志
    pub async fn cleanup(&self, name: &str) {
        match self.api.delete(name).await {
            Ok(()) => debug!("已清理签名请求 {}", name),
            Err(e) if e.is_not_found() => debug!("签名请求 {} 已不存在", name),
            Err(e) => warn!("清理签名请求 {} 失败: {}", name, e),
        }
    }
}

/// 提取已签发的证书
fn issued_certificate(request: &CertificateSigningRequest) -> Option<Vec<u8>> {
    request
        .status
        .as_ref()
        .and_then(|s| s.certificate.as_ref())
        .filter(|c| !c.0.is_empty())
        .map(|c| c.0.clone())
}

/// 检查是否存在 Denied / Failed 条件
fn rejection(request: &CertificateSigningRequest) -> Option<String> {
    request
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conditions| {
            conditions
                .iter()
                .find(|c| (c.type_ == "Denied" || c.type_ == "Failed") && c.status == "True")
        })
        .map(|c| {
            format!(
                "{} ({})",
                c.type_,
                c.message.as_deref().or(c.reason.as_deref()).unwrap_or("无说明")
            )
        })
}
