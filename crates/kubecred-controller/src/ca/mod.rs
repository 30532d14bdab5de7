//! 证书签发模块
//!
//! 该模块负责通过 Kubernetes `certificates.k8s.io/v1` API 提交、批准 CSR，
//! 并轮询等待证书签发。包含签发服务接口抽象及其 kube-rs 实现。

mod api;
mod client;

pub use api::{CertificateSigningApi, KubeCertificateSigningApi};
#[cfg(test)]
pub use api::MockCertificateSigningApi;
pub use client::{
    CertificateAuthorityClient, PollPolicy, APPROVAL_MESSAGE, APPROVAL_REASON, CLIENT_AUTH_USAGE,
    DEFAULT_SIGNER_NAME,
};
