//! Kubecred 控制平面
//!
//! 该模块实现基于 X.509 客户端证书的集群用户身份签发与管理：生成密钥与 CSR、
//! 通过 `certificates.k8s.io` API 签发证书、生成 kubeconfig 连接文件、创建
//! RBAC 绑定，并在本地目录中记录已签发的身份。使用 kube-rs 与 Kubernetes API 交互。

pub mod bundle;
pub mod ca;
pub mod certificate;
pub mod config;
pub mod keygen;
pub mod lifecycle;
pub mod rbac;
pub mod report;
pub mod store;
pub mod utils;

#[cfg(test)]
mod testing;

pub use config::{ConfigManager, KubecredConfig};
pub use lifecycle::{usage_instructions, CreateIdentityRequest, CreatedIdentity, IdentityLifecycleController};
pub use report::{DeletionReport, SkippedStep};
pub use store::IdentityRecord;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use kubecred_common::{Error, Result};
use std::sync::Arc;
use tracing::info;

use crate::ca::KubeCertificateSigningApi;
use crate::rbac::KubeAuthorizationStore;

/// 使用配置中的 kubeconfig 连接集群并创建控制器
pub async fn connect(config: &KubecredConfig) -> Result<IdentityLifecycleController> {
    info!("连接集群，kubeconfig: {:?}", config.kubeconfig);

    let kubeconfig = Kubeconfig::read_from(&config.kubeconfig)
        .map_err(|e| Error::ReferenceBundle(format!("无法读取 {}: {}", config.kubeconfig.display(), e)))?;
    let client_config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| Error::ReferenceBundle(format!("无法加载 {}: {}", config.kubeconfig.display(), e)))?;
    let client = Client::try_from(client_config).map_err(|e| Error::Api(format!("创建 Kubernetes 客户端失败: {}", e)))?;

    Ok(IdentityLifecycleController::new(
        Arc::new(KubeCertificateSigningApi::new(client.clone())),
        Arc::new(KubeAuthorizationStore::new(client)),
        config,
    ))
}
