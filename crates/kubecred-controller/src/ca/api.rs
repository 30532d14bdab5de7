//! 签发服务接口
//!
//! 将对 CertificateSigningRequest 对象的四种操作抽象为 trait，生产环境使用
//! kube-rs 实现，测试中替换为内存实现或 mock。

use async_trait::async_trait;
use k8s_openapi::api::certificates::v1::CertificateSigningRequest;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;
use kubecred_common::Result;
use tracing::debug;

use crate::utils::kube_error;

/// CSR 对象操作接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CertificateSigningApi: Send + Sync {
    /// 创建签名请求
    async fn create(&self, request: &CertificateSigningRequest) -> Result<()>;

    /// 按名称获取签名请求
    async fn get(&self, name: &str) -> Result<CertificateSigningRequest>;

    /// 提交批准状态（approval 子资源），携带 resourceVersion 做乐观并发控制
    async fn replace_approval(&self, name: &str, request: &CertificateSigningRequest) -> Result<()>;

    /// 按名称删除签名请求
    async fn delete(&self, name: &str) -> Result<()>;
}

/// 基于 kube-rs 的签发服务实现
pub struct KubeCertificateSigningApi {
    /// CSR API（集群级资源）
    api: Api<CertificateSigningRequest>,
}

impl KubeCertificateSigningApi {
    /// 创建新的签发服务客户端
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl CertificateSigningApi for KubeCertificateSigningApi {
    async fn create(&self, request: &CertificateSigningRequest) -> Result<()> {
        let name = request.metadata.name.clone().unwrap_or_default();
        self.api
            .create(&PostParams::default(), request)
            .await
            .map_err(|e| kube_error(e, &format!("CertificateSigningRequest/{}", name)))?;

        debug!("已创建 CertificateSigningRequest {}", name);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<CertificateSigningRequest> {
        self.api
            .get(name)
            .await
            .map_err(|e| kube_error(e, &format!("CertificateSigningRequest/{}", name)))
    }

    async fn replace_approval(&self, name: &str, request: &CertificateSigningRequest) -> Result<()> {
        let data = serde_json::to_vec(request)?;
        self.api
            .replace_subresource("approval", name, &PostParams::default(), data)
            .await
            .map_err(|e| kube_error(e, &format!("CertificateSigningRequest/{}/approval", name)))?;

        debug!("已更新 CertificateSigningRequest {} 的批准状态", name);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.api
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| kube_error(e, &format!("CertificateSigningRequest/{}", name)))?;

        debug!("已删除 CertificateSigningRequest {}", name);
        Ok(())
    }
}
