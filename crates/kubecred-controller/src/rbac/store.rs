//! 授权存储接口
//!
//! 抽象 RBAC 对象与命名空间的读写，生产环境由 kube-rs 实现。绑定只会被整体
//! 创建或按名称删除，不存在读-改-写。

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, Role, RoleBinding};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, ResourceExt};
use kubecred_common::Result;
use tracing::debug;

use crate::utils::kube_error;

/// RBAC 存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthorizationStore: Send + Sync {
    /// 创建 ClusterRoleBinding
    async fn create_cluster_role_binding(&self, binding: &ClusterRoleBinding) -> Result<()>;

    /// 删除 ClusterRoleBinding
    async fn delete_cluster_role_binding(&self, name: &str) -> Result<()>;

    /// 列出全部 ClusterRoleBinding
    async fn list_cluster_role_bindings(&self) -> Result<Vec<ClusterRoleBinding>>;

    /// 在命名空间中创建 RoleBinding
    async fn create_role_binding(&self, namespace: &str, binding: &RoleBinding) -> Result<()>;

    /// 删除命名空间中的 RoleBinding
    async fn delete_role_binding(&self, namespace: &str, name: &str) -> Result<()>;

    /// 列出命名空间中的 RoleBinding
    async fn list_role_bindings(&self, namespace: &str) -> Result<Vec<RoleBinding>>;

    /// 列出全部命名空间名称
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// 在命名空间中创建 Role
    async fn create_role(&self, namespace: &str, role: &Role) -> Result<()>;
}

/// 基于 kube-rs 的 RBAC 存储
pub struct KubeAuthorizationStore {
    /// Kubernetes 客户端
    client: Client,
}

impl KubeAuthorizationStore {
    /// 创建新的 RBAC 存储
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthorizationStore for KubeAuthorizationStore {
    async fn create_cluster_role_binding(&self, binding: &ClusterRoleBinding) -> Result<()> {
        let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        let name = binding.name_any();
        api.create(&PostParams::default(), binding)
            .await
            .map_err(|e| kube_error(e, &format!("ClusterRoleBinding/{}", name)))?;

        debug!("已创建 ClusterRoleBinding {}", name);
        Ok(())
    }

    async fn delete_cluster_role_binding(&self, name: &str) -> Result<()> {
        let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        api.delete(name, &DeleteParams::default())
            .await
            .map_err(|e| kube_error(e, &format!("ClusterRoleBinding/{}", name)))?;
        Ok(())
    }

    async fn list_cluster_role_bindings(&self) -> Result<Vec<ClusterRoleBinding>> {
        let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| kube_error(e, "ClusterRoleBinding"))?;
        Ok(list.items)
    }

    async fn create_role_binding(&self, namespace: &str, binding: &RoleBinding) -> Result<()> {
        let api: Api<RoleBinding> = Api::namespaced(self.client.clone(), namespace);
        let name = binding.name_any();
        api.create(&PostParams::default(), binding)
            .await
            .map_err(|e| kube_error(e, &format!("RoleBinding/{}/{}", namespace, name)))?;

        debug!("已创建 RoleBinding {}/{}", namespace, name);
        Ok(())
    }

    async fn delete_role_binding(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<RoleBinding> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default())
            .await
            .map_err(|e| kube_error(e, &format!("RoleBinding/{}/{}", namespace, name)))?;
        Ok(())
    }

    async fn list_role_bindings(&self, namespace: &str) -> Result<Vec<RoleBinding>> {
        let api: Api<RoleBinding> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| kube_error(e, &format!("RoleBinding/{}", namespace)))?;
        Ok(list.items)
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| kube_error(e, "Namespace"))?;
        Ok(list.items.iter().map(|ns| ns.name_any()).collect())
    }

    async fn create_role(&self, namespace: &str, role: &Role) -> Result<()> {
        let api: Api<Role> = Api::namespaced(self.client.clone(), namespace);
        let name = role.name_any();
        api.create(&PostParams::default(), role)
            .await
            .map_err(|e| kube_error(e, &format!("Role/{}/{}", namespace, name)))?;

        debug!("已创建 Role {}/{}", namespace, name);
        Ok(())
    }
}
