//! 授权绑定管理器
//!
//! 将用户及其用户组绑定到 ClusterRole 或命名空间内的 Role。绑定名称遵循
//! `{username}-{roleName}-binding` 约定，删除时按 `{username}-` 前缀查找。

use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, PolicyRule, Role, RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use kubecred_common::{binding_prefix, Binding, BindingScope, Error, Result, RBAC_API_GROUP};
use std::sync::Arc;
use tracing::{debug, info};

use super::store::AuthorizationStore;
use crate::report::DeletionReport;

/// 授权绑定管理器
pub struct AuthorizationBindingManager {
    /// RBAC 存储
    store: Arc<dyn AuthorizationStore>,
}

impl AuthorizationBindingManager {
    /// 创建新的绑定管理器
    pub fn new(store: Arc<dyn AuthorizationStore>) -> Self {
        Self { store }
    }

    /// 绑定 ClusterRole
    ///
    /// 角色名为空时不创建任何绑定，返回 `None`。绑定已存在视为成功。
    pub async fn bind_cluster_role(&self, username: &str, groups: &[String], role_name: &str) -> Result<Option<Binding>> {
        if role_name.is_empty() {
            return Ok(None);
        }

        let binding = Binding::for_identity(username, groups, role_name, BindingScope::Cluster);
        let object = ClusterRoleBinding {
            metadata: ObjectMeta {
                name: Some(binding.name.clone()),
                ..Default::default()
            },
            role_ref: role_ref(&binding),
            subjects: Some(subjects(&binding)),
        };

        match self.store.create_cluster_role_binding(&object).await {
            Ok(()) => info!("已创建 ClusterRoleBinding {}（{}）", binding.name, role_name),
            Err(e) if e.is_already_exists() => info!("ClusterRoleBinding {} 已存在，跳过", binding.name),
            Err(e) => return Err(e),
        }

        Ok(Some(binding))
    }

    /// 在命名空间中绑定 Role
    ///
    /// 角色名或命名空间为空时不创建任何绑定。绑定已存在视为成功。
    pub async fn bind_namespace_role(
        &self,
        username: &str,
        groups: &[String],
        role_name: &str,
        namespace: &str,
    ) -> Result<Option<Binding>> {
        if role_name.is_empty() || namespace.is_empty() {
            return Ok(None);
        }

        let binding = Binding::for_identity(
            username,
            groups,
            role_name,
            BindingScope::Namespace(namespace.to_string()),
        );
        let object = RoleBinding {
            metadata: ObjectMeta {
                name: Some(binding.name.clone()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            role_ref: role_ref(&binding),
            subjects: Some(subjects(&binding)),
        };

        match self.store.create_role_binding(namespace, &object).await {
            Ok(()) => info!("已创建 RoleBinding {}/{}（{}）", namespace, binding.name, role_name),
            Err(e) if e.is_already_exists() => info!("RoleBinding {}/{} 已存在，跳过", namespace, binding.name),
            Err(e) => return Err(e),
        }

        Ok(Some(binding))
    }

    /// 创建命名空间级 Role，已存在视为成功
    ///
    /// 返回是否真正创建了新对象。
    pub async fn create_namespace_role(&self, name: &str, namespace: &str, rules: Vec<PolicyRule>) -> Result<bool> {
        if name.is_empty() || namespace.is_empty() {
            return Err(Error::Validation("Role 名称与命名空间不能为空".to_string()));
        }

        let role = Role {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            rules: Some(rules),
        };

        match self.store.create_role(namespace, &role).await {
            Ok(()) => {
                info!("已在命名空间 {} 中创建 Role {}", namespace, name);
                Ok(true)
            }
            Err(e) if e.is_already_exists() => {
                info!("Role {} 已存在于命名空间 {}", name, namespace);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// 删除用户的全部绑定，错误记录到报告中而不返回
    pub async fn delete_identity_bindings(&self, username: &str, report: &mut DeletionReport) {
        let prefix = binding_prefix(username);

        match self.store.list_cluster_role_bindings().await {
            Ok(bindings) => {
                for name in bindings.iter().map(|b| b.name_any()).filter(|n| n.starts_with(&prefix)) {
                    info!("删除 ClusterRoleBinding {}", name);
                    match self.store.delete_cluster_role_binding(&name).await {
                        Ok(()) => report.record_removed(format!("ClusterRoleBinding/{}", name)),
                        Err(e) => report.record_skipped(format!("删除 ClusterRoleBinding/{}", name), &e),
                    }
                }
            }
            Err(e) => report.record_skipped("列出 ClusterRoleBinding", &e),
        }

        let namespaces = match self.store.list_namespaces().await {
            Ok(namespaces) => namespaces,
            Err(e) => {
                report.record_skipped("列出命名空间", &e);
                return;
            }
        };

        for namespace in namespaces {
            let bindings = match self.store.list_role_bindings(&namespace).await {
                Ok(bindings) => bindings,
                Err(e) => {
                    report.record_skipped(format!("列出 RoleBinding/{}", namespace), &e);
                    continue;
                }
            };

            for name in bindings.iter().map(|b| b.name_any()).filter(|n| n.starts_with(&prefix)) {
                info!("删除 RoleBinding {}/{}", namespace, name);
                match self.store.delete_role_binding(&namespace, &name).await {
                    Ok(()) => report.record_removed(format!("RoleBinding/{}/{}", namespace, name)),
                    Err(e) => report.record_skipped(format!("删除 RoleBinding/{}/{}", namespace, name), &e),
                }
            }
        }

        debug!("用户 {} 的绑定清理完成", username);
    }
}

fn role_ref(binding: &Binding) -> RoleRef {
    RoleRef {
        api_group: RBAC_API_GROUP.to_string(),
        kind: binding.scope.role_kind().to_string(),
        name: binding.role_name.clone(),
    }
}

fn subjects(binding: &Binding) -> Vec<Subject> {
    binding
        .subjects
        .iter()
        .map(|s| Subject {
            api_group: Some(RBAC_API_GROUP.to_string()),
            kind: s.kind().to_string(),
            name: s.name().to_string(),
            namespace: None,
        })
        .collect()
}
