//! 授权绑定模型
//!
//! 描述用户（及其用户组）与命名角色之间的授权关系。绑定按照
//! `{username}-{roleName}-binding` 的约定命名，删除身份时依靠该前缀查找，
//! 而不是依赖 ownerReference。

use serde::{Deserialize, Serialize};
use std::fmt;

/// RBAC API 组
pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

/// 绑定作用域
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingScope {
    /// 集群级（ClusterRoleBinding → ClusterRole）
    Cluster,
    /// 命名空间级（RoleBinding → Role）
    Namespace(String),
}

impl BindingScope {
    /// 绑定引用的角色类型
    pub fn role_kind(&self) -> &'static str {
        match self {
            BindingScope::Cluster => "ClusterRole",
            BindingScope::Namespace(_) => "Role",
        }
    }

    /// 命名空间（集群级绑定为 None）
    pub fn namespace(&self) -> Option<&str> {
        match self {
            BindingScope::Cluster => None,
            BindingScope::Namespace(ns) => Some(ns),
        }
    }
}

impl fmt::Display for BindingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingScope::Cluster => write!(f, "cluster"),
            BindingScope::Namespace(ns) => write!(f, "namespace/{}", ns),
        }
    }
}

/// 绑定主体
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingSubject {
    /// 用户
    User(String),
    /// 用户组
    Group(String),
}

impl BindingSubject {
    /// RBAC Subject 的 kind 字段
    pub fn kind(&self) -> &'static str {
        match self {
            BindingSubject::User(_) => "User",
            BindingSubject::Group(_) => "Group",
        }
    }

    /// 主体名称
    pub fn name(&self) -> &str {
        match self {
            BindingSubject::User(name) | BindingSubject::Group(name) => name,
        }
    }
}

impl fmt::Display for BindingSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.name())
    }
}

/// 授权绑定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// 绑定对象名称
    pub name: String,
    /// 绑定主体：用户在前，随后每个用户组一个
    pub subjects: Vec<BindingSubject>,
    /// 引用的角色名称
    pub role_name: String,
    /// 作用域
    pub scope: BindingScope,
}

impl Binding {
    /// 为用户及其用户组构造绑定
    pub fn for_identity(username: &str, groups: &[String], role_name: &str, scope: BindingScope) -> Self {
        let mut subjects = vec![BindingSubject::User(username.to_string())];
        subjects.extend(groups.iter().cloned().map(BindingSubject::Group));

        Self {
            name: binding_name(username, role_name),
            subjects,
            role_name: role_name.to_string(),
            scope,
        }
    }
}

/// 绑定名称：`{username}-{roleName}-binding`
pub fn binding_name(username: &str, role_name: &str) -> String {
    format!("{}-{}-binding", username, role_name)
}

/// 删除身份时用于匹配绑定的名称前缀
pub fn binding_prefix(username: &str) -> String {
    format!("{}-", username)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_for_identity() {
        let binding = Binding::for_identity(
            "alice",
            &["dev".to_string(), "ops".to_string()],
            "view",
            BindingScope::Cluster,
        );

        assert_eq!(binding.name, "alice-view-binding");
        assert_eq!(
            binding.subjects,
            vec![
                BindingSubject::User("alice".into()),
                BindingSubject::Group("dev".into()),
                BindingSubject::Group("ops".into()),
            ]
        );
        assert_eq!(binding.scope.role_kind(), "ClusterRole");
    }

    #[test]
    fn test_binding_without_groups() {
        let binding = Binding::for_identity("bob", &[], "developer", BindingScope::Namespace("dev".into()));
        assert_eq!(binding.subjects.len(), 1);
        assert_eq!(binding.scope.namespace(), Some("dev"));
        assert_eq!(binding.scope.role_kind(), "Role");
        assert_eq!(binding.scope.to_string(), "namespace/dev");
    }

    #[test]
    fn test_prefix_matches_binding_name() {
        assert!(binding_name("alice", "view").starts_with(&binding_prefix("alice")));
        assert_eq!(BindingSubject::Group("dev".into()).to_string(), "Group:dev");
    }
}
