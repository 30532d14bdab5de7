//! 授权绑定模块
//!
//! 该模块负责为用户及其用户组创建、删除 RBAC 绑定，以及创建命名空间级角色。
//! 所有创建操作都是幂等的：对象已存在视为成功。

mod manager;
mod rules;
mod store;

pub use manager::AuthorizationBindingManager;
pub use rules::default_developer_rules;
pub use store::{AuthorizationStore, KubeAuthorizationStore};
#[cfg(test)]
pub use store::MockAuthorizationStore;
