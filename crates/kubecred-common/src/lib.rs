//! Kubecred Common - 跨模块共享工具与数据结构
//!
//! 该模块提供 Kubecred 所有组件共享的数据结构与统一的错误处理机制，
//! 包括身份模型、签名请求状态、RBAC 绑定模型以及 kubeconfig 文档结构。

pub mod models;
pub mod error;

/// 重新导出常用类型，方便使用
pub use error::Error;
pub use error::Result;
pub use models::identity::*;
pub use models::binding::*;
pub use models::kubeconfig::*;
