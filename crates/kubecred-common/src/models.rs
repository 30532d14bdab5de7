//! 数据模型模块
//!
//! 该模块定义了 Kubecred 使用的核心数据模型：用户身份、签名请求状态、
//! 授权绑定以及可移植的 kubeconfig 连接文件。

pub mod identity;
pub mod binding;
pub mod kubeconfig;
