//! kubeconfig 文档模型
//!
//! 仅覆盖签发连接文件所需的字段：集群、用户凭据、上下文与当前上下文。
//! 反序列化时忽略未知字段，因此可以直接读取运维人员自己的 kubeconfig。

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// kubeconfig 文档
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kubeconfig {
    /// API 版本
    #[serde(rename = "apiVersion", default = "default_api_version")]
    pub api_version: String,
    /// 文档类型
    #[serde(default = "default_kind")]
    pub kind: String,
    /// 集群列表
    #[serde(default, deserialize_with = "null_as_empty")]
    pub clusters: Vec<NamedCluster>,
    /// 用户凭据列表
    #[serde(default, deserialize_with = "null_as_empty")]
    pub users: Vec<NamedAuthInfo>,
    /// 上下文列表
    #[serde(default, deserialize_with = "null_as_empty")]
    pub contexts: Vec<NamedContext>,
    /// 当前上下文
    #[serde(rename = "current-context", default, skip_serializing_if = "Option::is_none")]
    pub current_context: Option<String>,
}

/// 命名集群
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCluster {
    /// 集群名称
    pub name: String,
    /// 集群连接参数
    pub cluster: Cluster,
}

/// 集群连接参数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    /// API Server 地址
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// CA 证书（base64 编码的 PEM）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,
    /// CA 证书文件路径
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<String>,
    /// 跳过 TLS 校验
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_skip_tls_verify: Option<bool>,
    /// TLS SNI 名称
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_server_name: Option<String>,
}

/// 命名用户凭据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedAuthInfo {
    /// 用户名称
    pub name: String,
    /// 凭据
    pub user: AuthInfo,
}

/// 用户凭据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuthInfo {
    /// 客户端证书（base64 编码的 PEM）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate_data: Option<String>,
    /// 客户端私钥（base64 编码的 PEM）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key_data: Option<String>,
}

/// 命名上下文
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedContext {
    /// 上下文名称
    pub name: String,
    /// 上下文内容
    pub context: Context,
}

/// 上下文：集群与用户的组合
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// 集群名称
    pub cluster: String,
    /// 用户名称
    #[serde(default)]
    pub user: String,
    /// 默认命名空间
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_kind() -> String {
    "Config".to_string()
}

/// kubectl 会把空列表写成 `null`
fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Default for Kubeconfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            clusters: Vec::new(),
            users: Vec::new(),
            contexts: Vec::new(),
            current_context: None,
        }
    }
}

impl Kubeconfig {
    /// 从 YAML 文本解析
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// 序列化为 YAML 文本
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// 按名称查找集群
    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.name == name).map(|c| &c.cluster)
    }

    /// 按名称查找用户凭据
    pub fn user(&self, name: &str) -> Option<&AuthInfo> {
        self.users.iter().find(|u| u.name == name).map(|u| &u.user)
    }

    /// 按名称查找上下文
    pub fn context(&self, name: &str) -> Option<&Context> {
        self.contexts.iter().find(|c| c.name == name).map(|c| &c.context)
    }

    /// 解析当前上下文指向的集群，返回集群名称与连接参数
    pub fn current_cluster(&self) -> Result<(&str, &Cluster)> {
        let current = self
            .current_context
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::ReferenceBundle("未设置 current-context".to_string()))?;

        let context = self
            .context(current)
            .ok_or_else(|| Error::ReferenceBundle(format!("上下文不存在: {}", current)))?;

        let cluster = self
            .cluster(&context.cluster)
            .ok_or_else(|| Error::ReferenceBundle(format!("集群不存在: {}", context.cluster)))?;

        Ok((context.cluster.as_str(), cluster))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: &str = r#"
apiVersion: v1
kind: Config
preferences: {}
clusters:
- name: k8s-lab
  cluster:
    server: https://10.0.0.10:6443
    certificate-authority-data: Q0EtREFUQQ==
- name: other
  cluster:
    server: https://other:6443
users:
- name: kubernetes-admin
  user:
    client-certificate-data: Q0VSVA==
    client-key-data: S0VZ
contexts:
- name: kubernetes-admin@k8s-lab
  context:
    cluster: k8s-lab
    user: kubernetes-admin
current-context: kubernetes-admin@k8s-lab
"#;

    #[test]
    fn test_parse_reference_kubeconfig() {
        let config = Kubeconfig::from_yaml(REFERENCE).unwrap();
        let (name, cluster) = config.current_cluster().unwrap();

        assert_eq!(name, "k8s-lab");
        assert_eq!(cluster.server.as_deref(), Some("https://10.0.0.10:6443"));
        assert_eq!(cluster.certificate_authority_data.as_deref(), Some("Q0EtREFUQQ=="));
        assert_eq!(config.user("kubernetes-admin").unwrap().client_key_data.as_deref(), Some("S0VZ"));
    }

    #[test]
    fn test_missing_current_context() {
        let mut config = Kubeconfig::from_yaml(REFERENCE).unwrap();
        config.current_context = None;
        assert!(matches!(config.current_cluster(), Err(Error::ReferenceBundle(_))));

        config.current_context = Some("nope".into());
        assert!(matches!(config.current_cluster(), Err(Error::ReferenceBundle(_))));
    }

    #[test]
    fn test_null_lists_are_empty() {
        let yaml = "apiVersion: v1\nkind: Config\nclusters:\n- name: k8s-lab\n  cluster:\n    server: https://10.0.0.10:6443\nusers: null\ncontexts: null\n";
        let config = Kubeconfig::from_yaml(yaml).unwrap();

        assert_eq!(config.clusters.len(), 1);
        assert!(config.users.is_empty());
        assert!(config.contexts.is_empty());

        let config = Kubeconfig::from_yaml("clusters: null\n").unwrap();
        assert!(config.clusters.is_empty());
    }

    #[test]
    fn test_serialized_keys_are_kubeconfig_style() {
        let config = Kubeconfig::from_yaml(REFERENCE).unwrap();
        let yaml = config.to_yaml().unwrap();

        assert!(yaml.contains("apiVersion: v1"));
        assert!(yaml.contains("current-context: kubernetes-admin@k8s-lab"));
        assert!(yaml.contains("certificate-authority-data:"));
        assert!(yaml.contains("client-key-data:"));
    }
}
