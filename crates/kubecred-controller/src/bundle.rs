//! 连接文件生成
//!
//! 从运维人员自己的参考 kubeconfig 中取出当前上下文所指集群的地址与 CA，
//! 与新签发的证书和私钥组合成只包含一个集群、一个用户、一个上下文的
//! kubeconfig。参考文件中的其他集群不会出现在结果中。

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use kubecred_common::{
    context_name, AuthInfo, Cluster, Context, Error, Kubeconfig, NamedAuthInfo, NamedCluster, NamedContext,
    Result,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::utils::{write_file_atomic, MODE_PRIVATE};

/// 生成的连接文件信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleInfo {
    /// 文件路径
    pub path: PathBuf,
    /// 集群名称
    pub cluster_name: String,
    /// 上下文名称，形如 `{username}@{cluster}`
    pub context_name: String,
}

/// 连接文件生成器
pub struct CredentialBundler {
    /// 参考 kubeconfig 路径
    reference_path: PathBuf,
}

impl CredentialBundler {
    /// 创建新的生成器
    pub fn new(reference_path: impl Into<PathBuf>) -> Self {
        Self {
            reference_path: reference_path.into(),
        }
    }

    /// 读取参考 kubeconfig
    pub fn load_reference(&self) -> Result<Kubeconfig> {
        let content = fs::read_to_string(&self.reference_path).map_err(|e| {
            Error::ReferenceBundle(format!("无法读取 {}: {}", self.reference_path.display(), e))
        })?;
        Kubeconfig::from_yaml(&content)
            .map_err(|e| Error::ReferenceBundle(format!("无法解析 {}: {}", self.reference_path.display(), e)))
    }

    /// 生成连接文件内容，返回文档与集群名称
    pub fn render(&self, username: &str, key_pem: &[u8], cert_pem: &[u8]) -> Result<(Kubeconfig, String)> {
        let reference = self.load_reference()?;
        let (cluster_name, reference_cluster) = reference.current_cluster()?;

        let cluster = Cluster {
            server: reference_cluster.server.clone(),
            certificate_authority_data: self.authority_data(reference_cluster)?,
            certificate_authority: None,
            insecure_skip_tls_verify: reference_cluster.insecure_skip_tls_verify,
            tls_server_name: reference_cluster.tls_server_name.clone(),
        };
        if cluster.server.is_none() {
            return Err(Error::ReferenceBundle(format!("集群 {} 未配置 server", cluster_name)));
        }

        let context = context_name(username, cluster_name);
        let bundle = Kubeconfig {
            clusters: vec![NamedCluster {
                name: cluster_name.to_string(),
                cluster,
            }],
            users: vec![NamedAuthInfo {
                name: username.to_string(),
                user: AuthInfo {
                    client_certificate_data: Some(STANDARD.encode(cert_pem)),
                    client_key_data: Some(STANDARD.encode(key_pem)),
                },
            }],
            contexts: vec![NamedContext {
                name: context.clone(),
                context: Context {
                    cluster: cluster_name.to_string(),
                    user: username.to_string(),
                    namespace: None,
                },
            }],
            current_context: Some(context),
            ..Default::default()
        };

        Ok((bundle, cluster_name.to_string()))
    }

    /// 生成并写入连接文件（权限 0600）
    pub fn build_bundle(&self, username: &str, key_pem: &[u8], cert_pem: &[u8], output_path: &Path) -> Result<BundleInfo> {
        let (bundle, cluster_name) = self.render(username, key_pem, cert_pem)?;
        let yaml = bundle.to_yaml()?;
        write_file_atomic(output_path, yaml.as_bytes(), MODE_PRIVATE)?;

        let context_name = context_name(username, &cluster_name);
        info!("已生成连接文件 {:?}（上下文 {}）", output_path, context_name);
        Ok(BundleInfo {
            path: output_path.to_path_buf(),
            cluster_name,
            context_name,
        })
    }

    /// CA 数据：优先复制内联数据，否则读取 CA 文件并编码
    fn authority_data(&self, cluster: &Cluster) -> Result<Option<String>> {
        if let Some(data) = cluster.certificate_authority_data.as_ref().filter(|d| !d.is_empty()) {
            return Ok(Some(data.clone()));
        }

        let Some(file) = cluster.certificate_authority.as_ref().filter(|f| !f.is_empty()) else {
            debug!("参考集群未配置 CA");
            return Ok(None);
        };

        let mut path = PathBuf::from(file);
        if path.is_relative() {
            if let Some(dir) = self.reference_path.parent() {
                path = dir.join(path);
            }
        }

        let pem = fs::read(&path)
            .map_err(|e| Error::ReferenceBundle(format!("无法读取 CA 文件 {}: {}", path.display(), e)))?;
        Ok(Some(STANDARD.encode(pem)))
    }
}
