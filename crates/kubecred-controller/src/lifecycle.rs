//! 身份生命周期控制器
//!
//! 编排密钥生成、CSR 签发、连接文件生成与 RBAC 绑定，对外提供创建、删除、
//! 列出身份以及创建开发者角色的操作。
//!
//! 创建流程不是事务性的：证书与连接文件落盘后若绑定失败，身份处于部分完成
//! 状态，需要重新执行创建（绑定创建是幂等的）或显式删除。

use kubecred_common::error::StepContext;
use kubecred_common::{
    expiration_seconds, normalize_groups, signing_request_name, validate_username, Error, Identity, Result,
};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::bundle::{BundleInfo, CredentialBundler};
use crate::ca::{CertificateAuthorityClient, CertificateSigningApi};
use crate::certificate::inspect_certificate;
use crate::config::KubecredConfig;
use crate::keygen::{IdentityMaterial, KeyMaterialGenerator};
use crate::rbac::{default_developer_rules, AuthorizationBindingManager, AuthorizationStore};
use crate::report::DeletionReport;
use crate::store::{IdentityRecord, IdentityStore};

const STEP_VALIDATE: &str = "校验参数";
const STEP_KEYGEN: &str = "生成密钥";
const STEP_SUBMIT: &str = "提交 CSR";
const STEP_APPROVE: &str = "批准 CSR";
const STEP_WAIT: &str = "等待证书签发";
const STEP_VERIFY: &str = "校验证书主题";
const STEP_PERSIST: &str = "保存身份文件";
const STEP_BUNDLE: &str = "生成连接文件";
const STEP_BIND_CLUSTER: &str = "绑定 ClusterRole";
const STEP_BIND_NAMESPACE: &str = "绑定 Role";

/// 创建身份的参数
///
/// 角色名为空表示不授予对应权限；`role` 非空时必须给出 `namespace`。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateIdentityRequest {
    pub username: String,
    pub groups: Vec<String>,
    pub namespace: String,
    pub cluster_role: String,
    pub role: String,
    /// 证书有效期（天），未指定时使用配置中的默认值
    pub expiration_days: Option<u32>,
}

impl CreateIdentityRequest {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }
}

/// 创建成功的身份
#[derive(Debug, Clone)]
pub struct CreatedIdentity {
    pub identity: Identity,
    /// 连接文件信息
    pub bundle: BundleInfo,
    /// 已确保存在的绑定，形如 `cluster/alice-view-binding`
    pub bindings: Vec<String>,
    /// 非致命提示
    pub warnings: Vec<String>,
}

/// 身份生命周期控制器
pub struct IdentityLifecycleController {
    keygen: KeyMaterialGenerator,
    ca: CertificateAuthorityClient,
    bundler: CredentialBundler,
    bindings: AuthorizationBindingManager,
    store: IdentityStore,
    default_expiration_days: u32,
}

impl IdentityLifecycleController {
    /// 以签发服务与授权存储创建控制器
    pub fn new(
        ca_api: Arc<dyn CertificateSigningApi>,
        authorization: Arc<dyn AuthorizationStore>,
        config: &KubecredConfig,
    ) -> Self {
        Self {
            keygen: KeyMaterialGenerator::default(),
            ca: CertificateAuthorityClient::new(ca_api, config.signer_name.clone(), config.poll_policy()),
            bundler: CredentialBundler::new(config.kubeconfig.clone()),
            bindings: AuthorizationBindingManager::new(authorization),
            store: IdentityStore::new(config.output_dir.clone()),
            default_expiration_days: config.default_expiration_days,
        }
    }

    /// 本地身份目录
    pub fn store(&self) -> &IdentityStore {
        &self.store
    }

    /// 创建身份
    ///
    /// 依次执行：校验 → 生成密钥 → 提交、批准 CSR → 等待证书 → 保存文件 →
    /// 生成连接文件 → 绑定 ClusterRole → 绑定 Role。提交之后无论成败都会删除
    /// 临时签名请求。任何一步失败都立即返回，错误中带有步骤名称。
    pub async fn create_identity(&self, request: CreateIdentityRequest) -> Result<CreatedIdentity> {
        let (groups, lifetime_days, lifetime_seconds) = self.validate(&request).step(STEP_VALIDATE)?;
        let username = request.username.as_str();

        let mut warnings = Vec::new();
        if request.cluster_role.is_empty() && request.role.is_empty() {
            let message = format!("未指定 --cluster-role 或 --role，用户 {} 将没有任何权限", username);
            warn!("{}", message);
            warnings.push(message);
        }

        info!("[1/6] 为用户 {} 生成 RSA 私钥与 CSR", username);
        let material = self.generate_material(username, &groups).await.step(STEP_KEYGEN)?;

        let csr_name = signing_request_name(username);
        let result = self
            .issue_and_provision(&request, &groups, lifetime_days, lifetime_seconds, &csr_name, material)
            .await;
        self.ca.cleanup(&csr_name).await;

        match result {
            Ok((identity, bundle, bindings)) => {
                info!("用户 {} 创建完成", username);
                Ok(CreatedIdentity {
                    identity,
                    bundle,
                    bindings,
                    warnings,
                })
            }
            Err(e) => {
                error!("创建用户 {} 失败: {}", username, e);
                Err(e)
            }
        }
    }

    fn validate(&self, request: &CreateIdentityRequest) -> Result<(Vec<String>, u32, i32)> {
        validate_username(&request.username)?;
        if !request.role.is_empty() && request.namespace.is_empty() {
            return Err(Error::Validation(format!(
                "绑定 Role {} 需要同时指定命名空间",
                request.role
            )));
        }
        let groups = normalize_groups(request.groups.iter().cloned())?;
        let days = request.expiration_days.unwrap_or(self.default_expiration_days);
        let seconds = expiration_seconds(days)?;
        Ok((groups, days, seconds))
    }

    async fn generate_material(&self, username: &str, groups: &[String]) -> Result<IdentityMaterial> {
        let keygen = self.keygen.clone();
        let username = username.to_string();
        let groups = groups.to_vec();
        tokio::task::spawn_blocking(move || keygen.generate(&username, &groups))
            .await
            .map_err(|e| Error::KeyGeneration(format!("密钥生成任务异常退出: {}", e)))?
    }

    async fn issue_and_provision(
        &self,
        request: &CreateIdentityRequest,
        groups: &[String],
        lifetime_days: u32,
        lifetime_seconds: i32,
        csr_name: &str,
        material: IdentityMaterial,
    ) -> Result<(Identity, BundleInfo, Vec<String>)> {
        let username = request.username.as_str();

        info!("[2/6] 提交并批准签名请求 {}", csr_name);
        self.ca
            .submit(csr_name, material.csr_pem.as_bytes(), lifetime_seconds)
            .await
            .step(STEP_SUBMIT)?;
        self.ca.approve(csr_name).await.step(STEP_APPROVE)?;

        info!("[3/6] 等待证书签发");
        let certificate = self.ca.wait_for_certificate(csr_name).await.step(STEP_WAIT)?;

        let subject = inspect_certificate(&certificate).step(STEP_VERIFY)?;
        if !subject.matches(username, groups) {
            return Err(Error::step(
                STEP_VERIFY,
                Error::Certificate(format!(
                    "证书主题与请求不符: CN={:?} O={:?}",
                    subject.common_name, subject.organizations
                )),
            ));
        }

        info!("[4/6] 保存私钥与证书到 {:?}", self.store.identity_dir(username));
        self.persist(username, &material, &certificate).step(STEP_PERSIST)?;

        info!("[5/6] 生成连接文件");
        let bundle = self
            .bundler
            .build_bundle(
                username,
                material.private_key_pem.as_bytes(),
                &certificate,
                &self.store.bundle_path(username),
            )
            .step(STEP_BUNDLE)?;

        info!("[6/6] 创建 RBAC 绑定");
        let mut bindings = Vec::new();
        let cluster = self
            .bindings
            .bind_cluster_role(username, groups, &request.cluster_role)
            .await
            .map_err(|e| partial_state(username, STEP_BIND_CLUSTER, e))?;
        let namespaced = self
            .bindings
            .bind_namespace_role(username, groups, &request.role, &request.namespace)
            .await
            .map_err(|e| partial_state(username, STEP_BIND_NAMESPACE, e))?;
        for binding in cluster.into_iter().chain(namespaced) {
            bindings.push(format!("{}/{}", binding.scope, binding.name));
        }

        let identity = self.store.identity(username, groups, lifetime_days);
        Ok((identity, bundle, bindings))
    }

    fn persist(&self, username: &str, material: &IdentityMaterial, certificate: &[u8]) -> Result<()> {
        self.store.ensure_dir(username)?;
        self.store.write_key(username, material.private_key_pem.as_bytes())?;
        self.store.write_csr(username, material.csr_pem.as_bytes())?;
        self.store.write_certificate(username, certificate)?;
        Ok(())
    }

    /// 删除身份
    ///
    /// 尽力删除按前缀匹配的绑定、残留的签名请求与本地目录。单个步骤失败只
    /// 记录到报告中，不会中断其余步骤。
    pub async fn delete_identity(&self, username: &str) -> DeletionReport {
        let mut report = DeletionReport::default();
        if let Err(e) = validate_username(username) {
            report.record_skipped("校验用户名", &e);
            return report;
        }

        info!("删除用户 {} 的 RBAC 绑定", username);
        self.bindings.delete_identity_bindings(username, &mut report).await;

        let csr_name = signing_request_name(username);
        match self.ca.delete_request(&csr_name).await {
            Ok(()) => report.record_removed(format!("CertificateSigningRequest/{}", csr_name)),
            Err(e) => report.record_skipped(format!("删除 CertificateSigningRequest/{}", csr_name), &e),
        }

        let dir = self.store.identity_dir(username);
        match self.store.remove(username) {
            Ok(true) => report.record_removed(dir.display().to_string()),
            Ok(false) => report.record_skipped(
                format!("删除目录 {}", dir.display()),
                &Error::NotFound(dir.display().to_string()),
            ),
            Err(e) => report.record_skipped(format!("删除目录 {}", dir.display()), &e),
        }

        info!(
            "用户 {} 已删除（删除 {} 项，跳过 {} 项）",
            username,
            report.removed.len(),
            report.skipped.len()
        );
        report
    }

    /// 列出本地身份
    pub fn list_identities(&self) -> Result<Vec<IdentityRecord>> {
        self.store.list()
    }

    /// 创建带默认开发者权限的命名空间级 Role，已存在视为成功
    pub async fn create_role(&self, name: &str, namespace: &str) -> Result<bool> {
        self.bindings
            .create_namespace_role(name, namespace, default_developer_rules())
            .await
    }
}

fn partial_state(username: &str, step: &'static str, err: Error) -> Error {
    warn!(
        "用户 {} 的证书与连接文件已生成但绑定未完成，可重新执行创建或删除该用户",
        username
    );
    Error::step(step, err)
}

/// 生成创建成功后的使用说明
pub fn usage_instructions(created: &CreatedIdentity) -> String {
    let bundle = created.bundle.path.display();
    let mut text = String::new();

    let _ = writeln!(text, "========================================");
    let _ = writeln!(text, "使用说明");
    let _ = writeln!(text, "========================================");
    let _ = writeln!(text, "方式一：直接指定连接文件");
    let _ = writeln!(text, "  kubectl --kubeconfig={} get pods", bundle);
    let _ = writeln!(text);
    let _ = writeln!(text, "方式二：导出 KUBECONFIG");
    let _ = writeln!(text, "  export KUBECONFIG={}", bundle);
    let _ = writeln!(text, "  kubectl get pods");
    let _ = writeln!(text);
    let _ = writeln!(text, "方式三：合并到现有 kubeconfig");
    let _ = writeln!(
        text,
        "  KUBECONFIG=~/.kube/config:{} kubectl config view --flatten > ~/.kube/config-merged",
        bundle
    );
    let _ = writeln!(text, "  mv ~/.kube/config-merged ~/.kube/config");
    let _ = writeln!(text, "  kubectl config use-context {}", created.bundle.context_name);
    let _ = writeln!(text);
    let _ = writeln!(text, "检查权限：");
    let _ = writeln!(text, "  kubectl auth can-i get pods");
    let _ = writeln!(text, "  kubectl auth can-i --list");
    for warning in &created.warnings {
        let _ = writeln!(text, "注意：{}", warning);
    }
    let _ = write!(text, "========================================");
    text
}
