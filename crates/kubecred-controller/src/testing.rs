//! 测试用内存实现
//!
//! `FakeCertificateAuthority` 用一次性的 P-256 CA 对 CSR 直接签发证书，
//! `FakeAuthorizationStore` 在内存中保存 RBAC 对象，按名称创建与删除。

use async_trait::async_trait;
use k8s_openapi::api::certificates::v1::{CertificateSigningRequest, CertificateSigningRequestStatus};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::ByteString;
use kube::ResourceExt;
use kubecred_common::{Error, Result};
use p256::ecdsa::{DerSignature, SigningKey};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::der::pem::LineEnding;
use x509_cert::der::{DecodePem, EncodePem};
use x509_cert::name::Name;
use x509_cert::request::CertReq;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Validity;

use crate::ca::CertificateSigningApi;
use crate::rbac::AuthorizationStore;

/// 内存签发服务
pub struct FakeCertificateAuthority {
    requests: Mutex<BTreeMap<String, CertificateSigningRequest>>,
    deleted: Mutex<Vec<String>>,
    issue_on_approval: bool,
    forced_subject: Option<Name>,
    ca_key: SigningKey,
    ca_name: Name,
    serial: AtomicU32,
}

impl FakeCertificateAuthority {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(BTreeMap::new()),
            deleted: Mutex::new(Vec::new()),
            issue_on_approval: true,
            forced_subject: None,
            ca_key: SigningKey::random(&mut rand::rngs::OsRng),
            ca_name: Name::from_str("CN=kubecred-test-ca").expect("CA 名称"),
            serial: AtomicU32::new(1),
        }
    }

    /// 批准后永不签发，用于超时场景
    pub fn without_issuing(mut self) -> Self {
        self.issue_on_approval = false;
        self
    }

    /// 忽略 CSR 中的主题，以指定主题签发
    pub fn with_forced_subject(mut self, subject: &str) -> Self {
        self.forced_subject = Some(Name::from_str(subject).expect("主题"));
        self
    }

    pub fn request(&self, name: &str) -> Option<CertificateSigningRequest> {
        self.requests.lock().unwrap().get(name).cloned()
    }

    pub fn request_names(&self) -> Vec<String> {
        self.requests.lock().unwrap().keys().cloned().collect()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    /// 预置一个残留的签名请求
    pub fn insert_request(&self, name: &str) {
        let mut request = CertificateSigningRequest::default();
        request.metadata.name = Some(name.to_string());
        self.requests.lock().unwrap().insert(name.to_string(), request);
    }

    fn sign(&self, csr_pem: &[u8]) -> Vec<u8> {
        let csr = CertReq::from_pem(csr_pem).expect("CSR 解析");
        let subject = self.forced_subject.clone().unwrap_or_else(|| csr.info.subject.clone());
        let profile = Profile::Leaf {
            issuer: self.ca_name.clone(),
            enable_key_agreement: false,
            enable_key_encipherment: false,
        };
        let serial = SerialNumber::from(self.serial.fetch_add(1, Ordering::SeqCst));
        let validity = Validity::from_now(Duration::from_secs(3600)).expect("有效期");

        let certificate = CertificateBuilder::new(profile, serial, validity, subject, csr.info.public_key.clone(), &self.ca_key)
            .expect("证书构建")
            .build::<DerSignature>()
            .expect("证书签名");

        certificate.to_pem(LineEnding::LF).expect("证书 PEM").into_bytes()
    }
}

#[async_trait]
impl CertificateSigningApi for FakeCertificateAuthority {
    async fn create(&self, request: &CertificateSigningRequest) -> Result<()> {
        let name = request.name_any();
        let mut requests = self.requests.lock().unwrap();
        if requests.contains_key(&name) {
            return Err(Error::AlreadyExists(name));
        }
        requests.insert(name, request.clone());
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<CertificateSigningRequest> {
        self.request(name).ok_or_else(|| Error::NotFound(name.to_string()))
    }

    async fn replace_approval(&self, name: &str, request: &CertificateSigningRequest) -> Result<()> {
        let mut stored = self.get(name).await?;
        let conditions = request.status.as_ref().and_then(|s| s.conditions.clone());
        let approved = conditions
            .iter()
            .flatten()
            .any(|c| c.type_ == "Approved" && c.status == "True");

        let mut status = CertificateSigningRequestStatus {
            conditions,
            ..Default::default()
        };
        if approved && self.issue_on_approval {
            status.certificate = Some(ByteString(self.sign(&stored.spec.request.0)));
        }
        stored.status = Some(status);

        self.requests.lock().unwrap().insert(name.to_string(), stored);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        match self.requests.lock().unwrap().remove(name) {
            Some(_) => {
                self.deleted.lock().unwrap().push(name.to_string());
                Ok(())
            }
            None => Err(Error::NotFound(name.to_string())),
        }
    }
}

/// 内存 RBAC 存储
#[derive(Default)]
pub struct FakeAuthorizationStore {
    cluster_role_bindings: Mutex<BTreeMap<String, ClusterRoleBinding>>,
    role_bindings: Mutex<BTreeMap<(String, String), RoleBinding>>,
    roles: Mutex<BTreeMap<(String, String), Role>>,
    namespaces: Vec<String>,
}

impl FakeAuthorizationStore {
    pub fn new() -> Self {
        Self::default().with_namespaces(&["default"])
    }

    pub fn with_namespaces(mut self, namespaces: &[&str]) -> Self {
        for ns in namespaces {
            if !self.namespaces.iter().any(|n| n == ns) {
                self.namespaces.push(ns.to_string());
            }
        }
        self
    }

    pub fn cluster_role_binding(&self, name: &str) -> Option<ClusterRoleBinding> {
        self.cluster_role_bindings.lock().unwrap().get(name).cloned()
    }

    pub fn cluster_role_binding_names(&self) -> Vec<String> {
        self.cluster_role_bindings.lock().unwrap().keys().cloned().collect()
    }

    pub fn role_binding(&self, namespace: &str, name: &str) -> Option<RoleBinding> {
        self.role_bindings
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn role_binding_names(&self, namespace: &str) -> Vec<String> {
        self.role_bindings
            .lock()
            .unwrap()
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn role(&self, namespace: &str, name: &str) -> Option<Role> {
        self.roles
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    fn check_namespace(&self, namespace: &str) -> Result<()> {
        if self.namespaces.iter().any(|n| n == namespace) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("namespace {}", namespace)))
        }
    }
}

#[async_trait]
impl AuthorizationStore for FakeAuthorizationStore {
    async fn create_cluster_role_binding(&self, binding: &ClusterRoleBinding) -> Result<()> {
        let name = binding.name_any();
        let mut bindings = self.cluster_role_bindings.lock().unwrap();
        if bindings.contains_key(&name) {
            return Err(Error::AlreadyExists(name));
        }
        bindings.insert(name, binding.clone());
        Ok(())
    }

    async fn delete_cluster_role_binding(&self, name: &str) -> Result<()> {
        self.cluster_role_bindings
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    async fn list_cluster_role_bindings(&self) -> Result<Vec<ClusterRoleBinding>> {
        Ok(self.cluster_role_bindings.lock().unwrap().values().cloned().collect())
    }

    async fn create_role_binding(&self, namespace: &str, binding: &RoleBinding) -> Result<()> {
        self.check_namespace(namespace)?;
        let key = (namespace.to_string(), binding.name_any());
        let mut bindings = self.role_bindings.lock().unwrap();
        if bindings.contains_key(&key) {
            return Err(Error::AlreadyExists(key.1));
        }
        bindings.insert(key, binding.clone());
        Ok(())
    }

    async fn delete_role_binding(&self, namespace: &str, name: &str) -> Result<()> {
        self.role_bindings
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("{}/{}", namespace, name)))
    }

    async fn list_role_bindings(&self, namespace: &str) -> Result<Vec<RoleBinding>> {
        self.check_namespace(namespace)?;
        Ok(self
            .role_bindings
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, b)| b.clone())
            .collect())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        Ok(self.namespaces.clone())
    }

    async fn create_role(&self, namespace: &str, role: &Role) -> Result<()> {
        self.check_namespace(namespace)?;
        let key = (namespace.to_string(), role.name_any());
        let mut roles = self.roles.lock().unwrap();
        if roles.contains_key(&key) {
            return Err(Error::AlreadyExists(key.1));
        }
        roles.insert(key, role.clone());
        Ok(())
    }
}

/// 参考 kubeconfig 中集群的名称
pub const REFERENCE_CLUSTER: &str = "k8s-lab";

/// 写入一份包含两个集群的参考 kubeconfig
pub fn write_reference_kubeconfig(dir: &Path) -> PathBuf {
    let path = dir.join("admin.kubeconfig");
    let content = format!(
        r#"apiVersion: v1
kind: Config
preferences: {{}}
clusters:
- name: {cluster}
  cluster:
    server: https://10.0.0.10:6443
    certificate-authority-data: LS0tLS1CRUdJTiBDRVJUSUZJQ0FURS0tLS0tCg==
- name: staging
  cluster:
    server: https://staging:6443
users:
- name: kubernetes-admin
  user:
    client-certificate-data: QURNSU4tQ0VSVA==
    client-key-data: QURNSU4tS0VZ
contexts:
- name: kubernetes-admin@{cluster}
  context:
    cluster: {cluster}
    user: kubernetes-admin
- name: admin@staging
  context:
    cluster: staging
    user: kubernetes-admin
current-context: kubernetes-admin@{cluster}
"#,
        cluster = REFERENCE_CLUSTER
    );
    std::fs::write(&path, content).expect("写入参考 kubeconfig");
    path
}
