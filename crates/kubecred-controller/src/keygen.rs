//! 密钥材料生成模块
//!
//! 为用户生成 RSA 私钥与证书签名请求（CSR）。CSR 的 Subject 中 CN 为用户名，
//! 每个用户组各占一个 O 属性，Kubernetes 以此识别用户与其所属组。

use kubecred_common::{Error, Result};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs1v15::{Signature, SigningKey};
use rsa::pkcs8::LineEnding;
use rsa::RsaPrivateKey;
use sha2::Sha256;
use std::str::FromStr;
use tracing::debug;
use x509_cert::builder::{Builder, RequestBuilder};
use x509_cert::der::EncodePem;
use x509_cert::name::Name;

/// 最小 RSA 密钥长度
pub const MIN_RSA_KEY_BITS: usize = 2048;

/// 私钥与 CSR（均为 PEM 编码）
#[derive(Clone)]
pub struct IdentityMaterial {
    /// PKCS#1 私钥（`RSA PRIVATE KEY`）
    pub private_key_pem: String,
    /// CSR（`CERTIFICATE REQUEST`）
    pub csr_pem: String,
}

impl std::fmt::Debug for IdentityMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityMaterial")
            .field("private_key_pem", &"<redacted>")
            .field("csr_pem", &self.csr_pem)
            .finish()
    }
}

/// 密钥材料生成器
#[derive(Debug, Clone)]
pub struct KeyMaterialGenerator {
    /// RSA 密钥长度
    key_bits: usize,
}

impl Default for KeyMaterialGenerator {
    fn default() -> Self {
        Self {
            key_bits: MIN_RSA_KEY_BITS,
        }
    }
}

impl KeyMaterialGenerator {
    /// 创建指定密钥长度的生成器，长度不得低于 2048
    pub fn new(key_bits: usize) -> Result<Self> {
        if key_bits < MIN_RSA_KEY_BITS {
            return Err(Error::KeyGeneration(format!(
                "RSA 密钥长度过短: {}（最少 {}）",
                key_bits, MIN_RSA_KEY_BITS
            )));
        }
        Ok(Self { key_bits })
    }

    /// 生成私钥与 CSR
    ///
    /// `groups` 可以为空，此时 CSR 只包含 CN。
    pub fn generate(&self, username: &str, groups: &[String]) -> Result<IdentityMaterial> {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, self.key_bits)
            .map_err(|e| Error::KeyGeneration(format!("生成 RSA 私钥失败: {}", e)))?;

        let private_key_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| Error::KeyGeneration(format!("私钥 PEM 编码失败: {}", e)))?
            .to_string();

        let subject = subject_name(username, groups)?;
        let signer = SigningKey::<Sha256>::new(private_key);
        let request = RequestBuilder::new(subject, &signer)
            .map_err(|e| Error::KeyGeneration(format!("构建 CSR 失败: {}", e)))?
            .build::<Signature>()
            .map_err(|e| Error::KeyGeneration(format!("签名 CSR 失败: {}", e)))?;

        let csr_pem = request
            .to_pem(LineEnding::LF)
            .map_err(|e| Error::KeyGeneration(format!("CSR PEM 编码失败: {}", e)))?;

        debug!("已为用户 {} 生成 {} 位 RSA 私钥与 CSR", username, self.key_bits);

        Ok(IdentityMaterial {
            private_key_pem,
            csr_pem,
        })
    }
}

/// 构造 Subject：`CN=<username>`，每个用户组一个 `O=<group>`
fn subject_name(username: &str, groups: &[String]) -> Result<Name> {
    let mut subject = format!("CN={}", username);
    for group in groups {
        subject.push_str(",O=");
        subject.push_str(group);
    }

    Name::from_str(&subject).map_err(|e| Error::KeyGeneration(format!("无效的证书主题 {}: {}", subject, e)))
}
