//! 本地身份目录
//!
//! 每个用户一个子目录：`{root}/{username}/{username}.{key,csr,crt,bundle}`。
//! 目录本身就是身份记录，列出身份时用户组从已签发证书的 O 字段解析，
//! 证书是唯一可信来源，不另存元数据。目录没有文件锁，调用方需保证串行使用。

use kubecred_common::{Identity, Result};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::certificate::inspect_certificate;
use crate::utils::{create_dir_with_mode, write_file_atomic, MODE_DIR, MODE_PRIVATE, MODE_PUBLIC};

/// 列表中的一条身份记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityRecord {
    /// 用户名
    pub username: String,
    /// 连接文件路径
    pub bundle_path: PathBuf,
    /// 证书中的用户组，证书缺失或无法解析时为 `None`
    pub groups: Option<Vec<String>>,
}

/// 本地身份目录
pub struct IdentityStore {
    root: PathBuf,
}

impl IdentityStore {
    /// 以给定根目录创建身份目录
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn identity_dir(&self, username: &str) -> PathBuf {
        self.root.join(username)
    }

    pub fn key_path(&self, username: &str) -> PathBuf {
        self.file_path(username, "key")
    }

    pub fn csr_path(&self, username: &str) -> PathBuf {
        self.file_path(username, "csr")
    }

    pub fn certificate_path(&self, username: &str) -> PathBuf {
        self.file_path(username, "crt")
    }

    pub fn bundle_path(&self, username: &str) -> PathBuf {
        self.file_path(username, "bundle")
    }

    fn file_path(&self, username: &str, extension: &str) -> PathBuf {
        self.identity_dir(username).join(format!("{}.{}", username, extension))
    }

    /// 组装身份描述
    pub fn identity(&self, username: &str, groups: &[String], lifetime_days: u32) -> Identity {
        Identity {
            username: username.to_string(),
            groups: groups.to_vec(),
            certificate_lifetime_days: lifetime_days,
            key_path: self.key_path(username),
            csr_path: self.csr_path(username),
            certificate_path: self.certificate_path(username),
            bundle_path: self.bundle_path(username),
        }
    }

    /// 身份目录是否存在
    pub fn exists(&self, username: &str) -> bool {
        self.identity_dir(username).is_dir()
    }

    /// 创建身份目录（0750）
    pub fn ensure_dir(&self, username: &str) -> Result<PathBuf> {
        let dir = self.identity_dir(username);
        create_dir_with_mode(&dir, MODE_DIR)?;
        Ok(dir)
    }

    /// 写入私钥（0600）
    pub fn write_key(&self, username: &str, pem: &[u8]) -> Result<PathBuf> {
        let path = self.key_path(username);
        write_file_atomic(&path, pem, MODE_PRIVATE)?;
        Ok(path)
    }

    /// 写入 CSR（0644）
    pub fn write_csr(&self, username: &str, pem: &[u8]) -> Result<PathBuf> {
        let path = self.csr_path(username);
        write_file_atomic(&path, pem, MODE_PUBLIC)?;
        Ok(path)
    }

    /// 写入证书（0644）
    pub fn write_certificate(&self, username: &str, pem: &[u8]) -> Result<PathBuf> {
        let path = self.certificate_path(username);
        write_file_atomic(&path, pem, MODE_PUBLIC)?;
        Ok(path)
    }

    /// 列出所有含连接文件的身份，按用户名排序
    ///
    /// 根目录不存在时返回空列表。
    pub fn list(&self) -> Result<Vec<IdentityRecord>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("身份目录 {:?} 不存在", self.root);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(username) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };

            let bundle_path = self.bundle_path(&username);
            if !bundle_path.is_file() {
                continue;
            }

            records.push(IdentityRecord {
                groups: self.certificate_groups(&username),
                username,
                bundle_path,
            });
        }

        records.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(records)
    }

    fn certificate_groups(&self, username: &str) -> Option<Vec<String>> {
        let path = self.certificate_path(username);
        let pem = fs::read(&path).ok()?;
        match inspect_certificate(&pem) {
            Ok(subject) => Some(subject.organizations),
            Err(e) => {
                warn!("无法解析证书 {:?}: {}", path, e);
                None
            }
        }
    }

    /// 删除身份目录，返回是否确实删除了内容
    pub fn remove(&self, username: &str) -> Result<bool> {
        let dir = self.identity_dir(username);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!("已删除身份目录 {:?}", dir);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
