//! 控制平面工具函数
//!
//! 该模块封装了控制平面常用的工具函数：kube 错误归类、带权限位的原子文件写入
//! 以及持续时间格式化。

use kubecred_common::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// 仅属主可读写
pub const MODE_PRIVATE: u32 = 0o600;

/// 属主读写，其他人只读
pub const MODE_PUBLIC: u32 = 0o644;

/// 身份目录权限
pub const MODE_DIR: u32 = 0o750;

/// 将 kube 客户端错误归类为统一错误类型
///
/// 409/AlreadyExists 与 404 需要单独识别，调用方据此实现幂等创建与尽力删除。
pub fn kube_error(err: kube::Error, object: &str) -> Error {
    match err {
        kube::Error::Api(resp) if resp.code == 409 || resp.reason == "AlreadyExists" => {
            Error::AlreadyExists(format!("{}: {}", object, resp.message))
        }
        kube::Error::Api(resp) if resp.code == 404 => {
            Error::NotFound(format!("{}: {}", object, resp.message))
        }
        other => Error::Api(format!("{}: {}", object, other)),
    }
}

/// 以指定权限位写入文件
///
/// 先写入同目录下的临时文件再重命名，读者不会看到写了一半的内容。
pub fn write_file_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("无效的文件路径: {:?}", path))))?;
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    {
        let mut file = open_with_mode(&tmp_path, mode)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    set_mode(&tmp_path, mode)?;
    fs::rename(&tmp_path, path)?;

    debug!("写入文件 {:?}（{} 字节，权限 {:o}）", path, contents.len(), mode);
    Ok(())
}

/// 创建目录（含父目录）并设置权限位
pub fn create_dir_with_mode(path: &Path, mode: u32) -> Result<()> {
    fs::create_dir_all(path)?;
    set_mode(path, mode)
}

#[cfg(unix)]
fn open_with_mode(path: &Path, mode: u32) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
}

#[cfg(not(unix))]
fn open_with_mode(path: &Path, _mode: u32) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create(true).truncate(true).open(path)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// 格式化持续时间为人类可读的字符串
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();

    if seconds == 0 {
        return format!("{} 毫秒", duration.as_millis());
    }
    if seconds < 60 {
        return format!("{} 秒", seconds);
    }

    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{} 分钟 {} 秒", minutes, seconds % 60);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{} 小时 {} 分钟", hours, minutes % 60);
    }

    let days = hours / 24;
    format!("{} 天 {} 小时", days, hours % 24)
}
