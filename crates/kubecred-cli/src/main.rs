//! Kubecred CLI
//!
//! 为 Kubernetes 集群签发基于 X.509 客户端证书的用户身份，并为其生成独立的
//! kubeconfig 连接文件与 RBAC 绑定。

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kubecred_common::Error;
use kubecred_controller::store::IdentityStore;
use kubecred_controller::{connect, usage_instructions, ConfigManager, CreateIdentityRequest, KubecredConfig};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "kubecred", version, about = "Kubernetes 证书用户身份管理工具")]
struct Cli {
    /// 配置文件（YAML 或 JSON）
    #[arg(long, global = true, env = "KUBECRED_CONFIG")]
    config: Option<PathBuf>,

    /// 参考（管理员）kubeconfig
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// 身份目录根路径
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 创建用户身份
    Create {
        /// 用户名（证书 CN）
        username: String,
        /// 用户组（证书 O），可重复指定
        #[arg(short = 'g', long = "group")]
        groups: Vec<String>,
        /// Role 绑定所在的命名空间
        #[arg(short = 'n', long, default_value = "")]
        namespace: String,
        /// 绑定的 ClusterRole
        #[arg(long, default_value = "")]
        cluster_role: String,
        /// 绑定的命名空间级 Role
        #[arg(long, default_value = "")]
        role: String,
        /// 证书有效期（天）
        #[arg(long)]
        expiration: Option<u32>,
    },
    /// 删除用户身份及其绑定
    Delete {
        /// 用户名
        username: String,
    },
    /// 列出已创建的用户身份
    List,
    /// 创建带开发者常用权限的 Role
    CreateRole {
        /// Role 名称
        name: String,
        /// 命名空间
        #[arg(short = 'n', long, default_value = "default")]
        namespace: String,
    },
}

impl Cli {
    /// 加载配置并应用命令行覆盖
    fn load_config(&self) -> Result<KubecredConfig> {
        let mut config = ConfigManager::load(self.config.as_deref())
            .context("加载配置失败")?
            .into_config();

        if let Some(kubeconfig) = &self.kubeconfig {
            config.kubeconfig = kubeconfig.clone();
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        Ok(config)
    }
}

/// 针对创建失败给出处理建议
fn creation_hint(err: &Error) -> Option<&'static str> {
    if err.is_certificate_timeout() {
        return Some("集群未在时限内签发证书，请确认签发者可用，或调大 certificate_timeout_secs");
    }
    match err {
        Error::Step { step, .. } if step.starts_with("绑定") => {
            Some("证书与连接文件已生成但绑定未完成，可重新执行 create 或执行 delete 清理")
        }
        _ => None,
    }
}

fn init_tracing(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    init_tracing(&config.log_level);
    debug!("生效配置: {:?}", config);

    match cli.command {
        Commands::Create {
            username,
            groups,
            namespace,
            cluster_role,
            role,
            expiration,
        } => {
            let controller = connect(&config).await?;
            let request = CreateIdentityRequest {
                username,
                groups,
                namespace,
                cluster_role,
                role,
                expiration_days: expiration,
            };

            let created = match controller.create_identity(request).await {
                Ok(created) => created,
                Err(e) => {
                    if let Some(hint) = creation_hint(&e) {
                        eprintln!("提示: {}", hint);
                    }
                    return Err(anyhow::Error::new(e).context("创建用户失败"));
                }
            };

            println!("用户 {} 创建成功", created.identity.username);
            println!("  连接文件: {}", created.bundle.path.display());
            println!("  上下文:   {}", created.bundle.context_name);
            for binding in &created.bindings {
                println!("  绑定:     {}", binding);
            }
            println!();
            println!("{}", usage_instructions(&created));
        }
        Commands::Delete { username } => {
            let controller = connect(&config).await?;
            let report = controller.delete_identity(&username).await;

            for removed in &report.removed {
                println!("  已删除: {}", removed);
            }
            for skipped in report.failures() {
                println!("  未完成: {}", skipped);
            }
            println!("用户 {} 删除完成", username);
        }
        Commands::List => {
            let records = IdentityStore::new(&config.output_dir).list()?;
            if records.is_empty() {
                println!("{} 中没有用户身份", config.output_dir.display());
                return Ok(());
            }

            println!("{:<24} {:<32} {}", "USERNAME", "GROUPS", "KUBECONFIG");
            for record in records {
                let groups = match record.groups {
                    Some(groups) if !groups.is_empty() => groups.join(","),
                    _ => "-".to_string(),
                };
                println!("{:<24} {:<32} {}", record.username, groups, record.bundle_path.display());
            }
        }
        Commands::CreateRole { name, namespace } => {
            let controller = connect(&config).await?;
            if controller.create_role(&name, &namespace).await? {
                println!("已在命名空间 {} 中创建 Role {}", namespace, name);
            } else {
                println!("Role {} 已存在于命名空间 {}", name, namespace);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create() {
        let cli = Cli::parse_from([
            "kubecred",
            "create",
            "alice",
            "-g",
            "dev",
            "--group",
            "ops",
            "-n",
            "team-a",
            "--role",
            "developer",
            "--expiration",
            "30",
        ]);

        match cli.command {
            Commands::Create {
                username,
                groups,
                namespace,
                cluster_role,
                role,
                expiration,
            } => {
                assert_eq!(username, "alice");
                assert_eq!(groups, vec!["dev", "ops"]);
                assert_eq!(namespace, "team-a");
                assert!(cluster_role.is_empty());
                assert_eq!(role, "developer");
                assert_eq!(expiration, Some(30));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_create_role_default_namespace() {
        let cli = Cli::parse_from(["kubecred", "--output-dir", "/tmp/users", "create-role", "developer"]);
        assert_eq!(cli.output_dir, Some(PathBuf::from("/tmp/users")));
        assert!(matches!(cli.command, Commands::CreateRole { ref namespace, .. } if namespace == "default"));
    }

    #[test]
    fn test_creation_hint() {
        let timeout = Error::step(
            "等待证书签发",
            Error::CertificateTimeout {
                name: "alice-csr".to_string(),
                timeout: std::time::Duration::from_secs(30),
            },
        );
        assert!(creation_hint(&timeout).is_some());

        let binding = Error::step("绑定 ClusterRole", Error::Api("forbidden".to_string()));
        assert!(creation_hint(&binding).is_some());

        assert!(creation_hint(&Error::Validation("bad".to_string())).is_none());
    }

    #[test]
    fn test_create_requires_username() {
        assert!(Cli::try_parse_from(["kubecred", "create"]).is_err());
    }
}
