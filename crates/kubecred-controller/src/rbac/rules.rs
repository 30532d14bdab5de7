//! 默认角色规则

use k8s_openapi::api::rbac::v1::PolicyRule;

const READ_WRITE_VERBS: [&str; 7] = ["get", "list", "watch", "create", "update", "patch", "delete"];

fn rule(api_groups: &[&str], resources: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(api_groups.iter().map(|s| s.to_string()).collect()),
        resources: Some(resources.iter().map(|s| s.to_string()).collect()),
        verbs: READ_WRITE_VERBS.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

/// 开发者常用权限：工作负载、服务、配置、任务、存储声明、入口与网络策略、HPA
pub fn default_developer_rules() -> Vec<PolicyRule> {
    vec![
        rule(
            &["", "apps", "extensions", "batch"],
            &[
                "pods",
                "pods/log",
                "pods/exec",
                "deployments",
                "replicasets",
                "statefulsets",
                "daemonsets",
                "services",
                "endpoints",
                "configmaps",
                "secrets",
                "jobs",
                "cronjobs",
                "persistentvolumeclaims",
            ],
        ),
        rule(&["networking.k8s.io"], &["ingresses", "networkpolicies"]),
        rule(&["autoscaling"], &["horizontalpodautoscalers"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_developer_rules() {
        let rules = default_developer_rules();
        assert_eq!(rules.len(), 3);

        let core = &rules[0];
        assert!(core.api_groups.as_ref().unwrap().contains(&String::new()));
        assert!(core.resources.as_ref().unwrap().contains(&"pods/exec".to_string()));
        assert!(rules.iter().all(|r| r.verbs.len() == 7));
    }
}
