use crate::state::{ClusterState, PolicyRule, Subject};

/// Groups that bypass rule evaluation entirely.
const SUPERUSER_GROUPS: &[&str] = &["system:masters"];

#[derive(Clone, Default)]
pub struct AccessRequest {
    pub user: String,
    pub groups: Vec<String>,
    /// "<namespace>:<name>" when the requester is a ServiceAccount.
    pub service_account: String,
    pub verb: String,
    /// Plural resource, possibly with a subresource ("pods/log").
    pub resource: String,
    pub api_group: String,
    pub resource_name: String,
    /// Empty for cluster-scoped requests.
    pub namespace: String,
}

pub struct AccessDecision {
    pub allowed: bool,
    pub reason: String,
}

/// A rule matches a request iff its apiGroups contain `*` or the requested
/// group, its resources contain `*`, the exact resource, or the resource's
/// base name (before `/` for subresources), its verbs contain `*` or the
/// verb, and resourceNames (when non-empty) contain the requested name.
pub fn matches_rule(rule: &PolicyRule, req: &AccessRequest) -> bool {
    let group_ok = rule
        .api_groups
        .iter()
        .any(|g| g == "*" || g == &req.api_group);
    if !group_ok {
        return false;
    }
    let base = req.resource.split('/').next().unwrap_or("");
    let resource_ok = rule
        .resources
        .iter()
        .any(|r| r == "*" || r == &req.resource || r == base);
    if !resource_ok {
        return false;
    }
    let verb_ok = rule.verbs.iter().any(|v| v == "*" || v == &req.verb);
    if !verb_ok {
        return false;
    }
    if !rule.resource_names.is_empty()
        && !rule.resource_names.iter().any(|n| n == &req.resource_name)
    {
        return false;
    }
    true
}

fn subject_matches(subject: &Subject, req: &AccessRequest) -> bool {
    match subject.kind.as_str() {
        "User" => subject.name == req.user,
        "Group" => req.groups.iter().any(|g| g == &subject.name),
        "ServiceAccount" => {
            !req.service_account.is_empty()
                && req.service_account == format!("{}:{}", subject.namespace, subject.name)
        }
        _ => false,
    }
}

/// First match wins: superuser group, then ClusterRoleBindings, then (for
/// namespace-scoped requests) RoleBindings in the request's namespace. A
/// RoleBinding may reference a ClusterRole, but its grant stays scoped to
/// the binding's own namespace.
pub fn check_access(req: &AccessRequest, state: &ClusterState) -> AccessDecision {
    if req
        .groups
        .iter()
        .any(|g| SUPERUSER_GROUPS.contains(&g.as_str()))
    {
        return AccessDecision {
            allowed: true,
            reason: format!("user \"{}\" is a cluster superuser", req.user),
        };
    }

    for binding in &state.cluster_role_bindings {
        if !binding.subjects.iter().any(|s| subject_matches(s, req)) {
            continue;
        }
        if let Some(role) = state
            .cluster_roles
            .iter()
            .find(|r| r.metadata.name == binding.role_ref.name)
        {
            if role.rules.iter().any(|rule| matches_rule(rule, req)) {
                return AccessDecision {
                    allowed: true,
                    reason: format!(
                        "allowed by ClusterRoleBinding \"{}\" of ClusterRole \"{}\"",
                        binding.metadata.name, role.metadata.name
                    ),
                };
            }
        }
    }

    if !req.namespace.is_empty() {
        for binding in state
            .role_bindings
            .iter()
            .filter(|b| b.metadata.namespace == req.namespace)
        {
            if !binding.subjects.iter().any(|s| subject_matches(s, req)) {
                continue;
            }
            let rules: Option<&Vec<PolicyRule>> = match binding.role_ref.kind.as_str() {
                "Role" => state
                    .roles
                    .iter()
                    .find(|r| {
                        r.metadata.namespace == req.namespace
                            && r.metadata.name == binding.role_ref.name
                    })
                    .map(|r| &r.rules),
                "ClusterRole" => state
                    .cluster_roles
                    .iter()
                    .find(|r| r.metadata.name == binding.role_ref.name)
                    .map(|r| &r.rules),
                _ => None,
            };
            if let Some(rules) = rules {
                if rules.iter().any(|rule| matches_rule(rule, req)) {
                    return AccessDecision {
                        allowed: true,
                        reason: format!(
                            "allowed by RoleBinding \"{}/{}\" of {} \"{}\"",
                            req.namespace,
                            binding.metadata.name,
                            binding.role_ref.kind,
                            binding.role_ref.name
                        ),
                    };
                }
            }
        }
    }

    AccessDecision {
        allowed: false,
        reason: format!(
            "user \"{}\" cannot {} resource \"{}\" in API group \"{}\"{}",
            req.user,
            req.verb,
            req.resource,
            req.api_group,
            if req.namespace.is_empty() {
                " at the cluster scope".to_string()
            } else {
                format!(" in the namespace \"{}\"", req.namespace)
            }
        ),
    }
}

pub struct CanIOptions {
    pub as_user: Option<String>,
    pub as_groups: Vec<String>,
    pub namespace: String,
    pub resource_name: String,
}

impl Default for CanIOptions {
    fn default() -> Self {
        CanIOptions {
            as_user: None,
            as_groups: Vec::new(),
            namespace: "default".into(),
            resource_name: String::new(),
        }
    }
}

/// Backs `kubectl auth can-i`. Identity defaults to the current context
/// unless impersonated via `--as`/`--as-group`.
pub fn can_i(verb: &str, resource: &str, state: &ClusterState, opts: &CanIOptions) -> AccessDecision {
    let (user, groups, service_account) = match &opts.as_user {
        Some(u) => {
            let sa = u
                .strip_prefix("system:serviceaccount:")
                .map(|rest| rest.to_string())
                .unwrap_or_default();
            (u.clone(), opts.as_groups.clone(), sa)
        }
        None => match state.current_context() {
            Some(ctx) => (ctx.user.clone(), ctx.groups.clone(), ctx.service_account.clone()),
            None => (String::new(), Vec::new(), String::new()),
        },
    };
    let (resource, api_group) = split_resource_group(resource);
    let req = AccessRequest {
        user,
        groups,
        service_account,
        verb: verb.into(),
        resource,
        api_group,
        resource_name: opts.resource_name.clone(),
        namespace: opts.namespace.clone(),
    };
    check_access(&req, state)
}

/// "deployments.apps" -> ("deployments", "apps"); bare names get the core
/// group for core kinds and "apps"/"rbac..." for the well-known rest.
pub fn split_resource_group(resource: &str) -> (String, String) {
    if let Some((res, group)) = resource.split_once('.') {
        return (res.into(), group.into());
    }
    let group = match resource.split('/').next().unwrap_or("") {
        "deployments" | "replicasets" | "daemonsets" | "statefulsets" => "apps",
        "roles" | "rolebindings" | "clusterroles" | "clusterrolebindings" => {
            "rbac.authorization.k8s.io"
        }
        "jobs" | "cronjobs" => "batch",
        "ingresses" | "networkpolicies" => "networking.k8s.io",
        "horizontalpodautoscalers" => "autoscaling",
        "gateways" | "gatewayclasses" | "httproutes" => "gateway.networking.k8s.io",
        "priorityclasses" => "scheduling.k8s.io",
        "storageclasses" => "storage.k8s.io",
        _ => "",
    };
    (resource.into(), group.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{initial_cluster_state, Metadata, Role, RoleBinding, RoleRef};

    fn grant_pods_get_list(state: &mut ClusterState, ns: &str, user: &str) {
        state.roles.push(Role {
            metadata: Metadata::new("pod-reader", ns),
            rules: vec![PolicyRule {
                api_groups: vec!["".into()],
                resources: vec!["pods".into()],
                verbs: vec!["get".into(), "list".into()],
                resource_names: Vec::new(),
            }],
        });
        state.role_bindings.push(RoleBinding {
            metadata: Metadata::new("read-pods", ns),
            subjects: vec![Subject {
                kind: "User".into(),
                name: user.into(),
                namespace: String::new(),
            }],
            role_ref: RoleRef {
                kind: "Role".into(),
                name: "pod-reader".into(),
            },
        });
    }

    fn dev_opts(ns: &str) -> CanIOptions {
        CanIOptions {
            as_user: Some("dev-user".into()),
            as_groups: vec!["developers".into()],
            namespace: ns.into(),
            resource_name: String::new(),
        }
    }

    #[test]
    fn test_superuser_always_allowed() {
        let state = initial_cluster_state();
        let d = can_i("delete", "nodes", &state, &CanIOptions::default());
        assert!(d.allowed);
    }

    #[test]
    fn test_role_binding_grants_in_namespace_only() {
        let mut state = initial_cluster_state();
        grant_pods_get_list(&mut state, "default", "dev-user");
        assert!(can_i("get", "pods", &state, &dev_opts("default")).allowed);
        assert!(!can_i("get", "pods", &state, &dev_opts("kube-system")).allowed);
    }

    #[test]
    fn test_verb_not_granted_is_denied() {
        let mut state = initial_cluster_state();
        grant_pods_get_list(&mut state, "default", "dev-user");
        let d = can_i("delete", "pods", &state, &dev_opts("default"));
        assert!(!d.allowed);
        assert!(d.reason.contains("cannot delete"));
    }

    #[test]
    fn test_subresource_matches_base_resource() {
        let rule = PolicyRule {
            api_groups: vec!["".into()],
            resources: vec!["pods".into()],
            verbs: vec!["get".into()],
            resource_names: Vec::new(),
        };
        let req = AccessRequest {
            verb: "get".into(),
            resource: "pods/log".into(),
            api_group: "".into(),
            ..Default::default()
        };
        assert!(matches_rule(&rule, &req));
    }

    #[test]
    fn test_resource_names_restrict() {
        let rule = PolicyRule {
            api_groups: vec!["*".into()],
            resources: vec!["configmaps".into()],
            verbs: vec!["get".into()],
            resource_names: vec!["app-config".into()],
        };
        let mut req = AccessRequest {
            verb: "get".into(),
            resource: "configmaps".into(),
            resource_name: "app-config".into(),
            ..Default::default()
        };
        assert!(matches_rule(&rule, &req));
        req.resource_name = "other".into();
        assert!(!matches_rule(&rule, &req));
    }

    #[test]
    fn test_group_subject_via_cluster_role_binding() {
        let mut state = initial_cluster_state();
        state.cluster_role_bindings.push(crate::state::ClusterRoleBinding {
            metadata: Metadata::new("devs-view", ""),
            subjects: vec![Subject {
                kind: "Group".into(),
                name: "developers".into(),
                namespace: String::new(),
            }],
            role_ref: RoleRef {
                kind: "ClusterRole".into(),
                name: "view".into(),
            },
        });
        assert!(can_i("list", "deployments", &state, &dev_opts("kube-system")).allowed);
        assert!(!can_i("delete", "deployments", &state, &dev_opts("default")).allowed);
    }

    #[test]
    fn test_rolebinding_to_clusterrole_scoped_to_namespace() {
        let mut state = initial_cluster_state();
        state.role_bindings.push(RoleBinding {
            metadata: Metadata::new("edit-default", "default"),
            subjects: vec![Subject {
                kind: "User".into(),
                name: "dev-user".into(),
                namespace: String::new(),
            }],
            role_ref: RoleRef {
                kind: "ClusterRole".into(),
                name: "edit".into(),
            },
        });
        assert!(can_i("create", "pods", &state, &dev_opts("default")).allowed);
        assert!(!can_i("create", "pods", &state, &dev_opts("kube-system")).allowed);
    }

    #[test]
    fn test_split_resource_group() {
        assert_eq!(
            split_resource_group("deployments"),
            ("deployments".to_string(), "apps".to_string())
        );
        assert_eq!(
            split_resource_group("pods"),
            ("pods".to_string(), "".to_string())
        );
        assert_eq!(
            split_resource_group("widgets.example.com"),
            ("widgets".to_string(), "example.com".to_string())
        );
    }
}
