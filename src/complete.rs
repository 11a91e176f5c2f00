//! Tab completion. Given the line so far, extends the last token by the
//! longest common prefix of the matching candidates, appends a space on a
//! unique full match, and surfaces the candidate list otherwise.

use crate::render::{self, GetOpts};
use crate::state::ClusterState;
use crate::vfs::Vfs;

pub struct Completion {
    /// The full replacement line.
    pub line: String,
    /// Candidates to show when the prefix is ambiguous.
    pub suggestions: Vec<String>,
}

const COMMANDS: &[&str] = &[
    "kubectl", "k", "etcdctl", "helm", "ls", "cd", "pwd", "cat", "mkdir", "touch", "rm", "cp",
    "mv", "echo", "head", "tail", "grep", "wc", "which", "tree", "export", "env", "unset",
    "clear", "history", "vim", "vi", "nano", "systemctl", "journalctl", "sudo", "watch", "man",
    "exit", "whoami", "hostname", "date",
];

const KUBECTL_VERBS: &[&str] = &[
    "annotate", "api-resources", "apply", "auth", "autoscale", "cluster-info", "config",
    "cordon", "cp", "create", "delete", "describe", "drain", "edit", "exec", "explain",
    "expose", "get", "label", "logs", "port-forward", "rollout", "run", "scale", "set",
    "taint", "top", "uncordon", "version",
];

const RESOURCE_TYPES: &[&str] = &[
    "all", "clusterrolebindings", "clusterroles", "configmaps", "cronjobs", "daemonsets",
    "deployments", "events", "gatewayclasses", "gateways", "horizontalpodautoscalers",
    "httproutes", "ingresses", "jobs", "limitranges", "namespaces", "networkpolicies", "nodes",
    "persistentvolumeclaims", "persistentvolumes", "pods", "priorityclasses", "resourcequotas",
    "rolebindings", "roles", "secrets", "serviceaccounts", "services", "statefulsets",
    "storageclasses",
];

const KUBECTL_FLAGS: &[&str] = &[
    "--all-namespaces", "--as", "--as-group", "--filename", "--image", "--namespace",
    "--output", "--replicas", "--selector", "--show-labels",
];

const HELM_VERBS: &[&str] = &[
    "install", "list", "repo", "rollback", "search", "status", "template", "uninstall",
    "upgrade", "version",
];

const ETCDCTL_VERBS: &[&str] = &["alarm", "defrag", "endpoint", "member", "snapshot", "version"];

/// Longest common prefix of a non-empty candidate set.
fn common_prefix(candidates: &[String]) -> String {
    let Some(first) = candidates.first() else {
        return String::new();
    };
    let mut prefix = first.clone();
    for c in &candidates[1..] {
        while !c.starts_with(&prefix) {
            prefix.pop();
            if prefix.is_empty() {
                return prefix;
            }
        }
    }
    prefix
}

fn namespace_of(words: &[String]) -> String {
    for (i, w) in words.iter().enumerate() {
        if w == "-n" || w == "--namespace" {
            if let Some(v) = words.get(i + 1) {
                return v.clone();
            }
        }
        if let Some(v) = w.strip_prefix("--namespace=") {
            return v.to_string();
        }
    }
    "default".into()
}

/// Names of live resources for a resource-type word, scoped like `get`.
fn live_names(state: &ClusterState, word: &str, words: &[String]) -> Vec<String> {
    let Some(resource) = render::normalize_resource(word) else {
        return Vec::new();
    };
    let opts = GetOpts {
        namespace: namespace_of(words),
        ..Default::default()
    };
    render::names_of(state, resource, &opts)
}

/// Directory-entry candidates for a path prefix; directories keep a
/// trailing slash so completion can continue into them.
fn path_candidates(vfs: &Vfs, prefix: &str) -> Vec<String> {
    let (dir, leaf) = match prefix.rfind('/') {
        Some(i) => (&prefix[..=i], &prefix[i + 1..]),
        None => ("", prefix),
    };
    let lookup = if dir.is_empty() { "." } else { dir };
    let Some(node) = vfs.resolve(lookup) else {
        return Vec::new();
    };
    if !node.is_dir {
        return Vec::new();
    }
    let mut out: Vec<String> = node
        .children
        .values()
        .filter(|n| n.name.starts_with(leaf) && (!n.name.starts_with('.') || leaf.starts_with('.')))
        .map(|n| {
            let mut full = format!("{}{}", dir, n.name);
            if n.is_dir {
                full.push('/');
            }
            full
        })
        .collect();
    out.sort();
    out
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Candidate set for the token at the cursor, given the words before it.
fn candidates(
    prev: &[String],
    current: &str,
    state: &ClusterState,
    vfs: &Vfs,
) -> Vec<String> {
    if prev.is_empty() {
        return to_strings(COMMANDS);
    }
    let cmd = if prev[0] == "sudo" || prev[0] == "watch" {
        if prev.len() == 1 {
            return to_strings(COMMANDS);
        }
        prev[1].as_str()
    } else {
        prev[0].as_str()
    };
    let rest: Vec<String> = prev
        .iter()
        .skip(if prev[0] == "sudo" || prev[0] == "watch" { 2 } else { 1 })
        .cloned()
        .collect();
    match cmd {
        "kubectl" | "k" => kubectl_candidates(&rest, current, state, vfs),
        "helm" => {
            if rest.is_empty() {
                to_strings(HELM_VERBS)
            } else if rest[0] == "repo" && rest.len() == 1 {
                vec!["add".into(), "list".into(), "remove".into(), "update".into()]
            } else {
                Vec::new()
            }
        }
        "etcdctl" => {
            if rest.is_empty() {
                to_strings(ETCDCTL_VERBS)
            } else {
                match rest[0].as_str() {
                    "snapshot" if rest.len() == 1 => {
                        vec!["restore".into(), "save".into(), "status".into()]
                    }
                    "snapshot" => path_candidates(vfs, current),
                    "endpoint" if rest.len() == 1 => vec!["health".into(), "status".into()],
                    "member" if rest.len() == 1 => vec!["list".into()],
                    "alarm" if rest.len() == 1 => vec!["disarm".into(), "list".into()],
                    _ => Vec::new(),
                }
            }
        }
        "systemctl" => {
            if rest.is_empty() {
                vec![
                    "daemon-reload".into(),
                    "restart".into(),
                    "start".into(),
                    "status".into(),
                    "stop".into(),
                ]
            } else {
                vec!["containerd".into(), "etcd".into(), "kubelet".into()]
            }
        }
        "cd" | "ls" | "cat" | "rm" | "cp" | "mv" | "mkdir" | "touch" | "head" | "tail"
        | "tree" | "vim" | "vi" | "nano" | "wc" => path_candidates(vfs, current),
        "grep" => {
            if rest.is_empty() {
                Vec::new()
            } else {
                path_candidates(vfs, current)
            }
        }
        _ => Vec::new(),
    }
}

fn kubectl_candidates(
    rest: &[String],
    current: &str,
    state: &ClusterState,
    vfs: &Vfs,
) -> Vec<String> {
    if current.starts_with('-') {
        return to_strings(KUBECTL_FLAGS);
    }
    // Value position of a flag that takes one.
    if let Some(last) = rest.last() {
        match last.as_str() {
            "-n" | "--namespace" => return state.namespaces.clone(),
            "-o" | "--output" => {
                return vec!["json".into(), "name".into(), "wide".into(), "yaml".into()]
            }
            "-f" | "--filename" => return path_candidates(vfs, current),
            _ => {}
        }
    }
    // Skip flag values when counting positionals.
    let mut positionals: Vec<String> = Vec::new();
    let mut skip_next = false;
    for w in rest {
        if skip_next {
            skip_next = false;
            continue;
        }
        if w.starts_with('-') {
            if matches!(
                w.as_str(),
                "-n" | "--namespace" | "-o" | "--output" | "-l" | "--selector" | "-f"
                    | "--filename" | "--image" | "--replicas" | "--as" | "--as-group"
            ) {
                skip_next = true;
            }
            continue;
        }
        positionals.push(w.clone());
    }
    match positionals.len() {
        0 => to_strings(KUBECTL_VERBS),
        1 => match positionals[0].as_str() {
            "get" | "describe" | "delete" | "edit" | "explain" => to_strings(RESOURCE_TYPES),
            "logs" | "exec" | "port-forward" => live_names(state, "pods", rest),
            "cordon" | "uncordon" | "drain" | "taint" => live_names(state, "nodes", rest),
            "scale" | "expose" => vec!["deployment".into(), "statefulset".into()],
            "rollout" => vec![
                "history".into(),
                "restart".into(),
                "status".into(),
                "undo".into(),
            ],
            "set" => vec!["env".into(), "image".into(), "resources".into()],
            "top" => vec!["nodes".into(), "pods".into()],
            "config" => vec![
                "current-context".into(),
                "get-contexts".into(),
                "use-context".into(),
                "view".into(),
            ],
            "auth" => vec!["can-i".into()],
            "create" => vec![
                "clusterrole".into(),
                "clusterrolebinding".into(),
                "configmap".into(),
                "cronjob".into(),
                "deployment".into(),
                "job".into(),
                "namespace".into(),
                "priorityclass".into(),
                "quota".into(),
                "role".into(),
                "rolebinding".into(),
                "secret".into(),
                "serviceaccount".into(),
            ],
            "apply" => Vec::new(),
            _ => Vec::new(),
        },
        2 => match positionals[0].as_str() {
            "get" | "describe" | "delete" | "edit" => {
                live_names(state, &positionals[1], rest)
            }
            "scale" | "expose" => live_names(state, "deployments", rest),
            "rollout" | "set" => {
                let mut out: Vec<String> = live_names(state, "deployments", rest)
                    .iter()
                    .map(|n| format!("deployment/{}", n))
                    .collect();
                out.sort();
                out
            }
            "config" if positionals[1] == "use-context" => {
                state.contexts.iter().map(|c| c.name.clone()).collect()
            }
            _ => Vec::new(),
        },
        3 => match (positionals[0].as_str(), positionals[1].as_str()) {
            ("rollout", _) | ("set", _) => {
                let mut out: Vec<String> = live_names(state, "deployments", rest)
                    .iter()
                    .map(|n| format!("deployment/{}", n))
                    .collect();
                out.sort();
                out
            }
            ("config", "use-context") => state.contexts.iter().map(|c| c.name.clone()).collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

pub fn complete(line: &str, state: &ClusterState, vfs: &Vfs) -> Completion {
    let ends_with_space = line.ends_with(' ');
    let mut words: Vec<String> = line.split_whitespace().map(|s| s.to_string()).collect();
    let current = if ends_with_space || words.is_empty() {
        String::new()
    } else {
        words.pop().unwrap_or_default()
    };

    let mut cands: Vec<String> = candidates(&words, &current, state, vfs)
        .into_iter()
        .filter(|c| c.starts_with(&current))
        .collect();
    cands.sort();
    cands.dedup();

    if cands.is_empty() {
        return Completion {
            line: line.to_string(),
            suggestions: Vec::new(),
        };
    }

    let prefix = common_prefix(&cands);
    let mut head = words.join(" ");
    if !head.is_empty() {
        head.push(' ');
    }

    if cands.len() == 1 {
        let only = &cands[0];
        // Directories keep the cursor in place for the next component.
        let trailer = if only.ends_with('/') { "" } else { " " };
        return Completion {
            line: format!("{}{}{}", head, only, trailer),
            suggestions: Vec::new(),
        };
    }

    if prefix.len() > current.len() {
        return Completion {
            line: format!("{}{}", head, prefix),
            suggestions: Vec::new(),
        };
    }

    Completion {
        line: line.to_string(),
        suggestions: cands,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::initial_cluster_state;

    #[test]
    fn test_unique_command_gets_space() {
        let s = initial_cluster_state();
        let vfs = Vfs::new();
        let c = complete("kubec", &s, &vfs);
        assert_eq!(c.line, "kubectl ");
        assert!(c.suggestions.is_empty());
    }

    #[test]
    fn test_verb_prefix_extends() {
        let s = initial_cluster_state();
        let vfs = Vfs::new();
        let c = complete("kubectl des", &s, &vfs);
        assert_eq!(c.line, "kubectl describe ");
    }

    #[test]
    fn test_ambiguous_lists_suggestions() {
        let s = initial_cluster_state();
        let vfs = Vfs::new();
        let c = complete("kubectl c", &s, &vfs);
        assert_eq!(c.line, "kubectl c");
        assert!(c.suggestions.contains(&"create".to_string()));
        assert!(c.suggestions.contains(&"cordon".to_string()));
    }

    #[test]
    fn test_resource_types_after_get() {
        let s = initial_cluster_state();
        let vfs = Vfs::new();
        let c = complete("kubectl get po", &s, &vfs);
        assert_eq!(c.line, "kubectl get pods ");
    }

    #[test]
    fn test_live_pod_names() {
        let s = initial_cluster_state();
        let vfs = Vfs::new();
        let c = complete("kubectl get pods -n kube-system core", &s, &vfs);
        assert!(c.line.starts_with("kubectl get pods -n kube-system coredns-"));
    }

    #[test]
    fn test_namespace_flag_values() {
        let s = initial_cluster_state();
        let vfs = Vfs::new();
        let c = complete("kubectl get pods -n kube-s", &s, &vfs);
        assert_eq!(c.line, "kubectl get pods -n kube-system ");
    }

    #[test]
    fn test_path_completion_descends_dirs() {
        let s = initial_cluster_state();
        let vfs = Vfs::new();
        let c = complete("cat /etc/kuber", &s, &vfs);
        assert_eq!(c.line, "cat /etc/kubernetes/");
        let c2 = complete("cat /etc/kubernetes/adm", &s, &vfs);
        assert_eq!(c2.line, "cat /etc/kubernetes/admin.conf ");
    }

    #[test]
    fn test_lcp_extension_without_unique_match() {
        let s = initial_cluster_state();
        let vfs = Vfs::new();
        // clusterrolebindings and clusterroles share "clusterrole".
        let c = complete("kubectl get clusterr", &s, &vfs);
        assert_eq!(c.line, "kubectl get clusterrole");
    }

    #[test]
    fn test_no_candidates_leaves_line() {
        let s = initial_cluster_state();
        let vfs = Vfs::new();
        let c = complete("kubectl get pods zzz", &s, &vfs);
        assert_eq!(c.line, "kubectl get pods zzz");
        assert!(c.suggestions.is_empty());
    }

    #[test]
    fn test_context_names() {
        let s = initial_cluster_state();
        let vfs = Vfs::new();
        let c = complete("kubectl config use-context dev", &s, &vfs);
        assert_eq!(c.line, "kubectl config use-context dev-user@kubernetes ");
    }
}
