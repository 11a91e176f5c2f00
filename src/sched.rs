use crate::state::{
    labels_match, ClusterState, Deployment, Pod, PodPhase, PodSpec, PodStatus,
};
use std::collections::BTreeMap;

/// Images the simulated registry knows how to pull without a registry
/// prefix. Anything else (unless it carries a registry/org path) goes to
/// ImagePullBackOff, which drives the broken-image scenarios.
const KNOWN_IMAGES: &[&str] = &[
    "nginx",
    "redis",
    "busybox",
    "httpd",
    "alpine",
    "postgres",
    "mysql",
    "memcached",
    "mongo",
    "rabbitmq",
    "traefik",
    "haproxy",
    "tomcat",
    "python",
    "node",
    "golang",
    "ubuntu",
    "debian",
    "fluentd",
    "quay.io/argoproj/argocd",
];

pub fn parse_cpu(v: &str) -> u32 {
    if let Some(m) = v.strip_suffix('m') {
        m.parse().unwrap_or(0)
    } else {
        v.parse::<f64>().map(|c| (c * 1000.0) as u32).unwrap_or(0)
    }
}

pub fn parse_memory(v: &str) -> u32 {
    let (num, mult) = if let Some(n) = v.strip_suffix("Gi") {
        (n, 1024.0)
    } else if let Some(n) = v.strip_suffix("Mi") {
        (n, 1.0)
    } else if let Some(n) = v.strip_suffix("Ki") {
        (n, 1.0 / 1024.0)
    } else if let Some(n) = v.strip_suffix('G') {
        (n, 954.0)
    } else if let Some(n) = v.strip_suffix('M') {
        (n, 0.954)
    } else {
        (v, 1.0 / (1024.0 * 1024.0))
    };
    num.parse::<f64>().map(|n| (n * mult) as u32).unwrap_or(0)
}

pub fn pod_requests(spec: &PodSpec) -> (u32, u32) {
    let mut cpu = 0;
    let mut mem = 0;
    for c in &spec.containers {
        cpu += parse_cpu(&c.requests.cpu);
        mem += parse_memory(&c.requests.memory);
    }
    (cpu, mem)
}

pub fn image_pullable(image: &str) -> bool {
    let base = image.split(':').next().unwrap_or(image);
    let tag = image.split(':').nth(1).unwrap_or("latest");
    if tag == "nonexistent" {
        return false;
    }
    if KNOWN_IMAGES.contains(&base) {
        return true;
    }
    // Registry or org prefixed images are assumed pullable.
    base.contains('/')
}

/// Find a node for the spec. Nodes are tried in name order; a node must be
/// schedulable, satisfy the nodeSelector, and have room for the requests
/// on top of what is already placed there. Returns the node name or the
/// FailedScheduling message.
pub fn schedule(state: &ClusterState, ns: &str, spec: &PodSpec) -> Result<String, String> {
    let (req_cpu, req_mem) = pod_requests(spec);
    let mut nodes: Vec<_> = state.nodes.iter().collect();
    nodes.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));

    let mut tainted = 0;
    let mut insufficient = 0;
    let mut selector_miss = 0;
    for node in &nodes {
        let tolerated = node.taints.is_empty()
            || node
                .taints
                .iter()
                .all(|t| spec.tolerations.iter().any(|tol| tol.key == t.key));
        if node.unschedulable || !tolerated {
            tainted += 1;
            continue;
        }
        if !spec.node_selector.is_empty()
            && !spec
                .node_selector
                .iter()
                .all(|(k, v)| node.metadata.labels.get(k) == Some(v))
        {
            selector_miss += 1;
            continue;
        }
        let mut used_cpu = 0;
        let mut used_mem = 0;
        for p in &state.pods {
            if p.status.node.as_deref() == Some(node.metadata.name.as_str()) {
                let (c, m) = pod_requests(&p.spec);
                used_cpu += c;
                used_mem += m;
            }
        }
        if used_cpu + req_cpu <= node.allocatable_cpu_m && used_mem + req_mem <= node.allocatable_mem_mi {
            return Ok(node.metadata.name.clone());
        }
        insufficient += 1;
    }

    let mut reasons = Vec::new();
    if tainted > 0 {
        reasons.push(format!(
            "{} node(s) had untolerated taint or were unschedulable",
            tainted
        ));
    }
    if selector_miss > 0 {
        reasons.push(format!(
            "{} node(s) didn't match Pod's node affinity/selector",
            selector_miss
        ));
    }
    if insufficient > 0 {
        reasons.push(format!("{} Insufficient cpu or memory", insufficient));
    }
    let _ = ns;
    Err(format!(
        "0/{} nodes are available: {}.",
        state.nodes.len(),
        reasons.join(", ")
    ))
}

/// Deterministic status from creation-time inputs: unschedulable requests
/// win, then unpullable images, then an empty env value (the simulated
/// "missing required configuration" crash), otherwise Running.
pub fn derive_status(state: &ClusterState, ns: &str, spec: &PodSpec) -> PodStatus {
    match schedule(state, ns, spec) {
        Err(msg) => PodStatus {
            phase: PodPhase::Pending,
            restarts: 0,
            node: None,
            message: msg,
        },
        Ok(node) => {
            for c in &spec.containers {
                if !image_pullable(&c.image) {
                    return PodStatus {
                        phase: PodPhase::ImagePullBackOff,
                        restarts: 0,
                        node: Some(node),
                        message: format!(
                            "Failed to pull image \"{}\": repository does not exist or may require authorization",
                            c.image
                        ),
                    };
                }
            }
            for c in &spec.containers {
                for e in &c.env {
                    if e.value.is_empty() && e.value_from.is_empty() {
                        return PodStatus {
                            phase: PodPhase::CrashLoopBackOff,
                            restarts: 3,
                            node: Some(node),
                            message: format!(
                                "container \"{}\" exited: required env var {} is empty",
                                c.name, e.name
                            ),
                        };
                    }
                }
            }
            PodStatus {
                phase: PodPhase::Running,
                restarts: 0,
                node: Some(node),
                message: String::new(),
            }
        }
    }
}

/// Build and insert a pod, deriving its status. The caller has already
/// checked for name collisions.
pub fn make_pod(
    state: &mut ClusterState,
    name: &str,
    ns: &str,
    labels: BTreeMap<String, String>,
    spec: PodSpec,
) -> String {
    let status = derive_status(state, ns, &spec);
    let mut pod = Pod {
        metadata: crate::state::Metadata::new(name, ns),
        spec,
        status,
    };
    pod.metadata.uid = state.new_uid();
    pod.metadata.created_at = state.clock;
    pod.metadata.labels = labels;
    match pod.status.phase {
        PodPhase::Pending => {
            let message = pod.status.message.clone();
            state.record_event(ns, "Pod", name, "FailedScheduling", &message);
        }
        PodPhase::Running => {
            state.record_event(ns, "Pod", name, "Scheduled", "Successfully assigned pod");
        }
        _ => {
            let message = pod.status.message.clone();
            state.record_event(ns, "Pod", name, "BackOff", &message);
        }
    }
    let name = pod.metadata.name.clone();
    state.pods.push(pod);
    name
}

/// Short content hash of a pod template, used as the pod-template-hash
/// label. FNV-1a over the fields a rolling update cares about.
pub fn template_hash(d: &Deployment) -> String {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    let mut eat = |s: &str| {
        for b in s.bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(0x0000_0100_0000_01b3);
        }
    };
    for c in &d.template.spec.containers {
        eat(&c.image);
        for e in &c.env {
            eat(&e.name);
            eat(&e.value);
            eat(&e.value_from);
        }
        eat(&c.requests.cpu);
        eat(&c.requests.memory);
        eat(&c.limits.cpu);
        eat(&c.limits.memory);
        for p in &c.ports {
            eat(&p.to_string());
        }
    }
    eat(&d.template.spec.priority_class);
    format!("{:09x}", h & 0xf_ffff_ffff)
}

pub fn pod_labels_for(d: &Deployment) -> BTreeMap<String, String> {
    let mut labels = d.template.labels.clone();
    if labels.is_empty() {
        labels = d.selector.clone();
    }
    labels.insert("pod-template-hash".into(), template_hash(d));
    labels
}

/// Bring a deployment's owned pod set in line with its spec, synchronously.
/// Pods from an older template (different pod-template-hash) are replaced;
/// then the set is grown or shrunk to `replicas`. Returns human-readable
/// notes about what changed.
pub fn reconcile_deployment(state: &mut ClusterState, ns: &str, name: &str) -> Vec<String> {
    let Some(d) = state.deployment(ns, name).cloned() else {
        return Vec::new();
    };
    let mut notes = Vec::new();
    let hash = template_hash(&d);

    // Replace pods built from an outdated template.
    let stale: Vec<String> = state
        .pods
        .iter()
        .filter(|p| {
            p.metadata.namespace == ns
                && labels_match(&d.selector, &p.metadata.labels)
                && p.metadata.labels.get("pod-template-hash") != Some(&hash)
        })
        .map(|p| p.metadata.name.clone())
        .collect();
    for old in &stale {
        state
            .pods
            .retain(|p| !(p.metadata.namespace == ns && &p.metadata.name == old));
        notes.push(format!("pod \"{}\" terminated (rolling update)", old));
    }

    loop {
        let owned: Vec<String> = state
            .pods
            .iter()
            .filter(|p| {
                p.metadata.namespace == ns && labels_match(&d.selector, &p.metadata.labels)
            })
            .map(|p| p.metadata.name.clone())
            .collect();
        if (owned.len() as u32) < d.replicas {
            let suffix = state.rand_suffix(5);
            let pod_name = format!("{}-{}-{}", d.metadata.name, hash, suffix);
            make_pod(state, &pod_name, ns, pod_labels_for(&d), d.template.spec.clone());
            notes.push(format!("pod \"{}\" created", pod_name));
        } else if (owned.len() as u32) > d.replicas {
            // Newest first, matching scale-down behavior.
            let victim = owned.last().cloned().unwrap_or_default();
            state
                .pods
                .retain(|p| !(p.metadata.namespace == ns && p.metadata.name == victim));
            notes.push(format!("pod \"{}\" terminated", victim));
        } else {
            break;
        }
    }
    notes
}

/// Run reconciliation for every deployment in a namespace. Used after any
/// mutation that may have disturbed pod ownership (e.g. a pod delete).
pub fn reconcile_namespace(state: &mut ClusterState, ns: &str) -> Vec<String> {
    let names: Vec<String> = state
        .deployments
        .iter()
        .filter(|d| d.metadata.namespace == ns)
        .map(|d| d.metadata.name.clone())
        .collect();
    let mut notes = Vec::new();
    for name in names {
        notes.extend(reconcile_deployment(state, ns, &name));
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{initial_cluster_state, ContainerSpec, Metadata, PodTemplate, ResourceAmounts};

    fn web_deployment(replicas: u32) -> Deployment {
        let mut selector = BTreeMap::new();
        selector.insert("app".to_string(), "web".to_string());
        Deployment {
            metadata: Metadata::new("web", "default"),
            replicas,
            selector: selector.clone(),
            template: PodTemplate {
                labels: selector,
                spec: PodSpec {
                    containers: vec![ContainerSpec {
                        name: "web".into(),
                        image: "nginx".into(),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            },
            strategy: "RollingUpdate".into(),
        }
    }

    #[test]
    fn test_parse_quantities() {
        assert_eq!(parse_cpu("500m"), 500);
        assert_eq!(parse_cpu("2"), 2000);
        assert_eq!(parse_memory("128Mi"), 128);
        assert_eq!(parse_memory("2Gi"), 2048);
    }

    #[test]
    fn test_image_rules() {
        assert!(image_pullable("nginx"));
        assert!(image_pullable("nginx:1.25"));
        assert!(image_pullable("registry.k8s.io/etcd:3.5.12-0"));
        assert!(!image_pullable("ngnix"));
        assert!(!image_pullable("nginx:nonexistent"));
    }

    #[test]
    fn test_schedule_skips_tainted_control_plane() {
        let state = initial_cluster_state();
        let spec = PodSpec {
            containers: vec![ContainerSpec {
                name: "c".into(),
                image: "nginx".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(schedule(&state, "default", &spec).unwrap(), "node01");
    }

    #[test]
    fn test_schedule_rejects_oversized_request() {
        let state = initial_cluster_state();
        let spec = PodSpec {
            containers: vec![ContainerSpec {
                name: "c".into(),
                image: "nginx".into(),
                requests: ResourceAmounts {
                    cpu: "64".into(),
                    memory: "1Gi".into(),
                },
                ..Default::default()
            }],
            ..Default::default()
        };
        let err = schedule(&state, "default", &spec).unwrap_err();
        assert!(err.starts_with("0/3 nodes are available"));
    }

    #[test]
    fn test_empty_env_crashloops() {
        let state = initial_cluster_state();
        let spec = PodSpec {
            containers: vec![ContainerSpec {
                name: "c".into(),
                image: "nginx".into(),
                env: vec![crate::state::EnvVar {
                    name: "DB_HOST".into(),
                    value: String::new(),
                    value_from: String::new(),
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let st = derive_status(&state, "default", &spec);
        assert!(matches!(st.phase, PodPhase::CrashLoopBackOff));
        assert!(st.message.contains("DB_HOST"));
    }

    #[test]
    fn test_reconcile_creates_replicas() {
        let mut state = initial_cluster_state();
        state.deployments.push(web_deployment(3));
        let notes = reconcile_deployment(&mut state, "default", "web");
        assert_eq!(notes.len(), 3);
        let d = state.deployment("default", "web").unwrap().clone();
        assert_eq!(state.owned_pods(&d).len(), 3);
        for idx in state.owned_pods(&d) {
            assert!(matches!(state.pods[idx].status.phase, PodPhase::Running));
        }
    }

    #[test]
    fn test_reconcile_scales_down() {
        let mut state = initial_cluster_state();
        state.deployments.push(web_deployment(3));
        reconcile_deployment(&mut state, "default", "web");
        state.deployment_mut("default", "web").unwrap().replicas = 1;
        reconcile_deployment(&mut state, "default", "web");
        let d = state.deployment("default", "web").unwrap().clone();
        assert_eq!(state.owned_pods(&d).len(), 1);
    }

    #[test]
    fn test_image_change_replaces_pods() {
        let mut state = initial_cluster_state();
        state.deployments.push(web_deployment(2));
        reconcile_deployment(&mut state, "default", "web");
        let before: Vec<String> = state
            .pods
            .iter()
            .filter(|p| p.metadata.name.starts_with("web-"))
            .map(|p| p.metadata.name.clone())
            .collect();
        state
            .deployment_mut("default", "web")
            .unwrap()
            .template
            .spec
            .containers[0]
            .image = "nginx:1.26".into();
        reconcile_deployment(&mut state, "default", "web");
        let after: Vec<&Pod> = state
            .pods
            .iter()
            .filter(|p| p.metadata.name.starts_with("web-"))
            .collect();
        assert_eq!(after.len(), 2);
        for p in &after {
            assert!(!before.contains(&p.metadata.name));
            assert_eq!(p.image(), "nginx:1.26");
        }
    }

    #[test]
    fn test_replacement_after_pod_delete() {
        let mut state = initial_cluster_state();
        state.deployments.push(web_deployment(3));
        reconcile_deployment(&mut state, "default", "web");
        let victim = state
            .pods
            .iter()
            .find(|p| p.metadata.name.starts_with("web-"))
            .map(|p| p.metadata.name.clone())
            .unwrap();
        state.pods.retain(|p| p.metadata.name != victim);
        let notes = reconcile_namespace(&mut state, "default");
        assert_eq!(notes.len(), 1);
        let d = state.deployment("default", "web").unwrap().clone();
        assert_eq!(state.owned_pods(&d).len(), 3);
    }
}
