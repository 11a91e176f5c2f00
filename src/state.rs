use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CLUSTER_VERSION: &str = "v1.29.3";
pub const API_SERVER: &str = "https://10.0.0.10:6443";

/// Simulated wall clock origin. Resource timestamps render as this instant
/// plus their creation offset, so repeated reads are byte-stable.
const EPOCH: (u32, u32, u32) = (10, 0, 0); // 10:00:00 UTC
const EPOCH_DAY: u32 = 1; // 2024-06-01

// ---------------------------------------------------------------------------
// Generic resource shape
// ---------------------------------------------------------------------------

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    /// Empty for cluster-scoped kinds.
    pub namespace: String,
    pub uid: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    /// Simulated seconds since cluster start.
    pub created_at: u64,
}

impl Metadata {
    pub fn new(name: &str, namespace: &str) -> Self {
        Metadata {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }
}

/// True when every selector pair appears in `labels` (superset match).
/// An empty selector matches nothing; that is how real selectors behave
/// for workload ownership.
pub fn labels_match(selector: &BTreeMap<String, String>, labels: &BTreeMap<String, String>) -> bool {
    if selector.is_empty() {
        return false;
    }
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

pub fn format_labels(labels: &BTreeMap<String, String>) -> String {
    if labels.is_empty() {
        return "<none>".into();
    }
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Absolute RFC3339 timestamp for a creation offset.
pub fn timestamp(created_at: u64) -> String {
    let total = EPOCH.0 as u64 * 3600 + EPOCH.1 as u64 * 60 + EPOCH.2 as u64 + created_at;
    let day = EPOCH_DAY as u64 + total / 86400;
    let rem = total % 86400;
    format!(
        "2024-06-{:02}T{:02}:{:02}:{:02}Z",
        day.min(28),
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

/// Humanized age, kubectl style: 42s, 5m, 3h, 2d.
pub fn age(clock: u64, created_at: u64) -> String {
    let secs = clock.saturating_sub(created_at);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

// ---------------------------------------------------------------------------
// Workloads
// ---------------------------------------------------------------------------

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
    /// "configMapKeyRef:<name>:<key>" / "secretKeyRef:<name>:<key>", empty
    /// for plain values.
    pub value_from: String,
}

#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub enum EnvFromKind {
    ConfigMap,
    Secret,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EnvFromSource {
    pub kind: EnvFromKind,
    pub name: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ResourceAmounts {
    pub cpu: String,
    pub memory: String,
}

impl ResourceAmounts {
    pub fn is_empty(&self) -> bool {
        self.cpu.is_empty() && self.memory.is_empty()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    /// "configMap:<name>", "secret:<name>", "persistentVolumeClaim:<name>",
    /// "emptyDir", "hostPath:<path>".
    pub source: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub ports: Vec<u16>,
    pub env: Vec<EnvVar>,
    pub env_from: Vec<EnvFromSource>,
    pub requests: ResourceAmounts,
    pub limits: ResourceAmounts,
    pub volume_mounts: Vec<VolumeMount>,
    pub command: Vec<String>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Toleration {
    pub key: String,
    pub effect: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct PodSpec {
    pub containers: Vec<ContainerSpec>,
    pub node_selector: BTreeMap<String, String>,
    pub service_account: String,
    pub priority_class: String,
    pub tolerations: Vec<Toleration>,
    pub volumes: Vec<Volume>,
}

#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    CrashLoopBackOff,
    ImagePullBackOff,
    Error,
    Failed,
    Completed,
}

impl PodPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::CrashLoopBackOff => "CrashLoopBackOff",
            PodPhase::ImagePullBackOff => "ImagePullBackOff",
            PodPhase::Error => "Error",
            PodPhase::Failed => "Failed",
            PodPhase::Completed => "Completed",
        }
    }
    pub fn is_ready(&self) -> bool {
        matches!(self, PodPhase::Running)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct PodStatus {
    pub phase: PodPhase,
    pub restarts: u32,
    /// Node the pod was scheduled onto; None while unschedulable.
    pub node: Option<String>,
    /// Scheduling-failure or crash message recorded at creation time.
    pub message: String,
}

impl Default for PodStatus {
    fn default() -> Self {
        PodStatus {
            phase: PodPhase::Pending,
            restarts: 0,
            node: None,
            message: String::new(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Pod {
    pub metadata: Metadata,
    pub spec: PodSpec,
    pub status: PodStatus,
}

impl Pod {
    pub fn image(&self) -> &str {
        self.spec
            .containers
            .first()
            .map(|c| c.image.as_str())
            .unwrap_or("")
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct PodTemplate {
    pub labels: BTreeMap<String, String>,
    pub spec: PodSpec,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Deployment {
    pub metadata: Metadata,
    pub replicas: u32,
    pub selector: BTreeMap<String, String>,
    pub template: PodTemplate,
    pub strategy: String,
}

impl Deployment {
    pub fn image(&self) -> &str {
        self.template
            .spec
            .containers
            .first()
            .map(|c| c.image.as_str())
            .unwrap_or("")
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ServicePort {
    pub port: u16,
    pub target_port: u16,
    pub node_port: u16,
    pub protocol: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Service {
    pub metadata: Metadata,
    pub selector: BTreeMap<String, String>,
    pub ports: Vec<ServicePort>,
    pub service_type: String,
    pub cluster_ip: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Taint {
    pub key: String,
    pub value: String,
    pub effect: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct NodeResource {
    pub metadata: Metadata,
    pub roles: String,
    pub taints: Vec<Taint>,
    pub unschedulable: bool,
    /// Allocatable capacity, millicores / MiB.
    pub allocatable_cpu_m: u32,
    pub allocatable_mem_mi: u32,
    pub internal_ip: String,
    pub os_image: String,
    pub kubelet_version: String,
}

impl NodeResource {
    pub fn schedulable(&self) -> bool {
        !self.unschedulable && !self.taints.iter().any(|t| t.effect == "NoSchedule")
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ConfigMap {
    pub metadata: Metadata,
    pub data: BTreeMap<String, String>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Secret {
    pub metadata: Metadata,
    pub secret_type: String,
    /// Values stored base64-encoded, as the API server would return them.
    pub data: BTreeMap<String, String>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Hpa {
    pub metadata: Metadata,
    pub target: String,
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub target_cpu: u32,
    pub current_cpu: u32,
    pub scale_down_stabilization: u32,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Job {
    pub metadata: Metadata,
    pub image: String,
    pub command: Vec<String>,
    pub completions: u32,
    pub succeeded: u32,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CronJob {
    pub metadata: Metadata,
    pub schedule: String,
    pub image: String,
    pub command: Vec<String>,
    pub suspend: bool,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DaemonSet {
    pub metadata: Metadata,
    pub selector: BTreeMap<String, String>,
    pub image: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct StatefulSet {
    pub metadata: Metadata,
    pub replicas: u32,
    pub selector: BTreeMap<String, String>,
    pub image: String,
    pub service_name: String,
}

// ---------------------------------------------------------------------------
// RBAC
// ---------------------------------------------------------------------------

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct PolicyRule {
    pub api_groups: Vec<String>,
    pub resources: Vec<String>,
    pub verbs: Vec<String>,
    pub resource_names: Vec<String>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Role {
    pub metadata: Metadata,
    pub rules: Vec<PolicyRule>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ClusterRole {
    pub metadata: Metadata,
    pub rules: Vec<PolicyRule>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Subject {
    /// "User" | "Group" | "ServiceAccount"
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RoleRef {
    /// "Role" | "ClusterRole"
    pub kind: String,
    pub name: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RoleBinding {
    pub metadata: Metadata,
    pub subjects: Vec<Subject>,
    pub role_ref: RoleRef,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ClusterRoleBinding {
    pub metadata: Metadata,
    pub subjects: Vec<Subject>,
    pub role_ref: RoleRef,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub metadata: Metadata,
}

// ---------------------------------------------------------------------------
// Storage / networking / policy
// ---------------------------------------------------------------------------

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct StorageClass {
    pub metadata: Metadata,
    pub provisioner: String,
    pub reclaim_policy: String,
    pub binding_mode: String,
    pub is_default: bool,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct PersistentVolume {
    pub metadata: Metadata,
    pub capacity: String,
    pub access_modes: Vec<String>,
    pub reclaim_policy: String,
    pub storage_class: String,
    pub host_path: String,
    /// "Available" | "Bound" | "Released"
    pub status: String,
    pub claim_ref: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Pvc {
    pub metadata: Metadata,
    pub request: String,
    pub access_modes: Vec<String>,
    pub storage_class: String,
    /// "Pending" | "Bound"
    pub status: String,
    pub volume_name: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct NetworkPolicy {
    pub metadata: Metadata,
    pub pod_selector: BTreeMap<String, String>,
    pub policy_types: Vec<String>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct IngressRule {
    pub host: String,
    pub path: String,
    pub service: String,
    pub port: u16,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Ingress {
    pub metadata: Metadata,
    pub class_name: String,
    pub rules: Vec<IngressRule>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct GatewayClass {
    pub metadata: Metadata,
    pub controller: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct GatewayListener {
    pub name: String,
    pub port: u16,
    pub protocol: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Gateway {
    pub metadata: Metadata,
    pub class_name: String,
    pub listeners: Vec<GatewayListener>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct HttpRoute {
    pub metadata: Metadata,
    pub parent: String,
    pub hostnames: Vec<String>,
    /// "service:port"
    pub backend: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct PriorityClass {
    pub metadata: Metadata,
    pub value: i64,
    pub global_default: bool,
    pub description: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ResourceQuota {
    pub metadata: Metadata,
    pub hard: BTreeMap<String, String>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct LimitRange {
    pub metadata: Metadata,
    pub default_cpu: String,
    pub default_memory: String,
    pub default_request_cpu: String,
    pub default_request_memory: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Event {
    pub at: u64,
    pub namespace: String,
    pub kind: String,
    pub name: String,
    pub reason: String,
    pub message: String,
    pub event_type: String,
}

// ---------------------------------------------------------------------------
// etcd substate and auth context
// ---------------------------------------------------------------------------

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct EtcdMember {
    pub id: String,
    pub name: String,
    pub peer_url: String,
    pub client_url: String,
    pub healthy: bool,
    pub is_leader: bool,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct EtcdBackup {
    pub path: String,
    pub size: usize,
    pub created_at: u64,
    pub total_keys: u32,
    pub hash: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct EtcdCluster {
    pub members: Vec<EtcdMember>,
    pub backups: Vec<EtcdBackup>,
    pub corrupted: bool,
    pub alarms: Vec<String>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct KubeContext {
    pub name: String,
    pub cluster: String,
    pub user: String,
    pub groups: Vec<String>,
    /// "<namespace>:<name>" when the context acts as a ServiceAccount.
    pub service_account: String,
}

// ---------------------------------------------------------------------------
// Root aggregate
// ---------------------------------------------------------------------------

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ClusterState {
    pub namespaces: Vec<String>,
    pub pods: Vec<Pod>,
    pub deployments: Vec<Deployment>,
    pub services: Vec<Service>,
    pub nodes: Vec<NodeResource>,
    pub config_maps: Vec<ConfigMap>,
    pub secrets: Vec<Secret>,
    pub hpas: Vec<Hpa>,
    pub jobs: Vec<Job>,
    pub cron_jobs: Vec<CronJob>,
    pub daemon_sets: Vec<DaemonSet>,
    pub stateful_sets: Vec<StatefulSet>,
    pub roles: Vec<Role>,
    pub role_bindings: Vec<RoleBinding>,
    pub cluster_roles: Vec<ClusterRole>,
    pub cluster_role_bindings: Vec<ClusterRoleBinding>,
    pub service_accounts: Vec<ServiceAccount>,
    pub storage_classes: Vec<StorageClass>,
    pub persistent_volumes: Vec<PersistentVolume>,
    pub pvcs: Vec<Pvc>,
    pub network_policies: Vec<NetworkPolicy>,
    pub ingresses: Vec<Ingress>,
    pub gateway_classes: Vec<GatewayClass>,
    pub gateways: Vec<Gateway>,
    pub http_routes: Vec<HttpRoute>,
    pub priority_classes: Vec<PriorityClass>,
    pub resource_quotas: Vec<ResourceQuota>,
    pub limit_ranges: Vec<LimitRange>,
    pub events: Vec<Event>,
    pub etcd: EtcdCluster,
    pub contexts: Vec<KubeContext>,
    pub current_context: String,
    /// Simulated seconds since cluster start; advanced by the dispatcher.
    pub clock: u64,
    /// Seed for deterministic name synthesis.
    pub rng: u64,
}

impl ClusterState {
    pub fn has_namespace(&self, ns: &str) -> bool {
        self.namespaces.iter().any(|n| n == ns)
    }

    pub fn pod(&self, ns: &str, name: &str) -> Option<&Pod> {
        self.pods
            .iter()
            .find(|p| p.metadata.namespace == ns && p.metadata.name == name)
    }

    pub fn deployment(&self, ns: &str, name: &str) -> Option<&Deployment> {
        self.deployments
            .iter()
            .find(|d| d.metadata.namespace == ns && d.metadata.name == name)
    }

    pub fn deployment_mut(&mut self, ns: &str, name: &str) -> Option<&mut Deployment> {
        self.deployments
            .iter_mut()
            .find(|d| d.metadata.namespace == ns && d.metadata.name == name)
    }

    pub fn service(&self, ns: &str, name: &str) -> Option<&Service> {
        self.services
            .iter()
            .find(|s| s.metadata.namespace == ns && s.metadata.name == name)
    }

    pub fn node(&self, name: &str) -> Option<&NodeResource> {
        self.nodes.iter().find(|n| n.metadata.name == name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut NodeResource> {
        self.nodes.iter_mut().find(|n| n.metadata.name == name)
    }

    pub fn config_map(&self, ns: &str, name: &str) -> Option<&ConfigMap> {
        self.config_maps
            .iter()
            .find(|c| c.metadata.namespace == ns && c.metadata.name == name)
    }

    pub fn secret(&self, ns: &str, name: &str) -> Option<&Secret> {
        self.secrets
            .iter()
            .find(|s| s.metadata.namespace == ns && s.metadata.name == name)
    }

    pub fn current_context(&self) -> Option<&KubeContext> {
        self.contexts.iter().find(|c| c.name == self.current_context)
    }

    /// Pods owned by a deployment: same namespace, labels a superset of
    /// the deployment's selector.
    pub fn owned_pods(&self, d: &Deployment) -> Vec<usize> {
        self.pods
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                p.metadata.namespace == d.metadata.namespace
                    && labels_match(&d.selector, &p.metadata.labels)
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Step the deterministic generator. xorshift64, seeded at cluster
    /// creation; state flows with the value so identical command
    /// sequences synthesize identical names.
    pub fn next_rand(&mut self) -> u64 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng = x;
        x
    }

    /// Random lowercase alnum suffix, kubelet flavor (no vowels, no 0/1).
    pub fn rand_suffix(&mut self, len: usize) -> String {
        const CHARS: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";
        let mut out = String::with_capacity(len);
        for _ in 0..len {
            let r = self.next_rand() as usize;
            out.push(CHARS[r % CHARS.len()] as char);
        }
        out
    }

    pub fn new_uid(&mut self) -> String {
        let a = self.next_rand();
        let b = self.next_rand();
        format!(
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            a as u32,
            (a >> 32) as u16,
            (a >> 48) as u16,
            b as u16,
            b >> 16 & 0xffff_ffff_ffff
        )
    }

    pub fn record_event(&mut self, ns: &str, kind: &str, name: &str, reason: &str, message: &str) {
        let at = self.clock;
        self.events.push(Event {
            at,
            namespace: ns.into(),
            kind: kind.into(),
            name: name.into(),
            reason: reason.into(),
            message: message.into(),
            event_type: if reason.starts_with("Failed") || reason == "BackOff" {
                "Warning".into()
            } else {
                "Normal".into()
            },
        });
    }
}

/// The fixed starting cluster: a control plane, two workers, system pods,
/// default namespaces, baseline RBAC, one healthy etcd member. No user
/// workloads.
pub fn initial_cluster_state() -> ClusterState {
    let mut s = ClusterState {
        rng: 0x4b75_6265_4c61_6221,
        ..Default::default()
    };

    s.namespaces = vec![
        "default".into(),
        "kube-node-lease".into(),
        "kube-public".into(),
        "kube-system".into(),
    ];

    let mk_node = |name: &str, roles: &str, ip: &str, cpu_m: u32, mem_mi: u32| {
        let mut n = NodeResource {
            metadata: Metadata::new(name, ""),
            roles: roles.into(),
            internal_ip: ip.into(),
            os_image: "Ubuntu 22.04.4 LTS".into(),
            kubelet_version: CLUSTER_VERSION.into(),
            allocatable_cpu_m: cpu_m,
            allocatable_mem_mi: mem_mi,
            ..Default::default()
        };
        n.metadata
            .labels
            .insert("kubernetes.io/hostname".into(), name.into());
        n
    };
    let mut cp = mk_node("controlplane", "control-plane", "10.0.0.10", 2000, 4096);
    cp.metadata.labels.insert(
        "node-role.kubernetes.io/control-plane".into(),
        String::new(),
    );
    cp.taints.push(Taint {
        key: "node-role.kubernetes.io/control-plane".into(),
        value: String::new(),
        effect: "NoSchedule".into(),
    });
    s.nodes.push(cp);
    s.nodes
        .push(mk_node("node01", "<none>", "10.0.0.11", 4000, 8192));
    s.nodes
        .push(mk_node("node02", "<none>", "10.0.0.12", 4000, 8192));

    // System pods pinned to the control plane.
    let mut system_pod = |s: &mut ClusterState, name: &str, image: &str| {
        let mut p = Pod {
            metadata: Metadata::new(name, "kube-system"),
            ..Default::default()
        };
        p.metadata.uid = s.new_uid();
        p.metadata.labels.insert("tier".into(), "control-plane".into());
        p.spec.containers.push(ContainerSpec {
            name: name.split('-').next().unwrap_or(name).into(),
            image: image.into(),
            ..Default::default()
        });
        p.status.phase = PodPhase::Running;
        p.status.node = Some("controlplane".into());
        s.pods.push(p);
    };
    system_pod(&mut s, "etcd-controlplane", "registry.k8s.io/etcd:3.5.12-0");
    system_pod(
        &mut s,
        "kube-apiserver-controlplane",
        "registry.k8s.io/kube-apiserver:v1.29.3",
    );
    system_pod(
        &mut s,
        "kube-controller-manager-controlplane",
        "registry.k8s.io/kube-controller-manager:v1.29.3",
    );
    system_pod(
        &mut s,
        "kube-scheduler-controlplane",
        "registry.k8s.io/kube-scheduler:v1.29.3",
    );
    let suffix = s.rand_suffix(5);
    let mut coredns = Pod {
        metadata: Metadata::new(&format!("coredns-76f75df574-{}", suffix), "kube-system"),
        ..Default::default()
    };
    coredns.metadata.uid = s.new_uid();
    coredns
        .metadata
        .labels
        .insert("k8s-app".into(), "kube-dns".into());
    coredns.spec.containers.push(ContainerSpec {
        name: "coredns".into(),
        image: "registry.k8s.io/coredns/coredns:v1.11.1".into(),
        ..Default::default()
    });
    coredns.status.phase = PodPhase::Running;
    coredns.status.node = Some("node01".into());
    s.pods.push(coredns);

    for ns in ["default", "kube-system", "kube-public", "kube-node-lease"] {
        s.service_accounts.push(ServiceAccount {
            metadata: Metadata::new("default", ns),
        });
    }

    let mut kubernetes_svc = Service {
        metadata: Metadata::new("kubernetes", "default"),
        service_type: "ClusterIP".into(),
        cluster_ip: "10.96.0.1".into(),
        ..Default::default()
    };
    kubernetes_svc.ports.push(ServicePort {
        port: 443,
        target_port: 6443,
        node_port: 0,
        protocol: "TCP".into(),
    });
    s.services.push(kubernetes_svc);

    s.storage_classes.push(StorageClass {
        metadata: Metadata::new("standard", ""),
        provisioner: "rancher.io/local-path".into(),
        reclaim_policy: "Delete".into(),
        binding_mode: "WaitForFirstConsumer".into(),
        is_default: true,
    });

    s.priority_classes.push(PriorityClass {
        metadata: Metadata::new("system-cluster-critical", ""),
        value: 2_000_000_000,
        global_default: false,
        description: "Used for system critical pods that must run in the cluster.".into(),
    });
    s.priority_classes.push(PriorityClass {
        metadata: Metadata::new("system-node-critical", ""),
        value: 2_000_001_000,
        global_default: false,
        description: "Used for system critical pods that must not be moved from their current node.".into(),
    });

    // Baseline RBAC: cluster-admin for system:masters, plus the standard
    // view/edit aggregates the teaching scenarios bind against.
    let any = |verbs: &[&str], resources: &[&str]| PolicyRule {
        api_groups: vec!["*".into()],
        resources: resources.iter().map(|r| r.to_string()).collect(),
        verbs: verbs.iter().map(|v| v.to_string()).collect(),
        resource_names: Vec::new(),
    };
    s.cluster_roles.push(ClusterRole {
        metadata: Metadata::new("cluster-admin", ""),
        rules: vec![any(&["*"], &["*"])],
    });
    s.cluster_roles.push(ClusterRole {
        metadata: Metadata::new("view", ""),
        rules: vec![any(&["get", "list", "watch"], &["*"])],
    });
    s.cluster_roles.push(ClusterRole {
        metadata: Metadata::new("edit", ""),
        rules: vec![any(
            &["get", "list", "watch", "create", "update", "patch", "delete"],
            &["*"],
        )],
    });
    s.cluster_role_bindings.push(ClusterRoleBinding {
        metadata: Metadata::new("cluster-admin", ""),
        subjects: vec![Subject {
            kind: "Group".into(),
            name: "system:masters".into(),
            namespace: String::new(),
        }],
        role_ref: RoleRef {
            kind: "ClusterRole".into(),
            name: "cluster-admin".into(),
        },
    });

    s.etcd.members.push(EtcdMember {
        id: "8e9e05c52164694d".into(),
        name: "controlplane".into(),
        peer_url: "https://10.0.0.10:2380".into(),
        client_url: "https://10.0.0.10:2379".into(),
        healthy: true,
        is_leader: true,
    });

    s.contexts.push(KubeContext {
        name: "kubernetes-admin@kubernetes".into(),
        cluster: "kubernetes".into(),
        user: "kubernetes-admin".into(),
        groups: vec!["system:masters".into()],
        service_account: String::new(),
    });
    s.contexts.push(KubeContext {
        name: "dev-user@kubernetes".into(),
        cluster: "kubernetes".into(),
        user: "dev-user".into(),
        groups: vec!["developers".into()],
        service_account: String::new(),
    });
    s.current_context = "kubernetes-admin@kubernetes".into();

    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_cluster_shape() {
        let s = initial_cluster_state();
        assert!(s.has_namespace("default"));
        assert!(s.has_namespace("kube-system"));
        assert_eq!(s.nodes.len(), 3);
        assert!(s.node("controlplane").unwrap().taints.len() == 1);
        assert!(!s.node("controlplane").unwrap().schedulable());
        assert!(s.node("node01").unwrap().schedulable());
        assert!(s.pods.iter().all(|p| p.metadata.namespace == "kube-system"));
        assert_eq!(s.etcd.members.len(), 1);
        assert!(!s.etcd.corrupted);
    }

    #[test]
    fn test_labels_match_superset() {
        let mut sel = BTreeMap::new();
        sel.insert("app".to_string(), "web".to_string());
        let mut labels = sel.clone();
        labels.insert("pod-template-hash".to_string(), "abc".to_string());
        assert!(labels_match(&sel, &labels));
        assert!(!labels_match(&labels, &sel));
        assert!(!labels_match(&BTreeMap::new(), &labels));
    }

    #[test]
    fn test_timestamp_and_age() {
        assert_eq!(timestamp(0), "2024-06-01T10:00:00Z");
        assert_eq!(timestamp(90), "2024-06-01T10:01:30Z");
        assert_eq!(age(30, 0), "30s");
        assert_eq!(age(600, 0), "10m");
        assert_eq!(age(7200, 0), "2h");
        assert_eq!(age(200_000, 0), "2d");
    }

    #[test]
    fn test_deterministic_names() {
        let mut a = initial_cluster_state();
        let mut b = initial_cluster_state();
        assert_eq!(a.rand_suffix(5), b.rand_suffix(5));
        assert_eq!(a.new_uid(), b.new_uid());
    }

    #[test]
    fn test_current_context_is_superuser() {
        let s = initial_cluster_state();
        let ctx = s.current_context().unwrap();
        assert!(ctx.groups.iter().any(|g| g == "system:masters"));
    }
}
