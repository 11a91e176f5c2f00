//! Deliberately narrow, line-oriented YAML reader plus the per-kind
//! apply/delete reconciliation it feeds. This is not a YAML parser: it
//! tracks indentation and a section stack, extracts only the fields each
//! Kind needs, ignores `status:` blocks entirely, and treats `-` list
//! items heuristically. Downstream scenario checks depend on exactly this
//! leniency.

use crate::sched;
use crate::state::*;
use std::collections::BTreeMap;

/// Everything the reader can pull out of one YAML document, kind-agnostic.
/// Materialization into a typed resource happens in `apply`.
#[derive(Default, Clone)]
pub struct RawDoc {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,

    pub replicas: Option<u32>,
    pub selector: BTreeMap<String, String>,
    /// `spec.selector.<k>` without matchLabels (Service style).
    pub selector_direct: BTreeMap<String, String>,
    pub template_labels: BTreeMap<String, String>,
    pub containers: Vec<ContainerSpec>,
    pub volumes: Vec<Volume>,
    pub node_selector: BTreeMap<String, String>,
    pub tolerations: Vec<Toleration>,
    pub service_account: String,
    pub priority_class: String,

    pub data: BTreeMap<String, String>,
    pub string_data: BTreeMap<String, String>,
    pub secret_type: String,

    pub service_type: String,
    pub service_ports: Vec<ServicePort>,

    pub rbac_rules: Vec<PolicyRule>,
    pub subjects: Vec<Subject>,
    pub role_ref: RoleRef,

    pub schedule: String,
    pub suspend: bool,
    pub completions: Option<u32>,

    pub min_replicas: Option<u32>,
    pub max_replicas: Option<u32>,
    pub target_cpu: Option<u32>,
    pub scale_target: String,
    pub stabilization_window: Option<u32>,

    pub storage: String,
    pub access_modes: Vec<String>,
    pub storage_class: String,
    pub host_path: String,
    pub reclaim_policy: String,
    pub provisioner: String,
    pub binding_mode: String,

    pub pod_selector: BTreeMap<String, String>,
    pub policy_types: Vec<String>,

    pub ingress_class: String,
    pub ingress_rules: Vec<IngressRule>,

    pub controller: String,
    pub gateway_class: String,
    pub listeners: Vec<GatewayListener>,
    pub parent_ref: String,
    pub hostnames: Vec<String>,
    pub backend_service: String,
    pub backend_port: u16,

    pub value: Option<i64>,
    pub global_default: bool,
    pub description: String,

    pub hard: BTreeMap<String, String>,
    pub default_cpu: String,
    pub default_memory: String,
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn split_kv(s: &str) -> (String, String) {
    match s.split_once(':') {
        Some((k, v)) => (k.trim().to_string(), strip_quotes(v.trim())),
        None => (s.trim().to_string(), String::new()),
    }
}

fn strip_quotes(v: &str) -> String {
    let v = v.trim();
    if v.len() >= 2
        && ((v.starts_with('"') && v.ends_with('"')) || (v.starts_with('\'') && v.ends_with('\'')))
    {
        v[1..v.len() - 1].to_string()
    } else {
        v.to_string()
    }
}

/// `["get", "list"]` -> vec of items. Empty string items survive (the core
/// API group is spelled `""`).
fn parse_inline_list(v: &str) -> Vec<String> {
    let inner = v.trim().trim_start_matches('[').trim_end_matches(']');
    if inner.trim().is_empty() {
        return Vec::new();
    }
    inner.split(',').map(|s| strip_quotes(s.trim())).collect()
}

/// Split a multi-document string on `---` lines.
pub fn split_documents(text: &str) -> Vec<String> {
    let mut docs = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if line.trim() == "---" {
            if !current.trim().is_empty() {
                docs.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        docs.push(current);
    }
    docs
}

/// Parse one document. Never fails: unknown keys are skipped, malformed
/// lines are ignored, and a missing kind simply yields an empty `kind`.
pub fn parse_document(text: &str) -> RawDoc {
    let mut doc = RawDoc::default();
    // (indent, key) stack of open mapping sections.
    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut skip_status = false;

    for raw in text.lines() {
        if raw.trim().is_empty() || raw.trim_start().starts_with('#') {
            continue;
        }
        let mut indent = indent_of(raw);
        let mut body = raw.trim_start().to_string();
        let is_item = body.starts_with("- ") || body == "-";
        if is_item {
            // The key inside a list item aligns two columns deeper.
            indent += 2;
            body = body.trim_start_matches('-').trim_start().to_string();
        }

        while let Some((top, _)) = stack.last() {
            if *top >= indent {
                stack.pop();
            } else {
                break;
            }
        }
        if skip_status && !stack.is_empty() {
            continue;
        }
        skip_status = false;

        if is_item && !body.contains(':') {
            // Scalar list element, attributed to the enclosing section.
            let value = strip_quotes(&body);
            scalar_item(&mut doc, &path(&stack), &value);
            continue;
        }

        let (key, value) = split_kv(&body);
        if stack.is_empty() && key == "status" {
            skip_status = true;
            continue;
        }
        if is_item {
            list_item(&mut doc, &path(&stack), &key);
        }
        if value.is_empty() && !body.trim_end().ends_with("{}") && !body.contains('[') {
            stack.push((indent, key));
            continue;
        }
        let mut p = path(&stack);
        if !p.is_empty() {
            p.push('.');
        }
        p.push_str(&key);
        field(&mut doc, &p, &key, &value);
    }
    doc
}

fn path(stack: &[(usize, String)]) -> String {
    stack
        .iter()
        .map(|(_, k)| k.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

/// A `- key:` line starts a new element in whichever list the section
/// path names.
fn list_item(doc: &mut RawDoc, path: &str, key: &str) {
    let last = path.rsplit('.').next().unwrap_or("");
    match last {
        "containers" | "initContainers" => doc.containers.push(ContainerSpec::default()),
        "env" => {
            if let Some(c) = doc.containers.last_mut() {
                if key == "name" {
                    c.env.push(EnvVar::default());
                }
            }
        }
        "envFrom" => { /* element boundary carried by the nested ref section */ }
        "volumeMounts" => {
            if let Some(c) = doc.containers.last_mut() {
                if key == "name" {
                    c.volume_mounts.push(VolumeMount::default());
                }
            }
        }
        "volumes" => {
            if key == "name" {
                doc.volumes.push(Volume::default());
            }
        }
        "tolerations" => {
            if key == "key" || key == "effect" || key == "operator" {
                if doc
                    .tolerations
                    .last()
                    .map(|t| !t.key.is_empty() && !t.effect.is_empty())
                    .unwrap_or(true)
                {
                    doc.tolerations.push(Toleration::default());
                }
            }
        }
        "ports" => {
            if path.contains("containers") {
                // container ports handled in `field` (containerPort)
            } else {
                doc.service_ports.push(ServicePort {
                    protocol: "TCP".into(),
                    ..Default::default()
                });
            }
        }
        "rules" => {
            if key == "apiGroups" || key == "verbs" || key == "resources" {
                doc.rbac_rules.push(PolicyRule::default());
            } else if key == "host" || key == "http" {
                doc.ingress_rules.push(IngressRule::default());
            }
        }
        "paths" => {
            // A new path under the current ingress rule host: reuse the
            // rule when its path is still empty, otherwise clone the host.
            let host = doc
                .ingress_rules
                .last()
                .map(|r| r.host.clone())
                .unwrap_or_default();
            if doc
                .ingress_rules
                .last()
                .map(|r| !r.path.is_empty())
                .unwrap_or(true)
            {
                doc.ingress_rules.push(IngressRule {
                    host,
                    ..Default::default()
                });
            }
        }
        "subjects" => {
            if key == "kind" {
                doc.subjects.push(Subject::default());
            }
        }
        "listeners" => {
            if key == "name" {
                doc.listeners.push(GatewayListener::default());
            }
        }
        _ => {}
    }
}

/// A `- value` line (no colon) appended to the section's scalar list.
fn scalar_item(doc: &mut RawDoc, path: &str, value: &str) {
    let last = path.rsplit('.').next().unwrap_or("");
    match last {
        "accessModes" => doc.access_modes.push(value.into()),
        "policyTypes" => doc.policy_types.push(value.into()),
        "hostnames" => doc.hostnames.push(value.into()),
        "apiGroups" => {
            if let Some(r) = doc.rbac_rules.last_mut() {
                r.api_groups.push(value.into());
            }
        }
        "resources" => {
            if let Some(r) = doc.rbac_rules.last_mut() {
                r.resources.push(value.into());
            }
        }
        "verbs" => {
            if let Some(r) = doc.rbac_rules.last_mut() {
                r.verbs.push(value.into());
            }
        }
        "resourceNames" => {
            if let Some(r) = doc.rbac_rules.last_mut() {
                r.resource_names.push(value.into());
            }
        }
        "command" | "args" => {
            if let Some(c) = doc.containers.last_mut() {
                c.command.push(value.into());
            }
        }
        _ => {}
    }
}

fn field(doc: &mut RawDoc, path: &str, key: &str, value: &str) {
    // Inline flow lists on rule keys.
    if value.starts_with('[') {
        if let Some(r) = doc.rbac_rules.last_mut() {
            match key {
                "apiGroups" => r.api_groups = parse_inline_list(value),
                "resources" => r.resources = parse_inline_list(value),
                "verbs" => r.verbs = parse_inline_list(value),
                "resourceNames" => r.resource_names = parse_inline_list(value),
                _ => {}
            }
            if matches!(key, "apiGroups" | "resources" | "verbs" | "resourceNames") {
                return;
            }
        }
    }

    match path {
        "apiVersion" => doc.api_version = value.into(),
        "kind" => doc.kind = value.into(),
        "metadata.name" => doc.name = value.into(),
        "metadata.namespace" => doc.namespace = value.into(),
        "spec.replicas" => doc.replicas = value.parse().ok(),
        "spec.schedule" => doc.schedule = value.into(),
        "spec.suspend" => doc.suspend = value == "true",
        "spec.completions" => doc.completions = value.parse().ok(),
        "spec.type" => doc.service_type = value.into(),
        "spec.minReplicas" => doc.min_replicas = value.parse().ok(),
        "spec.maxReplicas" => doc.max_replicas = value.parse().ok(),
        "type" => doc.secret_type = value.into(),
        "provisioner" => doc.provisioner = value.into(),
        "reclaimPolicy" => doc.reclaim_policy = value.into(),
        "volumeBindingMode" => doc.binding_mode = value.into(),
        "value" => doc.value = value.parse().ok(),
        "globalDefault" => doc.global_default = value == "true",
        "description" => doc.description = value.into(),
        "spec.storageClassName" => doc.storage_class = value.into(),
        "spec.persistentVolumeReclaimPolicy" => doc.reclaim_policy = value.into(),
        "spec.capacity.storage" => doc.storage = value.into(),
        "spec.resources.requests.storage" => doc.storage = value.into(),
        "spec.hostPath.path" => doc.host_path = value.into(),
        "spec.ingressClassName" => doc.ingress_class = value.into(),
        "spec.controllerName" => doc.controller = value.into(),
        "spec.gatewayClassName" => doc.gateway_class = value.into(),
        "roleRef.kind" => doc.role_ref.kind = value.into(),
        "roleRef.name" => doc.role_ref.name = value.into(),
        _ => field_nested(doc, path, key, value),
    }
}

fn field_nested(doc: &mut RawDoc, path: &str, key: &str, value: &str) {
    // Container fields, wherever the containers list lives (Pod spec,
    // Deployment/Job/CronJob templates).
    if path.contains("containers") {
        if path.contains(".resources.") {
            if let Some(c) = doc.containers.last_mut() {
                let slot = if path.contains(".requests.") {
                    &mut c.requests
                } else {
                    &mut c.limits
                };
                match key {
                    "cpu" => slot.cpu = value.into(),
                    "memory" => slot.memory = value.into(),
                    _ => {}
                }
            }
            return;
        }
        if path.contains(".env.") || path.ends_with(".env") {
            if let Some(e) = doc.containers.last_mut().and_then(|c| c.env.last_mut()) {
                match key {
                    "name" if path.ends_with("env.name") => e.name = value.into(),
                    "value" => e.value = value.into(),
                    "name" if path.contains("configMapKeyRef") => {
                        e.value_from = format!("configMapKeyRef:{}:{}", value, keyref_key(&e.value_from))
                    }
                    "name" if path.contains("secretKeyRef") => {
                        e.value_from = format!("secretKeyRef:{}:{}", value, keyref_key(&e.value_from))
                    }
                    "key" if path.contains("configMapKeyRef") => {
                        e.value_from = set_keyref_key(&e.value_from, "configMapKeyRef", value)
                    }
                    "key" if path.contains("secretKeyRef") => {
                        e.value_from = set_keyref_key(&e.value_from, "secretKeyRef", value)
                    }
                    _ => {}
                }
            }
            return;
        }
        if path.contains("envFrom") {
            if let Some(c) = doc.containers.last_mut() {
                if key == "name" {
                    if path.contains("configMapRef") {
                        c.env_from.push(EnvFromSource {
                            kind: EnvFromKind::ConfigMap,
                            name: value.into(),
                        });
                    } else if path.contains("secretRef") {
                        c.env_from.push(EnvFromSource {
                            kind: EnvFromKind::Secret,
                            name: value.into(),
                        });
                    }
                }
            }
            return;
        }
        if path.contains("volumeMounts") {
            if let Some(m) = doc
                .containers
                .last_mut()
                .and_then(|c| c.volume_mounts.last_mut())
            {
                match key {
                    "name" => m.name = value.into(),
                    "mountPath" => m.mount_path = value.into(),
                    _ => {}
                }
            }
            return;
        }
        if let Some(c) = doc.containers.last_mut() {
            match key {
                "name" => c.name = value.into(),
                "image" => c.image = value.into(),
                "containerPort" => {
                    if let Ok(p) = value.parse() {
                        c.ports.push(p);
                    }
                }
                _ => {}
            }
        }
        return;
    }

    if path.contains("volumes") {
        if let Some(v) = doc.volumes.last_mut() {
            match key {
                "name" if path.ends_with("volumes.name") => v.name = value.into(),
                "name" if path.contains("configMap") => v.source = format!("configMap:{}", value),
                "secretName" => v.source = format!("secret:{}", value),
                "claimName" => v.source = format!("persistentVolumeClaim:{}", value),
                "path" if path.contains("hostPath") => v.source = format!("hostPath:{}", value),
                _ => {}
            }
        }
        return;
    }

    if path.contains("tolerations") {
        if let Some(t) = doc.tolerations.last_mut() {
            match key {
                "key" => t.key = value.into(),
                "effect" => t.effect = value.into(),
                _ => {}
            }
        }
        return;
    }

    if path.contains("subjects") {
        if let Some(s) = doc.subjects.last_mut() {
            match key {
                "kind" => s.kind = value.into(),
                "name" => s.name = value.into(),
                "namespace" => s.namespace = value.into(),
                _ => {}
            }
        }
        return;
    }

    if path.ends_with("metadata.labels") || path.contains("metadata.labels.") {
        if path.contains("template") {
            doc.template_labels.insert(key.into(), value.into());
        } else {
            doc.labels.insert(key.into(), value.into());
        }
        return;
    }
    if path.contains("metadata.annotations") {
        doc.annotations.insert(key.into(), value.into());
        return;
    }
    if path.contains("selector.matchLabels") {
        if path.contains("podSelector") {
            doc.pod_selector.insert(key.into(), value.into());
        } else {
            doc.selector.insert(key.into(), value.into());
        }
        return;
    }
    if path.starts_with("spec.selector.") {
        doc.selector_direct.insert(key.into(), value.into());
        return;
    }
    if path.contains("nodeSelector") {
        doc.node_selector.insert(key.into(), value.into());
        return;
    }
    if path.starts_with("data.") {
        doc.data.insert(key.into(), value.into());
        return;
    }
    if path.starts_with("stringData.") {
        doc.string_data.insert(key.into(), value.into());
        return;
    }
    if path.contains("hard") {
        doc.hard.insert(key.into(), value.into());
        return;
    }

    // Service ports.
    if path.contains("ports") && !path.contains("containers") {
        if let Some(p) = doc.service_ports.last_mut() {
            match key {
                "port" => p.port = value.parse().unwrap_or(0),
                "targetPort" => p.target_port = value.parse().unwrap_or(0),
                "nodePort" => p.node_port = value.parse().unwrap_or(0),
                "protocol" => p.protocol = value.into(),
                _ => {}
            }
        }
        return;
    }

    // Ingress rules.
    if path.contains("rules") && (key == "host" || path.contains("paths") || path.contains("backend")) {
        if doc.ingress_rules.is_empty() {
            doc.ingress_rules.push(IngressRule::default());
        }
        if let Some(r) = doc.ingress_rules.last_mut() {
            match key {
                "host" => r.host = value.into(),
                "path" => r.path = value.into(),
                "name" if path.contains("backend") => r.service = value.into(),
                "number" => r.port = value.parse().unwrap_or(0),
                _ => {}
            }
        }
        return;
    }

    // Gateway listeners / HTTPRoute refs.
    if path.contains("listeners") {
        if let Some(l) = doc.listeners.last_mut() {
            match key {
                "name" => l.name = value.into(),
                "port" => l.port = value.parse().unwrap_or(0),
                "protocol" => l.protocol = value.into(),
                _ => {}
            }
        }
        return;
    }
    if path.contains("parentRefs") && key == "name" {
        doc.parent_ref = value.into();
        return;
    }
    if path.contains("backendRefs") {
        match key {
            "name" => doc.backend_service = value.into(),
            "port" => doc.backend_port = value.parse().unwrap_or(0),
            _ => {}
        }
        return;
    }

    // HPA bits.
    if path.contains("scaleTargetRef") && key == "name" {
        doc.scale_target = value.into();
        return;
    }
    if key == "averageUtilization" {
        doc.target_cpu = value.parse().ok();
        return;
    }
    if path.contains("scaleDown") && key == "stabilizationWindowSeconds" {
        doc.stabilization_window = value.parse().ok();
        return;
    }

    // LimitRange defaults.
    if path.contains("limits") && path.contains("default") {
        match key {
            "cpu" => doc.default_cpu = value.into(),
            "memory" => doc.default_memory = value.into(),
            _ => {}
        }
        return;
    }

    match key {
        "serviceAccountName" => doc.service_account = value.into(),
        "priorityClassName" => doc.priority_class = value.into(),
        _ => {}
    }
}

fn keyref_key(existing: &str) -> String {
    existing.rsplit(':').next().unwrap_or("").to_string()
}

fn set_keyref_key(existing: &str, kind: &str, key: &str) -> String {
    let name = existing
        .split(':')
        .nth(1)
        .unwrap_or("")
        .to_string();
    format!("{}:{}:{}", kind, name, key)
}

// ---------------------------------------------------------------------------
// Apply / delete reconciliation
// ---------------------------------------------------------------------------

fn kind_display(kind: &str) -> String {
    match kind {
        "Pod" => "pod".into(),
        "Deployment" => "deployment.apps".into(),
        "Service" => "service".into(),
        "ConfigMap" => "configmap".into(),
        "Secret" => "secret".into(),
        "Namespace" => "namespace".into(),
        "Ingress" => "ingress.networking.k8s.io".into(),
        "NetworkPolicy" => "networkpolicy.networking.k8s.io".into(),
        "HorizontalPodAutoscaler" => "horizontalpodautoscaler.autoscaling".into(),
        "PersistentVolume" => "persistentvolume".into(),
        "PersistentVolumeClaim" => "persistentvolumeclaim".into(),
        "StorageClass" => "storageclass.storage.k8s.io".into(),
        "PriorityClass" => "priorityclass.scheduling.k8s.io".into(),
        "ServiceAccount" => "serviceaccount".into(),
        "Role" => "role.rbac.authorization.k8s.io".into(),
        "RoleBinding" => "rolebinding.rbac.authorization.k8s.io".into(),
        "ClusterRole" => "clusterrole.rbac.authorization.k8s.io".into(),
        "ClusterRoleBinding" => "clusterrolebinding.rbac.authorization.k8s.io".into(),
        "GatewayClass" => "gatewayclass.gateway.networking.k8s.io".into(),
        "Gateway" => "gateway.gateway.networking.k8s.io".into(),
        "HTTPRoute" => "httproute.gateway.networking.k8s.io".into(),
        "Job" => "job.batch".into(),
        "CronJob" => "cronjob.batch".into(),
        "DaemonSet" => "daemonset.apps".into(),
        "StatefulSet" => "statefulset.apps".into(),
        other => other.to_lowercase(),
    }
}

fn is_cluster_scoped(kind: &str) -> bool {
    matches!(
        kind,
        "Namespace"
            | "Node"
            | "PersistentVolume"
            | "StorageClass"
            | "ClusterRole"
            | "ClusterRoleBinding"
            | "PriorityClass"
            | "GatewayClass"
    )
}

/// Apply every document in `yaml` against the state. `default_ns` comes
/// from the command line (`-n`), falling back to "default".
pub fn apply(yaml: &str, default_ns: &str, state: &ClusterState) -> (String, ClusterState) {
    let docs = split_documents(yaml);
    if docs.is_empty() {
        return ("error: no objects passed to apply".into(), state.clone());
    }
    let mut next = state.clone();
    let mut lines = Vec::new();
    for doc_text in docs {
        let doc = parse_document(&doc_text);
        if doc.kind.is_empty() || doc.name.is_empty() {
            return (
                "error: unable to decode: Object 'Kind' or metadata.name is missing".into(),
                state.clone(),
            );
        }
        let ns = if is_cluster_scoped(&doc.kind) {
            String::new()
        } else if doc.namespace.is_empty() {
            default_ns.to_string()
        } else {
            doc.namespace.clone()
        };
        if !ns.is_empty() && !next.has_namespace(&ns) {
            return (
                format!("Error from server (NotFound): namespaces \"{}\" not found", ns),
                state.clone(),
            );
        }
        match apply_doc(&doc, &ns, &mut next) {
            Ok(line) => lines.push(line),
            Err(e) => return (e, state.clone()),
        }
    }
    (lines.join("\n"), next)
}

fn apply_doc(doc: &RawDoc, ns: &str, state: &mut ClusterState) -> Result<String, String> {
    let disp = kind_display(&doc.kind);
    let exists_line = |verdict: &str| format!("{}/{} {}", disp, doc.name, verdict);

    match doc.kind.as_str() {
        "Namespace" => {
            if state.has_namespace(&doc.name) {
                Ok(exists_line("unchanged"))
            } else {
                state.namespaces.push(doc.name.clone());
                Ok(exists_line("created"))
            }
        }
        "Pod" => {
            if let Some(i) = state
                .pods
                .iter()
                .position(|p| p.metadata.namespace == ns && p.metadata.name == doc.name)
            {
                let same = {
                    let p = &state.pods[i];
                    containers_equal(&p.spec.containers, &doc.containers)
                };
                if same {
                    return Ok(exists_line("unchanged"));
                }
                let mut spec = pod_spec_from(doc);
                if spec.containers.is_empty() {
                    spec.containers = state.pods[i].spec.containers.clone();
                }
                state.pods[i].spec = spec.clone();
                state.pods[i].status = sched::derive_status(state, ns, &spec);
                Ok(exists_line("configured"))
            } else {
                let spec = pod_spec_from(doc);
                sched::make_pod(state, &doc.name, ns, doc.labels.clone(), spec);
                Ok(exists_line("created"))
            }
        }
        "Deployment" => {
            let selector = if doc.selector.is_empty() {
                doc.template_labels.clone()
            } else {
                doc.selector.clone()
            };
            let template = PodTemplate {
                labels: if doc.template_labels.is_empty() {
                    selector.clone()
                } else {
                    doc.template_labels.clone()
                },
                spec: pod_spec_from(doc),
            };
            let replicas = doc.replicas.unwrap_or(1);
            if let Some(d) = state.deployment_mut(ns, &doc.name) {
                let unchanged = d.replicas == replicas
                    && containers_equal(&d.template.spec.containers, &template.spec.containers);
                d.replicas = replicas;
                d.selector = selector;
                d.template = template;
                let verdict = if unchanged { "unchanged" } else { "configured" };
                sched::reconcile_deployment(state, ns, &doc.name);
                Ok(exists_line(verdict))
            } else {
                let mut d = Deployment {
                    metadata: Metadata::new(&doc.name, ns),
                    replicas,
                    selector,
                    template,
                    strategy: "RollingUpdate".into(),
                };
                d.metadata.uid = state.new_uid();
                d.metadata.created_at = state.clock;
                d.metadata.labels = doc.labels.clone();
                state.deployments.push(d);
                state.record_event(ns, "Deployment", &doc.name, "ScalingReplicaSet", "Scaled up replica set");
                sched::reconcile_deployment(state, ns, &doc.name);
                Ok(exists_line("created"))
            }
        }
        "Service" => {
            let selector = if doc.selector_direct.is_empty() {
                doc.selector.clone()
            } else {
                doc.selector_direct.clone()
            };
            if let Some(i) = state
                .services
                .iter()
                .position(|s| s.metadata.namespace == ns && s.metadata.name == doc.name)
            {
                let same = state.services[i].selector == selector
                    && state.services[i].ports.len() == doc.service_ports.len();
                state.services[i].selector = selector;
                if !doc.service_ports.is_empty() {
                    state.services[i].ports = doc.service_ports.clone();
                }
                if !doc.service_type.is_empty() {
                    state.services[i].service_type = doc.service_type.clone();
                }
                Ok(exists_line(if same { "unchanged" } else { "configured" }))
            } else {
                let mut svc = Service {
                    metadata: Metadata::new(&doc.name, ns),
                    selector,
                    ports: doc.service_ports.clone(),
                    service_type: if doc.service_type.is_empty() {
                        "ClusterIP".into()
                    } else {
                        doc.service_type.clone()
                    },
                    cluster_ip: String::new(),
                };
                svc.metadata.uid = state.new_uid();
                svc.metadata.created_at = state.clock;
                svc.cluster_ip = synth_cluster_ip(state);
                state.services.push(svc);
                Ok(exists_line("created"))
            }
        }
        // ConfigMap and Secret always report "configured" on update, even
        // when the data is identical. Preserved behavior.
        "ConfigMap" => {
            if let Some(i) = state
                .config_maps
                .iter()
                .position(|c| c.metadata.namespace == ns && c.metadata.name == doc.name)
            {
                state.config_maps[i].data = doc.data.clone();
                Ok(exists_line("configured"))
            } else {
                let mut cm = ConfigMap {
                    metadata: Metadata::new(&doc.name, ns),
                    data: doc.data.clone(),
                };
                cm.metadata.uid = state.new_uid();
                cm.metadata.created_at = state.clock;
                state.config_maps.push(cm);
                Ok(exists_line("created"))
            }
        }
        "Secret" => {
            let mut data = doc.data.clone();
            for (k, v) in &doc.string_data {
                data.insert(k.clone(), crate::b64_encode(v));
            }
            if let Some(i) = state
                .secrets
                .iter()
                .position(|s| s.metadata.namespace == ns && s.metadata.name == doc.name)
            {
                state.secrets[i].data = data;
                Ok(exists_line("configured"))
            } else {
                let mut sec = Secret {
                    metadata: Metadata::new(&doc.name, ns),
                    secret_type: if doc.secret_type.is_empty() {
                        "Opaque".into()
                    } else {
                        doc.secret_type.clone()
                    },
                    data,
                };
                sec.metadata.uid = state.new_uid();
                sec.metadata.created_at = state.clock;
                state.secrets.push(sec);
                Ok(exists_line("created"))
            }
        }
        "HorizontalPodAutoscaler" => {
            if let Some(h) = state
                .hpas
                .iter_mut()
                .find(|h| h.metadata.namespace == ns && h.metadata.name == doc.name)
            {
                if let Some(m) = doc.min_replicas {
                    h.min_replicas = m;
                }
                if let Some(m) = doc.max_replicas {
                    h.max_replicas = m;
                }
                if let Some(t) = doc.target_cpu {
                    h.target_cpu = t;
                }
                if let Some(w) = doc.stabilization_window {
                    h.scale_down_stabilization = w;
                }
                Ok(exists_line("configured"))
            } else {
                let mut h = Hpa {
                    metadata: Metadata::new(&doc.name, ns),
                    target: doc.scale_target.clone(),
                    min_replicas: doc.min_replicas.unwrap_or(1),
                    max_replicas: doc.max_replicas.unwrap_or(10),
                    target_cpu: doc.target_cpu.unwrap_or(80),
                    current_cpu: 0,
                    scale_down_stabilization: doc.stabilization_window.unwrap_or(300),
                };
                h.metadata.uid = state.new_uid();
                h.metadata.created_at = state.clock;
                state.hpas.push(h);
                Ok(exists_line("created"))
            }
        }
        // PVC/PV/StorageClass report "unchanged" unconditionally when the
        // object exists. Preserved behavior.
        "PersistentVolumeClaim" => {
            if state
                .pvcs
                .iter()
                .any(|p| p.metadata.namespace == ns && p.metadata.name == doc.name)
            {
                return Ok(exists_line("unchanged"));
            }
            let mut pvc = Pvc {
                metadata: Metadata::new(&doc.name, ns),
                request: doc.storage.clone(),
                access_modes: doc.access_modes.clone(),
                storage_class: if doc.storage_class.is_empty() {
                    "standard".into()
                } else {
                    doc.storage_class.clone()
                },
                status: "Pending".into(),
                volume_name: String::new(),
            };
            pvc.metadata.uid = state.new_uid();
            pvc.metadata.created_at = state.clock;
            bind_pvc(state, &mut pvc);
            state.pvcs.push(pvc);
            Ok(exists_line("created"))
        }
        "PersistentVolume" => {
            if state.persistent_volumes.iter().any(|p| p.metadata.name == doc.name) {
                return Ok(exists_line("unchanged"));
            }
            let mut pv = PersistentVolume {
                metadata: Metadata::new(&doc.name, ""),
                capacity: doc.storage.clone(),
                access_modes: doc.access_modes.clone(),
                reclaim_policy: if doc.reclaim_policy.is_empty() {
                    "Retain".into()
                } else {
                    doc.reclaim_policy.clone()
                },
                storage_class: doc.storage_class.clone(),
                host_path: doc.host_path.clone(),
                status: "Available".into(),
                claim_ref: String::new(),
            };
            pv.metadata.uid = state.new_uid();
            pv.metadata.created_at = state.clock;
            state.persistent_volumes.push(pv);
            Ok(exists_line("created"))
        }
        "StorageClass" => {
            if state.storage_classes.iter().any(|c| c.metadata.name == doc.name) {
                return Ok(exists_line("unchanged"));
            }
            let mut sc = StorageClass {
                metadata: Metadata::new(&doc.name, ""),
                provisioner: doc.provisioner.clone(),
                reclaim_policy: if doc.reclaim_policy.is_empty() {
                    "Delete".into()
                } else {
                    doc.reclaim_policy.clone()
                },
                binding_mode: if doc.binding_mode.is_empty() {
                    "Immediate".into()
                } else {
                    doc.binding_mode.clone()
                },
                is_default: doc
                    .annotations
                    .get("storageclass.kubernetes.io/is-default-class")
                    .map(|v| v == "true")
                    .unwrap_or(false),
            };
            sc.metadata.uid = state.new_uid();
            sc.metadata.created_at = state.clock;
            state.storage_classes.push(sc);
            Ok(exists_line("created"))
        }
        "PriorityClass" => {
            if let Some(pc) = state
                .priority_classes
                .iter_mut()
                .find(|c| c.metadata.name == doc.name)
            {
                if let Some(v) = doc.value {
                    pc.value = v;
                }
                Ok(exists_line("configured"))
            } else {
                let mut pc = PriorityClass {
                    metadata: Metadata::new(&doc.name, ""),
                    value: doc.value.unwrap_or(0),
                    global_default: doc.global_default,
                    description: doc.description.clone(),
                };
                pc.metadata.uid = state.new_uid();
                pc.metadata.created_at = state.clock;
                state.priority_classes.push(pc);
                Ok(exists_line("created"))
            }
        }
        "ServiceAccount" => {
            if state
                .service_accounts
                .iter()
                .any(|s| s.metadata.namespace == ns && s.metadata.name == doc.name)
            {
                return Ok(exists_line("unchanged"));
            }
            let mut sa = ServiceAccount {
                metadata: Metadata::new(&doc.name, ns),
            };
            sa.metadata.uid = state.new_uid();
            sa.metadata.created_at = state.clock;
            state.service_accounts.push(sa);
            Ok(exists_line("created"))
        }
        "Role" => {
            if let Some(r) = state
                .roles
                .iter_mut()
                .find(|r| r.metadata.namespace == ns && r.metadata.name == doc.name)
            {
                r.rules = doc.rbac_rules.clone();
                Ok(exists_line("configured"))
            } else {
                let mut r = Role {
                    metadata: Metadata::new(&doc.name, ns),
                    rules: doc.rbac_rules.clone(),
                };
                r.metadata.uid = state.new_uid();
                r.metadata.created_at = state.clock;
                state.roles.push(r);
                Ok(exists_line("created"))
            }
        }
        "ClusterRole" => {
            if let Some(r) = state
                .cluster_roles
                .iter_mut()
                .find(|r| r.metadata.name == doc.name)
            {
                r.rules = doc.rbac_rules.clone();
                Ok(exists_line("configured"))
            } else {
                let mut r = ClusterRole {
                    metadata: Metadata::new(&doc.name, ""),
                    rules: doc.rbac_rules.clone(),
                };
                r.metadata.uid = state.new_uid();
                r.metadata.created_at = state.clock;
                state.cluster_roles.push(r);
                Ok(exists_line("created"))
            }
        }
        "RoleBinding" => {
            if let Some(b) = state
                .role_bindings
                .iter_mut()
                .find(|b| b.metadata.namespace == ns && b.metadata.name == doc.name)
            {
                b.subjects = doc.subjects.clone();
                b.role_ref = doc.role_ref.clone();
                Ok(exists_line("configured"))
            } else {
                let mut b = RoleBinding {
                    metadata: Metadata::new(&doc.name, ns),
                    subjects: doc.subjects.clone(),
                    role_ref: doc.role_ref.clone(),
                };
                b.metadata.uid = state.new_uid();
                b.metadata.created_at = state.clock;
                state.role_bindings.push(b);
                Ok(exists_line("created"))
            }
        }
        "ClusterRoleBinding" => {
            if let Some(b) = state
                .cluster_role_bindings
                .iter_mut()
                .find(|b| b.metadata.name == doc.name)
            {
                b.subjects = doc.subjects.clone();
                b.role_ref = doc.role_ref.clone();
                Ok(exists_line("configured"))
            } else {
                let mut b = ClusterRoleBinding {
                    metadata: Metadata::new(&doc.name, ""),
                    subjects: doc.subjects.clone(),
                    role_ref: doc.role_ref.clone(),
                };
                b.metadata.uid = state.new_uid();
                b.metadata.created_at = state.clock;
                state.cluster_role_bindings.push(b);
                Ok(exists_line("created"))
            }
        }
        "NetworkPolicy" => {
            if state
                .network_policies
                .iter()
                .any(|n| n.metadata.namespace == ns && n.metadata.name == doc.name)
            {
                return Ok(exists_line("configured"));
            }
            let mut np = NetworkPolicy {
                metadata: Metadata::new(&doc.name, ns),
                pod_selector: doc.pod_selector.clone(),
                policy_types: doc.policy_types.clone(),
            };
            np.metadata.uid = state.new_uid();
            np.metadata.created_at = state.clock;
            state.network_policies.push(np);
            Ok(exists_line("created"))
        }
        "Ingress" => {
            if let Some(i) = state
                .ingresses
                .iter_mut()
                .find(|i| i.metadata.namespace == ns && i.metadata.name == doc.name)
            {
                i.rules = doc.ingress_rules.clone();
                Ok(exists_line("configured"))
            } else {
                let mut ing = Ingress {
                    metadata: Metadata::new(&doc.name, ns),
                    class_name: doc.ingress_class.clone(),
                    rules: doc.ingress_rules.clone(),
                };
                ing.metadata.uid = state.new_uid();
                ing.metadata.created_at = state.clock;
                state.ingresses.push(ing);
                Ok(exists_line("created"))
            }
        }
        "GatewayClass" => {
            if state.gateway_classes.iter().any(|g| g.metadata.name == doc.name) {
                return Ok(exists_line("unchanged"));
            }
            let mut gc = GatewayClass {
                metadata: Metadata::new(&doc.name, ""),
                controller: doc.controller.clone(),
            };
            gc.metadata.uid = state.new_uid();
            gc.metadata.created_at = state.clock;
            state.gateway_classes.push(gc);
            Ok(exists_line("created"))
        }
        "Gateway" => {
            if state
                .gateways
                .iter()
                .any(|g| g.metadata.namespace == ns && g.metadata.name == doc.name)
            {
                return Ok(exists_line("configured"));
            }
            let mut gw = Gateway {
                metadata: Metadata::new(&doc.name, ns),
                class_name: doc.gateway_class.clone(),
                listeners: doc.listeners.clone(),
            };
            gw.metadata.uid = state.new_uid();
            gw.metadata.created_at = state.clock;
            state.gateways.push(gw);
            Ok(exists_line("created"))
        }
        "HTTPRoute" => {
            if state
                .http_routes
                .iter()
                .any(|r| r.metadata.namespace == ns && r.metadata.name == doc.name)
            {
                return Ok(exists_line("configured"));
            }
            let mut route = HttpRoute {
                metadata: Metadata::new(&doc.name, ns),
                parent: doc.parent_ref.clone(),
                hostnames: doc.hostnames.clone(),
                backend: format!("{}:{}", doc.backend_service, doc.backend_port),
            };
            route.metadata.uid = state.new_uid();
            route.metadata.created_at = state.clock;
            state.http_routes.push(route);
            Ok(exists_line("created"))
        }
        "ResourceQuota" => {
            if let Some(q) = state
                .resource_quotas
                .iter_mut()
                .find(|q| q.metadata.namespace == ns && q.metadata.name == doc.name)
            {
                q.hard = doc.hard.clone();
                Ok(exists_line("configured"))
            } else {
                let mut q = ResourceQuota {
                    metadata: Metadata::new(&doc.name, ns),
                    hard: doc.hard.clone(),
                };
                q.metadata.uid = state.new_uid();
                q.metadata.created_at = state.clock;
                state.resource_quotas.push(q);
                Ok(exists_line("created"))
            }
        }
        "LimitRange" => {
            if state
                .limit_ranges
                .iter()
                .any(|l| l.metadata.namespace == ns && l.metadata.name == doc.name)
            {
                return Ok(exists_line("configured"));
            }
            let mut lr = LimitRange {
                metadata: Metadata::new(&doc.name, ns),
                default_cpu: doc.default_cpu.clone(),
                default_memory: doc.default_memory.clone(),
                default_request_cpu: String::new(),
                default_request_memory: String::new(),
            };
            lr.metadata.uid = state.new_uid();
            lr.metadata.created_at = state.clock;
            state.limit_ranges.push(lr);
            Ok(exists_line("created"))
        }
        "Job" => {
            if state
                .jobs
                .iter()
                .any(|j| j.metadata.namespace == ns && j.metadata.name == doc.name)
            {
                return Ok(exists_line("unchanged"));
            }
            let image = doc
                .containers
                .first()
                .map(|c| c.image.clone())
                .unwrap_or_default();
            let command = doc
                .containers
                .first()
                .map(|c| c.command.clone())
                .unwrap_or_default();
            let completions = doc.completions.unwrap_or(1);
            let mut j = Job {
                metadata: Metadata::new(&doc.name, ns),
                image: image.clone(),
                command,
                completions,
                succeeded: completions,
            };
            j.metadata.uid = state.new_uid();
            j.metadata.created_at = state.clock;
            state.jobs.push(j);
            let suffix = state.rand_suffix(5);
            let pod_name = format!("{}-{}", doc.name, suffix);
            let mut labels = BTreeMap::new();
            labels.insert("job-name".into(), doc.name.clone());
            let spec = pod_spec_from(doc);
            sched::make_pod(state, &pod_name, ns, labels, spec);
            if let Some(p) = state
                .pods
                .iter_mut()
                .find(|p| p.metadata.namespace == ns && p.metadata.name == pod_name)
            {
                if matches!(p.status.phase, PodPhase::Running) {
                    p.status.phase = PodPhase::Completed;
                }
            }
            Ok(exists_line("created"))
        }
        "CronJob" => {
            if state
                .cron_jobs
                .iter()
                .any(|c| c.metadata.namespace == ns && c.metadata.name == doc.name)
            {
                return Ok(exists_line("configured"));
            }
            let mut cj = CronJob {
                metadata: Metadata::new(&doc.name, ns),
                schedule: doc.schedule.clone(),
                image: doc
                    .containers
                    .first()
                    .map(|c| c.image.clone())
                    .unwrap_or_default(),
                command: doc
                    .containers
                    .first()
                    .map(|c| c.command.clone())
                    .unwrap_or_default(),
                suspend: doc.suspend,
            };
            cj.metadata.uid = state.new_uid();
            cj.metadata.created_at = state.clock;
            state.cron_jobs.push(cj);
            Ok(exists_line("created"))
        }
        "DaemonSet" => {
            if state
                .daemon_sets
                .iter()
                .any(|d| d.metadata.namespace == ns && d.metadata.name == doc.name)
            {
                return Ok(exists_line("configured"));
            }
            let selector = if doc.selector.is_empty() {
                doc.template_labels.clone()
            } else {
                doc.selector.clone()
            };
            let mut ds = DaemonSet {
                metadata: Metadata::new(&doc.name, ns),
                selector: selector.clone(),
                image: doc
                    .containers
                    .first()
                    .map(|c| c.image.clone())
                    .unwrap_or_default(),
            };
            ds.metadata.uid = state.new_uid();
            ds.metadata.created_at = state.clock;
            state.daemon_sets.push(ds);
            // One pod per schedulable node.
            let nodes: Vec<String> = state
                .nodes
                .iter()
                .filter(|n| n.schedulable())
                .map(|n| n.metadata.name.clone())
                .collect();
            for node in nodes {
                let suffix = state.rand_suffix(5);
                let pod_name = format!("{}-{}", doc.name, suffix);
                let mut labels = selector.clone();
                if labels.is_empty() {
                    labels.insert("name".into(), doc.name.clone());
                }
                let spec = pod_spec_from(doc);
                sched::make_pod(state, &pod_name, ns, labels, spec);
                if let Some(p) = state
                    .pods
                    .iter_mut()
                    .find(|p| p.metadata.namespace == ns && p.metadata.name == pod_name)
                {
                    p.status.node = Some(node);
                }
            }
            Ok(exists_line("created"))
        }
        "StatefulSet" => {
            if state
                .stateful_sets
                .iter()
                .any(|s| s.metadata.namespace == ns && s.metadata.name == doc.name)
            {
                return Ok(exists_line("configured"));
            }
            let selector = if doc.selector.is_empty() {
                doc.template_labels.clone()
            } else {
                doc.selector.clone()
            };
            let replicas = doc.replicas.unwrap_or(1);
            let mut ss = StatefulSet {
                metadata: Metadata::new(&doc.name, ns),
                replicas,
                selector: selector.clone(),
                image: doc
                    .containers
                    .first()
                    .map(|c| c.image.clone())
                    .unwrap_or_default(),
                service_name: String::new(),
            };
            ss.metadata.uid = state.new_uid();
            ss.metadata.created_at = state.clock;
            state.stateful_sets.push(ss);
            for i in 0..replicas {
                let pod_name = format!("{}-{}", doc.name, i);
                let mut labels = selector.clone();
                if labels.is_empty() {
                    labels.insert("app".into(), doc.name.clone());
                }
                let spec = pod_spec_from(doc);
                sched::make_pod(state, &pod_name, ns, labels, spec);
            }
            Ok(exists_line("created"))
        }
        other => Err(format!(
            "error: unable to recognize: no matches for kind \"{}\"",
            other
        )),
    }
}

fn containers_equal(a: &[ContainerSpec], b: &[ContainerSpec]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| {
        x.image == y.image
            && x.env.len() == y.env.len()
            && x.env
                .iter()
                .zip(y.env.iter())
                .all(|(e, f)| e.name == f.name && e.value == f.value)
            && x.requests.cpu == y.requests.cpu
            && x.requests.memory == y.requests.memory
            && x.ports == y.ports
    })
}

pub fn pod_spec_from(doc: &RawDoc) -> PodSpec {
    PodSpec {
        containers: doc.containers.clone(),
        node_selector: doc.node_selector.clone(),
        service_account: doc.service_account.clone(),
        priority_class: doc.priority_class.clone(),
        tolerations: doc.tolerations.clone(),
        volumes: doc.volumes.clone(),
    }
}

fn synth_cluster_ip(state: &mut ClusterState) -> String {
    let r = state.next_rand();
    format!("10.{}.{}.{}", 96 + (r % 8), (r >> 8) % 256, 2 + (r >> 16) % 250)
}

/// Bind a new claim to the first Available PV with matching class and
/// sufficient capacity. WaitForFirstConsumer classes stay Pending.
fn bind_pvc(state: &mut ClusterState, pvc: &mut Pvc) {
    let binding_mode = state
        .storage_classes
        .iter()
        .find(|c| c.metadata.name == pvc.storage_class)
        .map(|c| c.binding_mode.clone())
        .unwrap_or_else(|| "Immediate".into());
    if binding_mode == "WaitForFirstConsumer" {
        return;
    }
    let want = sched::parse_memory(&pvc.request);
    if let Some(pv) = state.persistent_volumes.iter_mut().find(|pv| {
        pv.status == "Available"
            && (pv.storage_class == pvc.storage_class || pv.storage_class.is_empty())
            && sched::parse_memory(&pv.capacity) >= want
    }) {
        pv.status = "Bound".into();
        pv.claim_ref = format!("{}/{}", pvc.metadata.namespace, pvc.metadata.name);
        pvc.status = "Bound".into();
        pvc.volume_name = pv.metadata.name.clone();
    }
}

/// `kubectl delete -f`: only kind/name/namespace are read from the text.
pub fn delete(yaml: &str, default_ns: &str, state: &ClusterState) -> (String, ClusterState) {
    let docs = split_documents(yaml);
    if docs.is_empty() {
        return ("error: no objects passed to delete".into(), state.clone());
    }
    let mut next = state.clone();
    let mut lines = Vec::new();
    for doc_text in docs {
        let doc = parse_document(&doc_text);
        let ns = if is_cluster_scoped(&doc.kind) {
            String::new()
        } else if doc.namespace.is_empty() {
            default_ns.to_string()
        } else {
            doc.namespace.clone()
        };
        match delete_resource(&doc.kind, &doc.name, &ns, &mut next) {
            Ok(()) => lines.push(format!("{} \"{}\" deleted", kind_display(&doc.kind), doc.name)),
            Err(e) => return (e, state.clone()),
        }
    }
    (lines.join("\n"), next)
}

/// Remove one resource, cascading to owned pods for workload kinds.
pub fn delete_resource(
    kind: &str,
    name: &str,
    ns: &str,
    state: &mut ClusterState,
) -> Result<(), String> {
    let missing = |kind_disp: &str| {
        Err(format!(
            "Error from server (NotFound): {} \"{}\" not found",
            kind_disp, name
        ))
    };
    macro_rules! remove_from {
        ($coll:expr, $namespaced:expr, $disp:expr) => {{
            let before = $coll.len();
            if $namespaced {
                $coll.retain(|r| !(r.metadata.namespace == ns && r.metadata.name == name));
            } else {
                $coll.retain(|r| r.metadata.name != name);
            }
            if $coll.len() == before {
                return missing($disp);
            }
            Ok(())
        }};
    }

    match kind {
        "Pod" => remove_from!(state.pods, true, "pods"),
        "Deployment" => {
            let Some(d) = state.deployment(ns, name).cloned() else {
                return missing("deployments.apps");
            };
            let owned = state.owned_pods(&d);
            let names: Vec<String> = owned
                .iter()
                .map(|&i| state.pods[i].metadata.name.clone())
                .collect();
            state
                .pods
                .retain(|p| !(p.metadata.namespace == ns && names.contains(&p.metadata.name)));
            state
                .deployments
                .retain(|r| !(r.metadata.namespace == ns && r.metadata.name == name));
            Ok(())
        }
        "Service" => remove_from!(state.services, true, "services"),
        "ConfigMap" => remove_from!(state.config_maps, true, "configmaps"),
        "Secret" => remove_from!(state.secrets, true, "secrets"),
        "Namespace" => {
            if !state.has_namespace(name) {
                return missing("namespaces");
            }
            if name == "default" || name.starts_with("kube-") {
                return Err(format!("Error from server (Forbidden): namespaces \"{}\" is forbidden: this namespace may not be deleted", name));
            }
            state.namespaces.retain(|n| n != name);
            state.pods.retain(|p| p.metadata.namespace != name);
            state.deployments.retain(|d| d.metadata.namespace != name);
            state.services.retain(|s| s.metadata.namespace != name);
            state.config_maps.retain(|c| c.metadata.namespace != name);
            state.secrets.retain(|s| s.metadata.namespace != name);
            Ok(())
        }
        "HorizontalPodAutoscaler" => {
            remove_from!(state.hpas, true, "horizontalpodautoscalers.autoscaling")
        }
        "Job" => {
            let r = remove_from!(state.jobs, true, "jobs.batch");
            if r.is_ok() {
                state.pods.retain(|p| {
                    !(p.metadata.namespace == ns
                        && p.metadata.labels.get("job-name") == Some(&name.to_string()))
                });
            }
            r
        }
        "CronJob" => remove_from!(state.cron_jobs, true, "cronjobs.batch"),
        "DaemonSet" => {
            let Some(ds) = state
                .daemon_sets
                .iter()
                .find(|d| d.metadata.namespace == ns && d.metadata.name == name)
                .cloned()
            else {
                return missing("daemonsets.apps");
            };
            state.pods.retain(|p| {
                !(p.metadata.namespace == ns && labels_match(&ds.selector, &p.metadata.labels))
            });
            state
                .daemon_sets
                .retain(|d| !(d.metadata.namespace == ns && d.metadata.name == name));
            Ok(())
        }
        "StatefulSet" => {
            let Some(ss) = state
                .stateful_sets
                .iter()
                .find(|s| s.metadata.namespace == ns && s.metadata.name == name)
                .cloned()
            else {
                return missing("statefulsets.apps");
            };
            state.pods.retain(|p| {
                !(p.metadata.namespace == ns && labels_match(&ss.selector, &p.metadata.labels))
            });
            state
                .stateful_sets
                .retain(|s| !(s.metadata.namespace == ns && s.metadata.name == name));
            Ok(())
        }
        "Role" => remove_from!(state.roles, true, "roles.rbac.authorization.k8s.io"),
        "RoleBinding" => remove_from!(
            state.role_bindings,
            true,
            "rolebindings.rbac.authorization.k8s.io"
        ),
        "ClusterRole" => remove_from!(
            state.cluster_roles,
            false,
            "clusterroles.rbac.authorization.k8s.io"
        ),
        "ClusterRoleBinding" => remove_from!(
            state.cluster_role_bindings,
            false,
            "clusterrolebindings.rbac.authorization.k8s.io"
        ),
        "ServiceAccount" => remove_from!(state.service_accounts, true, "serviceaccounts"),
        "StorageClass" => remove_from!(state.storage_classes, false, "storageclasses.storage.k8s.io"),
        "PersistentVolume" => remove_from!(state.persistent_volumes, false, "persistentvolumes"),
        "PersistentVolumeClaim" => remove_from!(state.pvcs, true, "persistentvolumeclaims"),
        "NetworkPolicy" => remove_from!(
            state.network_policies,
            true,
            "networkpolicies.networking.k8s.io"
        ),
        "Ingress" => remove_from!(state.ingresses, true, "ingresses.networking.k8s.io"),
        "GatewayClass" => remove_from!(
            state.gateway_classes,
            false,
            "gatewayclasses.gateway.networking.k8s.io"
        ),
        "Gateway" => remove_from!(state.gateways, true, "gateways.gateway.networking.k8s.io"),
        "HTTPRoute" => remove_from!(state.http_routes, true, "httproutes.gateway.networking.k8s.io"),
        "PriorityClass" => remove_from!(
            state.priority_classes,
            false,
            "priorityclasses.scheduling.k8s.io"
        ),
        "ResourceQuota" => remove_from!(state.resource_quotas, true, "resourcequotas"),
        "LimitRange" => remove_from!(state.limit_ranges, true, "limitranges"),
        other => Err(format!(
            "error: the server doesn't have a resource type \"{}\"",
            other.to_lowercase()
        )),
    }
}

/// Fields `kubectl edit` extracts from an edited Deployment rendering.
#[derive(Default)]
pub struct DeploymentEdit {
    pub replicas: Option<u32>,
    pub image: Option<String>,
    pub env: Vec<EnvVar>,
    pub ports: Vec<u16>,
    pub requests: ResourceAmounts,
    pub limits: ResourceAmounts,
    pub priority_class: String,
}

/// Parse edited Deployment text. Distinct from `apply` on purpose: only
/// the fields the simulator reconciles are honored, everything else in
/// the buffer is ignored.
pub fn parse_deployment_edit(text: &str) -> DeploymentEdit {
    let doc = parse_document(text);
    let mut edit = DeploymentEdit {
        replicas: doc.replicas,
        priority_class: doc.priority_class.clone(),
        ..Default::default()
    };
    if let Some(c) = doc.containers.first() {
        if !c.image.is_empty() {
            edit.image = Some(c.image.clone());
        }
        edit.env = c.env.clone();
        edit.ports = c.ports.clone();
        edit.requests = c.requests.clone();
        edit.limits = c.limits.clone();
    }
    edit
}

/// Fields `kubectl edit` extracts from an edited HPA rendering.
#[derive(Default)]
pub struct HpaEdit {
    pub min_replicas: Option<u32>,
    pub max_replicas: Option<u32>,
    pub stabilization_window: Option<u32>,
}

pub fn parse_hpa_edit(text: &str) -> HpaEdit {
    let doc = parse_document(text);
    HpaEdit {
        min_replicas: doc.min_replicas,
        max_replicas: doc.max_replicas,
        stabilization_window: doc.stabilization_window,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::initial_cluster_state;

    const DEPLOY: &str = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n  labels:\n    app: web\nspec:\n  replicas: 3\n  selector:\n    matchLabels:\n      app: web\n  template:\n    metadata:\n      labels:\n        app: web\n    spec:\n      containers:\n      - name: web\n        image: nginx:1.25\n        ports:\n        - containerPort: 80\n        env:\n        - name: MODE\n          value: production\n        resources:\n          requests:\n            cpu: 100m\n            memory: 128Mi\n";

    #[test]
    fn test_parse_deployment_fields() {
        let doc = parse_document(DEPLOY);
        assert_eq!(doc.kind, "Deployment");
        assert_eq!(doc.name, "web");
        assert_eq!(doc.replicas, Some(3));
        assert_eq!(doc.selector.get("app"), Some(&"web".to_string()));
        assert_eq!(doc.template_labels.get("app"), Some(&"web".to_string()));
        assert_eq!(doc.containers.len(), 1);
        let c = &doc.containers[0];
        assert_eq!(c.image, "nginx:1.25");
        assert_eq!(c.ports, vec![80]);
        assert_eq!(c.env[0].name, "MODE");
        assert_eq!(c.env[0].value, "production");
        assert_eq!(c.requests.cpu, "100m");
        assert_eq!(c.requests.memory, "128Mi");
    }

    #[test]
    fn test_status_block_ignored() {
        let text = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: x\nstatus:\n  phase: Running\n  conditions:\n  - type: Ready\nspec:\n  containers:\n  - name: c\n    image: nginx\n";
        let doc = parse_document(text);
        assert_eq!(doc.name, "x");
        assert_eq!(doc.containers.len(), 1);
    }

    #[test]
    fn test_role_inline_and_block_lists() {
        let text = "apiVersion: rbac.authorization.k8s.io/v1\nkind: Role\nmetadata:\n  name: pod-reader\n  namespace: default\nrules:\n- apiGroups: [\"\"]\n  resources: [\"pods\"]\n  verbs:\n  - get\n  - list\n";
        let doc = parse_document(text);
        assert_eq!(doc.rbac_rules.len(), 1);
        let r = &doc.rbac_rules[0];
        assert_eq!(r.api_groups, vec![""]);
        assert_eq!(r.resources, vec!["pods"]);
        assert_eq!(r.verbs, vec!["get", "list"]);
    }

    #[test]
    fn test_apply_creates_deployment_and_pods() {
        let state = initial_cluster_state();
        let (out, next) = apply(DEPLOY, "default", &state);
        assert_eq!(out, "deployment.apps/web created");
        let d = next.deployment("default", "web").unwrap().clone();
        assert_eq!(next.owned_pods(&d).len(), 3);
    }

    #[test]
    fn test_apply_unchanged_then_configured() {
        let state = initial_cluster_state();
        let (_, s1) = apply(DEPLOY, "default", &state);
        let (out2, s2) = apply(DEPLOY, "default", &s1);
        assert_eq!(out2, "deployment.apps/web unchanged");
        let bumped = DEPLOY.replace("replicas: 3", "replicas: 1");
        let (out3, s3) = apply(&bumped, "default", &s2);
        assert_eq!(out3, "deployment.apps/web configured");
        let d = s3.deployment("default", "web").unwrap().clone();
        assert_eq!(s3.owned_pods(&d).len(), 1);
    }

    #[test]
    fn test_configmap_always_configured() {
        let state = initial_cluster_state();
        let cm = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: app-config\ndata:\n  key: value\n";
        let (out1, s1) = apply(cm, "default", &state);
        assert_eq!(out1, "configmap/app-config created");
        let (out2, _) = apply(cm, "default", &s1);
        assert_eq!(out2, "configmap/app-config configured");
    }

    #[test]
    fn test_pvc_unchanged_unconditionally() {
        let state = initial_cluster_state();
        let pvc = "apiVersion: v1\nkind: PersistentVolumeClaim\nmetadata:\n  name: data\nspec:\n  storageClassName: standard\n  accessModes:\n  - ReadWriteOnce\n  resources:\n    requests:\n      storage: 1Gi\n";
        let (out1, s1) = apply(pvc, "default", &state);
        assert_eq!(out1, "persistentvolumeclaim/data created");
        let (out2, _) = apply(pvc, "default", &s1);
        assert_eq!(out2, "persistentvolumeclaim/data unchanged");
    }

    #[test]
    fn test_pv_binding() {
        let state = initial_cluster_state();
        let pv = "apiVersion: v1\nkind: PersistentVolume\nmetadata:\n  name: pv-data\nspec:\n  storageClassName: manual\n  capacity:\n    storage: 5Gi\n  accessModes:\n  - ReadWriteOnce\n  hostPath:\n    path: /mnt/data\n";
        let (_, s1) = apply(pv, "default", &state);
        let pvc = "apiVersion: v1\nkind: PersistentVolumeClaim\nmetadata:\n  name: data\nspec:\n  storageClassName: manual\n  accessModes:\n  - ReadWriteOnce\n  resources:\n    requests:\n      storage: 1Gi\n";
        let (_, s2) = apply(pvc, "default", &s1);
        let claim = s2.pvcs.iter().find(|p| p.metadata.name == "data").unwrap();
        assert_eq!(claim.status, "Bound");
        assert_eq!(claim.volume_name, "pv-data");
        assert_eq!(s2.persistent_volumes[0].status, "Bound");
    }

    #[test]
    fn test_delete_deployment_cascades() {
        let state = initial_cluster_state();
        let (_, s1) = apply(DEPLOY, "default", &state);
        let (out, s2) = delete(DEPLOY, "default", &s1);
        assert_eq!(out, "deployment.apps \"web\" deleted");
        assert!(s2.deployment("default", "web").is_none());
        assert!(!s2.pods.iter().any(|p| p.metadata.name.starts_with("web-")));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let state = initial_cluster_state();
        let (out, next) = delete(
            "apiVersion: v1\nkind: Pod\nmetadata:\n  name: ghost\n",
            "default",
            &state,
        );
        assert!(out.contains("NotFound"));
        assert_eq!(next.pods.len(), state.pods.len());
    }

    #[test]
    fn test_unknown_namespace_rejected() {
        let state = initial_cluster_state();
        let text = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: x\n  namespace: nope\nspec:\n  containers:\n  - name: c\n    image: nginx\n";
        let (out, next) = apply(text, "default", &state);
        assert!(out.contains("namespaces \"nope\" not found"));
        assert_eq!(next.pods.len(), state.pods.len());
    }

    #[test]
    fn test_multi_document() {
        let state = initial_cluster_state();
        let text = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\ndata:\n  k: v\n---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: b\ndata:\n  k: v\n";
        let (out, next) = apply(text, "default", &state);
        assert_eq!(out, "configmap/a created\nconfigmap/b created");
        assert_eq!(next.config_maps.len(), 2);
    }

    #[test]
    fn test_parse_env_value_from() {
        let text = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: x\nspec:\n  containers:\n  - name: c\n    image: nginx\n    env:\n    - name: DB_HOST\n      valueFrom:\n        configMapKeyRef:\n          name: app-config\n          key: host\n";
        let doc = parse_document(text);
        assert_eq!(doc.containers[0].env[0].name, "DB_HOST");
        assert_eq!(
            doc.containers[0].env[0].value_from,
            "configMapKeyRef:app-config:host"
        );
    }

    #[test]
    fn test_parse_edit_extract() {
        let edit = parse_deployment_edit(
            "kind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: 5\n  template:\n    spec:\n      priorityClassName: high\n      containers:\n      - name: web\n        image: nginx:1.27\n",
        );
        assert_eq!(edit.replicas, Some(5));
        assert_eq!(edit.image.as_deref(), Some("nginx:1.27"));
        assert_eq!(edit.priority_class, "high");
    }
}
