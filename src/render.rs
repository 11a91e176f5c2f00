//! Read-path rendering: `kubectl get` tables, `-o yaml|json|wide|name`,
//! `describe`, synthesized logs and `top`. Everything here is pure
//! formatting over `ClusterState`.

use crate::sched;
use crate::state::*;
use serde_json::json;
use std::collections::BTreeMap;

/// Canonical plural for every resource word the interpreter accepts,
/// including the short names kubectl ships with.
pub fn normalize_resource(word: &str) -> Option<&'static str> {
    Some(match word {
        "pod" | "pods" | "po" => "pods",
        "deployment" | "deployments" | "deploy" => "deployments",
        "service" | "services" | "svc" => "services",
        "node" | "nodes" | "no" => "nodes",
        "namespace" | "namespaces" | "ns" => "namespaces",
        "configmap" | "configmaps" | "cm" => "configmaps",
        "secret" | "secrets" => "secrets",
        "event" | "events" | "ev" => "events",
        "hpa" | "horizontalpodautoscaler" | "horizontalpodautoscalers" => {
            "horizontalpodautoscalers"
        }
        "job" | "jobs" => "jobs",
        "cronjob" | "cronjobs" | "cj" => "cronjobs",
        "daemonset" | "daemonsets" | "ds" => "daemonsets",
        "statefulset" | "statefulsets" | "sts" => "statefulsets",
        "role" | "roles" => "roles",
        "rolebinding" | "rolebindings" => "rolebindings",
        "clusterrole" | "clusterroles" => "clusterroles",
        "clusterrolebinding" | "clusterrolebindings" => "clusterrolebindings",
        "serviceaccount" | "serviceaccounts" | "sa" => "serviceaccounts",
        "storageclass" | "storageclasses" | "sc" => "storageclasses",
        "persistentvolume" | "persistentvolumes" | "pv" => "persistentvolumes",
        "persistentvolumeclaim" | "persistentvolumeclaims" | "pvc" => "persistentvolumeclaims",
        "networkpolicy" | "networkpolicies" | "netpol" => "networkpolicies",
        "ingress" | "ingresses" | "ing" => "ingresses",
        "gatewayclass" | "gatewayclasses" => "gatewayclasses",
        "gateway" | "gateways" | "gtw" => "gateways",
        "httproute" | "httproutes" => "httproutes",
        "priorityclass" | "priorityclasses" | "pc" => "priorityclasses",
        "resourcequota" | "resourcequotas" | "quota" => "resourcequotas",
        "limitrange" | "limitranges" | "limits" => "limitranges",
        "all" => "all",
        _ => return None,
    })
}

pub fn is_namespaced(resource: &str) -> bool {
    !matches!(
        resource,
        "nodes"
            | "namespaces"
            | "persistentvolumes"
            | "storageclasses"
            | "clusterroles"
            | "clusterrolebindings"
            | "priorityclasses"
            | "gatewayclasses"
    )
}

/// Singular form used in NotFound wording and `-o name` prefixes.
pub fn singular(resource: &str) -> &'static str {
    match resource {
        "pods" => "pod",
        "deployments" => "deployment.apps",
        "services" => "service",
        "nodes" => "node",
        "namespaces" => "namespace",
        "configmaps" => "configmap",
        "secrets" => "secret",
        "events" => "event",
        "horizontalpodautoscalers" => "horizontalpodautoscaler.autoscaling",
        "jobs" => "job.batch",
        "cronjobs" => "cronjob.batch",
        "daemonsets" => "daemonset.apps",
        "statefulsets" => "statefulset.apps",
        "roles" => "role.rbac.authorization.k8s.io",
        "rolebindings" => "rolebinding.rbac.authorization.k8s.io",
        "clusterroles" => "clusterrole.rbac.authorization.k8s.io",
        "clusterrolebindings" => "clusterrolebinding.rbac.authorization.k8s.io",
        "serviceaccounts" => "serviceaccount",
        "storageclasses" => "storageclass.storage.k8s.io",
        "persistentvolumes" => "persistentvolume",
        "persistentvolumeclaims" => "persistentvolumeclaim",
        "networkpolicies" => "networkpolicy.networking.k8s.io",
        "ingresses" => "ingress.networking.k8s.io",
        "gatewayclasses" => "gatewayclass.gateway.networking.k8s.io",
        "gateways" => "gateway.gateway.networking.k8s.io",
        "httproutes" => "httproute.gateway.networking.k8s.io",
        "priorityclasses" => "priorityclass.scheduling.k8s.io",
        "resourcequotas" => "resourcequota",
        "limitranges" => "limitrange",
        _ => "resource",
    }
}

pub fn not_found(resource: &str, name: &str) -> String {
    let kind = match resource {
        "deployments" => "deployments.apps",
        "horizontalpodautoscalers" => "horizontalpodautoscalers.autoscaling",
        "jobs" => "jobs.batch",
        "cronjobs" => "cronjobs.batch",
        "daemonsets" => "daemonsets.apps",
        "statefulsets" => "statefulsets.apps",
        "roles" => "roles.rbac.authorization.k8s.io",
        "rolebindings" => "rolebindings.rbac.authorization.k8s.io",
        "clusterroles" => "clusterroles.rbac.authorization.k8s.io",
        "clusterrolebindings" => "clusterrolebindings.rbac.authorization.k8s.io",
        "storageclasses" => "storageclasses.storage.k8s.io",
        "networkpolicies" => "networkpolicies.networking.k8s.io",
        "ingresses" => "ingresses.networking.k8s.io",
        "priorityclasses" => "priorityclasses.scheduling.k8s.io",
        other => other,
    };
    format!(
        "Error from server (NotFound): {} \"{}\" not found",
        kind, name
    )
}

/// Column layout: each column padded to its widest cell plus a three
/// space gutter, last column unpadded. Matches kubectl's printer.
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let cols = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(cols) {
            if cell.len() > widths[i] {
                widths[i] = cell.len();
            }
        }
    }
    let mut out = String::new();
    let emit = |out: &mut String, cells: &[String]| {
        for (i, cell) in cells.iter().enumerate() {
            if i + 1 == cols {
                out.push_str(cell);
            } else {
                out.push_str(&format!("{:width$}   ", cell, width = widths[i]));
            }
        }
        while out.ends_with(' ') {
            out.pop();
        }
        out.push('\n');
    };
    emit(
        &mut out,
        &headers.iter().map(|h| h.to_string()).collect::<Vec<_>>(),
    );
    for row in rows {
        emit(&mut out, row);
    }
    out.pop();
    out
}

#[derive(Default)]
pub struct GetOpts {
    pub namespace: String,
    pub all_namespaces: bool,
    pub output: Option<String>,
    pub show_labels: bool,
    pub selector: Option<BTreeMap<String, String>>,
    pub wide: bool,
}

fn selected(opts: &GetOpts, labels: &BTreeMap<String, String>) -> bool {
    match &opts.selector {
        Some(sel) => sel.iter().all(|(k, v)| labels.get(k) == Some(v)),
        None => true,
    }
}

fn in_scope(opts: &GetOpts, meta: &Metadata) -> bool {
    (opts.all_namespaces || meta.namespace == opts.namespace) && selected(opts, &meta.labels)
}

/// Deterministic pod IP derived from the uid, 10.244.0.0/16.
pub fn pod_ip(pod: &Pod) -> String {
    if pod.status.node.is_none() {
        return "<none>".into();
    }
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in pod.metadata.uid.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x1000_0000_01b3);
    }
    format!("10.244.{}.{}", (h >> 8) % 250 + 1, h % 250 + 2)
}

pub fn get(
    state: &ClusterState,
    resource: &str,
    name: Option<&str>,
    opts: &GetOpts,
) -> Result<String, String> {
    if resource == "all" {
        let mut parts = Vec::new();
        for r in ["pods", "services", "deployments"] {
            if let Ok(t) = get(state, r, None, opts) {
                if !t.starts_with("No resources") {
                    parts.push(t);
                }
            }
        }
        if parts.is_empty() {
            return Ok(format!(
                "No resources found in {} namespace.",
                opts.namespace
            ));
        }
        return Ok(parts.join("\n\n"));
    }

    match opts.output.as_deref() {
        Some("yaml") | Some("json") => return get_structured(state, resource, name, opts),
        Some("name") => return get_names(state, resource, name, opts),
        Some("wide") | None => {}
        Some(other) => {
            return Err(format!(
                "error: unable to match a printer suitable for the output format \"{}\"",
                other
            ))
        }
    }

    let (mut headers, mut rows) = rows_for(state, resource, name, opts)?;
    if let Some(n) = name {
        if rows.is_empty() {
            return Err(not_found(resource, n));
        }
    }
    if rows.is_empty() {
        return Ok(if is_namespaced(resource) {
            format!("No resources found in {} namespace.", opts.namespace)
        } else {
            "No resources found".into()
        });
    }
    if opts.show_labels {
        headers.push("LABELS");
        let labelled = label_column(state, resource, &rows, opts);
        for (row, l) in rows.iter_mut().zip(labelled) {
            row.push(l);
        }
    }
    Ok(table(&headers, &rows))
}

fn label_column(
    state: &ClusterState,
    resource: &str,
    rows: &[Vec<String>],
    opts: &GetOpts,
) -> Vec<String> {
    // Rows carry the resource name in the first non-namespace column.
    let idx = if opts.all_namespaces { 1 } else { 0 };
    rows.iter()
        .map(|row| {
            let name = &row[idx];
            let labels = match resource {
                "pods" => state.pods.iter().find(|p| &p.metadata.name == name).map(|p| &p.metadata.labels),
                "deployments" => state
                    .deployments
                    .iter()
                    .find(|d| &d.metadata.name == name)
                    .map(|d| &d.metadata.labels),
                "services" => state
                    .services
                    .iter()
                    .find(|s| &s.metadata.name == name)
                    .map(|s| &s.metadata.labels),
                "nodes" => state.nodes.iter().find(|n| &n.metadata.name == name).map(|n| &n.metadata.labels),
                _ => None,
            };
            labels.map(format_labels).unwrap_or_else(|| "<none>".into())
        })
        .collect()
}

fn rows_for(
    state: &ClusterState,
    resource: &str,
    name: Option<&str>,
    opts: &GetOpts,
) -> Result<(Vec<&'static str>, Vec<Vec<String>>), String> {
    let want = |n: &str| name.map(|x| x == n).unwrap_or(true);
    let clock = state.clock;
    let mut headers: Vec<&'static str>;
    let mut rows: Vec<Vec<String>> = Vec::new();

    match resource {
        "pods" => {
            headers = vec!["NAME", "READY", "STATUS", "RESTARTS", "AGE"];
            if opts.wide {
                headers.extend(["IP", "NODE"]);
            }
            for p in &state.pods {
                if !in_scope(opts, &p.metadata) || !want(&p.metadata.name) {
                    continue;
                }
                let total = p.spec.containers.len().max(1);
                let ready = if p.status.phase.is_ready() { total } else { 0 };
                let mut row = vec![
                    p.metadata.name.clone(),
                    format!("{}/{}", ready, total),
                    p.status.phase.as_str().to_string(),
                    p.status.restarts.to_string(),
                    age(clock, p.metadata.created_at),
                ];
                if opts.wide {
                    row.push(pod_ip(p));
                    row.push(p.status.node.clone().unwrap_or_else(|| "<none>".into()));
                }
                rows.push(with_ns(opts, &p.metadata, row));
            }
        }
        "deployments" => {
            headers = vec!["NAME", "READY", "UP-TO-DATE", "AVAILABLE", "AGE"];
            for d in &state.deployments {
                if !in_scope(opts, &d.metadata) || !want(&d.metadata.name) {
                    continue;
                }
                let ready = state
                    .owned_pods(d)
                    .iter()
                    .filter(|&&i| state.pods[i].status.phase.is_ready())
                    .count();
                rows.push(with_ns(
                    opts,
                    &d.metadata,
                    vec![
                        d.metadata.name.clone(),
                        format!("{}/{}", ready, d.replicas),
                        d.replicas.to_string(),
                        ready.to_string(),
                        age(clock, d.metadata.created_at),
                    ],
                ));
            }
        }
        "services" => {
            headers = vec!["NAME", "TYPE", "CLUSTER-IP", "EXTERNAL-IP", "PORT(S)", "AGE"];
            for s in &state.services {
                if !in_scope(opts, &s.metadata) || !want(&s.metadata.name) {
                    continue;
                }
                let external = match s.service_type.as_str() {
                    "LoadBalancer" => "<pending>",
                    _ => "<none>",
                };
                rows.push(with_ns(
                    opts,
                    &s.metadata,
                    vec![
                        s.metadata.name.clone(),
                        s.service_type.clone(),
                        s.cluster_ip.clone(),
                        external.into(),
                        ports_column(s),
                        age(clock, s.metadata.created_at),
                    ],
                ));
            }
        }
        "nodes" => {
            headers = vec!["NAME", "STATUS", "ROLES", "AGE", "VERSION"];
            for n in &state.nodes {
                if !want(&n.metadata.name) || !selected(opts, &n.metadata.labels) {
                    continue;
                }
                let status = if n.unschedulable {
                    "Ready,SchedulingDisabled"
                } else {
                    "Ready"
                };
                rows.push(vec![
                    n.metadata.name.clone(),
                    status.into(),
                    n.roles.clone(),
                    age(clock, n.metadata.created_at),
                    n.kubelet_version.clone(),
                ]);
            }
        }
        "namespaces" => {
            headers = vec!["NAME", "STATUS", "AGE"];
            for n in &state.namespaces {
                if !want(n) {
                    continue;
                }
                rows.push(vec![n.clone(), "Active".into(), age(clock, 0)]);
            }
        }
        "configmaps" => {
            headers = vec!["NAME", "DATA", "AGE"];
            for c in &state.config_maps {
                if !in_scope(opts, &c.metadata) || !want(&c.metadata.name) {
                    continue;
                }
                rows.push(with_ns(
                    opts,
                    &c.metadata,
                    vec![
                        c.metadata.name.clone(),
                        c.data.len().to_string(),
                        age(clock, c.metadata.created_at),
                    ],
                ));
            }
        }
        "secrets" => {
            headers = vec!["NAME", "TYPE", "DATA", "AGE"];
            for s in &state.secrets {
                if !in_scope(opts, &s.metadata) || !want(&s.metadata.name) {
                    continue;
                }
                rows.push(with_ns(
                    opts,
                    &s.metadata,
                    vec![
                        s.metadata.name.clone(),
                        s.secret_type.clone(),
                        s.data.len().to_string(),
                        age(clock, s.metadata.created_at),
                    ],
                ));
            }
        }
        "events" => {
            headers = vec!["LAST SEEN", "TYPE", "REASON", "OBJECT", "MESSAGE"];
            for e in &state.events {
                if !opts.all_namespaces && e.namespace != opts.namespace {
                    continue;
                }
                rows.push(vec![
                    age(clock, e.at),
                    e.event_type.clone(),
                    e.reason.clone(),
                    format!("{}/{}", e.kind.to_lowercase(), e.name),
                    e.message.clone(),
                ]);
            }
            if rows.is_empty() {
                return Ok((headers, rows));
            }
        }
        "horizontalpodautoscalers" => {
            headers = vec![
                "NAME", "REFERENCE", "TARGETS", "MINPODS", "MAXPODS", "REPLICAS", "AGE",
            ];
            for h in &state.hpas {
                if !in_scope(opts, &h.metadata) || !want(&h.metadata.name) {
                    continue;
                }
                let replicas = state
                    .deployment(&h.metadata.namespace, &h.target)
                    .map(|d| d.replicas)
                    .unwrap_or(0);
                rows.push(with_ns(
                    opts,
                    &h.metadata,
                    vec![
                        h.metadata.name.clone(),
                        format!("Deployment/{}", h.target),
                        format!("cpu: {}%/{}%", h.current_cpu, h.target_cpu),
                        h.min_replicas.to_string(),
                        h.max_replicas.to_string(),
                        replicas.to_string(),
                        age(clock, h.metadata.created_at),
                    ],
                ));
            }
        }
        "jobs" => {
            headers = vec!["NAME", "COMPLETIONS", "DURATION", "AGE"];
            for j in &state.jobs {
                if !in_scope(opts, &j.metadata) || !want(&j.metadata.name) {
                    continue;
                }
                rows.push(with_ns(
                    opts,
                    &j.metadata,
                    vec![
                        j.metadata.name.clone(),
                        format!("{}/{}", j.succeeded, j.completions),
                        "2s".into(),
                        age(clock, j.metadata.created_at),
                    ],
                ));
            }
        }
        "cronjobs" => {
            headers = vec!["NAME", "SCHEDULE", "SUSPEND", "ACTIVE", "LAST SCHEDULE", "AGE"];
            for c in &state.cron_jobs {
                if !in_scope(opts, &c.metadata) || !want(&c.metadata.name) {
                    continue;
                }
                rows.push(with_ns(
                    opts,
                    &c.metadata,
                    vec![
                        c.metadata.name.clone(),
                        c.schedule.clone(),
                        if c.suspend { "True" } else { "False" }.into(),
                        "0".into(),
                        "<none>".into(),
                        age(clock, c.metadata.created_at),
                    ],
                ));
            }
        }
        "daemonsets" => {
            headers = vec![
                "NAME",
                "DESIRED",
                "CURRENT",
                "READY",
                "UP-TO-DATE",
                "AVAILABLE",
                "NODE SELECTOR",
                "AGE",
            ];
            for d in &state.daemon_sets {
                if !in_scope(opts, &d.metadata) || !want(&d.metadata.name) {
                    continue;
                }
                let count = state
                    .pods
                    .iter()
                    .filter(|p| {
                        p.metadata.namespace == d.metadata.namespace
                            && labels_match(&d.selector, &p.metadata.labels)
                    })
                    .count();
                rows.push(with_ns(
                    opts,
                    &d.metadata,
                    vec![
                        d.metadata.name.clone(),
                        count.to_string(),
                        count.to_string(),
                        count.to_string(),
                        count.to_string(),
                        count.to_string(),
                        "<none>".into(),
                        age(clock, d.metadata.created_at),
                    ],
                ));
            }
        }
        "statefulsets" => {
            headers = vec!["NAME", "READY", "AGE"];
            for s in &state.stateful_sets {
                if !in_scope(opts, &s.metadata) || !want(&s.metadata.name) {
                    continue;
                }
                let ready = state
                    .pods
                    .iter()
                    .filter(|p| {
                        p.metadata.namespace == s.metadata.namespace
                            && labels_match(&s.selector, &p.metadata.labels)
                            && p.status.phase.is_ready()
                    })
                    .count();
                rows.push(with_ns(
                    opts,
                    &s.metadata,
                    vec![
                        s.metadata.name.clone(),
                        format!("{}/{}", ready, s.replicas),
                        age(clock, s.metadata.created_at),
                    ],
                ));
            }
        }
        "roles" => {
            headers = vec!["NAME", "CREATED AT"];
            for r in &state.roles {
                if !in_scope(opts, &r.metadata) || !want(&r.metadata.name) {
                    continue;
                }
                rows.push(with_ns(
                    opts,
                    &r.metadata,
                    vec![r.metadata.name.clone(), timestamp(r.metadata.created_at)],
                ));
            }
        }
        "rolebindings" => {
            headers = vec!["NAME", "ROLE", "AGE"];
            for b in &state.role_bindings {
                if !in_scope(opts, &b.metadata) || !want(&b.metadata.name) {
                    continue;
                }
                rows.push(with_ns(
                    opts,
                    &b.metadata,
                    vec![
                        b.metadata.name.clone(),
                        format!("{}/{}", b.role_ref.kind, b.role_ref.name),
                        age(clock, b.metadata.created_at),
                    ],
                ));
            }
        }
        "clusterroles" => {
            headers = vec!["NAME", "CREATED AT"];
            for r in &state.cluster_roles {
                if !want(&r.metadata.name) {
                    continue;
                }
                rows.push(vec![
                    r.metadata.name.clone(),
                    timestamp(r.metadata.created_at),
                ]);
            }
        }
        "clusterrolebindings" => {
            headers = vec!["NAME", "ROLE", "AGE"];
            for b in &state.cluster_role_bindings {
                if !want(&b.metadata.name) {
                    continue;
                }
                rows.push(vec![
                    b.metadata.name.clone(),
                    format!("ClusterRole/{}", b.role_ref.name),
                    age(clock, b.metadata.created_at),
                ]);
            }
        }
        "serviceaccounts" => {
            headers = vec!["NAME", "SECRETS", "AGE"];
            for s in &state.service_accounts {
                if !in_scope(opts, &s.metadata) || !want(&s.metadata.name) {
                    continue;
                }
                rows.push(with_ns(
                    opts,
                    &s.metadata,
                    vec![
                        s.metadata.name.clone(),
                        "0".into(),
                        age(clock, s.metadata.created_at),
                    ],
                ));
            }
        }
        "storageclasses" => {
            headers = vec![
                "NAME",
                "PROVISIONER",
                "RECLAIMPOLICY",
                "VOLUMEBINDINGMODE",
                "ALLOWVOLUMEEXPANSION",
                "AGE",
            ];
            for c in &state.storage_classes {
                if !want(&c.metadata.name) {
                    continue;
                }
                let display = if c.is_default {
                    format!("{} (default)", c.metadata.name)
                } else {
                    c.metadata.name.clone()
                };
                rows.push(vec![
                    display,
                    c.provisioner.clone(),
                    c.reclaim_policy.clone(),
                    c.binding_mode.clone(),
                    "false".into(),
                    age(clock, c.metadata.created_at),
                ]);
            }
        }
        "persistentvolumes" => {
            headers = vec![
                "NAME",
                "CAPACITY",
                "ACCESS MODES",
                "RECLAIM POLICY",
                "STATUS",
                "CLAIM",
                "STORAGECLASS",
                "AGE",
            ];
            for pv in &state.persistent_volumes {
                if !want(&pv.metadata.name) {
                    continue;
                }
                rows.push(vec![
                    pv.metadata.name.clone(),
                    pv.capacity.clone(),
                    access_abbrev(&pv.access_modes),
                    pv.reclaim_policy.clone(),
                    pv.status.clone(),
                    pv.claim_ref.clone(),
                    pv.storage_class.clone(),
                    age(clock, pv.metadata.created_at),
                ]);
            }
        }
        "persistentvolumeclaims" => {
            headers = vec![
                "NAME",
                "STATUS",
                "VOLUME",
                "CAPACITY",
                "ACCESS MODES",
                "STORAGECLASS",
                "AGE",
            ];
            for pvc in &state.pvcs {
                if !in_scope(opts, &pvc.metadata) || !want(&pvc.metadata.name) {
                    continue;
                }
                let capacity = if pvc.status == "Bound" {
                    pvc.request.clone()
                } else {
                    String::new()
                };
                rows.push(with_ns(
                    opts,
                    &pvc.metadata,
                    vec![
                        pvc.metadata.name.clone(),
                        pvc.status.clone(),
                        pvc.volume_name.clone(),
                        capacity,
                        access_abbrev(&pvc.access_modes),
                        pvc.storage_class.clone(),
                        age(clock, pvc.metadata.created_at),
                    ],
                ));
            }
        }
        "networkpolicies" => {
            headers = vec!["NAME", "POD-SELECTOR", "AGE"];
            for np in &state.network_policies {
                if !in_scope(opts, &np.metadata) || !want(&np.metadata.name) {
                    continue;
                }
                rows.push(with_ns(
                    opts,
                    &np.metadata,
                    vec![
                        np.metadata.name.clone(),
                        format_labels(&np.pod_selector),
                        age(clock, np.metadata.created_at),
                    ],
                ));
            }
        }
        "ingresses" => {
            headers = vec!["NAME", "CLASS", "HOSTS", "ADDRESS", "PORTS", "AGE"];
            for i in &state.ingresses {
                if !in_scope(opts, &i.metadata) || !want(&i.metadata.name) {
                    continue;
                }
                let hosts: Vec<&str> = i
                    .rules
                    .iter()
                    .map(|r| if r.host.is_empty() { "*" } else { r.host.as_str() })
                    .collect();
                rows.push(with_ns(
                    opts,
                    &i.metadata,
                    vec![
                        i.metadata.name.clone(),
                        if i.class_name.is_empty() {
                            "<none>".into()
                        } else {
                            i.class_name.clone()
                        },
                        if hosts.is_empty() {
                            "*".into()
                        } else {
                            hosts.join(",")
                        },
                        String::new(),
                        "80".into(),
                        age(clock, i.metadata.created_at),
                    ],
                ));
            }
        }
        "gatewayclasses" => {
            headers = vec!["NAME", "CONTROLLER", "ACCEPTED", "AGE"];
            for g in &state.gateway_classes {
                if !want(&g.metadata.name) {
                    continue;
                }
                rows.push(vec![
                    g.metadata.name.clone(),
                    g.controller.clone(),
                    "True".into(),
                    age(clock, g.metadata.created_at),
                ]);
            }
        }
        "gateways" => {
            headers = vec!["NAME", "CLASS", "ADDRESS", "PROGRAMMED", "AGE"];
            for g in &state.gateways {
                if !in_scope(opts, &g.metadata) || !want(&g.metadata.name) {
                    continue;
                }
                rows.push(with_ns(
                    opts,
                    &g.metadata,
                    vec![
                        g.metadata.name.clone(),
                        g.class_name.clone(),
                        String::new(),
                        "True".into(),
                        age(clock, g.metadata.created_at),
                    ],
                ));
            }
        }
        "httproutes" => {
            headers = vec!["NAME", "HOSTNAMES", "AGE"];
            for r in &state.http_routes {
                if !in_scope(opts, &r.metadata) || !want(&r.metadata.name) {
                    continue;
                }
                rows.push(with_ns(
                    opts,
                    &r.metadata,
                    vec![
                        r.metadata.name.clone(),
                        format!("[{}]", r.hostnames.join(",")),
                        age(clock, r.metadata.created_at),
                    ],
                ));
            }
        }
        "priorityclasses" => {
            headers = vec!["NAME", "VALUE", "GLOBAL-DEFAULT", "AGE"];
            for p in &state.priority_classes {
                if !want(&p.metadata.name) {
                    continue;
                }
                rows.push(vec![
                    p.metadata.name.clone(),
                    p.value.to_string(),
                    p.global_default.to_string(),
                    age(clock, p.metadata.created_at),
                ]);
            }
        }
        "resourcequotas" => {
            headers = vec!["NAME", "AGE"];
            for q in &state.resource_quotas {
                if !in_scope(opts, &q.metadata) || !want(&q.metadata.name) {
                    continue;
                }
                rows.push(with_ns(
                    opts,
                    &q.metadata,
                    vec![q.metadata.name.clone(), age(clock, q.metadata.created_at)],
                ));
            }
        }
        "limitranges" => {
            headers = vec!["NAME", "CREATED AT"];
            for l in &state.limit_ranges {
                if !in_scope(opts, &l.metadata) || !want(&l.metadata.name) {
                    continue;
                }
                rows.push(with_ns(
                    opts,
                    &l.metadata,
                    vec![l.metadata.name.clone(), timestamp(l.metadata.created_at)],
                ));
            }
        }
        other => {
            return Err(format!(
                "error: the server doesn't have a resource type \"{}\"",
                other
            ))
        }
    }

    if opts.all_namespaces && is_namespaced(resource) {
        let mut h = vec!["NAMESPACE"];
        h.extend(headers);
        headers = h;
    }
    Ok((headers, rows))
}

fn with_ns(opts: &GetOpts, meta: &Metadata, row: Vec<String>) -> Vec<String> {
    if opts.all_namespaces {
        let mut r = vec![meta.namespace.clone()];
        r.extend(row);
        r
    } else {
        row
    }
}

fn ports_column(s: &Service) -> String {
    if s.ports.is_empty() {
        return "<none>".into();
    }
    s.ports
        .iter()
        .map(|p| {
            if s.service_type == "NodePort" && p.node_port != 0 {
                format!("{}:{}/{}", p.port, p.node_port, p.protocol)
            } else {
                format!("{}/{}", p.port, p.protocol)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn access_abbrev(modes: &[String]) -> String {
    modes
        .iter()
        .map(|m| match m.as_str() {
            "ReadWriteOnce" => "RWO",
            "ReadOnlyMany" => "ROX",
            "ReadWriteMany" => "RWX",
            "ReadWriteOncePod" => "RWOP",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn get_names(
    state: &ClusterState,
    resource: &str,
    name: Option<&str>,
    opts: &GetOpts,
) -> Result<String, String> {
    let prefix = singular(resource);
    let names = names_of(state, resource, opts);
    let filtered: Vec<String> = names
        .into_iter()
        .filter(|n| name.map(|x| x == n).unwrap_or(true))
        .map(|n| format!("{}/{}", prefix, n))
        .collect();
    if let Some(n) = name {
        if filtered.is_empty() {
            return Err(not_found(resource, n));
        }
    }
    Ok(filtered.join("\n"))
}

/// Names visible under the get scope, used by `-o name` and completion.
pub fn names_of(state: &ClusterState, resource: &str, opts: &GetOpts) -> Vec<String> {
    macro_rules! names {
        ($coll:expr) => {
            $coll
                .iter()
                .filter(|r| in_scope(opts, &r.metadata))
                .map(|r| r.metadata.name.clone())
                .collect()
        };
    }
    match resource {
        "pods" => names!(state.pods),
        "deployments" => names!(state.deployments),
        "services" => names!(state.services),
        "nodes" => state.nodes.iter().map(|n| n.metadata.name.clone()).collect(),
        "namespaces" => state.namespaces.clone(),
        "configmaps" => names!(state.config_maps),
        "secrets" => names!(state.secrets),
        "horizontalpodautoscalers" => names!(state.hpas),
        "jobs" => names!(state.jobs),
        "cronjobs" => names!(state.cron_jobs),
        "daemonsets" => names!(state.daemon_sets),
        "statefulsets" => names!(state.stateful_sets),
        "roles" => names!(state.roles),
        "rolebindings" => names!(state.role_bindings),
        "clusterroles" => state
            .cluster_roles
            .iter()
            .map(|r| r.metadata.name.clone())
            .collect(),
        "clusterrolebindings" => state
            .cluster_role_bindings
            .iter()
            .map(|r| r.metadata.name.clone())
            .collect(),
        "serviceaccounts" => names!(state.service_accounts),
        "storageclasses" => state
            .storage_classes
            .iter()
            .map(|c| c.metadata.name.clone())
            .collect(),
        "persistentvolumes" => state
            .persistent_volumes
            .iter()
            .map(|p| p.metadata.name.clone())
            .collect(),
        "persistentvolumeclaims" => names!(state.pvcs),
        "networkpolicies" => names!(state.network_policies),
        "ingresses" => names!(state.ingresses),
        "gatewayclasses" => state
            .gateway_classes
            .iter()
            .map(|g| g.metadata.name.clone())
            .collect(),
        "gateways" => names!(state.gateways),
        "httproutes" => names!(state.http_routes),
        "priorityclasses" => state
            .priority_classes
            .iter()
            .map(|p| p.metadata.name.clone())
            .collect(),
        "resourcequotas" => names!(state.resource_quotas),
        "limitranges" => names!(state.limit_ranges),
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// -o yaml / -o json
// ---------------------------------------------------------------------------

fn get_structured(
    state: &ClusterState,
    resource: &str,
    name: Option<&str>,
    opts: &GetOpts,
) -> Result<String, String> {
    let json_out = opts.output.as_deref() == Some("json");
    let items = structured_items(state, resource, name, opts)?;
    if let Some(n) = name {
        let item = items
            .into_iter()
            .next()
            .ok_or_else(|| not_found(resource, n))?;
        return Ok(if json_out {
            serde_json::to_string_pretty(&item).unwrap_or_default()
        } else {
            to_yaml(&item, 0)
        });
    }
    let list = json!({
        "apiVersion": "v1",
        "kind": "List",
        "items": items,
        "metadata": { "resourceVersion": "" },
    });
    Ok(if json_out {
        serde_json::to_string_pretty(&list).unwrap_or_default()
    } else {
        to_yaml(&list, 0)
    })
}

fn structured_items(
    state: &ClusterState,
    resource: &str,
    name: Option<&str>,
    opts: &GetOpts,
) -> Result<Vec<serde_json::Value>, String> {
    let want = |n: &str| name.map(|x| x == n).unwrap_or(true);
    let mut items = Vec::new();
    match resource {
        "pods" => {
            for p in &state.pods {
                if in_scope(opts, &p.metadata) && want(&p.metadata.name) {
                    items.push(pod_value(state, p));
                }
            }
        }
        "deployments" => {
            for d in &state.deployments {
                if in_scope(opts, &d.metadata) && want(&d.metadata.name) {
                    items.push(deployment_value(state, d));
                }
            }
        }
        "services" => {
            for s in &state.services {
                if in_scope(opts, &s.metadata) && want(&s.metadata.name) {
                    items.push(service_value(s));
                }
            }
        }
        "configmaps" => {
            for c in &state.config_maps {
                if in_scope(opts, &c.metadata) && want(&c.metadata.name) {
                    items.push(json!({
                        "apiVersion": "v1",
                        "kind": "ConfigMap",
                        "metadata": metadata_value(&c.metadata),
                        "data": c.data,
                    }));
                }
            }
        }
        "secrets" => {
            for s in &state.secrets {
                if in_scope(opts, &s.metadata) && want(&s.metadata.name) {
                    items.push(json!({
                        "apiVersion": "v1",
                        "kind": "Secret",
                        "metadata": metadata_value(&s.metadata),
                        "type": s.secret_type,
                        "data": s.data,
                    }));
                }
            }
        }
        "nodes" => {
            for n in &state.nodes {
                if want(&n.metadata.name) {
                    items.push(json!({
                        "apiVersion": "v1",
                        "kind": "Node",
                        "metadata": metadata_value(&n.metadata),
                        "spec": if n.unschedulable { json!({"unschedulable": true}) } else { json!({}) },
                        "status": {
                            "allocatable": {
                                "cpu": format!("{}m", n.allocatable_cpu_m),
                                "memory": format!("{}Mi", n.allocatable_mem_mi),
                            },
                            "nodeInfo": {
                                "kubeletVersion": n.kubelet_version,
                                "osImage": n.os_image,
                            },
                            "addresses": [
                                { "address": n.internal_ip, "type": "InternalIP" },
                                { "address": n.metadata.name, "type": "Hostname" },
                            ],
                        },
                    }));
                }
            }
        }
        "roles" => {
            for r in &state.roles {
                if in_scope(opts, &r.metadata) && want(&r.metadata.name) {
                    items.push(json!({
                        "apiVersion": "rbac.authorization.k8s.io/v1",
                        "kind": "Role",
                        "metadata": metadata_value(&r.metadata),
                        "rules": rules_value(&r.rules),
                    }));
                }
            }
        }
        "clusterroles" => {
            for r in &state.cluster_roles {
                if want(&r.metadata.name) {
                    items.push(json!({
                        "apiVersion": "rbac.authorization.k8s.io/v1",
                        "kind": "ClusterRole",
                        "metadata": metadata_value(&r.metadata),
                        "rules": rules_value(&r.rules),
                    }));
                }
            }
        }
        "rolebindings" => {
            for b in &state.role_bindings {
                if in_scope(opts, &b.metadata) && want(&b.metadata.name) {
                    items.push(binding_value("RoleBinding", &b.metadata, &b.subjects, &b.role_ref));
                }
            }
        }
        "clusterrolebindings" => {
            for b in &state.cluster_role_bindings {
                if want(&b.metadata.name) {
                    items.push(binding_value(
                        "ClusterRoleBinding",
                        &b.metadata,
                        &b.subjects,
                        &b.role_ref,
                    ));
                }
            }
        }
        "namespaces" => {
            for n in &state.namespaces {
                if want(n) {
                    items.push(json!({
                        "apiVersion": "v1",
                        "kind": "Namespace",
                        "metadata": { "name": n, "creationTimestamp": timestamp(0) },
                        "status": { "phase": "Active" },
                    }));
                }
            }
        }
        "horizontalpodautoscalers" => {
            for h in &state.hpas {
                if in_scope(opts, &h.metadata) && want(&h.metadata.name) {
                    items.push(json!({
                        "apiVersion": "autoscaling/v2",
                        "kind": "HorizontalPodAutoscaler",
                        "metadata": metadata_value(&h.metadata),
                        "spec": {
                            "scaleTargetRef": {
                                "apiVersion": "apps/v1",
                                "kind": "Deployment",
                                "name": h.target,
                            },
                            "minReplicas": h.min_replicas,
                            "maxReplicas": h.max_replicas,
                            "metrics": [{
                                "type": "Resource",
                                "resource": {
                                    "name": "cpu",
                                    "target": { "type": "Utilization", "averageUtilization": h.target_cpu },
                                },
                            }],
                            "behavior": {
                                "scaleDown": { "stabilizationWindowSeconds": h.scale_down_stabilization },
                            },
                        },
                    }));
                }
            }
        }
        _ => {
            // Minimal rendering for the remaining kinds.
            for n in names_of(state, resource, opts) {
                if want(&n) {
                    items.push(json!({
                        "kind": singular(resource).split('.').next().unwrap_or(""),
                        "metadata": { "name": n },
                    }));
                }
            }
        }
    }
    Ok(items)
}

fn metadata_value(meta: &Metadata) -> serde_json::Value {
    let mut m = serde_json::Map::new();
    m.insert("creationTimestamp".into(), json!(timestamp(meta.created_at)));
    if !meta.labels.is_empty() {
        m.insert("labels".into(), json!(meta.labels));
    }
    if !meta.annotations.is_empty() {
        m.insert("annotations".into(), json!(meta.annotations));
    }
    m.insert("name".into(), json!(meta.name));
    if !meta.namespace.is_empty() {
        m.insert("namespace".into(), json!(meta.namespace));
    }
    if !meta.uid.is_empty() {
        m.insert("uid".into(), json!(meta.uid));
    }
    serde_json::Value::Object(m)
}

fn container_value(c: &ContainerSpec) -> serde_json::Value {
    let mut m = serde_json::Map::new();
    m.insert("image".into(), json!(c.image));
    m.insert("imagePullPolicy".into(), json!("Always"));
    m.insert("name".into(), json!(c.name));
    if !c.command.is_empty() {
        m.insert("command".into(), json!(c.command));
    }
    if !c.ports.is_empty() {
        m.insert(
            "ports".into(),
            json!(c
                .ports
                .iter()
                .map(|p| json!({ "containerPort": p, "protocol": "TCP" }))
                .collect::<Vec<_>>()),
        );
    }
    if !c.env.is_empty() {
        m.insert(
            "env".into(),
            json!(c
                .env
                .iter()
                .map(|e| {
                    if e.value_from.is_empty() {
                        json!({ "name": e.name, "value": e.value })
                    } else {
                        let parts: Vec<&str> = e.value_from.splitn(3, ':').collect();
                        let (src, name, key) = (
                            parts.first().copied().unwrap_or(""),
                            parts.get(1).copied().unwrap_or(""),
                            parts.get(2).copied().unwrap_or(""),
                        );
                        json!({ "name": e.name, "valueFrom": { src: { "name": name, "key": key } } })
                    }
                })
                .collect::<Vec<_>>()),
        );
    }
    let mut resources = serde_json::Map::new();
    if !c.requests.is_empty() {
        let mut req = serde_json::Map::new();
        if !c.requests.cpu.is_empty() {
            req.insert("cpu".into(), json!(c.requests.cpu));
        }
        if !c.requests.memory.is_empty() {
            req.insert("memory".into(), json!(c.requests.memory));
        }
        resources.insert("requests".into(), serde_json::Value::Object(req));
    }
    if !c.limits.is_empty() {
        let mut lim = serde_json::Map::new();
        if !c.limits.cpu.is_empty() {
            lim.insert("cpu".into(), json!(c.limits.cpu));
        }
        if !c.limits.memory.is_empty() {
            lim.insert("memory".into(), json!(c.limits.memory));
        }
        resources.insert("limits".into(), serde_json::Value::Object(lim));
    }
    m.insert("resources".into(), serde_json::Value::Object(resources));
    serde_json::Value::Object(m)
}

fn pod_spec_value(spec: &PodSpec, node: Option<&str>) -> serde_json::Value {
    let mut m = serde_json::Map::new();
    m.insert(
        "containers".into(),
        json!(spec.containers.iter().map(container_value).collect::<Vec<_>>()),
    );
    if let Some(n) = node {
        m.insert("nodeName".into(), json!(n));
    }
    if !spec.node_selector.is_empty() {
        m.insert("nodeSelector".into(), json!(spec.node_selector));
    }
    if !spec.service_account.is_empty() {
        m.insert("serviceAccountName".into(), json!(spec.service_account));
    }
    if !spec.priority_class.is_empty() {
        m.insert("priorityClassName".into(), json!(spec.priority_class));
    }
    if !spec.tolerations.is_empty() {
        m.insert(
            "tolerations".into(),
            json!(spec
                .tolerations
                .iter()
                .map(|t| json!({ "key": t.key, "effect": t.effect, "operator": "Exists" }))
                .collect::<Vec<_>>()),
        );
    }
    m.insert("restartPolicy".into(), json!("Always"));
    m.insert("dnsPolicy".into(), json!("ClusterFirst"));
    serde_json::Value::Object(m)
}

fn pod_value(state: &ClusterState, p: &Pod) -> serde_json::Value {
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": metadata_value(&p.metadata),
        "spec": pod_spec_value(&p.spec, p.status.node.as_deref()),
        "status": {
            "phase": match p.status.phase {
                PodPhase::Running | PodPhase::CrashLoopBackOff | PodPhase::ImagePullBackOff => "Running",
                PodPhase::Completed => "Succeeded",
                PodPhase::Failed | PodPhase::Error => "Failed",
                PodPhase::Pending => "Pending",
            },
            "podIP": pod_ip(p),
            "hostIP": p.status.node.as_deref()
                .and_then(|n| state.node(n))
                .map(|n| n.internal_ip.clone())
                .unwrap_or_default(),
            "startTime": timestamp(p.metadata.created_at),
        },
    })
}

fn deployment_value(state: &ClusterState, d: &Deployment) -> serde_json::Value {
    let ready = state
        .owned_pods(d)
        .iter()
        .filter(|&&i| state.pods[i].status.phase.is_ready())
        .count();
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": metadata_value(&d.metadata),
        "spec": {
            "replicas": d.replicas,
            "selector": { "matchLabels": d.selector },
            "strategy": { "type": d.strategy },
            "template": {
                "metadata": { "labels": d.template.labels },
                "spec": pod_spec_value(&d.template.spec, None),
            },
        },
        "status": {
            "availableReplicas": ready,
            "readyReplicas": ready,
            "replicas": d.replicas,
            "updatedReplicas": d.replicas,
        },
    })
}

fn service_value(s: &Service) -> serde_json::Value {
    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": metadata_value(&s.metadata),
        "spec": {
            "clusterIP": s.cluster_ip,
            "ports": s.ports.iter().map(|p| {
                let mut m = serde_json::Map::new();
                m.insert("port".into(), json!(p.port));
                m.insert("protocol".into(), json!(p.protocol));
                m.insert("targetPort".into(), json!(p.target_port));
                if p.node_port != 0 {
                    m.insert("nodePort".into(), json!(p.node_port));
                }
                serde_json::Value::Object(m)
            }).collect::<Vec<_>>(),
            "selector": s.selector,
            "type": s.service_type,
        },
        "status": { "loadBalancer": {} },
    })
}

fn rules_value(rules: &[PolicyRule]) -> serde_json::Value {
    json!(rules
        .iter()
        .map(|r| {
            let mut m = serde_json::Map::new();
            m.insert("apiGroups".into(), json!(r.api_groups));
            if !r.resource_names.is_empty() {
                m.insert("resourceNames".into(), json!(r.resource_names));
            }
            m.insert("resources".into(), json!(r.resources));
            m.insert("verbs".into(), json!(r.verbs));
            serde_json::Value::Object(m)
        })
        .collect::<Vec<_>>())
}

fn binding_value(
    kind: &str,
    meta: &Metadata,
    subjects: &[Subject],
    role_ref: &RoleRef,
) -> serde_json::Value {
    json!({
        "apiVersion": "rbac.authorization.k8s.io/v1",
        "kind": kind,
        "metadata": metadata_value(meta),
        "roleRef": {
            "apiGroup": "rbac.authorization.k8s.io",
            "kind": role_ref.kind,
            "name": role_ref.name,
        },
        "subjects": subjects.iter().map(|s| {
            let mut m = serde_json::Map::new();
            if s.kind != "ServiceAccount" {
                m.insert("apiGroup".into(), json!("rbac.authorization.k8s.io"));
            }
            m.insert("kind".into(), json!(s.kind));
            m.insert("name".into(), json!(s.name));
            if !s.namespace.is_empty() {
                m.insert("namespace".into(), json!(s.namespace));
            }
            serde_json::Value::Object(m)
        }).collect::<Vec<_>>(),
    })
}

/// Render a JSON value as the YAML kubectl would print. Keys come out in
/// map order (serde_json preserves insertion order with the feature the
/// manifest enables; BTreeMap-backed values are already sorted).
pub fn to_yaml(value: &serde_json::Value, indent: usize) -> String {
    let mut out = String::new();
    write_yaml(value, indent, &mut out);
    while out.ends_with('\n') {
        out.pop();
    }
    out
}

fn write_yaml(value: &serde_json::Value, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match value {
        serde_json::Value::Object(map) => {
            if map.is_empty() {
                out.push_str("{}\n");
                return;
            }
            for (k, v) in map {
                match v {
                    serde_json::Value::Object(m) if !m.is_empty() => {
                        out.push_str(&format!("{}{}:\n", pad, k));
                        write_yaml(v, indent + 1, out);
                    }
                    serde_json::Value::Array(a) if !a.is_empty() => {
                        out.push_str(&format!("{}{}:\n", pad, k));
                        write_yaml(v, indent, out);
                    }
                    _ => {
                        out.push_str(&format!("{}{}: {}\n", pad, k, scalar_yaml(v)));
                    }
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                match item {
                    serde_json::Value::Object(map) if !map.is_empty() => {
                        let mut first = true;
                        for (k, v) in map {
                            let lead = if first {
                                format!("{}- ", pad)
                            } else {
                                format!("{}  ", pad)
                            };
                            first = false;
                            match v {
                                serde_json::Value::Object(m) if !m.is_empty() => {
                                    out.push_str(&format!("{}{}:\n", lead, k));
                                    write_yaml(v, indent + 2, out);
                                }
                                serde_json::Value::Array(a) if !a.is_empty() => {
                                    out.push_str(&format!("{}{}:\n", lead, k));
                                    write_yaml(v, indent + 1, out);
                                }
                                _ => {
                                    out.push_str(&format!("{}{}: {}\n", lead, k, scalar_yaml(v)));
                                }
                            }
                        }
                    }
                    _ => {
                        out.push_str(&format!("{}- {}\n", pad, scalar_yaml(item)));
                    }
                }
            }
        }
        _ => {
            out.push_str(&format!("{}{}\n", pad, scalar_yaml(value)));
        }
    }
}

fn scalar_yaml(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => {
            if s.is_empty() {
                "\"\"".into()
            } else if s.contains(':')
                || s.chars().all(|c| c.is_ascii_digit())
                || s == "true"
                || s == "false"
            {
                format!("\"{}\"", s)
            } else {
                s.clone()
            }
        }
        serde_json::Value::Null => "null".into(),
        serde_json::Value::Object(_) => "{}".into(),
        serde_json::Value::Array(_) => "[]".into(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// describe
// ---------------------------------------------------------------------------

pub fn describe(
    state: &ClusterState,
    resource: &str,
    name: &str,
    ns: &str,
) -> Result<String, String> {
    match resource {
        "pods" => describe_pod(state, name, ns),
        "deployments" => describe_deployment(state, name, ns),
        "services" => describe_service(state, name, ns),
        "nodes" => describe_node(state, name),
        "configmaps" => describe_configmap(state, name, ns),
        "secrets" => describe_secret(state, name, ns),
        "namespaces" => describe_namespace(state, name),
        "persistentvolumeclaims" => describe_pvc(state, name, ns),
        "persistentvolumes" => describe_pv(state, name),
        "horizontalpodautoscalers" => describe_hpa(state, name, ns),
        "ingresses" => describe_ingress(state, name, ns),
        _ => {
            // Bare rendering for kinds without a dedicated describer.
            let names = names_of(
                state,
                resource,
                &GetOpts {
                    namespace: ns.into(),
                    all_namespaces: !is_namespaced(resource),
                    ..Default::default()
                },
            );
            if !names.iter().any(|n| n == name) {
                return Err(not_found(resource, name));
            }
            let mut out = format!("Name:         {}\n", name);
            if is_namespaced(resource) {
                out.push_str(&format!("Namespace:    {}\n", ns));
            }
            out.push_str("Labels:       <none>\nAnnotations:  <none>");
            Ok(out)
        }
    }
}

fn events_section(state: &ClusterState, kind: &str, name: &str, ns: &str) -> String {
    let matching: Vec<&Event> = state
        .events
        .iter()
        .filter(|e| e.kind == kind && e.name == name && e.namespace == ns)
        .collect();
    if matching.is_empty() {
        return "Events:                      <none>".into();
    }
    let mut out = String::from("Events:\n  Type     Reason            Age    From               Message\n  ----     ------            ----   ----               -------");
    for e in matching {
        let from = match e.reason.as_str() {
            "Scheduled" | "FailedScheduling" => "default-scheduler",
            "Pulling" | "Pulled" | "Created" | "Started" | "BackOff" | "Failed" => "kubelet",
            _ => "controller-manager",
        };
        out.push_str(&format!(
            "\n  {:<8} {:<17} {:<6} {:<18} {}",
            e.event_type,
            e.reason,
            age(state.clock, e.at),
            from,
            e.message
        ));
    }
    out
}

fn describe_pod(state: &ClusterState, name: &str, ns: &str) -> Result<String, String> {
    let p = state.pod(ns, name).ok_or_else(|| not_found("pods", name))?;
    let mut out = String::new();
    out.push_str(&format!("Name:             {}\n", p.metadata.name));
    out.push_str(&format!("Namespace:        {}\n", ns));
    out.push_str(&format!(
        "Priority:         {}\n",
        state
            .priority_classes
            .iter()
            .find(|c| c.metadata.name == p.spec.priority_class)
            .map(|c| c.value)
            .unwrap_or(0)
    ));
    if !p.spec.priority_class.is_empty() {
        out.push_str(&format!("Priority Class Name:  {}\n", p.spec.priority_class));
    }
    out.push_str(&format!(
        "Service Account:  {}\n",
        if p.spec.service_account.is_empty() {
            "default"
        } else {
            &p.spec.service_account
        }
    ));
    out.push_str(&format!(
        "Node:             {}\n",
        match &p.status.node {
            Some(n) => format!(
                "{}/{}",
                n,
                state.node(n).map(|x| x.internal_ip.clone()).unwrap_or_default()
            ),
            None => "<none>".into(),
        }
    ));
    out.push_str(&format!(
        "Start Time:       {}\n",
        timestamp(p.metadata.created_at)
    ));
    out.push_str(&format!(
        "Labels:           {}\n",
        format_labels(&p.metadata.labels)
    ));
    out.push_str("Annotations:      <none>\n");
    let status = match p.status.phase {
        PodPhase::Running | PodPhase::CrashLoopBackOff | PodPhase::ImagePullBackOff => "Running",
        PodPhase::Pending => "Pending",
        PodPhase::Completed => "Succeeded",
        _ => "Failed",
    };
    out.push_str(&format!("Status:           {}\n", status));
    out.push_str(&format!("IP:               {}\n", pod_ip(p)));
    out.push_str("Containers:\n");
    for c in &p.spec.containers {
        out.push_str(&format!("  {}:\n", c.name));
        out.push_str(&format!("    Image:          {}\n", c.image));
        if !c.ports.is_empty() {
            out.push_str(&format!(
                "    Port{}:          {}\n",
                if c.ports.len() > 1 { "s" } else { " " },
                c.ports
                    .iter()
                    .map(|p| format!("{}/TCP", p))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        let container_state = match p.status.phase {
            PodPhase::Running => "Running",
            PodPhase::CrashLoopBackOff => "Waiting\n      Reason:       CrashLoopBackOff",
            PodPhase::ImagePullBackOff => "Waiting\n      Reason:       ImagePullBackOff",
            PodPhase::Pending => "Waiting\n      Reason:       ContainerCreating",
            PodPhase::Completed => "Terminated\n      Reason:       Completed",
            _ => "Terminated\n      Reason:       Error",
        };
        out.push_str(&format!("    State:          {}\n", container_state));
        out.push_str(&format!("    Restart Count:  {}\n", p.status.restarts));
        if !c.requests.is_empty() {
            out.push_str("    Requests:\n");
            if !c.requests.cpu.is_empty() {
                out.push_str(&format!("      cpu:     {}\n", c.requests.cpu));
            }
            if !c.requests.memory.is_empty() {
                out.push_str(&format!("      memory:  {}\n", c.requests.memory));
            }
        }
        if !c.limits.is_empty() {
            out.push_str("    Limits:\n");
            if !c.limits.cpu.is_empty() {
                out.push_str(&format!("      cpu:     {}\n", c.limits.cpu));
            }
            if !c.limits.memory.is_empty() {
                out.push_str(&format!("      memory:  {}\n", c.limits.memory));
            }
        }
        if !c.env.is_empty() || !c.env_from.is_empty() {
            out.push_str("    Environment:\n");
            for e in &c.env {
                if e.value_from.is_empty() {
                    out.push_str(&format!("      {}:  {}\n", e.name, e.value));
                } else {
                    let parts: Vec<&str> = e.value_from.splitn(3, ':').collect();
                    let what = if parts.first() == Some(&"configMapKeyRef") {
                        "ConfigMap"
                    } else {
                        "Secret"
                    };
                    out.push_str(&format!(
                        "      {}:  <set to the key '{}' of {} '{}'>\n",
                        e.name,
                        parts.get(2).unwrap_or(&""),
                        what,
                        parts.get(1).unwrap_or(&"")
                    ));
                }
            }
        }
        if !c.volume_mounts.is_empty() {
            out.push_str("    Mounts:\n");
            for m in &c.volume_mounts {
                out.push_str(&format!("      {} from {} (rw)\n", m.mount_path, m.name));
            }
        }
    }
    if !p.spec.volumes.is_empty() {
        out.push_str("Volumes:\n");
        for v in &p.spec.volumes {
            let (kind, detail) = v
                .source
                .split_once(':')
                .unwrap_or((v.source.as_str(), ""));
            let kind_name = match kind {
                "configMap" => "ConfigMap",
                "secret" => "Secret",
                "persistentVolumeClaim" => "PersistentVolumeClaim",
                "hostPath" => "HostPath",
                _ => "EmptyDir",
            };
            out.push_str(&format!("  {}:\n    Type:  {}", v.name, kind_name));
            if !detail.is_empty() {
                out.push_str(&format!(" ({})", detail));
            }
            out.push('\n');
        }
    }
    out.push_str("QoS Class:        ");
    out.push_str(if p.spec.containers.iter().any(|c| !c.requests.is_empty()) {
        "Burstable\n"
    } else {
        "BestEffort\n"
    });
    if !p.spec.node_selector.is_empty() {
        out.push_str(&format!(
            "Node-Selectors:   {}\n",
            format_labels(&p.spec.node_selector)
        ));
    } else {
        out.push_str("Node-Selectors:   <none>\n");
    }
    out.push_str(&events_section(state, "Pod", name, ns));
    Ok(out)
}

fn describe_deployment(state: &ClusterState, name: &str, ns: &str) -> Result<String, String> {
    let d = state
        .deployment(ns, name)
        .ok_or_else(|| not_found("deployments", name))?;
    let ready = state
        .owned_pods(d)
        .iter()
        .filter(|&&i| state.pods[i].status.phase.is_ready())
        .count();
    let mut out = String::new();
    out.push_str(&format!("Name:                   {}\n", d.metadata.name));
    out.push_str(&format!("Namespace:              {}\n", ns));
    out.push_str(&format!(
        "CreationTimestamp:      {}\n",
        timestamp(d.metadata.created_at)
    ));
    out.push_str(&format!(
        "Labels:                 {}\n",
        format_labels(&d.metadata.labels)
    ));
    out.push_str("Annotations:            <none>\n");
    out.push_str(&format!(
        "Selector:               {}\n",
        format_labels(&d.selector)
    ));
    out.push_str(&format!(
        "Replicas:               {} desired | {} updated | {} total | {} available | {} unavailable\n",
        d.replicas,
        d.replicas,
        d.replicas,
        ready,
        d.replicas as usize - ready.min(d.replicas as usize)
    ));
    out.push_str(&format!("StrategyType:           {}\n", d.strategy));
    out.push_str("Pod Template:\n");
    out.push_str(&format!(
        "  Labels:  {}\n",
        format_labels(&d.template.labels)
    ));
    out.push_str("  Containers:\n");
    for c in &d.template.spec.containers {
        out.push_str(&format!("   {}:\n", c.name));
        out.push_str(&format!("    Image:        {}\n", c.image));
        if !c.ports.is_empty() {
            out.push_str(&format!(
                "    Port:         {}\n",
                c.ports
                    .iter()
                    .map(|p| format!("{}/TCP", p))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        for e in &c.env {
            out.push_str(&format!("    Environment:  {}={}\n", e.name, e.value));
        }
    }
    out.push_str(&events_section(state, "Deployment", name, ns));
    Ok(out)
}

fn describe_service(state: &ClusterState, name: &str, ns: &str) -> Result<String, String> {
    let s = state
        .service(ns, name)
        .ok_or_else(|| not_found("services", name))?;
    // Endpoints are the IPs of ready pods the selector matches.
    let endpoints: Vec<String> = state
        .pods
        .iter()
        .filter(|p| {
            p.metadata.namespace == ns
                && labels_match(&s.selector, &p.metadata.labels)
                && p.status.phase.is_ready()
        })
        .map(pod_ip)
        .collect();
    let mut out = String::new();
    out.push_str(&format!("Name:              {}\n", s.metadata.name));
    out.push_str(&format!("Namespace:         {}\n", ns));
    out.push_str(&format!(
        "Labels:            {}\n",
        format_labels(&s.metadata.labels)
    ));
    out.push_str("Annotations:       <none>\n");
    out.push_str(&format!(
        "Selector:          {}\n",
        format_labels(&s.selector)
    ));
    out.push_str(&format!("Type:              {}\n", s.service_type));
    out.push_str(&format!("IP:                {}\n", s.cluster_ip));
    for p in &s.ports {
        out.push_str(&format!(
            "Port:              <unset>  {}/{}\n",
            p.port, p.protocol
        ));
        out.push_str(&format!(
            "TargetPort:        {}/{}\n",
            p.target_port, p.protocol
        ));
        if p.node_port != 0 {
            out.push_str(&format!(
                "NodePort:          <unset>  {}/{}\n",
                p.node_port, p.protocol
            ));
        }
        let eps = if endpoints.is_empty() {
            "<none>".to_string()
        } else {
            endpoints
                .iter()
                .map(|ip| format!("{}:{}", ip, p.target_port))
                .collect::<Vec<_>>()
                .join(",")
        };
        out.push_str(&format!("Endpoints:         {}\n", eps));
    }
    out.push_str("Session Affinity:  None\n");
    out.push_str("Events:            <none>");
    Ok(out)
}

fn describe_node(state: &ClusterState, name: &str) -> Result<String, String> {
    let n = state.node(name).ok_or_else(|| not_found("nodes", name))?;
    let pods_here: Vec<&Pod> = state
        .pods
        .iter()
        .filter(|p| p.status.node.as_deref() == Some(name))
        .collect();
    let (cpu_used, mem_used) = pods_here.iter().fold((0u32, 0u32), |(c, m), p| {
        let (pc, pm) = sched::pod_requests(&p.spec);
        (c + pc, m + pm)
    });
    let mut out = String::new();
    out.push_str(&format!("Name:               {}\n", n.metadata.name));
    out.push_str(&format!("Roles:              {}\n", n.roles));
    out.push_str(&format!(
        "Labels:             {}\n",
        format_labels(&n.metadata.labels)
    ));
    out.push_str(&format!(
        "CreationTimestamp:  {}\n",
        timestamp(n.metadata.created_at)
    ));
    if n.taints.is_empty() {
        out.push_str("Taints:             <none>\n");
    } else {
        for (i, t) in n.taints.iter().enumerate() {
            let prefix = if i == 0 {
                "Taints:             "
            } else {
                "                    "
            };
            let spec = if t.value.is_empty() {
                format!("{}:{}", t.key, t.effect)
            } else {
                format!("{}={}:{}", t.key, t.value, t.effect)
            };
            out.push_str(&format!("{}{}\n", prefix, spec));
        }
    }
    out.push_str(&format!("Unschedulable:      {}\n", n.unschedulable));
    out.push_str("Addresses:\n");
    out.push_str(&format!("  InternalIP:  {}\n", n.internal_ip));
    out.push_str(&format!("  Hostname:    {}\n", n.metadata.name));
    out.push_str("Allocatable:\n");
    out.push_str(&format!("  cpu:     {}m\n", n.allocatable_cpu_m));
    out.push_str(&format!("  memory:  {}Mi\n", n.allocatable_mem_mi));
    out.push_str("System Info:\n");
    out.push_str(&format!("  OS Image:         {}\n", n.os_image));
    out.push_str(&format!("  Kubelet Version:  {}\n", n.kubelet_version));
    out.push_str(&format!(
        "Non-terminated Pods:  ({} in total)\n",
        pods_here.len()
    ));
    out.push_str("  Namespace    Name\n");
    for p in &pods_here {
        out.push_str(&format!(
            "  {:<12} {}\n",
            p.metadata.namespace, p.metadata.name
        ));
    }
    out.push_str("Allocated resources:\n");
    out.push_str(&format!(
        "  cpu:     {}m ({}%)\n",
        cpu_used,
        cpu_used * 100 / n.allocatable_cpu_m.max(1)
    ));
    out.push_str(&format!(
        "  memory:  {}Mi ({}%)",
        mem_used,
        mem_used * 100 / n.allocatable_mem_mi.max(1)
    ));
    Ok(out)
}

fn describe_configmap(state: &ClusterState, name: &str, ns: &str) -> Result<String, String> {
    let c = state
        .config_map(ns, name)
        .ok_or_else(|| not_found("configmaps", name))?;
    let mut out = String::new();
    out.push_str(&format!("Name:         {}\n", c.metadata.name));
    out.push_str(&format!("Namespace:    {}\n", ns));
    out.push_str("Labels:       <none>\nAnnotations:  <none>\n\nData\n====");
    for (k, v) in &c.data {
        out.push_str(&format!("\n{}:\n----\n{}", k, v));
    }
    out.push_str("\n\nBinaryData\n====\n\nEvents:  <none>");
    Ok(out)
}

fn describe_secret(state: &ClusterState, name: &str, ns: &str) -> Result<String, String> {
    let s = state
        .secret(ns, name)
        .ok_or_else(|| not_found("secrets", name))?;
    let mut out = String::new();
    out.push_str(&format!("Name:         {}\n", s.metadata.name));
    out.push_str(&format!("Namespace:    {}\n", ns));
    out.push_str("Labels:       <none>\nAnnotations:  <none>\n\n");
    out.push_str(&format!("Type:  {}\n\nData\n====", s.secret_type));
    for (k, v) in &s.data {
        let len = crate::b64_decode(v).map(|d| d.len()).unwrap_or(v.len());
        out.push_str(&format!("\n{}:  {} bytes", k, len));
    }
    Ok(out)
}

fn describe_namespace(state: &ClusterState, name: &str) -> Result<String, String> {
    if !state.has_namespace(name) {
        return Err(not_found("namespaces", name));
    }
    let quotas: Vec<&ResourceQuota> = state
        .resource_quotas
        .iter()
        .filter(|q| q.metadata.namespace == name)
        .collect();
    let mut out = String::new();
    out.push_str(&format!("Name:         {}\n", name));
    out.push_str("Labels:       kubernetes.io/metadata.name=");
    out.push_str(name);
    out.push_str("\nAnnotations:  <none>\nStatus:       Active\n\n");
    if quotas.is_empty() {
        out.push_str("No resource quota.\n\nNo LimitRange resource.");
    } else {
        out.push_str("Resource Quotas\n");
        for q in quotas {
            out.push_str(&format!("  Name:     {}\n", q.metadata.name));
            for (k, v) in &q.hard {
                out.push_str(&format!("  {}: {}\n", k, v));
            }
        }
        out.push_str("\nNo LimitRange resource.");
    }
    Ok(out)
}

fn describe_pvc(state: &ClusterState, name: &str, ns: &str) -> Result<String, String> {
    let pvc = state
        .pvcs
        .iter()
        .find(|p| p.metadata.namespace == ns && p.metadata.name == name)
        .ok_or_else(|| not_found("persistentvolumeclaims", name))?;
    let mut out = String::new();
    out.push_str(&format!("Name:          {}\n", pvc.metadata.name));
    out.push_str(&format!("Namespace:     {}\n", ns));
    out.push_str(&format!("StorageClass:  {}\n", pvc.storage_class));
    out.push_str(&format!("Status:        {}\n", pvc.status));
    out.push_str(&format!("Volume:        {}\n", pvc.volume_name));
    out.push_str(&format!(
        "Capacity:      {}\n",
        if pvc.status == "Bound" { &pvc.request } else { "" }
    ));
    out.push_str(&format!(
        "Access Modes:  {}\n",
        access_abbrev(&pvc.access_modes)
    ));
    if pvc.status == "Pending" {
        out.push_str("Events:\n  Type    Reason                Age   From                         Message\n  ----    ------                ----  ----                         -------\n  Normal  WaitForFirstConsumer  1s    persistentvolume-controller  waiting for first consumer to be created before binding");
    } else {
        out.push_str("Events:        <none>");
    }
    Ok(out)
}

fn describe_pv(state: &ClusterState, name: &str) -> Result<String, String> {
    let pv = state
        .persistent_volumes
        .iter()
        .find(|p| p.metadata.name == name)
        .ok_or_else(|| not_found("persistentvolumes", name))?;
    let mut out = String::new();
    out.push_str(&format!("Name:            {}\n", pv.metadata.name));
    out.push_str(&format!("StorageClass:    {}\n", pv.storage_class));
    out.push_str(&format!("Status:          {}\n", pv.status));
    out.push_str(&format!("Claim:           {}\n", pv.claim_ref));
    out.push_str(&format!("Reclaim Policy:  {}\n", pv.reclaim_policy));
    out.push_str(&format!(
        "Access Modes:    {}\n",
        access_abbrev(&pv.access_modes)
    ));
    out.push_str(&format!("Capacity:        {}\n", pv.capacity));
    if !pv.host_path.is_empty() {
        out.push_str(&format!(
            "Source:\n    Type:  HostPath\n    Path:  {}\n",
            pv.host_path
        ));
    }
    out.push_str("Events:          <none>");
    Ok(out)
}

fn describe_hpa(state: &ClusterState, name: &str, ns: &str) -> Result<String, String> {
    let h = state
        .hpas
        .iter()
        .find(|h| h.metadata.namespace == ns && h.metadata.name == name)
        .ok_or_else(|| not_found("horizontalpodautoscalers", name))?;
    let mut out = String::new();
    out.push_str(&format!("Name:                   {}\n", h.metadata.name));
    out.push_str(&format!("Namespace:              {}\n", ns));
    out.push_str(&format!(
        "Reference:              Deployment/{}\n",
        h.target
    ));
    out.push_str(&format!(
        "Metrics:                resource cpu on pods (as a percentage of request): {}% / {}%\n",
        h.current_cpu, h.target_cpu
    ));
    out.push_str(&format!("Min replicas:           {}\n", h.min_replicas));
    out.push_str(&format!("Max replicas:           {}\n", h.max_replicas));
    out.push_str(&format!(
        "Behavior:\n  Scale Down:\n    Stabilization Window: {} seconds\n",
        h.scale_down_stabilization
    ));
    out.push_str("Events:                 <none>");
    Ok(out)
}

fn describe_ingress(state: &ClusterState, name: &str, ns: &str) -> Result<String, String> {
    let i = state
        .ingresses
        .iter()
        .find(|i| i.metadata.namespace == ns && i.metadata.name == name)
        .ok_or_else(|| not_found("ingresses", name))?;
    let mut out = String::new();
    out.push_str(&format!("Name:             {}\n", i.metadata.name));
    out.push_str(&format!("Namespace:        {}\n", ns));
    out.push_str(&format!(
        "Ingress Class:    {}\n",
        if i.class_name.is_empty() {
            "<none>"
        } else {
            &i.class_name
        }
    ));
    out.push_str("Rules:\n  Host          Path  Backends\n  ----          ----  --------\n");
    for r in &i.rules {
        out.push_str(&format!(
            "  {}  {}  {}:{}\n",
            if r.host.is_empty() { "*" } else { &r.host },
            if r.path.is_empty() { "/" } else { &r.path },
            r.service,
            r.port
        ));
    }
    out.push_str("Events:           <none>");
    Ok(out)
}

// ---------------------------------------------------------------------------
// logs / top
// ---------------------------------------------------------------------------

/// Synthesized container logs keyed off phase and image family.
pub fn logs(state: &ClusterState, ns: &str, name: &str) -> Result<String, String> {
    let p = state.pod(ns, name).ok_or_else(|| not_found("pods", name))?;
    let container = p
        .spec
        .containers
        .first()
        .map(|c| c.name.clone())
        .unwrap_or_else(|| name.to_string());
    match p.status.phase {
        PodPhase::Pending => Err(format!(
            "Error from server (BadRequest): container \"{}\" in pod \"{}\" is waiting to start: ContainerCreating",
            container, name
        )),
        PodPhase::ImagePullBackOff => Err(format!(
            "Error from server (BadRequest): container \"{}\" in pod \"{}\" is waiting to start: trying and failing to pull image",
            container, name
        )),
        PodPhase::CrashLoopBackOff => Ok(format!(
            "{}\nError: {}\nexit status 1",
            image_logs(p.image()),
            if p.status.message.is_empty() {
                "container exited with a non-zero status".to_string()
            } else {
                p.status.message.clone()
            }
        )),
        PodPhase::Completed => Ok("job finished successfully".into()),
        _ => Ok(image_logs(p.image())),
    }
}

fn image_logs(image: &str) -> String {
    let base = image
        .split('/')
        .last()
        .unwrap_or(image)
        .split(':')
        .next()
        .unwrap_or(image);
    match base {
        "nginx" => "\
/docker-entrypoint.sh: /docker-entrypoint.d/ is not empty, will attempt to perform configuration
/docker-entrypoint.sh: Configuration complete; ready for start up
2024/06/01 10:00:01 [notice] 1#1: using the \"epoll\" event method
2024/06/01 10:00:01 [notice] 1#1: nginx/1.25.4
2024/06/01 10:00:01 [notice] 1#1: start worker processes"
            .into(),
        "redis" => "\
1:C 01 Jun 2024 10:00:01.000 * oO0OoO0OoO0Oo Redis is starting oO0OoO0OoO0Oo
1:M 01 Jun 2024 10:00:01.001 * monotonic clock: POSIX clock_gettime
1:M 01 Jun 2024 10:00:01.002 * Ready to accept connections tcp"
            .into(),
        "postgres" => "\
PostgreSQL init process complete; ready for start up.
2024-06-01 10:00:01.000 UTC [1] LOG:  listening on IPv4 address \"0.0.0.0\", port 5432
2024-06-01 10:00:01.003 UTC [1] LOG:  database system is ready to accept connections"
            .into(),
        "busybox" | "alpine" => String::new(),
        other => format!("{} starting\n{} ready", other, other),
    }
}

/// `kubectl top`: deterministic usage derived from the uid so repeated
/// calls agree.
pub fn top_pods(state: &ClusterState, opts: &GetOpts) -> String {
    let mut headers = vec!["NAME", "CPU(cores)", "MEMORY(bytes)"];
    let mut rows = Vec::new();
    for p in &state.pods {
        if !in_scope(opts, &p.metadata) {
            continue;
        }
        if !matches!(p.status.phase, PodPhase::Running) {
            continue;
        }
        let h = uid_hash(&p.metadata.uid);
        let mut row = vec![
            p.metadata.name.clone(),
            format!("{}m", 2 + h % 45),
            format!("{}Mi", 8 + (h >> 8) % 120),
        ];
        if opts.all_namespaces {
            row.insert(0, p.metadata.namespace.clone());
        }
        rows.push(row);
    }
    if opts.all_namespaces {
        headers.insert(0, "NAMESPACE");
    }
    if rows.is_empty() {
        return format!("No resources found in {} namespace.", opts.namespace);
    }
    table(&headers, &rows)
}

pub fn top_nodes(state: &ClusterState) -> String {
    let headers = ["NAME", "CPU(cores)", "CPU%", "MEMORY(bytes)", "MEMORY%"];
    let rows: Vec<Vec<String>> = state
        .nodes
        .iter()
        .map(|n| {
            let pods = state
                .pods
                .iter()
                .filter(|p| p.status.node.as_deref() == Some(n.metadata.name.as_str()))
                .count() as u32;
            let cpu = 120 + pods * 35;
            let mem = 800 + pods * 96;
            vec![
                n.metadata.name.clone(),
                format!("{}m", cpu),
                format!("{}%", cpu * 100 / n.allocatable_cpu_m.max(1)),
                format!("{}Mi", mem),
                format!("{}%", mem * 100 / n.allocatable_mem_mi.max(1)),
            ]
        })
        .collect();
    table(&headers, &rows)
}

fn uid_hash(uid: &str) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in uid.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x1000_0000_01b3);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::initial_cluster_state;
    use crate::yamlish;

    fn opts(ns: &str) -> GetOpts {
        GetOpts {
            namespace: ns.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_get_pods_empty_default() {
        let s = initial_cluster_state();
        let out = get(&s, "pods", None, &opts("default")).unwrap();
        assert_eq!(out, "No resources found in default namespace.");
    }

    #[test]
    fn test_get_pods_kube_system() {
        let s = initial_cluster_state();
        let out = get(&s, "pods", None, &opts("kube-system")).unwrap();
        assert!(out.starts_with("NAME"));
        assert!(out.contains("etcd-controlplane"));
        assert!(out.contains("Running"));
    }

    #[test]
    fn test_get_named_pod_not_found() {
        let s = initial_cluster_state();
        let err = get(&s, "pods", Some("ghost"), &opts("default")).unwrap_err();
        assert_eq!(
            err,
            "Error from server (NotFound): pods \"ghost\" not found"
        );
    }

    #[test]
    fn test_get_nodes_table() {
        let s = initial_cluster_state();
        let out = get(&s, "nodes", None, &opts("default")).unwrap();
        assert!(out.contains("controlplane"));
        assert!(out.contains("control-plane"));
        assert!(out.contains("v1.29.3"));
    }

    #[test]
    fn test_all_namespaces_adds_column() {
        let s = initial_cluster_state();
        let out = get(
            &s,
            "pods",
            None,
            &GetOpts {
                namespace: "default".into(),
                all_namespaces: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(out.starts_with("NAMESPACE"));
        assert!(out.contains("kube-system"));
    }

    #[test]
    fn test_selector_filters() {
        let s = initial_cluster_state();
        let mut sel = BTreeMap::new();
        sel.insert("k8s-app".to_string(), "kube-dns".to_string());
        let out = get(
            &s,
            "pods",
            None,
            &GetOpts {
                namespace: "kube-system".into(),
                selector: Some(sel),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(out.contains("coredns"));
        assert!(!out.contains("etcd-controlplane"));
    }

    #[test]
    fn test_output_name() {
        let s = initial_cluster_state();
        let out = get(
            &s,
            "services",
            None,
            &GetOpts {
                namespace: "default".into(),
                output: Some("name".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(out, "service/kubernetes");
    }

    #[test]
    fn test_output_yaml_is_stable() {
        let s = initial_cluster_state();
        let a = get(
            &s,
            "services",
            Some("kubernetes"),
            &GetOpts {
                namespace: "default".into(),
                output: Some("yaml".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let b = get(
            &s,
            "services",
            Some("kubernetes"),
            &GetOpts {
                namespace: "default".into(),
                output: Some("yaml".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("apiVersion: v1"));
        assert!(a.contains("kind: Service"));
        assert!(a.contains("clusterIP: 10.96.0.1"));
    }

    #[test]
    fn test_output_json_parses() {
        let s = initial_cluster_state();
        let out = get(
            &s,
            "pods",
            None,
            &GetOpts {
                namespace: "kube-system".into(),
                output: Some("json".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["kind"], "List");
        assert!(v["items"].as_array().unwrap().len() >= 5);
    }

    #[test]
    fn test_describe_pod_has_events() {
        let s = initial_cluster_state();
        let yaml = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: nginx\nspec:\n  containers:\n  - name: nginx\n    image: nginx\n";
        let (_, s2) = yamlish::apply(yaml, "default", &s);
        let out = describe(&s2, "pods", "nginx", "default").unwrap();
        assert!(out.contains("Name:             nginx"));
        assert!(out.contains("Image:          nginx"));
        assert!(out.contains("Scheduled"));
    }

    #[test]
    fn test_logs_by_phase() {
        let s = initial_cluster_state();
        let good = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: web\nspec:\n  containers:\n  - name: web\n    image: nginx\n";
        let bad = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: broken\nspec:\n  containers:\n  - name: app\n    image: no-such-image-xyz\n";
        let (_, s2) = yamlish::apply(good, "default", &s);
        let (_, s3) = yamlish::apply(bad, "default", &s2);
        assert!(logs(&s3, "default", "web").unwrap().contains("nginx"));
        let err = logs(&s3, "default", "broken").unwrap_err();
        assert!(err.contains("failing to pull image"));
    }

    #[test]
    fn test_wide_output_has_node() {
        let s = initial_cluster_state();
        let out = get(
            &s,
            "pods",
            None,
            &GetOpts {
                namespace: "kube-system".into(),
                wide: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(out.contains("NODE"));
        assert!(out.contains("controlplane"));
    }

    #[test]
    fn test_top_nodes() {
        let s = initial_cluster_state();
        let out = top_nodes(&s);
        assert!(out.contains("CPU(cores)"));
        assert!(out.contains("node01"));
    }
}
