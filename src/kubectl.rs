//! The kubectl interpreter. Parses a tokenized command line, enforces the
//! etcd gate and RBAC, and routes to per-verb handlers. Handlers operate
//! copy-on-write: failures leave the caller's state untouched.

use crate::rbac::{self, CanIOptions};
use crate::render::{self, GetOpts};
use crate::sched;
use crate::state::*;
use crate::yamlish;
use std::collections::{BTreeMap, HashMap};

/// Follow-up the dispatcher must perform after a kubectl command. The
/// interpreter itself never touches the filesystem; anything involving a
/// path is handed back through one of these.
pub enum Action {
    None,
    /// Open the editor on a rendered resource; the edited buffer comes
    /// back through `finish_edit`.
    Edit {
        resource: String,
        namespace: String,
        name: String,
        content: String,
    },
    /// Enter an interactive in-pod session.
    Exec { namespace: String, pod: String },
    /// `create/apply/delete -f PATH` — the caller reads the manifest and
    /// feeds it back through `apply_file`.
    File(FileRequest),
    /// `cp pod:src dst` — the caller writes the file.
    WriteFile { path: String, content: String },
    /// `cp src pod:dst` — the caller checks the source exists.
    ReadFile { path: String },
}

#[derive(Clone, Copy)]
pub enum FileOp {
    Create,
    Apply,
    Delete,
}

pub struct FileRequest {
    pub op: FileOp,
    pub path: String,
    pub namespace: String,
    pub as_user: Option<String>,
    pub as_groups: Vec<String>,
}

pub struct RunResult {
    pub output: String,
    pub state: ClusterState,
    pub action: Action,
}

fn text(output: String, state: ClusterState) -> RunResult {
    RunResult {
        output,
        state,
        action: Action::None,
    }
}

const CONNECTION_REFUSED: &str =
    "The connection to the server 10.0.0.10:6443 was refused - did you specify the right host or port?";

/// Flags that take a value. Everything else parses as boolean.
const VALUE_FLAGS: &[&str] = &[
    "-n",
    "--namespace",
    "-o",
    "--output",
    "-l",
    "--selector",
    "-f",
    "--filename",
    "-c",
    "--container",
    "--replicas",
    "--image",
    "--port",
    "--target-port",
    "--type",
    "--name",
    "--env",
    "--from-literal",
    "--from-file",
    "--schedule",
    "--serviceaccount",
    "--clusterrole",
    "--role",
    "--user",
    "--group",
    "--as",
    "--as-group",
    "--cpu-percent",
    "--min",
    "--max",
    "--restart",
    "--dry-run",
    "--tail",
    "--sort-by",
    "--verb",
    "--resource",
    "--grace-period",
    "--cascade",
    "--hard",
    "--value",
    "--to-revision",
    "--timeout",
    "--requests",
    "--limits",
    "--endpoints",
    "--cacert",
    "--cert",
    "--key",
    "--data-dir",
    "--write-out",
    "-w",
];

pub struct Parsed {
    pub args: Vec<String>,
    pub flags: HashMap<String, Vec<String>>,
    /// Tokens after a bare `--`.
    pub trailing: Vec<String>,
}

impl Parsed {
    pub fn flag(&self, names: &[&str]) -> Option<&str> {
        for n in names {
            if let Some(v) = self.flags.get(*n).and_then(|v| v.first()) {
                return Some(v.as_str());
            }
        }
        None
    }
    pub fn all(&self, names: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        for n in names {
            if let Some(v) = self.flags.get(*n) {
                out.extend(v.iter().cloned());
            }
        }
        out
    }
    pub fn has(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.flags.contains_key(*n))
    }
    pub fn namespace(&self) -> String {
        self.flag(&["-n", "--namespace"]).unwrap_or("default").into()
    }
}

pub fn parse(tokens: &[String]) -> Parsed {
    let mut parsed = Parsed {
        args: Vec::new(),
        flags: HashMap::new(),
        trailing: Vec::new(),
    };
    let mut i = 0;
    let mut after_dashes = false;
    while i < tokens.len() {
        let t = &tokens[i];
        if after_dashes {
            parsed.trailing.push(t.clone());
            i += 1;
            continue;
        }
        if t == "--" {
            after_dashes = true;
            i += 1;
            continue;
        }
        if t.starts_with('-') && t.len() > 1 && !t.chars().nth(1).map(|c| c.is_ascii_digit()).unwrap_or(false) {
            if let Some((flag, value)) = t.split_once('=') {
                parsed
                    .flags
                    .entry(flag.to_string())
                    .or_default()
                    .push(value.to_string());
            } else if VALUE_FLAGS.contains(&t.as_str()) {
                let value = tokens.get(i + 1).cloned().unwrap_or_default();
                parsed.flags.entry(t.clone()).or_default().push(value);
                i += 1;
            } else if t == "-it" || t == "-ti" {
                parsed.flags.entry("-i".into()).or_default();
                parsed.flags.entry("-t".into()).or_default();
            } else {
                parsed.flags.entry(t.clone()).or_default();
            }
        } else {
            parsed.args.push(t.clone());
        }
        i += 1;
    }
    parsed
}

pub fn parse_selector(s: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for pair in s.split(',') {
        if let Some((k, v)) = pair.split_once('=') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    map
}

/// "deployment/web" or ("deployment", "web") positional form.
fn resource_and_name(args: &[String]) -> Option<(String, String)> {
    let first = args.first()?;
    if let Some((r, n)) = first.split_once('/') {
        return Some((r.to_string(), n.to_string()));
    }
    let name = args.get(1)?;
    Some((first.clone(), name.clone()))
}

/// Verb used for RBAC checks per kubectl command.
fn rbac_verb(verb: &str) -> &'static str {
    match verb {
        "get" | "describe" | "logs" | "top" | "explain" => "get",
        "run" | "create" | "apply" | "expose" | "autoscale" => "create",
        "delete" | "drain" => "delete",
        "scale" | "edit" | "label" | "annotate" | "set" | "rollout" | "taint" | "cordon"
        | "uncordon" | "patch" => "update",
        "exec" | "port-forward" | "cp" | "attach" => "create",
        _ => "get",
    }
}

fn authorize(
    state: &ClusterState,
    verb: &str,
    resource: &str,
    ns: &str,
    parsed: &Parsed,
) -> Result<(), String> {
    authorize_as(
        state,
        verb,
        resource,
        ns,
        parsed.flag(&["--as"]),
        &parsed.all(&["--as-group"]),
    )
}

fn authorize_as(
    state: &ClusterState,
    verb: &str,
    resource: &str,
    ns: &str,
    as_user: Option<&str>,
    as_groups: &[String],
) -> Result<(), String> {
    let opts = CanIOptions {
        as_user: as_user.map(|s| s.to_string()),
        as_groups: as_groups.to_vec(),
        namespace: ns.to_string(),
        resource_name: String::new(),
    };
    let decision = rbac::can_i(verb, resource, state, &opts);
    if decision.allowed {
        return Ok(());
    }
    let (res, group) = rbac::split_resource_group(resource);
    let user = opts
        .as_user
        .unwrap_or_else(|| {
            state
                .current_context()
                .map(|c| c.user.clone())
                .unwrap_or_default()
        });
    Err(format!(
        "Error from server (Forbidden): {} is forbidden: User \"{}\" cannot {} resource \"{}\" in API group \"{}\" in the namespace \"{}\"",
        res, user, verb, res, group, ns
    ))
}

pub fn run(tokens: &[String], state: &ClusterState) -> RunResult {
    if tokens.is_empty() {
        return text(usage(), state.clone());
    }
    let verb = tokens[0].as_str();
    let parsed = parse(&tokens[1..]);

    // Everything that talks to the API server fails while etcd is down.
    // `config` is client-side and keeps working.
    if state.etcd.corrupted && verb != "config" && verb != "version" && verb != "explain" {
        return text(CONNECTION_REFUSED.into(), state.clone());
    }

    let result = match verb {
        "get" => cmd_get(&parsed, state),
        "describe" => cmd_describe(&parsed, state),
        "logs" => cmd_logs(&parsed, state),
        "run" => cmd_run(&parsed, state),
        "create" | "apply" | "delete"
            if parsed.flag(&["-f", "--filename"]).is_some() =>
        {
            return file_handoff(verb, &parsed, state);
        }
        "delete" => cmd_delete(&parsed, state),
        "create" => cmd_create(&parsed, state),
        "apply" => Err("error: must specify one of -f and -k".into()),
        "scale" => cmd_scale(&parsed, state),
        "expose" => cmd_expose(&parsed, state),
        "edit" => return cmd_edit(&parsed, state),
        "label" => cmd_label(&parsed, state),
        "annotate" => cmd_annotate(&parsed, state),
        "taint" => cmd_taint(&parsed, state),
        "cordon" => cmd_cordon(&parsed, state, true),
        "uncordon" => cmd_cordon(&parsed, state, false),
        "drain" => cmd_drain(&parsed, state),
        "rollout" => cmd_rollout(&parsed, state),
        "set" => cmd_set(&parsed, state),
        "autoscale" => cmd_autoscale(&parsed, state),
        "top" => cmd_top(&parsed, state),
        "exec" => return cmd_exec(&parsed, state),
        "port-forward" => cmd_port_forward(&parsed, state),
        "cp" => return cmd_cp(&parsed, state),
        "config" => cmd_config(&parsed, state),
        "auth" => cmd_auth(&parsed, state),
        "api-resources" => Ok((api_resources(), None)),
        "explain" => cmd_explain(&parsed),
        "cluster-info" => Ok((cluster_info(), None)),
        "version" => Ok((version_output(), None)),
        other => Err(format!(
            "error: unknown command \"{}\" for \"kubectl\"\n\nRun 'kubectl --help' for usage.",
            other
        )),
    };

    match result {
        Ok((output, Some(next))) => text(output, next),
        Ok((output, None)) => text(output, state.clone()),
        Err(e) => text(e, state.clone()),
    }
}

type Handler = Result<(String, Option<ClusterState>), String>;

fn file_handoff(verb: &str, parsed: &Parsed, state: &ClusterState) -> RunResult {
    let op = match verb {
        "create" => FileOp::Create,
        "apply" => FileOp::Apply,
        _ => FileOp::Delete,
    };
    let path = parsed
        .flag(&["-f", "--filename"])
        .unwrap_or_default()
        .to_string();
    RunResult {
        output: String::new(),
        state: state.clone(),
        action: Action::File(FileRequest {
            op,
            path,
            namespace: parsed.namespace(),
            as_user: parsed.flag(&["--as"]).map(|s| s.to_string()),
            as_groups: parsed.all(&["--as-group"]),
        }),
    }
}

/// Run a `create/apply/delete -f` manifest the caller has already read.
/// Every document is authorized by its own kind before anything mutates.
pub fn apply_file(req: &FileRequest, content: &str, state: &ClusterState) -> (String, ClusterState) {
    let verb = match req.op {
        FileOp::Delete => "delete",
        _ => "create",
    };
    for doc_text in yamlish::split_documents(content) {
        let doc = yamlish::parse_document(&doc_text);
        let ns = if doc.namespace.is_empty() {
            req.namespace.clone()
        } else {
            doc.namespace.clone()
        };
        if let Err(e) = authorize_as(
            state,
            verb,
            resource_of_kind(&doc.kind),
            &ns,
            req.as_user.as_deref(),
            &req.as_groups,
        ) {
            return (e, state.clone());
        }
    }
    let (out, next) = match req.op {
        FileOp::Delete => yamlish::delete(content, &req.namespace, state),
        _ => yamlish::apply(content, &req.namespace, state),
    };
    if out.starts_with("Error") || out.starts_with("error") {
        return (out, state.clone());
    }
    // `create -f` refuses to touch existing objects.
    if matches!(req.op, FileOp::Create)
        && (out.contains("configured") || out.contains("unchanged"))
    {
        return (
            "Error from server (AlreadyExists): object already exists".into(),
            state.clone(),
        );
    }
    (out, next)
}

fn resource_of_kind(kind: &str) -> &'static str {
    match kind {
        "Pod" => "pods",
        "Deployment" => "deployments",
        "Service" => "services",
        "Namespace" => "namespaces",
        "ConfigMap" => "configmaps",
        "Secret" => "secrets",
        "Job" => "jobs",
        "CronJob" => "cronjobs",
        "DaemonSet" => "daemonsets",
        "StatefulSet" => "statefulsets",
        "ServiceAccount" => "serviceaccounts",
        "Role" => "roles",
        "RoleBinding" => "rolebindings",
        "ClusterRole" => "clusterroles",
        "ClusterRoleBinding" => "clusterrolebindings",
        "HorizontalPodAutoscaler" => "horizontalpodautoscalers",
        "StorageClass" => "storageclasses",
        "PersistentVolume" => "persistentvolumes",
        "PersistentVolumeClaim" => "persistentvolumeclaims",
        "NetworkPolicy" => "networkpolicies",
        "Ingress" => "ingresses",
        "GatewayClass" => "gatewayclasses",
        "Gateway" => "gateways",
        "HTTPRoute" => "httproutes",
        "PriorityClass" => "priorityclasses",
        "ResourceQuota" => "resourcequotas",
        "LimitRange" => "limitranges",
        _ => "pods",
    }
}

fn usage() -> String {
    "kubectl controls the Kubernetes cluster manager.\n\n Basic Commands:\n  create          Create a resource from a file or from stdin\n  expose          Expose a resource as a new Kubernetes service\n  run             Run a particular image on the cluster\n  get             Display one or many resources\n  edit            Edit a resource on the server\n  delete          Delete resources\n\nUse \"kubectl <command> --help\" for more information about a given command.".into()
}

fn version_output() -> String {
    format!(
        "Client Version: {v}\nKustomize Version: v5.0.4-0.20230601165947-6ce0bf390ce3\nServer Version: {v}",
        v = CLUSTER_VERSION
    )
}

fn cluster_info() -> String {
    format!(
        "Kubernetes control plane is running at {api}\nCoreDNS is running at {api}/api/v1/namespaces/kube-system/services/kube-dns:dns/proxy\n\nTo further debug and diagnose cluster problems, use 'kubectl cluster-info dump'.",
        api = API_SERVER
    )
}

fn get_opts(parsed: &Parsed) -> GetOpts {
    GetOpts {
        namespace: parsed.namespace(),
        all_namespaces: parsed.has(&["-A", "--all-namespaces"]),
        output: parsed.flag(&["-o", "--output"]).map(|s| {
            if s == "wide" {
                "wide".to_string()
            } else {
                s.to_string()
            }
        }),
        show_labels: parsed.has(&["--show-labels"]),
        selector: parsed.flag(&["-l", "--selector"]).map(parse_selector),
        wide: parsed.flag(&["-o", "--output"]) == Some("wide"),
    }
}

fn cmd_get(parsed: &Parsed, state: &ClusterState) -> Handler {
    let Some(first) = parsed.args.first() else {
        return Err("error: you must specify the type of resource to get. Use \"kubectl api-resources\" for a complete list of supported resources.".into());
    };
    let opts = get_opts(parsed);
    let mut outputs = Vec::new();
    // "pods,svc" and "pod/name" forms both come through here.
    let (words, name) = if let Some((r, n)) = first.split_once('/') {
        (vec![r.to_string()], Some(n.to_string()))
    } else {
        (
            first.split(',').map(|s| s.to_string()).collect(),
            parsed.args.get(1).cloned(),
        )
    };
    for word in &words {
        let resource = render::normalize_resource(word).ok_or_else(|| {
            format!(
                "error: the server doesn't have a resource type \"{}\"",
                word
            )
        })?;
        if resource != "all" {
            authorize(state, "list", resource, &opts.namespace, parsed)?;
        }
        outputs.push(render::get(state, resource, name.as_deref(), &opts)?);
    }
    Ok((outputs.join("\n\n"), None))
}

fn cmd_describe(parsed: &Parsed, state: &ClusterState) -> Handler {
    let Some((word, name)) = resource_and_name(&parsed.args) else {
        return Err("error: You must specify the type of resource to describe.".into());
    };
    let resource = render::normalize_resource(&word).ok_or_else(|| {
        format!(
            "error: the server doesn't have a resource type \"{}\"",
            word
        )
    })?;
    let ns = parsed.namespace();
    authorize(state, "get", resource, &ns, parsed)?;
    Ok((render::describe(state, resource, &name, &ns)?, None))
}

fn cmd_logs(parsed: &Parsed, state: &ClusterState) -> Handler {
    let Some(name) = parsed.args.first() else {
        return Err("error: expected 'logs [-f] [-p] (POD | TYPE/NAME) [-c CONTAINER]'.\nPOD or TYPE/NAME is a required argument for the logs command".into());
    };
    let ns = parsed.namespace();
    authorize(state, "get", "pods/log", &ns, parsed)?;
    let name = name.strip_prefix("pod/").unwrap_or(name);
    Ok((render::logs(state, &ns, name)?, None))
}

fn cmd_run(parsed: &Parsed, state: &ClusterState) -> Handler {
    let Some(name) = parsed.args.first() else {
        return Err("error: NAME is required for run".into());
    };
    let Some(image) = parsed.flag(&["--image"]) else {
        return Err("error: --image is required".into());
    };
    let ns = parsed.namespace();
    authorize(state, "create", "pods", &ns, parsed)?;
    if !state.has_namespace(&ns) {
        return Err(format!(
            "Error from server (NotFound): namespaces \"{}\" not found",
            ns
        ));
    }
    if state.pod(&ns, name).is_some() {
        return Err(format!(
            "Error from server (AlreadyExists): pods \"{}\" already exists",
            name
        ));
    }
    let mut container = ContainerSpec {
        name: name.clone(),
        image: image.to_string(),
        command: parsed.trailing.clone(),
        ..Default::default()
    };
    if let Some(port) = parsed.flag(&["--port"]) {
        if let Ok(p) = port.parse() {
            container.ports.push(p);
        }
    }
    for env in parsed.all(&["--env"]) {
        let (k, v) = env.split_once('=').unwrap_or((env.as_str(), ""));
        container.env.push(EnvVar {
            name: k.to_string(),
            value: v.to_string(),
            value_from: String::new(),
        });
    }
    let mut labels = BTreeMap::new();
    labels.insert("run".to_string(), name.clone());
    let spec = PodSpec {
        containers: vec![container],
        ..Default::default()
    };
    let mut next = state.clone();
    sched::make_pod(&mut next, name, &ns, labels, spec);
    Ok((format!("pod/{} created", name), Some(next)))
}

/// Kind name used by delete/create from a resource word.
fn kind_of(resource: &str) -> &'static str {
    match resource {
        "pods" => "Pod",
        "deployments" => "Deployment",
        "services" => "Service",
        "configmaps" => "ConfigMap",
        "secrets" => "Secret",
        "namespaces" => "Namespace",
        "horizontalpodautoscalers" => "HorizontalPodAutoscaler",
        "jobs" => "Job",
        "cronjobs" => "CronJob",
        "daemonsets" => "DaemonSet",
        "statefulsets" => "StatefulSet",
        "roles" => "Role",
        "rolebindings" => "RoleBinding",
        "clusterroles" => "ClusterRole",
        "clusterrolebindings" => "ClusterRoleBinding",
        "serviceaccounts" => "ServiceAccount",
        "storageclasses" => "StorageClass",
        "persistentvolumes" => "PersistentVolume",
        "persistentvolumeclaims" => "PersistentVolumeClaim",
        "networkpolicies" => "NetworkPolicy",
        "ingresses" => "Ingress",
        "gatewayclasses" => "GatewayClass",
        "gateways" => "Gateway",
        "httproutes" => "HTTPRoute",
        "priorityclasses" => "PriorityClass",
        "resourcequotas" => "ResourceQuota",
        "limitranges" => "LimitRange",
        _ => "Unknown",
    }
}

fn cmd_delete(parsed: &Parsed, state: &ClusterState) -> Handler {
    let ns = parsed.namespace();
    let Some(word) = parsed.args.first() else {
        return Err("error: resource(s) were provided, but no name was specified".into());
    };
    let (word, names): (String, Vec<String>) = if let Some((r, n)) = word.split_once('/') {
        (r.to_string(), vec![n.to_string()])
    } else {
        (word.clone(), parsed.args[1..].to_vec())
    };
    let resource = render::normalize_resource(&word).ok_or_else(|| {
        format!(
            "error: the server doesn't have a resource type \"{}\"",
            word
        )
    })?;
    authorize(state, "delete", resource, &ns, parsed)?;
    let kind = kind_of(resource);

    let mut next = state.clone();
    let mut lines = Vec::new();

    // -l selector deletes everything it matches.
    let names = if let Some(sel) = parsed.flag(&["-l", "--selector"]) {
        let sel = parse_selector(sel);
        render::names_of(
            state,
            resource,
            &GetOpts {
                namespace: ns.clone(),
                selector: Some(sel),
                ..Default::default()
            },
        )
    } else {
        names
    };
    if names.is_empty() {
        return Ok(("No resources found".into(), None));
    }

    for name in &names {
        let singular = render::singular(resource);
        yamlish::delete_resource(kind, name, &ns, &mut next)?;
        lines.push(format!("{} \"{}\" deleted", singular, name));
        // A deployment-owned pod comes straight back with a fresh name.
        if resource == "pods" {
            let deployments: Vec<String> = next
                .deployments
                .iter()
                .filter(|d| d.metadata.namespace == ns)
                .map(|d| d.metadata.name.clone())
                .collect();
            for d in deployments {
                lines.extend(sched::reconcile_deployment(&mut next, &ns, &d));
            }
        }
    }
    Ok((lines.join("\n"), Some(next)))
}

fn cmd_create(parsed: &Parsed, state: &ClusterState) -> Handler {
    let ns = parsed.namespace();
    let Some(what) = parsed.args.first().map(|s| s.as_str()) else {
        return Err("error: you must specify resources to create".into());
    };
    let name = parsed.args.get(1).cloned();
    let mut next = state.clone();
    match what {
        "namespace" | "ns" => {
            let name = name.ok_or("error: NAME is required")?;
            authorize(state, "create", "namespaces", &ns, parsed)?;
            if next.has_namespace(&name) {
                return Err(format!(
                    "Error from server (AlreadyExists): namespaces \"{}\" already exists",
                    name
                ));
            }
            next.namespaces.push(name.clone());
            Ok((format!("namespace/{} created", name), Some(next)))
        }
        "deployment" | "deploy" => {
            let name = name.ok_or("error: NAME is required")?;
            let image = parsed.flag(&["--image"]).ok_or("error: --image is required")?;
            authorize(state, "create", "deployments", &ns, parsed)?;
            if next.deployment(&ns, &name).is_some() {
                return Err(format!(
                    "Error from server (AlreadyExists): deployments.apps \"{}\" already exists",
                    name
                ));
            }
            let replicas = parsed
                .flag(&["--replicas"])
                .and_then(|r| r.parse().ok())
                .unwrap_or(1);
            let mut labels = BTreeMap::new();
            labels.insert("app".to_string(), name.clone());
            let mut d = Deployment {
                metadata: Metadata::new(&name, &ns),
                replicas,
                selector: labels.clone(),
                template: PodTemplate {
                    labels: labels.clone(),
                    spec: PodSpec {
                        containers: vec![ContainerSpec {
                            name: name.clone(),
                            image: image.to_string(),
                            ..Default::default()
                        }],
                        ..Default::default()
                    },
                },
                strategy: "RollingUpdate".into(),
            };
            d.metadata.labels = labels;
            d.metadata.uid = next.new_uid();
            d.metadata.created_at = next.clock;
            next.deployments.push(d);
            sched::reconcile_deployment(&mut next, &ns, &name);
            Ok((format!("deployment.apps/{} created", name), Some(next)))
        }
        "configmap" | "cm" => {
            let name = name.ok_or("error: NAME is required")?;
            authorize(state, "create", "configmaps", &ns, parsed)?;
            if next.config_map(&ns, &name).is_some() {
                return Err(format!(
                    "Error from server (AlreadyExists): configmaps \"{}\" already exists",
                    name
                ));
            }
            let mut data = BTreeMap::new();
            for lit in parsed.all(&["--from-literal"]) {
                if let Some((k, v)) = lit.split_once('=') {
                    data.insert(k.to_string(), v.to_string());
                }
            }
            let mut cm = ConfigMap {
                metadata: Metadata::new(&name, &ns),
                data,
            };
            cm.metadata.uid = next.new_uid();
            cm.metadata.created_at = next.clock;
            next.config_maps.push(cm);
            Ok((format!("configmap/{} created", name), Some(next)))
        }
        "secret" => {
            // Only `secret generic NAME --from-literal=...`.
            if parsed.args.get(1).map(|s| s.as_str()) != Some("generic") {
                return Err("error: unknown secret type; only \"generic\" is supported".into());
            }
            let name = parsed
                .args
                .get(2)
                .cloned()
                .ok_or("error: NAME is required")?;
            authorize(state, "create", "secrets", &ns, parsed)?;
            if next.secret(&ns, &name).is_some() {
                return Err(format!(
                    "Error from server (AlreadyExists): secrets \"{}\" already exists",
                    name
                ));
            }
            let mut data = BTreeMap::new();
            for lit in parsed.all(&["--from-literal"]) {
                if let Some((k, v)) = lit.split_once('=') {
                    data.insert(k.to_string(), crate::b64_encode(v));
                }
            }
            let mut sec = Secret {
                metadata: Metadata::new(&name, &ns),
                secret_type: "Opaque".into(),
                data,
            };
            sec.metadata.uid = next.new_uid();
            sec.metadata.created_at = next.clock;
            next.secrets.push(sec);
            Ok((format!("secret/{} created", name), Some(next)))
        }
        "serviceaccount" | "sa" => {
            let name = name.ok_or("error: NAME is required")?;
            authorize(state, "create", "serviceaccounts", &ns, parsed)?;
            let mut sa = ServiceAccount {
                metadata: Metadata::new(&name, &ns),
            };
            sa.metadata.uid = next.new_uid();
            sa.metadata.created_at = next.clock;
            next.service_accounts.push(sa);
            Ok((format!("serviceaccount/{} created", name), Some(next)))
        }
        "role" => {
            let name = name.ok_or("error: NAME is required")?;
            authorize(state, "create", "roles", &ns, parsed)?;
            let rule = rule_from_flags(parsed)?;
            let mut role = Role {
                metadata: Metadata::new(&name, &ns),
                rules: vec![rule],
            };
            role.metadata.uid = next.new_uid();
            role.metadata.created_at = next.clock;
            next.roles.push(role);
            Ok((
                format!("role.rbac.authorization.k8s.io/{} created", name),
                Some(next),
            ))
        }
        "clusterrole" => {
            let name = name.ok_or("error: NAME is required")?;
            authorize(state, "create", "clusterroles", "", parsed)?;
            let rule = rule_from_flags(parsed)?;
            let mut role = ClusterRole {
                metadata: Metadata::new(&name, ""),
                rules: vec![rule],
            };
            role.metadata.uid = next.new_uid();
            role.metadata.created_at = next.clock;
            next.cluster_roles.push(role);
            Ok((
                format!("clusterrole.rbac.authorization.k8s.io/{} created", name),
                Some(next),
            ))
        }
        "rolebinding" => {
            let name = name.ok_or("error: NAME is required")?;
            authorize(state, "create", "rolebindings", &ns, parsed)?;
            let role_ref = binding_role_ref(parsed)?;
            let subjects = binding_subjects(parsed)?;
            let mut b = RoleBinding {
                metadata: Metadata::new(&name, &ns),
                subjects,
                role_ref,
            };
            b.metadata.uid = next.new_uid();
            b.metadata.created_at = next.clock;
            next.role_bindings.push(b);
            Ok((
                format!("rolebinding.rbac.authorization.k8s.io/{} created", name),
                Some(next),
            ))
        }
        "clusterrolebinding" => {
            let name = name.ok_or("error: NAME is required")?;
            authorize(state, "create", "clusterrolebindings", "", parsed)?;
            let role_ref = binding_role_ref(parsed)?;
            let subjects = binding_subjects(parsed)?;
            let mut b = ClusterRoleBinding {
                metadata: Metadata::new(&name, ""),
                subjects,
                role_ref,
            };
            b.metadata.uid = next.new_uid();
            b.metadata.created_at = next.clock;
            next.cluster_role_bindings.push(b);
            Ok((
                format!(
                    "clusterrolebinding.rbac.authorization.k8s.io/{} created",
                    name
                ),
                Some(next),
            ))
        }
        "job" => {
            let name = name.ok_or("error: NAME is required")?;
            let image = parsed.flag(&["--image"]).ok_or("error: --image is required")?;
            authorize(state, "create", "jobs", &ns, parsed)?;
            let yaml = format!(
                "apiVersion: batch/v1\nkind: Job\nmetadata:\n  name: {}\n  namespace: {}\nspec:\n  template:\n    spec:\n      containers:\n      - name: {}\n        image: {}\n",
                name, ns, name, image
            );
            let (out, next) = yamlish::apply(&yaml, &ns, state);
            if out.starts_with("Error") {
                return Err(out);
            }
            Ok((out, Some(next)))
        }
        "cronjob" | "cj" => {
            let name = name.ok_or("error: NAME is required")?;
            let image = parsed.flag(&["--image"]).ok_or("error: --image is required")?;
            let schedule = parsed
                .flag(&["--schedule"])
                .ok_or("error: --schedule is required")?;
            authorize(state, "create", "cronjobs", &ns, parsed)?;
            let mut cj = CronJob {
                metadata: Metadata::new(&name, &ns),
                schedule: schedule.to_string(),
                image: image.to_string(),
                command: parsed.trailing.clone(),
                suspend: false,
            };
            cj.metadata.uid = next.new_uid();
            cj.metadata.created_at = next.clock;
            next.cron_jobs.push(cj);
            Ok((format!("cronjob.batch/{} created", name), Some(next)))
        }
        "priorityclass" | "pc" => {
            let name = name.ok_or("error: NAME is required")?;
            authorize(state, "create", "priorityclasses", "", parsed)?;
            let value = parsed
                .flag(&["--value"])
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let mut pc = PriorityClass {
                metadata: Metadata::new(&name, ""),
                value,
                global_default: parsed.has(&["--global-default"]),
                description: String::new(),
            };
            pc.metadata.uid = next.new_uid();
            pc.metadata.created_at = next.clock;
            next.priority_classes.push(pc);
            Ok((
                format!("priorityclass.scheduling.k8s.io/{} created", name),
                Some(next),
            ))
        }
        "quota" => {
            let name = name.ok_or("error: NAME is required")?;
            authorize(state, "create", "resourcequotas", &ns, parsed)?;
            let mut hard = BTreeMap::new();
            if let Some(spec) = parsed.flag(&["--hard"]) {
                for pair in spec.split(',') {
                    if let Some((k, v)) = pair.split_once('=') {
                        hard.insert(k.to_string(), v.to_string());
                    }
                }
            }
            let mut q = ResourceQuota {
                metadata: Metadata::new(&name, &ns),
                hard,
            };
            q.metadata.uid = next.new_uid();
            q.metadata.created_at = next.clock;
            next.resource_quotas.push(q);
            Ok((format!("resourcequota/{} created", name), Some(next)))
        }
        other => Err(format!("error: unknown object type \"{}\"", other)),
    }
}

fn rule_from_flags(parsed: &Parsed) -> Result<PolicyRule, String> {
    let verbs: Vec<String> = parsed
        .all(&["--verb"])
        .iter()
        .flat_map(|v| v.split(',').map(|s| s.to_string()))
        .collect();
    let resources: Vec<String> = parsed
        .all(&["--resource"])
        .iter()
        .flat_map(|v| v.split(',').map(|s| s.to_string()))
        .collect();
    if verbs.is_empty() || resources.is_empty() {
        return Err("error: at least one verb and resource must be specified".into());
    }
    let api_groups = resources
        .iter()
        .map(|r| rbac::split_resource_group(r).1)
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();
    Ok(PolicyRule {
        api_groups,
        resources: resources
            .iter()
            .map(|r| rbac::split_resource_group(r).0)
            .collect(),
        verbs,
        resource_names: Vec::new(),
    })
}

fn binding_role_ref(parsed: &Parsed) -> Result<RoleRef, String> {
    if let Some(cr) = parsed.flag(&["--clusterrole"]) {
        return Ok(RoleRef {
            kind: "ClusterRole".into(),
            name: cr.to_string(),
        });
    }
    if let Some(r) = parsed.flag(&["--role"]) {
        return Ok(RoleRef {
            kind: "Role".into(),
            name: r.to_string(),
        });
    }
    Err("error: exactly one of --role or --clusterrole must be specified".into())
}

fn binding_subjects(parsed: &Parsed) -> Result<Vec<Subject>, String> {
    let mut subjects = Vec::new();
    for u in parsed.all(&["--user"]) {
        subjects.push(Subject {
            kind: "User".into(),
            name: u,
            namespace: String::new(),
        });
    }
    for g in parsed.all(&["--group"]) {
        subjects.push(Subject {
            kind: "Group".into(),
            name: g,
            namespace: String::new(),
        });
    }
    for sa in parsed.all(&["--serviceaccount"]) {
        let (ns, name) = sa.split_once(':').unwrap_or(("default", sa.as_str()));
        subjects.push(Subject {
            kind: "ServiceAccount".into(),
            name: name.to_string(),
            namespace: ns.to_string(),
        });
    }
    if subjects.is_empty() {
        return Err(
            "error: at least one of --user, --group or --serviceaccount must be specified".into(),
        );
    }
    Ok(subjects)
}

fn cmd_scale(parsed: &Parsed, state: &ClusterState) -> Handler {
    let Some((word, name)) = resource_and_name(&parsed.args) else {
        return Err("error: resource(s) were provided, but no name was specified".into());
    };
    let Some(replicas) = parsed.flag(&["--replicas"]).and_then(|r| r.parse::<u32>().ok()) else {
        return Err("error: --replicas=COUNT is required, and COUNT must be a non-negative integer".into());
    };
    let ns = parsed.namespace();
    let resource = render::normalize_resource(&word).unwrap_or("deployments");
    authorize(state, "update", resource, &ns, parsed)?;
    let mut next = state.clone();
    match resource {
        "deployments" => {
            let Some(d) = next.deployment_mut(&ns, &name) else {
                return Err(render::not_found("deployments", &name));
            };
            d.replicas = replicas;
            sched::reconcile_deployment(&mut next, &ns, &name);
            Ok((format!("deployment.apps/{} scaled", name), Some(next)))
        }
        "statefulsets" => {
            let Some(s) = next
                .stateful_sets
                .iter_mut()
                .find(|s| s.metadata.namespace == ns && s.metadata.name == name)
            else {
                return Err(render::not_found("statefulsets", &name));
            };
            s.replicas = replicas;
            Ok((format!("statefulset.apps/{} scaled", name), Some(next)))
        }
        other => Err(format!("error: cannot scale resource type \"{}\"", other)),
    }
}

fn cmd_expose(parsed: &Parsed, state: &ClusterState) -> Handler {
    let Some((word, name)) = resource_and_name(&parsed.args) else {
        return Err("error: you must specify resources to expose".into());
    };
    if render::normalize_resource(&word) != Some("deployments") {
        return Err(format!("error: cannot expose a {}", word));
    }
    let ns = parsed.namespace();
    authorize(state, "create", "services", &ns, parsed)?;
    let Some(d) = state.deployment(&ns, &name) else {
        return Err(render::not_found("deployments", &name));
    };
    let svc_name = parsed
        .flag(&["--name"])
        .map(|s| s.to_string())
        .unwrap_or_else(|| name.clone());
    if state.service(&ns, &svc_name).is_some() {
        return Err(format!(
            "Error from server (AlreadyExists): services \"{}\" already exists",
            svc_name
        ));
    }
    let port: u16 = parsed
        .flag(&["--port"])
        .and_then(|p| p.parse().ok())
        .ok_or("error: couldn't find port via --port flag or introspection")?;
    let target: u16 = parsed
        .flag(&["--target-port"])
        .and_then(|p| p.parse().ok())
        .unwrap_or(port);
    let service_type = parsed.flag(&["--type"]).unwrap_or("ClusterIP").to_string();
    let selector = d.selector.clone();
    let mut next = state.clone();
    let node_port = if service_type == "NodePort" {
        30000 + (next.next_rand() % 2768) as u16
    } else {
        0
    };
    let cluster_ip = {
        let r = next.next_rand();
        format!("10.{}.{}.{}", 96 + (r % 8), (r >> 8) % 256, 2 + (r >> 16) % 250)
    };
    let mut svc = Service {
        metadata: Metadata::new(&svc_name, &ns),
        selector,
        ports: vec![ServicePort {
            port,
            target_port: target,
            node_port,
            protocol: "TCP".into(),
        }],
        service_type,
        cluster_ip,
    };
    svc.metadata.uid = next.new_uid();
    svc.metadata.created_at = next.clock;
    next.services.push(svc);
    Ok((format!("service/{} exposed", svc_name), Some(next)))
}

fn cmd_edit(parsed: &Parsed, state: &ClusterState) -> RunResult {
    let Some((word, name)) = resource_and_name(&parsed.args) else {
        return text(
            "error: you must specify the type of resource to edit".into(),
            state.clone(),
        );
    };
    let ns = parsed.namespace();
    let resource = match render::normalize_resource(&word) {
        Some(r) => r,
        None => {
            return text(
                format!(
                    "error: the server doesn't have a resource type \"{}\"",
                    word
                ),
                state.clone(),
            )
        }
    };
    if !matches!(resource, "deployments" | "horizontalpodautoscalers") {
        return text(
            format!("error: editing {} is not supported here", resource),
            state.clone(),
        );
    }
    if let Err(e) = authorize(state, "update", resource, &ns, parsed) {
        return text(e, state.clone());
    }
    let content = match render::get(
        state,
        resource,
        Some(&name),
        &GetOpts {
            namespace: ns.clone(),
            output: Some("yaml".into()),
            ..Default::default()
        },
    ) {
        Ok(c) => c,
        Err(e) => return text(e, state.clone()),
    };
    RunResult {
        output: String::new(),
        state: state.clone(),
        action: Action::Edit {
            resource: resource.to_string(),
            namespace: ns,
            name,
            content,
        },
    }
}

/// Apply an edited buffer produced by `Action::Edit`.
pub fn finish_edit(
    resource: &str,
    ns: &str,
    name: &str,
    buffer: &str,
    state: &ClusterState,
) -> (String, ClusterState) {
    let mut next = state.clone();
    match resource {
        "deployments" => {
            let edit = yamlish::parse_deployment_edit(buffer);
            let Some(d) = next.deployment_mut(ns, name) else {
                return (render::not_found("deployments", name), state.clone());
            };
            let mut changed = false;
            if let Some(r) = edit.replicas {
                if d.replicas != r {
                    d.replicas = r;
                    changed = true;
                }
            }
            if let Some(c) = d.template.spec.containers.first_mut() {
                if let Some(img) = &edit.image {
                    if &c.image != img {
                        c.image = img.clone();
                        changed = true;
                    }
                }
                if !edit.env.is_empty() && edit.env.len() != c.env.len() {
                    c.env = edit.env.clone();
                    changed = true;
                }
                if !edit.ports.is_empty() && edit.ports != c.ports {
                    c.ports = edit.ports.clone();
                    changed = true;
                }
                if !edit.requests.is_empty()
                    && (c.requests.cpu != edit.requests.cpu
                        || c.requests.memory != edit.requests.memory)
                {
                    c.requests = edit.requests.clone();
                    changed = true;
                }
            }
            if !edit.priority_class.is_empty()
                && d.template.spec.priority_class != edit.priority_class
            {
                d.template.spec.priority_class = edit.priority_class.clone();
                changed = true;
            }
            if !changed {
                return (
                    format!("Edit cancelled, no changes made."),
                    state.clone(),
                );
            }
            sched::reconcile_deployment(&mut next, ns, name);
            (format!("deployment.apps/{} edited", name), next)
        }
        "horizontalpodautoscalers" => {
            let edit = yamlish::parse_hpa_edit(buffer);
            let Some(h) = next
                .hpas
                .iter_mut()
                .find(|h| h.metadata.namespace == ns && h.metadata.name == name)
            else {
                return (
                    render::not_found("horizontalpodautoscalers", name),
                    state.clone(),
                );
            };
            let mut changed = false;
            if let Some(m) = edit.min_replicas {
                if h.min_replicas != m {
                    h.min_replicas = m;
                    changed = true;
                }
            }
            if let Some(m) = edit.max_replicas {
                if h.max_replicas != m {
                    h.max_replicas = m;
                    changed = true;
                }
            }
            if let Some(w) = edit.stabilization_window {
                if h.scale_down_stabilization != w {
                    h.scale_down_stabilization = w;
                    changed = true;
                }
            }
            if !changed {
                return ("Edit cancelled, no changes made.".into(), state.clone());
            }
            (
                format!("horizontalpodautoscaler.autoscaling/{} edited", name),
                next,
            )
        }
        _ => ("error: unsupported edit".into(), state.clone()),
    }
}

fn cmd_label(parsed: &Parsed, state: &ClusterState) -> Handler {
    mutate_metadata(parsed, state, "labeled", |meta, k, v| match v {
        Some(v) => {
            meta.labels.insert(k.to_string(), v.to_string());
        }
        None => {
            meta.labels.remove(k);
        }
    })
}

fn cmd_annotate(parsed: &Parsed, state: &ClusterState) -> Handler {
    mutate_metadata(parsed, state, "annotated", |meta, k, v| match v {
        Some(v) => {
            meta.annotations.insert(k.to_string(), v.to_string());
        }
        None => {
            meta.annotations.remove(k);
        }
    })
}

fn mutate_metadata(
    parsed: &Parsed,
    state: &ClusterState,
    verb_past: &str,
    apply: impl Fn(&mut Metadata, &str, Option<&str>),
) -> Handler {
    let Some((word, name)) = resource_and_name(&parsed.args) else {
        return Err("error: at least one label update is required".into());
    };
    let resource = render::normalize_resource(&word).ok_or_else(|| {
        format!(
            "error: the server doesn't have a resource type \"{}\"",
            word
        )
    })?;
    let ns = parsed.namespace();
    authorize(state, "update", resource, &ns, parsed)?;
    // Updates follow the name: k=v to set, k- to remove.
    let skip = if parsed.args.first().map(|a| a.contains('/')).unwrap_or(false) {
        1
    } else {
        2
    };
    let updates: Vec<&String> = parsed.args.iter().skip(skip).collect();
    if updates.is_empty() {
        return Err("error: at least one label update is required".into());
    }
    let overwrite = parsed.has(&["--overwrite"]);
    let mut next = state.clone();
    let meta: &mut Metadata = match resource {
        "pods" => {
            &mut next
                .pods
                .iter_mut()
                .find(|p| p.metadata.namespace == ns && p.metadata.name == name)
                .ok_or_else(|| render::not_found("pods", &name))?
                .metadata
        }
        "nodes" => {
            &mut next
                .node_mut(&name)
                .ok_or_else(|| render::not_found("nodes", &name))?
                .metadata
        }
        "deployments" => {
            &mut next
                .deployment_mut(&ns, &name)
                .ok_or_else(|| render::not_found("deployments", &name))?
                .metadata
        }
        "services" => {
            &mut next
                .services
                .iter_mut()
                .find(|s| s.metadata.namespace == ns && s.metadata.name == name)
                .ok_or_else(|| render::not_found("services", &name))?
                .metadata
        }
        other => return Err(format!("error: cannot label resource type \"{}\"", other)),
    };
    for u in updates {
        if let Some(k) = u.strip_suffix('-') {
            apply(meta, k, None);
        } else if let Some((k, v)) = u.split_once('=') {
            if verb_past == "labeled" && meta.labels.contains_key(k) && !overwrite {
                return Err(format!(
                    "error: '{}' already has a value ({}), and --overwrite is false",
                    k, meta.labels[k]
                ));
            }
            apply(meta, k, Some(v));
        } else {
            return Err(format!("error: invalid label spec: {}", u));
        }
    }
    Ok((
        format!("{}/{} {}", render::singular(resource), name, verb_past),
        Some(next),
    ))
}

fn cmd_taint(parsed: &Parsed, state: &ClusterState) -> Handler {
    if parsed.args.first().map(|s| s.as_str()) != Some("nodes")
        && parsed.args.first().map(|s| s.as_str()) != Some("node")
    {
        return Err("error: taint only supports nodes".into());
    }
    let Some(name) = parsed.args.get(1) else {
        return Err("error: at least one taint update is required".into());
    };
    let Some(spec) = parsed.args.get(2) else {
        return Err("error: at least one taint update is required".into());
    };
    authorize(state, "update", "nodes", "", parsed)?;
    let mut next = state.clone();
    let node = next
        .node_mut(name)
        .ok_or_else(|| render::not_found("nodes", name))?;
    if let Some(rest) = spec.strip_suffix('-') {
        // key[:effect]- removes.
        let key = rest.split(':').next().unwrap_or(rest);
        let key = key.split('=').next().unwrap_or(key);
        let before = node.taints.len();
        node.taints.retain(|t| t.key != key);
        if node.taints.len() == before {
            return Err(format!("error: taint \"{}\" not found", key));
        }
        return Ok((format!("node/{} untainted", name), Some(next)));
    }
    // key=value:Effect or key:Effect
    let (kv, effect) = spec
        .rsplit_once(':')
        .ok_or_else(|| format!("error: invalid taint spec: {}", spec))?;
    if !matches!(effect, "NoSchedule" | "PreferNoSchedule" | "NoExecute") {
        return Err(format!("error: invalid taint effect: {}", effect));
    }
    let (key, value) = kv.split_once('=').unwrap_or((kv, ""));
    node.taints.retain(|t| t.key != key);
    node.taints.push(Taint {
        key: key.to_string(),
        value: value.to_string(),
        effect: effect.to_string(),
    });
    Ok((format!("node/{} tainted", name), Some(next)))
}

fn cmd_cordon(parsed: &Parsed, state: &ClusterState, cordon: bool) -> Handler {
    let Some(name) = parsed.args.first() else {
        return Err("error: USAGE: cordon NODE".into());
    };
    authorize(state, "update", "nodes", "", parsed)?;
    let mut next = state.clone();
    let node = next
        .node_mut(name)
        .ok_or_else(|| render::not_found("nodes", name))?;
    let already = node.unschedulable == cordon;
    node.unschedulable = cordon;
    let verb = if cordon { "cordoned" } else { "uncordoned" };
    if already {
        return Ok((format!("node/{} already {}", name, verb), None));
    }
    Ok((format!("node/{} {}", name, verb), Some(next)))
}

fn cmd_drain(parsed: &Parsed, state: &ClusterState) -> Handler {
    let Some(name) = parsed.args.first() else {
        return Err("error: USAGE: drain NODE".into());
    };
    authorize(state, "delete", "pods", "", parsed)?;
    if state.node(name).is_none() {
        return Err(render::not_found("nodes", name));
    }
    let ignore_ds = parsed.has(&["--ignore-daemonsets"]);
    let mut next = state.clone();
    if let Some(n) = next.node_mut(name) {
        n.unschedulable = true;
    }
    let mut lines = vec![format!("node/{} cordoned", name)];
    let victims: Vec<(String, String, bool)> = next
        .pods
        .iter()
        .filter(|p| p.status.node.as_deref() == Some(name.as_str()))
        .map(|p| {
            let is_ds = p.metadata.labels.contains_key("name")
                && next
                    .daemon_sets
                    .iter()
                    .any(|d| labels_match(&d.selector, &p.metadata.labels));
            (p.metadata.namespace.clone(), p.metadata.name.clone(), is_ds)
        })
        .collect();
    for (ns, pod, is_ds) in victims {
        if is_ds {
            if !ignore_ds {
                return Err(format!(
                    "error: cannot delete DaemonSet-managed Pods (use --ignore-daemonsets to ignore): {}/{}",
                    ns, pod
                ));
            }
            continue;
        }
        next.pods
            .retain(|p| !(p.metadata.namespace == ns && p.metadata.name == pod));
        lines.push(format!("evicting pod {}/{}", ns, pod));
        lines.push(format!("pod/{} evicted", pod));
    }
    // Deployment-owned pods land elsewhere.
    let deployments: Vec<(String, String)> = next
        .deployments
        .iter()
        .map(|d| (d.metadata.namespace.clone(), d.metadata.name.clone()))
        .collect();
    for (ns, d) in deployments {
        lines.extend(sched::reconcile_deployment(&mut next, &ns, &d));
    }
    lines.push(format!("node/{} drained", name));
    Ok((lines.join("\n"), Some(next)))
}

fn cmd_rollout(parsed: &Parsed, state: &ClusterState) -> Handler {
    let Some(sub) = parsed.args.first().map(|s| s.as_str()) else {
        return Err("error: rollout requires a subcommand (status, restart, history, undo)".into());
    };
    let Some((word, name)) = resource_and_name(&parsed.args[1..]) else {
        return Err("error: required resource not specified".into());
    };
    if render::normalize_resource(&word) != Some("deployments") {
        return Err(format!("error: no rollout for resource \"{}\"", word));
    }
    let ns = parsed.namespace();
    authorize(state, "update", "deployments", &ns, parsed)?;
    if state.deployment(&ns, &name).is_none() {
        return Err(render::not_found("deployments", &name));
    }
    match sub {
        "status" => Ok((
            format!("deployment \"{}\" successfully rolled out", name),
            None,
        )),
        "history" => Ok((
            format!(
                "deployment.apps/{} \nREVISION  CHANGE-CAUSE\n1         <none>",
                name
            ),
            None,
        )),
        "restart" => {
            let mut next = state.clone();
            let d = next.deployment(&ns, &name).cloned();
            if let Some(d) = d {
                // Replace every owned pod with a freshly named one.
                let owned = next.owned_pods(&d);
                let names: Vec<String> = owned
                    .iter()
                    .map(|&i| next.pods[i].metadata.name.clone())
                    .collect();
                next.pods.retain(|p| {
                    !(p.metadata.namespace == ns && names.contains(&p.metadata.name))
                });
                sched::reconcile_deployment(&mut next, &ns, &name);
            }
            Ok((format!("deployment.apps/{} restarted", name), Some(next)))
        }
        "undo" => Ok((format!("deployment.apps/{} rolled back", name), None)),
        other => Err(format!("error: unknown rollout subcommand \"{}\"", other)),
    }
}

fn cmd_set(parsed: &Parsed, state: &ClusterState) -> Handler {
    let Some(sub) = parsed.args.first().map(|s| s.as_str()) else {
        return Err("error: set requires a subcommand (image, env, resources)".into());
    };
    let Some((word, name)) = resource_and_name(&parsed.args[1..]) else {
        return Err("error: required resource not specified".into());
    };
    if render::normalize_resource(&word) != Some("deployments") {
        return Err(format!("error: cannot set on resource \"{}\"", word));
    }
    let ns = parsed.namespace();
    authorize(state, "update", "deployments", &ns, parsed)?;
    let mut next = state.clone();
    let Some(d) = next.deployment_mut(&ns, &name) else {
        return Err(render::not_found("deployments", &name));
    };
    match sub {
        "image" => {
            // set image deployment/web web=nginx:1.25
            let mut updated = false;
            let skip = if parsed.args[1].contains('/') { 2 } else { 3 };
            for assignment in parsed.args.iter().skip(skip) {
                let Some((container, image)) = assignment.split_once('=') else {
                    return Err(format!("error: invalid image spec: {}", assignment));
                };
                for c in &mut d.template.spec.containers {
                    if c.name == container || container == "*" {
                        c.image = image.to_string();
                        updated = true;
                    }
                }
            }
            if !updated {
                return Err("error: no containers matched".into());
            }
            sched::reconcile_deployment(&mut next, &ns, &name);
            Ok((format!("deployment.apps/{} image updated", name), Some(next)))
        }
        "env" => {
            let skip = if parsed.args[1].contains('/') { 2 } else { 3 };
            let mut updated = false;
            for assignment in parsed.args.iter().skip(skip) {
                if let Some(k) = assignment.strip_suffix('-') {
                    for c in &mut d.template.spec.containers {
                        c.env.retain(|e| e.name != k);
                    }
                    updated = true;
                } else if let Some((k, v)) = assignment.split_once('=') {
                    for c in &mut d.template.spec.containers {
                        c.env.retain(|e| e.name != k);
                        c.env.push(EnvVar {
                            name: k.to_string(),
                            value: v.to_string(),
                            value_from: String::new(),
                        });
                    }
                    updated = true;
                }
            }
            if !updated {
                return Err("error: at least one environment variable must be provided".into());
            }
            sched::reconcile_deployment(&mut next, &ns, &name);
            Ok((format!("deployment.apps/{} env updated", name), Some(next)))
        }
        "resources" => {
            let parse_amounts = |spec: &str| {
                let mut out = ResourceAmounts::default();
                for pair in spec.split(',') {
                    match pair.split_once('=') {
                        Some(("cpu", v)) => out.cpu = v.to_string(),
                        Some(("memory", v)) => out.memory = v.to_string(),
                        _ => {}
                    }
                }
                out
            };
            if let Some(req) = parsed.flag(&["--requests"]) {
                let amounts = parse_amounts(req);
                for c in &mut d.template.spec.containers {
                    c.requests = amounts.clone();
                }
            }
            if let Some(lim) = parsed.flag(&["--limits"]) {
                let amounts = parse_amounts(lim);
                for c in &mut d.template.spec.containers {
                    c.limits = amounts.clone();
                }
            }
            sched::reconcile_deployment(&mut next, &ns, &name);
            Ok((
                format!("deployment.apps/{} resource requirements updated", name),
                Some(next),
            ))
        }
        other => Err(format!("error: unknown set subcommand \"{}\"", other)),
    }
}

fn cmd_autoscale(parsed: &Parsed, state: &ClusterState) -> Handler {
    let Some((word, name)) = resource_and_name(&parsed.args) else {
        return Err("error: required resource not specified".into());
    };
    if render::normalize_resource(&word) != Some("deployments") {
        return Err(format!("error: cannot autoscale a {}", word));
    }
    let ns = parsed.namespace();
    authorize(state, "create", "horizontalpodautoscalers", &ns, parsed)?;
    if state.deployment(&ns, &name).is_none() {
        return Err(render::not_found("deployments", &name));
    }
    if state
        .hpas
        .iter()
        .any(|h| h.metadata.namespace == ns && h.metadata.name == name)
    {
        return Err(format!(
            "Error from server (AlreadyExists): horizontalpodautoscalers.autoscaling \"{}\" already exists",
            name
        ));
    }
    let mut next = state.clone();
    let mut h = Hpa {
        metadata: Metadata::new(&name, &ns),
        target: name.clone(),
        min_replicas: parsed
            .flag(&["--min"])
            .and_then(|v| v.parse().ok())
            .unwrap_or(1),
        max_replicas: parsed
            .flag(&["--max"])
            .and_then(|v| v.parse().ok())
            .unwrap_or(10),
        target_cpu: parsed
            .flag(&["--cpu-percent"])
            .and_then(|v| v.parse().ok())
            .unwrap_or(80),
        current_cpu: 0,
        scale_down_stabilization: 300,
    };
    h.metadata.uid = next.new_uid();
    h.metadata.created_at = next.clock;
    next.hpas.push(h);
    Ok((
        format!("horizontalpodautoscaler.autoscaling/{} autoscaled", name),
        Some(next),
    ))
}

fn cmd_top(parsed: &Parsed, state: &ClusterState) -> Handler {
    match parsed.args.first().map(|s| s.as_str()) {
        Some("pods") | Some("pod") | Some("po") => {
            Ok((render::top_pods(state, &get_opts(parsed)), None))
        }
        Some("nodes") | Some("node") | Some("no") => Ok((render::top_nodes(state), None)),
        _ => Err("error: unknown command; see 'kubectl top pod' or 'kubectl top node'".into()),
    }
}

fn cmd_exec(parsed: &Parsed, state: &ClusterState) -> RunResult {
    let Some(pod_name) = parsed.args.first() else {
        return text(
            "error: you must specify at least one command for the container".into(),
            state.clone(),
        );
    };
    let ns = parsed.namespace();
    let pod_name = pod_name.strip_prefix("pod/").unwrap_or(pod_name).to_string();
    let Some(pod) = state.pod(&ns, &pod_name) else {
        return text(render::not_found("pods", &pod_name), state.clone());
    };
    if !pod.status.phase.is_ready() {
        return text(
            format!(
                "error: unable to upgrade connection: container not found (\"{}\")",
                pod.spec
                    .containers
                    .first()
                    .map(|c| c.name.as_str())
                    .unwrap_or("")
            ),
            state.clone(),
        );
    }
    // No command, or a shell, opens an interactive session; `-it` is
    // accepted but not required.
    let command = parsed.trailing.clone();
    let interactive = command.is_empty()
        || matches!(
            command.first().map(|s| s.as_str()),
            Some("sh") | Some("bash") | Some("/bin/sh") | Some("/bin/bash")
        );
    if interactive {
        return RunResult {
            output: String::new(),
            state: state.clone(),
            action: Action::Exec {
                namespace: ns,
                pod: pod_name,
            },
        };
    }
    let line = command.join(" ");
    text(exec_in_pod(state, &ns, &pod_name, &line), state.clone())
}

/// Evaluate one command inside a pod, for both one-shot `exec pod -- cmd`
/// and the interactive exec session.
pub fn exec_in_pod(state: &ClusterState, ns: &str, pod_name: &str, line: &str) -> String {
    let Some(pod) = state.pod(ns, pod_name) else {
        return render::not_found("pods", pod_name);
    };
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.first().copied() {
        None | Some("") => String::new(),
        Some("env") | Some("printenv") => pod_env(state, pod)
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("\n"),
        Some("hostname") => pod_name.to_string(),
        Some("whoami") => "root".into(),
        Some("pwd") => "/".into(),
        Some("ls") => "bin\ndev\netc\nhome\nlib\nproc\nroot\nsys\ntmp\nusr\nvar".into(),
        Some("cat") => match words.get(1) {
            Some(&"/etc/hostname") => pod_name.to_string(),
            Some(&"/etc/resolv.conf") => {
                format!(
                    "search {}.svc.cluster.local svc.cluster.local cluster.local\nnameserver 10.96.0.10\noptions ndots:5",
                    ns
                )
            }
            Some(path) => format!("cat: {}: No such file or directory", path),
            None => String::new(),
        },
        Some("echo") => line.strip_prefix("echo").unwrap_or("").trim().to_string(),
        Some("nslookup") | Some("wget") | Some("curl") => {
            let target = words.get(1).copied().unwrap_or("");
            if let Some(svc) = state
                .services
                .iter()
                .find(|s| s.metadata.namespace == ns && target.starts_with(s.metadata.name.as_str()))
            {
                format!(
                    "Server:    10.96.0.10\nAddress:   10.96.0.10:53\n\nName:      {}.{}.svc.cluster.local\nAddress:   {}",
                    svc.metadata.name, ns, svc.cluster_ip
                )
            } else {
                format!("nslookup: can't resolve '{}'", target)
            }
        }
        Some(other) => format!(
            "OCI runtime exec failed: exec failed: unable to start container process: exec: \"{}\": executable file not found in $PATH: unknown",
            other
        ),
    }
}

/// Resolved environment of a pod: explicit values, valueFrom refs, and
/// envFrom sources, plus the standard service links.
pub fn pod_env(state: &ClusterState, pod: &Pod) -> Vec<(String, String)> {
    let ns = &pod.metadata.namespace;
    let mut out = vec![
        ("PATH".to_string(), "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin".to_string()),
        ("HOSTNAME".to_string(), pod.metadata.name.clone()),
        ("KUBERNETES_SERVICE_HOST".to_string(), "10.96.0.1".to_string()),
        ("KUBERNETES_SERVICE_PORT".to_string(), "443".to_string()),
    ];
    for c in &pod.spec.containers {
        for src in &c.env_from {
            match src.kind {
                EnvFromKind::ConfigMap => {
                    if let Some(cm) = state.config_map(ns, &src.name) {
                        for (k, v) in &cm.data {
                            out.push((k.clone(), v.clone()));
                        }
                    }
                }
                EnvFromKind::Secret => {
                    if let Some(sec) = state.secret(ns, &src.name) {
                        for (k, v) in &sec.data {
                            let decoded = crate::b64_decode(v)
                                .and_then(|b| String::from_utf8(b).ok())
                                .unwrap_or_else(|| v.clone());
                            out.push((k.clone(), decoded));
                        }
                    }
                }
            }
        }
        for e in &c.env {
            if e.value_from.is_empty() {
                out.push((e.name.clone(), e.value.clone()));
                continue;
            }
            let parts: Vec<&str> = e.value_from.splitn(3, ':').collect();
            let (src, name, key) = (
                parts.first().copied().unwrap_or(""),
                parts.get(1).copied().unwrap_or(""),
                parts.get(2).copied().unwrap_or(""),
            );
            let value = if src == "configMapKeyRef" {
                state
                    .config_map(ns, name)
                    .and_then(|cm| cm.data.get(key).cloned())
            } else {
                state.secret(ns, name).and_then(|s| {
                    s.data
                        .get(key)
                        .map(|v| {
                            crate::b64_decode(v)
                                .and_then(|b| String::from_utf8(b).ok())
                                .unwrap_or_else(|| v.clone())
                        })
                })
            };
            out.push((e.name.clone(), value.unwrap_or_default()));
        }
    }
    out
}

fn cmd_port_forward(parsed: &Parsed, state: &ClusterState) -> Handler {
    let Some(target) = parsed.args.first() else {
        return Err("error: TYPE/NAME and list of ports are required for port-forward".into());
    };
    let Some(ports) = parsed.args.get(1) else {
        return Err("error: at least one PORT is required for port-forward".into());
    };
    let ns = parsed.namespace();
    let name = target
        .strip_prefix("pod/")
        .or_else(|| target.strip_prefix("svc/"))
        .or_else(|| target.strip_prefix("service/"))
        .unwrap_or(target);
    if target.starts_with("svc/") || target.starts_with("service/") {
        if state.service(&ns, name).is_none() {
            return Err(render::not_found("services", name));
        }
    } else if state.pod(&ns, name).is_none() {
        return Err(render::not_found("pods", name));
    }
    let (local, remote) = ports.split_once(':').unwrap_or((ports.as_str(), ports.as_str()));
    Ok((
        format!(
            "Forwarding from 127.0.0.1:{local} -> {remote}\nForwarding from [::1]:{local} -> {remote}",
        ),
        None,
    ))
}

fn cmd_cp(parsed: &Parsed, state: &ClusterState) -> RunResult {
    let (Some(src), Some(dst)) = (parsed.args.first(), parsed.args.get(1)) else {
        return text(
            "error: source and destination are required".into(),
            state.clone(),
        );
    };
    let ns = parsed.namespace();
    // pod:path -> local only; the reverse direction reports success
    // without materializing anything inside the pod. Local filesystem
    // access goes back to the caller as an action.
    if let Some((pod, remote)) = src.split_once(':') {
        if state.pod(&ns, pod).is_none() {
            return text(render::not_found("pods", pod), state.clone());
        }
        return RunResult {
            output: String::new(),
            state: state.clone(),
            action: Action::WriteFile {
                path: dst.clone(),
                content: format!("# copied from {}:{}\n", pod, remote),
            },
        };
    }
    if let Some((pod, _)) = dst.split_once(':') {
        if state.pod(&ns, pod).is_none() {
            return text(render::not_found("pods", pod), state.clone());
        }
        return RunResult {
            output: String::new(),
            state: state.clone(),
            action: Action::ReadFile { path: src.clone() },
        };
    }
    text(
        "error: one of src or dest must be a remote file specification".into(),
        state.clone(),
    )
}

fn cmd_config(parsed: &Parsed, state: &ClusterState) -> Handler {
    match parsed.args.first().map(|s| s.as_str()) {
        Some("current-context") => Ok((state.current_context.clone(), None)),
        Some("get-contexts") => {
            let headers = ["CURRENT", "NAME", "CLUSTER", "AUTHINFO", "NAMESPACE"];
            let rows: Vec<Vec<String>> = state
                .contexts
                .iter()
                .map(|c| {
                    vec![
                        if c.name == state.current_context {
                            "*".to_string()
                        } else {
                            String::new()
                        },
                        c.name.clone(),
                        c.cluster.clone(),
                        c.user.clone(),
                        String::new(),
                    ]
                })
                .collect();
            Ok((render::table(&headers, &rows), None))
        }
        Some("use-context") => {
            let Some(name) = parsed.args.get(1) else {
                return Err("error: you must specify a context name".into());
            };
            if !state.contexts.iter().any(|c| &c.name == name) {
                return Err(format!("error: no context exists with the name: \"{}\"", name));
            }
            let mut next = state.clone();
            next.current_context = name.clone();
            Ok((format!("Switched to context \"{}\".", name), Some(next)))
        }
        Some("view") => {
            let mut out = String::from("apiVersion: v1\nclusters:\n- cluster:\n    certificate-authority-data: DATA+OMITTED\n    server: ");
            out.push_str(API_SERVER);
            out.push_str("\n  name: kubernetes\ncontexts:\n");
            for c in &state.contexts {
                out.push_str(&format!(
                    "- context:\n    cluster: {}\n    user: {}\n  name: {}\n",
                    c.cluster, c.user, c.name
                ));
            }
            out.push_str(&format!(
                "current-context: {}\nkind: Config\npreferences: {{}}\nusers:\n",
                state.current_context
            ));
            for c in &state.contexts {
                out.push_str(&format!(
                    "- name: {}\n  user:\n    client-certificate-data: DATA+OMITTED\n    client-key-data: DATA+OMITTED\n",
                    c.user
                ));
            }
            out.pop();
            Ok((out, None))
        }
        _ => Err(
            "error: unknown config subcommand; supported: view, current-context, get-contexts, use-context"
                .into(),
        ),
    }
}

fn cmd_auth(parsed: &Parsed, state: &ClusterState) -> Handler {
    if parsed.args.first().map(|s| s.as_str()) != Some("can-i") {
        return Err("error: unknown auth subcommand; supported: can-i".into());
    }
    let (Some(verb), Some(resource)) = (parsed.args.get(1), parsed.args.get(2)) else {
        return Err(
            "error: you must specify two or three arguments: verb, resource, and optional resourceName"
                .into(),
        );
    };
    let opts = CanIOptions {
        as_user: parsed.flag(&["--as"]).map(|s| s.to_string()),
        as_groups: parsed.all(&["--as-group"]),
        namespace: parsed.namespace(),
        resource_name: parsed.args.get(3).cloned().unwrap_or_default(),
    };
    let decision = rbac::can_i(verb, resource, state, &opts);
    Ok((if decision.allowed { "yes" } else { "no" }.into(), None))
}

fn api_resources() -> String {
    let headers = ["NAME", "SHORTNAMES", "APIVERSION", "NAMESPACED", "KIND"];
    let rows: Vec<Vec<String>> = [
        ("configmaps", "cm", "v1", "true", "ConfigMap"),
        ("events", "ev", "v1", "true", "Event"),
        ("namespaces", "ns", "v1", "false", "Namespace"),
        ("nodes", "no", "v1", "false", "Node"),
        ("persistentvolumeclaims", "pvc", "v1", "true", "PersistentVolumeClaim"),
        ("persistentvolumes", "pv", "v1", "false", "PersistentVolume"),
        ("pods", "po", "v1", "true", "Pod"),
        ("secrets", "", "v1", "true", "Secret"),
        ("serviceaccounts", "sa", "v1", "true", "ServiceAccount"),
        ("services", "svc", "v1", "true", "Service"),
        ("daemonsets", "ds", "apps/v1", "true", "DaemonSet"),
        ("deployments", "deploy", "apps/v1", "true", "Deployment"),
        ("statefulsets", "sts", "apps/v1", "true", "StatefulSet"),
        ("horizontalpodautoscalers", "hpa", "autoscaling/v2", "true", "HorizontalPodAutoscaler"),
        ("cronjobs", "cj", "batch/v1", "true", "CronJob"),
        ("jobs", "", "batch/v1", "true", "Job"),
        ("gatewayclasses", "gc", "gateway.networking.k8s.io/v1", "false", "GatewayClass"),
        ("gateways", "gtw", "gateway.networking.k8s.io/v1", "true", "Gateway"),
        ("httproutes", "", "gateway.networking.k8s.io/v1", "true", "HTTPRoute"),
        ("ingresses", "ing", "networking.k8s.io/v1", "true", "Ingress"),
        ("networkpolicies", "netpol", "networking.k8s.io/v1", "true", "NetworkPolicy"),
        ("clusterrolebindings", "", "rbac.authorization.k8s.io/v1", "false", "ClusterRoleBinding"),
        ("clusterroles", "", "rbac.authorization.k8s.io/v1", "false", "ClusterRole"),
        ("rolebindings", "", "rbac.authorization.k8s.io/v1", "true", "RoleBinding"),
        ("roles", "", "rbac.authorization.k8s.io/v1", "true", "Role"),
        ("priorityclasses", "pc", "scheduling.k8s.io/v1", "false", "PriorityClass"),
        ("storageclasses", "sc", "storage.k8s.io/v1", "false", "StorageClass"),
    ]
    .iter()
    .map(|(n, s, a, ns, k)| {
        vec![
            n.to_string(),
            s.to_string(),
            a.to_string(),
            ns.to_string(),
            k.to_string(),
        ]
    })
    .collect();
    render::table(&headers, &rows)
}

fn cmd_explain(parsed: &Parsed) -> Handler {
    let Some(word) = parsed.args.first() else {
        return Err("error: you must specify the type of resource to explain".into());
    };
    let resource = render::normalize_resource(word)
        .ok_or_else(|| format!("error: the server doesn't have a resource type \"{}\"", word))?;
    let (kind, version, doc) = match resource {
        "pods" => ("Pod", "v1", "Pod is a collection of containers that can run on a host. This resource is created by clients and scheduled onto hosts."),
        "deployments" => ("Deployment", "apps/v1", "Deployment enables declarative updates for Pods and ReplicaSets."),
        "services" => ("Service", "v1", "Service is a named abstraction of software service (for example, mysql) consisting of local port (for example 3306) that the proxy listens on, and the selector that determines which pods will answer requests sent through the proxy."),
        "nodes" => ("Node", "v1", "Node is a worker node in Kubernetes. Each node will have a unique identifier in the cache (i.e. in etcd)."),
        "configmaps" => ("ConfigMap", "v1", "ConfigMap holds configuration data for pods to consume."),
        "secrets" => ("Secret", "v1", "Secret holds secret data of a certain type. The total bytes of the values in the Data field must be less than MaxSecretSize bytes."),
        _ => (kind_of(resource), "v1", "No detailed documentation available."),
    };
    Ok((
        format!(
            "KIND:       {}\nVERSION:    {}\n\nDESCRIPTION:\n    {}",
            kind, version, doc
        ),
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::initial_cluster_state;

    fn toks(line: &str) -> Vec<String> {
        line.split_whitespace().map(|s| s.to_string()).collect()
    }

    fn run_line(line: &str, state: &ClusterState) -> RunResult {
        run(&toks(line), state)
    }

    #[test]
    fn test_run_creates_pod() {
        let s = initial_cluster_state();
        let r = run_line("run nginx --image=nginx", &s);
        assert_eq!(r.output, "pod/nginx created");
        assert!(r.state.pod("default", "nginx").is_some());
    }

    #[test]
    fn test_run_duplicate_is_already_exists() {
        let s = initial_cluster_state();
        let r = run_line("run nginx --image=nginx", &s);
        let r2 = run_line("run nginx --image=nginx", &r.state);
        assert_eq!(
            r2.output,
            "Error from server (AlreadyExists): pods \"nginx\" already exists"
        );
        assert_eq!(r2.state.pods.len(), r.state.pods.len());
    }

    #[test]
    fn test_create_deployment_spawns_pods() {
        let s = initial_cluster_state();
        let r = run_line("create deployment web --image=nginx --replicas=3", &s);
        assert_eq!(r.output, "deployment.apps/web created");
        let d = r.state.deployment("default", "web").unwrap().clone();
        assert_eq!(r.state.owned_pods(&d).len(), 3);
    }

    #[test]
    fn test_delete_owned_pod_is_replaced() {
        let s = initial_cluster_state();
        let r = run_line("create deployment web --image=nginx --replicas=2", &s);
        let d = r.state.deployment("default", "web").unwrap().clone();
        let victim = r.state.pods[r.state.owned_pods(&d)[0]].metadata.name.clone();
        let r2 = run_line(&format!("delete pod {}", victim), &r.state);
        let lines: Vec<&str> = r2.output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("pod \"{}\" deleted", victim));
        assert!(lines[1].starts_with("pod \"web-") && lines[1].ends_with("\" created"));
        assert_eq!(r2.state.owned_pods(&d).len(), 2);
        assert!(r2.state.pod("default", &victim).is_none());
    }

    #[test]
    fn test_scale_deployment() {
        let s = initial_cluster_state();
        let r = run_line("create deployment web --image=nginx --replicas=3", &s);
        let r2 = run_line("scale deployment web --replicas=1", &r.state);
        assert_eq!(r2.output, "deployment.apps/web scaled");
        let d = r2.state.deployment("default", "web").unwrap().clone();
        assert_eq!(r2.state.owned_pods(&d).len(), 1);
    }

    #[test]
    fn test_expose_deployment() {
        let s = initial_cluster_state();
        let r = run_line("create deployment web --image=nginx", &s);
        let r2 = run_line("expose deployment web --port=80", &r.state);
        assert_eq!(r2.output, "service/web exposed");
        let svc = r2.state.service("default", "web").unwrap();
        assert_eq!(svc.ports[0].port, 80);
        assert_eq!(svc.selector.get("app"), Some(&"web".to_string()));
    }

    #[test]
    fn test_unknown_verb() {
        let s = initial_cluster_state();
        let r = run_line("frobnicate pods", &s);
        assert!(r.output.starts_with("error: unknown command \"frobnicate\""));
    }

    #[test]
    fn test_corrupted_etcd_refuses_connection() {
        let mut s = initial_cluster_state();
        s.etcd.corrupted = true;
        let r = run_line("get pods", &s);
        assert_eq!(r.output, CONNECTION_REFUSED);
        let r2 = run_line("config current-context", &s);
        assert_eq!(r2.output, "kubernetes-admin@kubernetes");
    }

    #[test]
    fn test_auth_can_i_yes_and_no() {
        let s = initial_cluster_state();
        let yes = run_line("auth can-i delete pods", &s);
        assert_eq!(yes.output, "yes");
        let no = run_line(
            "auth can-i delete pods --as dev-user --as-group developers",
            &s,
        );
        assert_eq!(no.output, "no");
    }

    #[test]
    fn test_rbac_forbidden_for_impersonated_get() {
        let s = initial_cluster_state();
        let r = run_line("get pods --as dev-user", &s);
        assert!(r.output.starts_with("Error from server (Forbidden)"));
        assert!(r.output.contains("dev-user"));
    }

    #[test]
    fn test_cordon_and_taint() {
        let s = initial_cluster_state();
        let r = run_line("cordon node01", &s);
        assert_eq!(r.output, "node/node01 cordoned");
        assert!(r.state.node("node01").unwrap().unschedulable);
        let r2 = run_line("taint nodes node01 dedicated=gpu:NoSchedule", &r.state);
        assert_eq!(r2.output, "node/node01 tainted");
        let r3 = run_line("taint nodes node01 dedicated-", &r2.state);
        assert_eq!(r3.output, "node/node01 untainted");
    }

    #[test]
    fn test_set_image_rolls_pods() {
        let s = initial_cluster_state();
        let r = run_line("create deployment web --image=nginx:1.24 --replicas=2", &s);
        let d = r.state.deployment("default", "web").unwrap().clone();
        let old: Vec<String> = r
            .state
            .owned_pods(&d)
            .iter()
            .map(|&i| r.state.pods[i].metadata.name.clone())
            .collect();
        let r2 = run_line("set image deployment/web web=nginx:1.25", &r.state);
        assert_eq!(r2.output, "deployment.apps/web image updated");
        let d2 = r2.state.deployment("default", "web").unwrap().clone();
        assert_eq!(d2.image(), "nginx:1.25");
        for name in old {
            assert!(r2.state.pod("default", &name).is_none());
        }
    }

    #[test]
    fn test_autoscale_creates_hpa() {
        let s = initial_cluster_state();
        let r = run_line("create deployment web --image=nginx", &s);
        let r2 = run_line(
            "autoscale deployment web --min=2 --max=5 --cpu-percent=70",
            &r.state,
        );
        assert_eq!(
            r2.output,
            "horizontalpodautoscaler.autoscaling/web autoscaled"
        );
        let h = &r2.state.hpas[0];
        assert_eq!((h.min_replicas, h.max_replicas, h.target_cpu), (2, 5, 70));
    }

    #[test]
    fn test_config_use_context() {
        let s = initial_cluster_state();
        let r = run_line("config use-context dev-user@kubernetes", &s);
        assert_eq!(r.output, "Switched to context \"dev-user@kubernetes\".");
        assert_eq!(r.state.current_context, "dev-user@kubernetes");
    }

    fn file_req(op: FileOp) -> FileRequest {
        FileRequest {
            op,
            path: "/tmp/manifest.yaml".into(),
            namespace: "default".into(),
            as_user: None,
            as_groups: Vec::new(),
        }
    }

    #[test]
    fn test_apply_f_hands_path_back() {
        let s = initial_cluster_state();
        let r = run_line("apply -f /tmp/pod.yaml", &s);
        match r.action {
            Action::File(req) => {
                assert!(matches!(req.op, FileOp::Apply));
                assert_eq!(req.path, "/tmp/pod.yaml");
            }
            _ => panic!("expected a file handoff"),
        }
        assert_eq!(r.state.pods.len(), s.pods.len());
    }

    #[test]
    fn test_apply_file_creates_pod() {
        let s = initial_cluster_state();
        let yaml = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: fromfile\nspec:\n  containers:\n  - name: c\n    image: nginx\n";
        let (out, next) = apply_file(&file_req(FileOp::Apply), yaml, &s);
        assert_eq!(out, "pod/fromfile created");
        assert!(next.pod("default", "fromfile").is_some());
    }

    #[test]
    fn test_create_file_rejects_existing() {
        let s = initial_cluster_state();
        let yaml = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: fromfile\nspec:\n  containers:\n  - name: c\n    image: nginx\n";
        let (_, s2) = apply_file(&file_req(FileOp::Create), yaml, &s);
        let (out, s3) = apply_file(&file_req(FileOp::Create), yaml, &s2);
        assert!(out.starts_with("Error from server (AlreadyExists)"));
        assert_eq!(s3.pods.len(), s2.pods.len());
    }

    #[test]
    fn test_apply_file_authorizes_by_manifest_kind() {
        let s = initial_cluster_state();
        let mut req = file_req(FileOp::Apply);
        req.as_user = Some("dev-user".into());
        let yaml = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: 1\n  selector:\n    matchLabels:\n      app: web\n  template:\n    metadata:\n      labels:\n        app: web\n    spec:\n      containers:\n      - name: web\n        image: nginx\n";
        let (out, next) = apply_file(&req, yaml, &s);
        assert!(out.starts_with("Error from server (Forbidden)"));
        assert!(out.contains("resource \"deployments\" in API group \"apps\""));
        assert_eq!(next.deployments.len(), s.deployments.len());
    }

    #[test]
    fn test_exec_shell_enters_interactive() {
        let s = initial_cluster_state();
        let r = run_line("run web --image=nginx", &s);
        let r2 = run_line("exec web -- sh", &r.state);
        assert!(matches!(r2.action, Action::Exec { .. }));
        let r3 = run_line("exec web", &r.state);
        assert!(matches!(r3.action, Action::Exec { .. }));
        let r4 = run_line("exec web -- env", &r.state);
        assert!(matches!(r4.action, Action::None));
        assert!(r4.output.contains("HOSTNAME=web"));
    }

    #[test]
    fn test_cp_from_pod_is_a_write_handoff() {
        let s = initial_cluster_state();
        let r = run_line("run web --image=nginx", &s);
        let r2 = run_line("cp web:/etc/nginx/nginx.conf /tmp/nginx.conf", &r.state);
        match r2.action {
            Action::WriteFile { path, content } => {
                assert_eq!(path, "/tmp/nginx.conf");
                assert!(content.contains("web:/etc/nginx/nginx.conf"));
            }
            _ => panic!("expected a write handoff"),
        }
    }

    #[test]
    fn test_exec_env_resolves_configmap() {
        let s = initial_cluster_state();
        let r = run_line("create configmap app-config --from-literal=DB_HOST=db.local", &s);
        let yaml = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: app\nspec:\n  containers:\n  - name: app\n    image: nginx\n    env:\n    - name: DB_HOST\n      valueFrom:\n        configMapKeyRef:\n          name: app-config\n          key: DB_HOST\n";
        let (_, s2) = yamlish::apply(yaml, "default", &r.state);
        let out = exec_in_pod(&s2, "default", "app", "env");
        assert!(out.contains("DB_HOST=db.local"));
    }

    #[test]
    fn test_rollout_restart_renames_pods() {
        let s = initial_cluster_state();
        let r = run_line("create deployment web --image=nginx --replicas=2", &s);
        let d = r.state.deployment("default", "web").unwrap().clone();
        let old: Vec<String> = r
            .state
            .owned_pods(&d)
            .iter()
            .map(|&i| r.state.pods[i].metadata.name.clone())
            .collect();
        let r2 = run_line("rollout restart deployment/web", &r.state);
        assert_eq!(r2.output, "deployment.apps/web restarted");
        assert_eq!(r2.state.owned_pods(&d).len(), 2);
        for name in old {
            assert!(r2.state.pod("default", &name).is_none());
        }
    }

    #[test]
    fn test_finish_edit_scales() {
        let s = initial_cluster_state();
        let r = run_line("create deployment web --image=nginx --replicas=1", &s);
        let buffer = "kind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: 4\n";
        let (out, next) = finish_edit("deployments", "default", "web", buffer, &r.state);
        assert_eq!(out, "deployment.apps/web edited");
        let d = next.deployment("default", "web").unwrap().clone();
        assert_eq!(d.replicas, 4);
        assert_eq!(next.owned_pods(&d).len(), 4);
    }
}
