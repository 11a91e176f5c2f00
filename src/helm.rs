//! The helm interpreter. Charts are simulated from a small built-in
//! catalog; installing one materializes real workloads in the cluster
//! state, labeled so uninstall can find them again.

use crate::kubectl::{parse, parse_selector, Parsed};
use crate::sched;
use crate::state::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Serialize, Deserialize)]
pub struct HelmRelease {
    pub name: String,
    pub namespace: String,
    pub chart: String,
    pub chart_version: String,
    pub app_version: String,
    pub revision: u32,
    pub updated_at: u64,
    pub status: String,
}

/// Repos the user has added plus installed releases. Lives next to the
/// cluster state in the session, not inside it: helm metadata is not
/// part of the etcd keyspace.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct HelmState {
    pub repos: Vec<(String, String)>,
    pub releases: Vec<HelmRelease>,
}

struct ChartInfo {
    repo: &'static str,
    name: &'static str,
    version: &'static str,
    app_version: &'static str,
    description: &'static str,
    /// (component suffix, image, port); empty suffix means the release
    /// name alone.
    components: &'static [(&'static str, &'static str, u16)],
}

const CATALOG: &[ChartInfo] = &[
    ChartInfo {
        repo: "bitnami",
        name: "nginx",
        version: "15.14.0",
        app_version: "latest",
        description: "NGINX Open Source is a web server that can be also used as a reverse proxy.",
        components: &[("nginx", "nginx:latest", 80)],
    },
    ChartInfo {
        repo: "bitnami",
        name: "redis",
        version: "18.19.4",
        app_version: "7.2.4",
        description: "Redis is an open source, advanced key-value store.",
        components: &[("redis-master", "redis:7.2.4", 6379)],
    },
    ChartInfo {
        repo: "argo",
        name: "argo-cd",
        version: "6.7.3",
        app_version: "v2.10.5",
        description: "A Helm chart for Argo CD, a declarative, GitOps continuous delivery tool for Kubernetes.",
        components: &[
            ("argocd-server", "quay.io/argoproj/argocd:v2.10.5", 8080),
            ("argocd-repo-server", "quay.io/argoproj/argocd:v2.10.5", 8081),
            ("argocd-application-controller", "quay.io/argoproj/argocd:v2.10.5", 8082),
            ("argocd-dex-server", "ghcr.io/dexidp/dex:v2.38.0", 5556),
            ("argocd-redis", "redis:7.0.14-alpine", 6379),
        ],
    },
    ChartInfo {
        repo: "ingress-nginx",
        name: "ingress-nginx",
        version: "4.10.0",
        app_version: "1.10.0",
        description: "Ingress controller for Kubernetes using NGINX as a reverse proxy and load balancer.",
        components: &[("controller", "registry.k8s.io/ingress-nginx/controller:v1.10.0", 80)],
    },
];

const KNOWN_REPOS: &[(&str, &str)] = &[
    ("bitnami", "https://charts.bitnami.com/bitnami"),
    ("argo", "https://argoproj.github.io/argo-helm"),
    ("ingress-nginx", "https://kubernetes.github.io/ingress-nginx"),
    ("prometheus-community", "https://prometheus-community.github.io/helm-charts"),
];

pub fn run(
    tokens: &[String],
    state: &ClusterState,
    helm: &mut HelmState,
) -> (String, ClusterState) {
    if tokens.is_empty() {
        return (usage(), state.clone());
    }
    // repo/search/template/version never talk to the API server.
    if state.etcd.corrupted
        && tokens[0] != "repo"
        && tokens[0] != "search"
        && tokens[0] != "template"
        && tokens[0] != "version"
    {
        return (
            "Error: INSTALLATION FAILED: Kubernetes cluster unreachable: Get \"https://10.0.0.10:6443/version\": dial tcp 10.0.0.10:6443: connect: connection refused".into(),
            state.clone(),
        );
    }
    let parsed = parse(&tokens[1..]);
    let result = match tokens[0].as_str() {
        "repo" => cmd_repo(&parsed, helm),
        "search" => cmd_search(&parsed, helm),
        "install" => cmd_install(&parsed, state, helm),
        "template" => cmd_template(&parsed),
        "uninstall" | "delete" => cmd_uninstall(&parsed, state, helm),
        "upgrade" => cmd_upgrade(&parsed, state, helm),
        "rollback" => cmd_rollback(&parsed, state, helm),
        "status" => cmd_status(&parsed, helm),
        "list" | "ls" => cmd_list(&parsed, helm),
        "version" => Ok((
            "version.BuildInfo{Version:\"v3.14.3\", GitCommit:\"f03cc04caaa8f6d7c3e67cf918929150cf6f3f12\", GitTreeState:\"clean\", GoVersion:\"go1.21.7\"}".to_string(),
            None,
        )),
        other => Err(format!("Error: unknown command \"{}\" for \"helm\"", other)),
    };
    match result {
        Ok((out, Some(next))) => (out, next),
        Ok((out, None)) => (out, state.clone()),
        Err(e) => (e, state.clone()),
    }
}

type Handler = Result<(String, Option<ClusterState>), String>;

fn usage() -> String {
    "The Kubernetes package manager\n\nCommon actions for Helm:\n\n- helm search:    search for charts\n- helm pull:      download a chart to your local directory to view\n- helm install:   upload the chart to Kubernetes\n- helm list:      list releases of charts\n\nUsage:\n  helm [command]".into()
}

fn namespace(parsed: &Parsed) -> String {
    parsed.namespace()
}

fn find_chart(spec: &str) -> Option<&'static ChartInfo> {
    let (repo, name) = spec.split_once('/')?;
    CATALOG.iter().find(|c| c.repo == repo && c.name == name)
}

fn cmd_repo(parsed: &Parsed, helm: &mut HelmState) -> Handler {
    match parsed.args.first().map(|s| s.as_str()) {
        Some("add") => {
            let (Some(name), Some(url)) = (parsed.args.get(1), parsed.args.get(2)) else {
                return Err("Error: \"helm repo add\" requires 2 arguments".into());
            };
            if let Some(existing) = helm.repos.iter().find(|(n, _)| n == name) {
                if &existing.1 == url {
                    return Ok((
                        format!("\"{}\" already exists with the same configuration, skipping", name),
                        None,
                    ));
                }
                return Err(format!(
                    "Error: repository name ({}) already exists, please specify a different name",
                    name
                ));
            }
            helm.repos.push((name.clone(), url.clone()));
            Ok((
                format!("\"{}\" has been added to your repositories", name),
                None,
            ))
        }
        Some("update") => {
            if helm.repos.is_empty() {
                return Err(
                    "Error: no repositories found. You must add one before updating".into(),
                );
            }
            let mut out =
                String::from("Hang tight while we grab the latest from your chart repositories...");
            for (name, _) in &helm.repos {
                out.push_str(&format!(
                    "\n...Successfully got an update from the \"{}\" chart repository",
                    name
                ));
            }
            out.push_str("\nUpdate Complete. ⎈Happy Helming!⎈");
            Ok((out, None))
        }
        Some("list") => {
            if helm.repos.is_empty() {
                return Err("Error: no repositories to show".into());
            }
            let headers = ["NAME", "URL"];
            let rows: Vec<Vec<String>> = helm
                .repos
                .iter()
                .map(|(n, u)| vec![n.clone(), u.clone()])
                .collect();
            Ok((crate::render::table(&headers, &rows), None))
        }
        Some("remove") => {
            let Some(name) = parsed.args.get(1) else {
                return Err("Error: \"helm repo remove\" requires 1 argument".into());
            };
            let before = helm.repos.len();
            helm.repos.retain(|(n, _)| n != name);
            if helm.repos.len() == before {
                return Err(format!("Error: no repo named \"{}\" found", name));
            }
            Ok((format!("\"{}\" has been removed from your repositories", name), None))
        }
        _ => Err("Error: unknown repo subcommand; supported: add, update, list, remove".into()),
    }
}

fn cmd_search(parsed: &Parsed, helm: &HelmState) -> Handler {
    if parsed.args.first().map(|s| s.as_str()) != Some("repo") {
        return Err("Error: unknown search subcommand; supported: repo".into());
    }
    let term = parsed.args.get(1).map(|s| s.as_str()).unwrap_or("");
    let headers = ["NAME", "CHART VERSION", "APP VERSION", "DESCRIPTION"];
    let rows: Vec<Vec<String>> = CATALOG
        .iter()
        .filter(|c| helm.repos.iter().any(|(n, _)| n == c.repo))
        .filter(|c| term.is_empty() || c.name.contains(term) || c.repo.contains(term))
        .map(|c| {
            vec![
                format!("{}/{}", c.repo, c.name),
                c.version.to_string(),
                c.app_version.to_string(),
                c.description.to_string(),
            ]
        })
        .collect();
    if rows.is_empty() {
        return Err("Error: no results found".into());
    }
    Ok((crate::render::table(&headers, &rows), None))
}

fn release_labels(release: &str, component: &str) -> BTreeMap<String, String> {
    parse_selector(&format!(
        "app.kubernetes.io/instance={},app.kubernetes.io/name={}",
        release, component
    ))
}

fn materialize(
    state: &mut ClusterState,
    release: &str,
    ns: &str,
    chart: &ChartInfo,
) {
    for (suffix, image, port) in chart.components {
        let name = format!("{}-{}", release, suffix);
        let labels = release_labels(release, suffix);
        let mut d = Deployment {
            metadata: Metadata::new(&name, ns),
            replicas: 1,
            selector: labels.clone(),
            template: PodTemplate {
                labels: labels.clone(),
                spec: PodSpec {
                    containers: vec![ContainerSpec {
                        name: suffix.to_string(),
                        image: image.to_string(),
                        ports: vec![*port],
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            },
            strategy: "RollingUpdate".into(),
        };
        d.metadata.labels = labels.clone();
        d.metadata.uid = state.new_uid();
        d.metadata.created_at = state.clock;
        state.deployments.push(d);
        sched::reconcile_deployment(state, ns, &name);

        let cluster_ip = {
            let r = state.next_rand();
            format!("10.{}.{}.{}", 96 + (r % 8), (r >> 8) % 256, 2 + (r >> 16) % 250)
        };
        let mut svc = Service {
            metadata: Metadata::new(&name, ns),
            selector: labels.clone(),
            ports: vec![ServicePort {
                port: *port,
                target_port: *port,
                node_port: 0,
                protocol: "TCP".into(),
            }],
            service_type: "ClusterIP".into(),
            cluster_ip,
        };
        svc.metadata.labels = labels;
        svc.metadata.uid = state.new_uid();
        svc.metadata.created_at = state.clock;
        state.services.push(svc);
    }
}

fn release_block(r: &HelmRelease) -> String {
    format!(
        "NAME: {}\nLAST DEPLOYED: {}\nNAMESPACE: {}\nSTATUS: {}\nREVISION: {}\nTEST SUITE: None",
        r.name,
        timestamp(r.updated_at),
        r.namespace,
        r.status,
        r.revision
    )
}

fn cmd_install(parsed: &Parsed, state: &ClusterState, helm: &mut HelmState) -> Handler {
    let (Some(release), Some(chart_spec)) = (parsed.args.first(), parsed.args.get(1)) else {
        return Err("Error: INSTALLATION FAILED: must either provide a name or specify --generate-name".into());
    };
    let ns = namespace(parsed);
    let Some((repo, _)) = chart_spec.split_once('/') else {
        return Err(format!(
            "Error: INSTALLATION FAILED: non-absolute URLs should be in form of repo_name/path_to_chart, got: {}",
            chart_spec
        ));
    };
    if !helm.repos.iter().any(|(n, _)| n == repo) {
        return Err(format!(
            "Error: INSTALLATION FAILED: repo {} not found. You must add it with `helm repo add`",
            repo
        ));
    }
    let Some(chart) = find_chart(chart_spec) else {
        return Err(format!(
            "Error: INSTALLATION FAILED: chart \"{}\" not found in {} repository",
            chart_spec.split('/').nth(1).unwrap_or(chart_spec),
            repo
        ));
    };
    if helm
        .releases
        .iter()
        .any(|r| r.name == *release && r.namespace == ns)
    {
        return Err("Error: INSTALLATION FAILED: cannot re-use a name that is still in use".into());
    }
    let mut next = state.clone();
    if !next.has_namespace(&ns) {
        if parsed.has(&["--create-namespace"]) {
            next.namespaces.push(ns.clone());
        } else {
            return Err(format!(
                "Error: INSTALLATION FAILED: create: failed to create: namespaces \"{}\" not found",
                ns
            ));
        }
    }
    materialize(&mut next, release, &ns, chart);
    let rel = HelmRelease {
        name: release.clone(),
        namespace: ns.clone(),
        chart: format!("{}-{}", chart.name, chart.version),
        chart_version: chart.version.to_string(),
        app_version: chart.app_version.to_string(),
        revision: 1,
        updated_at: next.clock,
        status: "deployed".into(),
    };
    let block = release_block(&rel);
    helm.releases.push(rel);
    Ok((block, Some(next)))
}

fn cmd_template(parsed: &Parsed) -> Handler {
    let (release, chart_spec) = match (parsed.args.first(), parsed.args.get(1)) {
        (Some(r), Some(c)) => (r.clone(), c.clone()),
        (Some(c), None) => ("release-name".to_string(), c.clone()),
        _ => return Err("Error: \"helm template\" requires at least 1 argument".into()),
    };
    let Some(chart) = find_chart(&chart_spec) else {
        return Err(format!(
            "Error: failed to download \"{}\"",
            chart_spec
        ));
    };
    let ns = namespace(parsed);
    let mut out = String::new();
    for (suffix, image, port) in chart.components {
        let name = format!("{}-{}", release, suffix);
        out.push_str(&format!(
            "---\n# Source: {chart}/templates/svc.yaml\napiVersion: v1\nkind: Service\nmetadata:\n  name: {name}\n  namespace: {ns}\n  labels:\n    app.kubernetes.io/instance: {release}\n    app.kubernetes.io/name: {suffix}\nspec:\n  type: ClusterIP\n  ports:\n  - port: {port}\n    targetPort: {port}\n    protocol: TCP\n  selector:\n    app.kubernetes.io/instance: {release}\n    app.kubernetes.io/name: {suffix}\n---\n# Source: {chart}/templates/deployment.yaml\napiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: {name}\n  namespace: {ns}\n  labels:\n    app.kubernetes.io/instance: {release}\n    app.kubernetes.io/name: {suffix}\nspec:\n  replicas: 1\n  selector:\n    matchLabels:\n      app.kubernetes.io/instance: {release}\n      app.kubernetes.io/name: {suffix}\n  template:\n    metadata:\n      labels:\n        app.kubernetes.io/instance: {release}\n        app.kubernetes.io/name: {suffix}\n    spec:\n      containers:\n      - name: {suffix}\n        image: {image}\n        ports:\n        - containerPort: {port}\n",
            chart = chart.name,
        ));
    }
    out.pop();
    Ok((out, None))
}

fn cmd_uninstall(parsed: &Parsed, state: &ClusterState, helm: &mut HelmState) -> Handler {
    let Some(release) = parsed.args.first() else {
        return Err("Error: \"helm uninstall\" requires at least 1 argument".into());
    };
    let ns = namespace(parsed);
    let Some(idx) = helm
        .releases
        .iter()
        .position(|r| &r.name == release && r.namespace == ns)
    else {
        return Err(format!("Error: uninstall: Release not loaded: {}: release: not found", release));
    };
    let mut next = state.clone();
    let instance_key = "app.kubernetes.io/instance";
    let owned: Vec<String> = next
        .deployments
        .iter()
        .filter(|d| {
            d.metadata.namespace == ns
                && d.metadata.labels.get(instance_key) == Some(release)
        })
        .map(|d| d.metadata.name.clone())
        .collect();
    for d in &owned {
        crate::yamlish::delete_resource("Deployment", d, &ns, &mut next)?;
    }
    next.services.retain(|s| {
        !(s.metadata.namespace == ns && s.metadata.labels.get(instance_key) == Some(release))
    });
    helm.releases.remove(idx);
    Ok((format!("release \"{}\" uninstalled", release), Some(next)))
}

fn cmd_upgrade(parsed: &Parsed, state: &ClusterState, helm: &mut HelmState) -> Handler {
    let (Some(release), Some(chart_spec)) = (parsed.args.first(), parsed.args.get(1)) else {
        return Err("Error: \"helm upgrade\" requires 2 arguments".into());
    };
    let ns = namespace(parsed);
    if find_chart(chart_spec).is_none() {
        return Err(format!("Error: failed to download \"{}\"", chart_spec));
    }
    let Some(rel) = helm
        .releases
        .iter_mut()
        .find(|r| &r.name == release && r.namespace == ns)
    else {
        return Err(format!(
            "Error: UPGRADE FAILED: \"{}\" has no deployed releases",
            release
        ));
    };
    rel.revision += 1;
    rel.updated_at = state.clock;
    let block = release_block(rel);
    Ok((
        format!("Release \"{}\" has been upgraded. Happy Helming!\n{}", release, block),
        None,
    ))
}

fn cmd_rollback(parsed: &Parsed, state: &ClusterState, helm: &mut HelmState) -> Handler {
    let Some(release) = parsed.args.first() else {
        return Err("Error: \"helm rollback\" requires at least 1 argument".into());
    };
    let ns = namespace(parsed);
    let Some(rel) = helm
        .releases
        .iter_mut()
        .find(|r| &r.name == release && r.namespace == ns)
    else {
        return Err(format!("Error: release: not found: {}", release));
    };
    rel.revision += 1;
    rel.updated_at = state.clock;
    Ok(("Rollback was a success! Happy Helming!".into(), None))
}

fn cmd_status(parsed: &Parsed, helm: &HelmState) -> Handler {
    let Some(release) = parsed.args.first() else {
        return Err("Error: \"helm status\" requires 1 argument".into());
    };
    let ns = namespace(parsed);
    let Some(rel) = helm
        .releases
        .iter()
        .find(|r| &r.name == release && r.namespace == ns)
    else {
        return Err(format!("Error: release: not found: {}", release));
    };
    Ok((release_block(rel), None))
}

fn cmd_list(parsed: &Parsed, helm: &HelmState) -> Handler {
    let ns = namespace(parsed);
    let all = parsed.has(&["-A", "--all-namespaces"]);
    let headers = [
        "NAME",
        "NAMESPACE",
        "REVISION",
        "UPDATED",
        "STATUS",
        "CHART",
        "APP VERSION",
    ];
    let rows: Vec<Vec<String>> = helm
        .releases
        .iter()
        .filter(|r| all || r.namespace == ns)
        .map(|r| {
            vec![
                r.name.clone(),
                r.namespace.clone(),
                r.revision.to_string(),
                timestamp(r.updated_at),
                r.status.clone(),
                r.chart.clone(),
                r.app_version.clone(),
            ]
        })
        .collect();
    Ok((crate::render::table(&headers, &rows), None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::initial_cluster_state;

    fn toks(line: &str) -> Vec<String> {
        line.split_whitespace().map(|s| s.to_string()).collect()
    }

    fn with_bitnami() -> HelmState {
        let mut h = HelmState::default();
        h.repos.push(("bitnami".into(), "https://charts.bitnami.com/bitnami".into()));
        h
    }

    #[test]
    fn test_repo_add_and_update() {
        let s = initial_cluster_state();
        let mut h = HelmState::default();
        let (out, _) = run(
            &toks("repo add bitnami https://charts.bitnami.com/bitnami"),
            &s,
            &mut h,
        );
        assert_eq!(out, "\"bitnami\" has been added to your repositories");
        let (out, _) = run(&toks("repo update"), &s, &mut h);
        assert!(out.contains("Successfully got an update from the \"bitnami\""));
    }

    #[test]
    fn test_install_nginx_runs_latest() {
        let s = initial_cluster_state();
        let mut h = with_bitnami();
        let (out, next) = run(&toks("install my-web bitnami/nginx"), &s, &mut h);
        assert!(out.contains("NAME: my-web"));
        assert!(out.contains("STATUS: deployed"));
        let d = next.deployment("default", "my-web-nginx").unwrap();
        assert_eq!(d.image(), "nginx:latest");
        assert!(next.service("default", "my-web-nginx").is_some());
        assert_eq!(h.releases.len(), 1);
    }

    #[test]
    fn test_install_requires_repo() {
        let s = initial_cluster_state();
        let mut h = HelmState::default();
        let (out, next) = run(&toks("install my-web bitnami/nginx"), &s, &mut h);
        assert!(out.contains("repo bitnami not found"));
        assert_eq!(next.deployments.len(), s.deployments.len());
    }

    #[test]
    fn test_argo_cd_is_multi_component() {
        let s = initial_cluster_state();
        let mut h = HelmState::default();
        run(
            &toks("repo add argo https://argoproj.github.io/argo-helm"),
            &s,
            &mut h,
        );
        let (out, next) = run(
            &toks("install argocd argo/argo-cd -n argocd --create-namespace"),
            &s,
            &mut h,
        );
        assert!(out.contains("NAME: argocd"));
        assert!(next.has_namespace("argocd"));
        assert!(next.deployment("argocd", "argocd-argocd-server").is_some());
        assert!(next.deployment("argocd", "argocd-argocd-redis").is_some());
        let argo_deployments = next
            .deployments
            .iter()
            .filter(|d| d.metadata.namespace == "argocd")
            .count();
        assert_eq!(argo_deployments, 5);
    }

    #[test]
    fn test_uninstall_removes_workloads() {
        let s = initial_cluster_state();
        let mut h = with_bitnami();
        let (_, installed) = run(&toks("install my-web bitnami/nginx"), &s, &mut h);
        let (out, next) = run(&toks("uninstall my-web"), &installed, &mut h);
        assert_eq!(out, "release \"my-web\" uninstalled");
        assert!(next.deployment("default", "my-web-nginx").is_none());
        assert!(next.service("default", "my-web-nginx").is_none());
        assert!(!next
            .pods
            .iter()
            .any(|p| p.metadata.labels.get("app.kubernetes.io/instance") == Some(&"my-web".to_string())));
        assert!(h.releases.is_empty());
    }

    #[test]
    fn test_list_shows_releases() {
        let s = initial_cluster_state();
        let mut h = with_bitnami();
        let (_, installed) = run(&toks("install my-web bitnami/nginx"), &s, &mut h);
        let (out, _) = run(&toks("list"), &installed, &mut h);
        assert!(out.contains("my-web"));
        assert!(out.contains("nginx-15.14.0"));
    }

    #[test]
    fn test_template_renders_without_install() {
        let s = initial_cluster_state();
        let mut h = with_bitnami();
        let (out, next) = run(&toks("template my-web bitnami/nginx"), &s, &mut h);
        assert!(out.contains("kind: Deployment"));
        assert!(out.contains("image: nginx:latest"));
        assert_eq!(next.deployments.len(), s.deployments.len());
        assert!(h.releases.is_empty());
    }

    #[test]
    fn test_search_repo() {
        let s = initial_cluster_state();
        let mut h = with_bitnami();
        let (out, _) = run(&toks("search repo nginx"), &s, &mut h);
        assert!(out.contains("bitnami/nginx"));
        assert!(out.contains("15.14.0"));
    }
}
