//! The dispatcher: one simulated session. Owns the cluster state, the
//! virtual filesystem, the helm registry and the host service table, and
//! routes each input line to the right interpreter after variable
//! expansion, pipe splitting, and redirection handling.

use crate::helm::HelmState;
use crate::kubectl::{self, Action};
use crate::shell::{self, ShellOutcome};
use crate::state::{ClusterState, initial_cluster_state};
use crate::tokenizer::{expand_vars, tokenize};
use crate::vfs::Vfs;
use crate::{etcd, helm};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Simulated seconds added per executed command line.
const TICK_SECS: u64 = 30;

#[derive(Clone, Serialize, Deserialize)]
pub enum EditTarget {
    File { path: String },
    Resource {
        resource: String,
        namespace: String,
        name: String,
    },
}

pub struct EditorRequest {
    pub title: String,
    pub content: String,
    pub target: EditTarget,
}

pub enum CommandOutcome {
    Text(String),
    Editor(EditorRequest),
    ExecMode { namespace: String, pod: String },
}

/// Everything a session persists between commands.
#[derive(Clone, Serialize, Deserialize)]
pub struct Simulator {
    pub state: ClusterState,
    pub vfs: Vfs,
    pub helm: HelmState,
    pub services: BTreeMap<String, bool>,
    /// (namespace, pod) while inside `kubectl exec` shell.
    pub exec_session: Option<(String, String)>,
    pub history: Vec<String>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        let mut services = BTreeMap::new();
        services.insert("kubelet".to_string(), true);
        services.insert("containerd".to_string(), true);
        services.insert("etcd".to_string(), true);
        Simulator {
            state: initial_cluster_state(),
            vfs: Vfs::new(),
            helm: HelmState::default(),
            services,
            exec_session: None,
            history: Vec::new(),
        }
    }

    pub fn prompt(&self) -> String {
        if let Some((_, pod)) = &self.exec_session {
            return format!("root@{}:/# ", pod);
        }
        let cwd = &self.vfs.cwd;
        let display = if cwd == "/home/user" {
            "~".to_string()
        } else if let Some(rest) = cwd.strip_prefix("/home/user/") {
            format!("~/{}", rest)
        } else {
            cwd.clone()
        };
        format!("user@controlplane:{}$ ", display)
    }

    pub fn execute(&mut self, line: &str) -> CommandOutcome {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return CommandOutcome::Text(String::new());
        }
        self.history.push(trimmed.to_string());
        self.state.clock += TICK_SECS;

        // Inside a pod, only the canned in-container set applies.
        if let Some((ns, pod)) = self.exec_session.clone() {
            if trimmed == "exit" {
                self.exec_session = None;
                return CommandOutcome::Text("exit".into());
            }
            return CommandOutcome::Text(kubectl::exec_in_pod(&self.state, &ns, &pod, trimmed));
        }

        let expanded = expand_vars(trimmed, &self.vfs.env);

        // Redirection binds after the last pipe stage.
        let (body, redirect) = split_redirect(&expanded);
        let stages: Vec<String> = split_unquoted(&body, '|')
            .into_iter()
            .map(|s| s.trim().to_string())
            .collect();

        let outcome = self.run_single(&stages[0]);
        let mut output = match outcome {
            CommandOutcome::Text(t) => t,
            other => return other,
        };

        for stage in &stages[1..] {
            output = apply_filter(&output, stage);
        }

        if let Some((path, append)) = redirect {
            if !self.vfs.write_file(&path, &format!("{}\n", output), append) {
                return CommandOutcome::Text(format!(
                    "bash: {}: No such file or directory",
                    path
                ));
            }
            return CommandOutcome::Text(String::new());
        }
        CommandOutcome::Text(output)
    }

    fn run_single(&mut self, segment: &str) -> CommandOutcome {
        let mut tokens = tokenize(segment);
        if tokens.is_empty() {
            return CommandOutcome::Text(String::new());
        }
        // sudo and watch are transparent prefixes here.
        while tokens.first().map(|t| t == "sudo" || t == "watch").unwrap_or(false) {
            tokens.remove(0);
            if tokens.is_empty() {
                return CommandOutcome::Text(String::new());
            }
        }
        if tokens[0] == "k" {
            tokens[0] = "kubectl".into();
        }
        let cmd = tokens[0].clone();
        let args = &tokens[1..];

        match cmd.as_str() {
            "kubectl" => {
                let result = kubectl::run(args, &self.state);
                self.state = result.state;
                match result.action {
                    Action::None => CommandOutcome::Text(result.output),
                    // The kubectl interpreter never reads the filesystem;
                    // `-f` paths and `cp` come back here for resolution.
                    Action::File(req) => {
                        let Some(content) = self.vfs.read_file(&req.path).map(|s| s.to_string())
                        else {
                            return CommandOutcome::Text(format!(
                                "error: the path \"{}\" does not exist",
                                req.path
                            ));
                        };
                        let (output, next) = kubectl::apply_file(&req, &content, &self.state);
                        self.state = next;
                        CommandOutcome::Text(output)
                    }
                    Action::WriteFile { path, content } => {
                        if self.vfs.write_file(&path, &content, false) {
                            CommandOutcome::Text(result.output)
                        } else {
                            CommandOutcome::Text(format!(
                                "error: open {}: no such file or directory",
                                path
                            ))
                        }
                    }
                    Action::ReadFile { path } => {
                        if self.vfs.read_file(&path).is_some() {
                            CommandOutcome::Text(result.output)
                        } else {
                            CommandOutcome::Text(format!(
                                "error: {}: no such file or directory",
                                path
                            ))
                        }
                    }
                    Action::Edit {
                        resource,
                        namespace,
                        name,
                        content,
                    } => CommandOutcome::Editor(EditorRequest {
                        title: format!("{}/{}", resource, name),
                        content,
                        target: EditTarget::Resource {
                            resource,
                            namespace,
                            name,
                        },
                    }),
                    Action::Exec { namespace, pod } => {
                        self.exec_session = Some((namespace.clone(), pod.clone()));
                        CommandOutcome::ExecMode {
                            namespace,
                            pod,
                        }
                    }
                }
            }
            "etcdctl" => {
                let (output, next) = etcd::run(args, &self.state, &mut self.vfs);
                self.state = next;
                CommandOutcome::Text(output)
            }
            "helm" => {
                let (output, next) = helm::run(args, &self.state, &mut self.helm);
                self.state = next;
                CommandOutcome::Text(output)
            }
            "exit" | "logout" => CommandOutcome::Text("logout".into()),
            _ => {
                let outcome = shell::run(&cmd, args, &mut self.vfs, &mut self.services);
                if cmd == "rm" {
                    self.check_etcd_data();
                }
                match outcome {
                    ShellOutcome::Text(t) => CommandOutcome::Text(t),
                    ShellOutcome::OpenEditor { path, content } => {
                        CommandOutcome::Editor(EditorRequest {
                            title: path.clone(),
                            content,
                            target: EditTarget::File { path },
                        })
                    }
                    ShellOutcome::NotShell => {
                        CommandOutcome::Text(format!("command not found: {}", cmd))
                    }
                }
            }
        }
    }

    /// Deleting the etcd data directory takes the API server down until a
    /// snapshot restore brings the keyspace back.
    fn check_etcd_data(&mut self) {
        if self.vfs.resolve("/var/lib/etcd/member").is_none() && !self.state.etcd.corrupted {
            self.state.etcd.corrupted = true;
            for m in &mut self.state.etcd.members {
                m.healthy = false;
            }
        }
    }

    /// Apply an editor buffer produced by a `CommandOutcome::Editor`.
    pub fn editor_save(&mut self, target: &EditTarget, buffer: &str) -> String {
        match target {
            EditTarget::File { path } => {
                if self.vfs.write_file(path, buffer, false) {
                    String::new()
                } else {
                    format!("bash: {}: No such file or directory", path)
                }
            }
            EditTarget::Resource {
                resource,
                namespace,
                name,
            } => {
                let (output, next) =
                    kubectl::finish_edit(resource, namespace, name, buffer, &self.state);
                self.state = next;
                output
            }
        }
    }
}

/// Split a trailing `> file` / `>> file` off a command line.
/// Split on an operator character, leaving quoted occurrences alone.
fn split_unquoted(line: &str, op: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut cur = String::new();
    let mut quote: Option<char> = None;
    for c in line.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                cur.push(c);
            }
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                cur.push(c);
            }
            None if c == op => {
                parts.push(std::mem::take(&mut cur));
            }
            None => cur.push(c),
        }
    }
    parts.push(cur);
    parts
}

fn split_redirect(line: &str) -> (String, Option<(String, bool)>) {
    let mut quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '>' => {
                let append = line[i + 1..].starts_with('>');
                let target = line[i + if append { 2 } else { 1 }..].trim().to_string();
                if target.is_empty() {
                    return (line.to_string(), None);
                }
                return (line[..i].trim_end().to_string(), Some((target, append)));
            }
            None => {}
        }
    }
    (line.to_string(), None)
}

/// Pipe stages the dispatcher understands. Unknown stages pass input
/// through unchanged.
fn apply_filter(input: &str, stage: &str) -> String {
    let tokens = tokenize(stage);
    let Some(cmd) = tokens.first() else {
        return input.to_string();
    };
    match cmd.as_str() {
        "grep" => {
            let invert = tokens.iter().any(|t| t == "-v");
            let Some(pattern) = tokens.iter().skip(1).find(|t| !t.starts_with('-')) else {
                return input.to_string();
            };
            shell::grep_lines(input, pattern, invert)
        }
        "head" | "tail" => {
            let mut n = 10usize;
            for (i, t) in tokens.iter().enumerate() {
                if t == "-n" {
                    if let Some(v) = tokens.get(i + 1).and_then(|v| v.parse().ok()) {
                        n = v;
                    }
                } else if let Some(v) = t.strip_prefix('-').and_then(|v| v.parse().ok()) {
                    n = v;
                }
            }
            let lines: Vec<&str> = input.lines().collect();
            let slice: Vec<&str> = if cmd == "head" {
                lines.iter().take(n).copied().collect()
            } else {
                lines.iter().rev().take(n).rev().copied().collect()
            };
            slice.join("\n")
        }
        "wc" => {
            if tokens.iter().any(|t| t == "-l") {
                input.lines().count().to_string()
            } else {
                format!(
                    "{} {} {}",
                    input.lines().count(),
                    input.split_whitespace().count(),
                    input.len()
                )
            }
        }
        "sort" => {
            let mut lines: Vec<&str> = input.lines().collect();
            lines.sort();
            if tokens.iter().any(|t| t == "-r") {
                lines.reverse();
            }
            lines.join("\n")
        }
        "uniq" => {
            let mut out: Vec<&str> = Vec::new();
            for l in input.lines() {
                if out.last() != Some(&l) {
                    out.push(l);
                }
            }
            out.join("\n")
        }
        "base64" => {
            if tokens.iter().any(|t| t == "-d" || t == "--decode") {
                crate::b64_decode(input.trim())
                    .and_then(|b| String::from_utf8(b).ok())
                    .unwrap_or_else(|| "base64: invalid input".into())
            } else {
                crate::b64_encode(input)
            }
        }
        _ => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(sim: &mut Simulator, line: &str) -> String {
        match sim.execute(line) {
            CommandOutcome::Text(t) => t,
            CommandOutcome::Editor(_) => panic!("unexpected editor for: {}", line),
            CommandOutcome::ExecMode { .. } => panic!("unexpected exec mode for: {}", line),
        }
    }

    #[test]
    fn test_command_not_found() {
        let mut sim = Simulator::new();
        assert_eq!(text(&mut sim, "frobnicate"), "command not found: frobnicate");
    }

    #[test]
    fn test_alias_k() {
        let mut sim = Simulator::new();
        let out = text(&mut sim, "k get nodes");
        assert!(out.contains("controlplane"));
        assert!(out.contains("node01"));
    }

    #[test]
    fn test_clock_advances() {
        let mut sim = Simulator::new();
        let before = sim.state.clock;
        text(&mut sim, "pwd");
        assert_eq!(sim.state.clock, before + TICK_SECS);
    }

    #[test]
    fn test_var_expansion() {
        let mut sim = Simulator::new();
        text(&mut sim, "export NS=kube-system");
        let out = text(&mut sim, "kubectl get pods -n $NS");
        assert!(out.contains("coredns"));
    }

    #[test]
    fn test_redirect_and_cat() {
        let mut sim = Simulator::new();
        assert_eq!(text(&mut sim, "kubectl get nodes > /tmp/nodes.txt"), "");
        let out = text(&mut sim, "cat /tmp/nodes.txt");
        assert!(out.contains("node01"));
        text(&mut sim, "echo more >> /tmp/nodes.txt");
        assert!(text(&mut sim, "cat /tmp/nodes.txt").ends_with("more"));
    }

    #[test]
    fn test_pipe_grep() {
        let mut sim = Simulator::new();
        let out = text(&mut sim, "kubectl get pods -n kube-system | grep coredns");
        assert!(out.contains("coredns"));
        assert!(!out.contains("kube-apiserver"));
    }

    #[test]
    fn test_pipe_wc_l() {
        let mut sim = Simulator::new();
        let out = text(&mut sim, "kubectl get nodes | wc -l");
        // Header plus three nodes.
        assert_eq!(out, "4");
    }

    #[test]
    fn test_exec_mode_round_trip() {
        let mut sim = Simulator::new();
        text(&mut sim, "kubectl run shelltest --image=nginx");
        match sim.execute("kubectl exec -it shelltest -- sh") {
            CommandOutcome::ExecMode { pod, .. } => assert_eq!(pod, "shelltest"),
            _ => panic!("expected exec mode"),
        }
        assert!(sim.prompt().starts_with("root@shelltest:/#"));
        assert_eq!(text(&mut sim, "whoami"), "root");
        assert_eq!(text(&mut sim, "exit"), "exit");
        assert!(sim.prompt().starts_with("user@controlplane:"));
    }

    #[test]
    fn test_exec_without_flags_enters_pod_shell() {
        let mut sim = Simulator::new();
        text(&mut sim, "kubectl run shelltest --image=nginx");
        match sim.execute("kubectl exec shelltest -- sh") {
            CommandOutcome::ExecMode { pod, .. } => assert_eq!(pod, "shelltest"),
            _ => panic!("expected exec mode"),
        }
        assert_eq!(text(&mut sim, "hostname"), "shelltest");
        assert_eq!(text(&mut sim, "exit"), "exit");
        match sim.execute("kubectl exec shelltest") {
            CommandOutcome::ExecMode { pod, .. } => assert_eq!(pod, "shelltest"),
            _ => panic!("expected exec mode"),
        }
    }

    #[test]
    fn test_apply_f_resolves_path_through_vfs() {
        let mut sim = Simulator::new();
        assert!(sim.vfs.write_file(
            "/tmp/pod.yaml",
            "apiVersion: v1\nkind: Pod\nmetadata:\n  name: fromfile\nspec:\n  containers:\n  - name: c\n    image: nginx\n",
            false,
        ));
        let out = text(&mut sim, "kubectl apply -f /tmp/pod.yaml");
        assert_eq!(out, "pod/fromfile created");
        assert!(sim.state.pod("default", "fromfile").is_some());
        let missing = text(&mut sim, "kubectl apply -f /tmp/nope.yaml");
        assert_eq!(missing, "error: the path \"/tmp/nope.yaml\" does not exist");
    }

    #[test]
    fn test_quoted_pipe_and_redirect_stay_in_arguments() {
        let mut sim = Simulator::new();
        assert_eq!(text(&mut sim, "echo \"a|b\""), "a|b");
        assert_eq!(text(&mut sim, "echo 'x > y'"), "x > y");
        text(
            &mut sim,
            "kubectl create secret generic creds --from-literal=pass=\"a|b\"",
        );
        let sec = sim
            .state
            .secret("default", "creds")
            .expect("secret should exist");
        assert_eq!(sec.data.get("pass"), Some(&crate::b64_encode("a|b")));
    }

    #[test]
    fn test_editor_round_trip_for_file() {
        let mut sim = Simulator::new();
        let target = match sim.execute("vim /tmp/test.yaml") {
            CommandOutcome::Editor(req) => req.target,
            _ => panic!("expected editor"),
        };
        let err = sim.editor_save(&target, "hello\n");
        assert_eq!(err, "");
        assert_eq!(text(&mut sim, "cat /tmp/test.yaml"), "hello");
    }

    #[test]
    fn test_editor_round_trip_for_deployment() {
        let mut sim = Simulator::new();
        text(&mut sim, "kubectl create deployment web --image=nginx");
        let (content, target) = match sim.execute("kubectl edit deployment web") {
            CommandOutcome::Editor(req) => (req.content, req.target),
            _ => panic!("expected editor"),
        };
        assert!(content.contains("replicas: 1"));
        let edited = content.replace("replicas: 1", "replicas: 3");
        let out = sim.editor_save(&target, &edited);
        assert_eq!(out, "deployment.apps/web edited");
        let d = sim.state.deployment("default", "web").unwrap().clone();
        assert_eq!(sim.state.owned_pods(&d).len(), 3);
    }

    #[test]
    fn test_rm_etcd_data_breaks_cluster_and_restore_heals() {
        let mut sim = Simulator::new();
        let tls = "--cacert=/etc/kubernetes/pki/etcd/ca.crt --cert=/etc/kubernetes/pki/etcd/server.crt --key=/etc/kubernetes/pki/etcd/server.key";
        text(&mut sim, &format!("etcdctl snapshot save /opt/backup.db {}", tls));
        text(&mut sim, "rm -rf /var/lib/etcd");
        assert!(sim.state.etcd.corrupted);
        let out = text(&mut sim, "kubectl get pods");
        assert!(out.contains("connection to the server"));
        let restored = text(&mut sim, "etcdctl snapshot restore /opt/backup.db");
        assert!(restored.contains("restored snapshot"));
        assert!(!sim.state.etcd.corrupted);
        assert!(text(&mut sim, "kubectl get pods -n kube-system").contains("coredns"));
    }

    #[test]
    fn test_helm_through_dispatcher() {
        let mut sim = Simulator::new();
        text(&mut sim, "helm repo add bitnami https://charts.bitnami.com/bitnami");
        let out = text(&mut sim, "helm install web bitnami/nginx");
        assert!(out.contains("STATUS: deployed"));
        let pods = text(&mut sim, "kubectl get pods");
        assert!(pods.contains("web-nginx"));
    }

    #[test]
    fn test_scenario_deploy_scale_delete() {
        let mut sim = Simulator::new();
        text(&mut sim, "kubectl create deployment web --image=nginx --replicas=3");
        let out = text(&mut sim, "kubectl get deployments");
        assert!(out.contains("3/3"));
        text(&mut sim, "kubectl scale deployment web --replicas=1");
        let out = text(&mut sim, "kubectl get deployments");
        assert!(out.contains("1/1"));
        let out = text(&mut sim, "kubectl delete deployment web");
        assert_eq!(out, "deployment.apps \"web\" deleted");
        assert!(text(&mut sim, "kubectl get pods").starts_with("No resources found"));
    }
}
