use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const HOME: &str = "/home/user";

/// A single filesystem node. Directories carry children, files carry data.
#[derive(Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub is_dir: bool,
    pub data: String,
    pub children: HashMap<String, Node>,
    pub permissions: String,
}

impl Node {
    pub fn dir(name: &str) -> Self {
        Node {
            name: name.into(),
            is_dir: true,
            data: String::new(),
            children: HashMap::new(),
            permissions: "drwxr-xr-x".into(),
        }
    }
    pub fn file(name: &str, data: &str) -> Self {
        Node {
            name: name.into(),
            is_dir: false,
            data: data.into(),
            children: HashMap::new(),
            permissions: "-rw-r--r--".into(),
        }
    }
    pub fn size(&self) -> usize {
        if self.is_dir {
            4096
        } else {
            self.data.len()
        }
    }
}

/// The virtual filesystem: a rooted node tree plus the shell's working
/// directory cursor and environment map. Callers that need copy-on-write
/// semantics clone the whole `Vfs` before mutating; nothing in here
/// mutates a node reachable from a previously returned snapshot.
#[derive(Clone, Serialize, Deserialize)]
pub struct Vfs {
    root: Node,
    pub cwd: String,
    pub env: HashMap<String, String>,
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

impl Vfs {
    pub fn new() -> Self {
        let mut env = HashMap::new();
        env.insert("HOME".into(), HOME.into());
        env.insert("PATH".into(), "/usr/local/bin:/usr/bin:/bin".into());
        env.insert("USER".into(), "user".into());
        env.insert("SHELL".into(), "/bin/bash".into());
        env.insert("KUBECONFIG".into(), "/etc/kubernetes/admin.conf".into());
        let mut fs = Vfs {
            root: Node::dir("/"),
            cwd: HOME.into(),
            env,
        };
        fs.init();
        fs
    }

    fn init(&mut self) {
        for d in ["bin", "etc", "home", "root", "tmp", "usr", "var", "opt"] {
            self.root.children.insert(d.into(), Node::dir(d));
        }

        if let Some(etc) = self.root.children.get_mut("etc") {
            etc.children
                .insert("hostname".into(), Node::file("hostname", "controlplane\n"));
            etc.children.insert(
                "hosts".into(),
                Node::file(
                    "hosts",
                    "127.0.0.1\tlocalhost\n10.0.0.10\tcontrolplane\n10.0.0.11\tnode01\n10.0.0.12\tnode02\n",
                ),
            );
            etc.children.insert(
                "resolv.conf".into(),
                Node::file("resolv.conf", "nameserver 10.96.0.10\nsearch default.svc.cluster.local svc.cluster.local\n"),
            );
            let mut kube = Node::dir("kubernetes");
            kube.children.insert(
                "admin.conf".into(),
                Node::file(
                    "admin.conf",
                    "apiVersion: v1\nkind: Config\nclusters:\n- cluster:\n    server: https://10.0.0.10:6443\n  name: kubernetes\ncontexts:\n- context:\n    cluster: kubernetes\n    user: kubernetes-admin\n  name: kubernetes-admin@kubernetes\ncurrent-context: kubernetes-admin@kubernetes\n",
                ),
            );
            let mut manifests = Node::dir("manifests");
            manifests.children.insert(
                "etcd.yaml".into(),
                Node::file(
                    "etcd.yaml",
                    "apiVersion: v1\nkind: Pod\nmetadata:\n  name: etcd-controlplane\n  namespace: kube-system\nspec:\n  containers:\n  - name: etcd\n    image: registry.k8s.io/etcd:3.5.12-0\n",
                ),
            );
            manifests.children.insert(
                "kube-apiserver.yaml".into(),
                Node::file(
                    "kube-apiserver.yaml",
                    "apiVersion: v1\nkind: Pod\nmetadata:\n  name: kube-apiserver-controlplane\n  namespace: kube-system\nspec:\n  containers:\n  - name: kube-apiserver\n    image: registry.k8s.io/kube-apiserver:v1.29.0\n",
                ),
            );
            kube.children.insert("manifests".into(), manifests);
            etc.children.insert("kubernetes".into(), kube);
        }

        if let Some(var) = self.root.children.get_mut("var") {
            let mut log = Node::dir("log");
            log.children.insert("syslog".into(), Node::file("syslog", ""));
            var.children.insert("log".into(), log);
            let mut lib = Node::dir("lib");
            let mut etcd = Node::dir("etcd");
            let mut member = Node::dir("member");
            let mut snap = Node::dir("snap");
            snap.children
                .insert("db".into(), Node::file("db", "etcd keyspace data"));
            member.children.insert("snap".into(), snap);
            member.children.insert("wal".into(), Node::dir("wal"));
            etcd.children.insert("member".into(), member);
            lib.children.insert("etcd".into(), etcd);
            var.children.insert("lib".into(), lib);
        }

        if let Some(home) = self.root.children.get_mut("home") {
            let mut user = Node::dir("user");
            user.children.insert(
                ".bashrc".into(),
                Node::file(".bashrc", "alias k=kubectl\nexport KUBECONFIG=/etc/kubernetes/admin.conf\n"),
            );
            user.children.insert(
                "notes.txt".into(),
                Node::file(
                    "notes.txt",
                    "CKA prep checklist:\n- etcd backup and restore\n- rolling updates\n- RBAC roles and bindings\n",
                ),
            );
            let mut manifests = Node::dir("manifests");
            manifests.children.insert(
                "nginx-pod.yaml".into(),
                Node::file(
                    "nginx-pod.yaml",
                    "apiVersion: v1\nkind: Pod\nmetadata:\n  name: nginx\n  labels:\n    app: nginx\nspec:\n  containers:\n  - name: nginx\n    image: nginx:1.25\n    ports:\n    - containerPort: 80\n",
                ),
            );
            manifests.children.insert(
                "redis-deployment.yaml".into(),
                Node::file(
                    "redis-deployment.yaml",
                    "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: redis\n  labels:\n    app: redis\nspec:\n  replicas: 2\n  selector:\n    matchLabels:\n      app: redis\n  template:\n    metadata:\n      labels:\n        app: redis\n    spec:\n      containers:\n      - name: redis\n        image: redis:7.2\n        ports:\n        - containerPort: 6379\n",
                ),
            );
            user.children.insert("manifests".into(), manifests);
            home.children.insert("user".into(), user);
        }
    }

    /// Normalize a path against the working directory: handles `~`,
    /// `~/x`, relative and absolute forms, and `.`/`..` components.
    pub fn normalize(&self, path: &str) -> String {
        resolve_path(&self.cwd, path)
    }

    pub fn resolve(&self, path: &str) -> Option<&Node> {
        let norm = self.normalize(path);
        let mut node = &self.root;
        for part in norm.split('/').filter(|s| !s.is_empty()) {
            node = node.children.get(part)?;
        }
        Some(node)
    }

    pub fn resolve_mut(&mut self, path: &str) -> Option<&mut Node> {
        let norm = self.normalize(path);
        let mut node = &mut self.root;
        for part in norm.split('/').filter(|s| !s.is_empty()) {
            node = node.children.get_mut(part)?;
        }
        Some(node)
    }

    /// Parent directory of `path` plus the leaf name, or None when the
    /// parent does not exist or is not a directory.
    pub fn parent_mut(&mut self, path: &str) -> Option<(&mut Node, String)> {
        let norm = self.normalize(path);
        let (dir, name) = split_parent(&norm)?;
        let parent = {
            let mut node = &mut self.root;
            for part in dir.split('/').filter(|s| !s.is_empty()) {
                node = node.children.get_mut(part)?;
            }
            node
        };
        if !parent.is_dir {
            return None;
        }
        Some((parent, name))
    }

    pub fn cd(&mut self, target: &str) -> Result<(), String> {
        let norm = self.normalize(target);
        match self.resolve(&norm) {
            Some(n) if n.is_dir => {
                self.cwd = norm;
                Ok(())
            }
            Some(_) => Err("Not a directory".into()),
            None => Err("No such file or directory".into()),
        }
    }

    /// Insert a node at `path`. Fails (returns false) when the parent is
    /// missing or a sibling with the same name exists.
    pub fn create(&mut self, path: &str, node: Node) -> bool {
        match self.parent_mut(path) {
            Some((parent, name)) => {
                if parent.children.contains_key(&name) {
                    return false;
                }
                let mut node = node;
                node.name = name.clone();
                parent.children.insert(name, node);
                true
            }
            None => false,
        }
    }

    /// Write file content, creating the file when absent. Fails only when
    /// the parent directory is missing or the target is a directory.
    pub fn write_file(&mut self, path: &str, data: &str, append: bool) -> bool {
        let norm = self.normalize(path);
        if let Some(node) = self.resolve_mut(&norm) {
            if node.is_dir {
                return false;
            }
            if append {
                node.data.push_str(data);
            } else {
                node.data = data.into();
            }
            return true;
        }
        match self.parent_mut(&norm) {
            Some((parent, name)) => {
                parent.children.insert(name.clone(), Node::file(&name, data));
                true
            }
            None => false,
        }
    }

    pub fn delete(&mut self, path: &str) -> bool {
        let norm = self.normalize(path);
        if norm == "/" {
            return false;
        }
        match self.parent_mut(&norm) {
            Some((parent, name)) => parent.children.remove(&name).is_some(),
            None => false,
        }
    }

    pub fn read_file(&self, path: &str) -> Option<&str> {
        self.resolve(path)
            .filter(|n| !n.is_dir)
            .map(|n| n.data.as_str())
    }
}

/// Pure path resolution: `target` relative to `current`, with `~`
/// expansion and `.`/`..` normalization. `resolve_path("/home/user",
/// "..")` is `/home`; `resolve_path(anything, "~")` is `/home/user`.
pub fn resolve_path(current: &str, target: &str) -> String {
    let raw = if target == "~" {
        HOME.to_string()
    } else if let Some(rest) = target.strip_prefix("~/") {
        format!("{}/{}", HOME, rest)
    } else if target.starts_with('/') {
        target.to_string()
    } else {
        format!("{}/{}", current.trim_end_matches('/'), target)
    };
    let mut parts: Vec<&str> = Vec::new();
    for part in raw.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

fn split_parent(norm: &str) -> Option<(String, String)> {
    if norm == "/" {
        return None;
    }
    let idx = norm.rfind('/')?;
    let dir = if idx == 0 { "/" } else { &norm[..idx] };
    let name = &norm[idx + 1..];
    if name.is_empty() {
        return None;
    }
    Some((dir.to_string(), name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path_dotdot() {
        assert_eq!(resolve_path("/home/user", ".."), "/home");
        assert_eq!(resolve_path("/", ".."), "/");
    }

    #[test]
    fn test_resolve_path_tilde() {
        assert_eq!(resolve_path("/tmp", "~"), "/home/user");
        assert_eq!(resolve_path("/tmp", "~/manifests"), "/home/user/manifests");
    }

    #[test]
    fn test_resolve_path_relative() {
        assert_eq!(
            resolve_path("/home/user", "manifests/./a.yaml"),
            "/home/user/manifests/a.yaml"
        );
        assert_eq!(resolve_path("/home/user", "/etc/hosts"), "/etc/hosts");
    }

    #[test]
    fn test_seeded_layout() {
        let fs = Vfs::new();
        assert!(fs.resolve("/etc/kubernetes/manifests/etcd.yaml").is_some());
        assert!(fs
            .read_file("~/manifests/nginx-pod.yaml")
            .unwrap()
            .contains("kind: Pod"));
        assert_eq!(fs.cwd, "/home/user");
    }

    #[test]
    fn test_create_and_duplicate() {
        let mut fs = Vfs::new();
        assert!(fs.create("/tmp/a.txt", Node::file("a.txt", "x")));
        assert!(!fs.create("/tmp/a.txt", Node::file("a.txt", "y")));
        assert_eq!(fs.read_file("/tmp/a.txt"), Some("x"));
    }

    #[test]
    fn test_write_append_delete() {
        let mut fs = Vfs::new();
        assert!(fs.write_file("/tmp/log", "a", false));
        assert!(fs.write_file("/tmp/log", "b", true));
        assert_eq!(fs.read_file("/tmp/log"), Some("ab"));
        assert!(fs.delete("/tmp/log"));
        assert!(!fs.delete("/tmp/log"));
    }

    #[test]
    fn test_cd_errors() {
        let mut fs = Vfs::new();
        assert!(fs.cd("/etc").is_ok());
        assert_eq!(fs.cwd, "/etc");
        assert!(fs.cd("/etc/hostname").is_err());
        assert!(fs.cd("/nope").is_err());
    }

    #[test]
    fn test_snapshot_isolation() {
        let fs = Vfs::new();
        let mut copy = fs.clone();
        copy.write_file("/tmp/x", "changed", false);
        assert!(fs.read_file("/tmp/x").is_none());
    }
}
