//! Shell built-ins and coreutils over the virtual filesystem. Commands
//! that are not plain shell commands (kubectl, etcdctl, helm) are routed
//! elsewhere by the dispatcher; this module returns `NotShell` for them.

use crate::vfs::{Node, Vfs};
use std::collections::BTreeMap;

pub enum ShellOutcome {
    NotShell,
    Text(String),
    /// vim/vi/nano on a path; the dispatcher owns the editor round-trip.
    OpenEditor {
        path: String,
        content: String,
    },
}

fn text(s: impl Into<String>) -> ShellOutcome {
    ShellOutcome::Text(s.into())
}

pub fn run(
    cmd: &str,
    args: &[String],
    vfs: &mut Vfs,
    services: &mut BTreeMap<String, bool>,
) -> ShellOutcome {
    match cmd {
        "pwd" => text(vfs.cwd.clone()),
        "cd" => cmd_cd(args, vfs),
        "ls" => cmd_ls(args, vfs),
        "cat" => cmd_cat(args, vfs),
        "mkdir" => cmd_mkdir(args, vfs),
        "touch" => cmd_touch(args, vfs),
        "rm" => cmd_rm(args, vfs),
        "cp" => cmd_cp_mv(args, vfs, false),
        "mv" => cmd_cp_mv(args, vfs, true),
        "echo" => text(args.join(" ")),
        "head" => cmd_head_tail(args, vfs, true),
        "tail" => cmd_head_tail(args, vfs, false),
        "grep" => cmd_grep(args, vfs),
        "wc" => cmd_wc(args, vfs),
        "which" => cmd_which(args),
        "tree" => cmd_tree(args, vfs),
        "export" => cmd_export(args, vfs),
        "env" | "printenv" => cmd_env(vfs),
        "unset" => cmd_unset(args, vfs),
        "whoami" => text("root"),
        "hostname" => text("controlplane"),
        "date" => text("Sat Jun  1 10:00:00 UTC 2024"),
        "uname" => {
            if args.iter().any(|a| a == "-a") {
                text("Linux controlplane 5.15.0-112-generic #122-Ubuntu SMP x86_64 GNU/Linux")
            } else {
                text("Linux")
            }
        }
        "clear" => text("\x1b[2J\x1b[H"),
        "history" => text(""),
        "man" => text(format!(
            "No manual entry for {}",
            args.first().map(|s| s.as_str()).unwrap_or("")
        )),
        "systemctl" => cmd_systemctl(args, services),
        "journalctl" => cmd_journalctl(args, services),
        "dpkg" => cmd_dpkg(args),
        "sysctl" => cmd_sysctl(args),
        "wget" => cmd_wget(args, vfs),
        "curl" => cmd_curl(args),
        "ip" => cmd_ip(args),
        "free" => text("               total        used        free      shared  buff/cache   available\nMem:         8124928     2214016     3571200       10240     2339712     5603328\nSwap:              0           0           0"),
        "df" => text("Filesystem     1K-blocks     Used Available Use% Mounted on\n/dev/sda1       61252420 12582912  45533224  22% /\ntmpfs            4062464        0   4062464   0% /dev/shm"),
        "vim" | "vi" | "nano" => cmd_editor(args, vfs),
        _ => ShellOutcome::NotShell,
    }
}

fn cmd_cd(args: &[String], vfs: &mut Vfs) -> ShellOutcome {
    let target = args.first().map(|s| s.as_str()).unwrap_or("~");
    match vfs.cd(target) {
        Ok(()) => text(""),
        Err(e) => text(format!("bash: cd: {}: {}", target, e)),
    }
}

fn cmd_ls(args: &[String], vfs: &Vfs) -> ShellOutcome {
    let all = args.iter().any(|a| a.starts_with('-') && a.contains('a'));
    let long = args.iter().any(|a| a.starts_with('-') && a.contains('l'));
    let path = args
        .iter()
        .find(|a| !a.starts_with('-'))
        .map(|s| s.as_str())
        .unwrap_or(".");
    let Some(node) = vfs.resolve(path) else {
        return text(format!(
            "ls: cannot access '{}': No such file or directory",
            path
        ));
    };
    if !node.is_dir {
        return text(if long { long_line(node) } else { node.name.clone() });
    }
    let mut names: Vec<&String> = node.children.keys().collect();
    names.sort();
    let mut out = Vec::new();
    if all {
        out.push(if long {
            "drwxr-xr-x 2 root root 4096 Jun  1 10:00 .".to_string()
        } else {
            ".".to_string()
        });
        out.push(if long {
            "drwxr-xr-x 2 root root 4096 Jun  1 10:00 ..".to_string()
        } else {
            "..".to_string()
        });
    }
    for name in names {
        if !all && name.starts_with('.') {
            continue;
        }
        let child = &node.children[name];
        out.push(if long {
            long_line(child)
        } else {
            child.name.clone()
        });
    }
    text(out.join(if long { "\n" } else { "  " }))
}

fn long_line(node: &Node) -> String {
    format!(
        "{} 1 root root {:>6} Jun  1 10:00 {}",
        node.permissions,
        node.size(),
        node.name
    )
}

fn cmd_cat(args: &[String], vfs: &Vfs) -> ShellOutcome {
    let files: Vec<&String> = args.iter().filter(|a| !a.starts_with('-')).collect();
    if files.is_empty() {
        return text("");
    }
    let mut parts = Vec::new();
    for f in files {
        match vfs.read_file(f) {
            Some(data) => parts.push(data.trim_end_matches('\n').to_string()),
            None => {
                if vfs.resolve(f).map(|n| n.is_dir).unwrap_or(false) {
                    parts.push(format!("cat: {}: Is a directory", f));
                } else {
                    parts.push(format!("cat: {}: No such file or directory", f));
                }
            }
        }
    }
    text(parts.join("\n"))
}

fn cmd_mkdir(args: &[String], vfs: &mut Vfs) -> ShellOutcome {
    let parents = args.iter().any(|a| a == "-p");
    let mut errors = Vec::new();
    for path in args.iter().filter(|a| !a.starts_with('-')) {
        if parents {
            // Create each missing component along the way.
            let norm = vfs.normalize(path);
            let mut cur = String::new();
            for part in norm.split('/').filter(|s| !s.is_empty()) {
                cur.push('/');
                cur.push_str(part);
                if vfs.resolve(&cur).is_none() {
                    vfs.create(&cur, Node::dir(part));
                }
            }
        } else if vfs.resolve(path).is_some() {
            errors.push(format!("mkdir: cannot create directory '{}': File exists", path));
        } else if !vfs.create(path, Node::dir("")) {
            errors.push(format!(
                "mkdir: cannot create directory '{}': No such file or directory",
                path
            ));
        }
    }
    text(errors.join("\n"))
}

fn cmd_touch(args: &[String], vfs: &mut Vfs) -> ShellOutcome {
    for path in args.iter().filter(|a| !a.starts_with('-')) {
        if vfs.resolve(path).is_none() {
            vfs.create(path, Node::file("", ""));
        }
    }
    text("")
}

fn cmd_rm(args: &[String], vfs: &mut Vfs) -> ShellOutcome {
    let recursive = args
        .iter()
        .any(|a| a.starts_with('-') && (a.contains('r') || a.contains('R')));
    let force = args.iter().any(|a| a.starts_with('-') && a.contains('f'));
    let mut errors = Vec::new();
    for path in args.iter().filter(|a| !a.starts_with('-')) {
        match vfs.resolve(path) {
            Some(n) if n.is_dir && !recursive => {
                errors.push(format!("rm: cannot remove '{}': Is a directory", path));
            }
            Some(_) => {
                vfs.delete(path);
            }
            None if force => {}
            None => {
                errors.push(format!(
                    "rm: cannot remove '{}': No such file or directory",
                    path
                ));
            }
        }
    }
    text(errors.join("\n"))
}

fn cmd_cp_mv(args: &[String], vfs: &mut Vfs, is_move: bool) -> ShellOutcome {
    let name = if is_move { "mv" } else { "cp" };
    let paths: Vec<&String> = args.iter().filter(|a| !a.starts_with('-')).collect();
    let (Some(src), Some(dst)) = (paths.first(), paths.get(1)) else {
        return text(format!("{}: missing file operand", name));
    };
    let Some(node) = vfs.resolve(src).cloned() else {
        return text(format!(
            "{}: cannot stat '{}': No such file or directory",
            name, src
        ));
    };
    // Copying into a directory keeps the leaf name.
    let target = match vfs.resolve(dst) {
        Some(d) if d.is_dir => format!("{}/{}", vfs.normalize(dst), node.name),
        _ => vfs.normalize(dst),
    };
    vfs.delete(&target);
    if !vfs.create(&target, node) {
        return text(format!(
            "{}: cannot create '{}': No such file or directory",
            name, target
        ));
    }
    if is_move {
        vfs.delete(src);
    }
    text("")
}

fn count_flag(args: &[String]) -> usize {
    let mut n = 10;
    let mut i = 0;
    while i < args.len() {
        if args[i] == "-n" {
            if let Some(v) = args.get(i + 1).and_then(|v| v.parse().ok()) {
                n = v;
            }
            i += 1;
        } else if let Some(v) = args[i].strip_prefix("-n") {
            if let Ok(v) = v.parse() {
                n = v;
            }
        } else if args[i].starts_with('-') {
            if let Ok(v) = args[i][1..].parse() {
                n = v;
            }
        }
        i += 1;
    }
    n
}

fn cmd_head_tail(args: &[String], vfs: &Vfs, head: bool) -> ShellOutcome {
    let n = count_flag(args);
    let Some(path) = args
        .iter()
        .skip_while(|a| a.starts_with('-') || a.parse::<usize>().is_ok())
        .find(|a| !a.starts_with('-'))
    else {
        return text("");
    };
    let Some(data) = vfs.read_file(path) else {
        return text(format!(
            "{}: cannot open '{}' for reading: No such file or directory",
            if head { "head" } else { "tail" },
            path
        ));
    };
    let lines: Vec<&str> = data.lines().collect();
    let slice: Vec<&str> = if head {
        lines.iter().take(n).copied().collect()
    } else {
        lines.iter().rev().take(n).rev().copied().collect()
    };
    text(slice.join("\n"))
}

/// Substring grep with ANSI match highlighting, the same filter the
/// dispatcher applies to pipe stages.
pub fn grep_lines(input: &str, pattern: &str, invert: bool) -> String {
    input
        .lines()
        .filter(|l| l.contains(pattern) != invert)
        .map(|l| {
            if invert {
                l.to_string()
            } else {
                l.replace(pattern, &format!("\x1b[01;31m{}\x1b[0m", pattern))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn cmd_grep(args: &[String], vfs: &Vfs) -> ShellOutcome {
    let invert = args.iter().any(|a| a == "-v");
    let positional: Vec<&String> = args.iter().filter(|a| !a.starts_with('-')).collect();
    let (Some(pattern), Some(path)) = (positional.first(), positional.get(1)) else {
        return text("Usage: grep [OPTION]... PATTERNS [FILE]...");
    };
    let Some(data) = vfs.read_file(path) else {
        return text(format!("grep: {}: No such file or directory", path));
    };
    text(grep_lines(data, pattern, invert))
}

fn cmd_wc(args: &[String], vfs: &Vfs) -> ShellOutcome {
    let Some(path) = args.iter().find(|a| !a.starts_with('-')) else {
        return text("");
    };
    let Some(data) = vfs.read_file(path) else {
        return text(format!("wc: {}: No such file or directory", path));
    };
    let lines = data.lines().count();
    let words = data.split_whitespace().count();
    let bytes = data.len();
    if args.iter().any(|a| a == "-l") {
        return text(format!("{} {}", lines, path));
    }
    text(format!("{:>4} {:>4} {:>5} {}", lines, words, bytes, path))
}

fn cmd_which(args: &[String]) -> ShellOutcome {
    let Some(name) = args.first() else {
        return text("");
    };
    match name.as_str() {
        "kubectl" | "etcdctl" | "helm" | "k" => text(format!("/usr/local/bin/{}", name)),
        "ls" | "cat" | "grep" | "mkdir" | "rm" | "cp" | "mv" | "touch" | "echo" | "head"
        | "tail" | "wc" | "which" | "tree" | "bash" | "vim" | "vi" | "nano" => {
            text(format!("/usr/bin/{}", name))
        }
        other => text(format!(
            "which: no {} in (/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin)",
            other
        )),
    }
}

fn cmd_tree(args: &[String], vfs: &Vfs) -> ShellOutcome {
    let path = args
        .iter()
        .find(|a| !a.starts_with('-'))
        .map(|s| s.as_str())
        .unwrap_or(".");
    let Some(node) = vfs.resolve(path) else {
        return text(format!("{} [error opening dir]", path));
    };
    let mut out = vec![if path == "." {
        ".".to_string()
    } else {
        vfs.normalize(path)
    }];
    let mut dirs = 0usize;
    let mut files = 0usize;
    fn walk(node: &Node, prefix: &str, out: &mut Vec<String>, dirs: &mut usize, files: &mut usize) {
        let mut names: Vec<&String> = node.children.keys().collect();
        names.sort();
        let last = names.len().saturating_sub(1);
        for (i, name) in names.iter().enumerate() {
            let child = &node.children[*name];
            let (tee, pad) = if i == last {
                ("└── ", "    ")
            } else {
                ("├── ", "│   ")
            };
            out.push(format!("{}{}{}", prefix, tee, child.name));
            if child.is_dir {
                *dirs += 1;
                walk(child, &format!("{}{}", prefix, pad), out, dirs, files);
            } else {
                *files += 1;
            }
        }
    }
    walk(node, "", &mut out, &mut dirs, &mut files);
    out.push(String::new());
    out.push(format!("{} directories, {} files", dirs, files));
    text(out.join("\n"))
}

fn cmd_export(args: &[String], vfs: &mut Vfs) -> ShellOutcome {
    for a in args {
        if let Some((k, v)) = a.split_once('=') {
            vfs.env.insert(k.to_string(), v.trim_matches('"').to_string());
        }
    }
    text("")
}

fn cmd_env(vfs: &Vfs) -> ShellOutcome {
    let mut pairs: Vec<(&String, &String)> = vfs.env.iter().collect();
    pairs.sort();
    text(
        pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

fn cmd_unset(args: &[String], vfs: &mut Vfs) -> ShellOutcome {
    for a in args {
        vfs.env.remove(a);
    }
    text("")
}

fn cmd_systemctl(args: &[String], services: &mut BTreeMap<String, bool>) -> ShellOutcome {
    let sub = args.first().map(|s| s.as_str()).unwrap_or("");
    let unit = args
        .get(1)
        .map(|s| s.trim_end_matches(".service").to_string())
        .unwrap_or_default();
    match sub {
        "status" => {
            let Some(active) = services.get(&unit) else {
                return text(format!("Unit {}.service could not be found.", unit));
            };
            if *active {
                text(format!(
                    "● {unit}.service - {unit}\n     Loaded: loaded (/lib/systemd/system/{unit}.service; enabled; vendor preset: enabled)\n     Active: active (running) since Sat 2024-06-01 10:00:00 UTC\n   Main PID: 1234 ({unit})",
                ))
            } else {
                text(format!(
                    "○ {unit}.service - {unit}\n     Loaded: loaded (/lib/systemd/system/{unit}.service; enabled; vendor preset: enabled)\n     Active: inactive (dead)",
                ))
            }
        }
        "start" | "restart" => {
            if services.contains_key(&unit) {
                services.insert(unit, true);
                text("")
            } else {
                text(format!("Failed to start {}.service: Unit {}.service not found.", unit, unit))
            }
        }
        "stop" => {
            if services.contains_key(&unit) {
                services.insert(unit, false);
                text("")
            } else {
                text(format!("Failed to stop {}.service: Unit {}.service not found.", unit, unit))
            }
        }
        "enable" | "disable" => text(""),
        "daemon-reload" => text(""),
        _ => text(format!("Unknown command verb {}.", sub)),
    }
}

fn cmd_journalctl(args: &[String], services: &BTreeMap<String, bool>) -> ShellOutcome {
    let unit = args
        .iter()
        .position(|a| a == "-u")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.trim_end_matches(".service").to_string())
        .unwrap_or_default();
    if unit.is_empty() {
        return text("Jun 01 10:00:00 controlplane systemd[1]: Startup finished.");
    }
    match services.get(&unit) {
        Some(true) => text(format!(
            "Jun 01 10:00:00 controlplane systemd[1]: Started {unit}.service.\nJun 01 10:00:01 controlplane {unit}[1234]: started successfully",
        )),
        Some(false) => text(format!(
            "Jun 01 10:00:00 controlplane systemd[1]: Stopped {unit}.service.",
        )),
        None => text("-- No entries --"),
    }
}

fn cmd_dpkg(args: &[String]) -> ShellOutcome {
    if args.first().map(|s| s.as_str()) == Some("-l") {
        return text("||/ Name               Version          Architecture Description\n+++-==================-================-============-=============================\nii  containerd         1.7.12-1         amd64        open and reliable container runtime\nii  kubeadm            1.29.3-1.1       amd64        Command-line utility for administering a Kubernetes cluster\nii  kubectl            1.29.3-1.1       amd64        Command-line utility for interacting with a Kubernetes cluster\nii  kubelet            1.29.3-1.1       amd64        Node agent for Kubernetes clusters");
    }
    text("dpkg: error: need an action option")
}

fn cmd_sysctl(args: &[String]) -> ShellOutcome {
    match args.first().map(|s| s.as_str()) {
        Some("net.ipv4.ip_forward") => text("net.ipv4.ip_forward = 1"),
        Some("net.bridge.bridge-nf-call-iptables") => {
            text("net.bridge.bridge-nf-call-iptables = 1")
        }
        Some(key) if key.contains('=') => text(key.replace('=', " = ")),
        Some(key) => text(format!("sysctl: cannot stat /proc/sys/{}: No such file or directory", key.replace('.', "/"))),
        None => text("sysctl: no variables specified"),
    }
}

fn cmd_wget(args: &[String], vfs: &mut Vfs) -> ShellOutcome {
    let Some(url) = args.iter().find(|a| !a.starts_with('-')) else {
        return text("wget: missing URL");
    };
    let leaf = url.rsplit('/').next().unwrap_or("index.html");
    let leaf = if leaf.is_empty() { "index.html" } else { leaf };
    vfs.write_file(leaf, &format!("<!-- downloaded from {} -->\n", url), false);
    text(format!(
        "--2024-06-01 10:00:00--  {url}\nResolving host... connected.\nHTTP request sent, awaiting response... 200 OK\nSaving to: '{leaf}'\n\n'{leaf}' saved",
    ))
}

fn cmd_curl(args: &[String]) -> ShellOutcome {
    let Some(url) = args.iter().find(|a| !a.starts_with('-')) else {
        return text("curl: try 'curl --help' for more information");
    };
    if url.contains("10.96.") || url.contains("localhost") || url.contains("127.0.0.1") {
        return text("<!DOCTYPE html>\n<html>\n<head><title>Welcome to nginx!</title></head>\n<body>\n<h1>Welcome to nginx!</h1>\n</body>\n</html>");
    }
    if url.contains("6443") {
        return text("{\n  \"kind\": \"Status\",\n  \"apiVersion\": \"v1\",\n  \"status\": \"Failure\",\n  \"message\": \"forbidden: User \\\"system:anonymous\\\" cannot get path \\\"/\\\"\",\n  \"reason\": \"Forbidden\",\n  \"code\": 403\n}")
    }
    text(format!("curl: (6) Could not resolve host: {}", url.trim_start_matches("http://").trim_start_matches("https://").split('/').next().unwrap_or("")))
}

fn cmd_ip(args: &[String]) -> ShellOutcome {
    match args.first().map(|s| s.as_str()) {
        Some("a") | Some("addr") => text("1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536\n    inet 127.0.0.1/8 scope host lo\n2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500\n    inet 10.0.0.10/24 brd 10.0.0.255 scope global eth0\n3: cni0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1450\n    inet 10.244.0.1/24 brd 10.244.0.255 scope global cni0"),
        Some("route") | Some("r") => text("default via 10.0.0.1 dev eth0\n10.0.0.0/24 dev eth0 proto kernel scope link src 10.0.0.10\n10.244.0.0/16 dev cni0 proto kernel scope link src 10.244.0.1"),
        _ => text("Usage: ip [ OPTIONS ] OBJECT { COMMAND | help }"),
    }
}

fn cmd_editor(args: &[String], vfs: &Vfs) -> ShellOutcome {
    let Some(path) = args.iter().find(|a| !a.starts_with('-')) else {
        return text("");
    };
    let content = vfs.read_file(path).unwrap_or("").to_string();
    ShellOutcome::OpenEditor {
        path: vfs.normalize(path),
        content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(|x| x.to_string()).collect()
    }

    fn sh(line: &str, vfs: &mut Vfs, services: &mut BTreeMap<String, bool>) -> String {
        let tokens = toks(line);
        match run(&tokens[0], &tokens[1..], vfs, services) {
            ShellOutcome::Text(t) => t,
            ShellOutcome::NotShell => panic!("not a shell command: {}", line),
            ShellOutcome::OpenEditor { .. } => panic!("editor opened"),
        }
    }

    fn base_services() -> BTreeMap<String, bool> {
        let mut m = BTreeMap::new();
        m.insert("kubelet".to_string(), true);
        m.insert("containerd".to_string(), true);
        m
    }

    #[test]
    fn test_pwd_cd_ls() {
        let mut vfs = Vfs::new();
        let mut svc = base_services();
        assert_eq!(sh("pwd", &mut vfs, &mut svc), "/home/user");
        sh("cd /etc/kubernetes", &mut vfs, &mut svc);
        assert_eq!(sh("pwd", &mut vfs, &mut svc), "/etc/kubernetes");
        let ls = sh("ls", &mut vfs, &mut svc);
        assert!(ls.contains("admin.conf"));
        assert!(ls.contains("manifests"));
    }

    #[test]
    fn test_ls_hidden_and_long() {
        let mut vfs = Vfs::new();
        let mut svc = base_services();
        let plain = sh("ls ~", &mut vfs, &mut svc);
        assert!(!plain.contains(".bashrc"));
        let all = sh("ls -a ~", &mut vfs, &mut svc);
        assert!(all.contains(".bashrc"));
        let long = sh("ls -l ~", &mut vfs, &mut svc);
        assert!(long.contains("-rw-r--r--"));
    }

    #[test]
    fn test_mkdir_touch_rm() {
        let mut vfs = Vfs::new();
        let mut svc = base_services();
        sh("mkdir /opt/backups", &mut vfs, &mut svc);
        assert!(vfs.resolve("/opt/backups").is_some());
        sh("touch /opt/backups/x.txt", &mut vfs, &mut svc);
        assert!(vfs.read_file("/opt/backups/x.txt").is_some());
        let err = sh("rm /opt/backups", &mut vfs, &mut svc);
        assert!(err.contains("Is a directory"));
        sh("rm -rf /opt/backups", &mut vfs, &mut svc);
        assert!(vfs.resolve("/opt/backups").is_none());
    }

    #[test]
    fn test_mkdir_p_creates_parents() {
        let mut vfs = Vfs::new();
        let mut svc = base_services();
        sh("mkdir -p /opt/a/b/c", &mut vfs, &mut svc);
        assert!(vfs.resolve("/opt/a/b/c").map(|n| n.is_dir).unwrap_or(false));
    }

    #[test]
    fn test_cp_and_mv() {
        let mut vfs = Vfs::new();
        let mut svc = base_services();
        sh("cp /etc/hostname /tmp/h", &mut vfs, &mut svc);
        assert_eq!(vfs.read_file("/tmp/h"), Some("controlplane\n"));
        sh("mv /tmp/h /tmp/h2", &mut vfs, &mut svc);
        assert!(vfs.read_file("/tmp/h").is_none());
        assert_eq!(vfs.read_file("/tmp/h2"), Some("controlplane\n"));
    }

    #[test]
    fn test_grep_highlights() {
        let mut vfs = Vfs::new();
        let mut svc = base_services();
        let out = sh("grep etcd /home/user/notes.txt", &mut vfs, &mut svc);
        assert!(out.contains("\x1b[01;31metcd\x1b[0m"));
        let none = sh("grep zzz /home/user/notes.txt", &mut vfs, &mut svc);
        assert_eq!(none, "");
    }

    #[test]
    fn test_head_tail_n() {
        let mut vfs = Vfs::new();
        let mut svc = base_services();
        vfs.write_file("/tmp/nums", "1\n2\n3\n4\n5\n", false);
        assert_eq!(sh("head -n 2 /tmp/nums", &mut vfs, &mut svc), "1\n2");
        assert_eq!(sh("tail -n 2 /tmp/nums", &mut vfs, &mut svc), "4\n5");
        assert_eq!(sh("tail -2 /tmp/nums", &mut vfs, &mut svc), "4\n5");
    }

    #[test]
    fn test_export_env_unset() {
        let mut vfs = Vfs::new();
        let mut svc = base_services();
        sh("export FOO=bar", &mut vfs, &mut svc);
        assert!(sh("env", &mut vfs, &mut svc).contains("FOO=bar"));
        sh("unset FOO", &mut vfs, &mut svc);
        assert!(!sh("env", &mut vfs, &mut svc).contains("FOO=bar"));
    }

    #[test]
    fn test_systemctl_stop_start() {
        let mut vfs = Vfs::new();
        let mut svc = base_services();
        assert!(sh("systemctl status kubelet", &mut vfs, &mut svc).contains("active (running)"));
        sh("systemctl stop kubelet", &mut vfs, &mut svc);
        assert!(sh("systemctl status kubelet", &mut vfs, &mut svc).contains("inactive (dead)"));
        sh("systemctl start kubelet", &mut vfs, &mut svc);
        assert!(sh("systemctl status kubelet", &mut vfs, &mut svc).contains("active (running)"));
    }

    #[test]
    fn test_tree_counts() {
        let mut vfs = Vfs::new();
        let mut svc = base_services();
        let out = sh("tree /home/user/manifests", &mut vfs, &mut svc);
        assert!(out.contains("nginx-pod.yaml"));
        assert!(out.ends_with("0 directories, 2 files"));
    }

    #[test]
    fn test_editor_returns_payload() {
        let mut vfs = Vfs::new();
        let mut svc = base_services();
        let tokens = toks("vim /home/user/manifests/nginx-pod.yaml");
        match run(&tokens[0], &tokens[1..], &mut vfs, &mut svc) {
            ShellOutcome::OpenEditor { path, content } => {
                assert_eq!(path, "/home/user/manifests/nginx-pod.yaml");
                assert!(content.contains("kind: Pod"));
            }
            _ => panic!("expected editor"),
        }
    }

    #[test]
    fn test_unknown_is_not_shell() {
        let mut vfs = Vfs::new();
        let mut svc = base_services();
        assert!(matches!(
            run("kubectl", &[], &mut vfs, &mut svc),
            ShellOutcome::NotShell
        ));
    }
}
