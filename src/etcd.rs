//! The etcdctl interpreter. Snapshot save/restore round-trips the whole
//! cluster state through gzip+base64 into the virtual filesystem, which is
//! what makes the break-and-recover exercises work.

use crate::kubectl::{parse, Parsed};
use crate::state::ClusterState;
use crate::vfs::Vfs;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

const DEFAULT_ENDPOINT: &str = "https://127.0.0.1:2379";

pub fn run(tokens: &[String], state: &ClusterState, vfs: &mut Vfs) -> (String, ClusterState) {
    if tokens.is_empty() {
        return (usage(), state.clone());
    }
    let parsed = parse(tokens);
    let result = match parsed.args.first().map(|s| s.as_str()) {
        Some("member") => cmd_member(&parsed, state),
        Some("snapshot") => return cmd_snapshot(&parsed, state, vfs),
        Some("endpoint") => cmd_endpoint(&parsed, state),
        Some("alarm") => cmd_alarm(&parsed, state),
        Some("defrag") => cmd_defrag(&parsed, state),
        Some("version") => Ok((
            "etcdctl version: 3.5.12\nAPI version: 3.5".to_string(),
            None,
        )),
        Some(other) => Err(format!(
            "Error: unknown command \"{}\" for \"etcdctl\"",
            other
        )),
        None => Ok((usage(), None)),
    };
    match result {
        Ok((out, Some(next))) => (out, next),
        Ok((out, None)) => (out, state.clone()),
        Err(e) => (e, state.clone()),
    }
}

fn usage() -> String {
    "NAME:\n\tetcdctl - A simple command line client for etcd3.\n\nUSAGE:\n\tetcdctl [flags]\n\nCOMMANDS:\n\talarm disarm\t\tDisarms all alarms\n\talarm list\t\tLists all alarms\n\tdefrag\t\t\tDefragments the storage of the etcd members\n\tendpoint health\t\tChecks the healthiness of endpoints\n\tendpoint status\t\tPrints out the status of endpoints\n\tmember list\t\tLists all members in the cluster\n\tsnapshot restore\tRestores an etcd member snapshot to an etcd directory\n\tsnapshot save\t\tStores an etcd node backend snapshot to a given file\n\tsnapshot status\t\tGets backend snapshot status of a given file".into()
}

fn endpoint(parsed: &Parsed) -> String {
    parsed
        .flags
        .get("--endpoints")
        .and_then(|v| v.first())
        .cloned()
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
}

/// Commands that dial the live endpoint need the full TLS triple when the
/// endpoint is https, and a reachable server.
fn check_connection(parsed: &Parsed, state: &ClusterState) -> Result<(), String> {
    let ep = endpoint(parsed);
    if ep.starts_with("https://") {
        for flag in ["--cacert", "--cert", "--key"] {
            if !parsed.flags.contains_key(flag) {
                return Err(format!(
                    "{{\"level\":\"warn\",\"msg\":\"retrying of unary invoker failed\",\"target\":\"etcd-endpoints://{}\",\"error\":\"rpc error: code = DeadlineExceeded desc = latest balancer error: connection error: desc = \\\"transport: authentication handshake failed: tls: failed to verify certificate\\\"\"}}\nError: context deadline exceeded",
                    ep
                ));
            }
        }
    }
    if state.etcd.corrupted {
        return Err(format!(
            "{{\"level\":\"warn\",\"msg\":\"retrying of unary invoker failed\",\"target\":\"etcd-endpoints://{}\",\"error\":\"rpc error: code = DeadlineExceeded desc = context deadline exceeded\"}}\nError: context deadline exceeded",
            ep
        ));
    }
    Ok(())
}

type Handler = Result<(String, Option<ClusterState>), String>;

fn cmd_member(parsed: &Parsed, state: &ClusterState) -> Handler {
    if parsed.args.get(1).map(|s| s.as_str()) != Some("list") {
        return Err("Error: unknown member subcommand; supported: list".into());
    }
    check_connection(parsed, state)?;
    let lines: Vec<String> = state
        .etcd
        .members
        .iter()
        .map(|m| {
            format!(
                "{}, started, {}, {}, {}, {}",
                m.id, m.name, m.peer_url, m.client_url, m.is_leader
            )
        })
        .collect();
    Ok((lines.join("\n"), None))
}

fn cmd_snapshot(parsed: &Parsed, state: &ClusterState, vfs: &mut Vfs) -> (String, ClusterState) {
    let result: Handler = match parsed.args.get(1).map(|s| s.as_str()) {
        Some("save") => snapshot_save(parsed, state, vfs),
        Some("status") => snapshot_status(parsed, state, vfs),
        Some("restore") => snapshot_restore(parsed, state, vfs),
        _ => Err("Error: unknown snapshot subcommand; supported: save, status, restore".into()),
    };
    match result {
        Ok((out, Some(next))) => (out, next),
        Ok((out, None)) => (out, state.clone()),
        Err(e) => (e, state.clone()),
    }
}

/// FNV-1a over the encoded blob, rendered the way etcdctl prints hashes.
fn blob_hash(blob: &str) -> String {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in blob.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x1000_0000_01b3);
    }
    format!("{:x}", (h as u32))
}

fn total_keys(state: &ClusterState) -> u32 {
    (state.pods.len()
        + state.deployments.len()
        + state.services.len()
        + state.config_maps.len()
        + state.secrets.len()
        + state.namespaces.len()
        + state.nodes.len()) as u32
        * 3
}

fn encode_state(state: &ClusterState) -> Result<String, String> {
    let json = serde_json::to_vec(state).map_err(|e| format!("Error: {}", e))?;
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&json)
        .and_then(|_| enc.finish())
        .map(|bytes| crate::b64_encode_bytes(&bytes))
        .map_err(|e| format!("Error: {}", e))
}

fn decode_state(blob: &str) -> Option<ClusterState> {
    let bytes = crate::b64_decode(blob.trim())?;
    let mut dec = GzDecoder::new(bytes.as_slice());
    let mut json = Vec::new();
    dec.read_to_end(&mut json).ok()?;
    serde_json::from_slice(&json).ok()
}

fn snapshot_save(parsed: &Parsed, state: &ClusterState, vfs: &mut Vfs) -> Handler {
    let Some(path) = parsed.args.get(2) else {
        return Err("Error: snapshot save expects one argument".into());
    };
    check_connection(parsed, state)?;
    let blob = encode_state(state)?;
    if !vfs.write_file(path, &blob, false) {
        return Err(format!(
            "Error: could not open {}: no such file or directory",
            path
        ));
    }
    let mut next = state.clone();
    let hash = blob_hash(&blob);
    let size = blob.len();
    let keys = total_keys(state);
    let created_at = next.clock;
    next.etcd.backups.push(crate::state::EtcdBackup {
        path: vfs.normalize(path),
        size,
        created_at,
        total_keys: keys,
        hash,
    });
    Ok((
        format!(
            "{{\"level\":\"info\",\"ts\":\"{}\",\"caller\":\"snapshot/v3_snapshot.go:65\",\"msg\":\"created temporary db file\",\"path\":\"{}.part\"}}\n{{\"level\":\"info\",\"ts\":\"{}\",\"caller\":\"snapshot/v3_snapshot.go:73\",\"msg\":\"fetching snapshot\",\"endpoint\":\"{}\"}}\nSnapshot saved at {}",
            crate::state::timestamp(created_at),
            path,
            crate::state::timestamp(created_at),
            endpoint(parsed),
            path
        ),
        Some(next),
    ))
}

fn snapshot_status(parsed: &Parsed, state: &ClusterState, vfs: &Vfs) -> Handler {
    let Some(path) = parsed.args.get(2) else {
        return Err("Error: snapshot status expects one argument".into());
    };
    let Some(blob) = vfs.read_file(path) else {
        return Err(format!("Error: stat {}: no such file or directory", path));
    };
    let Some(snap) = decode_state(blob) else {
        return Err(format!("Error: {} is not a valid snapshot file", path));
    };
    let hash = blob_hash(blob);
    let keys = total_keys(&snap);
    let size = blob.len();
    let headers = ["HASH", "REVISION", "TOTAL KEYS", "TOTAL SIZE"];
    let rows = vec![vec![
        hash,
        (snap.clock + 1).to_string(),
        keys.to_string(),
        format!("{} kB", (size / 1000).max(1)),
    ]];
    Ok((crate::render::table(&headers, &rows), None))
}

fn snapshot_restore(parsed: &Parsed, state: &ClusterState, vfs: &Vfs) -> Handler {
    let Some(path) = parsed.args.get(2) else {
        return Err("Error: snapshot restore requires exactly one argument".into());
    };
    let Some(blob) = vfs.read_file(path) else {
        return Err(format!("Error: stat {}: no such file or directory", path));
    };
    let Some(mut restored) = decode_state(blob) else {
        return Err(format!(
            "Error: snapshot file {} is corrupt or not a snapshot",
            path
        ));
    };
    // Restore brings the keyspace back and heals the member.
    restored.etcd.corrupted = false;
    for m in &mut restored.etcd.members {
        m.healthy = true;
    }
    // The session clock keeps moving even though the data is older.
    restored.clock = state.clock;
    let data_dir = parsed
        .flags
        .get("--data-dir")
        .and_then(|v| v.first())
        .map(|s| s.as_str())
        .unwrap_or("/var/lib/etcd");
    Ok((
        format!(
            "Deprecated: Use `etcdutl snapshot restore` instead.\n\n{{\"level\":\"info\",\"ts\":\"{}\",\"caller\":\"snapshot/v3_snapshot.go:248\",\"msg\":\"restoring snapshot\",\"path\":\"{}\",\"wal-dir\":\"{}/member/wal\",\"data-dir\":\"{}\"}}\n{{\"level\":\"info\",\"ts\":\"{}\",\"caller\":\"snapshot/v3_snapshot.go:269\",\"msg\":\"restored snapshot\",\"path\":\"{}\",\"wal-dir\":\"{}/member/wal\",\"data-dir\":\"{}\"}}",
            crate::state::timestamp(state.clock),
            path,
            data_dir,
            data_dir,
            crate::state::timestamp(state.clock),
            path,
            data_dir,
            data_dir
        ),
        Some(restored),
    ))
}

fn cmd_endpoint(parsed: &Parsed, state: &ClusterState) -> Handler {
    match parsed.args.get(1).map(|s| s.as_str()) {
        Some("health") => {
            let ep = endpoint(parsed);
            if let Err(e) = check_connection(parsed, state) {
                return Ok((
                    format!("{}\n{} is unhealthy: failed to commit proposal: context deadline exceeded\nError: unhealthy cluster", e, ep),
                    None,
                ));
            }
            Ok((
                format!("{} is healthy: successfully committed proposal: took = 9.876543ms", ep),
                None,
            ))
        }
        Some("status") => {
            check_connection(parsed, state)?;
            let headers = [
                "ENDPOINT",
                "ID",
                "VERSION",
                "DB SIZE",
                "IS LEADER",
                "IS LEARNER",
                "RAFT TERM",
                "RAFT INDEX",
            ];
            let rows: Vec<Vec<String>> = state
                .etcd
                .members
                .iter()
                .map(|m| {
                    vec![
                        endpoint(parsed),
                        m.id.clone(),
                        "3.5.12".to_string(),
                        "2.1 MB".to_string(),
                        m.is_leader.to_string(),
                        "false".to_string(),
                        "2".to_string(),
                        (state.clock + 100).to_string(),
                    ]
                })
                .collect();
            Ok((crate::render::table(&headers, &rows), None))
        }
        _ => Err("Error: unknown endpoint subcommand; supported: health, status".into()),
    }
}

fn cmd_alarm(parsed: &Parsed, state: &ClusterState) -> Handler {
    match parsed.args.get(1).map(|s| s.as_str()) {
        Some("list") => {
            check_connection(parsed, state)?;
            Ok((
                state
                    .etcd
                    .alarms
                    .iter()
                    .map(|a| format!("memberID:{} alarm:{}", state.etcd.members.first().map(|m| m.id.as_str()).unwrap_or(""), a))
                    .collect::<Vec<_>>()
                    .join("\n"),
                None,
            ))
        }
        Some("disarm") => {
            check_connection(parsed, state)?;
            let mut next = state.clone();
            let cleared = next.etcd.alarms.clone();
            next.etcd.alarms.clear();
            Ok((
                cleared
                    .iter()
                    .map(|a| format!("memberID:{} alarm:{}", next.etcd.members.first().map(|m| m.id.as_str()).unwrap_or(""), a))
                    .collect::<Vec<_>>()
                    .join("\n"),
                Some(next),
            ))
        }
        _ => Err("Error: unknown alarm subcommand; supported: list, disarm".into()),
    }
}

fn cmd_defrag(parsed: &Parsed, state: &ClusterState) -> Handler {
    check_connection(parsed, state)?;
    Ok((
        format!(
            "Finished defragmenting etcd member[{}]",
            endpoint(parsed)
        ),
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::initial_cluster_state;

    const TLS: &str =
        "--cacert=/etc/kubernetes/pki/etcd/ca.crt --cert=/etc/kubernetes/pki/etcd/server.crt --key=/etc/kubernetes/pki/etcd/server.key";

    fn toks(line: &str) -> Vec<String> {
        line.split_whitespace().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_member_list_requires_tls() {
        let s = initial_cluster_state();
        let mut vfs = Vfs::new();
        let (out, _) = run(&toks("member list"), &s, &mut vfs);
        assert!(out.ends_with("Error: context deadline exceeded"));
        let (out, _) = run(&toks(&format!("member list {}", TLS)), &s, &mut vfs);
        assert!(out.contains("8e9e05c52164694d, started, controlplane"));
    }

    #[test]
    fn test_snapshot_save_and_status() {
        let s = initial_cluster_state();
        let mut vfs = Vfs::new();
        let (out, next) = run(
            &toks(&format!("snapshot save /opt/backup.db {}", TLS)),
            &s,
            &mut vfs,
        );
        assert!(out.ends_with("Snapshot saved at /opt/backup.db"));
        assert_eq!(next.etcd.backups.len(), 1);
        assert!(vfs.read_file("/opt/backup.db").is_some());
        let (status, _) = run(&toks("snapshot status /opt/backup.db"), &next, &mut vfs);
        assert!(status.contains("HASH"));
        assert!(status.contains("TOTAL KEYS"));
    }

    #[test]
    fn test_restore_recovers_corrupted_cluster() {
        let s = initial_cluster_state();
        let mut vfs = Vfs::new();
        let (_, saved) = run(
            &toks(&format!("snapshot save /opt/backup.db {}", TLS)),
            &s,
            &mut vfs,
        );
        let mut broken = saved.clone();
        broken.etcd.corrupted = true;
        let (health, _) = run(&toks(&format!("endpoint health {}", TLS)), &broken, &mut vfs);
        assert!(health.contains("unhealthy"));
        let (out, restored) = run(&toks("snapshot restore /opt/backup.db"), &broken, &mut vfs);
        assert!(out.contains("restored snapshot"));
        assert!(!restored.etcd.corrupted);
        assert_eq!(restored.namespaces, saved.namespaces);
    }

    #[test]
    fn test_restore_missing_file() {
        let s = initial_cluster_state();
        let mut vfs = Vfs::new();
        let (out, next) = run(&toks("snapshot restore /opt/nope.db"), &s, &mut vfs);
        assert!(out.starts_with("Error: stat /opt/nope.db"));
        assert_eq!(next.pods.len(), s.pods.len());
    }

    #[test]
    fn test_endpoint_health_ok() {
        let s = initial_cluster_state();
        let mut vfs = Vfs::new();
        let (out, _) = run(&toks(&format!("endpoint health {}", TLS)), &s, &mut vfs);
        assert!(out.contains("is healthy"));
    }

    #[test]
    fn test_alarm_disarm_clears() {
        let mut s = initial_cluster_state();
        s.etcd.alarms.push("NOSPACE".into());
        let mut vfs = Vfs::new();
        let (out, next) = run(&toks(&format!("alarm disarm {}", TLS)), &s, &mut vfs);
        assert!(out.contains("alarm:NOSPACE"));
        assert!(next.etcd.alarms.is_empty());
    }
}
