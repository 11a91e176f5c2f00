pub mod complete;
pub mod dispatch;
pub mod etcd;
pub mod helm;
pub mod kubectl;
pub mod rbac;
pub mod render;
pub mod sched;
pub mod shell;
pub mod state;
pub mod system;
pub mod tokenizer;
pub mod vfs;
pub mod yamlish;

pub use dispatch::Simulator;
pub use system::System;

use base64::{engine::general_purpose::STANDARD, Engine as _};

pub fn b64_encode(s: &str) -> String {
    STANDARD.encode(s.as_bytes())
}

pub fn b64_encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn b64_decode(s: &str) -> Option<Vec<u8>> {
    STANDARD.decode(s.trim().as_bytes()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_b64_round_trip() {
        let encoded = b64_encode("admin-password");
        assert_eq!(encoded, "YWRtaW4tcGFzc3dvcmQ=");
        let decoded = b64_decode(&encoded).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "admin-password");
    }

    #[test]
    fn test_b64_decode_rejects_garbage() {
        assert!(b64_decode("not base64 at all!!!").is_none());
    }
}
