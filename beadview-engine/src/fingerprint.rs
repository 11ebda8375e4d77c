//! Data fingerprint over the issue snapshot.
//!
//! The fingerprint is the cache key and the `data_hash` stamped on every
//! result: a SHA-256 over the sorted per-issue tuples of the fields that can
//! change an analysis. Issue order in the input does not affect it; any
//! change to status, priority, update time or the dependency set does.

use sha2::{Digest, Sha256};

use crate::model::Issue;

/// Hex length of the rendered fingerprint.
const FINGERPRINT_LEN: usize = 16;

/// Compute the data fingerprint for an issue snapshot.
pub fn data_fingerprint(issues: &[Issue]) -> String {
    let mut lines: Vec<String> = issues
        .iter()
        .map(|issue| {
            let mut deps: Vec<String> = issue
                .dependencies
                .iter()
                .map(|d| format!("{}:{}", d.depends_on_id, d.kind.as_str()))
                .collect();
            deps.sort_unstable();
            format!(
                "{}|{}|{}|{}|{}",
                issue.id,
                issue.updated_at.to_rfc3339(),
                issue.priority.0,
                issue.status.as_str(),
                deps.join(",")
            )
        })
        .collect();
    lines.sort_unstable();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hasher.finalize();

    let mut out = String::with_capacity(FINGERPRINT_LEN);
    for byte in digest.iter().take(FINGERPRINT_LEN / 2) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dependency, Status};
    use chrono::{TimeZone, Utc};

    fn issue(id: &str) -> Issue {
        let mut i = Issue::new(id, Status::Open);
        i.created_at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        i.updated_at = i.created_at;
        i
    }

    #[test]
    fn stable_across_runs() {
        let issues = vec![issue("a"), issue("b")];
        assert_eq!(data_fingerprint(&issues), data_fingerprint(&issues));
    }

    #[test]
    fn order_independent() {
        let ab = vec![issue("a"), issue("b")];
        let ba = vec![issue("b"), issue("a")];
        assert_eq!(data_fingerprint(&ab), data_fingerprint(&ba));
    }

    #[test]
    fn status_change_invalidates() {
        let before = vec![issue("a")];
        let mut changed = issue("a");
        changed.status = Status::Closed;
        assert_ne!(data_fingerprint(&before), data_fingerprint(&[changed]));
    }

    #[test]
    fn dependency_change_invalidates() {
        let before = vec![issue("a"), issue("b")];
        let mut with_dep = issue("a");
        with_dep.dependencies.push(Dependency::blocks("b"));
        assert_ne!(data_fingerprint(&before), data_fingerprint(&[with_dep, issue("b")]));
    }

    #[test]
    fn title_change_does_not_invalidate() {
        let mut a1 = issue("a");
        a1.title = "one".into();
        let mut a2 = issue("a");
        a2.title = "two".into();
        assert_eq!(data_fingerprint(&[a1]), data_fingerprint(&[a2]));
    }

    #[test]
    fn fixed_width_hex() {
        let fp = data_fingerprint(&[]);
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
