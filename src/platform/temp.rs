//! Shared temporary name helpers for platform modules.
//! Provides unique sibling filenames for staged store writes.
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

/// Generate a unique hidden sibling temp name next to `target`.
/// Pattern: .<file name>.tmp.<pid>.<nanos>.<seq>
pub fn tmp_sibling_name(target: &Path) -> PathBuf {
    let pid = std::process::id();
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0);
    let seq = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let base = target
        .file_name()
        .map(|n| n.to_string_lossy().trim_start_matches('.').to_string())
        .unwrap_or_else(|| "git_store_meta".into());
    let name = format!(".{base}.tmp.{pid}.{nanos}.{seq}");
    target.parent().unwrap_or_else(|| Path::new(".")).join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn uniqueness_concurrent() {
        let target = Path::new("repo/.git_store_meta");
        let mut handles = Vec::new();
        for _ in 0..32 {
            let t = target.to_path_buf();
            handles.push(thread::spawn(move || tmp_sibling_name(&t)));
        }
        let mut set = HashSet::new();
        for h in handles { let p = h.join().unwrap(); assert!(set.insert(p)); }
        assert_eq!(set.len(), 32);
    }

    #[test]
    fn stays_beside_target() {
        let tmp = tmp_sibling_name(Path::new("repo/.git_store_meta"));
        assert_eq!(tmp.parent(), Some(Path::new("repo")));
        let name = tmp.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".git_store_meta.tmp."), "{name}");
    }
}
