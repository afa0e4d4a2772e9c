//! Hosts-file manager: owns exactly the lines ending in
//! `# Stagecraft managed` inside `/etc/hosts`, leaving every other line
//! byte-for-byte untouched.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;

use crate::devtopology::atomic::write_atomic;
use crate::error::{HostsError, StagecraftError};

const MARKER: &str = "# Stagecraft managed";
const LOCK_BACKOFF: [Duration; 3] = [
    Duration::from_millis(100),
    Duration::from_millis(200),
    Duration::from_millis(400),
];

/// The platform-default hosts file location.
pub fn default_hosts_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Windows\System32\drivers\etc\hosts")
    } else {
        PathBuf::from("/etc/hosts")
    }
}

/// `true` for any line Stagecraft owns — identity is the trailing marker
/// comment, nothing else.
fn is_managed(line: &str) -> bool {
    line.trim_end().ends_with(MARKER)
}

/// Extracts the domain list from a single managed line, ignoring the
/// leading IP and the trailing marker.
fn managed_domains(line: &str) -> Vec<String> {
    let without_marker = line.trim_end().trim_end_matches(MARKER).trim_end();
    without_marker
        .split_whitespace()
        .skip(1) // leading IP
        .map(|s| s.to_string())
        .collect()
}

fn render_managed_line(domains: &[String]) -> String {
    format!("127.0.0.1    {}    {}", domains.join(" "), MARKER)
}

/// Current managed domain set across (normally at most one) managed lines
/// in `content`, sorted and deduplicated.
fn current_managed_domains(content: &str) -> Vec<String> {
    let mut domains: Vec<String> = content
        .lines()
        .filter(|l| is_managed(l))
        .flat_map(managed_domains)
        .collect();
    domains.sort();
    domains.dedup();
    domains
}

fn foreign_lines(content: &str) -> Vec<&str> {
    content.lines().filter(|l| !is_managed(l)).collect()
}

fn rebuild(content: &str, new_managed: &[String]) -> String {
    let mut lines: Vec<String> = foreign_lines(content).into_iter().map(String::from).collect();
    if !new_managed.is_empty() {
        let mut sorted = new_managed.to_vec();
        sorted.sort();
        sorted.dedup();
        lines.push(render_managed_line(&sorted));
    }
    let mut out = lines.join("\n");
    // Reproduce the input's own trailing-newline state (empty content is
    // treated as "wants a trailing newline") instead of always adding one,
    // so add-then-remove round-trips to the exact original bytes.
    if !out.is_empty() && (content.is_empty() || content.ends_with('\n')) {
        out.push('\n');
    }
    out
}

/// Merges `domains` into the existing managed set and returns the new file
/// contents. Pure — the caller is responsible for reading/writing.
pub fn add_entries(content: &str, domains: &[String]) -> String {
    let mut merged = current_managed_domains(content);
    merged.extend(domains.iter().cloned());
    rebuild(content, &merged)
}

/// Removes `domains` from the managed set, dropping the managed line
/// entirely once it's empty (add-then-remove round-trips to the
/// original byte content).
pub fn remove_entries(content: &str, domains: &[String]) -> String {
    let mut remaining = current_managed_domains(content);
    remaining.retain(|d| !domains.contains(d));
    rebuild(content, &remaining)
}

/// Drops every managed line, regardless of its contents.
pub fn cleanup(content: &str) -> String {
    rebuild(content, &[])
}

/// Guards one hosts-file mutation with an advisory `fs2` exclusive lock and
/// an atomic rewrite. `mutate` receives the file's current contents (empty
/// string if the file doesn't exist yet) and returns the new contents.
pub fn with_locked_hosts_file(
    path: &Path,
    mutate: impl FnOnce(&str) -> String,
) -> Result<(), StagecraftError> {
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(path)
        .map_err(|e| lock_or_permission_err(path, e))?;

    let mut attempt = 0;
    loop {
        match lock_file.try_lock_exclusive() {
            Ok(()) => break,
            Err(_) if attempt < LOCK_BACKOFF.len() => {
                std::thread::sleep(LOCK_BACKOFF[attempt]);
                attempt += 1;
            }
            Err(_) => {
                return Err(StagecraftError::Hosts(HostsError::Locked {
                    path: path.display().to_string(),
                    attempts: LOCK_BACKOFF.len() as u32,
                }))
            }
        }
    }

    let content = {
        let mut f = std::fs::File::open(path).map_err(|e| io_err(path, e))?;
        let mut buf = String::new();
        f.read_to_string(&mut buf).map_err(|e| io_err(path, e))?;
        buf
    };

    let new_content = mutate(&content);
    let result = write_atomic(path, new_content.as_bytes());
    lock_file.unlock().ok();
    result
}

fn io_err(path: &Path, source: std::io::Error) -> StagecraftError {
    StagecraftError::Hosts(HostsError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn lock_or_permission_err(path: &Path, source: std::io::Error) -> StagecraftError {
    if source.kind() == std::io::ErrorKind::PermissionDenied {
        StagecraftError::Hosts(HostsError::Permission {
            path: path.display().to_string(),
        })
    } else {
        io_err(path, source)
    }
}
