//! Remote path manipulation and glob matching
//!
//! Remote paths are plain strings joined with forward slashes so behavior
//! does not depend on the OS the service itself runs on.

/// Joins a base directory and an entry name with forward-slash semantics
#[must_use]
pub fn join_remote(base: &str, name: &str) -> String {
    if base.is_empty() {
        return name.to_string();
    }
    if name.is_empty() {
        return base.to_string();
    }
    let base = base.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if base.is_empty() {
        // Base was the root directory
        return format!("/{name}");
    }
    format!("{base}/{name}")
}

/// Returns the parent directory of a remote path
#[must_use]
pub fn parent_dir(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/",
        Some(idx) => &trimmed[..idx],
        None => "",
    }
}

/// Returns the final component of a remote path
#[must_use]
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Shell-style glob match over a file name
///
/// Supports `*` (any run of characters) and `?` (any single character);
/// every other character matches literally. The pattern must cover the
/// whole name.
#[must_use]
pub fn glob_match(pattern: &str, name: &str) -> bool {
    match_chars(
        &pattern.chars().collect::<Vec<_>>(),
        &name.chars().collect::<Vec<_>>(),
    )
}

fn match_chars(pattern: &[char], name: &[char]) -> bool {
    match pattern.first() {
        None => name.is_empty(),
        Some('*') => {
            // Try every possible span for the star
            for skip in 0..=name.len() {
                if match_chars(&pattern[1..], &name[skip..]) {
                    return true;
                }
            }
            false
        }
        Some('?') => !name.is_empty() && match_chars(&pattern[1..], &name[1..]),
        Some(&p) => name.first() == Some(&p) && match_chars(&pattern[1..], &name[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_remote() {
        assert_eq!(join_remote("/", "etc"), "/etc");
        assert_eq!(join_remote("/var/log", "syslog"), "/var/log/syslog");
        assert_eq!(join_remote("/var/log/", "syslog"), "/var/log/syslog");
        assert_eq!(join_remote("/var", "/nested"), "/var/nested");
        assert_eq!(join_remote("", "file.txt"), "file.txt");
        assert_eq!(join_remote("/base", ""), "/base");
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("/var/log/syslog"), "/var/log");
        assert_eq!(parent_dir("/etc"), "/");
        assert_eq!(parent_dir("/etc/"), "/");
        assert_eq!(parent_dir("relative.txt"), "");
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("/var/log/syslog"), "syslog");
        assert_eq!(base_name("/etc/"), "etc");
        assert_eq!(base_name("plain"), "plain");
    }

    #[test]
    fn test_glob_literal() {
        assert!(glob_match("readme.md", "readme.md"));
        assert!(!glob_match("readme.md", "README.md"));
    }

    #[test]
    fn test_glob_star() {
        assert!(glob_match("*.log", "syslog.log"));
        assert!(glob_match("foo*", "foobar"));
        assert!(glob_match("*", "anything"));
        assert!(!glob_match("*.log", "syslog.txt"));
    }

    #[test]
    fn test_glob_question() {
        assert!(glob_match("file?.txt", "file1.txt"));
        assert!(!glob_match("file?.txt", "file10.txt"));
    }

    #[test]
    fn test_glob_brackets_are_literal() {
        assert!(glob_match("file[1].txt", "file[1].txt"));
        assert!(!glob_match("file[0-9].txt", "file7.txt"));
    }

    #[test]
    fn test_glob_empty() {
        assert!(glob_match("", ""));
        assert!(!glob_match("", "x"));
        assert!(glob_match("*", ""));
    }
}
