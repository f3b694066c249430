//! Probe shell commands and parsers for their stdout
//!
//! Parsers are pure functions over probe output so they are testable
//! without a transport. Units follow the wire format: memory MiB, disk
//! GiB, network MiB, uptime seconds.

/// CPU busy percentage via `top`; two iterations so the sample reflects
/// current load rather than the boot average
pub const CPU_COMMAND: &str =
    r#"top -bn2 -d0.5 | grep "Cpu(s)" | tail -1 | awk '{print $2}' | cut -d'%' -f1"#;

/// CPU fallback: two `/proc/stat` readings one second apart, each printed
/// as `active idle`
pub const CPU_FALLBACK_COMMAND: &str = r"cat /proc/stat | grep '^cpu ' | awk '{print $2+$3+$4, $5}' && sleep 1 && cat /proc/stat | grep '^cpu ' | awk '{print $2+$3+$4, $5}'";

/// Memory totals in MiB from `free`
pub const MEMORY_COMMAND: &str = r"free -m | grep Mem | awk '{print $2, $3, $4}'";

/// Root filesystem usage in GiB from `df`
pub const DISK_COMMAND: &str = r#"df -BG / | tail -1 | awk '{gsub("G",""); print $2, $3, $4}'"#;

/// RX/TX byte counters of the primary interface
pub const NETWORK_COMMAND: &str =
    r"cat /proc/net/dev | grep -E '(eth0|ens|enp)' | head -1 | awk '{print $2, $10}'";

/// Network fallback via `ip -s link`
pub const NETWORK_FALLBACK_COMMAND: &str = r"ip -s link show | grep -A1 'RX:' | tail -1 | awk '{print $1}' && ip -s link show | grep -A1 'TX:' | tail -1 | awk '{print $1}'";

/// Uptime in whole seconds
pub const UPTIME_COMMAND: &str = r"cat /proc/uptime | awk '{print int($1)}'";

/// Load averages over 1, 5 and 15 minutes
pub const LOAD_AVERAGE_COMMAND: &str = r"cat /proc/loadavg | awk '{print $1, $2, $3}'";

/// Running process count (includes the `ps` header line)
pub const PROCESS_COUNT_COMMAND: &str = r"ps aux | wc -l";

/// Distribution pretty name
pub const OS_RELEASE_COMMAND: &str =
    r#"cat /etc/os-release | grep PRETTY_NAME | cut -d'"' -f2"#;

/// Parses the `top` pipeline output into a CPU busy percentage
#[must_use]
pub fn parse_cpu_percent(output: &str) -> Option<f64> {
    output.trim().parse().ok()
}

/// Computes CPU busy percentage from two `/proc/stat` readings
///
/// Each line is `active idle`; busy is the active delta over the total
/// delta. Returns 0 when the denominator is 0, `None` when the output
/// does not contain two readings.
#[must_use]
pub fn parse_cpu_proc_stat(output: &str) -> Option<f64> {
    let mut readings = output.trim().lines().filter_map(|line| {
        let mut fields = line.split_whitespace();
        let active: f64 = fields.next()?.parse().ok()?;
        let idle: f64 = fields.next()?.parse().ok()?;
        Some((active, idle))
    });

    let (active1, idle1) = readings.next()?;
    let (active2, idle2) = readings.next()?;

    let active_diff = active2 - active1;
    let total = active_diff + (idle2 - idle1);
    if total == 0.0 {
        return Some(0.0);
    }
    Some((active_diff / total) * 100.0)
}

/// Parses `free -m` output into (total, used, free) MiB
#[must_use]
pub fn parse_memory(output: &str) -> Option<(u64, u64, u64)> {
    parse_three_u64(output)
}

/// Parses `df -BG` output into (total, used, free) GiB
#[must_use]
pub fn parse_disk(output: &str) -> Option<(u64, u64, u64)> {
    parse_three_u64(output)
}

/// Parses interface counters into (rx, tx) bytes
#[must_use]
pub fn parse_network(output: &str) -> Option<(u64, u64)> {
    let mut fields = output.split_whitespace();
    let rx = fields.next()?.parse().ok()?;
    let tx = fields.next()?.parse().ok()?;
    Some((rx, tx))
}

/// Parses `/proc/uptime` seconds
#[must_use]
pub fn parse_uptime(output: &str) -> Option<u64> {
    output.trim().parse().ok()
}

/// Parses load averages into (1 min, 5 min, 15 min)
#[must_use]
pub fn parse_load_average(output: &str) -> Option<(f64, f64, f64)> {
    let mut fields = output.split_whitespace();
    let one = fields.next()?.parse().ok()?;
    let five = fields.next()?.parse().ok()?;
    let fifteen = fields.next()?.parse().ok()?;
    Some((one, five, fifteen))
}

/// Parses `ps aux | wc -l`, subtracting the header line
#[must_use]
pub fn parse_process_count(output: &str) -> Option<u64> {
    let count: u64 = output.trim().parse().ok()?;
    Some(count.saturating_sub(1))
}

/// Trims the distribution name from the os-release probe
#[must_use]
pub fn parse_os_release(output: &str) -> Option<String> {
    let name = output.trim();
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

fn parse_three_u64(output: &str) -> Option<(u64, u64, u64)> {
    let mut fields = output.split_whitespace();
    let a = fields.next()?.parse().ok()?;
    let b = fields.next()?.parse().ok()?;
    let c = fields.next()?.parse().ok()?;
    Some((a, b, c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_percent() {
        assert_eq!(parse_cpu_percent("12.5\n"), Some(12.5));
        assert_eq!(parse_cpu_percent("0.0"), Some(0.0));
        assert_eq!(parse_cpu_percent("us,\n"), None);
        assert_eq!(parse_cpu_percent(""), None);
    }

    #[test]
    fn test_parse_cpu_proc_stat() {
        // active: 150 -> 300, idle: 850 -> 1550; busy = 150 / 850
        let output = "150 850\n300 1550\n";
        let pct = parse_cpu_proc_stat(output).unwrap();
        assert!((pct - (150.0 / 850.0 * 100.0)).abs() < 0.01);
    }

    #[test]
    fn test_parse_cpu_proc_stat_zero_denominator() {
        let output = "100 900\n100 900\n";
        assert_eq!(parse_cpu_proc_stat(output), Some(0.0));
    }

    #[test]
    fn test_parse_cpu_proc_stat_short_output() {
        assert_eq!(parse_cpu_proc_stat("100 900\n"), None);
        assert_eq!(parse_cpu_proc_stat(""), None);
    }

    #[test]
    fn test_parse_memory() {
        assert_eq!(parse_memory("15876 8123 1024\n"), Some((15_876, 8123, 1024)));
        assert_eq!(parse_memory("15876 8123"), None);
    }

    #[test]
    fn test_parse_disk() {
        assert_eq!(parse_disk("458 120 315\n"), Some((458, 120, 315)));
        assert_eq!(parse_disk("garbage"), None);
    }

    #[test]
    fn test_parse_network() {
        assert_eq!(
            parse_network("123456789 987654321\n"),
            Some((123_456_789, 987_654_321))
        );
        assert_eq!(parse_network("only-one"), None);
    }

    #[test]
    fn test_parse_uptime() {
        assert_eq!(parse_uptime("86400\n"), Some(86_400));
        assert_eq!(parse_uptime("12.9"), None);
    }

    #[test]
    fn test_parse_load_average() {
        let (one, five, fifteen) = parse_load_average("0.52 0.34 0.28\n").unwrap();
        assert!((one - 0.52).abs() < f64::EPSILON);
        assert!((five - 0.34).abs() < f64::EPSILON);
        assert!((fifteen - 0.28).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_process_count() {
        assert_eq!(parse_process_count("213\n"), Some(212));
        assert_eq!(parse_process_count("0"), Some(0));
        assert_eq!(parse_process_count("nope"), None);
    }

    #[test]
    fn test_parse_os_release() {
        assert_eq!(
            parse_os_release("Ubuntu 24.04.1 LTS\n"),
            Some("Ubuntu 24.04.1 LTS".to_string())
        );
        assert_eq!(parse_os_release("  \n"), None);
    }
}
