use std::net::Ipv6Addr;

/// Convert bytes to a trimmed string, handling UTF-8 conversion errors gracefully
pub fn bytes_to_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Format a host and port as an address string, bracketing bare IPv6 hosts
pub fn format_address(host: &str, port: u16) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Split a comma or whitespace separated answer into its non-empty entries
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split an argument line on whitespace only, so values keep their commas
pub fn split_args(input: &str) -> Vec<String> {
    input.split_whitespace().map(str::to_string).collect()
}
