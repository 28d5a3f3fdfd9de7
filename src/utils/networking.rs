use crate::utils::exec::CommandExecutor;
use std::net::IpAddr;

/// Get the non-loopback IP addresses of this machine, in the order `hostname -I` reports them
pub fn get_local_ips<E: CommandExecutor + ?Sized>(exec: &E) -> Vec<IpAddr> {
    let Ok(output) = exec.execute_simple("hostname", &["-I"]) else {
        return Vec::new();
    };
    if !output.status.success() {
        return Vec::new();
    }

    String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .filter_map(|s| s.parse::<IpAddr>().ok())
        .filter(|ip| !ip.is_loopback())
        .collect()
}

/// First IPv4 address of this machine, used as the default answer for the node IP
pub fn suggest_node_ip<E: CommandExecutor + ?Sized>(exec: &E) -> Option<String> {
    let ips = get_local_ips(exec);
    ips.iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| ips.first())
        .map(|ip| ip.to_string())
}
