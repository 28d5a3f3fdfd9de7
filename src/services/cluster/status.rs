//! Quick cluster check

use super::{ClusterApplier, Kubectl};
use crate::utils::exec::CommandExecutor;
use crate::utils::string::bytes_to_string;
use anyhow::Result;

/// Print nodes, pods and storage classes. Sections that fail are reported and skipped.
pub fn show_status<E: CommandExecutor + ?Sized>(kubectl: &Kubectl<'_, E>) -> Result<()> {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("K3s Cluster Check");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    if let Err(e) = kubectl.probe() {
        println!("✗ {}", e);
        println!();
        println!("Install a control-plane node first, or point kubectl_command at a working kubeconfig.");
        return Ok(());
    }
    println!("✓ API server reachable");
    println!();

    let sections: [(&str, &[&str]); 3] = [
        ("Nodes", &["get", "nodes", "-o", "wide"]),
        ("Pods", &["get", "pods", "-A"]),
        ("Storage Classes", &["get", "storageclass"]),
    ];

    for (title, args) in sections {
        println!("{}:", title);
        let output = kubectl.run(args)?;
        if output.status.success() {
            println!("{}", bytes_to_string(&output.stdout));
        } else {
            println!("  ⚠ {}", bytes_to_string(&output.stderr));
        }
        println!();
    }

    Ok(())
}
