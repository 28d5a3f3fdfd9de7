//! Dry-run output: install plans and post-config manifests

use super::install::{compiler_for, print_plan};
use super::post_config::PostConfigPlan;
use crate::config::WizardConfig;
use crate::services::k3s::RoleRequest;
use crate::services::manifests::to_yaml_stream;
use anyhow::{Context, Result};

/// Compile `request` and print the resulting plan. Nothing is executed.
pub fn handle_plan(config: &WizardConfig, request: &RoleRequest) -> Result<()> {
    let plan = compiler_for(config).compile(request)?;
    print_plan(&plan);
    println!("Install script: {}", config.script_url());
    Ok(())
}

/// Render post-config manifests as one YAML stream
pub fn render_yaml(plan: &PostConfigPlan) -> Result<String> {
    let rendered = plan.render()?;
    to_yaml_stream(&rendered.documents()).context("Failed to serialize manifests")
}

pub fn handle_render(plan: &PostConfigPlan) -> Result<()> {
    print!("{}", render_yaml(plan)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::manifests::{IngressPlacementConfig, StorageConfig};

    #[test]
    fn test_render_yaml_order() {
        let plan = PostConfigPlan {
            ingress: Some(IngressPlacementConfig::default()),
            storage: Some(StorageConfig::new("nas.lan", "/volume1/k8s", "nfs-client")),
        };
        let yaml = render_yaml(&plan).unwrap();
        assert_eq!(yaml.matches("---\n").count(), 9);

        let helm = yaml.find("kind: HelmChartConfig").unwrap();
        let ns = yaml.find("kind: Namespace").unwrap();
        let class = yaml.find("kind: StorageClass").unwrap();
        assert!(helm < ns && ns < class);
    }

    #[test]
    fn test_render_empty_plan() {
        assert_eq!(render_yaml(&PostConfigPlan::default()).unwrap(), "");
    }
}
