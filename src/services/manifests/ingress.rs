//! Placement override for the bundled Traefik ingress controller

use super::ManifestDocument;
use crate::error::CompileError;
use crate::services::k3s::{
    DEDICATED_TAINT_EFFECT, DEDICATED_TAINT_KEY, DEDICATED_TAINT_VALUE, INGRESS_LABEL_KEY,
    INGRESS_LABEL_VALUE,
};
use serde_json::{Map, Value, json};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Default Kubernetes NodePort allocation range
pub const NODE_PORT_RANGE: RangeInclusive<u16> = 30000..=32767;

pub const TRAEFIK_NAMESPACE: &str = "kube-system";
pub const TRAEFIK_DEPLOYMENT: &str = "traefik";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureMode {
    NodePort,
    LoadBalancer,
}

impl FromStr for ExposureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nodeport" | "node-port" | "np" => Ok(ExposureMode::NodePort),
            "loadbalancer" | "load-balancer" | "lb" => Ok(ExposureMode::LoadBalancer),
            other => Err(format!(
                "unknown exposure mode '{}' (expected nodeport or loadbalancer)",
                other
            )),
        }
    }
}

impl fmt::Display for ExposureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExposureMode::NodePort => "nodeport",
            ExposureMode::LoadBalancer => "loadbalancer",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressPlacementConfig {
    pub label_key: String,
    pub label_value: String,
    pub exposure_mode: ExposureMode,
    /// Only used with `ExposureMode::NodePort`
    pub http_port: u16,
    /// Only used with `ExposureMode::NodePort`
    pub https_port: u16,
    pub tolerate_dedicated_taint: bool,
}

impl Default for IngressPlacementConfig {
    fn default() -> Self {
        Self {
            label_key: INGRESS_LABEL_KEY.to_string(),
            label_value: INGRESS_LABEL_VALUE.to_string(),
            exposure_mode: ExposureMode::NodePort,
            http_port: 30080,
            https_port: 30443,
            tolerate_dedicated_taint: false,
        }
    }
}

impl IngressPlacementConfig {
    /// Parse a `key=value` node selector as entered by the operator
    pub fn with_selector(mut self, selector: &str) -> Result<Self, CompileError> {
        match selector.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => {
                self.label_key = k.trim().to_string();
                self.label_value = v.trim().to_string();
                Ok(self)
            }
            _ => Err(CompileError::out_of_range(
                "label",
                selector,
                "expected key=value",
            )),
        }
    }

    fn validate(&self) -> Result<(), CompileError> {
        let key = self.label_key.trim();
        if key.is_empty() || key.chars().any(char::is_whitespace) {
            return Err(CompileError::out_of_range(
                "label_key",
                &self.label_key,
                "must be a non-empty label key",
            ));
        }
        if self.exposure_mode == ExposureMode::NodePort {
            for (field, port) in [("http_port", self.http_port), ("https_port", self.https_port)] {
                if !NODE_PORT_RANGE.contains(&port) {
                    return Err(CompileError::out_of_range(
                        field,
                        port,
                        format!(
                            "NodePort must be within {}-{}",
                            NODE_PORT_RANGE.start(),
                            NODE_PORT_RANGE.end()
                        ),
                    ));
                }
            }
            if self.http_port == self.https_port {
                return Err(CompileError::out_of_range(
                    "https_port",
                    self.https_port,
                    "must differ from http_port",
                ));
            }
        }
        Ok(())
    }
}

/// Render the `HelmChartConfig` that pins Traefik to the selected nodes.
///
/// The K3s helm controller merges `valuesContent` into the bundled chart and
/// rolls the deployment.
pub fn render_ingress_placement(
    config: &IngressPlacementConfig,
) -> Result<ManifestDocument, CompileError> {
    config.validate()?;

    let mut selector = Map::new();
    selector.insert(
        config.label_key.trim().to_string(),
        Value::String(config.label_value.trim().to_string()),
    );

    let mut values = Map::new();
    values.insert("nodeSelector".to_string(), Value::Object(selector));

    if config.tolerate_dedicated_taint {
        values.insert(
            "tolerations".to_string(),
            json!([{
                "key": DEDICATED_TAINT_KEY,
                "operator": "Equal",
                "value": DEDICATED_TAINT_VALUE,
                "effect": DEDICATED_TAINT_EFFECT,
            }]),
        );
    }

    if config.exposure_mode == ExposureMode::NodePort {
        values.insert(
            "service".to_string(),
            json!({
                "type": "NodePort",
                // Keep the client source IP
                "spec": { "externalTrafficPolicy": "Local" },
            }),
        );
        values.insert(
            "ports".to_string(),
            json!({
                "web": { "nodePort": config.http_port },
                "websecure": { "nodePort": config.https_port },
            }),
        );
    }

    let values_content = serde_yaml::to_string(&Value::Object(values))?;

    Ok(ManifestDocument::new(json!({
        "apiVersion": "helm.cattle.io/v1",
        "kind": "HelmChartConfig",
        "metadata": {
            "name": TRAEFIK_DEPLOYMENT,
            "namespace": TRAEFIK_NAMESPACE,
        },
        "spec": { "valuesContent": values_content },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values_of(doc: &ManifestDocument) -> Value {
        let content = doc.value()["spec"]["valuesContent"].as_str().unwrap();
        serde_yaml::from_str(content).unwrap()
    }

    #[test]
    fn test_nodeport_render() {
        let cfg = IngressPlacementConfig {
            tolerate_dedicated_taint: true,
            ..Default::default()
        };
        let doc = render_ingress_placement(&cfg).unwrap();
        assert_eq!(doc.describe(), "HelmChartConfig/traefik");
        assert_eq!(doc.value()["metadata"]["namespace"], "kube-system");

        let values = values_of(&doc);
        assert_eq!(values["nodeSelector"], json!({ "ingress": "true" }));
        assert_eq!(values["service"]["type"], "NodePort");
        assert_eq!(values["service"]["spec"]["externalTrafficPolicy"], "Local");
        assert_eq!(values["ports"]["web"]["nodePort"], 30080);
        assert_eq!(values["ports"]["websecure"]["nodePort"], 30443);
        assert_eq!(
            values["tolerations"],
            json!([{
                "key": "dedicated",
                "operator": "Equal",
                "value": "ingress",
                "effect": "NoSchedule",
            }])
        );

        let yaml = doc.to_yaml().unwrap();
        assert!(yaml.contains("30080"));
        assert!(yaml.contains("30443"));
    }

    #[test]
    fn test_render_is_idempotent() {
        let cfg = IngressPlacementConfig::default();
        let a = render_ingress_placement(&cfg).unwrap().to_yaml().unwrap();
        let b = render_ingress_placement(&cfg).unwrap().to_yaml().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_privileged_port_is_out_of_range() {
        let cfg = IngressPlacementConfig {
            http_port: 80,
            ..Default::default()
        };
        match render_ingress_placement(&cfg).unwrap_err() {
            CompileError::OutOfRangeConfig { field, value, .. } => {
                assert_eq!(field, "http_port");
                assert_eq!(value, "80");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_port_range_bounds() {
        let mut cfg = IngressPlacementConfig {
            http_port: 30000,
            https_port: 32767,
            ..Default::default()
        };
        assert!(render_ingress_placement(&cfg).is_ok());

        cfg.https_port = 32768;
        assert!(render_ingress_placement(&cfg).is_err());
    }

    #[test]
    fn test_equal_ports_are_rejected() {
        let cfg = IngressPlacementConfig {
            http_port: 30080,
            https_port: 30080,
            ..Default::default()
        };
        assert!(matches!(
            render_ingress_placement(&cfg),
            Err(CompileError::OutOfRangeConfig { field: "https_port", .. })
        ));
    }

    #[test]
    fn test_loadbalancer_omits_service_overrides() {
        let cfg = IngressPlacementConfig {
            exposure_mode: ExposureMode::LoadBalancer,
            // Ignored in this mode
            http_port: 80,
            https_port: 443,
            tolerate_dedicated_taint: true,
            ..Default::default()
        };
        let values = values_of(&render_ingress_placement(&cfg).unwrap());
        assert!(values.get("service").is_none());
        assert!(values.get("ports").is_none());
        assert_eq!(values["nodeSelector"]["ingress"], "true");
        assert!(values["tolerations"].is_array());
    }

    #[test]
    fn test_no_toleration_unless_requested() {
        let values = values_of(&render_ingress_placement(&IngressPlacementConfig::default()).unwrap());
        assert!(values.get("tolerations").is_none());
    }

    #[test]
    fn test_selector_parsing() {
        let cfg = IngressPlacementConfig::default()
            .with_selector("node-role/edge = yes")
            .unwrap();
        assert_eq!(cfg.label_key, "node-role/edge");
        assert_eq!(cfg.label_value, "yes");
        assert!(IngressPlacementConfig::default().with_selector("noequals").is_err());
    }

    #[test]
    fn test_exposure_mode_parsing() {
        assert_eq!("NodePort".parse::<ExposureMode>().unwrap(), ExposureMode::NodePort);
        assert_eq!("lb".parse::<ExposureMode>().unwrap(), ExposureMode::LoadBalancer);
        assert!("ingress".parse::<ExposureMode>().is_err());
    }
}
