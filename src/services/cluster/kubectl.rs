use super::{
    BETA_DEFAULT_CLASS_ANNOTATION, ClusterApplier, DEFAULT_CLASS_ANNOTATION, StorageClassInfo,
    StorageClassStore,
};
use crate::error::ExternalError;
use crate::services::Readiness;
use crate::services::manifests::{ManifestDocument, to_yaml_stream};
use crate::utils::exec::CommandExecutor;
use crate::utils::string::bytes_to_string;
use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};
use std::process::Output;
use std::time::Duration;

/// kubectl-backed cluster client.
///
/// The command may carry a prefix, e.g. `k3s kubectl` or `sudo k3s kubectl`.
pub struct Kubectl<'a, E: CommandExecutor + ?Sized> {
    exec: &'a E,
    program: String,
    base_args: Vec<String>,
}

impl<'a, E: CommandExecutor + ?Sized> Kubectl<'a, E> {
    pub fn new(exec: &'a E, command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let Some(program) = parts.next() else {
            bail!("kubectl command is empty");
        };
        Ok(Self {
            exec,
            program,
            base_args: parts.collect(),
        })
    }

    fn full_args<'b>(&'b self, args: &[&'b str]) -> Vec<&'b str> {
        self.base_args
            .iter()
            .map(String::as_str)
            .chain(args.iter().copied())
            .collect()
    }

    pub fn run(&self, args: &[&str]) -> Result<Output> {
        self.exec.execute_simple(&self.program, &self.full_args(args))
    }

    fn run_with_stdin(&self, args: &[&str], input: &[u8]) -> Result<Output> {
        self.exec
            .execute_with_stdin(&self.program, &self.full_args(args), input)
    }

    fn failure_detail(output: &Output) -> String {
        let stderr = bytes_to_string(&output.stderr);
        if stderr.is_empty() {
            match output.status.code() {
                Some(code) => format!("exit status {}", code),
                None => "killed by signal".to_string(),
            }
        } else {
            stderr
        }
    }
}

impl<E: CommandExecutor + ?Sized> ClusterApplier for Kubectl<'_, E> {
    fn probe(&self) -> Result<()> {
        if !self.exec.check_command_exists(&self.program) {
            return Err(ExternalError::ClusterUnreachable {
                reason: format!("'{}' not found in PATH", self.program),
            }
            .into());
        }

        let output = self.run(&["cluster-info", "--request-timeout=5s"])?;
        if !output.status.success() {
            return Err(ExternalError::ClusterUnreachable {
                reason: Self::failure_detail(&output),
            }
            .into());
        }
        Ok(())
    }

    fn apply(&self, docs: &[ManifestDocument]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let stream = to_yaml_stream(docs).context("Failed to serialize manifests")?;
        let output = self.run_with_stdin(&["apply", "-f", "-"], stream.as_bytes())?;
        if !output.status.success() {
            let names: Vec<String> = docs.iter().map(ManifestDocument::describe).collect();
            return Err(ExternalError::ApplyFailed {
                what: format!("apply {}", names.join(", ")),
                detail: Self::failure_detail(&output),
            }
            .into());
        }
        for line in bytes_to_string(&output.stdout).lines() {
            println!("  {}", line);
        }
        Ok(())
    }

    fn wait_rollout(
        &self,
        namespace: &str,
        deployment: &str,
        timeout: Duration,
    ) -> Result<Readiness> {
        let target = format!("deployment/{}", deployment);
        // Zero means no timeout to kubectl
        let timeout_arg = format!("--timeout={}s", timeout.as_secs().max(1));
        let output = self.run(&["rollout", "status", &target, "-n", namespace, &timeout_arg])?;

        if output.status.success() {
            Ok(Readiness::Ready)
        } else {
            tracing::debug!(detail = %Self::failure_detail(&output), "rollout not observed");
            Ok(Readiness::NotObserved { waited: timeout })
        }
    }
}

impl<E: CommandExecutor + ?Sized> StorageClassStore for Kubectl<'_, E> {
    fn list_storage_classes(&self) -> Result<Vec<StorageClassInfo>> {
        let output = self.run(&["get", "storageclass", "-o", "json"])?;
        if !output.status.success() {
            return Err(ExternalError::ApplyFailed {
                what: "list storage classes".to_string(),
                detail: Self::failure_detail(&output),
            }
            .into());
        }
        parse_storage_classes(&bytes_to_string(&output.stdout))
    }

    fn set_default(&self, name: &str, is_default: bool) -> Result<()> {
        let patch = default_class_patch(is_default);
        let target = format!("storageclass/{}", name);
        let output = self.run(&["patch", &target, "--type=merge", "-p", &patch])?;
        if !output.status.success() {
            return Err(ExternalError::ApplyFailed {
                what: format!("mark {} default={}", target, is_default),
                detail: Self::failure_detail(&output),
            }
            .into());
        }
        Ok(())
    }
}

/// Parse `kubectl get storageclass -o json`
fn parse_storage_classes(json: &str) -> Result<Vec<StorageClassInfo>> {
    let list: Value =
        serde_json::from_str(json).context("Failed to parse storage class list from kubectl")?;

    let items = list
        .get("items")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    let classes = items
        .iter()
        .filter_map(|item| {
            let name = item.pointer("/metadata/name")?.as_str()?;
            let provisioner = item.get("provisioner").and_then(|v| v.as_str()).unwrap_or("");
            let annotations = item.pointer("/metadata/annotations");
            let flagged = |key: &str| {
                annotations
                    .and_then(|a| a.get(key))
                    .and_then(|v| v.as_str())
                    .is_some_and(|v| v == "true")
            };
            Some(StorageClassInfo::new(
                name,
                provisioner,
                flagged(DEFAULT_CLASS_ANNOTATION) || flagged(BETA_DEFAULT_CLASS_ANNOTATION),
            ))
        })
        .collect();

    Ok(classes)
}

/// Merge patch for the default annotation. Demoting also drops the legacy beta key.
fn default_class_patch(is_default: bool) -> String {
    let mut annotations = Map::new();
    annotations.insert(
        DEFAULT_CLASS_ANNOTATION.to_string(),
        Value::String(is_default.to_string()),
    );
    if !is_default {
        annotations.insert(BETA_DEFAULT_CLASS_ANNOTATION.to_string(), Value::Null);
    }

    let mut metadata = Map::new();
    metadata.insert("annotations".to_string(), Value::Object(annotations));
    let mut patch = Map::new();
    patch.insert("metadata".to_string(), Value::Object(metadata));
    Value::Object(patch).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::exec::testing::FakeExecutor;
    use serde_json::json;

    const CLASSES: &str = r#"{
        "apiVersion": "v1",
        "kind": "List",
        "items": [
            {
                "metadata": {
                    "name": "local-path",
                    "annotations": { "storageclass.kubernetes.io/is-default-class": "true" }
                },
                "provisioner": "rancher.io/local-path"
            },
            {
                "metadata": {
                    "name": "legacy",
                    "annotations": { "storageclass.beta.kubernetes.io/is-default-class": "true" }
                },
                "provisioner": "example.com/legacy"
            },
            {
                "metadata": { "name": "nfs-client" },
                "provisioner": "k8s-sigs.io/nfs-subdir-external-provisioner"
            }
        ]
    }"#;

    #[test]
    fn test_command_prefix_is_split() {
        let exec = FakeExecutor::new();
        let kubectl = Kubectl::new(&exec, "sudo k3s kubectl").unwrap();
        kubectl.probe().unwrap();
        assert_eq!(
            exec.commands(),
            vec!["sudo k3s kubectl cluster-info --request-timeout=5s"]
        );
        assert!(Kubectl::new(&exec, "   ").is_err());
    }

    #[test]
    fn test_probe_unreachable() {
        let exec = FakeExecutor::new().respond_full(
            "kubectl cluster-info",
            1,
            "",
            "The connection to the server localhost:8080 was refused",
        );
        let kubectl = Kubectl::new(&exec, "kubectl").unwrap();
        let err = kubectl.probe().unwrap_err();
        match err.downcast_ref::<ExternalError>() {
            Some(ExternalError::ClusterUnreachable { reason }) => {
                assert!(reason.contains("refused"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_probe_missing_binary() {
        let exec = FakeExecutor::new().without_command("kubectl");
        let kubectl = Kubectl::new(&exec, "kubectl").unwrap();
        let err = kubectl.probe().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExternalError>(),
            Some(ExternalError::ClusterUnreachable { .. })
        ));
        assert!(exec.commands().is_empty());
    }

    #[test]
    fn test_apply_pipes_yaml_stream() {
        let exec = FakeExecutor::new().respond("kubectl apply", 0, "namespace/demo created\n");
        let kubectl = Kubectl::new(&exec, "kubectl").unwrap();
        let doc = ManifestDocument::new(json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": { "name": "demo" },
        }));
        kubectl.apply(&[doc]).unwrap();

        let calls = exec.calls.borrow();
        assert_eq!(calls[0].command, "kubectl apply -f -");
        assert!(calls[0].stdin.starts_with("---\napiVersion: v1\n"));
    }

    #[test]
    fn test_apply_rejected() {
        let exec = FakeExecutor::new().respond_full("kubectl apply", 1, "", "forbidden");
        let kubectl = Kubectl::new(&exec, "kubectl").unwrap();
        let doc = ManifestDocument::new(json!({ "kind": "Namespace", "metadata": { "name": "x" } }));
        let err = kubectl.apply(&[doc]).unwrap_err();
        match err.downcast_ref::<ExternalError>() {
            Some(ExternalError::ApplyFailed { what, detail }) => {
                assert_eq!(what, "apply Namespace/x");
                assert_eq!(detail, "forbidden");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_rollout_timeout_is_not_an_error() {
        let exec = FakeExecutor::new().respond("kubectl rollout status", 1, "");
        let kubectl = Kubectl::new(&exec, "kubectl").unwrap();
        let readiness = kubectl
            .wait_rollout("kube-system", "traefik", Duration::from_secs(90))
            .unwrap();
        assert_eq!(
            readiness,
            Readiness::NotObserved {
                waited: Duration::from_secs(90)
            }
        );
        assert_eq!(
            exec.commands(),
            vec!["kubectl rollout status deployment/traefik -n kube-system --timeout=90s"]
        );
    }

    #[test]
    fn test_rollout_never_waits_unbounded() {
        let exec = FakeExecutor::new();
        let kubectl = Kubectl::new(&exec, "kubectl").unwrap();
        let readiness = kubectl
            .wait_rollout("kube-system", "traefik", Duration::ZERO)
            .unwrap();
        assert_eq!(readiness, Readiness::Ready);
        assert_eq!(
            exec.commands(),
            vec!["kubectl rollout status deployment/traefik -n kube-system --timeout=1s"]
        );
    }

    #[test]
    fn test_parse_storage_classes() {
        let classes = parse_storage_classes(CLASSES).unwrap();
        assert_eq!(
            classes,
            vec![
                StorageClassInfo::new("local-path", "rancher.io/local-path", true),
                StorageClassInfo::new("legacy", "example.com/legacy", true),
                StorageClassInfo::new(
                    "nfs-client",
                    "k8s-sigs.io/nfs-subdir-external-provisioner",
                    false
                ),
            ]
        );
        assert!(parse_storage_classes(r#"{"items": []}"#).unwrap().is_empty());
        assert!(parse_storage_classes("not json").is_err());
    }

    #[test]
    fn test_default_class_patch() {
        let promote: Value = serde_json::from_str(&default_class_patch(true)).unwrap();
        assert_eq!(
            promote,
            json!({ "metadata": { "annotations": {
                "storageclass.kubernetes.io/is-default-class": "true"
            }}})
        );

        let demote: Value = serde_json::from_str(&default_class_patch(false)).unwrap();
        let annotations = &demote["metadata"]["annotations"];
        assert_eq!(annotations[DEFAULT_CLASS_ANNOTATION], "false");
        assert!(annotations[BETA_DEFAULT_CLASS_ANNOTATION].is_null());
    }

    #[test]
    fn test_set_default_runs_merge_patch() {
        let exec = FakeExecutor::new();
        let kubectl = Kubectl::new(&exec, "kubectl").unwrap();
        kubectl.set_default("nfs-client", true).unwrap();
        let commands = exec.commands();
        assert!(commands[0].starts_with("kubectl patch storageclass/nfs-client --type=merge -p "));
    }
}
