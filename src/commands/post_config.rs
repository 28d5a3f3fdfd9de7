//! Post-config wizard: ingress placement, NFS storage, default class

use crate::cli_types::PostConfigArgs;
use crate::config::WizardConfig;
use crate::error::CompileError;
use crate::services::Readiness;
use crate::services::cluster::{
    ClusterApplier, DefaultClassTransition, StorageClassStore, ensure_class_name_available,
    make_default,
};
use crate::services::manifests::{
    ExposureMode, IngressPlacementConfig, ManifestDocument, PROVISIONER_DEPLOYMENT,
    PROVISIONER_NAMESPACE, StorageConfig, TRAEFIK_DEPLOYMENT, TRAEFIK_NAMESPACE,
    render_ingress_placement, render_storage_stack,
};
use crate::utils::prompt::Prompter;
use anyhow::Result;
use std::io::{BufRead, Write};
use std::time::Duration;

/// What the operator asked post-config to do. Either part may be skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostConfigPlan {
    pub ingress: Option<IngressPlacementConfig>,
    pub storage: Option<StorageConfig>,
}

/// Every manifest, rendered before anything touches the cluster
#[derive(Debug, Clone, Default)]
pub struct RenderedPostConfig {
    pub ingress: Option<ManifestDocument>,
    pub storage: Vec<ManifestDocument>,
}

impl RenderedPostConfig {
    pub fn documents(&self) -> Vec<ManifestDocument> {
        self.ingress
            .iter()
            .chain(self.storage.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostConfigReport {
    pub ingress: Option<Readiness>,
    pub storage: Option<Readiness>,
    pub default_class: Option<DefaultClassTransition>,
}

impl PostConfigPlan {
    pub fn is_empty(&self) -> bool {
        self.ingress.is_none() && self.storage.is_none()
    }

    pub fn render(&self) -> Result<RenderedPostConfig, CompileError> {
        Ok(RenderedPostConfig {
            ingress: self
                .ingress
                .as_ref()
                .map(render_ingress_placement)
                .transpose()?,
            storage: match &self.storage {
                Some(storage) => render_storage_stack(storage)?,
                None => Vec::new(),
            },
        })
    }

    pub fn from_args(args: &PostConfigArgs, config: &WizardConfig) -> Result<Self, CompileError> {
        let ingress = if args.skip_ingress {
            None
        } else {
            let mut ingress =
                IngressPlacementConfig::default().with_selector(&args.ingress_selector)?;
            ingress.exposure_mode = args.exposure;
            ingress.http_port = args.http_port;
            ingress.https_port = args.https_port;
            ingress.tolerate_dedicated_taint = args.tolerate_dedicated;
            Some(ingress)
        };

        let storage = args.nfs_server.as_ref().map(|server| {
            let mut storage = StorageConfig::new(
                server.clone(),
                args.nfs_path.clone().unwrap_or_default(),
                args.storage_class.clone(),
            );
            storage.set_as_default = args.default_class;
            storage.provisioner_image = config.provisioner_image.clone();
            storage
        });

        Ok(Self { ingress, storage })
    }
}

/// Ask the post-config questions
pub fn prompt_plan<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    config: &WizardConfig,
) -> Result<PostConfigPlan> {
    let mut plan = PostConfigPlan::default();

    if prompter.confirm("Pin the ingress controller to labelled nodes?", true)? {
        let selector = prompter.ask("Ingress node selector", Some("ingress=true"))?;
        let mut ingress = IngressPlacementConfig::default().with_selector(&selector)?;

        ingress.exposure_mode = loop {
            let answer = prompter.ask("Expose ingress via nodeport or loadbalancer", Some("nodeport"))?;
            match answer.parse::<ExposureMode>() {
                Ok(mode) => break mode,
                Err(e) => prompter.say(&format!("  {}", e))?,
            }
        };
        if ingress.exposure_mode == ExposureMode::NodePort {
            ingress.http_port = prompter.ask_number("HTTP NodePort", ingress.http_port)?;
            ingress.https_port = prompter.ask_number("HTTPS NodePort", ingress.https_port)?;
        }
        ingress.tolerate_dedicated_taint =
            prompter.confirm("Allow it onto nodes tainted for dedicated ingress?", true)?;
        plan.ingress = Some(ingress);
    }

    if prompter.confirm("Set up NFS dynamic storage?", true)? {
        let server = prompter.ask_required("NFS server address", None)?;
        let path = prompter.ask_required("Exported path on the server", None)?;
        let class = prompter.ask_required("StorageClass name", Some("nfs-client"))?;
        let mut storage = StorageConfig::new(server, path, class);
        storage.set_as_default = prompter.confirm("Make it the default StorageClass?", true)?;
        storage.provisioner_image = config.provisioner_image.clone();
        plan.storage = Some(storage);
    }

    Ok(plan)
}

/// Apply a post-config plan.
///
/// All manifests are rendered first, so bad input fails before any cluster
/// call. An unreachable cluster aborts the whole run with nothing applied.
pub fn run_post_config<C>(
    cluster: &C,
    plan: &PostConfigPlan,
    rollout_timeout: Duration,
) -> Result<PostConfigReport>
where
    C: ClusterApplier + StorageClassStore + ?Sized,
{
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Post-config");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    let mut report = PostConfigReport::default();
    if plan.is_empty() {
        println!("Nothing selected.");
        return Ok(report);
    }

    let rendered = plan.render()?;

    println!("Checking cluster access...");
    cluster.probe()?;
    println!("✓ Cluster is accessible");
    println!();

    if let Some(storage) = &plan.storage {
        let classes = cluster.list_storage_classes()?;
        ensure_class_name_available(&classes, storage)?;
    }

    if let Some(doc) = &rendered.ingress {
        println!("Applying ingress placement...");
        cluster.apply(std::slice::from_ref(doc))?;
        let readiness = cluster.wait_rollout(TRAEFIK_NAMESPACE, TRAEFIK_DEPLOYMENT, rollout_timeout)?;
        report_readiness(TRAEFIK_DEPLOYMENT, readiness);
        report.ingress = Some(readiness);
        println!();
    }

    if let Some(storage) = &plan.storage {
        println!("Applying NFS provisioner ({} documents)...", rendered.storage.len());
        cluster.apply(&rendered.storage)?;
        let readiness =
            cluster.wait_rollout(PROVISIONER_NAMESPACE, PROVISIONER_DEPLOYMENT, rollout_timeout)?;
        report_readiness(PROVISIONER_DEPLOYMENT, readiness);
        report.storage = Some(readiness);

        if storage.set_as_default {
            println!("Setting {} as the default StorageClass...", storage.class_name);
            report.default_class = Some(make_default(cluster, &storage.class_name)?);
        }
        println!();
    }

    println!("✓ Post-config complete");
    Ok(report)
}

fn report_readiness(deployment: &str, readiness: Readiness) {
    match readiness {
        Readiness::Ready => println!("  ✓ {} rolled out", deployment),
        Readiness::NotObserved { .. } => {
            tracing::warn!(deployment, %readiness, "rollout not observed");
            println!("  ⚠ {} {}, it may still be starting", deployment, readiness);
        }
    }
}
