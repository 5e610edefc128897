//! Container runtime configuration states.
//!
//! Staged files always land in a remote scratch directory first and are
//! moved into their final path afterwards, so a restarting service never
//! reads a half-written file. Scratch cleanup is advisory: it runs on every
//! exit path and its failure is logged, never returned.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::warn;

use super::target::Target;
use super::template;

const CONF_SCRATCH_DIR: &str = "/tmp/crio.conf.d";
const SYSCONFIG_SCRATCH_DIR: &str = "/tmp/cri.d";
const CONF_FINAL_DIR: &str = "/etc/crio/crio.conf.d";
const SYSCONFIG_FINAL_PATH: &str = "/etc/sysconfig/crio";

/// Typed payload shared by the cri states.
///
/// Only the rendering fields are serialized; the local paths are operator
/// machine concerns the template must not see.
#[derive(Debug, Clone, Serialize)]
pub struct CriConfiguration {
    pub strict_cap_defaults: bool,
    pub pause_image: String,
    #[serde(skip)]
    pub conf_source_dir: PathBuf,
    #[serde(skip)]
    pub sysconfig_source_dir: PathBuf,
    #[serde(skip)]
    pub migration_output_path: PathBuf,
}

/// Rendered by the migration state and written with owner-only permissions.
const MIGRATION_TEMPLATE: &str = r#"# Defaults provided by the platform. Do not edit.
{{#unless strict_cap_defaults}}[crio.runtime]

default_capabilities = [
	"CHOWN",
	"DAC_OVERRIDE",
	"FSETID",
	"FOWNER",
	"NET_RAW",
	"SETGID",
	"SETUID",
	"SETPCAP",
	"NET_BIND_SERVICE",
	"SYS_CHROOT",
	"KILL",
	"MKNOD",
	"AUDIT_WRITE",
	"SETFCAP",
]
{{/unless}}
[crio.image]

pause_image = "{{pause_image}}"
"#;

/// Stage the local crio.conf.d drop-ins and move them into place.
pub async fn configure(target: &Target, payload: &CriConfiguration) -> Result<()> {
    let result = stage_conf_files(target, payload).await;
    cleanup_scratch(target, CONF_SCRATCH_DIR).await;
    result
}

async fn stage_conf_files(target: &Target, payload: &CriConfiguration) -> Result<()> {
    let source = &payload.conf_source_dir;
    let mut entries = tokio::fs::read_dir(source).await.with_context(|| {
        format!("Could not read local cri directory: {}", source.display())
    })?;

    while let Some(entry) = entries.next_entry().await.with_context(|| {
        format!("Could not read local cri directory: {}", source.display())
    })? {
        let name = entry.file_name();
        // The README is documentation for operators, not configuration.
        if name == "README" {
            continue;
        }
        target
            .upload(&entry.path(), &Path::new(CONF_SCRATCH_DIR).join(&name))
            .await?;
    }

    target
        .ssh(&format!("mv -f {}/* {}/", CONF_SCRATCH_DIR, CONF_FINAL_DIR))
        .await?;
    Ok(())
}

/// Stage the runtime sysconfig, keeping a backup of the previous one.
pub async fn sysconfig(target: &Target, payload: &CriConfiguration) -> Result<()> {
    let result = stage_sysconfig_files(target, payload).await;
    cleanup_scratch(target, SYSCONFIG_SCRATCH_DIR).await;
    result
}

async fn stage_sysconfig_files(target: &Target, payload: &CriConfiguration) -> Result<()> {
    let source = &payload.sysconfig_source_dir;
    let mut entries = tokio::fs::read_dir(source).await.with_context(|| {
        format!("Could not read local cri directory: {}", source.display())
    })?;

    while let Some(entry) = entries.next_entry().await.with_context(|| {
        format!("Could not read local cri directory: {}", source.display())
    })? {
        target
            .upload(
                &entry.path(),
                &Path::new(SYSCONFIG_SCRATCH_DIR).join(entry.file_name()),
            )
            .await?;
    }

    target
        .ssh(&format!(
            "mv -f {} {}.backup",
            SYSCONFIG_FINAL_PATH, SYSCONFIG_FINAL_PATH
        ))
        .await?;
    target
        .ssh(&format!(
            "mv -f {}/default_flags {}",
            SYSCONFIG_SCRATCH_DIR, SYSCONFIG_FINAL_PATH
        ))
        .await?;
    Ok(())
}

/// Enable and restart the container runtime service.
pub async fn start(target: &Target) -> Result<()> {
    target.ssh("systemctl enable --now crio").await?;
    Ok(())
}

/// Migrate the legacy sysconfig-style runtime configuration to a rendered
/// drop-in when crossing a runtime major/minor boundary.
///
/// Every sub-step failure is fatal and carries the failing step's identity;
/// skipping silently would leave the runtime half-migrated.
pub async fn migrate_config(target: &Target, payload: &CriConfiguration) -> Result<()> {
    // Park the legacy file first so the runtime cannot pick up both.
    target
        .ssh(&format!(
            "mv {} {}.legacy",
            SYSCONFIG_FINAL_PATH, SYSCONFIG_FINAL_PATH
        ))
        .await?;

    let data =
        serde_json::to_value(payload).context("could not serialize cri configuration")?;
    let rendered =
        template::render(MIGRATION_TEMPLATE, &data).context("unable to render template")?;

    write_owner_only(&payload.migration_output_path, &rendered).await
}

async fn write_owner_only(path: &Path, contents: &str) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await
        .with_context(|| format!("could not create file {}", path.display()))?;
    file.write_all(contents.as_bytes())
        .await
        .with_context(|| format!("unable to write template to file {}", path.display()))?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))
        .await
        .with_context(|| format!("unable to chmod file {}", path.display()))?;
    file.sync_all()
        .await
        .with_context(|| format!("unable to close file {}", path.display()))?;
    Ok(())
}

async fn cleanup_scratch(target: &Target, scratch: &str) {
    if let Err(err) = target.ssh(&format!("rm -rf {}", scratch)).await {
        warn!(
            "Could not delete the {} config path on {}: {}",
            scratch,
            target.node_name(),
            err
        );
    }
}
