//! Status command - Reconcile the working tree and report diff status
//!
//! Provides the `vaultsync status` CLI command which:
//! 1. Scans the configured vault root
//! 2. Pairs it with a manifest export (or an empty remote side)
//! 3. Prints each file's status and the folder summary beneath PATH

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};
use vaultsync_core::{config::Config, domain::VaultPath};
use vaultsync_sync::{FolderSummary, LocalVaultFileSystem, Vault, VaultPorts, VaultSettings};

use crate::{
    offline::{ManifestFile, NoBlobStore},
    output::{get_formatter, OutputFormat, OutputFormatter},
};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// JSON export of the remote records to reconcile against
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Folder inside the vault to report on (defaults to the whole vault)
    pub path: Option<String>,
}

impl StatusCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let identity = config
            .identity()
            .context("Identity is not configured; set identity.user_id and identity.machine_id")?;
        let trash_dir = VaultPath::new(config.vault.trash_dir.as_str())
            .context("Invalid vault.trash_dir")?;
        let folder = match self.path.as_deref() {
            None | Some("") | Some(".") => VaultPath::root(),
            Some(p) => VaultPath::new(p).with_context(|| format!("Invalid vault path '{p}'"))?,
        };

        let ports = VaultPorts {
            metadata: Arc::new(ManifestFile::new(self.manifest.clone())),
            blobs: Arc::new(NoBlobStore),
            filesystem: Arc::new(LocalVaultFileSystem::new(config.vault.root.clone(), trash_dir)),
        };
        let vault = Vault::new(identity, ports, VaultSettings::from_config(config));

        info!(root = %config.vault.root.display(), folder = %folder, "Reconciling vault");
        let report = vault.connect().await.context("Failed to scan vault")?;
        // Without a manifest every file is local-only and the index would be emptied
        if self.manifest.is_some() {
            if let Err(e) = vault.save_index().await {
                warn!(error = %e, "Failed to save local index");
            }
        }

        let files: Vec<_> = vault
            .records()
            .await
            .into_iter()
            .filter(|r| !r.is_directory())
            .filter(|r| r.path().is_within(&folder))
            .collect();
        let summary = vault.folder_summary(&folder).await;

        if format == OutputFormat::Json {
            let entries: Vec<serde_json::Value> = files
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "path": r.path(),
                        "status": r.diff_status(),
                        "checkedOutBy": r.holder(),
                    })
                })
                .collect();
            let json = serde_json::json!({
                "root": config.vault.root.display().to_string(),
                "folder": folder,
                "scan": report,
                "files": entries,
                "summary": summary,
            });
            formatter.print_json(&json);
            return Ok(());
        }

        formatter.success(&format!(
            "{} ({} file{})",
            if folder.is_root() { "Vault root".to_string() } else { folder.to_string() },
            files.len(),
            if files.len() == 1 { "" } else { "s" }
        ));
        formatter.info("");
        for record in &files {
            let status = match record.holder() {
                Some(holder) => format!("{} [{}]", record.diff_status(), holder),
                None => record.diff_status().to_string(),
            };
            formatter.entry(&status, record.path().as_str());
        }
        formatter.info("");
        print_summary(&*formatter, &summary);

        if self.manifest.is_none() {
            formatter.warn("No manifest given; every file is reported as local-only");
        }
        Ok(())
    }
}

fn print_summary(formatter: &dyn OutputFormatter, summary: &FolderSummary) {
    formatter.info(&format!(
        "Synced: {}",
        if summary.is_fully_synced { "yes" } else { "no" }
    ));
    formatter.info(&format!(
        "Cloud: {}  New in cloud: {}  Local only: {}  Orphaned: {}",
        summary.cloud, summary.cloud_new, summary.local_only, summary.orphaned
    ));
    formatter.info(&format!(
        "Outdated: {}  Modified: {}  Checkoutable: {}  Checked out by me: {}",
        summary.outdated, summary.modified, summary.checkoutable, summary.checked_out_by_me
    ));
    if !summary.holders.is_empty() {
        let holders: Vec<&str> = summary.holders.iter().map(|h| h.as_str()).collect();
        formatter.info(&format!("Holders: {}", holders.join(", ")));
    }
}
