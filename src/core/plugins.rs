use crate::domain::model::PluginSpec;
use crate::utils::error::{Result, WardenError};
use reqwest::Client;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PluginSyncReport {
    pub downloaded: Vec<String>,
    pub already_present: Vec<String>,
}

impl PluginSyncReport {
    pub fn changed(&self) -> bool {
        !self.downloaded.is_empty()
    }
}

pub fn plugins_dir(home: &Path) -> PathBuf {
    home.join("plugins")
}

/// Update Center 存成 `.jpi`，這裡也一樣
pub fn plugin_file_path(home: &Path, plugin: &PluginSpec) -> PathBuf {
    plugins_dir(home).join(format!("{}.jpi", plugin.name()))
}

pub fn plugin_source_url(mirror: &str, plugin: &PluginSpec) -> String {
    format!(
        "{}/plugins/{}/{}/{}.hpi",
        mirror.trim_end_matches('/'),
        plugin.name(),
        plugin.version(),
        plugin.name()
    )
}

/// Downloads every configured plugin whose file is missing. Existing files
/// are left untouched regardless of version.
pub async fn sync_plugins(
    client: &Client,
    home: &Path,
    mirror: &str,
    plugins: &[PluginSpec],
) -> Result<PluginSyncReport> {
    let mut report = PluginSyncReport::default();
    if plugins.is_empty() {
        return Ok(report);
    }

    tokio::fs::create_dir_all(plugins_dir(home)).await?;

    for plugin in plugins {
        let destination = plugin_file_path(home, plugin);
        if tokio::fs::try_exists(&destination).await? {
            tracing::debug!("📦 plugin {} already present", plugin.name());
            report.already_present.push(plugin.name().to_string());
            continue;
        }

        let source = plugin_source_url(mirror, plugin);
        tracing::info!("⬇️ Downloading plugin {} ({}) from {}", plugin.name(), plugin.version(), source);
        download(client, plugin, &source, &destination).await?;
        report.downloaded.push(plugin.name().to_string());
    }

    Ok(report)
}

async fn download(client: &Client, plugin: &PluginSpec, source: &str, destination: &Path) -> Result<()> {
    let failure = |message: String| WardenError::PluginDownloadError {
        plugin: plugin.name().to_string(),
        url: source.to_string(),
        message,
    };

    let mut response = client
        .get(source)
        .send()
        .await
        .map_err(|e| failure(e.to_string()))?;
    if !response.status().is_success() {
        return Err(failure(format!("mirror answered {}", response.status())));
    }

    // 先寫暫存檔再改名，避免留下半個檔案
    let partial = destination.with_extension("jpi.part");
    let written = async {
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| failure(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok::<_, WardenError>(written)
    }
    .await;

    let written = match written {
        Ok(written) => written,
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                tracing::debug!("could not remove {}: {}", partial.display(), cleanup);
            }
            return Err(e);
        }
    };
    tokio::fs::rename(&partial, destination).await?;

    tracing::debug!("📦 wrote {} bytes to {}", written, destination.display());
    Ok(())
}

/// True when the pid file exists and some plugin archive in `<home>/plugins`
/// was modified after it, i.e. plugins changed since the service last started.
pub fn plugins_newer_than_pid_file(home: &Path, pid_file: &Path) -> Result<bool> {
    let started_at = match std::fs::metadata(pid_file) {
        Ok(metadata) => metadata.modified()?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    let dir = plugins_dir(home);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let path = entry?.path();
        let is_plugin = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("hpi") | Some("jpi")
        );
        if is_plugin && modified(&path)? > started_at {
            tracing::debug!("📦 {} is newer than {}", path.display(), pid_file.display());
            return Ok(true);
        }
    }

    Ok(false)
}

fn modified(path: &Path) -> Result<SystemTime> {
    Ok(std::fs::metadata(path)?.modified()?)
}
