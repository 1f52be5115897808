/*!
   Container logs and config files written to disk after a test, so that
   failures can be investigated once the containers are gone.

   The layout is `<root>/<test>/<container>/<container>.log`, with the
   files listed by each [`DiagnosticSource`] next to the log.
*/

use crate::{
    chain::{Chain, ChainNode},
    docker::{exec, Container, ExecTarget},
    error::Error,
    relayer::{config::HERMES_CONFIG_PATH, rly, Relayer, RelayerKind},
};
use async_trait::async_trait;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Directory diagnostics are written to, relative to the working directory.
pub const DIAGNOSTICS_DIR: &str = "diagnostics";

/// Where the genesis debug export goes unless configured otherwise.
pub const DEFAULT_GENESIS_EXPORT_PATH: &str = "diagnostics/genesis.json";

/// Something whose logs and files are worth keeping.
#[async_trait]
pub trait DiagnosticSource: ExecTarget {
    /// The container's stdout followed by its stderr.
    async fn logs(&self) -> Result<Vec<u8>, Error>;

    /// Absolute paths of files inside the container to copy.
    fn diagnostic_files(&self) -> Vec<String>;
}

async fn container_logs(container: &Container) -> Result<Vec<u8>, Error> {
    let mut logs = container.stdout_to_vec().await?;
    logs.extend(container.stderr_to_vec().await?);

    Ok(logs)
}

#[async_trait]
impl DiagnosticSource for ChainNode {
    async fn logs(&self) -> Result<Vec<u8>, Error> {
        container_logs(self.container()).await
    }

    fn diagnostic_files(&self) -> Vec<String> {
        ["genesis.json", "app.toml", "config.toml", "client.toml"]
            .iter()
            .map(|file| format!("{}/config/{file}", self.home()))
            .collect()
    }
}

#[async_trait]
impl DiagnosticSource for Relayer {
    async fn logs(&self) -> Result<Vec<u8>, Error> {
        container_logs(self.container()).await
    }

    fn diagnostic_files(&self) -> Vec<String> {
        match self.kind() {
            RelayerKind::Hermes => vec![HERMES_CONFIG_PATH.to_owned()],
            RelayerKind::Rly => vec![format!("{}/config/config.yaml", rly::HOME)],
        }
    }
}

/// Test names may contain `/` for sub tests.
fn dir_name(name: &str) -> String {
    name.replace(['/', ' '], "_")
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/**
   Writes the logs and files of every source under `root/<test_name>`.

   Failures are logged and skipped so that one broken container does not
   hide the diagnostics of the others.
*/
pub async fn collect(root: &Path, test_name: &str, sources: &[&dyn DiagnosticSource]) -> Result<PathBuf, Error> {
    let test_dir = root.join(dir_name(test_name));
    fs::create_dir_all(&test_dir)?;

    info!("writing diagnostics for {test_name} to {}", test_dir.display());

    let cancel = CancellationToken::new();

    for source in sources {
        let name = dir_name(source.name());
        let container_dir = test_dir.join(&name);
        if let Err(err) = fs::create_dir_all(&container_dir) {
            warn!("failed creating diagnostics directory for {name}: {err}");
            continue;
        }

        match source.logs().await {
            Ok(logs) => {
                if let Err(err) = fs::write(container_dir.join(format!("{name}.log")), logs) {
                    warn!("failed writing logs of {name}: {err}");
                }
            }
            Err(err) => warn!("failed reading logs of {name}: {err}"),
        }

        for path in source.diagnostic_files() {
            let contents = match exec(*source, ["cat", path.as_str()], &cancel).await {
                Ok(res) if res.success() => res.stdout,
                Ok(res) => {
                    warn!("failed reading {path} in {name}: {}", res.stderr_str().trim());
                    continue;
                }
                Err(err) => {
                    warn!("failed reading {path} in {name}: {err}");
                    continue;
                }
            };

            if let Err(err) = fs::write(container_dir.join(file_name(&path)), contents) {
                warn!("failed writing {path} of {name}: {err}");
            }
        }
    }

    Ok(test_dir)
}

/// Writes the genesis file of `chain`'s first node to `export_path`.
pub async fn export_genesis(chain: &Chain, export_path: &Path) -> Result<(), Error> {
    let node = chain
        .nodes()
        .first()
        .ok_or_else(|| Error::UnrecognizedChain(chain.name().to_owned()))?;
    let genesis = node.read_file("config/genesis.json").await?;

    if let Some(parent) = export_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(export_path, genesis)?;

    info!("exported genesis of {} to {}", chain.chain_id(), export_path.display());

    Ok(())
}
