/*!
   Docker plumbing: networks, container start up and command execution.
*/

use rand::Rng;
use std::env;
use testcontainers::{
    core::IntoContainerPort,
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt, TestcontainersError,
};
use tracing::{debug, info};

pub mod exec;
pub mod file;

pub use exec::{exec, ExecResult, ExecTarget};
pub use file::write_file;

/// A running container.
pub type Container = ContainerAsync<GenericImage>;

/// Prefix of every network created by the harness.
pub const NETWORK_PREFIX: &str = "interchaintest";

/// Environment variable read by testcontainers when dropping containers.
pub const TESTCONTAINERS_COMMAND_ENV: &str = "TESTCONTAINERS_COMMAND";

/// Returns `n` random lowercase ASCII letters.
pub fn rand_lower_case_letters(n: usize) -> String {
    let mut rng = rand::thread_rng();

    (0..n).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

/// A fresh network name, `interchaintest-<8 random letters>`.
pub fn random_network_name() -> String {
    format!("{NETWORK_PREFIX}-{}", rand_lower_case_letters(8))
}

/// The name of the `idx`th container with `role` of a chain on `network`.
pub fn container_name(network: &str, chain_name: &str, role: &str, idx: usize) -> String {
    format!("{network}-{chain_name}-{role}-{idx}")
}

/// Tells testcontainers to leave containers running once they are dropped.
pub fn keep_containers() {
    info!("containers will be kept after the tests finish");

    env::set_var(TESTCONTAINERS_COMMAND_ENV, "keep");
}

/// How to start a long lived container that commands are exec'd into.
#[derive(Debug, Clone, Default)]
pub struct ContainerOptions {
    pub image: String,
    pub tag: String,
    pub name: String,
    pub network: String,
    pub exposed_ports: Vec<u16>,
    pub env: Vec<(String, String)>,
}

/**
   Starts a container that idles until commands are exec'd into it.

   The image's entrypoint is replaced so that nothing runs until the caller
   starts it explicitly.
*/
pub async fn start_container(opts: ContainerOptions) -> Result<Container, TestcontainersError> {
    debug!(
        "starting container {} from {}:{} on {}",
        opts.name, opts.image, opts.tag, opts.network
    );

    let mut image = GenericImage::new(opts.image, opts.tag).with_entrypoint("sleep");
    for port in opts.exposed_ports.iter().copied() {
        image = image.with_exposed_port(port.tcp());
    }

    let mut request = image
        .with_cmd(["infinity"])
        .with_network(opts.network)
        .with_container_name(opts.name);
    for (key, val) in opts.env {
        request = request.with_env_var(key, val);
    }

    request.start().await
}

/// The address of a port of `container` mapped onto the host.
pub async fn host_address(container: &Container, port: u16) -> Result<String, TestcontainersError> {
    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(port.tcp()).await?;

    Ok(format!("{host}:{port}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_network_name() {
        let name = random_network_name();
        let suffix = name.strip_prefix("interchaintest-").unwrap();

        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase()));
        assert_ne!(random_network_name(), random_network_name());
    }

    #[test]
    fn test_container_name() {
        assert_eq!(
            container_name("interchaintest-abcdefgh", "simapp-a", "val", 0),
            "interchaintest-abcdefgh-simapp-a-val-0"
        );
    }
}
