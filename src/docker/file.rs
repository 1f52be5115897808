use super::{exec, ExecTarget};
use crate::error::ExecError;
use cosmwasm_std::Binary;
use tokio_util::sync::CancellationToken;

/**
   Raw bytes written per command. Encoded as base64 this is 48 KiB, well
   below the 128 KiB the kernel allows for a single argument.
*/
pub const WRITE_CHUNK_LEN: usize = 36 * 1024;

/// The `sh -c` scripts that recreate `contents` at `path`, one per chunk.
pub fn write_file_scripts(path: &str, contents: &[u8]) -> Vec<String> {
    let mut scripts = vec![format!("mkdir -p \"$(dirname {path})\" && : > {path}")];

    scripts.extend(contents.chunks(WRITE_CHUNK_LEN).map(|chunk| {
        let encoded = Binary::from(chunk).to_base64();
        format!("echo {encoded} | base64 -d >> {path}")
    }));

    scripts
}

/// Writes `contents` to the absolute `path` inside `target`, appending it in chunks.
pub async fn write_file<T: ExecTarget + ?Sized>(
    target: &T,
    path: &str,
    contents: &[u8],
    cancel: &CancellationToken,
) -> Result<(), ExecError> {
    for script in write_file_scripts(path, contents) {
        exec(target, ["sh".to_owned(), "-c".to_owned(), script], cancel)
            .await?
            .check()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::{exec::tests::ScriptedTarget, ExecResult};

    fn decode_appended(commands: &[Vec<String>]) -> Vec<u8> {
        commands
            .iter()
            .filter_map(|cmd| cmd[2].strip_prefix("echo "))
            .flat_map(|rest| {
                let encoded = rest.split(' ').next().unwrap();
                Binary::from_base64(encoded).unwrap().to_vec()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_large_payload_is_split() {
        let contents = (0..200 * 1024).map(|i| (i % 251) as u8).collect::<Vec<_>>();
        let target = ScriptedTarget::default();

        write_file(&target, "/tmp/home/config/genesis.json", &contents, &CancellationToken::new())
            .await
            .unwrap();

        let commands = target.commands.lock().unwrap();
        assert_eq!(commands.len(), 1 + contents.len().div_ceil(WRITE_CHUNK_LEN));
        assert!(commands.iter().all(|cmd| cmd[2].len() < 64 * 1024));
        assert_eq!(commands[0][2], "mkdir -p \"$(dirname /tmp/home/config/genesis.json)\" && : > /tmp/home/config/genesis.json");
        assert!(commands[1..].iter().all(|cmd| cmd[2].ends_with(">> /tmp/home/config/genesis.json")));
        assert_eq!(decode_appended(&commands), contents);
    }

    #[tokio::test]
    async fn test_empty_file_is_truncated() {
        let target = ScriptedTarget::default();

        write_file(&target, "/tmp/empty", &[], &CancellationToken::new())
            .await
            .unwrap();

        let commands = target.commands.lock().unwrap();
        assert_eq!(commands.len(), 1);
        assert!(commands[0][2].ends_with(": > /tmp/empty"));
    }

    #[tokio::test]
    async fn test_failed_chunk_is_reported() {
        let target = ScriptedTarget {
            reply: ExecResult {
                stderr: b"No space left on device".to_vec(),
                exit_code: 1,
                ..Default::default()
            },
            ..Default::default()
        };

        let res = write_file(&target, "/tmp/full", b"data", &CancellationToken::new()).await;

        assert!(matches!(res, Err(ExecError::NonZeroExit { code: 1, .. })));
        assert_eq!(target.commands.lock().unwrap().len(), 1);
    }
}
