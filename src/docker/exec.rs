use super::Container;
use crate::error::ExecError;
use async_trait::async_trait;
use testcontainers::core::{CmdWaitFor, ExecCommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// The output of a command run inside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i64,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Turns a non-zero exit code into an error carrying stderr.
    pub fn check(self) -> Result<Self, ExecError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ExecError::NonZeroExit {
                code: self.exit_code,
                stderr: self.stderr_str().trim().to_owned(),
            })
        }
    }
}

/// Something commands can be executed in.
#[async_trait]
pub trait ExecTarget: Send + Sync {
    /// A name used in logs.
    fn name(&self) -> &str;

    /// Runs `cmd` to completion and collects its output.
    async fn exec_raw(&self, cmd: Vec<String>) -> Result<ExecResult, ExecError>;
}

fn runtime_error(err: impl ToString) -> ExecError {
    ExecError::Runtime(err.to_string())
}

/// Lets the future returned by testcontainers' `ExecResult::exit_code` be
/// held across an await in a `Send` future. That future borrows the
/// `ExecResult`, which is not `Sync` only because of its stdout/stderr
/// streams; `exit_code` never touches them.
struct AssertSend<F>(F);

// SAFETY: the wrapped future only reads the exec's client and id, both of
// which are `Send + Sync`, and the borrowed `ExecResult` is owned by the same
// enclosing future, so it is never accessed from two threads at once.
unsafe impl<F> Send for AssertSend<F> {}

impl<F: std::future::Future> std::future::Future for AssertSend<F> {
    type Output = F::Output;

    fn poll(self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Self::Output> {
        // SAFETY: structural pinning; the inner future is never moved out.
        unsafe { self.map_unchecked_mut(|s| &mut s.0) }.poll(cx)
    }
}

#[async_trait]
impl ExecTarget for Container {
    fn name(&self) -> &str {
        self.id()
    }

    async fn exec_raw(&self, cmd: Vec<String>) -> Result<ExecResult, ExecError> {
        let mut res = self
            .exec(ExecCommand::new(cmd).with_cmd_ready_condition(CmdWaitFor::exit()))
            .await
            .map_err(runtime_error)?;

        let stdout = res.stdout_to_vec().await.map_err(runtime_error)?;
        let stderr = res.stderr_to_vec().await.map_err(runtime_error)?;
        let exit_code = AssertSend(res.exit_code())
            .await
            .map_err(runtime_error)?
            .ok_or(ExecError::MissingExitCode)?;

        Ok(ExecResult {
            stdout,
            stderr,
            exit_code,
        })
    }
}

/**
   Executes `cmd` in `target`, returning its separated output and exit code.

   A non-zero exit code is not an error here, see [`ExecResult::check`]. If
   `cancel` fires before the command finishes, output collection is
   abandoned and [`ExecError::Cancelled`] is returned.
*/
pub async fn exec<T, I, S>(target: &T, cmd: I, cancel: &CancellationToken) -> Result<ExecResult, ExecError>
where
    T: ExecTarget + ?Sized,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let cmd = cmd.into_iter().map(Into::into).collect::<Vec<String>>();

    debug!(
        "executing command in {}: {}",
        target.name(),
        itertools::join(&cmd, " ")
    );

    let res = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ExecError::Cancelled),
        res = target.exec_raw(cmd) => res?,
    };

    trace!(
        "command exited with code {}, stdout: {}, stderr: {}",
        res.exit_code,
        res.stdout_str(),
        res.stderr_str()
    );

    Ok(res)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::{
        sync::Mutex,
        time::{Duration, Instant},
    };

    /// Replies to every command with fixed output, recording the commands.
    #[derive(Default)]
    pub(crate) struct ScriptedTarget {
        pub reply: ExecResult,
        pub commands: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl ExecTarget for ScriptedTarget {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn exec_raw(&self, cmd: Vec<String>) -> Result<ExecResult, ExecError> {
            self.commands.lock().unwrap().push(cmd);
            Ok(self.reply.clone())
        }
    }

    /// Never finishes.
    struct HangingTarget;

    #[async_trait]
    impl ExecTarget for HangingTarget {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn exec_raw(&self, _cmd: Vec<String>) -> Result<ExecResult, ExecError> {
            std::future::pending().await
        }
    }

    struct FailingTarget;

    #[async_trait]
    impl ExecTarget for FailingTarget {
        fn name(&self) -> &str {
            "failing"
        }

        async fn exec_raw(&self, _cmd: Vec<String>) -> Result<ExecResult, ExecError> {
            Err(ExecError::Runtime("no such container".to_owned()))
        }
    }

    #[tokio::test]
    async fn test_exec_separates_streams() {
        let target = ScriptedTarget {
            reply: ExecResult {
                stdout: b"out\n".to_vec(),
                stderr: b"err\n".to_vec(),
                exit_code: 3,
            },
            ..Default::default()
        };

        let res = exec(&target, ["sh", "-c", "echo out; echo err >&2; exit 3"], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(res.stdout_str(), "out\n");
        assert_eq!(res.stderr_str(), "err\n");
        assert_eq!(res.exit_code, 3);
        assert_eq!(
            target.commands.lock().unwrap()[0],
            vec!["sh", "-c", "echo out; echo err >&2; exit 3"]
        );
    }

    #[tokio::test]
    async fn test_check_reports_stderr() {
        let res = ExecResult {
            stderr: b"  key not found \n".to_vec(),
            exit_code: 1,
            ..Default::default()
        };

        match res.check() {
            Err(ExecError::NonZeroExit { code, stderr }) => {
                assert_eq!(code, 1);
                assert_eq!(stderr, "key not found");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_exec_returns_promptly() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let res = tokio::time::timeout(Duration::from_secs(5), exec(&HangingTarget, ["sleep", "3600"], &cancel))
            .await
            .expect("exec did not observe cancellation");

        assert!(matches!(res, Err(ExecError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let target = ScriptedTarget::default();
        let res = exec(&target, ["true"], &cancel).await;

        assert!(matches!(res, Err(ExecError::Cancelled)));
        assert!(target.commands.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_runtime_errors_surface() {
        let res = exec(&FailingTarget, ["true"], &CancellationToken::new()).await;

        assert!(matches!(res, Err(ExecError::Runtime(msg)) if msg == "no such container"));
    }
}
