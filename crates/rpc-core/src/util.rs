//! Small ambient utilities (§10.3.2). Grounded on
//! `dao.common.utils.run_sh`: run a subprocess, capture its output, and
//! map a nonzero exit code into the same error taxonomy as everything
//! else so a dispatched handler that shells out can propagate failures
//! over RPC like any other error.

use crate::error::RpcError;
use tokio::process::Command;

/// Run `program` with `args`, waiting for it to exit. On a nonzero exit
/// code, returns `RpcError::ExecError` carrying the captured output.
pub async fn run_sh(program: &str, args: &[&str]) -> Result<String, RpcError> {
    tracing::debug!(program, ?args, "run_sh: spawning subprocess");

    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| RpcError::Generic(format!("failed to spawn {program}: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if output.status.success() {
        Ok(stdout)
    } else {
        let return_code = output.status.code().unwrap_or(-1);
        tracing::info!(program, return_code, %stderr, "run_sh: subprocess failed");
        Err(RpcError::ExecError {
            return_code,
            stdout,
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_on_success() {
        let out = run_sh("echo", &["hello"]).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn maps_nonzero_exit_to_exec_error() {
        let err = run_sh("sh", &["-c", "exit 3"]).await.unwrap_err();
        match err {
            RpcError::ExecError { return_code, .. } => assert_eq!(return_code, 3),
            other => panic!("expected ExecError, got {other:?}"),
        }
    }
}
