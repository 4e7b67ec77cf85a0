use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use arena_core::Address;

use super::{LedgerClient, LedgerError, LedgerWrite, Receipt, SubmitOptions};

/// Ledger adapter that runs an external task runner, one task per operation.
///
/// The configured prefix (e.g. `npx hardhat --network altlayer`) is followed by a task
/// name and its flags. A task signals failure with a non-zero exit status; its stdout is
/// the answer.
#[derive(Debug, Clone)]
pub struct CommandLedger {
    program: String,
    base_args: Vec<String>,
}

impl CommandLedger {
    pub fn new(program: impl Into<String>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }

    /// Build from a whitespace-separated command line. Returns `None` for a blank line.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    async fn run(&self, task: &str, args: &[String]) -> Result<String, LedgerError> {
        let rendered = format!("{} {} {}", self.program, task, args.join(" "));
        debug!(command = %rendered.trim_end(), "running ledger task");

        let output = Command::new(&self.program)
            .args(&self.base_args)
            .arg(task)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| LedgerError::Transport(format!("spawn {}: {e}", self.program)))?;

        if !output.status.success() {
            return Err(LedgerError::Command {
                command: task.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout)
            .map_err(|e| LedgerError::Malformed(format!("{task}: non-utf8 output: {e}")))
    }
}

fn submit_args(write: &LedgerWrite, nonce: Option<u64>, options: SubmitOptions) -> (&'static str, Vec<String>) {
    let (task, mut args) = match write {
        LedgerWrite::Register { address } => (
            "whitelist:register",
            vec!["--address".to_string(), address.to_string()],
        ),
        LedgerWrite::RegisterMany { addresses } => (
            "whitelist:register:batch",
            vec![
                "--addresses".to_string(),
                addresses.iter().map(Address::as_str).collect::<Vec<_>>().join(","),
                "--batch-size".to_string(),
                addresses.len().to_string(),
            ],
        ),
        LedgerWrite::Transfer { to, amount } => (
            "wallet:send",
            vec![
                "--to".to_string(),
                to.to_string(),
                "--value-wei".to_string(),
                amount.get().to_string(),
            ],
        ),
    };

    if let Some(n) = nonce {
        args.push("--nonce".to_string());
        args.push(n.to_string());
    }
    args.push("--dry".to_string());
    args.push(options.dry_run.to_string());

    (task, args)
}

/// Find a `0x`-prefixed 64 hex digit transaction hash anywhere in task output.
fn find_tx_ref(stdout: &str) -> Option<String> {
    stdout
        .split(|c: char| c.is_whitespace() || c == ',' || c == ':')
        .find(|tok| {
            tok.len() == 66
                && tok.starts_with("0x")
                && tok[2..].chars().all(|c| c.is_ascii_hexdigit())
        })
        .map(str::to_string)
}

/// Interpret a membership answer: `true`/`false`, or the legacy "is NOT whitelisted" phrase.
fn parse_membership(stdout: &str) -> Result<bool, LedgerError> {
    let last = stdout.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    match last {
        "true" => Ok(true),
        "false" => Ok(false),
        other if other.contains(" is NOT ") => Ok(false),
        other if other.contains(" is whitelisted") => Ok(true),
        other => Err(LedgerError::Malformed(format!("membership answer '{other}'"))),
    }
}

#[async_trait]
impl LedgerClient for CommandLedger {
    async fn resume_event(&self) -> Result<(), LedgerError> {
        self.run("game:resume", &[]).await.map(|_| ())
    }

    async fn pause_event(&self) -> Result<(), LedgerError> {
        self.run("game:pause", &[]).await.map(|_| ())
    }

    async fn fetch_standings(&self) -> Result<String, LedgerError> {
        self.run("alt:get-player-scores", &["--stdout".to_string()]).await
    }

    async fn next_nonce(&self) -> Result<u64, LedgerError> {
        let out = self.run("ledger:nonce", &[]).await?;
        out.trim()
            .parse()
            .map_err(|e| LedgerError::Malformed(format!("nonce '{}': {e}", out.trim())))
    }

    async fn is_registered(&self, address: &Address) -> Result<bool, LedgerError> {
        let out = self
            .run("whitelist:exists", &["--address".to_string(), address.to_string()])
            .await?;
        parse_membership(&out)
    }

    async fn submit(
        &self,
        write: &LedgerWrite,
        nonce: Option<u64>,
        options: SubmitOptions,
    ) -> Result<Receipt, LedgerError> {
        let (task, args) = submit_args(write, nonce, options);
        let out = self.run(task, &args).await?;
        Ok(Receipt {
            nonce,
            tx_ref: find_tx_ref(&out),
            dry_run: options.dry_run,
        })
    }
}
