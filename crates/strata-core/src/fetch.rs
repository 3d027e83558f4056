//! Background fetch pool.
//!
//! All provider calls happen on a dedicated thread running a current-thread
//! tokio runtime; the UI side sends commands and drains outcomes from plain
//! mpsc channels on its tick. Results are correlated by node instance id (or
//! an opaque token for open/export), and errors cross the thread boundary as
//! plain message strings.
//!
//! There is no cancellation: an outcome whose node no longer exists is
//! simply discarded by the receiver.

use std::sync::mpsc;
use std::thread;

use crate::content::NodeContent;
use crate::path::NodePath;
use crate::provider::ProviderHandle;

/// Command sent from the UI thread to the pool thread.
pub enum FetchCmd {
    /// Open a provider's resource. Answered with `Opened` carrying the same
    /// token and the provider handle back, so the caller can add the root.
    Open { token: u64, provider: ProviderHandle },
    /// Read node content for a path. `node` is the requesting tree node's
    /// instance id.
    Read {
        node: u64,
        path: NodePath,
        provider: ProviderHandle,
    },
    /// Export the opened resource.
    Export {
        token: u64,
        format: String,
        provider: ProviderHandle,
    },
    /// Release a root's resource. Fire-and-forget from the caller's side.
    Close {
        path: NodePath,
        provider: ProviderHandle,
    },
}

/// Result sent back from the pool thread.
pub enum FetchOutcome {
    Opened {
        token: u64,
        provider: ProviderHandle,
        result: Result<(), String>,
    },
    Content {
        node: u64,
        path: NodePath,
        result: Result<NodeContent, String>,
    },
    Exported {
        token: u64,
        result: Result<Vec<u8>, String>,
    },
    Closed {
        path: NodePath,
        result: Result<(), String>,
    },
}

/// Sender/receiver pair for communicating with the pool thread.
pub struct FetchPool {
    sender: mpsc::Sender<FetchCmd>,
    receiver: mpsc::Receiver<FetchOutcome>,
}

impl FetchPool {
    /// Spawn the pool thread with its own tokio runtime.
    pub fn spawn() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<FetchCmd>();
        let (outcome_tx, outcome_rx) = mpsc::channel::<FetchOutcome>();

        thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to create tokio runtime");

            rt.block_on(async move {
                while let Ok(cmd) = cmd_rx.recv() {
                    let outcome = service(cmd).await;
                    if outcome_tx.send(outcome).is_err() {
                        break; // UI thread dropped the receiver
                    }
                }
            });
        });

        Self {
            sender: cmd_tx,
            receiver: outcome_rx,
        }
    }

    /// A clonable sender for components that issue their own fetches.
    pub fn sender(&self) -> mpsc::Sender<FetchCmd> {
        self.sender.clone()
    }

    /// Send a command (non-blocking).
    pub fn send(&self, cmd: FetchCmd) -> Result<(), mpsc::SendError<FetchCmd>> {
        self.sender.send(cmd)
    }

    /// Try to receive an outcome (non-blocking).
    pub fn try_recv(&self) -> Option<FetchOutcome> {
        self.receiver.try_recv().ok()
    }
}

/// Execute one provider command.
async fn service(cmd: FetchCmd) -> FetchOutcome {
    match cmd {
        FetchCmd::Open { token, provider } => {
            let result = provider.open().map_err(|e| format!("{e:#}"));
            FetchOutcome::Opened {
                token,
                provider,
                result,
            }
        }
        FetchCmd::Read {
            node,
            path,
            provider,
        } => {
            let result = provider.read(&path).map_err(|e| format!("{e:#}"));
            FetchOutcome::Content { node, path, result }
        }
        FetchCmd::Export {
            token,
            format,
            provider,
        } => {
            let result = provider.export(&format).map_err(|e| format!("{e:#}"));
            FetchOutcome::Exported { token, result }
        }
        FetchCmd::Close { path, provider } => {
            let result = provider.close().map_err(|e| format!("{e:#}"));
            if let Err(ref message) = result {
                log::warn!("closing {path} failed: {message}");
            }
            FetchOutcome::Closed { path, result }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::NodeContent;
    use crate::provider::{ensure_owned, DataProvider};
    use anyhow::{bail, Result};
    use std::sync::Arc;
    use std::time::Duration;

    /// Minimal provider: one root with a fixed set of children.
    struct StubProvider {
        root: NodePath,
        fail_reads: bool,
    }

    impl StubProvider {
        fn handle(fail_reads: bool) -> ProviderHandle {
            Arc::new(Self {
                root: NodePath::fresh_root(),
                fail_reads,
            })
        }
    }

    impl DataProvider for StubProvider {
        fn root_path(&self) -> &NodePath {
            &self.root
        }
        fn open(&self) -> Result<()> {
            Ok(())
        }
        fn read(&self, path: &NodePath) -> Result<NodeContent> {
            ensure_owned(&self.root, path)?;
            if self.fail_reads {
                bail!("boom");
            }
            let mut content = NodeContent::named(path.display_name());
            content.children = vec!["a".to_string(), "b".to_string()];
            Ok(content)
        }
        fn export(&self, format: &str) -> Result<Vec<u8>> {
            bail!("unsupported export format: {format}");
        }
        fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn recv(pool: &FetchPool) -> FetchOutcome {
        pool.receiver
            .recv_timeout(Duration::from_secs(5))
            .expect("pool thread did not answer")
    }

    #[test]
    fn test_read_round_trip() {
        let pool = FetchPool::spawn();
        let provider = StubProvider::handle(false);
        let path = provider.root_path().clone();

        pool.send(FetchCmd::Read {
            node: 7,
            path: path.clone(),
            provider,
        })
        .unwrap();

        match recv(&pool) {
            FetchOutcome::Content {
                node,
                path: answered,
                result,
            } => {
                assert_eq!(node, 7);
                assert_eq!(answered, path);
                assert_eq!(result.unwrap().children, vec!["a", "b"]);
            }
            _ => panic!("expected a content outcome"),
        }
    }

    #[test]
    fn test_read_failure_carries_message() {
        let pool = FetchPool::spawn();
        let provider = StubProvider::handle(true);
        let path = provider.root_path().clone();

        pool.send(FetchCmd::Read {
            node: 1,
            path,
            provider,
        })
        .unwrap();

        match recv(&pool) {
            FetchOutcome::Content { result, .. } => {
                assert!(result.unwrap_err().contains("boom"));
            }
            _ => panic!("expected a content outcome"),
        }
    }

    #[test]
    fn test_open_and_export_outcomes() {
        let pool = FetchPool::spawn();
        let provider = StubProvider::handle(false);

        pool.send(FetchCmd::Open {
            token: 3,
            provider: provider.clone(),
        })
        .unwrap();
        match recv(&pool) {
            FetchOutcome::Opened { token, result, .. } => {
                assert_eq!(token, 3);
                assert!(result.is_ok());
            }
            _ => panic!("expected an opened outcome"),
        }

        pool.send(FetchCmd::Export {
            token: 4,
            format: "csv".to_string(),
            provider,
        })
        .unwrap();
        match recv(&pool) {
            FetchOutcome::Exported { token, result } => {
                assert_eq!(token, 4);
                assert!(result.unwrap_err().contains("unsupported"));
            }
            _ => panic!("expected an exported outcome"),
        }
    }
}
