// Commit Gate - one-shot pause/resume signal for the edit protocol

use tokio::sync::oneshot;

/// Engine side of the gate, passed into `edit_order`
///
/// Its presence means "pause before commit".
pub struct CommitGate {
    reached: oneshot::Sender<()>,
    resume: oneshot::Receiver<()>,
}

/// The resume signal was dropped without being sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateAbandoned;

impl std::fmt::Display for GateAbandoned {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "commit gate dropped without a resume signal")
    }
}

impl CommitGate {
    /// Announce the pause, then wait for the resume signal
    ///
    /// No timeout: the wait lasts as long as the handle lives.
    pub async fn hold(self) -> Result<(), GateAbandoned> {
        // The handle may not be watching for the pause; that is fine
        let _ = self.reached.send(());
        self.resume.await.map_err(|_| GateAbandoned)
    }
}

/// Caller side of the gate
pub struct CommitGateHandle {
    reached: Option<oneshot::Receiver<()>>,
    resume: oneshot::Sender<()>,
}

impl CommitGateHandle {
    /// Wait until the engine is paused with its updates issued
    ///
    /// Returns false when the edit ended (failed) before reaching the pause.
    pub async fn paused(&mut self) -> bool {
        match self.reached.take() {
            Some(rx) => rx.await.is_ok(),
            None => true,
        }
    }

    /// Let the engine proceed to commit
    pub fn resume(self) {
        let _ = self.resume.send(());
    }
}

/// Create a commit gate
pub fn commit_gate() -> (CommitGate, CommitGateHandle) {
    let (reached_tx, reached_rx) = oneshot::channel();
    let (resume_tx, resume_rx) = oneshot::channel();
    (
        CommitGate {
            reached: reached_tx,
            resume: resume_rx,
        },
        CommitGateHandle {
            reached: Some(reached_rx),
            resume: resume_tx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_hold_until_resume() {
        let (gate, mut handle) = commit_gate();
        let held = tokio::spawn(gate.hold());

        assert!(handle.paused().await);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!held.is_finished());

        handle.resume();
        assert_eq!(held.await.unwrap(), Ok(()));
    }

    #[test]
    fn test_hold_is_pending_until_resume() {
        let (gate, handle) = commit_gate();
        let mut hold = tokio_test::task::spawn(gate.hold());

        tokio_test::assert_pending!(hold.poll());

        handle.resume();
        assert!(hold.is_woken());
        tokio_test::assert_ready_eq!(hold.poll(), Ok(()));
    }

    #[tokio::test]
    async fn test_dropped_handle_abandons_gate() {
        let (gate, handle) = commit_gate();
        drop(handle);
        assert_eq!(gate.hold().await, Err(GateAbandoned));
    }

    #[tokio::test]
    async fn test_paused_false_when_gate_dropped_unused() {
        let (gate, mut handle) = commit_gate();
        drop(gate);
        assert!(!handle.paused().await);
    }
}
