use tokio::runtime::Handle;
use tokio::sync::oneshot;

/// A waiter's place in the replay order of one refresh cycle.
///
/// Waiters of a cycle wake on whatever worker thread is free, so wake-up
/// order says nothing about send order. Each turn is chained to the one
/// before it: a replay waits for its predecessor to hand over, and hands
/// over to its successor once its own request has reached the executor.
///
/// Dropping a turn hands over as well, so a caller that gives up or never
/// replays (failed refresh) does not stall the queue. A turn dropped before
/// it came up keeps its place: the handover is forwarded only once its
/// predecessor has handed over.
#[derive(Debug, Default)]
pub struct ReplayTurn {
    after: Option<oneshot::Receiver<()>>,
    next: Option<oneshot::Sender<()>>,
}

impl ReplayTurn {
    /// Chain of `len` turns, first one free to go.
    pub(crate) fn chain(len: usize) -> Vec<Self> {
        let mut turns = Vec::with_capacity(len);
        let mut after = None;
        for _ in 0..len {
            let (next, rx) = oneshot::channel();
            turns.push(Self { after: after.take(), next: Some(next) });
            after = Some(rx);
        }
        turns
    }

    /// Resolve once every earlier waiter has sent its replay or given up.
    ///
    /// Cancel safe: a dropped `wait` leaves the turn still waiting.
    pub async fn wait(&mut self) {
        if let Some(after) = self.after.as_mut() {
            // A dropped sender is a predecessor that handed over by leaving.
            let _ = after.await;
            self.after = None;
        }
    }

    /// Let the next waiter go.
    pub fn pass(mut self) {
        self.hand_over();
    }

    fn hand_over(&mut self) {
        let Some(next) = self.next.take() else {
            return;
        };
        match (self.after.take(), Handle::try_current()) {
            (Some(after), Ok(runtime)) => {
                runtime.spawn(async move {
                    let _ = after.await;
                    let _ = next.send(());
                });
            }
            _ => {
                let _ = next.send(());
            }
        }
    }
}

impl Drop for ReplayTurn {
    fn drop(&mut self) {
        self.hand_over();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_turn_is_free() {
        let mut turns = ReplayTurn::chain(2);
        turns.remove(0).wait().await;
    }

    #[tokio::test]
    async fn later_turn_waits_for_pass() {
        let mut turns = ReplayTurn::chain(2).into_iter();
        let first = turns.next().unwrap();
        let mut second = turns.next().unwrap();

        let mut waiting = tokio_test::task::spawn(second.wait());
        assert!(waiting.poll().is_pending());

        first.pass();
        assert!(waiting.is_woken());
        assert!(waiting.poll().is_ready());
    }

    #[tokio::test]
    async fn dropped_turn_hands_over() {
        let mut turns = ReplayTurn::chain(2).into_iter();
        let mut first = turns.next().unwrap();
        let mut second = turns.next().unwrap();

        first.wait().await;
        drop(first);
        second.wait().await;
    }

    #[tokio::test]
    async fn abandoned_turn_keeps_its_place() {
        let mut turns = ReplayTurn::chain(3).into_iter();
        let first = turns.next().unwrap();
        let second = turns.next().unwrap();
        let mut third = turns.next().unwrap();

        drop(second);
        tokio::task::yield_now().await;
        {
            let mut waiting = tokio_test::task::spawn(third.wait());
            assert!(waiting.poll().is_pending());
        }

        first.pass();
        third.wait().await;
    }
}
