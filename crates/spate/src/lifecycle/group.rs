//! Parallel start, concurrent stop of a fixed set of lifecycle entities.
//! Grounded on `startstopper.Group`: start sequentially and abort without
//! stopping already-started members if any fails; stop all concurrently
//! and bundle the errors.

use super::{Error, Lifecycle};
use std::sync::Arc;

pub struct Group {
    members: Vec<Arc<Lifecycle>>,
}

impl Group {
    pub fn new(members: Vec<Arc<Lifecycle>>) -> Self {
        Self { members }
    }

    /// Start every member in order. On the first failure, the remaining
    /// members are left unstarted and the bundled errors (one per failed
    /// start) are returned.
    pub async fn start(&self) -> Result<(), Vec<Error>> {
        let mut errors = Vec::new();
        for member in &self.members {
            if let Err(e) = member.start().await {
                errors.push(e);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Stop every member concurrently, bundling any errors in member order.
    pub async fn stop(&self) -> Result<(), Vec<Error>> {
        let futures = self.members.iter().map(|m| {
            let m = m.clone();
            async move { m.stop().await }
        });
        let results = futures_util::future::join_all(futures).await;
        let errors: Vec<Error> = results.into_iter().filter_map(Result::err).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Runner;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting_runner(counter: Arc<AtomicU32>) -> Runner {
        Box::new(move |cancel| {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                cancel.cancelled().await;
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn start_and_stop_all_members() {
        let counter = Arc::new(AtomicU32::new(0));
        let members: Vec<_> = (0..3)
            .map(|_| Lifecycle::new(counting_runner(counter.clone())))
            .collect();
        let group = Group::new(members);

        group.start().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        group.stop().await.unwrap();
    }

    #[tokio::test]
    async fn double_start_of_group_member_is_bundled() {
        let counter = Arc::new(AtomicU32::new(0));
        let a = Lifecycle::new(counting_runner(counter.clone()));
        a.start().await.unwrap();
        let group = Group::new(vec![a]);

        let err = group.start().await.unwrap_err();
        assert_eq!(err, vec![Error::AlreadyStarted]);
        group.stop().await.unwrap();
    }
}
