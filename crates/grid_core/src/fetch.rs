use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;
use shared::protocol::{FetchParams, FetchResult};

/// The remote data source. Implementations must return rows already sliced to
/// the requested window and a total for the whole matching set.
#[async_trait]
pub trait FetchAction<R>: Send + Sync {
    async fn fetch(&self, params: FetchParams) -> Result<FetchResult<R>>;
}

#[async_trait]
impl<R, F, Fut> FetchAction<R> for F
where
    R: Send + 'static,
    F: Fn(FetchParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FetchResult<R>>> + Send + 'static,
{
    async fn fetch(&self, params: FetchParams) -> Result<FetchResult<R>> {
        (self)(params).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

impl FetchTicket {
    pub fn seq(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// A later fetch was issued before this one resolved.
    Discarded,
}

/// Hands out increasing tickets; only the most recently issued ticket may
/// apply its result.
#[derive(Debug, Default)]
pub struct FetchSequencer {
    issued: u64,
}

impl FetchSequencer {
    pub fn issue(&mut self) -> FetchTicket {
        self.issued += 1;
        FetchTicket(self.issued)
    }

    pub fn is_latest(&self, ticket: FetchTicket) -> bool {
        ticket.0 == self.issued
    }

    pub fn issued(&self) -> u64 {
        self.issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_latest_ticket_is_current() {
        let mut seq = FetchSequencer::default();
        let first = seq.issue();
        assert!(seq.is_latest(first));

        let second = seq.issue();
        assert!(!seq.is_latest(first));
        assert!(seq.is_latest(second));
        assert!(first < second);
        assert_eq!(seq.issued(), 2);
    }

    #[tokio::test]
    async fn closures_act_as_fetch_actions() {
        let action = |params: FetchParams| async move {
            Ok::<_, anyhow::Error>(FetchResult::new(
                vec![params.offset; params.limit as usize],
                100,
            ))
        };
        let params = FetchParams {
            offset: 6,
            limit: 3,
            sort: None,
        };
        let page = <_ as FetchAction<u64>>::fetch(&action, params)
            .await
            .expect("fetch");
        assert_eq!(page.rows, vec![6, 6, 6]);
        assert_eq!(page.total, 100);
    }
}
