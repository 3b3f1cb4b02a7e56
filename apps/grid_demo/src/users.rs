//! In-process stand-in for a remote users endpoint.

use std::{cmp::Ordering, sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use grid_core::FetchAction;
use serde::Serialize;
use shared::{
    domain::{ColumnSpec, SortDirection, Sorting},
    protocol::{FetchParams, FetchResult},
};

pub const DEMO_USER_COUNT: usize = 444;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemoUser {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub balance: i64,
    pub registered_at: DateTime<Utc>,
    pub trial_days: u32,
}

pub fn generate_users(count: usize) -> Vec<DemoUser> {
    let epoch = Utc
        .with_ymd_and_hms(2023, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default();
    (1..=count as u64)
        .map(|id| DemoUser {
            id,
            name: format!("User N-{id}"),
            email: format!("test{id}@test.domain"),
            balance: ((id * 7919) % 100_000) as i64,
            registered_at: epoch + chrono::Duration::minutes((id * 2213) as i64),
            trial_days: ((id % 4) * 7) as u32,
        })
        .collect()
}

pub fn user_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("id", "ID").width(60),
        ColumnSpec::new("name", "Name"),
        ColumnSpec::new("email", "Email").sorting_disabled(true),
        ColumnSpec::new("balance", "Balance"),
        ColumnSpec::new("registered_at", "Registered"),
        ColumnSpec::new("trial_days", "Trial"),
    ]
}

#[derive(Clone)]
pub struct UserDirectory {
    users: Arc<Vec<DemoUser>>,
    latency: Duration,
}

impl UserDirectory {
    pub fn new(users: Vec<DemoUser>, latency: Duration) -> Self {
        Self {
            users: Arc::new(users),
            latency,
        }
    }

    fn compare(a: &DemoUser, b: &DemoUser, sort: &[Sorting]) -> Ordering {
        for key in sort {
            let ordering = match key.column_name.as_str() {
                "id" => a.id.cmp(&b.id),
                "name" => a.name.cmp(&b.name),
                "email" => a.email.cmp(&b.email),
                "balance" => a.balance.cmp(&b.balance),
                "registered_at" => a.registered_at.cmp(&b.registered_at),
                "trial_days" => a.trial_days.cmp(&b.trial_days),
                _ => Ordering::Equal,
            };
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

#[async_trait]
impl FetchAction<DemoUser> for UserDirectory {
    async fn fetch(&self, params: FetchParams) -> Result<FetchResult<DemoUser>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut matching: Vec<&DemoUser> = self.users.iter().collect();
        if let Some(sort) = params.sort.as_deref().filter(|s| !s.is_empty()) {
            matching.sort_by(|a, b| Self::compare(a, b, sort));
        }

        let total = matching.len() as u64;
        let rows = matching
            .into_iter()
            .skip(usize::try_from(params.offset).unwrap_or(usize::MAX))
            .take(params.limit as usize)
            .cloned()
            .collect();
        Ok(FetchResult::new(rows, total))
    }
}
