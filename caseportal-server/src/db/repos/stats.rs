//! Aggregate counts for the admin dashboard

use serde::Serialize;
use sqlx::PgPool;

use super::DbError;
use crate::models::CaseStatus;

/// Case counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub in_progress: i64,
    pub resolved: i64,
    pub closed: i64,
}

impl StatusCounts {
    fn add(&mut self, status: CaseStatus, n: i64) {
        match status {
            CaseStatus::Pending => self.pending += n,
            CaseStatus::InProgress => self.in_progress += n,
            CaseStatus::Resolved => self.resolved += n,
            CaseStatus::Closed => self.closed += n,
        }
    }

    pub fn total(&self) -> i64 {
        self.pending + self.in_progress + self.resolved + self.closed
    }
}

/// Dashboard totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminStats {
    pub total_users: i64,
    pub total_cases: i64,
    pub cases_by_status: StatusCounts,
}

pub struct StatsRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> StatsRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn summary(&self) -> Result<AdminStats, DbError> {
        let (total_users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM profiles")
            .fetch_one(self.pool)
            .await?;

        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM cases GROUP BY status")
                .fetch_all(self.pool)
                .await?;

        let mut counts = StatusCounts::default();
        for (status, n) in rows {
            let status: CaseStatus = status.parse().map_err(|e| DbError::decode("case", e))?;
            counts.add(status, n);
        }

        Ok(AdminStats {
            total_users,
            total_cases: counts.total(),
            cases_by_status: counts,
        })
    }
}
