use super::streak::current_streak;
use crate::backend::{OrderBy, QueryBackend, RowFilter, Select, TableWriter};
use crate::config::FeedConfig;
use crate::core::{Result, Row, UserId, parse_timestamp};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::{Level, event};
use uuid::Uuid;

/// One entry of the check-in log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkin {
    pub id: Uuid,
    pub user_id: UserId,
    pub at: DateTime<Utc>,
}

impl Checkin {
    fn to_row(&self, config: &FeedConfig) -> Row {
        let mut row = Row::new();
        row.insert("id".to_string(), Value::from(self.id.to_string()));
        row.insert(config.key_column.clone(), Value::from(self.user_id.as_str()));
        row.insert(
            config.checkin_time_column.clone(),
            Value::from(self.at.to_rfc3339()),
        );
        row
    }
}

/// Append a check-in for `user` at `at`
pub async fn record_checkin<B>(
    backend: &B,
    config: &FeedConfig,
    user: &UserId,
    at: DateTime<Utc>,
) -> Result<Checkin>
where
    B: TableWriter + ?Sized,
{
    let checkin = Checkin {
        id: Uuid::new_v4(),
        user_id: user.clone(),
        at,
    };
    backend
        .insert_row(&config.checkins_table, checkin.to_row(config))
        .await?;
    event!(Level::INFO, user = %user, id = %checkin.id, "check-in recorded");
    Ok(checkin)
}

/// Check-in times for `user`, most recent first.
///
/// Rows whose time cannot be read are skipped.
pub async fn load_checkins<B>(
    backend: &B,
    config: &FeedConfig,
    user: &UserId,
) -> Result<Vec<DateTime<Utc>>>
where
    B: QueryBackend + ?Sized,
{
    let query = Select::from_table(&config.checkins_table)
        .filter(RowFilter::equals(&config.key_column, user.as_str()))
        .order_by(OrderBy::desc(&config.checkin_time_column));
    let rows = backend.select(&query).await?;

    let mut times: Vec<DateTime<Utc>> = rows
        .iter()
        .filter_map(|row| {
            row.get(&config.checkin_time_column)
                .and_then(Value::as_str)
                .and_then(parse_timestamp)
        })
        .collect();
    times.sort_by(|a, b| b.cmp(a));
    Ok(times)
}

/// Streak for `user`, counting calendar days in `now`'s timezone
pub async fn load_streak<B, Tz>(
    backend: &B,
    config: &FeedConfig,
    user: &UserId,
    now: &DateTime<Tz>,
) -> Result<u32>
where
    B: QueryBackend + ?Sized,
    Tz: TimeZone,
{
    let checkins = load_checkins(backend, config, user).await?;
    let tz = now.timezone();
    let local: Vec<DateTime<Tz>> = checkins.iter().map(|at| at.with_timezone(&tz)).collect();
    Ok(current_streak(&local, now.date_naive()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use chrono::{Duration, FixedOffset};
    use serde_json::json;

    async fn backend() -> InMemoryBackend {
        InMemoryBackend::with_tables(&["checkins"]).await
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_record_then_load_streak() {
        let backend = backend().await;
        let config = FeedConfig::default();
        let me = UserId::from("me");

        for day in [8, 9, 10] {
            record_checkin(&backend, &config, &me, at(day, 9)).await.unwrap();
        }
        record_checkin(&backend, &config, &me, at(10, 18)).await.unwrap();
        record_checkin(&backend, &config, &"someone".into(), at(7, 9))
            .await
            .unwrap();

        let times = load_checkins(&backend, &config, &me).await.unwrap();
        assert_eq!(times.len(), 4);
        assert_eq!(times[0], at(10, 18));

        assert_eq!(load_streak(&backend, &config, &me, &at(10, 20)).await.unwrap(), 3);
        assert_eq!(load_streak(&backend, &config, &me, &at(11, 8)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_streak_follows_callers_timezone() {
        let backend = backend().await;
        let config = FeedConfig::default();
        let me = UserId::from("me");
        record_checkin(&backend, &config, &me, at(9, 23)).await.unwrap();

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = at(10, 6).with_timezone(&plus_two);
        assert_eq!(load_streak(&backend, &config, &me, &now).await.unwrap(), 1);
        assert_eq!(load_streak(&backend, &config, &me, &at(10, 6)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_formatted_times_are_read() {
        let backend = backend().await;
        let config = FeedConfig::default();
        let rows = [
            json!({ "id": "1", "user_id": "me", "created_at": "2024-05-10 07:00:00+00" }),
            json!({ "id": "2", "user_id": "me", "created_at": "2024-05-09T07:00:00.5" }),
            json!({ "id": "3", "user_id": "me", "created_at": null }),
        ];
        for row in rows {
            backend
                .insert("checkins", row.as_object().cloned().unwrap())
                .await
                .unwrap();
        }

        let times = load_checkins(&backend, &config, &"me".into()).await.unwrap();
        assert_eq!(times.len(), 2);
        assert!(times[0] - times[1] < Duration::days(1));
    }

    #[tokio::test]
    async fn test_missing_log_is_an_error() {
        let backend = InMemoryBackend::new();
        let result = load_streak(&backend, &FeedConfig::default(), &"me".into(), &Utc::now()).await;
        assert!(result.is_err());
    }
}
