use super::render::print_feed;
use anyhow::{Context, Result};
use checkin_feed::checkin::{
    checked_in_on, day_progress, load_checkins, load_streak, record_checkin, remaining_in_day,
    replace_contacts,
};
use checkin_feed::{
    ActivityRecord, ContactEntry, EnrichedActivity, FeedConfig, FeedSession, InMemoryBackend,
    Priority, Row, RowFilter, UserId,
};
use chrono::{Duration, Local, Utc};
use clap::Parser;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Replays a scripted day of check-ins against an in-memory backend and
/// prints the activity feed after every change.
#[derive(Debug, Parser)]
#[command(name = "checkin-feed", version, about)]
pub struct Args {
    /// Number of seeded users the owner follows as contacts
    #[arg(long, default_value_t = 3)]
    pub contacts: usize,

    /// Number of scripted check-in rounds
    #[arg(long, default_value_t = 3)]
    pub rounds: usize,

    /// Number of registered users seeded besides the owner
    #[arg(long, default_value_t = 5)]
    pub seed_users: usize,

    /// Days before today on which the owner already checked in
    #[arg(long, default_value_t = 2)]
    pub history_days: u32,

    /// Milliseconds to wait for the feed to publish after each change
    #[arg(long, default_value_t = 250)]
    pub settle_ms: u64,
}

pub struct App {
    args: Args,
    config: FeedConfig,
}

impl App {
    pub fn new(args: Args, config: FeedConfig) -> Self {
        Self { args, config }
    }

    pub async fn run(self) -> Result<()> {
        let backend = Arc::new(
            InMemoryBackend::with_tables(&[
                self.config.activity_table.as_str(),
                self.config.contacts_table.as_str(),
                self.config.checkins_table.as_str(),
                self.config.profiles_table.as_str(),
            ])
            .await,
        );

        let owner = UserId::generate();
        backend.sign_in(owner.clone()).await;

        let users = self.seed(&backend, &owner).await?;
        let followed: Vec<UserId> = users.iter().take(self.args.contacts).cloned().collect();
        let book = replace_contacts(&*backend, &self.config, &owner, &contact_entries(&followed))
            .await
            .context("failed to save contacts")?;
        info!(contacts = book.len(), "contacts saved");

        self.owner_checkin(&backend, &owner).await?;

        let session = FeedSession::start(backend.clone(), self.config.clone())
            .await
            .context("failed to start feed session")?;
        let mut views = session.views();
        print_feed("initial", &session.current());

        for round in 0..self.args.rounds {
            let Some(user) = followed.get(round % followed.len().max(1)) else {
                break;
            };
            let priority = Priority::try_from((round % 3) as i64).unwrap_or(Priority::Normal);
            self.user_checkin(&backend, user, &format!("user-{round}"), priority)
                .await?;
            self.settle(&mut views, &format!("round {}: {} checked in", round + 1, user))
                .await;
        }

        if let (Some(outsider), Some(dropped)) = (users.get(self.args.contacts), followed.first()) {
            let mut next: Vec<UserId> = followed.iter().skip(1).cloned().collect();
            next.push(outsider.clone());
            let saved =
                replace_contacts(&*backend, &self.config, &owner, &contact_entries(&next)).await;
            match saved {
                Ok(_) => {
                    let title = format!("contacts: {dropped} swapped for {outsider}");
                    self.settle(&mut views, &title).await;
                }
                Err(err) => warn!(error = %err, "contact swap rejected"),
            }
        }

        // Saving an unregistered contact is refused and leaves the feed as it was.
        let ghost = contact_entries(&[UserId::generate()]);
        if let Err(err) = replace_contacts(&*backend, &self.config, &owner, &ghost).await {
            println!("== contacts: save refused ({err})");
        }

        if let Some(gone) = session.current().last().map(|e| e.user_id.clone()) {
            backend
                .delete_where(
                    &self.config.activity_table,
                    &RowFilter::equals(&self.config.key_column, gone.as_str()),
                )
                .await?;
            self.settle(&mut views, &format!("activity row for {gone} deleted"))
                .await;
        }

        session.shutdown().await.context("failed to stop feed session")?;
        info!(subscriptions = backend.subscriber_count().await, "demo finished");
        Ok(())
    }

    /// Register the owner and `seed_users` others, each with a latest-activity row
    async fn seed(&self, backend: &InMemoryBackend, owner: &UserId) -> Result<Vec<UserId>> {
        backend
            .insert(&self.config.profiles_table, profile_row(&self.config, owner, "owner"))
            .await?;

        let mut users = Vec::with_capacity(self.args.seed_users);
        for i in 0..self.args.seed_users {
            let id = UserId::generate();
            let name = format!("user-{i}");
            backend
                .insert(&self.config.profiles_table, profile_row(&self.config, &id, &name))
                .await?;

            let priority = Priority::try_from((i % 3) as i64).unwrap_or(Priority::Normal);
            let mut record = ActivityRecord::new(id.clone(), &name, priority);
            if i % 2 == 0 {
                let at = Utc::now() - Duration::hours(i as i64 + 1);
                record_checkin(backend, &self.config, &id, at).await?;
                record = record.checked_in_at(at);
            }
            backend
                .insert(&self.config.activity_table, record.to_row())
                .await?;
            users.push(id);
        }

        info!(users = users.len(), "seeded backend");
        Ok(users)
    }

    /// Log the owner's recent days plus today's check-in, then report the streak
    async fn owner_checkin(&self, backend: &InMemoryBackend, owner: &UserId) -> Result<()> {
        let now = Utc::now();
        for days_ago in (1..=self.args.history_days).rev() {
            record_checkin(backend, &self.config, owner, now - Duration::days(days_ago.into()))
                .await?;
        }

        let local = Local::now();
        let before = load_checkins(backend, &self.config, owner).await?;
        let already = checked_in_on(
            &before.iter().map(|at| at.with_timezone(&Local)).collect::<Vec<_>>(),
            local.date_naive(),
        );
        if !already {
            record_checkin(backend, &self.config, owner, now).await?;
        }

        let streak = load_streak(backend, &self.config, owner, &local).await?;
        let left = remaining_in_day(&local);
        println!(
            "owner streak: {} day(s), {:.0}% of today gone, {:02}:{:02} left",
            streak,
            day_progress(&local) * 100.0,
            left.num_hours(),
            left.num_minutes() % 60
        );
        Ok(())
    }

    /// Append to the check-in log and refresh the user's latest-activity row
    async fn user_checkin(
        &self,
        backend: &InMemoryBackend,
        user: &UserId,
        name: &str,
        priority: Priority,
    ) -> Result<()> {
        let checkin = record_checkin(backend, &self.config, user, Utc::now()).await?;
        let record = ActivityRecord::new(user.clone(), name, priority).checked_in_at(checkin.at);
        backend
            .upsert(&self.config.activity_table, &self.config.key_column, record.to_row())
            .await?;
        Ok(())
    }

    async fn settle(&self, views: &mut watch::Receiver<Vec<EnrichedActivity>>, title: &str) {
        let wait = std::time::Duration::from_millis(self.args.settle_ms);
        let mut changed = matches!(tokio::time::timeout(wait, views.changed()).await, Ok(Ok(())));
        if !changed {
            info!(step = title, "no visible change");
        }
        // A contact list save publishes more than once; print where it lands.
        while changed {
            changed = matches!(tokio::time::timeout(wait / 5, views.changed()).await, Ok(Ok(())));
        }
        let snapshot = views.borrow_and_update().clone();
        print_feed(title, &snapshot);
    }
}

fn contact_entries(ids: &[UserId]) -> Vec<ContactEntry> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            let name = format!("Contact {}", i + 1);
            ContactEntry::new(id.clone())
                .email(&format!("contact{}@example.com", i + 1))
                .display_name(&name)
        })
        .collect()
}

fn profile_row(config: &FeedConfig, id: &UserId, name: &str) -> Row {
    let mut row = Row::new();
    row.insert(config.profile_key_column.clone(), json!(id.as_str()));
    row.insert("email".into(), json!(format!("{name}@example.com")));
    row
}
