//! Shared test helpers for `PostgreSQL` integration tests.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use mockable::DefaultClock;
use revue::job::{
    adapters::postgres::PostgresJobStore,
    domain::{
        Job, JobDetails, PullRequestInfo, RepositoryTarget, ReviewDetails, TriggerSource,
        UnitDefinition,
    },
};
use revue::{agent::domain::AgentName, provider::domain::ProviderName};
use rstest::fixture;
use uuid::Uuid;

/// Boxed error type used by fixture setup.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Environment variable naming the server the tests run against.
pub const DATABASE_URL_VAR: &str = "REVUE_TEST_DATABASE_URL";

/// SQL creating the job schema.
pub const CREATE_JOBS_SQL: &str =
    include_str!("../../migrations/2026-10-16-000000_create_jobs/up.sql");

/// Pull request used by review fixtures.
pub const PR_URL: &str = "https://git.example/acme/ledger/pull/3";

/// Database created for one test and dropped afterwards.
pub struct TemporaryDatabase {
    admin_url: String,
    name: String,
}

impl Drop for TemporaryDatabase {
    fn drop(&mut self) {
        if let Ok(mut connection) = PgConnection::establish(&self.admin_url) {
            connection
                .batch_execute(&format!(
                    "DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)",
                    self.name
                ))
                .ok();
        }
    }
}

/// Job store bound to a temporary database.
///
/// The store is declared first so its pool closes before the database is
/// dropped.
pub struct PostgresFixture {
    /// Store under test.
    pub store: PostgresJobStore,
    _database: TemporaryDatabase,
}

fn database_url(admin_url: &str, name: &str) -> String {
    admin_url.rsplit_once('/').map_or_else(
        || format!("{admin_url}/{name}"),
        |(server, _)| format!("{server}/{name}"),
    )
}

/// Creates a migrated database and a store for it.
///
/// Returns `Ok(None)` when [`DATABASE_URL_VAR`] is unset.
///
/// # Errors
///
/// Returns an error if the database cannot be created or migrated.
pub fn setup_store() -> Result<Option<PostgresFixture>, BoxError> {
    let Ok(admin_url) = std::env::var(DATABASE_URL_VAR) else {
        return Ok(None);
    };
    let name = format!("revue_test_{}", Uuid::new_v4().simple());
    let mut admin = PgConnection::establish(&admin_url)?;
    admin.batch_execute(&format!("CREATE DATABASE \"{name}\""))?;
    let database = TemporaryDatabase {
        admin_url: admin_url.clone(),
        name: name.clone(),
    };

    let url = database_url(&admin_url, &name);
    let mut connection = PgConnection::establish(&url)?;
    connection.batch_execute(CREATE_JOBS_SQL)?;
    let pool = Pool::builder()
        .max_size(4)
        .build(ConnectionManager::<PgConnection>::new(url))?;

    Ok(Some(PostgresFixture {
        store: PostgresJobStore::new(pool),
        _database: database,
    }))
}

/// Provides a store backed by a fresh database, if one is configured.
#[fixture]
pub fn postgres() -> Option<PostgresFixture> {
    setup_store().expect("temporary database setup")
}

fn provider_name() -> ProviderName {
    ProviderName::new("memory").expect("valid provider name")
}

fn repository() -> RepositoryTarget {
    RepositoryTarget::new(provider_name(), "https://git.example/acme/ledger", "main")
        .expect("valid repository")
}

/// Review of the default branch.
#[must_use]
pub fn review_job() -> Job {
    Job::new(
        repository(),
        TriggerSource::Api,
        JobDetails::Review(ReviewDetails::for_ref(None)),
        &DefaultClock,
    )
}

/// Pull request review pinned to `commit_sha`.
#[must_use]
pub fn pull_request_review(commit_sha: &str, revision: u32) -> Job {
    let pull_request = PullRequestInfo::new(PR_URL, 3).expect("valid pull request");
    let details = ReviewDetails::for_pull_request(pull_request, commit_sha, revision)
        .expect("valid review details");
    Job::new(
        repository(),
        TriggerSource::PullRequest,
        JobDetails::Review(details),
        &DefaultClock,
    )
}

/// Unit definitions run by the `reviewer` agent.
#[must_use]
pub fn definitions(names: &[&str]) -> Vec<UnitDefinition> {
    let agent = AgentName::new("reviewer").expect("valid agent name");
    names
        .iter()
        .map(|name| {
            UnitDefinition::new(*name, agent.clone(), "Check {{ unit }}")
                .expect("valid unit definition")
        })
        .collect()
}
