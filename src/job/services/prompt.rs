//! Prompt template rendering for unit execution.

use crate::job::domain::{Job, JobDetails, UnitDefinition};
use crate::provider::domain::RepositorySnapshot;
use minijinja::Environment;
use serde_json::{Map, Value, json};

/// Renders a unit's prompt template against job and repository data.
///
/// Templates see `job_id`, `kind`, `unit`, `ordinal`, `repository`
/// (`provider`, `url`, `git_ref`), `commit_sha`, `pull_request` (`url`,
/// `number`, `revision`), `report_title`, `files` and `content`.
///
/// # Errors
///
/// Returns the template engine's error message when rendering fails.
pub fn render_prompt(
    definition: &UnitDefinition,
    ordinal: u32,
    job: &Job,
    snapshot: &RepositorySnapshot,
) -> Result<String, String> {
    let environment = Environment::new();
    let context = build_prompt_context(definition, ordinal, job, snapshot);
    environment
        .render_str(definition.prompt_template(), context)
        .map_err(|error| error.to_string())
}

fn build_prompt_context(
    definition: &UnitDefinition,
    ordinal: u32,
    job: &Job,
    snapshot: &RepositorySnapshot,
) -> Map<String, Value> {
    let repository = job.repository();
    let mut context = Map::new();
    context.insert("job_id".to_owned(), Value::String(job.id().to_string()));
    context.insert("kind".to_owned(), Value::String(job.kind().to_string()));
    context.insert("unit".to_owned(), Value::String(definition.name().to_owned()));
    context.insert("ordinal".to_owned(), Value::from(ordinal));
    context.insert(
        "repository".to_owned(),
        json!({
            "provider": repository.provider().as_str(),
            "url": repository.url(),
            "git_ref": repository.git_ref(),
        }),
    );

    let commit_sha = snapshot
        .commit_sha()
        .or_else(|| job.review().and_then(|review| review.commit_sha()));
    context.insert(
        "commit_sha".to_owned(),
        commit_sha.map_or(Value::Null, |sha| Value::String(sha.to_owned())),
    );

    match job.details() {
        JobDetails::Review(review) => {
            let pull_request = review.pull_request().map_or(Value::Null, |pr| {
                json!({
                    "url": pr.url(),
                    "number": pr.number(),
                    "revision": review.revision_count(),
                })
            });
            context.insert("pull_request".to_owned(), pull_request);
        }
        JobDetails::Report(report) => {
            context.insert(
                "report_title".to_owned(),
                Value::String(report.title().to_owned()),
            );
        }
    }

    let files: Vec<Value> = snapshot
        .files()
        .iter()
        .map(|file| json!({ "path": file.path(), "content": file.content() }))
        .collect();
    context.insert("files".to_owned(), Value::Array(files));
    context.insert("content".to_owned(), Value::String(snapshot.render_content()));
    context
}
