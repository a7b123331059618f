//! Then steps for pull request revision BDD scenarios.

use super::world::WebhookRevisionWorld;
use revue::job::domain::ReviewDetails;
use revue::webhook::domain::WebhookOutcome;
use rstest_bdd_macros::then;

fn last_outcome(world: &WebhookRevisionWorld) -> Result<&WebhookOutcome, eyre::Report> {
    let result = world
        .last_outcome
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing delivery outcome"))?;
    result
        .as_ref()
        .map_err(|err| eyre::eyre!("delivery failed: {err}"))
}

#[then("the pull request has {count:usize} reviews")]
fn pull_request_has_reviews(
    world: &WebhookRevisionWorld,
    count: usize,
) -> Result<(), eyre::Report> {
    let reviews = world.reviews()?;
    if reviews.len() != count {
        return Err(eyre::eyre!(
            "expected {count} reviews, found {}",
            reviews.len()
        ));
    }
    Ok(())
}

#[then("the latest review has revision {revision:u32}")]
fn latest_review_has_revision(
    world: &WebhookRevisionWorld,
    revision: u32,
) -> Result<(), eyre::Report> {
    let WebhookOutcome::Created(job) = last_outcome(world)? else {
        return Err(eyre::eyre!("expected the last delivery to create a review"));
    };
    let actual = job
        .review()
        .map(ReviewDetails::revision_count)
        .ok_or_else(|| eyre::eyre!("created job is not a review"))?;
    if actual != revision {
        return Err(eyre::eyre!("expected revision {revision}, found {actual}"));
    }
    Ok(())
}

#[then("the delivery resolves to the existing review")]
fn delivery_resolves_to_existing(world: &WebhookRevisionWorld) -> Result<(), eyre::Report> {
    let outcome = last_outcome(world)?;
    if !matches!(outcome, WebhookOutcome::Existing(_)) {
        return Err(eyre::eyre!("expected an existing review, got {outcome:?}"));
    }
    Ok(())
}

#[then("the delivery is ignored")]
fn delivery_is_ignored(world: &WebhookRevisionWorld) -> Result<(), eyre::Report> {
    let outcome = last_outcome(world)?;
    if !matches!(outcome, WebhookOutcome::Ignored { .. }) {
        return Err(eyre::eyre!("expected the delivery to be ignored, got {outcome:?}"));
    }
    Ok(())
}

#[then("{count:u64} reviews are marked as merged")]
fn reviews_marked_as_merged(
    world: &WebhookRevisionWorld,
    count: u64,
) -> Result<(), eyre::Report> {
    let WebhookOutcome::MergedAtUpdated { updated, .. } = last_outcome(world)? else {
        return Err(eyre::eyre!("expected the merge to update reviews"));
    };
    if *updated != count {
        return Err(eyre::eyre!("expected {count} merged reviews, updated {updated}"));
    }
    let unmerged = world
        .reviews()?
        .iter()
        .filter(|job| job.merged_at().is_none())
        .count();
    if unmerged != 0 {
        return Err(eyre::eyre!("{unmerged} reviews have no merge timestamp"));
    }
    Ok(())
}
