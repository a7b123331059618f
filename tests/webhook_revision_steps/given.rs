//! Given steps for pull request revision BDD scenarios.

use super::world::WebhookRevisionWorld;
use rstest_bdd_macros::given;

#[given(r#"a pull request "{pr_url}""#)]
fn pull_request(world: &mut WebhookRevisionWorld, pr_url: String) {
    world.pr_url = Some(pr_url);
}
