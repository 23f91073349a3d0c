//! Key access step definitions

use cucumber::{given, then, when};

use keybroker::models::{CallerRole, SaveKeyRequest, VisibilityScope};

use crate::features::support::{Outcome, TestWorld};

fn scope(value: &str) -> VisibilityScope {
    value.parse().expect("scope must be private, organization or platform")
}

// Callers

#[given(expr = "{string} is a super admin")]
async fn super_admin(world: &mut TestWorld, name: String) {
    world.add_caller(&name, CallerRole::SuperAdmin, None);
}

#[given(expr = "{string} is an org admin of {string}")]
async fn org_admin(world: &mut TestWorld, name: String, organization: String) {
    world.add_caller(&name, CallerRole::OrgAdmin, Some(&organization));
}

#[given(expr = "{string} is a user of {string}")]
async fn org_user(world: &mut TestWorld, name: String, organization: String) {
    world.add_caller(&name, CallerRole::User, Some(&organization));
}

// Keys

#[given(expr = "{string} saved a(n) {word} {string} key {string}")]
async fn saved_key(world: &mut TestWorld, name: String, scope_name: String, service: String, key: String) {
    let caller = world.caller(&name);
    let broker = world.broker().await;

    let summary = broker
        .save(
            &caller,
            SaveKeyRequest {
                service,
                key: key.clone(),
                name: None,
                scope: Some(scope(&scope_name)),
            },
        )
        .await
        .expect("Failed to save key");
    world.keys.insert(key, summary.id);
}

#[when(expr = "{string} resolves {string}")]
async fn resolve(world: &mut TestWorld, name: String, service: String) {
    let caller = world.caller(&name);
    let broker = world.broker().await;
    let result = broker.resolve(&caller, &service, None).await;
    world.record(result, Outcome::Resolved);
}

#[when(expr = "{string} changes key {string} to {word}")]
async fn change_scope(world: &mut TestWorld, name: String, key: String, scope_name: String) {
    let caller = world.caller(&name);
    let key_id = world.key_id(&key);
    let broker = world.broker().await;
    let result = broker.change_scope(&caller, key_id, scope(&scope_name)).await;
    world.record(result, |_| Outcome::Done);
}

#[when(expr = "{string} deletes key {string}")]
async fn delete(world: &mut TestWorld, name: String, key: String) {
    let caller = world.caller(&name);
    let key_id = world.key_id(&key);
    let broker = world.broker().await;
    let result = broker.delete(&caller, key_id).await;
    world.record(result, |_| Outcome::Done);
}

#[when(expr = "{string} lists keys")]
async fn list(world: &mut TestWorld, name: String) {
    let caller = world.caller(&name);
    let broker = world.broker().await;
    let result = broker.list(&caller, None).await;
    world.record(result, Outcome::Listed);
}

// Outcomes

#[then(expr = "the resolved key is {string}")]
async fn resolved_key_is(world: &mut TestWorld, expected: String) {
    match &world.outcome {
        Some(Outcome::Resolved(resolved)) => assert_eq!(resolved.key, expected),
        Some(Outcome::Failed(err)) => panic!("resolve failed: {}", err),
        _ => panic!("no key was resolved"),
    }
}

#[then(expr = "the resolved scope is {word}")]
async fn resolved_scope_is(world: &mut TestWorld, expected: String) {
    match &world.outcome {
        Some(Outcome::Resolved(resolved)) => assert_eq!(resolved.scope, scope(&expected)),
        _ => panic!("no key was resolved"),
    }
}

#[then("the operation succeeds")]
async fn operation_succeeds(world: &mut TestWorld) {
    if let Some(Outcome::Failed(err)) = &world.outcome {
        panic!("operation failed: {}", err);
    }
    assert!(world.outcome.is_some(), "no operation was performed");
}

#[then(expr = "the operation fails with {word}")]
async fn operation_fails_with(world: &mut TestWorld, kind: String) {
    assert_eq!(world.failure().kind().as_str(), kind);
}

#[then(expr = "the hint mentions {string}")]
async fn hint_mentions(world: &mut TestWorld, fragment: String) {
    let hint = world.failure().hint().expect("failure carries no hint");
    assert!(hint.contains(&fragment), "hint {:?} does not mention {:?}", hint, fragment);
}

#[then(expr = "the listing shows {int} key(s)")]
async fn listing_shows(world: &mut TestWorld, count: usize) {
    match &world.outcome {
        Some(Outcome::Listed(listing)) => assert_eq!(listing.keys.len(), count),
        _ => panic!("no listing was requested"),
    }
}

#[then(expr = "{string} can no longer resolve {string}")]
async fn can_no_longer_resolve(world: &mut TestWorld, name: String, service: String) {
    let caller = world.caller(&name);
    let broker = world.broker().await;
    let err = broker
        .resolve(&caller, &service, None)
        .await
        .expect_err("key should be gone");
    assert_eq!(err.kind().as_str(), "not_found");
}
