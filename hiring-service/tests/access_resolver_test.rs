//! Access resolution behaviour against the in-memory store.

mod common;

use common::AccessFixture;
use hiring_service::services::{AccessError, AccessResolver, Grant};
use serde_json::json;
use uuid::Uuid;

fn resolver(fixture: &AccessFixture) -> AccessResolver {
    AccessResolver::new(fixture.store.clone())
}

#[tokio::test]
async fn owner_is_granted_regardless_of_requirements() {
    let fixture = AccessFixture::new();

    let ctx = resolver(&fixture)
        .resolve_access(fixture.owner, fixture.company, &["manage_team"])
        .await
        .unwrap();

    assert_eq!(ctx.company_id, fixture.company);
    assert_eq!(ctx.grant, Grant::Owner);
    assert_eq!(ctx.role(), "owner");
    assert!(ctx.permissions().is_none());
}

#[tokio::test]
async fn member_with_permission_is_granted_with_their_role() {
    let fixture = AccessFixture::new();

    let ctx = resolver(&fixture)
        .resolve_access(fixture.recruiter, fixture.company, &["manage_jobs"])
        .await
        .unwrap();

    assert!(!ctx.is_owner());
    assert_eq!(ctx.role(), "recruiter");
    let permissions = ctx.permissions().unwrap();
    assert!(permissions.allows("manage_jobs"));
    assert!(!permissions.allows("manage_team"));
}

#[tokio::test]
async fn explicit_false_permission_is_insufficient() {
    let fixture = AccessFixture::new();

    let err = resolver(&fixture)
        .resolve_access(fixture.recruiter, fixture.company, &["manage_team"])
        .await
        .unwrap_err();

    match err {
        AccessError::InsufficientPermissions { required } => {
            assert_eq!(required, vec!["manage_team".to_string()]);
        }
        other => panic!("expected InsufficientPermissions, got {other:?}"),
    }
}

#[tokio::test]
async fn unrelated_user_is_not_a_member_even_with_no_requirements() {
    let fixture = AccessFixture::new();

    let err = resolver(&fixture)
        .resolve_access(fixture.stranger, fixture.company, &[])
        .await
        .unwrap_err();

    assert!(matches!(err, AccessError::NotAMember));
}

#[tokio::test]
async fn unknown_company_is_indistinguishable_from_non_membership() {
    let fixture = AccessFixture::new();

    let err = resolver(&fixture)
        .resolve_access(fixture.owner, Uuid::new_v4(), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, AccessError::NotAMember));
}

#[tokio::test]
async fn empty_requirement_admits_any_active_member() {
    let fixture = AccessFixture::new();
    let viewer = Uuid::new_v4();
    fixture
        .store
        .add_membership(fixture.company, viewer, "viewer", json!({}), true);

    let ctx = resolver(&fixture)
        .resolve_access(viewer, fixture.company, &[])
        .await
        .unwrap();

    assert_eq!(ctx.role(), "viewer");
    assert!(ctx.permissions().unwrap().is_empty());
}

#[tokio::test]
async fn inactive_member_is_not_a_member() {
    let fixture = AccessFixture::new();
    let former = Uuid::new_v4();
    fixture.store.add_membership(
        fixture.company,
        former,
        "recruiter",
        json!({"manage_jobs": true}),
        false,
    );

    let err = resolver(&fixture)
        .resolve_access(former, fixture.company, &[])
        .await
        .unwrap_err();

    assert!(matches!(err, AccessError::NotAMember));
}

#[tokio::test]
async fn every_required_permission_must_be_granted() {
    let fixture = AccessFixture::new();

    let err = resolver(&fixture)
        .resolve_access(
            fixture.recruiter,
            fixture.company,
            &["manage_jobs", "view_candidates"],
        )
        .await
        .unwrap_err();

    match err {
        AccessError::InsufficientPermissions { required } => {
            assert_eq!(required, vec!["manage_jobs", "view_candidates"]);
        }
        other => panic!("expected InsufficientPermissions, got {other:?}"),
    }
}

#[tokio::test]
async fn non_boolean_values_never_grant() {
    let fixture = AccessFixture::new();
    let user = Uuid::new_v4();
    fixture.store.add_membership(
        fixture.company,
        user,
        "hr",
        json!({"manage_jobs": 1, "view_dashboard": "yes", "manage_team": null}),
        true,
    );
    let resolver = resolver(&fixture);

    for permission in ["manage_jobs", "view_dashboard", "manage_team"] {
        let err = resolver
            .resolve_access(user, fixture.company, &[permission])
            .await
            .unwrap_err();
        assert!(
            matches!(err, AccessError::InsufficientPermissions { .. }),
            "{permission} should not be granted"
        );
    }
}

#[tokio::test]
async fn malformed_permission_document_grants_nothing() {
    let fixture = AccessFixture::new();
    let user = Uuid::new_v4();
    fixture.store.add_membership(
        fixture.company,
        user,
        "hr",
        json!(["manage_jobs"]),
        true,
    );

    let resolver = resolver(&fixture);
    let ctx = resolver.resolve_access(user, fixture.company, &[]).await.unwrap();
    assert!(ctx.permissions().unwrap().is_empty());

    let err = resolver
        .resolve_access(user, fixture.company, &["manage_jobs"])
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::InsufficientPermissions { .. }));
}

#[tokio::test]
async fn owner_skips_the_membership_lookup() {
    let fixture = AccessFixture::new();
    let resolver = resolver(&fixture);

    resolver
        .resolve_access(fixture.owner, fixture.company, &[])
        .await
        .unwrap();
    assert_eq!(fixture.store.ownership_lookups(), 1);
    assert_eq!(fixture.store.membership_lookups(), 0);

    resolver
        .resolve_access(fixture.recruiter, fixture.company, &[])
        .await
        .unwrap();
    assert_eq!(fixture.store.ownership_lookups(), 2);
    assert_eq!(fixture.store.membership_lookups(), 1);
}

#[tokio::test]
async fn repeated_resolution_is_stable() {
    let fixture = AccessFixture::new();
    let resolver = resolver(&fixture);

    let first = resolver
        .resolve_access(fixture.recruiter, fixture.company, &["manage_jobs"])
        .await
        .unwrap();
    let second = resolver
        .resolve_access(fixture.recruiter, fixture.company, &["manage_jobs"])
        .await
        .unwrap();

    assert_eq!(first, second);
    // Nothing is cached between calls
    assert_eq!(fixture.store.membership_lookups(), 2);
}

#[tokio::test]
async fn revoking_a_member_takes_effect_on_the_next_call() {
    let fixture = AccessFixture::new();
    let resolver = resolver(&fixture);

    resolver
        .resolve_access(fixture.recruiter, fixture.company, &["manage_jobs"])
        .await
        .unwrap();

    fixture.store.add_membership(
        fixture.company,
        fixture.recruiter,
        "recruiter",
        json!({"manage_jobs": true}),
        false,
    );

    let err = resolver
        .resolve_access(fixture.recruiter, fixture.company, &["manage_jobs"])
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::NotAMember));
}

#[tokio::test]
async fn store_outage_surfaces_as_unavailable() {
    let fixture = AccessFixture::new();
    fixture.store.set_unavailable(true);
    let resolver = resolver(&fixture);

    for caller in [fixture.owner, fixture.recruiter, fixture.stranger] {
        let err = resolver
            .resolve_access(caller, fixture.company, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Unavailable(_)));
    }

    assert!(matches!(
        resolver.resolve_ownership(fixture.owner, fixture.company).await,
        Err(AccessError::Unavailable(_))
    ));
}

#[tokio::test]
async fn ownership_is_exact() {
    let fixture = AccessFixture::new();
    let resolver = resolver(&fixture);

    assert!(resolver
        .resolve_ownership(fixture.owner, fixture.company)
        .await
        .unwrap());
    assert!(!resolver
        .resolve_ownership(fixture.recruiter, fixture.company)
        .await
        .unwrap());
    assert!(!resolver
        .resolve_ownership(fixture.owner, Uuid::new_v4())
        .await
        .unwrap());
    assert_eq!(fixture.store.membership_lookups(), 0);
}
