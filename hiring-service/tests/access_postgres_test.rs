//! The PostgreSQL access store behind the resolver.

mod common;

use common::TestApp;
use hiring_service::services::{AccessError, AccessResolver, AccessStore};
use serde_json::json;
use serial_test::serial;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn database_answers_both_access_reads() {
    let app = TestApp::spawn().await;
    let owner = app.register_user("Owner").await;
    let member = app.register_user("Member").await;
    let company = app.create_company(&owner, "Store Checks").await;

    assert!(app.db.company_owned_by(company, owner.id).await.unwrap());
    assert!(!app.db.company_owned_by(company, member.id).await.unwrap());
    assert!(!app.db.company_owned_by(Uuid::new_v4(), owner.id).await.unwrap());
    assert!(app
        .db
        .find_membership(company, member.id)
        .await
        .unwrap()
        .is_none());

    let res = app
        .add_member(&owner, company, &member, json!({"manage_jobs": true}))
        .await;
    assert_eq!(res.status(), 201);

    let membership = app
        .db
        .find_membership(company, member.id)
        .await
        .unwrap()
        .expect("membership row");
    assert!(membership.is_active);
    assert_eq!(membership.role, "recruiter");
    assert_eq!(membership.permissions, Some(json!({"manage_jobs": true})));

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn resolver_over_database_matches_memory_semantics() {
    let app = TestApp::spawn().await;
    let owner = app.register_user("Owner").await;
    let member = app.register_user("Member").await;
    let company = app.create_company(&owner, "Resolver Checks").await;
    app.add_member(&owner, company, &member, json!({"manage_jobs": true}))
        .await;

    let resolver = AccessResolver::new(Arc::new(app.db.clone()));

    let ctx = resolver
        .resolve_access(owner.id, company, &["manage_team"])
        .await
        .unwrap();
    assert!(ctx.is_owner());

    let ctx = resolver
        .resolve_access(member.id, company, &["manage_jobs"])
        .await
        .unwrap();
    assert_eq!(ctx.role(), "recruiter");

    let err = resolver
        .resolve_access(member.id, company, &["manage_team"])
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::InsufficientPermissions { .. }));

    // A closed pool is an outage, not a denial
    app.db.close().await;
    let err = resolver
        .resolve_access(member.id, company, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::Unavailable(_)));

    app.cleanup().await;
}
