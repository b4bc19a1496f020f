use chrono::TimeDelta;

use engine::{AttemptInfo, EngineError, NewAccount};

mod common;

use common::{account, engine_with_db, engine_with_mailer, register, t0, RecordingMailer};

fn from_ip(ip: &str) -> AttemptInfo {
    AttemptInfo {
        ip_address: ip.to_string(),
        user_agent: Some("test-agent".to_string()),
        http_accept: Some("application/json".to_string()),
        path_info: Some("/api/v0/auth/login/".to_string()),
    }
}

fn field_errors(err: EngineError) -> engine::FieldErrors {
    match err {
        EngineError::Validation(fields) => fields,
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn registration_creates_profile_token_and_mails() {
    let (engine, _db, mailer) = engine_with_db().await;

    let registered = register(&engine, "alice").await;
    assert_eq!(registered.token.len(), 40);
    assert_eq!(registered.user.email, "alice@example.com");
    assert!(!registered.user.email_verified);

    let profile = engine.profile(registered.user.id).await.unwrap();
    assert_eq!(profile.needs_confirmation_after, t0() + TimeDelta::days(7));
    assert_eq!(profile.next_confirmation_mail, Some(t0() + TimeDelta::days(1)));
    assert!(!profile.created_on_behalf);

    assert_eq!(mailer.count(), 1);
    let mail = mailer.sent.lock().unwrap()[0].clone();
    assert_eq!(mail.key, profile.confirmation_key);

    let owner = engine.user_by_token(&registered.token).await.unwrap();
    assert_eq!(owner.map(|u| u.id), Some(registered.user.id));
}

#[tokio::test]
async fn registration_reports_every_invalid_field() {
    let (engine, _db, _mailer) = engine_with_db().await;
    register(&engine, "alice").await;

    let err = engine
        .register(
            NewAccount {
                username: "alice".to_string(),
                email: "ALICE@example.com".to_string(),
                password1: "1234".to_string(),
                password2: "4321".to_string(),
            },
            t0(),
        )
        .await
        .unwrap_err();

    let fields = field_errors(err);
    assert!(fields.contains_key("username"));
    assert!(fields.contains_key("email"));
    assert_eq!(fields["password1"].len(), 2);
    assert!(fields.contains_key("non_field_errors"));
}

#[tokio::test]
async fn failed_mail_is_retried_later() {
    let (engine, _db, mailer) = engine_with_mailer(RecordingMailer {
        fail: true,
        ..Default::default()
    })
    .await;

    let registered = register(&engine, "alice").await;
    assert_eq!(mailer.count(), 0);
    let profile = engine.profile(registered.user.id).await.unwrap();
    assert_eq!(profile.next_confirmation_mail, None);
}

#[tokio::test]
async fn verify_email_marks_user_verified() {
    let (engine, _db, _mailer) = engine_with_db().await;
    let registered = register(&engine, "alice").await;
    let profile = engine.profile(registered.user.id).await.unwrap();

    let user = engine.verify_email(&profile.confirmation_key).await.unwrap();
    assert!(user.email_verified);
    let profile = engine.profile(registered.user.id).await.unwrap();
    assert_eq!(profile.next_confirmation_mail, None);

    let err = engine.verify_email("nope").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn login_returns_existing_token() {
    let (engine, _db, _mailer) = engine_with_db().await;
    let registered = register(&engine, "alice").await;

    let key = engine
        .login("alice", "correct horse", from_ip("10.0.0.1"), t0())
        .await
        .unwrap();
    assert_eq!(key, registered.token);
}

#[tokio::test]
async fn login_after_logout_issues_new_token() {
    let (engine, _db, _mailer) = engine_with_db().await;
    let registered = register(&engine, "alice").await;

    engine.logout(registered.user.id).await.unwrap();
    assert!(engine.user_by_token(&registered.token).await.unwrap().is_none());

    let key = engine
        .login("alice", "correct horse", from_ip("10.0.0.1"), t0())
        .await
        .unwrap();
    assert_ne!(key, registered.token);
}

#[tokio::test]
async fn repeated_failures_lock_out() {
    let (engine, _db, _mailer) = engine_with_db().await;
    register(&engine, "alice").await;
    let now = t0();

    for _ in 0..2 {
        let err = engine
            .login("alice", "wrong", from_ip("10.0.0.1"), now)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::InvalidCredentials);
    }
    let err = engine
        .login("alice", "wrong", from_ip("10.0.0.1"), now)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::LockedOut);

    // Right password does not help while locked, from any address.
    let err = engine
        .login("alice", "correct horse", from_ip("10.0.0.2"), now)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::LockedOut);

    // The window slides past the failures.
    let later = now + TimeDelta::hours(1) + TimeDelta::seconds(1);
    assert!(
        engine
            .login("alice", "correct horse", from_ip("10.0.0.1"), later)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn successful_login_clears_failures() {
    let (engine, _db, _mailer) = engine_with_db().await;
    register(&engine, "alice").await;
    let now = t0();

    for _ in 0..2 {
        let _ = engine.login("alice", "wrong", from_ip("10.0.0.1"), now).await;
    }
    assert_eq!(engine.recent_failures("alice", "10.0.0.1", now).await.unwrap(), 2);

    engine
        .login("alice", "correct horse", from_ip("10.0.0.1"), now)
        .await
        .unwrap();
    assert_eq!(engine.recent_failures("alice", "10.0.0.1", now).await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_user_counts_as_failure() {
    let (engine, _db, _mailer) = engine_with_db().await;
    let err = engine
        .login("ghost", "whatever", from_ip("10.0.0.9"), t0())
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::InvalidCredentials);
    assert_eq!(
        engine.recent_failures("ghost", "10.0.0.9", t0()).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn change_password_checks_old_and_policy() {
    let (engine, _db, _mailer) = engine_with_db().await;
    let registered = register(&engine, "alice").await;
    let user_id = registered.user.id;

    let fields = field_errors(
        engine
            .change_password(user_id, "wrong", "12345678", "12345679")
            .await
            .unwrap_err(),
    );
    assert!(fields.contains_key("old_password"));
    assert!(fields.contains_key("new_password2"));

    engine
        .change_password(user_id, "correct horse", "battery staple", "battery staple")
        .await
        .unwrap();
    assert!(
        engine
            .login("alice", "battery staple", from_ip("10.0.0.1"), t0())
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn operator_created_accounts_are_flagged() {
    let (engine, _db, _mailer) = engine_with_db().await;
    let registered = engine
        .create_account(account("bob"), true, t0())
        .await
        .unwrap();
    let profile = engine.profile(registered.user.id).await.unwrap();
    assert!(profile.created_on_behalf);
}

#[tokio::test]
async fn concurrent_registrations_with_same_email_report_field_error() {
    let (engine, _db, _mailer) = engine_with_db().await;

    let first = NewAccount {
        email: "shared@example.com".to_string(),
        ..account("alice")
    };
    let second = NewAccount {
        email: "shared@example.com".to_string(),
        ..account("bob")
    };
    let (a, b) = tokio::join!(
        engine.register(first, t0()),
        engine.register(second, t0())
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let err = outcomes
        .into_iter()
        .find_map(Result::err)
        .unwrap();
    let fields = field_errors(err);
    assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["email"]);
}
