//! Restore engine scenarios against an in-memory mailbox.

#![allow(clippy::unwrap_used, clippy::unreadable_literal)]

mod common;

use common::{FEB_2021, FakeRemote, JAN_2021, open_archive, record};
use mailkeep_core::remote::labels::CHATS_LABEL;
use mailkeep_core::{
    Archive, Area, Error, RestoreEngine, RestoreOutcome, RestoreRequest, Settings, Shard,
    StopSignal,
};
use tempfile::TempDir;

fn settings(checkpoint_interval: usize) -> Settings {
    Settings {
        checkpoint_interval,
        ..Settings::default()
    }
}

async fn restore(
    remote: &mut FakeRemote,
    archive: &mut Archive,
    request: &RestoreRequest,
) -> RestoreOutcome {
    RestoreEngine::new(remote, archive, &settings(2))
        .run(request)
        .await
        .unwrap()
}

async fn archive_with(dir: &TempDir, ids: &[u64]) -> Archive {
    let mut archive = open_archive(dir).await;
    for &id in ids {
        archive
            .store(&record(id, FEB_2021 + i64::try_from(id).unwrap(), &["Work"]))
            .await
            .unwrap();
    }
    archive
}

fn body_of(id: u64) -> Vec<u8> {
    record(id, FEB_2021, &[]).body
}

#[tokio::test]
async fn restores_in_id_order_with_labels_and_flags() {
    let dir = TempDir::new().unwrap();
    let mut archive = archive_with(&dir, &[30, 10, 20]).await;
    let mut remote = FakeRemote::default();

    let request = RestoreRequest {
        extra_labels: vec!["Restored".into(), "Work".into()],
        ..RestoreRequest::default()
    };
    let outcome = restore(&mut remote, &mut archive, &request).await;

    assert_eq!(outcome.restored, 3);
    assert!(outcome.report.is_clean());
    let bodies: Vec<Vec<u8>> = remote.appended.iter().map(|a| a.body.clone()).collect();
    assert_eq!(bodies, vec![body_of(10), body_of(20), body_of(30)]);

    let first = &remote.appended[0];
    assert_eq!(first.flags, vec!["\\Seen"]);
    assert_eq!(first.internal_date, FEB_2021 + 10);

    assert_eq!(remote.label_sets.len(), 3);
    for (_, labels) in &remote.label_sets {
        assert_eq!(labels, &vec!["Work".to_string(), "Restored".to_string()]);
    }
    assert_eq!(remote.created_labels, vec!["Work", "Restored"]);
}

#[tokio::test]
async fn label_hierarchy_is_created_once() {
    let dir = TempDir::new().unwrap();
    let mut archive = open_archive(&dir).await;
    archive
        .store(&record(1, FEB_2021, &["x/y/z", "\\Inbox", "INBOX"]))
        .await
        .unwrap();
    archive
        .store(&record(2, FEB_2021, &["x/y/w", "x/y/z", "[Gmail]/Sent Mail"]))
        .await
        .unwrap();
    let mut remote = FakeRemote::default();

    let outcome = restore(&mut remote, &mut archive, &RestoreRequest::default()).await;

    assert_eq!(outcome.restored, 2);
    assert_eq!(remote.created_labels, vec!["x", "x/y", "x/y/z", "x/y/w"]);
    assert_eq!(
        remote.label_sets[0].1,
        vec!["x/y/z".to_string(), "\\Inbox".to_string(), "INBOX".to_string()]
    );
}

#[tokio::test]
async fn pivot_skips_older_shards() {
    let dir = TempDir::new().unwrap();
    let mut archive = open_archive(&dir).await;
    archive.store(&record(1, JAN_2021, &[])).await.unwrap();
    archive.store(&record(2, FEB_2021, &[])).await.unwrap();
    let mut remote = FakeRemote::default();

    let request = RestoreRequest {
        pivot: Some(Shard::parse("2021-02").unwrap()),
        ..RestoreRequest::default()
    };
    let outcome = restore(&mut remote, &mut archive, &request).await;

    assert_eq!(outcome.restored, 1);
    assert_eq!(remote.appended[0].body, body_of(2));
}

#[tokio::test]
async fn failure_leaves_a_checkpoint_to_resume_from() {
    let dir = TempDir::new().unwrap();
    let mut archive = archive_with(&dir, &[1, 2, 3, 4, 5]).await;
    let mut remote = FakeRemote {
        fail_appends_after: Some(3),
        ..FakeRemote::default()
    };

    let err = RestoreEngine::new(&mut remote, &mut archive, &settings(2))
        .run(&RestoreRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Imap(_)));
    assert_eq!(archive.load_checkpoint(Area::Db).await.unwrap(), Some(3));

    remote.fail_appends_after = None;
    let request = RestoreRequest {
        resume: true,
        ..RestoreRequest::default()
    };
    let outcome = restore(&mut remote, &mut archive, &request).await;

    assert_eq!(outcome.skipped, 3);
    assert_eq!(outcome.restored, 2);
    let bodies: Vec<Vec<u8>> = remote.appended.iter().map(|a| a.body.clone()).collect();
    assert_eq!(bodies, (1..=5).map(body_of).collect::<Vec<_>>());
}

#[tokio::test]
async fn interrupted_run_resumes_after_last_message() {
    let dir = TempDir::new().unwrap();
    let mut archive = archive_with(&dir, &[1, 2, 3, 4, 5]).await;
    let stop = StopSignal::new();
    let mut remote = FakeRemote {
        stop_after: Some((2, stop.clone())),
        ..FakeRemote::default()
    };

    let outcome = RestoreEngine::new(&mut remote, &mut archive, &settings(10))
        .with_stop_signal(stop)
        .run(&RestoreRequest::default())
        .await
        .unwrap();
    assert!(outcome.interrupted);
    assert_eq!(outcome.restored, 2);
    assert_eq!(archive.load_checkpoint(Area::Db).await.unwrap(), Some(2));

    remote.stop_after = None;
    let request = RestoreRequest {
        resume: true,
        ..RestoreRequest::default()
    };
    let outcome = restore(&mut remote, &mut archive, &request).await;
    assert!(!outcome.interrupted);
    assert_eq!(outcome.skipped, 2);
    assert_eq!(outcome.restored, 3);
    assert_eq!(remote.appended.len(), 5);
}

#[tokio::test]
async fn fresh_run_ignores_old_checkpoint() {
    let dir = TempDir::new().unwrap();
    let mut archive = archive_with(&dir, &[1, 2, 3]).await;
    archive.save_checkpoint(Area::Db, 2).await.unwrap();
    let mut remote = FakeRemote::default();

    let outcome = restore(&mut remote, &mut archive, &RestoreRequest::default()).await;

    assert_eq!(outcome.skipped, 0);
    assert_eq!(outcome.restored, 3);
    assert_eq!(archive.load_checkpoint(Area::Db).await.unwrap(), Some(3));
}

#[tokio::test]
async fn rejected_message_is_quarantined() {
    let dir = TempDir::new().unwrap();
    let mut archive = archive_with(&dir, &[1, 2, 3]).await;
    let mut remote = FakeRemote::default();
    remote.unparseable.insert(body_of(2));

    let outcome = restore(&mut remote, &mut archive, &RestoreRequest::default()).await;

    assert_eq!(outcome.restored, 2);
    assert_eq!(outcome.report.quarantined.len(), 1);
    assert_eq!(outcome.report.quarantined[0].id, 2);
    assert!(!archive.contains(Area::Db, 2));
    assert!(dir.path().join("quarantine/2.meta").exists());
}

#[tokio::test]
async fn unreadable_record_is_quarantined() {
    let dir = TempDir::new().unwrap();
    let mut archive = archive_with(&dir, &[1, 2]).await;
    std::fs::write(dir.path().join("db/2021-02/1.meta"), b"\x00\x01").unwrap();
    let mut remote = FakeRemote::default();

    let outcome = restore(&mut remote, &mut archive, &RestoreRequest::default()).await;

    assert_eq!(outcome.restored, 1);
    assert_eq!(outcome.report.quarantined.len(), 1);
    assert_eq!(outcome.report.quarantined[0].id, 1);
}

#[tokio::test]
async fn missing_append_uid_is_unpushable() {
    let dir = TempDir::new().unwrap();
    let mut archive = archive_with(&dir, &[1, 2, 3]).await;
    let mut remote = FakeRemote::default();
    remote.no_append_uid.insert(body_of(2));

    let outcome = restore(&mut remote, &mut archive, &RestoreRequest::default()).await;

    assert_eq!(outcome.restored, 2);
    assert_eq!(outcome.report.unpushable.len(), 1);
    assert_eq!(outcome.report.unpushable[0].id, 2);
    assert_eq!(remote.appended.len(), 3);
    assert_eq!(remote.label_sets.len(), 2);
}

#[tokio::test]
async fn dropped_connection_gets_one_more_try() {
    let dir = TempDir::new().unwrap();
    let mut archive = archive_with(&dir, &[1, 2, 3]).await;
    let mut remote = FakeRemote {
        dropped_appends: 1,
        ..FakeRemote::default()
    };

    let outcome = restore(&mut remote, &mut archive, &RestoreRequest::default()).await;

    assert_eq!(outcome.restored, 3);
    assert!(outcome.report.is_clean());
    assert_eq!(outcome.report.reconnections, 1);
    assert_eq!(remote.appended.len(), 3);
}

#[tokio::test]
async fn dropped_label_store_does_not_append_twice() {
    let dir = TempDir::new().unwrap();
    let mut archive = archive_with(&dir, &[1, 2]).await;
    let mut remote = FakeRemote {
        dropped_label_stores: 1,
        ..FakeRemote::default()
    };

    let outcome = restore(&mut remote, &mut archive, &RestoreRequest::default()).await;

    assert_eq!(outcome.restored, 2);
    assert!(outcome.report.is_clean());
    assert_eq!(remote.reconnects, 1);
    let bodies: Vec<Vec<u8>> = remote.appended.iter().map(|a| a.body.clone()).collect();
    assert_eq!(bodies, vec![body_of(1), body_of(2)]);
    assert_eq!(remote.label_sets.len(), 2);
    assert_eq!(remote.all_mail.len(), 2);
}

#[tokio::test]
async fn second_drop_gives_up_on_the_message() {
    let dir = TempDir::new().unwrap();
    let mut archive = archive_with(&dir, &[1, 2, 3]).await;
    let mut remote = FakeRemote {
        dropped_appends: 2,
        ..FakeRemote::default()
    };

    let outcome = restore(&mut remote, &mut archive, &RestoreRequest::default()).await;

    assert_eq!(outcome.restored, 2);
    assert_eq!(outcome.report.unpushable.len(), 1);
    assert_eq!(outcome.report.unpushable[0].id, 1);
    assert_eq!(remote.reconnects, 1);
}

#[tokio::test]
async fn chats_go_to_all_mail_with_their_label() {
    let dir = TempDir::new().unwrap();
    let mut archive = archive_with(&dir, &[1]).await;
    archive
        .store_chat(&record(900, FEB_2021, &[CHATS_LABEL]))
        .await
        .unwrap();
    let mut remote = FakeRemote::default();

    let skipped = restore(&mut remote, &mut archive, &RestoreRequest::default()).await;
    assert_eq!(skipped.restored, 1);

    let mut remote = FakeRemote::default();
    let request = RestoreRequest {
        include_chats: true,
        ..RestoreRequest::default()
    };
    let outcome = restore(&mut remote, &mut archive, &request).await;

    assert_eq!(outcome.restored, 2);
    assert_eq!(remote.appended[1].body, body_of(900));
    assert_eq!(remote.label_sets[1].1, vec![CHATS_LABEL.to_string()]);
    assert!(remote.created_labels.iter().any(|label| label == CHATS_LABEL));
}
