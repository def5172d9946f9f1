use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use super::*;
use crate::utils::path::normalize_path;

fn site() -> (TempDir, PathBuf) {
    let temp = tempfile::Builder::new().prefix("site").tempdir().unwrap();
    let root = normalize_path(temp.path());
    (temp, root)
}

fn drain(sub: &mut Subscription) -> Vec<FsEvent> {
    std::iter::from_fn(|| sub.try_recv()).collect()
}

#[test]
fn test_backlog_first_event_wins() {
    let mut backlog = Backlog::new();
    backlog.push(FsEvent::new("/a", ChangeKind::Created));
    backlog.push(FsEvent::new("/a", ChangeKind::Modified));
    assert_eq!(backlog.drain(), vec![FsEvent::new("/a", ChangeKind::Created)]);
}

#[test]
fn test_backlog_remove_then_create_restores() {
    let mut backlog = Backlog::new();
    backlog.push(FsEvent::new("/a", ChangeKind::Removed));
    backlog.push(FsEvent::new("/a", ChangeKind::Created));
    assert_eq!(backlog.drain(), vec![FsEvent::new("/a", ChangeKind::Created)]);
}

#[test]
fn test_backlog_modify_then_remove_upgrades() {
    let mut backlog = Backlog::new();
    backlog.push(FsEvent::new("/a", ChangeKind::Modified));
    backlog.push(FsEvent::new("/a", ChangeKind::Removed));
    assert_eq!(backlog.drain(), vec![FsEvent::new("/a", ChangeKind::Removed)]);
}

#[test]
fn test_backlog_create_then_remove_discards() {
    let mut backlog = Backlog::new();
    backlog.push(FsEvent::new("/b", ChangeKind::Modified));
    backlog.push(FsEvent::new("/a", ChangeKind::Created));
    backlog.push(FsEvent::new("/a", ChangeKind::Removed));
    assert_eq!(backlog.len(), 1);
    assert_eq!(backlog.drain(), vec![FsEvent::new("/b", ChangeKind::Modified)]);
    assert!(backlog.is_empty());
}

#[test]
fn test_metadata_events_are_ignored() {
    use notify::event::{MetadataKind, ModifyKind};
    let kind = notify::EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime));
    assert_eq!(ChangeKind::from_notify(&kind), None);
}

#[test]
fn test_temp_and_hidden_files_are_ignored() {
    assert!(types::is_ignored(std::path::Path::new("/docs/page.toml.swp")));
    assert!(types::is_ignored(std::path::Path::new("/docs/.page.toml")));
    assert!(types::is_ignored(std::path::Path::new("/docs/page.toml~")));
    assert!(!types::is_ignored(std::path::Path::new("/docs/page.toml")));
}

#[test]
fn test_subscriptions_are_filtered() {
    let (_temp, root) = site();
    let watcher = Watcher::detached(vec![root.clone()]);
    let pattern = format!("{}/**/page.toml", crate::utils::path::to_slash(&root));
    let mut pages = watcher.on_pattern(&pattern).unwrap();
    let mut body = watcher.on_change(&[root.join("a/index.md")]);
    let mut all = watcher.on_any();

    watcher.inject(root.join("a/page.toml"), ChangeKind::Modified);
    watcher.inject(root.join("a/index.md"), ChangeKind::Modified);
    watcher.inject(root.join("a/.index.md.swp"), ChangeKind::Modified);

    assert_eq!(drain(&mut pages).len(), 1);
    assert_eq!(drain(&mut body), vec![FsEvent::new(root.join("a/index.md"), ChangeKind::Modified)]);
    assert_eq!(drain(&mut all).len(), 2);
}

#[test]
fn test_removed_directory_reaches_pattern_and_path_subscribers() {
    let (_temp, root) = site();
    let watcher = Watcher::detached(vec![root.clone()]);
    let pattern = format!("{}/**/page.toml", crate::utils::path::to_slash(&root));
    let mut pages = watcher.on_pattern(&pattern).unwrap();
    let mut body = watcher.on_change(&[root.join("a/index.md")]);

    watcher.inject(root.join("a"), ChangeKind::Removed);
    assert_eq!(drain(&mut pages).len(), 1);
    assert_eq!(drain(&mut body).len(), 1);
}

#[test]
fn test_initial_scan_emits_created_then_ready() {
    let (_temp, root) = site();
    fs::create_dir_all(root.join("a")).unwrap();
    fs::write(root.join("a/page.toml"), "").unwrap();
    fs::write(root.join("category.toml"), "").unwrap();
    fs::write(root.join("a/.hidden"), "").unwrap();

    let watcher = Watcher::detached(vec![root.clone()]);
    let mut all = watcher.on_any();
    assert!(!watcher.is_ready());

    assert_eq!(watcher.initial_scan(), 2);
    assert!(watcher.is_ready());
    assert_eq!(watcher.initial_scan(), 0, "scan runs once");

    let events = drain(&mut all);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.kind == ChangeKind::Created));
}

#[test]
fn test_dropped_subscription_is_pruned() {
    let watcher = Watcher::detached(vec![]);
    let sub = watcher.on_any();
    assert_eq!(watcher.subscriber_count(), 1);
    drop(sub);
    assert_eq!(watcher.subscriber_count(), 0);
}

#[tokio::test]
async fn test_close_is_idempotent_and_ends_subscriptions() {
    let watcher = Watcher::detached(vec![]);
    let mut sub = watcher.on_any();
    watcher.close();
    watcher.close();
    assert!(sub.recv().await.is_none());

    watcher.inject("/x/page.toml", ChangeKind::Created);
    assert!(watcher.is_closed());
}

#[tokio::test]
async fn test_ready_resolves_after_scan() {
    let (_temp, root) = site();
    let watcher = Arc::new(Watcher::detached(vec![root]));
    let waiter = {
        let watcher = Arc::clone(&watcher);
        tokio::spawn(async move { watcher.ready().await })
    };
    watcher.initial_scan();
    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_os_backend_reports_changes() {
    let (_temp, root) = site();
    let watcher = Watcher::start(vec![root.clone()]).unwrap();
    let mut sub = watcher.on_change(&[root.join("page.toml")]);
    watcher.initial_scan();

    fs::write(root.join("page.toml"), "title = \"x\"").unwrap();
    let event = tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.path, root.join("page.toml"));
    watcher.close();
}
