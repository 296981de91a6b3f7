use ci_warden::core::plugins::{plugin_file_path, plugins_newer_than_pid_file, sync_plugins};
use ci_warden::domain::model::PluginSpec;
use ci_warden::WardenError;
use httpmock::prelude::*;
use std::fs::File;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn git() -> PluginSpec {
    PluginSpec::Name("git".to_string())
}

fn slack() -> PluginSpec {
    PluginSpec::Pinned {
        name: "slack".to_string(),
        version: Some("2.3".to_string()),
    }
}

#[tokio::test]
async fn test_missing_plugins_are_downloaded_once() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let git_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/plugins/git/latest/git.hpi");
            then.status(200).body("git-archive");
        })
        .await;
    let slack_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/plugins/slack/2.3/slack.hpi");
            then.status(200).body("slack-archive");
        })
        .await;

    let client = reqwest::Client::new();
    let plugins = vec![git(), slack()];

    let first = sync_plugins(&client, home.path(), &server.base_url(), &plugins)
        .await
        .unwrap();
    assert_eq!(first.downloaded, vec!["git", "slack"]);
    assert!(first.changed());

    let git_file = plugin_file_path(home.path(), &git());
    assert_eq!(std::fs::read_to_string(&git_file).unwrap(), "git-archive");
    assert!(git_file.to_string_lossy().ends_with("plugins/git.jpi"));

    let second = sync_plugins(&client, home.path(), &server.base_url(), &plugins)
        .await
        .unwrap();
    assert!(second.downloaded.is_empty());
    assert_eq!(second.already_present, vec!["git", "slack"]);
    assert!(!second.changed());

    git_mock.assert_hits_async(1).await;
    slack_mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_no_plugins_leaves_home_untouched() {
    let home = TempDir::new().unwrap();
    let client = reqwest::Client::new();

    let report = sync_plugins(&client, home.path(), "http://127.0.0.1:1", &[])
        .await
        .unwrap();

    assert!(!report.changed());
    assert!(!home.path().join("plugins").exists());
}

#[tokio::test]
async fn test_failed_download_leaves_no_file() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/plugins/git/latest/git.hpi");
            then.status(404);
        })
        .await;

    let client = reqwest::Client::new();
    let err = sync_plugins(&client, home.path(), &server.base_url(), &[git()])
        .await
        .unwrap_err();

    assert!(matches!(err, WardenError::PluginDownloadError { .. }));
    assert!(!plugin_file_path(home.path(), &git()).exists());
}

#[tokio::test]
async fn test_large_plugin_is_written_intact() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let archive: Vec<u8> = (0..4 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
    let body = archive.clone();
    server
        .mock_async(move |when, then| {
            when.method(GET).path("/plugins/git/latest/git.hpi");
            then.status(200).body(body);
        })
        .await;

    let client = reqwest::Client::new();
    sync_plugins(&client, home.path(), &server.base_url(), &[git()])
        .await
        .unwrap();

    let git_file = plugin_file_path(home.path(), &git());
    assert_eq!(std::fs::read(&git_file).unwrap(), archive);
    assert!(!git_file.with_extension("jpi.part").exists());
}

#[tokio::test]
async fn test_truncated_download_leaves_no_partial_file() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // 宣告的長度比實際送出的多，連線就被關掉
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mirror = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request).await;
            let _ = stream
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100000\r\n\r\nonly-a-few-bytes")
                .await;
        }
    });

    let home = TempDir::new().unwrap();
    let client = reqwest::Client::new();
    let err = sync_plugins(&client, home.path(), &mirror, &[git()])
        .await
        .unwrap_err();

    assert!(matches!(err, WardenError::PluginDownloadError { .. }), "{:?}", err);
    let git_file = plugin_file_path(home.path(), &git());
    assert!(!git_file.exists());
    assert!(!git_file.with_extension("jpi.part").exists());
}

#[test]
fn test_plugins_newer_than_pid_file() {
    let home = TempDir::new().unwrap();
    let plugins_dir = home.path().join("plugins");
    std::fs::create_dir_all(&plugins_dir).unwrap();
    let pid_file = home.path().join("jenkins.pid");

    let started = SystemTime::now() - Duration::from_secs(3600);
    let pid = File::create(&pid_file).unwrap();
    pid.set_modified(started).unwrap();

    let old_plugin = File::create(plugins_dir.join("git.jpi")).unwrap();
    old_plugin
        .set_modified(started - Duration::from_secs(60))
        .unwrap();
    assert!(!plugins_newer_than_pid_file(home.path(), &pid_file).unwrap());

    // 非外掛檔案不算
    let notes = File::create(plugins_dir.join("notes.txt")).unwrap();
    notes.set_modified(SystemTime::now()).unwrap();
    assert!(!plugins_newer_than_pid_file(home.path(), &pid_file).unwrap());

    let new_plugin = File::create(plugins_dir.join("slack.hpi")).unwrap();
    new_plugin.set_modified(SystemTime::now()).unwrap();
    assert!(plugins_newer_than_pid_file(home.path(), &pid_file).unwrap());
}
