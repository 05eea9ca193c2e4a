use std::fs;
use std::io::Cursor;

use bytes::Bytes;
use filehost::config::HostingConfig;
use filehost::context::{self, RequestContext};
use filehost::host::{FileHost, HostingDir};
use filehost::link::{HostError, LinkKind, LinkMode, LinkPolicy, LinkResolver, Source};
use filehost::public_url::UrlError;
use url::Url;

fn test_host(temp_dir: &tempfile::TempDir, host_override: Option<Url>) -> FileHost {
    let dir = HostingDir::create(Some(temp_dir.path())).unwrap();
    FileHost::new(dir, LinkResolver::new(LinkPolicy::copy()), host_override)
}

fn ctx(scheme: &str, host: &str) -> RequestContext {
    RequestContext::with_host(scheme, host).unwrap()
}

#[test]
fn test_hosting_dir_prefix_and_cleanup() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = HostingDir::create(Some(temp_dir.path())).unwrap();
    let path = dir.path().to_path_buf();

    assert!(path.is_dir());
    assert!(path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("filehost-"));

    dir.close().unwrap();
    assert!(!path.exists());
}

#[test]
fn test_hosting_dir_removed_on_drop() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = {
        let dir = HostingDir::create(Some(temp_dir.path())).unwrap();
        dir.path().to_path_buf()
    };

    assert!(!path.exists());
}

#[test]
fn test_hosting_dir_creates_missing_parent() {
    let temp_dir = tempfile::tempdir().unwrap();
    let parent = temp_dir.path().join("nested").join("tmp");

    let dir = HostingDir::create(Some(&parent)).unwrap();

    assert!(dir.path().starts_with(&parent));
}

#[test]
fn test_resolve_rejects_escaping_names() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = HostingDir::create(Some(temp_dir.path())).unwrap();

    assert!(dir.resolve("").is_none());
    assert!(dir.resolve("../secret").is_none());
    assert!(dir.resolve("abc/../../secret").is_none());
    assert!(dir.resolve("/etc/passwd").is_none());
    assert_eq!(dir.resolve("abc/file.txt"), Some(dir.path().join("abc/file.txt")));
}

#[test]
fn test_host_every_source_kind() {
    let temp_dir = tempfile::tempdir().unwrap();
    let host = test_host(&temp_dir, None);
    let source_path = temp_dir.path().join("source.bin");
    fs::write(&source_path, b"payload").unwrap();

    let sources: Vec<Source> = vec![
        Source::Bytes(Bytes::from_static(b"payload")),
        Source::Buffer(Cursor::new(b"payload".to_vec())),
        Source::Path(source_path.clone()),
        Source::File(fs::File::open(&source_path).unwrap()),
    ];

    for source in sources {
        let file = host.host_blocking(source, None).unwrap();
        assert_eq!(file.byte_size, 7);
        assert_eq!(file.name, file.id);
        assert_eq!(file.path.parent(), Some(host.dir().path()));
        assert_eq!(fs::read(&file.path).unwrap(), b"payload");
    }
}

#[test]
fn test_host_generates_distinct_names() {
    let temp_dir = tempfile::tempdir().unwrap();
    let host = test_host(&temp_dir, None);

    let a = host.host_blocking(b"same".to_vec(), None).unwrap();
    let b = host.host_blocking(b"same".to_vec(), None).unwrap();

    assert_ne!(a.id, b.id);
    assert_ne!(a.path, b.path);
}

#[test]
fn test_host_with_filename() {
    let temp_dir = tempfile::tempdir().unwrap();
    let host = test_host(&temp_dir, None);

    let file = host
        .host_blocking(b"<svg/>".to_vec(), Some("logo.svg"))
        .unwrap();

    assert_eq!(file.name, format!("{}/logo.svg", file.id));
    assert_eq!(file.path, host.dir().path().join(&file.id).join("logo.svg"));
    assert_eq!(host.dir().resolve(&file.name), Some(file.path.clone()));
    assert_eq!(fs::read(&file.path).unwrap(), b"<svg/>");
}

#[test]
fn test_host_rejects_bad_filenames() {
    let temp_dir = tempfile::tempdir().unwrap();
    let host = test_host(&temp_dir, None);

    for filename in ["", ".", "..", "a/b", "../escape", "a\\b"] {
        let result = host.host_blocking(b"x".to_vec(), Some(filename));
        assert!(
            matches!(result, Err(HostError::InvalidFilename(_))),
            "{filename:?} should be rejected"
        );
    }
}

#[test]
fn test_host_missing_path() {
    let temp_dir = tempfile::tempdir().unwrap();
    let host = test_host(&temp_dir, None);

    let result = host.host_blocking(temp_dir.path().join("missing.bin"), None);

    assert!(matches!(result, Err(HostError::InvalidSource(_))));
}

#[tokio::test]
async fn test_failed_named_upload_leaves_no_directory() {
    let temp_dir = tempfile::tempdir().unwrap();
    let host = test_host(&temp_dir, None);
    let missing = temp_dir.path().join("missing.bin");

    let blocking = host.host_blocking(missing.clone(), Some("a.txt"));
    assert!(matches!(blocking, Err(HostError::InvalidSource(_))));

    let offloaded = host.host(missing, Some("b.txt")).await;
    assert!(matches!(offloaded, Err(HostError::InvalidSource(_))));

    assert_eq!(fs::read_dir(host.dir().path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_async_and_blocking_hosting_agree() {
    let temp_dir = tempfile::tempdir().unwrap();
    let host = test_host(&temp_dir, None);
    let source_path = temp_dir.path().join("source.bin");
    fs::write(&source_path, vec![7u8; 4096]).unwrap();

    let blocking = host.host_blocking(source_path.clone(), None).unwrap();
    let offloaded = host.host(source_path, None).await.unwrap();

    assert_eq!(blocking.byte_size, offloaded.byte_size);
    assert_eq!(
        fs::read(&blocking.path).unwrap(),
        fs::read(&offloaded.path).unwrap()
    );
}

#[tokio::test]
async fn test_url_with_override() {
    let temp_dir = tempfile::tempdir().unwrap();
    let base = Url::parse("https://files.example.org").unwrap();
    let host = test_host(&temp_dir, Some(base));

    let file = host.host(b"x".to_vec(), None).await.unwrap();

    let outside = host.url(&file).unwrap();
    let inside = context::scope(ctx("http", "ignored.example.com"), async {
        host.url(&file).unwrap()
    })
    .await;

    assert_eq!(
        outside.as_str(),
        format!("https://files.example.org/filehost/{}", file.id)
    );
    assert_eq!(outside, inside);
}

#[tokio::test]
async fn test_url_without_override_needs_a_request() {
    let temp_dir = tempfile::tempdir().unwrap();
    let host = test_host(&temp_dir, None);

    let file = host.host(b"x".to_vec(), Some("a.txt")).await.unwrap();

    assert!(matches!(host.url(&file), Err(UrlError::NoReachableBaseUrl)));

    let url = context::scope(ctx("wss", "example.com"), async { host.url(&file) })
        .await
        .unwrap();
    assert_eq!(
        url.as_str(),
        format!("https://example.com/filehost/{}/a.txt", file.id)
    );
}

#[tokio::test]
async fn test_url_reads_context_at_call_time() {
    let temp_dir = tempfile::tempdir().unwrap();
    let host = test_host(&temp_dir, None);

    // Hosted while handling one request, linked while handling another.
    let file = context::scope(ctx("http", "first.example.com"), async {
        host.host(b"x".to_vec(), None).await.unwrap()
    })
    .await;

    let url = context::scope(ctx("https", "second.example.com"), async {
        host.url(&file).unwrap()
    })
    .await;

    assert_eq!(
        url.as_str(),
        format!("https://second.example.com/filehost/{}", file.id)
    );
}

#[cfg(unix)]
#[test]
fn test_from_config_uses_link_policy() {
    use std::os::unix::fs::MetadataExt;

    let temp_dir = tempfile::tempdir().unwrap();
    let config = HostingConfig {
        host_override: None,
        link_kind: LinkKind::Hard,
        link_mode: LinkMode::Always,
        tmp_dir: Some(temp_dir.path().join("hosting")),
    };
    let host = FileHost::from_config(&config).unwrap();
    assert_eq!(host.resolver().policy(), config.link_policy());

    let source_path = temp_dir.path().join("source.bin");
    fs::write(&source_path, b"linked").unwrap();
    let file = host.host_blocking(source_path.clone(), None).unwrap();

    let source_meta = fs::metadata(&source_path).unwrap();
    let hosted_meta = fs::metadata(&file.path).unwrap();
    assert_eq!(source_meta.ino(), hosted_meta.ino());

    let dir = host.dir().path().to_path_buf();
    host.close().unwrap();
    assert!(!dir.exists());
    assert!(source_path.exists());
}
