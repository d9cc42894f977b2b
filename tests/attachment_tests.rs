//! Integration tests for attachment resolution.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use integrations_smtp_connector::{
    resolve, AttachmentDescriptor, AttachmentResolver, AttachmentsRoot, ConnectorConfig,
    ConnectorErrorKind,
};
use rstest::rstest;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Lays out `<tmp>/attachments` with a few files and a sibling
/// `<tmp>/attachments-evil` holding a secret.
fn fixture() -> (TempDir, AttachmentsRoot) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("attachments");
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::write(root.join("report.pdf"), b"%PDF-1.4 fake").unwrap();
    fs::write(root.join("sub").join("x.txt"), b"nested").unwrap();

    let evil = tmp.path().join("attachments-evil");
    fs::create_dir_all(&evil).unwrap();
    fs::write(evil.join("secret.txt"), b"top secret").unwrap();
    fs::write(tmp.path().join("outside.txt"), b"outside").unwrap();

    let root = AttachmentsRoot::new(&root).unwrap();
    (tmp, root)
}

#[test]
fn test_inline_roundtrip() {
    let (_tmp, root) = fixture();
    let payload = b"hello, attachment";
    let descriptor =
        AttachmentDescriptor::inline(BASE64.encode(payload), "hello.txt", "text/plain");

    let resolved = resolve(&descriptor, &root).unwrap();

    assert_eq!(resolved.bytes, payload);
    assert_eq!(resolved.filename, "hello.txt");
    assert_eq!(resolved.mime_type, "text/plain");
}

#[test]
fn test_inline_invalid_base64() {
    let (_tmp, root) = fixture();
    let descriptor = AttachmentDescriptor::inline("not base64!!", "bad.bin", "application/octet-stream");

    let err = resolve(&descriptor, &root).unwrap_err();
    assert_eq!(err.kind(), ConnectorErrorKind::Decoding);
}

#[test]
fn test_path_in_root() {
    let (_tmp, root) = fixture();

    let resolved = resolve(&AttachmentDescriptor::path("report.pdf"), &root).unwrap();

    assert_eq!(resolved.bytes, b"%PDF-1.4 fake");
    assert_eq!(resolved.filename, "report.pdf");
    assert_eq!(resolved.mime_type, "application/pdf");
}

#[test]
fn test_path_in_subdirectory() {
    let (_tmp, root) = fixture();

    let resolved = resolve(&AttachmentDescriptor::path("sub/x.txt"), &root).unwrap();

    assert_eq!(resolved.bytes, b"nested");
    assert_eq!(resolved.filename, "x.txt");
}

#[test]
fn test_path_overrides() {
    let (_tmp, root) = fixture();
    let descriptor = AttachmentDescriptor::path("sub/x.txt")
        .with_filename("renamed.csv")
        .with_mime_type("text/csv");

    let resolved = resolve(&descriptor, &root).unwrap();

    assert_eq!(resolved.filename, "renamed.csv");
    assert_eq!(resolved.mime_type, "text/csv");
}

#[test]
fn test_path_not_found() {
    let (_tmp, root) = fixture();

    let err = resolve(&AttachmentDescriptor::path("missing.pdf"), &root).unwrap_err();
    assert_eq!(err.kind(), ConnectorErrorKind::NotFound);
}

#[test]
fn test_directory_is_not_an_attachment() {
    let (_tmp, root) = fixture();

    let err = resolve(&AttachmentDescriptor::path("sub"), &root).unwrap_err();
    assert_eq!(err.kind(), ConnectorErrorKind::NotFound);
}

#[rstest]
#[case("../outside.txt")]
#[case("../attachments-evil/secret.txt")]
#[case("sub/../../outside.txt")]
#[case("./../outside.txt")]
fn test_traversal_blocked(#[case] path: &str) {
    let (_tmp, root) = fixture();

    let err = resolve(&AttachmentDescriptor::path(path), &root).unwrap_err();
    assert_eq!(err.kind(), ConnectorErrorKind::PathTraversal, "path {:?}", path);
}

#[rstest]
#[case("")]
#[case("   ")]
#[case("/etc/passwd")]
#[case("sub/../report.pdf")]
#[case("C:\\Windows\\win.ini")]
fn test_invalid_paths_rejected(#[case] path: &str) {
    let (_tmp, root) = fixture();

    let err = resolve(&AttachmentDescriptor::path(path), &root).unwrap_err();
    assert_eq!(err.kind(), ConnectorErrorKind::Validation, "path {:?}", path);
}

#[test]
fn test_sibling_prefix_is_outside_root() {
    let tmp = TempDir::new().unwrap();
    let root_dir = tmp.path().join("attachments");
    let evil_dir = tmp.path().join("attachments-evil");
    fs::create_dir_all(&root_dir).unwrap();
    fs::create_dir_all(&evil_dir).unwrap();
    fs::write(evil_dir.join("secret.txt"), b"top secret").unwrap();

    let root = AttachmentsRoot::new(&root_dir).unwrap();
    let evil = fs::canonicalize(evil_dir.join("secret.txt")).unwrap();

    // String-prefix containment would accept this path
    assert!(evil.to_string_lossy().starts_with(&*root.path().to_string_lossy()));

    let err = integrations_smtp_connector::attachment::path::ensure_within(root.path(), &evil)
        .unwrap_err();
    assert_eq!(err.kind(), ConnectorErrorKind::PathTraversal);
}

#[cfg(unix)]
#[test]
fn test_symlink_escaping_root_blocked() {
    let (tmp, root) = fixture();
    std::os::unix::fs::symlink(
        tmp.path().join("outside.txt"),
        root.path().join("link.txt"),
    )
    .unwrap();

    let err = resolve(&AttachmentDescriptor::path("link.txt"), &root).unwrap_err();
    assert_eq!(err.kind(), ConnectorErrorKind::PathTraversal);
}

#[cfg(unix)]
#[test]
fn test_symlinked_directory_out_of_root_hides_existence() {
    let (tmp, root) = fixture();
    std::os::unix::fs::symlink(tmp.path().join("attachments-evil"), root.path().join("evil"))
        .unwrap();

    for path in ["evil/secret.txt", "evil/missing.txt", "evil/deeper/missing.txt"] {
        let err = resolve(&AttachmentDescriptor::path(path), &root).unwrap_err();
        assert_eq!(err.kind(), ConnectorErrorKind::PathTraversal, "path {:?}", path);
    }
}

#[cfg(unix)]
#[test]
fn test_symlink_inside_root_allowed() {
    let (_tmp, root) = fixture();
    std::os::unix::fs::symlink(
        root.path().join("sub").join("x.txt"),
        root.path().join("alias.txt"),
    )
    .unwrap();

    let resolved = resolve(&AttachmentDescriptor::path("alias.txt"), &root).unwrap();
    assert_eq!(resolved.bytes, b"nested");
    assert_eq!(resolved.filename, "x.txt");
}

#[test]
fn test_size_limit_applies_to_both_sources() {
    let (_tmp, root) = fixture();
    let resolver = AttachmentResolver::new(root.clone(), 8);

    let err = resolver
        .resolve(&AttachmentDescriptor::path("report.pdf"))
        .unwrap_err();
    assert_eq!(err.kind(), ConnectorErrorKind::AttachmentTooLarge);

    let inline = AttachmentDescriptor::inline(BASE64.encode([0u8; 9]), "nine.bin", "application/octet-stream");
    let err = resolver.resolve(&inline).unwrap_err();
    assert_eq!(err.kind(), ConnectorErrorKind::AttachmentTooLarge);

    let fits = AttachmentDescriptor::inline(BASE64.encode([0u8; 8]), "eight.bin", "application/octet-stream");
    assert_eq!(resolver.resolve(&fits).unwrap().len(), 8);
}

#[test]
fn test_root_must_be_absolute_directory() {
    let (tmp, _root) = fixture();

    let err = AttachmentsRoot::new("relative/attachments").unwrap_err();
    assert_eq!(err.kind(), ConnectorErrorKind::Configuration);

    let err = AttachmentsRoot::new(tmp.path().join("outside.txt")).unwrap_err();
    assert_eq!(err.kind(), ConnectorErrorKind::Configuration);

    let err = AttachmentsRoot::new(tmp.path().join("nope")).unwrap_err();
    assert_eq!(err.kind(), ConnectorErrorKind::Configuration);
}

#[test]
fn test_resolver_without_root_rejects_paths() {
    let config = ConnectorConfig::default();
    let resolver = AttachmentResolver::from_config(&config);

    let err = resolver
        .resolve(&AttachmentDescriptor::path("report.pdf"))
        .unwrap_err();
    assert_eq!(err.kind(), ConnectorErrorKind::Configuration);

    let inline = AttachmentDescriptor::inline("aGk=", "hi.txt", "text/plain");
    assert_eq!(resolver.resolve(&inline).unwrap().bytes, b"hi");
}

#[tokio::test]
async fn test_resolve_all_keeps_order() {
    let (_tmp, root) = fixture();
    let resolver = AttachmentResolver::new(root, 1024);

    let resolved = resolver
        .resolve_all(vec![
            AttachmentDescriptor::path("sub/x.txt"),
            AttachmentDescriptor::inline("aGk=", "hi.txt", "text/plain"),
            AttachmentDescriptor::path("report.pdf"),
        ])
        .await
        .unwrap();

    let names: Vec<&str> = resolved.iter().map(|a| a.filename.as_str()).collect();
    assert_eq!(names, vec!["x.txt", "hi.txt", "report.pdf"]);
}

#[tokio::test]
async fn test_resolve_all_reports_first_failure() {
    let (_tmp, root) = fixture();
    let resolver = AttachmentResolver::new(root, 1024);

    let err = resolver
        .resolve_all(vec![
            AttachmentDescriptor::path("report.pdf"),
            AttachmentDescriptor::path("../outside.txt"),
            AttachmentDescriptor::path("missing.txt"),
        ])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ConnectorErrorKind::PathTraversal);
}

#[test]
fn test_root_path_is_canonical() {
    let (tmp, root) = fixture();
    let dotted = tmp.path().join("attachments").join("sub").join("..");

    let again = AttachmentsRoot::new(&dotted).unwrap();
    assert_eq!(again.path(), root.path());
    assert!(Path::new(root.path()).is_absolute());
}
