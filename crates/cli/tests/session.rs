use annotator_core::local::LocalScanSource;
use annotator_core::source::{with_scan_source, Source};
use cli::session;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn cohort(dir: &Path) {
    fs::write(dir.join("scan_a.nii.gz"), "volume-a").unwrap();
    fs::write(dir.join("scan_b.nii.gz"), "volume-b").unwrap();
    fs::write(dir.join("scan_b.json"), "{\"annotations\":{}}").unwrap();
    fs::write(dir.join("scan_c.nii.gz"), "volume-c").unwrap();
}

fn local_source(dir: &Path) -> Source {
    Source::Local(LocalScanSource::from_directory(dir).unwrap())
}

#[test]
fn status_reports_every_scan_with_its_annotation_state() {
    let temp = tempdir().unwrap();
    cohort(temp.path());

    let rows = with_scan_source(local_source(temp.path()), |source| {
        session::collect_status(source)
    })
    .unwrap();

    let summary: Vec<(&str, bool)> = rows
        .iter()
        .map(|row| (row.label.as_str(), row.has_annotation))
        .collect();
    assert_eq!(
        summary,
        vec![("scan_a", false), ("scan_b", true), ("scan_c", false)]
    );
}

#[test]
fn push_stores_the_artifact_for_the_named_scan() {
    let temp = tempdir().unwrap();
    cohort(temp.path());
    let artifact_dir = tempdir().unwrap();
    let artifact = artifact_dir.path().join("landmarks.json");
    fs::write(&artifact, "{\"scan\":\"c\"}").unwrap();

    with_scan_source(local_source(temp.path()), |source| {
        session::push(source, "scan_c", &artifact)
    })
    .unwrap();

    assert_eq!(
        fs::read_to_string(temp.path().join("scan_c.json")).unwrap(),
        "{\"scan\":\"c\"}"
    );
}

#[test]
fn push_for_an_unknown_label_fails_without_side_effects() {
    let temp = tempdir().unwrap();
    cohort(temp.path());
    let artifact_dir = tempdir().unwrap();
    let artifact = artifact_dir.path().join("landmarks.json");
    fs::write(&artifact, "{}").unwrap();

    let result = with_scan_source(local_source(temp.path()), |source| {
        session::push(source, "scan_z", &artifact)
    });

    assert!(result.is_err());
    assert!(!temp.path().join("scan_z.json").exists());
}

#[test]
fn fetch_copies_the_stored_annotation_out() {
    let temp = tempdir().unwrap();
    cohort(temp.path());
    let dest_dir = tempdir().unwrap();
    let dest = dest_dir.path().join("recovered.json");

    with_scan_source(local_source(temp.path()), |source| {
        session::fetch(source, "scan_b", &dest)
    })
    .unwrap();

    assert_eq!(
        fs::read_to_string(&dest).unwrap(),
        "{\"annotations\":{}}"
    );
}

#[test]
fn fetch_refuses_a_scan_without_annotation() {
    let temp = tempdir().unwrap();
    cohort(temp.path());
    let dest_dir = tempdir().unwrap();
    let dest = dest_dir.path().join("recovered.json");

    let result = with_scan_source(local_source(temp.path()), |source| {
        session::fetch(source, "scan_a", &dest)
    });

    assert!(result.is_err());
    assert!(!dest.exists());
}

#[test]
fn seek_walks_to_the_named_scan() {
    let temp = tempdir().unwrap();
    cohort(temp.path());

    let found = with_scan_source(local_source(temp.path()), |source| {
        session::seek(source, "scan_b")
    })
    .unwrap();

    let descriptor = found.unwrap();
    assert_eq!(descriptor.label, "scan_b");
    assert!(descriptor.has_annotation);
}

#[test]
fn pull_copies_the_materialized_files_into_the_target() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("solo.nii.gz"), "volume").unwrap();
    let out_dir = tempdir().unwrap();
    let out = out_dir.path().join("export");

    let copied = with_scan_source(local_source(temp.path()), |source| {
        session::pull(source, "solo", &out)
    })
    .unwrap();

    assert_eq!(copied, 1);
    assert_eq!(fs::read_to_string(out.join("solo.nii.gz")).unwrap(), "volume");
}
