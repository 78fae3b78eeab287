use annotator_core::local::LocalScanSource;
use annotator_core::source::{with_scan_source, Advance, ScanSource, SourceError};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Three-scan cohort with the middle scan already annotated.
fn cohort(dir: &Path) {
    fs::write(dir.join("scan_a.nii.gz"), "volume-a").unwrap();
    fs::write(dir.join("scan_b.nii.gz"), "volume-b").unwrap();
    fs::write(dir.join("scan_b.json"), "{\"annotations\":{}}").unwrap();
    fs::write(dir.join("scan_c.nii.gz"), "volume-c").unwrap();
    // Unrelated files never enter the catalog.
    fs::write(dir.join("notes.txt"), "ignore me").unwrap();
}

fn advance_label(source: &mut impl ScanSource) -> Option<(String, bool)> {
    match source.advance().unwrap() {
        Advance::Item(descriptor) => Some((descriptor.label, descriptor.has_annotation)),
        Advance::EndOfCatalog => None,
    }
}

#[test]
fn iterates_scans_in_order_with_annotation_flags() {
    let temp = tempdir().unwrap();
    cohort(temp.path());
    let mut source = LocalScanSource::from_directory(temp.path()).unwrap();
    assert_eq!(source.len(), 3);

    assert_eq!(advance_label(&mut source), Some(("scan_a".into(), false)));
    assert_eq!(advance_label(&mut source), Some(("scan_b".into(), true)));
    assert_eq!(advance_label(&mut source), Some(("scan_c".into(), false)));
    assert_eq!(advance_label(&mut source), None);
    // Exhaustion is stable, not a crash.
    assert_eq!(advance_label(&mut source), None);
}

#[test]
fn skip_annotated_never_surfaces_an_annotated_row() {
    let temp = tempdir().unwrap();
    cohort(temp.path());
    let mut source = LocalScanSource::from_directory(temp.path()).unwrap();
    source.set_skip_already_annotated(true);

    assert_eq!(advance_label(&mut source), Some(("scan_a".into(), false)));
    assert_eq!(advance_label(&mut source), Some(("scan_c".into(), false)));
    assert_eq!(advance_label(&mut source), None);
}

#[test]
fn skip_exhausts_when_every_remaining_row_is_annotated() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("only.nii.gz"), "volume").unwrap();
    fs::write(temp.path().join("only.json"), "{}").unwrap();
    let mut source = LocalScanSource::from_directory(temp.path()).unwrap();
    source.set_skip_already_annotated(true);

    assert_eq!(advance_label(&mut source), None);
}

#[test]
fn begin_restarts_iteration_without_reloading() {
    let temp = tempdir().unwrap();
    cohort(temp.path());
    let mut source = LocalScanSource::from_directory(temp.path()).unwrap();

    advance_label(&mut source);
    advance_label(&mut source);
    source.begin();
    assert_eq!(advance_label(&mut source), Some(("scan_a".into(), false)));
}

#[test]
fn materialize_points_at_the_residing_directory() {
    let temp = tempdir().unwrap();
    cohort(temp.path());
    let mut source = LocalScanSource::from_directory(temp.path()).unwrap();

    advance_label(&mut source);
    let dir = source.materialize_local_copy().unwrap();
    assert_eq!(dir, temp.path());
    // Calling it again within the step changes nothing.
    assert_eq!(source.materialize_local_copy().unwrap(), temp.path());
}

#[test]
fn store_annotation_copies_the_artifact_beside_the_scan() {
    let temp = tempdir().unwrap();
    cohort(temp.path());
    let artifact_dir = tempdir().unwrap();
    let artifact = artifact_dir.path().join("landmarks.json");
    fs::write(&artifact, "{\"scan\":\"a\"}").unwrap();

    let mut source = LocalScanSource::from_directory(temp.path()).unwrap();
    advance_label(&mut source);
    source.store_annotation(&artifact).unwrap();

    let stored = temp.path().join("scan_a.json");
    assert_eq!(fs::read_to_string(stored).unwrap(), "{\"scan\":\"a\"}");
}

#[test]
fn load_existing_annotation_pairs_by_file_stem() {
    let temp = tempdir().unwrap();
    cohort(temp.path());
    let mut source = LocalScanSource::from_directory(temp.path()).unwrap();

    advance_label(&mut source);
    assert_eq!(source.load_existing_annotation().unwrap(), None);

    advance_label(&mut source);
    let path = source.load_existing_annotation().unwrap().unwrap();
    assert_eq!(path, temp.path().join("scan_b.json"));
}

#[test]
fn current_scan_operations_before_advance_are_usage_errors() {
    let temp = tempdir().unwrap();
    cohort(temp.path());
    let mut source = LocalScanSource::from_directory(temp.path()).unwrap();

    let err = source.store_annotation(Path::new("x.json")).unwrap_err();
    assert!(matches!(err, SourceError::NoActiveScan));
    let err = source.materialize_local_copy().unwrap_err();
    assert!(matches!(err, SourceError::NoActiveScan));
}

#[test]
fn manifest_listing_preserves_row_order() {
    let temp = tempdir().unwrap();
    cohort(temp.path());
    let manifest = temp.path().join("cohort.csv");
    let rows = format!(
        "path\n{}\n{}\n",
        temp.path().join("scan_c.nii.gz").display(),
        temp.path().join("scan_a.nii.gz").display()
    );
    fs::write(&manifest, rows).unwrap();

    let mut source = LocalScanSource::from_manifest(&manifest).unwrap();
    assert_eq!(advance_label(&mut source), Some(("scan_c".into(), false)));
    assert_eq!(advance_label(&mut source), Some(("scan_a".into(), false)));
    assert_eq!(advance_label(&mut source), None);
}

#[test]
fn teardown_is_idempotent() {
    let temp = tempdir().unwrap();
    cohort(temp.path());
    let mut source = LocalScanSource::from_directory(temp.path()).unwrap();
    advance_label(&mut source);
    source.teardown();
    source.teardown();
}

#[test]
fn scoped_run_tears_down_on_both_exit_paths() {
    let temp = tempdir().unwrap();
    cohort(temp.path());

    let source = LocalScanSource::from_directory(temp.path()).unwrap();
    let count = with_scan_source(source, |source| -> Result<usize, SourceError> {
        let mut count = 0;
        while let Advance::Item(_) = source.advance()? {
            count += 1;
        }
        Ok(count)
    })
    .unwrap();
    assert_eq!(count, 3);

    let source = LocalScanSource::from_directory(temp.path()).unwrap();
    let result = with_scan_source(source, |_| -> Result<(), SourceError> {
        Err(SourceError::NoActiveScan)
    });
    assert!(result.is_err());
}
