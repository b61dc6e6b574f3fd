use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, SystemTime};

use picture_show::tasks::trash::{retire, sweep, sweep_at};
use tempfile::tempdir;

const DAY: u64 = 86_400;

fn touch_aged(path: &Path, now: SystemTime, age: Duration) {
    fs::write(path, b"x").unwrap();
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(now - age).unwrap();
}

#[test]
fn sweep_deletes_only_files_past_the_threshold() {
    let tmp = tempdir().unwrap();
    let now = SystemTime::now();
    let old = tmp.path().join("1_old.jpg");
    let edge = tmp.path().join("2_edge.jpg");
    let fresh = tmp.path().join("3_fresh.jpg");
    touch_aged(&old, now, Duration::from_secs(3 * DAY + 1));
    touch_aged(&edge, now, Duration::from_secs(3 * DAY - 1));
    touch_aged(&fresh, now, Duration::from_secs(60));
    fs::create_dir(tmp.path().join("ancient_dir")).unwrap();

    assert_eq!(sweep_at(tmp.path(), 3, now).unwrap(), 1);
    assert!(!old.exists());
    assert!(edge.exists());
    assert!(fresh.exists());
    assert!(tmp.path().join("ancient_dir").is_dir());
}

#[test]
fn non_positive_retention_deletes_nothing() {
    let tmp = tempdir().unwrap();
    let now = SystemTime::now();
    let old = tmp.path().join("old.png");
    touch_aged(&old, now, Duration::from_secs(400 * DAY));

    assert_eq!(sweep(tmp.path(), 0).unwrap(), 0);
    assert_eq!(sweep(tmp.path(), -5).unwrap(), 0);
    assert!(old.exists());
}

#[test]
fn retire_moves_upload_out_of_the_source_folder() {
    let tmp = tempdir().unwrap();
    let uploaded = tmp.path().join("uploaded");
    let trash = tmp.path().join("trash");
    fs::create_dir_all(&uploaded).unwrap();
    let src = uploaded.join("holiday.JPG");
    fs::write(&src, b"pixels").unwrap();

    let dest = retire(&src, &trash).unwrap();
    assert!(!src.exists());
    assert_eq!(fs::read_dir(&uploaded).unwrap().count(), 0);

    let name = dest.file_name().unwrap().to_string_lossy().to_string();
    let (stamp, rest) = name.split_once('_').unwrap();
    assert_eq!(rest, "holiday.JPG");
    assert!(stamp.parse::<i64>().unwrap() > 1_600_000_000);
    assert_eq!(fs::read(&dest).unwrap(), b"pixels");
}
