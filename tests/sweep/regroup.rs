use vader_hpopt::sweep::regroup_repeats;
use vader_hpopt::table::{Cell, RawTable, Row, append_rows};

#[test]
fn rows_are_dealt_round_robin_into_repeat_files() {
    let dir = tempfile::tempdir().unwrap();
    let trials = dir.path().join("trials");
    let repeats = dir.path().join("repeats");
    std::fs::create_dir_all(&trials).unwrap();

    let header = ["job_id", "repeat", "value"];
    for trial in 0..2_i64 {
        let rows: Vec<Row> = (0..5_i64)
            .map(|r| {
                Row::new()
                    .with("job_id", Cell::Text(format!("t{trial}r{r}")))
                    .with("repeat", Cell::Int(r))
                    .with("value", Cell::Int(trial * 5 + r))
            })
            .collect();
        append_rows(&trials.join(format!("k2_trial{trial}.csv")), &header, &rows).unwrap();
    }

    let files = regroup_repeats(&trials, &repeats, 5).unwrap();
    assert_eq!(files.len(), 5);
    for (r, file) in files.iter().enumerate() {
        assert_eq!(file.file_name().unwrap(), format!("repeat_{r}.csv").as_str());
        let table = RawTable::read(file).unwrap();
        assert_eq!(table.header.iter().collect::<Vec<_>>(), header);
        let values: Vec<&str> = table.records.iter().map(|rec| &rec[2]).collect();
        assert_eq!(values, [r.to_string(), (r + 5).to_string()]);
    }
}

#[test]
fn no_trial_files_means_no_repeat_files() {
    let dir = tempfile::tempdir().unwrap();
    let trials = dir.path().join("trials");
    std::fs::create_dir_all(&trials).unwrap();
    let files = regroup_repeats(&trials, &dir.path().join("repeats"), 3).unwrap();
    assert!(files.is_empty());
}

#[test]
fn repeat_files_beyond_the_current_count_are_removed() {
    let dir = tempfile::tempdir().unwrap();
    let trials = dir.path().join("trials");
    let repeats = dir.path().join("repeats");
    std::fs::create_dir_all(&trials).unwrap();
    std::fs::create_dir_all(&repeats).unwrap();
    for i in 0..4 {
        std::fs::write(repeats.join(format!("repeat_{i}.csv")), "job_id\nold\n").unwrap();
    }
    std::fs::write(repeats.join("notes.csv"), "kept\n").unwrap();

    let rows: Vec<Row> = (0..4_i64)
        .map(|r| Row::new().with("job_id", Cell::Text(format!("j{r}"))))
        .collect();
    append_rows(&trials.join("k2_trial0.csv"), &["job_id"], &rows).unwrap();

    let files = regroup_repeats(&trials, &repeats, 2).unwrap();
    assert_eq!(files.len(), 2);
    let mut names: Vec<String> = std::fs::read_dir(&repeats)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, ["notes.csv", "repeat_0.csv", "repeat_1.csv"]);
    let first = RawTable::read(&files[0]).unwrap();
    assert_eq!(first.records.iter().map(|r| &r[0]).collect::<Vec<_>>(), ["j0", "j2"]);
}
