use mc_runner::console::{self, ConsoleInputs};
use mc_runner::error::Error;
use mc_runner::server::RuntimeFiles;

fn with_log(contents: &[u8]) -> (tempfile::TempDir, RuntimeFiles) {
    let dir = tempfile::tempdir().unwrap();
    let files = RuntimeFiles::new(dir.path());
    std::fs::create_dir_all(files.logs_dir()).unwrap();
    let log = files.logs_dir().join("console_2024-01-01_00-00-00.log");
    std::fs::write(&log, contents).unwrap();
    std::fs::write(files.pointer_file(), log.to_string_lossy().as_bytes()).unwrap();
    (dir, files)
}

#[tokio::test]
async fn test_tail_returns_last_lines_in_order() {
    let (_dir, files) = with_log(b"one\ntwo\nthree\nfour\nfive\n");

    assert_eq!(console::tail(&files, 2).await, vec!["four", "five"]);
    assert_eq!(console::tail(&files, 100).await.len(), 5);
    assert!(console::tail(&files, 0).await.is_empty());
}

#[tokio::test]
async fn test_tail_without_pointer_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let files = RuntimeFiles::new(dir.path());
    assert!(console::tail(&files, 10).await.is_empty());
}

#[tokio::test]
async fn test_tail_with_vanished_log_is_empty() {
    let (_dir, files) = with_log(b"gone\n");
    std::fs::remove_dir_all(files.logs_dir()).unwrap();
    assert!(console::tail(&files, 10).await.is_empty());
}

#[tokio::test]
async fn test_tail_decodes_invalid_utf8() {
    let (_dir, files) = with_log(b"ok\nbad \xff byte\n");
    let lines = console::tail(&files, 10).await;
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("bad "));
    assert!(lines[1].contains('\u{FFFD}'));
}

#[tokio::test]
async fn test_tail_reports_read_errors_as_a_line() {
    let dir = tempfile::tempdir().unwrap();
    let files = RuntimeFiles::new(dir.path());
    // pointer names a directory, which cannot be read as a file
    std::fs::write(files.pointer_file(), dir.path().to_string_lossy().as_bytes()).unwrap();

    let lines = console::tail(&files, 10).await;
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("Error reading console:"));
}

#[tokio::test]
async fn test_send_without_handle_fails() {
    let inputs = ConsoleInputs::new();
    let result = inputs.send("alpha", 4242, "say hi").await;
    assert!(matches!(result, Err(Error::Process(_))));
}
