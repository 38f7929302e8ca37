//! Opening from a data directory

use nodwatch::{Error, Nodwatch, NodwatchConfig, Post, CONFIG_FILE_NAME};
use tempfile::TempDir;

#[test]
fn test_open_writes_default_config() {
    let dir = TempDir::new().unwrap();
    let app = Nodwatch::open(dir.path()).unwrap();

    let written = NodwatchConfig::from_file(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
    assert_eq!(&written, app.db().config());
    assert!(written.search.enabled);
}

#[test]
fn test_open_honours_existing_config() {
    let dir = TempDir::new().unwrap();
    let mut config = NodwatchConfig::default();
    config.search.per_page = 2;
    config.write_to_file(&dir.path().join(CONFIG_FILE_NAME)).unwrap();

    let app = Nodwatch::open(dir.path()).unwrap();
    for n in 0..3 {
        app.posts().create(&Post::new(1, format!("screening {}", n))).unwrap();
    }
    let page = app.posts().search("screening", 1).unwrap();
    assert_eq!(page.len(), 2);
    assert!(page.has_next());
}

#[test]
fn test_open_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "[search]\nper_page = 0\n",
    )
    .unwrap();

    assert!(matches!(Nodwatch::open(dir.path()), Err(Error::Config(_))));
}
