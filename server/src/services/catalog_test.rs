use super::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("file has a parent")).expect("create dirs");
    fs::write(path, b"x").expect("write file");
}

/// Two projects: `alpha` with most media types, `beta` with only an album.
fn media_tree() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();
    touch(root, "alpha/poster/0002.png");
    touch(root, "alpha/poster/0001.png");
    touch(root, "alpha/poster/notes.txt");
    touch(root, "alpha/phone/clip.mp4");
    touch(root, "alpha/music/theme.mp3");
    touch(root, "alpha/music/cover.png");
    touch(root, "alpha/billboard/0001.png");
    touch(root, "alpha/thumb.png");
    touch(root, "beta/album/2/a.png");
    touch(root, "beta/album/1/a.png");
    touch(root, "beta/album/1/b.png");
    touch(root, "mp4/legacy.mp4");
    touch(root, "png_sequence/0001.png");
    dir
}

#[test]
fn scan_lists_projects_and_skips_legacy_folders() {
    let dir = media_tree();
    let catalog = Catalog::scan(dir.path()).expect("scan");
    assert_eq!(catalog.project_names(), vec!["alpha".to_owned(), "beta".to_owned()]);
}

#[test]
fn scan_missing_directory_is_empty() {
    let catalog = Catalog::scan(&PathBuf::from("/definitely/not/here")).expect("scan");
    assert!(catalog.project_names().is_empty());
    assert_eq!(catalog.default_source(), FALLBACK_SOURCE);
}

#[test]
fn files_are_filtered_and_sorted() {
    let dir = media_tree();
    let catalog = Catalog::scan(dir.path()).expect("scan");
    let alpha = catalog.project("alpha").expect("alpha");

    let posters: Vec<_> = alpha.poster.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(posters, ["0001.png", "0002.png"]);
    assert_eq!(alpha.poster[0].url, "/media/alpha/poster/0001.png");

    let music: Vec<_> = alpha.music.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(music, ["theme.mp3"]);

    assert_eq!(alpha.thumb.as_ref().map(|t| t.url.as_str()), Some("/media/alpha/thumb.png"));
    assert!(alpha.album.is_none());
}

#[test]
fn album_subfolders_are_scanned() {
    let dir = media_tree();
    let catalog = Catalog::scan(dir.path()).expect("scan");
    let album = catalog.project("beta").and_then(|p| p.album.as_ref()).expect("album");
    assert_eq!(album.keys().collect::<Vec<_>>(), ["1", "2"]);
    assert_eq!(album["1"].len(), 2);
    assert_eq!(album["2"][0].url, "/media/beta/album/2/a.png");
}

#[test]
fn default_source_prefers_poster_of_first_project() {
    let dir = media_tree();
    let catalog = Catalog::scan(dir.path()).expect("scan");
    assert_eq!(catalog.default_source(), "alpha/poster");
}

#[test]
fn default_source_falls_back_to_first_album() {
    let dir = TempDir::new().expect("tempdir");
    touch(dir.path(), "solo/album/1/a.png");
    let catalog = Catalog::scan(dir.path()).expect("scan");
    assert_eq!(catalog.default_source(), "solo/album/1");
}

#[test]
fn default_source_without_playable_media_is_fallback() {
    let dir = TempDir::new().expect("tempdir");
    touch(dir.path(), "quiet/music/theme.mp3");
    let catalog = Catalog::scan(dir.path()).expect("scan");
    assert_eq!(catalog.default_source(), FALLBACK_SOURCE);
}

#[test]
fn summary_counts_media() {
    let dir = media_tree();
    let summary = Catalog::scan(dir.path()).expect("scan").summary();
    assert_eq!(summary.project_count, 2);

    let alpha = &summary.projects[0];
    assert!(alpha.has_poster && alpha.has_phone && alpha.has_music && alpha.has_thumb);
    assert!(!alpha.has_album);
    assert_eq!(alpha.counts.poster, 2);

    let beta = &summary.projects[1];
    assert!(beta.has_album);
    assert_eq!(beta.counts.album, 2);
}

#[test]
fn thumbnails_carry_project_name() {
    let dir = media_tree();
    let thumbs = Catalog::scan(dir.path()).expect("scan").thumbnails();
    assert_eq!(
        thumbs,
        vec![Thumbnail {
            project_name: "alpha".into(),
            file_name: "thumb.png".into(),
            url: "/media/alpha/thumb.png".into(),
        }]
    );
}

#[test]
fn media_lookup_errors() {
    let dir = media_tree();
    let catalog = Catalog::scan(dir.path()).expect("scan");

    assert!(matches!(catalog.media("gamma", "poster", None), Err(CatalogError::ProjectNotFound(_))));
    assert!(matches!(catalog.media("alpha", "hologram", None), Err(CatalogError::InvalidMediaType(_))));
    assert!(matches!(catalog.media("alpha", "album", None), Err(CatalogError::Empty(_))));
    assert!(matches!(catalog.media("beta", "poster", None), Err(CatalogError::Empty(_))));
    assert!(matches!(catalog.media("beta", "album", Some("9")), Err(CatalogError::SubfolderNotFound(_))));
    assert!(matches!(catalog.media("beta", "thumb", None), Err(CatalogError::Empty(_))));
}

#[test]
fn media_lookup_shapes() {
    let dir = media_tree();
    let catalog = Catalog::scan(dir.path()).expect("scan");

    let Ok(MediaData::Files(files)) = catalog.media("alpha", "phone", None) else {
        panic!("phone should be a file list");
    };
    assert_eq!(files[0].file_name, "clip.mp4");

    let Ok(MediaData::Album(album)) = catalog.media("beta", "album", None) else {
        panic!("album without subfolder should be the folder map");
    };
    assert_eq!(album.len(), 2);

    let Ok(MediaData::Files(files)) = catalog.media("beta", "album", Some("1")) else {
        panic!("album subfolder should be a file list");
    };
    assert_eq!(files.len(), 2);

    assert!(matches!(catalog.media("alpha", "thumb", None), Ok(MediaData::Thumb(_))));
}

#[test]
fn error_messages_match_wire_text() {
    assert_eq!(CatalogError::ProjectNotFound("x".into()).to_string(), "Project not found");
    assert_eq!(CatalogError::Empty("poster".into()).to_string(), "No poster found for this project");
    assert!(
        CatalogError::InvalidMediaType("x".into())
            .to_string()
            .starts_with("Invalid media type. Must be one of: poster")
    );
}
