use std::fs;
use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use skypost_core::config::{Limits, PipelineConfig};
use skypost_core::contract::{
    AddedFile, FetchedImage, MockImageFetcher, PipelineError, PostVariant,
};
use skypost_core::classify::prepare_post;
use tempfile::tempdir;

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn config_for(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::new("main", "posts");
    config.repo_root = root.to_path_buf();
    config
}

fn write_post(root: &Path, rel: &str, content: &str) -> AddedFile {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    AddedFile::new(rel)
}

/// A fetcher that must never be called.
fn no_fetch() -> MockImageFetcher {
    let mut fetcher = MockImageFetcher::new();
    fetcher.expect_fetch().never();
    fetcher
}

#[tokio::test]
async fn plain_post_becomes_text_post() {
    let repo = tempdir().unwrap();
    let file = write_post(repo.path(), "posts/hello.md", "Hello world\n");

    let post = prepare_post(&file, &config_for(repo.path()), &no_fetch())
        .await
        .unwrap();
    assert_eq!(
        post,
        PostVariant::Text {
            text: "Hello world".into()
        }
    );
}

#[tokio::test]
async fn local_image_next_to_post_becomes_image_post() {
    let repo = tempdir().unwrap();
    fs::create_dir_all(repo.path().join("posts")).unwrap();
    let png = png_bytes(6, 4);
    fs::write(repo.path().join("posts/cat.png"), &png).unwrap();
    let file = write_post(
        repo.path(),
        "posts/cat.md",
        "---\nimage: cat.png\nalt: a cat\n---\nMy cat",
    );

    let post = prepare_post(&file, &config_for(repo.path()), &no_fetch())
        .await
        .unwrap();
    match post {
        PostVariant::Image {
            text,
            image_data,
            alt_text,
        } => {
            assert_eq!(text, "My cat");
            assert_eq!(alt_text, "a cat");
            let decoded = image::load_from_memory(&image_data).unwrap();
            assert_eq!(decoded.to_rgb8(), image::load_from_memory(&png).unwrap().to_rgb8());
        }
        other => panic!("expected image post, got {other:?}"),
    }
}

#[tokio::test]
async fn image_path_is_relative_to_the_post_directory() {
    let repo = tempdir().unwrap();
    fs::create_dir_all(repo.path().join("posts/2024/img")).unwrap();
    fs::write(repo.path().join("posts/2024/img/dog.png"), png_bytes(2, 2)).unwrap();
    // Same file name at the repository root must not be picked up.
    fs::write(repo.path().join("dog.png"), b"garbage").unwrap();
    let file = write_post(
        repo.path(),
        "posts/2024/dog.md",
        "---\nimage: img/dog.png\nalt: a dog\n---\nWoof",
    );

    let post = prepare_post(&file, &config_for(repo.path()), &no_fetch())
        .await
        .unwrap();
    assert_eq!(post.kind(), "post with image");
}

#[tokio::test]
async fn remote_image_builds_card_post() {
    let repo = tempdir().unwrap();
    let file = write_post(
        repo.path(),
        "posts/link.md",
        "---\nimage: https://example.com/thumb.png\ntitle: Example\ndescription: An example site\nuri: https://example.com\n---\nWorth a read",
    );

    let png = png_bytes(3, 3);
    let body = png.clone();
    let mut fetcher = MockImageFetcher::new();
    fetcher
        .expect_fetch()
        .withf(|url: &str| url == "https://example.com/thumb.png")
        .times(1)
        .returning(move |_| {
            Ok(FetchedImage {
                status: 200,
                body: body.clone(),
            })
        });

    let post = prepare_post(&file, &config_for(repo.path()), &fetcher)
        .await
        .unwrap();
    match post {
        PostVariant::Card {
            text,
            card_title,
            card_description,
            card_uri,
            ..
        } => {
            assert_eq!(text, "Worth a read");
            assert_eq!(card_title, "Example");
            assert_eq!(card_description, "An example site");
            assert_eq!(card_uri, "https://example.com");
        }
        other => panic!("expected card post, got {other:?}"),
    }
}

#[tokio::test]
async fn unsuccessful_download_is_fatal() {
    let repo = tempdir().unwrap();
    let file = write_post(
        repo.path(),
        "posts/broken.md",
        "---\nimage: https://example.com/missing.png\nalt: gone\n---\nOops",
    );

    let mut fetcher = MockImageFetcher::new();
    fetcher.expect_fetch().times(1).returning(|_| {
        Ok(FetchedImage {
            status: 404,
            body: b"not found".to_vec(),
        })
    });

    let err = prepare_post(&file, &config_for(repo.path()), &fetcher)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Fetch(_)), "got {err:?}");
    assert!(err.to_string().contains("HTTP 404"));
}

#[tokio::test]
async fn missing_local_image_is_fatal() {
    let repo = tempdir().unwrap();
    let file = write_post(
        repo.path(),
        "posts/cat.md",
        "---\nimage: cat.png\nalt: a cat\n---\nMy cat",
    );

    let err = prepare_post(&file, &config_for(repo.path()), &no_fetch())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("does not exist"), "got {err}");
}

#[tokio::test]
async fn image_without_alt_is_fatal_even_when_image_resolves() {
    let repo = tempdir().unwrap();
    fs::create_dir_all(repo.path().join("posts")).unwrap();
    fs::write(repo.path().join("posts/cat.png"), png_bytes(2, 2)).unwrap();
    let file = write_post(repo.path(), "posts/cat.md", "---\nimage: cat.png\n---\nMy cat");

    let err = prepare_post(&file, &config_for(repo.path()), &no_fetch())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("alt text is required"), "got {err}");
}

#[tokio::test]
async fn oversized_image_is_fatal() {
    let repo = tempdir().unwrap();
    fs::create_dir_all(repo.path().join("posts")).unwrap();
    fs::write(repo.path().join("posts/big.png"), png_bytes(64, 64)).unwrap();
    let file = write_post(
        repo.path(),
        "posts/big.md",
        "---\nimage: big.png\nalt: big\n---\nHuge",
    );

    let mut config = config_for(repo.path());
    config.limits = Limits {
        max_post_length: 300,
        max_image_bytes: 16,
    };

    let err = prepare_post(&file, &config, &no_fetch()).await.unwrap_err();
    assert!(err.to_string().contains("exceeds 16 bytes"), "got {err}");
}

#[tokio::test]
async fn text_length_limit_is_inclusive() {
    let repo = tempdir().unwrap();
    let mut config = config_for(repo.path());
    config.limits.max_post_length = 10;

    let exact = write_post(repo.path(), "posts/exact.md", "0123456789");
    assert!(prepare_post(&exact, &config, &no_fetch()).await.is_ok());

    let over = write_post(repo.path(), "posts/over.md", "0123456789X");
    let err = prepare_post(&over, &config, &no_fetch()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)), "got {err:?}");
}

#[tokio::test]
async fn empty_body_is_fatal() {
    let repo = tempdir().unwrap();
    let file = write_post(repo.path(), "posts/empty.md", "---\n---\n   \n");

    let err = prepare_post(&file, &config_for(repo.path()), &no_fetch())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("cannot be empty"), "got {err}");
}

#[tokio::test]
async fn malformed_front_matter_is_fatal() {
    let repo = tempdir().unwrap();
    let file = write_post(repo.path(), "posts/bad.md", "---\nalt: [oops\n---\nText");

    let err = prepare_post(&file, &config_for(repo.path()), &no_fetch())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::FrontMatter(_)), "got {err:?}");
    assert!(err.to_string().contains("bad.md"), "got {err}");
}
