// 图片源的集成测试：NASA 内容过滤、Unsplash 付费图过滤、下载中途取消与超时

mod common;

use std::time::{Duration, Instant};

use common::{Reply, TestServer};
use serde_json::json;
use wallseek::setter::DryRun;
use wallseek::source::{ImageSource, NasaClient, UnsplashClient};
use wallseek::{
    CancelHandle, CancelToken, Error, Monitor, Resolution, UpdateParams, WallpaperService,
};

fn res(w: u32, h: u32) -> Option<Resolution> {
    Some(Resolution::new(w, h).unwrap())
}

/// 注册一个 NASA 条目：资源列表 + 图片本身
fn nasa_item(server: &TestServer, name: &str, title: &str, image: Reply) -> serde_json::Value {
    let asset_list = format!("/asset/{name}.json");
    let image_path = format!("/img/{name}~orig.jpg");
    server.route(
        &asset_list,
        Reply::Json(
            json!([
                server.url(&format!("/img/{name}~thumb.jpg")),
                server.url(&image_path),
            ])
            .to_string(),
        ),
    );
    server.route(&image_path, image);
    json!({
        "href": server.url(&asset_list),
        "data": [{ "title": title, "description": "", "keywords": [] }]
    })
}

fn nasa_search(server: &TestServer, items: Vec<serde_json::Value>) {
    server.route(
        "/search",
        Reply::Json(json!({ "collection": { "items": items } }).to_string()),
    );
}

#[tokio::test]
async fn nasa_skips_blocked_titles() {
    let server = TestServer::start().await;
    let spectrum = nasa_item(
        &server,
        "spectrum",
        "Spectrum of a distant star",
        Reply::Bytes(common::jpeg(1920, 1080)),
    );
    let mars = nasa_item(
        &server,
        "mars",
        "Mars surface",
        Reply::Bytes(common::jpeg(1920, 1080)),
    );
    nasa_search(&server, vec![spectrum, mars]);

    let nasa = NasaClient::with_base_url(common::client(Duration::from_secs(10)), server.url(""));
    let image = nasa
        .search(&CancelToken::never(), "mars", res(1920, 1080))
        .await
        .unwrap();

    assert_eq!(image.size(), Resolution::new(1920, 1080).unwrap());
    assert_eq!(server.hits("/asset/mars.json"), 1);
    assert_eq!(server.hits("/asset/spectrum.json"), 0);
    assert_eq!(server.hits("/img/mars~orig.jpg"), 1);
    assert_eq!(server.hits("/img/mars~thumb.jpg"), 0);
}

#[tokio::test]
async fn nasa_uses_unfiltered_list_when_everything_is_blocked() {
    let server = TestServer::start().await;
    let chart = nasa_item(
        &server,
        "chart",
        "Temperature chart",
        Reply::Bytes(common::png(1600, 1000)),
    );
    nasa_search(&server, vec![chart]);

    let nasa = NasaClient::with_base_url(common::client(Duration::from_secs(10)), server.url(""));
    let image = nasa
        .search(&CancelToken::never(), "temperature", None)
        .await
        .unwrap();
    assert_eq!(image.size(), Resolution::new(1600, 1000).unwrap());
}

#[tokio::test]
async fn nasa_rejects_mismatched_aspect_ratio() {
    let server = TestServer::start().await;
    let wide = nasa_item(
        &server,
        "wide",
        "Earth limb",
        Reply::Bytes(common::png(3840, 1080)),
    );
    nasa_search(&server, vec![wide]);

    let nasa = NasaClient::with_base_url(common::client(Duration::from_secs(10)), server.url(""));
    let err = nasa
        .search(&CancelToken::never(), "earth", res(1920, 1200))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoSuitableImage(1)), "{err:?}");
}

#[tokio::test]
async fn nasa_empty_collection_is_no_results() {
    let server = TestServer::start().await;
    nasa_search(&server, vec![]);

    let nasa = NasaClient::with_base_url(common::client(Duration::from_secs(10)), server.url(""));
    let err = nasa
        .search(&CancelToken::never(), "nothing", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoResults(q) if q == "nothing"));
}

fn photo(id: &str, full: String, premium: bool) -> serde_json::Value {
    json!({
        "id": id,
        "width": 4000,
        "height": 3000,
        "urls": { "full": full },
        "premium": premium,
        "plus": false
    })
}

#[tokio::test]
async fn unsplash_never_downloads_premium_photos() {
    let server = TestServer::start().await;
    server.route(
        "/photos/random",
        Reply::Json(
            json!([
                photo("p1", server.url("/img/p1.jpg"), true),
                photo("free", server.url("/img/free.jpg?ixid=abc"), false),
                photo("p2", server.url("/img/p2.jpg"), true),
            ])
            .to_string(),
        ),
    );
    server.route("/img/free.jpg", Reply::Bytes(common::jpeg(1920, 1080)));

    let unsplash = UnsplashClient::with_base_url(
        common::client(Duration::from_secs(10)),
        Some("abc123".into()),
        server.url(""),
    );
    let image = unsplash
        .search(&CancelToken::never(), "forest", res(1920, 1080))
        .await
        .unwrap();

    assert_eq!(image.size(), Resolution::new(1920, 1080).unwrap());
    assert_eq!(server.hits("/img/p1.jpg"), 0);
    assert_eq!(server.hits("/img/p2.jpg"), 0);

    let requests = server.requests();
    let api = requests
        .iter()
        .find(|r| r.starts_with("GET /photos/random"))
        .unwrap()
        .to_lowercase();
    assert!(api.contains("authorization: client-id abc123"));
    assert!(api.contains("orientation=landscape"));

    let download = requests
        .iter()
        .find(|r| r.starts_with("GET /img/free.jpg"))
        .unwrap();
    assert!(download.contains("ixid=abc&w=1920&h=1080"));
}

#[tokio::test]
async fn unsplash_gives_up_after_premium_only_responses() {
    let server = TestServer::start().await;
    server.route(
        "/photos/random",
        Reply::Json(json!([photo("p1", server.url("/img/p1.jpg"), true)]).to_string()),
    );

    let unsplash =
        UnsplashClient::with_base_url(common::client(Duration::from_secs(10)), None, server.url(""));
    let err = unsplash
        .search(&CancelToken::never(), "forest", None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::OnlyPremium(5)), "{err:?}");
    assert_eq!(server.hits("/photos/random"), 5);
    assert_eq!(server.hits("/img/p1.jpg"), 0);
}

#[tokio::test]
async fn unsplash_http_error_is_reported() {
    let server = TestServer::start().await;
    server.route("/photos/random", Reply::Status(403));

    let unsplash =
        UnsplashClient::with_base_url(common::client(Duration::from_secs(10)), None, server.url(""));
    let err = unsplash
        .search(&CancelToken::never(), "forest", None)
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::Status { status, .. } if status.as_u16() == 403),
        "{err:?}"
    );
}

#[tokio::test]
async fn stalled_download_times_out_with_url() {
    let server = TestServer::start().await;
    server.route(
        "/photos/random",
        Reply::Json(json!([photo("slow", server.url("/img/slow.jpg"), false)]).to_string()),
    );
    server.route(
        "/img/slow.jpg",
        Reply::Stall {
            head: Vec::new(),
            declared_len: 1 << 20,
        },
    );

    let unsplash = UnsplashClient::with_base_url(
        common::client(Duration::from_millis(300)),
        None,
        server.url(""),
    );
    let err = unsplash
        .search(&CancelToken::never(), "forest", None)
        .await
        .unwrap_err();
    match err {
        Error::ConnectionTimeout { url } => assert!(url.contains("/img/slow.jpg"), "{url}"),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn cancel_mid_download_stops_the_update() {
    let server = TestServer::start().await;
    let full = common::jpeg(1920, 1080);
    let stalled = Reply::Stall {
        head: full[..full.len().min(4096)].to_vec(),
        declared_len: full.len(),
    };
    let item = nasa_item(&server, "moon", "Moon rise", stalled);
    nasa_search(&server, vec![item]);

    let nasa = NasaClient::with_base_url(common::client(Duration::from_secs(30)), server.url(""));
    let service = WallpaperService::new(Box::new(nasa), None, Box::new(DryRun));

    let tmp = tempfile::tempdir().unwrap();
    let params = UpdateParams {
        phrase: Some("moon".into()),
        fallback_phrase: None,
        resolution: None,
        save_dir: tmp.path().join("walls"),
        file_prefix: "sw".into(),
        output: Monitor::default(),
        retry_count: 3,
        tag_files: false,
    };

    let handle = CancelHandle::new();
    let token = handle.token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.cancel();
    });

    let started = Instant::now();
    let err = service.update(&token, &params).await.unwrap_err();

    assert!(err.is_cancelled(), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(server.hits("/search"), 1);
    let saved = std::fs::read_dir(&params.save_dir)
        .map(|d| d.count())
        .unwrap_or(0);
    assert_eq!(saved, 0);
}
