//! Remote slide source: metadata, re-compositing and retry behavior.

use std::sync::Arc;

use bytes::Bytes;

use pathview::{RemoteSlideSource, SlideSource, WsiStreamClient};

use super::test_utils::{make_jpeg, MockTransport};

const SLIDE_INFO: &str = r#"{
    "width": 1024, "height": 1024, "level_count": 2,
    "levels": [
        {"tile_width": 256, "downsample": 1.0},
        {"tile_width": 256, "downsample": 2.0}
    ]
}"#;

async fn open_source(transport: MockTransport) -> RemoteSlideSource {
    let client = Arc::new(WsiStreamClient::new(
        Arc::new(transport),
        "http://server",
        "",
    ));
    client.connect().await.unwrap();
    RemoteSlideSource::open(client, "sample.svs").await.unwrap()
}

fn transport_with_info() -> MockTransport {
    MockTransport::new()
        .with_health()
        .route_ok("/slides/sample.svs", Bytes::from(SLIDE_INFO))
}

#[tokio::test]
async fn metadata_is_cached_at_open() {
    let source = open_source(transport_with_info()).await;

    assert!(source.is_valid());
    assert!(source.is_remote());
    assert_eq!(source.width(), 1024);
    assert_eq!(source.height(), 1024);
    assert_eq!(source.level_count(), 2);
    assert_eq!(source.server_tile_size(), 256);
    assert_eq!(source.level_downsample(1), 2.0);
    assert_eq!(source.level_dimensions(1).width, 512);
    assert_eq!(source.identifier(), "http://server/sample.svs");
}

#[tokio::test]
async fn open_fails_for_unknown_slide() {
    let client = Arc::new(WsiStreamClient::new(
        Arc::new(MockTransport::new().with_health()),
        "http://server",
        "",
    ));
    client.connect().await.unwrap();

    assert!(RemoteSlideSource::open(client, "missing.svs").await.is_err());
}

#[tokio::test]
async fn read_region_composites_four_server_tiles() {
    // Engine asks for 512x512; the server serves 256px tiles with a
    // distinct color per tile so seams are checkable.
    let transport = transport_with_info()
        .route_ok("/tiles/sample.svs/0/0/0.jpg", make_jpeg(256, 256, [250, 0, 0]))
        .route_ok("/tiles/sample.svs/0/1/0.jpg", make_jpeg(256, 256, [0, 250, 0]))
        .route_ok("/tiles/sample.svs/0/0/1.jpg", make_jpeg(256, 256, [0, 0, 250]))
        .route_ok("/tiles/sample.svs/0/1/1.jpg", make_jpeg(256, 256, [250, 250, 0]));
    let source = open_source(transport).await;

    let tile = source.read_region(0, 0, 0, 512, 512).await.unwrap();
    assert_eq!(tile.width(), 512);
    assert_eq!(tile.height(), 512);

    // Sample one pixel well inside each quadrant (JPEG is lossy, allow
    // wide tolerance).
    let pixel = |x: usize, y: usize| {
        let offset = (y * 512 + x) * 4;
        &tile.pixels()[offset..offset + 3]
    };
    assert!(pixel(64, 64)[0] > 200 && pixel(64, 64)[1] < 60);
    assert!(pixel(448, 64)[1] > 200 && pixel(448, 64)[0] < 60);
    assert!(pixel(64, 448)[2] > 200 && pixel(64, 448)[0] < 60);
    assert!(pixel(448, 448)[0] > 200 && pixel(448, 448)[1] > 200);
}

#[tokio::test]
async fn failed_tiles_leave_zeroed_pixels() {
    let transport = transport_with_info()
        .route_ok("/tiles/sample.svs/0/0/0.jpg", make_jpeg(256, 256, [250, 0, 0]))
        .route_status("/tiles/sample.svs/0/1/0.jpg", 404)
        .route_status("/tiles/sample.svs/0/0/1.jpg", 404)
        .route_status("/tiles/sample.svs/0/1/1.jpg", 404);
    let source = open_source(transport).await;

    let tile = source.read_region(0, 0, 0, 512, 512).await.unwrap();

    let pixel = |x: usize, y: usize| {
        let offset = (y * 512 + x) * 4;
        &tile.pixels()[offset..offset + 4]
    };
    assert!(pixel(64, 64)[0] > 200);
    assert_eq!(pixel(448, 448), &[0, 0, 0, 0]);
    assert_eq!(pixel(448, 64), &[0, 0, 0, 0]);
}

#[tokio::test]
async fn transient_transport_failures_are_retried() {
    let transport = transport_with_info().route_flaky(
        "/tiles/sample.svs/0/0/0.jpg",
        2,
        make_jpeg(256, 256, [250, 0, 0]),
    );
    let source = open_source(transport).await;

    // 256x256 request hits exactly one server tile; two failures then
    // success stays within the 3-attempt budget.
    let tile = source.read_region(0, 0, 0, 256, 256).await.unwrap();
    assert!(tile.pixels()[0] > 200);
}

#[tokio::test]
async fn corrupt_jpeg_is_not_retried() {
    let transport = Arc::new(transport_with_info().route_ok(
        "/tiles/sample.svs/0/0/0.jpg",
        Bytes::from_static(b"definitely not a jpeg"),
    ));
    let client = Arc::new(WsiStreamClient::new(
        transport.clone(),
        "http://server",
        "",
    ));
    client.connect().await.unwrap();
    let source = RemoteSlideSource::open(client, "sample.svs").await.unwrap();

    let tile = source.read_region(0, 0, 0, 256, 256).await.unwrap();
    // Decode failed: pixels stay zeroed and the error is recorded.
    assert_eq!(&tile.pixels()[0..4], &[0, 0, 0, 0]);
    assert!(!source.last_error().is_empty());

    // Exactly one tile request went out; decode failures are final.
    let tile_requests = transport
        .requests
        .lock()
        .unwrap()
        .iter()
        .filter(|url| url.contains("/tiles/"))
        .count();
    assert_eq!(tile_requests, 1);
}

#[tokio::test]
async fn edge_regions_clip_to_decoded_tile_size() {
    // Level 1 is 512x512; its bottom-right server tile is full-size here,
    // but the read itself straddles the region edge.
    let transport = transport_with_info()
        .route_ok("/tiles/sample.svs/1/1/1.jpg", make_jpeg(256, 256, [0, 250, 0]));
    let source = open_source(transport).await;

    // Request the last 128x128 of level 1 (x, y in level-0 coordinates).
    let tile = source.read_region(1, 768, 768, 128, 128).await.unwrap();
    assert_eq!(tile.width(), 128);
    let offset = (64 * 128 + 64) * 4;
    assert!(tile.pixels()[offset + 1] > 200);
}
