mod common;

use common::{data_uri_dimensions, png_bytes, MockServer, Reply};
use rfdeck::{AttemptOutcome, Document, ResolutionMethod, ResourceResolver};

fn page(img_src: &str) -> Document {
    let html = format!(
        r#"<html><body><div id="s1"><img src="{}" style="width:120px;height:80px"></div></body></html>"#,
        img_src
    );
    Document::parse_with_base(&html, "http://report.invalid/app/").unwrap()
}

fn resolver(relays: Vec<String>) -> ResourceResolver {
    ResourceResolver::new(reqwest::Client::new(), relays, "Image from Sheets")
}

fn methods(resolved: &rfdeck::ResolvedImages, node: rfdeck::NodeId) -> Vec<(ResolutionMethod, AttemptOutcome)> {
    resolved.attempts_for(node).iter().map(|a| (a.method, a.outcome)).collect()
}

#[tokio::test]
async fn first_working_relay_wins() {
    let server = MockServer::start(|_, url| {
        if url.starts_with("/relay-a") {
            Reply::ok(png_bytes(10, 5), "image/png")
        } else {
            Reply::status(404)
        }
    });
    let doc = page(&server.url("/cdn/chart.png"));
    let relays = vec![server.url("/relay-a?u={url}"), server.url("/relay-b?u={url}")];

    let resolved = resolver(relays).resolve_all(&doc).await;
    let node = doc.images()[0].node;
    let uri = resolved.uri_for(node).unwrap();
    assert!(uri.starts_with("data:image/png;base64,"));
    assert_eq!(data_uri_dimensions(uri), (10, 5));
    assert_eq!(resolved.method_for(node), Some(ResolutionMethod::RelayFetch));

    assert_eq!(server.hits_to("/relay-a").len(), 1);
    assert!(server.hits_to("/relay-b").is_empty());
    assert!(server.hits_to("/cdn").is_empty());
}

#[tokio::test]
async fn relays_are_tried_in_order_before_direct_fetch() {
    let server = MockServer::start(|_, _| Reply::status(404));
    let doc = page(&server.url("/cdn/chart.png"));
    let relays = vec![server.url("/relay-a?u={url}"), server.url("/relay-b?u={url}")];

    let resolved = resolver(relays).resolve_all(&doc).await;
    let node = doc.images()[0].node;

    let order: Vec<String> = server.hits().into_iter().map(|r| r.url.split('?').next().unwrap().to_string()).collect();
    assert_eq!(order, vec!["/relay-a", "/relay-b", "/cdn/chart.png"]);

    // relay target is percent-encoded into the template
    let relay_hit = &server.hits_to("/relay-a")[0];
    assert!(relay_hit.url.contains("u=http%3A%2F%2F127.0.0.1"));

    assert_eq!(
        methods(&resolved, node),
        vec![
            (ResolutionMethod::RelayFetch, AttemptOutcome::Failure),
            (ResolutionMethod::CanvasRedraw, AttemptOutcome::Failure),
            (ResolutionMethod::Placeholder, AttemptOutcome::Success),
        ]
    );
    assert_eq!(data_uri_dimensions(resolved.uri_for(node).unwrap()), (120, 80));
}

#[tokio::test]
async fn canvas_redraw_needs_cors_header() {
    let server = MockServer::start(|_, url| {
        if url.starts_with("/open/") {
            Reply::ok(png_bytes(7, 3), "image/png").header("Access-Control-Allow-Origin", "*")
        } else if url.starts_with("/closed/") {
            Reply::ok(png_bytes(7, 3), "image/png")
        } else {
            Reply::status(404)
        }
    });

    let open = page(&server.url("/open/chart.png"));
    let resolved = resolver(vec![]).resolve_all(&open).await;
    let node = open.images()[0].node;
    assert_eq!(resolved.method_for(node), Some(ResolutionMethod::CanvasRedraw));
    assert_eq!(data_uri_dimensions(resolved.uri_for(node).unwrap()), (7, 3));

    // a readable response without CORS approval still taints the canvas
    let closed = page(&server.url("/closed/chart.png"));
    let resolved = resolver(vec![]).resolve_all(&closed).await;
    let node = closed.images()[0].node;
    assert_eq!(resolved.method_for(node), Some(ResolutionMethod::Placeholder));
    assert_eq!(data_uri_dimensions(resolved.uri_for(node).unwrap()), (120, 80));
    assert_eq!(server.hits_to("/closed/").len(), 1);
}

#[tokio::test]
async fn same_origin_and_data_images_are_left_alone() {
    let server = MockServer::start(|_, _| Reply::status(500));
    let html = format!(
        r#"<html><body>
            <img src="/local/a.png">
            <img src="data:image/png;base64,AAAA">
            <img src="{}">
        </body></html>"#,
        server.url("/same/b.png")
    );
    let mut doc = Document::parse_with_base(&html, &server.url("/report/")).unwrap();
    let resolved = resolver(vec![server.url("/relay?u=")]).resolve_all(&doc).await;
    assert!(resolved.is_empty());
    assert_eq!(doc.apply_resolved(&resolved), 0);
    assert!(server.hits().is_empty());
}

#[tokio::test]
async fn custom_tier_order_keeps_placeholder_last() {
    let server = MockServer::start(|_, url| {
        if url.starts_with("/relay") {
            Reply::ok(png_bytes(4, 4), "image/png")
        } else {
            Reply::ok(png_bytes(9, 9), "image/png").header("Access-Control-Allow-Origin", "*")
        }
    });
    let doc = page(&server.url("/cdn/chart.png"));
    let resolver = resolver(vec![server.url("/relay?u={url}")])
        .with_strategies(vec![ResolutionMethod::CanvasRedraw, ResolutionMethod::RelayFetch]);
    assert_eq!(
        resolver.strategies(),
        &[ResolutionMethod::CanvasRedraw, ResolutionMethod::RelayFetch, ResolutionMethod::Placeholder]
    );

    let resolved = resolver.resolve_all(&doc).await;
    let node = doc.images()[0].node;
    assert_eq!(resolved.method_for(node), Some(ResolutionMethod::CanvasRedraw));
    assert_eq!(data_uri_dimensions(resolved.uri_for(node).unwrap()), (9, 9));
    assert!(server.hits_to("/relay").is_empty());
}

#[tokio::test]
async fn relay_returning_a_web_page_falls_through() {
    let server = MockServer::start(|_, url| {
        if url.starts_with("/relay-html") {
            Reply::ok(b"<!DOCTYPE html><h1>Too many requests</h1>".to_vec(), "text/html")
        } else if url.starts_with("/relay-ok") {
            Reply::ok(png_bytes(6, 6), "application/octet-stream")
        } else {
            Reply::status(404)
        }
    });
    let doc = page(&server.url("/cdn/chart.png"));
    let relays = vec![server.url("/relay-html?u={url}"), server.url("/relay-ok?u={url}")];

    let resolved = resolver(relays).resolve_all(&doc).await;
    let node = doc.images()[0].node;
    let uri = resolved.uri_for(node).unwrap();
    // mime comes from the bytes, not the relay's content type
    assert!(uri.starts_with("data:image/png;base64,"));
    assert_eq!(data_uri_dimensions(uri), (6, 6));
    assert_eq!(server.hits_to("/relay-html").len(), 1);
    assert_eq!(server.hits_to("/relay-ok").len(), 1);
}
