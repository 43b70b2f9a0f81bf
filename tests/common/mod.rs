//! Shared tiny_http fixtures: a recording mock server plus image helpers.

#![allow(dead_code)]

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tiny_http::{Header, Response, Server};

/// A request seen by the mock server
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub url: String,
    pub body: String,
}

/// What the mock server answers with
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
    pub delay_ms: u64,
}

impl Reply {
    pub fn ok(body: Vec<u8>, content_type: &str) -> Self {
        Self { status: 200, body, headers: vec![("Content-Type".into(), content_type.into())], delay_ms: 0 }
    }

    pub fn json(body: &str) -> Self {
        Self::ok(body.as_bytes().to_vec(), "application/json")
    }

    pub fn status(status: u16) -> Self {
        Self { status, body: b"error".to_vec(), headers: vec![], delay_ms: 0 }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn delayed(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }
}

pub struct MockServer {
    pub base: String,
    hits: Arc<Mutex<Vec<Recorded>>>,
}

impl MockServer {
    /// Start a server on an ephemeral port; `handler` gets `(method, url)`.
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &str) -> Reply + Send + 'static,
    {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().expect("tcp listener");
        let hits = Arc::new(Mutex::new(Vec::new()));
        let hits_srv = hits.clone();

        std::thread::spawn(move || {
            for mut request in server.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let method = request.method().to_string();
                let url = request.url().to_string();
                hits_srv.lock().unwrap().push(Recorded { method: method.clone(), url: url.clone(), body });

                let reply = handler(&method, &url);
                let mut response = Response::from_data(reply.body).with_status_code(reply.status);
                for (k, v) in &reply.headers {
                    response = response.with_header(Header::from_bytes(k.as_bytes(), v.as_bytes()).unwrap());
                }
                if reply.delay_ms > 0 {
                    std::thread::spawn(move || {
                        std::thread::sleep(Duration::from_millis(reply.delay_ms));
                        let _ = request.respond(response);
                    });
                } else {
                    let _ = request.respond(response);
                }
            }
        });

        Self { base: format!("http://{}", addr), hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn hits(&self) -> Vec<Recorded> {
        self.hits.lock().unwrap().clone()
    }

    /// Requests whose path starts with `prefix`
    pub fn hits_to(&self, prefix: &str) -> Vec<Recorded> {
        self.hits().into_iter().filter(|r| r.url.starts_with(prefix)).collect()
    }
}

/// Solid-color PNG of the given size
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([30, 120, 200, 255]));
    rfdeck::rendering::raster::encode(&img, rfdeck::ImageEncoding::Png, 90).unwrap()
}

/// Dimensions of an image carried in a data URI
pub fn data_uri_dimensions(uri: &str) -> (u32, u32) {
    let (_, bytes) = rfdeck::data_uri::decode(uri).unwrap();
    let img = image::load_from_memory(&bytes).unwrap();
    (img.width(), img.height())
}
