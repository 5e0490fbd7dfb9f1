use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};
use novoframe_ble_controller::{FrameApi, HttpFrameApi, PairError};

#[derive(Default)]
struct Seen {
    authorization: Option<String>,
    body: Option<serde_json::Value>,
}

fn respond(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    let mut r = Response::new(Full::new(Bytes::from(body.to_string())));
    *r.status_mut() = status;
    r
}

async fn handle_request(
    r: Request<hyper::body::Incoming>,
    seen: Arc<Mutex<Seen>>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if r.uri().path() != "/api/frames/pair" || r.method() != hyper::Method::POST {
        return Ok(respond(StatusCode::NOT_FOUND, serde_json::json!({})));
    }
    let authorization = r
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = r.into_body().collect().await.map(|b| b.to_bytes()).unwrap_or_default();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or_default();
    {
        let mut seen = seen.lock().unwrap();
        seen.authorization = authorization;
        seen.body = Some(body.clone());
    }

    let response = match body["mac_address"].as_str() {
        Some("AA:BB:CC:DD:EE:01") => respond(
            StatusCode::OK,
            serde_json::json!({"frame": {"id": 11, "mac_address": "AA:BB:CC:DD:EE:01", "name": body["name"]}}),
        ),
        Some("AA:BB:CC:DD:EE:02") => respond(
            StatusCode::CONFLICT,
            serde_json::json!({"error": "Frame already paired to another account"}),
        ),
        Some("slow") => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            respond(StatusCode::OK, serde_json::json!({}))
        }
        _ => respond(StatusCode::BAD_REQUEST, serde_json::json!({"message": "Invalid MAC address"})),
    };
    Ok(response)
}

async fn serve() -> (SocketAddr, Arc<Mutex<Seen>>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Seen::default()));
    let state = seen.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { continue };
            let state = state.clone();
            tokio::spawn(async move {
                let io = hyper_util::rt::TokioIo::new(stream);
                let builder = hyper_util::server::conn::auto::Builder::new(hyper_util::rt::TokioExecutor::new());
                let service = hyper::service::service_fn(move |r| handle_request(r, state.clone()));
                if let Err(e) = builder.serve_connection(io, service).await {
                    eprintln!("connection error: {e:?}");
                }
            });
        }
    });
    (addr, seen)
}

#[tokio::test]
async fn pairs_with_bearer_token() {
    let (addr, seen) = serve().await;
    let api = HttpFrameApi::new(format!("http://{addr}")).with_token(Some("t0k".into()));

    let frame = api.pair_frame("AA:BB:CC:DD:EE:01", "Kitchen").await.unwrap();
    assert_eq!(frame.mac_address, "AA:BB:CC:DD:EE:01");
    assert_eq!(frame.name, "Kitchen");
    assert_eq!(frame.extra["id"], 11);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.authorization.as_deref(), Some("Bearer t0k"));
    assert_eq!(
        seen.body,
        Some(serde_json::json!({"mac_address": "AA:BB:CC:DD:EE:01", "name": "Kitchen"}))
    );
}

#[tokio::test]
async fn conflict_means_already_paired() {
    let (addr, seen) = serve().await;
    let api = HttpFrameApi::new(format!("http://{addr}/"));
    let err = api.pair_frame("AA:BB:CC:DD:EE:02", "Hall").await.unwrap_err();
    assert!(matches!(err, PairError::AlreadyPaired(m) if m.contains("already paired")));
    assert_eq!(seen.lock().unwrap().authorization, None);
}

#[tokio::test]
async fn server_message_is_surfaced() {
    let (addr, _) = serve().await;
    let api = HttpFrameApi::new(format!("http://{addr}"));
    let err = api.pair_frame("nonsense", "Hall").await.unwrap_err();
    assert!(matches!(err, PairError::Rejected { status: 400, message } if message == "Invalid MAC address"));
}

#[tokio::test]
async fn slow_backend_times_out() {
    let (addr, _) = serve().await;
    let api = HttpFrameApi::new(format!("http://{addr}")).with_timeout(Duration::from_millis(200));
    let err = api.pair_frame("slow", "Hall").await.unwrap_err();
    assert!(matches!(err, PairError::Timeout(_)));
}

#[tokio::test]
async fn bad_url() {
    let api = HttpFrameApi::new("not a url");
    assert!(matches!(
        api.pair_frame("AA:BB:CC:DD:EE:01", "Hall").await,
        Err(PairError::InvalidUrl(_))
    ));
}
