use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};

use micro_multer::handler::{Handler, make_handler};
use micro_multer::protocol::BoxError;
use micro_multer::storage::create_dir_if_absent;
use micro_multer::{Multer, MulterBody, MultipartRequestExt, Wrapper};

use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

const BOUNDARY: &str = "----micro-multer-demo";

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let multer = match Multer::builder()
        .dest("./temp")
        .rename(|field_name, original_name| format!("{field_name}{original_name}"))
        .change_dest(|dest, req| {
            let user = req.headers.get("x-user").and_then(|value| value.to_str().ok()).unwrap_or("anonymous");
            let path = dest.join(user);
            create_dir_if_absent(&path)?;
            Ok(path)
        })
        .build()
    {
        Ok(multer) => multer,
        Err(e) => {
            error!(cause = %e, "invalid multer config");
            return;
        }
    };

    let handler = multer.wrap(make_handler(show_upload));

    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"title\"\r\n\r\n\
         holiday\r\n\
         --{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"small0\"; filename=\"small0.dat\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         first file\r\n\
         --{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"small0\"; filename=\"small1.dat\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         second file\r\n\
         --{BOUNDARY}--\r\n"
    );

    let request = Request::post("/upload")
        .header(http::header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .header("x-user", "user1")
        .body(Full::new(Bytes::from(body)))
        .expect("valid request");

    match handler.call(request).await {
        Ok(response) => {
            let status = response.status();
            let body = match response.into_body().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    error!(cause = %e, "read response body error");
                    return;
                }
            };
            info!(%status, body = %String::from_utf8_lossy(&body), "upload finished");
        }
        Err(e) => error!(cause = %e, "upload failed"),
    }
}

async fn show_upload(request: Request<MulterBody<Full<Bytes>>>) -> Result<Response<Full<Bytes>>, BoxError> {
    let result = request.parse_result().ok_or("multer did not run")?;
    let json = serde_json::to_vec_pretty(result)?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(json)))?;

    Ok(response)
}
