//! A single, lazily built HTTP client shared by every outbound call this
//! crate makes, following the teacher's "one global client" convention.

use reqwest::Client;
use std::sync::OnceLock;

fn client() -> &'static Client {
    static CLIENT: OnceLock<Client> = OnceLock::new();
    CLIENT.get_or_init(Client::new)
}

/// Send an HTTP request built from `http::Request` parts, returning the
/// response as a buffered `http::Response`. Used for the non-streaming
/// adapter path; streaming responses are read line-by-line directly against
/// `reqwest` in [`crate::client::LlmClient::chat_stream`].
pub async fn call_outbound(
    req: http::Request<Vec<u8>>,
) -> Result<http::Response<Vec<u8>>, Box<dyn std::error::Error + Send + Sync>> {
    let method = req.method().as_str().parse::<reqwest::Method>()?;
    let mut rb = client().request(method, req.uri().to_string());
    for (name, value) in req.headers().iter() {
        rb = rb.header(name.as_str(), value.to_str()?);
    }
    let resp = rb.body(req.into_body()).send().await?;
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = resp.bytes().await?.to_vec();

    let mut builder = http::Response::builder().status(status.as_u16());
    for (name, value) in headers.iter() {
        builder = builder.header(name.as_str(), value.as_bytes());
    }
    Ok(builder.body(bytes)?)
}
