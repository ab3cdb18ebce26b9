use reqwest::{RequestBuilder, Response};

use google_connector_gax::status::{Status, TryAs};

/// Failure of a plain JSON-over-HTTP Google API call.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The API answered with an error status.
    #[error(transparent)]
    Response(#[from] Status),

    /// An error from the HTTP client.
    #[error(transparent)]
    HttpClient(#[from] reqwest::Error),
}

impl TryAs<Status> for Error {
    fn try_as(&self) -> Option<&Status> {
        match self {
            Error::Response(status) => Some(status),
            Error::HttpClient(_) => None,
        }
    }
}

#[derive(serde::Deserialize)]
struct ErrorResponse {
    code: u16,
    message: String,
}

#[derive(serde::Deserialize)]
struct ErrorWrapper {
    error: ErrorResponse,
}

/// Checks whether an HTTP response is successful and returns it, or returns an error.
pub(crate) async fn check_response_status(response: Response) -> Result<Response, Error> {
    let error = match response.error_for_status_ref() {
        Ok(_) => return Ok(response),
        Err(error) => error,
    };

    // prefer the google error body, falling back to the bare status line.
    let code = response.status().as_u16();
    let status = response
        .json::<ErrorWrapper>()
        .await
        .map(|wrapper| Status::new(wrapper.error.code, wrapper.error.message))
        .unwrap_or_else(|_| Status::new(code, error.to_string()));
    Err(Error::Response(status))
}

pub(crate) async fn execute<T>(request: RequestBuilder) -> Result<T, Error>
where
    T: serde::de::DeserializeOwned,
{
    let response = request.send().await?;
    let response = check_response_status(response).await?;
    Ok(response.json().await?)
}
