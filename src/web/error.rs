//! Fallback pages for errors that did not come from an `ActionError`.

use actix_web::dev::ServiceResponse;
use actix_web::http::header;
use actix_web::middleware::ErrorHandlerResponse;
use actix_web::Result;
use askama::Template;

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorPageTemplate<'a> {
    status: u16,
    message: &'a str,
}

fn render_status<B>(res: ServiceResponse<B>, message: &str) -> Result<ErrorHandlerResponse<B>> {
    // Handlers that already rendered a page keep it.
    if res.headers().contains_key(header::CONTENT_TYPE) {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    }

    let status = res.status();
    let body = ErrorPageTemplate {
        status: status.as_u16(),
        message,
    }
    .render()
    .unwrap_or_else(|_| message.to_string());

    let (req, res) = res.into_parts();
    let mut res = res.set_body(body);
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/html; charset=utf-8"),
    );

    let res = ServiceResponse::new(req, res)
        .map_into_boxed_body()
        .map_into_right_body();
    Ok(ErrorHandlerResponse::Response(res))
}

pub fn render_400<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_status(res, "That request could not be understood.")
}

pub fn render_404<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_status(res, "Page not found.")
}

pub fn render_500<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_status(res, crate::error::GENERIC_FAILURE)
}
