//! Canned upstream responses.

use metadata_extractor::FetchedResponse;

pub const ARTICLE_URL: &str = "https://good-site.test/article";
pub const ARTICLE_IMAGE_URL: &str = "https://good-site.test/img.png";

pub fn html_page(url: &str, body: &str) -> FetchedResponse {
    FetchedResponse::new(url, 200)
        .with_content_type("text/html; charset=utf-8")
        .with_body(body)
}

/// The article page: Open Graph title, description and a relative image.
pub fn article_page() -> FetchedResponse {
    html_page(
        ARTICLE_URL,
        r#"<html><head>
            <meta property="og:title" content="Article">
            <meta property="og:description" content="Desc">
            <meta property="og:image" content="/img.png">
        </head><body></body></html>"#,
    )
}

pub fn article_image() -> FetchedResponse {
    FetchedResponse::new(ARTICLE_IMAGE_URL, 200)
        .with_content_type("image/png")
        .with_content_length("48213")
}
