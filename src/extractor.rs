use crate::error::{MangaBindError, Result};
use crate::models::ImageLink;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

const CONTAINER_SELECTOR: &str = "div.img_container";
const IMAGE_SELECTOR: &str = "img";

/// Extract image links from `html`. Relative `src` values are resolved
/// against `page_url` when it is given.
///
/// A page without any container yields an empty list; a container without an
/// image or without a `src` is a parse error.
pub fn extract_links(html: &str, page_url: Option<&Url>) -> Result<Vec<ImageLink>> {
    let document = Html::parse_document(html);
    let container_sel = selector(CONTAINER_SELECTOR)?;
    let image_sel = selector(IMAGE_SELECTOR)?;

    let mut links = Vec::new();
    for (position, container) in document.select(&container_sel).enumerate() {
        let index = position + 1;
        let img = container.select(&image_sel).next().ok_or_else(|| {
            MangaBindError::parse(format!("image container {} has no <img>", index))
        })?;
        let src = img
            .value()
            .attr("src")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                MangaBindError::parse(format!("image {} has no src attribute", index))
            })?;

        let url = resolve(src, page_url)?;
        debug!("Image {}: {}", index, url);
        links.push(ImageLink { index, url });
    }

    Ok(links)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| MangaBindError::parse(format!("selector '{}': {:?}", css, e)))
}

fn resolve(src: &str, page_url: Option<&Url>) -> Result<String> {
    match Url::parse(src) {
        Ok(url) => Ok(url.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => match page_url {
            Some(base) => Ok(base.join(src)?.to_string()),
            None => Ok(src.to_string()),
        },
        Err(e) => Err(e.into()),
    }
}
