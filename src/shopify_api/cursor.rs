//! Cursor pagination as done by the Admin REST API: the next page is
//! announced through a `Link` header such as
//!
//! ```text
//! <https://shop.myshopify.com/admin/api/2023-10/products.json?limit=250&page_info=abc>; rel="next"
//! ```

use std::fmt;

use reqwest::header::{HeaderMap, LINK};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor(String);

impl fmt::Display for PageCursor {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Returns the `page_info` token of the `rel="next"` link, if the response
/// has one. `None` means this was the last page.
pub fn next_cursor(headers: &HeaderMap) -> Option<PageCursor> {
    let link = headers.get(LINK)?.to_str().ok()?;
    next_cursor_from_link(link)
}

fn next_cursor_from_link(link: &str) -> Option<PageCursor> {
    let entry = link
        .split(',')
        .find(|entry| entry.contains(r#"rel="next""#))?;

    let (_, after) = entry.split_once("page_info=")?;
    let token = after
        .split(|c| c == '>' || c == '&')
        .next()
        .unwrap_or_default()
        .trim();

    if token.is_empty() {
        None
    } else {
        Some(PageCursor(token.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use reqwest::header::HeaderValue;

    #[test]
    fn next_only() {
        let link = r#"<https://s.myshopify.com/admin/api/2023-10/products.json?limit=250&page_info=abc123>; rel="next""#;

        assert_eq!(
            next_cursor_from_link(link),
            Some(PageCursor("abc123".to_owned()))
        );
    }

    #[test]
    fn previous_and_next() {
        let link = concat!(
            r#"<https://s.myshopify.com/admin/api/2023-10/products.json?limit=250&page_info=prev1>; rel="previous", "#,
            r#"<https://s.myshopify.com/admin/api/2023-10/products.json?limit=250&page_info=next2>; rel="next""#
        );

        assert_eq!(
            next_cursor_from_link(link),
            Some(PageCursor("next2".to_owned()))
        );
    }

    #[test]
    fn page_info_before_other_parameters() {
        let link = r#"<https://s.myshopify.com/x.json?page_info=tok&limit=250>; rel="next""#;

        assert_eq!(next_cursor_from_link(link), Some(PageCursor("tok".to_owned())));
    }

    #[test]
    fn previous_only_is_last_page() {
        let link = r#"<https://s.myshopify.com/x.json?limit=250&page_info=prev1>; rel="previous""#;

        assert_eq!(next_cursor_from_link(link), None);
    }

    #[test]
    fn missing_header() {
        assert_eq!(next_cursor(&HeaderMap::new()), None);
    }

    #[test]
    fn reads_link_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(r#"<https://s.myshopify.com/x.json?page_info=zz>; rel="next""#),
        );

        assert_eq!(next_cursor(&headers), Some(PageCursor("zz".to_owned())));
    }
}
