use scraper::{Html, Selector};
use url::Url;

use super::document::FeedNode;
use crate::util::resolve_url;

/// Encoded-content fields, in priority order.
const ENCODED_CONTENT_TAGS: &[&str] = &["content:encoded", "content"];
/// Description fields, in priority order.
const DESCRIPTION_TAGS: &[&str] = &["description", "summary"];

/// Finds a representative image for one entry.
///
/// Stages, first hit wins:
/// 1. an enclosure declaring an `image/*` type
/// 2. a `media:content` or `media:thumbnail` element
/// 3. the first `<img src>` inside the encoded content
/// 4. the first `<img src>` inside the description
///
/// Each stage looks at its first candidate only and resolves it against
/// `base` (the feed's own URL). A candidate that cannot be resolved skips
/// the stage rather than ending the search.
pub fn resolve_image<N: FeedNode>(entry: &N, base: Option<&Url>) -> Option<String> {
    from_enclosure(entry, base)
        .or_else(|| from_media(entry, base))
        .or_else(|| from_html_fields(entry, ENCODED_CONTENT_TAGS, base))
        .or_else(|| from_html_fields(entry, DESCRIPTION_TAGS, base))
}

fn is_image_type(media_type: &str) -> bool {
    media_type
        .trim()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

fn from_enclosure<N: FeedNode>(entry: &N, base: Option<&Url>) -> Option<String> {
    entry
        .find_all(&["enclosure", "link"])
        .into_iter()
        .filter(|node| {
            node.name() == "enclosure"
                || node
                    .attribute(&["rel"])
                    .is_some_and(|rel| rel.eq_ignore_ascii_case("enclosure"))
        })
        .filter(|node| node.attribute(&["type"]).is_some_and(is_image_type))
        .find_map(|node| node.attribute(&["url", "href"]))
        .and_then(|href| resolve_url(href, base))
}

fn from_media<N: FeedNode>(entry: &N, base: Option<&Url>) -> Option<String> {
    entry
        .find_all(&["media:content", "media:thumbnail"])
        .into_iter()
        .filter(|node| {
            let medium_ok = node
                .attribute(&["medium"])
                .map_or(true, |m| m.eq_ignore_ascii_case("image"));
            let type_ok = node.attribute(&["type"]).map_or(true, is_image_type);
            node.name() == "media:thumbnail" || (medium_ok && type_ok)
        })
        .find_map(|node| node.attribute(&["url", "src"]))
        .and_then(|href| resolve_url(href, base))
}

fn from_html_fields<N: FeedNode>(entry: &N, tags: &[&str], base: Option<&Url>) -> Option<String> {
    let html = entry.first_text(tags)?;
    let src = first_img_src(&html)?;
    resolve_url(&src, base)
}

/// `src` of the first `<img>` in an HTML fragment that has a non-blank one.
fn first_img_src(html: &str) -> Option<String> {
    let selector = Selector::parse("img[src]").ok()?;
    Html::parse_fragment(html)
        .select(&selector)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::document::Document;

    fn base() -> Url {
        Url::parse("https://example.com/feed.xml").unwrap()
    }

    fn resolve(entry_xml: &str) -> Option<String> {
        let xml = format!(
            r#"<rss xmlns:media="http://search.yahoo.com/mrss/"
                    xmlns:content="http://purl.org/rss/1.0/modules/content/">
                 <channel>{entry_xml}</channel></rss>"#
        );
        let doc = Document::parse(&xml).unwrap();
        let entry = doc.root().find_all(&["item", "entry"])[0];
        resolve_image(entry, Some(&base()))
    }

    #[test]
    fn test_enclosure_wins_over_description_img() {
        let url = resolve(
            r#"<item>
                <enclosure url="https://cdn.example.com/enc.jpg" type="image/jpeg" length="1"/>
                <description><![CDATA[<img src="https://cdn.example.com/desc.jpg">]]></description>
            </item>"#,
        );
        assert_eq!(url.as_deref(), Some("https://cdn.example.com/enc.jpg"));
    }

    #[test]
    fn test_non_image_enclosure_ignored() {
        let url = resolve(
            r#"<item>
                <enclosure url="https://cdn.example.com/ep.mp3" type="audio/mpeg"/>
                <media:thumbnail url="https://cdn.example.com/thumb.png"/>
            </item>"#,
        );
        assert_eq!(url.as_deref(), Some("https://cdn.example.com/thumb.png"));
    }

    #[test]
    fn test_atom_enclosure_link() {
        let url = resolve(
            r#"<entry>
                <link rel="alternate" href="https://example.com/post"/>
                <link rel="enclosure" type="IMAGE/PNG" href="/img/a.png"/>
            </entry>"#,
        );
        assert_eq!(url.as_deref(), Some("https://example.com/img/a.png"));
    }

    #[test]
    fn test_media_content_video_skipped() {
        let url = resolve(
            r#"<item>
                <media:content url="https://cdn.example.com/v.mp4" medium="video"/>
                <media:content url="https://cdn.example.com/p.jpg" medium="image"/>
            </item>"#,
        );
        assert_eq!(url.as_deref(), Some("https://cdn.example.com/p.jpg"));
    }

    #[test]
    fn test_encoded_content_before_description() {
        let url = resolve(
            r#"<item>
                <content:encoded><![CDATA[<p>x</p><img src="//cdn.example.com/enc.gif">]]></content:encoded>
                <description><![CDATA[<img src="https://cdn.example.com/desc.jpg">]]></description>
            </item>"#,
        );
        assert_eq!(url.as_deref(), Some("https://cdn.example.com/enc.gif"));
    }

    #[test]
    fn test_description_img_absolutized() {
        let url = resolve(
            r#"<item><description>&lt;p&gt;hi &lt;img src="images/a.jpg"&gt;&lt;/p&gt;</description></item>"#,
        );
        assert_eq!(url.as_deref(), Some("https://example.com/images/a.jpg"));
    }

    #[test]
    fn test_unresolvable_stage_falls_through() {
        let url = resolve(
            r#"<item>
                <enclosure url="javascript:alert(1)" type="image/png"/>
                <description><![CDATA[<img src="https://cdn.example.com/ok.jpg">]]></description>
            </item>"#,
        );
        assert_eq!(url.as_deref(), Some("https://cdn.example.com/ok.jpg"));
    }

    #[test]
    fn test_no_image() {
        assert_eq!(resolve("<item><title>Plain</title></item>"), None);
        assert_eq!(
            resolve("<item><description>no pictures here</description></item>"),
            None
        );
    }
}
