//! Sitemap XML generation

use std::io::Cursor;

use chrono::NaiveDate;
use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Writer,
};

use crate::blog::Article;
use crate::error::Result;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// A page that is always listed
#[derive(Debug, Clone)]
pub struct StaticPage {
    pub path: &'static str,
    pub changefreq: &'static str,
    pub priority: f32,
}

pub const STATIC_PAGES: &[StaticPage] = &[
    StaticPage { path: "/", changefreq: "daily", priority: 1.0 },
    StaticPage { path: "/blog", changefreq: "weekly", priority: 0.8 },
    StaticPage { path: "/pricing", changefreq: "monthly", priority: 0.7 },
    StaticPage { path: "/about", changefreq: "monthly", priority: 0.5 },
    StaticPage { path: "/privacy", changefreq: "yearly", priority: 0.3 },
    StaticPage { path: "/terms", changefreq: "yearly", priority: 0.3 },
];

const ARTICLE_CHANGEFREQ: &str = "monthly";
const ARTICLE_PRIORITY: f32 = 0.6;

/// Build the urlset: static pages dated `today`, then one URL per article
pub fn generate_sitemap(
    base_url: &str,
    pages: &[StaticPage],
    articles: &[Article],
    today: NaiveDate,
) -> Result<String> {
    let base_url = base_url.trim_end_matches('/');
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut urlset = BytesStart::new("urlset");
    urlset.push_attribute(("xmlns", SITEMAP_NS));
    writer.write_event(Event::Start(urlset))?;

    for page in pages {
        let loc = format!("{}{}", base_url, page.path);
        write_url(&mut writer, &loc, today, page.changefreq, page.priority)?;
    }

    for article in articles {
        let loc = format!("{}/blog/{}", base_url, urlencoding::encode(&article.slug));
        write_url(
            &mut writer,
            &loc,
            article.published_date,
            ARTICLE_CHANGEFREQ,
            ARTICLE_PRIORITY,
        )?;
    }

    writer.write_event(Event::End(BytesEnd::new("urlset")))?;

    let result = writer.into_inner().into_inner();
    Ok(String::from_utf8(result)?)
}

fn write_url<W: std::io::Write>(
    writer: &mut Writer<W>,
    loc: &str,
    lastmod: NaiveDate,
    changefreq: &str,
    priority: f32,
) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("url")))?;
    write_simple_element(writer, "loc", loc)?;
    write_simple_element(writer, "lastmod", &lastmod.format("%Y-%m-%d").to_string())?;
    write_simple_element(writer, "changefreq", changefreq)?;
    write_simple_element(writer, "priority", &format!("{:.1}", priority))?;
    writer.write_event(Event::End(BytesEnd::new("url")))?;
    Ok(())
}

fn write_simple_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: &str,
) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(slug: &str, published: NaiveDate) -> Article {
        Article {
            id: slug.to_string(),
            title: slug.to_string(),
            slug: slug.to_string(),
            excerpt: String::new(),
            content: String::new(),
            author: "TextExtract Team".to_string(),
            published_date: published,
            reading_time: 3,
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_url_count_and_lastmod() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let published = NaiveDate::from_ymd_opt(2024, 2, 14).unwrap();
        let articles = vec![article("ocr-tips", published), article("tables", published)];

        let xml = generate_sitemap("https://example.com/", STATIC_PAGES, &articles, today).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert_eq!(xml.matches("<url>").count(), STATIC_PAGES.len() + 2);
        assert!(xml.contains("<loc>https://example.com/</loc><lastmod>2024-06-01</lastmod>"));
        assert!(xml.contains(
            "<loc>https://example.com/blog/ocr-tips</loc><lastmod>2024-02-14</lastmod>"
        ));
        assert!(xml.contains("<priority>1.0</priority>"));
    }

    #[test]
    fn test_escapes_and_encodes() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let xml = generate_sitemap("https://example.com", &[], &[article("a b&c", today)], today).unwrap();
        assert!(xml.contains("/blog/a%20b%26c"));
        assert_eq!(xml.matches("<url>").count(), 1);
    }
}
