use hyperion_core::error::AppError;
use hyperion_core::models::{Document, Record};
use hyperion_core::traits::Extractor;
use scraper::{Html, Selector};
use url::Url;

/// Emits one `{title, url}` record per `<a href>` in document order.
///
/// `title` is the anchor's whitespace-trimmed text. `url` is the raw `href`
/// unless relative resolution is enabled, in which case it is joined
/// against the document URL (unresolvable hrefs are kept raw).
#[derive(Debug, Clone, Default)]
pub struct LinkExtractor {
    resolve_relative: bool,
}

impl LinkExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_relative_resolution(mut self, enabled: bool) -> Self {
        self.resolve_relative = enabled;
        self
    }

    fn resolve(&self, base: Option<&Url>, href: &str) -> String {
        match base {
            Some(base) if self.resolve_relative => base
                .join(href)
                .map(String::from)
                .unwrap_or_else(|_| href.to_string()),
            _ => href.to_string(),
        }
    }
}

impl Extractor for LinkExtractor {
    fn extract(&self, document: &Document) -> Result<Vec<Record>, AppError> {
        let selector = Selector::parse("a[href]")
            .map_err(|e| AppError::Extraction(format!("Invalid selector: {e}")))?;
        let html = Html::parse_document(&document.html);
        let base = Url::parse(&document.url).ok();

        let records = html
            .select(&selector)
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                let title = anchor.text().collect::<String>().trim().to_string();

                let mut record = Record::new();
                record.insert("title".into(), title.into());
                record.insert("url".into(), self.resolve(base.as_ref(), href).into());
                Some(record)
            })
            .collect();

        Ok(records)
    }
}
