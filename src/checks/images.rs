//! Image accessibility and loading checks

use crate::checks::{
    ratio, AuditContext, Category, CategoryScore, Checker, CheckerReport, Effort, Evidence,
    Finding, Severity, NO_HTML_PAGES,
};
use crate::crawler::{ImageTag, PageSignals};
use async_trait::async_trait;

const HERO_MARKERS: &[&str] = &["hero", "banner", "lcp"];

/// Pages with more images than this should serve responsive variants
const LARGE_PAGE_IMAGES: usize = 5;

pub struct ImagesChecker;

/// Leading integer of a width/height attribute ("640", "640px")
fn parse_dimension(value: Option<&str>) -> Option<u64> {
    let digits: String = value?.trim().chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// The image most likely to be the page's largest contentful paint
fn hero_image(signals: &PageSignals) -> Option<&ImageTag> {
    let marked = signals.images.iter().find(|img| {
        let src = img.src.to_lowercase();
        HERO_MARKERS.iter().any(|m| src.contains(m))
    });
    marked.or_else(|| {
        signals.images.first().filter(|img| {
            let width = parse_dimension(img.width.as_deref()).unwrap_or(0);
            let height = parse_dimension(img.height.as_deref()).unwrap_or(0);
            width >= 1000 || width * height >= 300_000
        })
    })
}

fn missing_alt(img: &ImageTag) -> bool {
    img.alt.is_none()
}

fn lacks_srcset(signals: &PageSignals) -> usize {
    if signals.images.len() <= LARGE_PAGE_IMAGES {
        return 0;
    }
    signals.images.iter().filter(|img| img.srcset.is_none()).count()
}

#[async_trait]
impl Checker for ImagesChecker {
    fn name(&self) -> &'static str {
        "images"
    }

    fn category(&self) -> Category {
        Category::Images
    }

    async fn evaluate(&self, ctx: &AuditContext) -> CheckerReport {
        if ctx.html_count() == 0 {
            return CheckerReport::scored(self, CategoryScore::not_measured(NO_HTML_PAGES), Vec::new());
        }

        let images: Vec<(&str, &ImageTag)> = ctx
            .html_pages()
            .flat_map(|(page, signals)| signals.images.iter().map(move |img| (page.url.as_str(), img)))
            .collect();
        let total = images.len();
        let no_alt = images.iter().filter(|(_, img)| missing_alt(img)).count();
        let no_dims = images.iter().filter(|(_, img)| !img.has_dimensions()).count();

        let score = if total == 0 {
            100.0
        } else {
            100.0 - 70.0 * ratio(no_alt, total) - 20.0 * ratio(no_dims, total)
        };

        let mut findings = Vec::new();

        if no_alt > 0 {
            findings.push(
                Finding::new(
                    Category::Images,
                    Severity::Medium,
                    "Images missing alt text",
                    format!("{}/{} images are missing alt text.", no_alt, total),
                )
                .impact("Reduces accessibility and weakens image search relevance.")
                .recommendation("Add descriptive alt text to informative images; keep decorative images empty-alt.")
                .evidence(
                    images
                        .iter()
                        .filter(|(_, img)| missing_alt(img))
                        .map(|(url, img)| Evidence::new(*url, format!("img {}", img.src))),
                )
                .effort(Effort::Low),
            );
        }

        if no_dims > 0 {
            findings.push(
                Finding::new(
                    Category::Images,
                    Severity::Low,
                    "Images without explicit dimensions",
                    format!("{}/{} images have no width and height attributes.", no_dims, total),
                )
                .impact("Images without reserved space shift the layout while loading.")
                .recommendation("Set width and height (or aspect-ratio) on every image.")
                .evidence(
                    images
                        .iter()
                        .filter(|(_, img)| !img.has_dimensions())
                        .map(|(url, img)| Evidence::new(*url, format!("img {}", img.src))),
                )
                .effort(Effort::Low),
            );
        }

        let lazy_heroes: Vec<Evidence> = ctx
            .html_pages()
            .filter_map(|(page, signals)| {
                hero_image(signals)
                    .filter(|img| img.is_lazy())
                    .map(|img| Evidence::new(page.url.clone(), format!("loading=lazy on {}", img.src)))
            })
            .collect();
        if !lazy_heroes.is_empty() {
            findings.push(
                Finding::new(
                    Category::Images,
                    Severity::High,
                    "Hero image lazy-loaded",
                    format!("{} pages lazy-load their hero image.", lazy_heroes.len()),
                )
                .impact("Lazy-loading the LCP image delays the largest contentful paint.")
                .recommendation("Remove loading=\"lazy\" from hero images and consider fetchpriority=\"high\".")
                .evidence(lazy_heroes)
                .effort(Effort::Low),
            );
        }

        let srcset_pages: Vec<Evidence> = ctx
            .html_pages()
            .filter(|(_, signals)| lacks_srcset(signals) > 0)
            .map(|(page, signals)| {
                Evidence::new(page.url.clone(), format!("{} images without srcset", lacks_srcset(signals)))
            })
            .collect();
        if !srcset_pages.is_empty() {
            findings.push(
                Finding::new(
                    Category::Images,
                    Severity::Low,
                    "Missing responsive images",
                    format!(
                        "{} image-heavy pages serve images without srcset.",
                        srcset_pages.len()
                    ),
                )
                .impact("Mobile devices download oversized images.")
                .recommendation("Provide srcset and sizes for content images.")
                .evidence(srcset_pages)
                .effort(Effort::Medium),
            );
        }

        CheckerReport::scored(self, CategoryScore::measured(score), findings)
    }
}
