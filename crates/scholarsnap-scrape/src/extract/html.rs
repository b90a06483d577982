//! Profile page markup.
//!
//! Metrics live in `table#gsc_rsb_st`, the citation bar chart is a set of
//! `.gsc_g_t` year labels next to `.gsc_g_al` counts, and each publication is a
//! `.gsc_a_tr` row under `#gsc_a_b`.

use scraper::{ElementRef, Html, Selector};
use scholarsnap_core::{CitationHistory, MetricRow, MetricsHeader, MetricsTable, Publication};
use tracing::{debug, warn};

use crate::error::{Result, ScrapeError};
use crate::snapshot::ProfileExtractor;

pub struct HtmlSnapshot {
    document: Html,
}

impl HtmlSnapshot {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    pub fn metrics_table(&self) -> Result<MetricsTable> {
        let table_selector = parse_selector("table#gsc_rsb_st")?;
        let th_selector = parse_selector("th")?;
        let tr_selector = parse_selector("tr")?;
        let td_selector = parse_selector("td")?;

        let table = self
            .document
            .select(&table_selector)
            .next()
            .ok_or_else(|| ScrapeError::parse("could not find metrics table (#gsc_rsb_st)"))?;

        let header = MetricsHeader::from_cells(&texts(table, &th_selector));
        let rows: Vec<MetricRow> = table
            .select(&tr_selector)
            .filter_map(|tr| MetricRow::from_cells(texts(tr, &td_selector)))
            .collect();

        if rows.is_empty() {
            return Err(ScrapeError::parse(
                "metrics table found, but no metrics rows parsed",
            ));
        }
        Ok(MetricsTable::new(header, rows))
    }

    pub fn citation_history(&self) -> Result<CitationHistory> {
        let year_selector = parse_selector("span.gsc_g_t")?;
        let count_selector = parse_selector("span.gsc_g_al")?;

        let root = self.document.root_element();
        let mut years = texts(root, &year_selector);
        let mut counts = texts(root, &count_selector);

        if years.is_empty() || counts.is_empty() || years.len() != counts.len() {
            debug!(
                years = years.len(),
                counts = counts.len(),
                "citation chart selectors disagree, retrying inside the chart container"
            );
            let container_selector = parse_selector("div.gsc_md_hist_b")?;
            let container = self.document.select(&container_selector).next().unwrap_or(root);
            years = texts(container, &parse_selector(".gsc_g_t")?);
            counts = texts(container, &parse_selector(".gsc_g_al")?);
        }

        if years.len() != counts.len() {
            warn!(
                years = years.len(),
                counts = counts.len(),
                "citation chart has unequal year and count labels, pairing in order"
            );
        }
        Ok(CitationHistory::from_pairs(years.into_iter().zip(counts)))
    }

    pub fn publication_rows(&self) -> Result<Vec<Publication>> {
        let row_selector = parse_selector("#gsc_a_b .gsc_a_tr")?;
        let loose_row_selector = parse_selector("tr.gsc_a_tr")?;
        let title_selector = parse_selector(".gsc_a_t a")?;
        let gray_selector = parse_selector(".gsc_a_t .gs_gray")?;
        let cites_link_selector = parse_selector(".gsc_a_c a")?;
        let cites_cell_selector = parse_selector(".gsc_a_c")?;
        let year_selectors = [
            parse_selector(".gsc_a_y span")?,
            parse_selector(".gsc_a_y")?,
            parse_selector("span.gsc_a_h, span.gsc_a_hc")?,
        ];

        let mut rows: Vec<ElementRef> = self.document.select(&row_selector).collect();
        if rows.is_empty() {
            rows = self.document.select(&loose_row_selector).collect();
        }

        let publications = rows
            .into_iter()
            .map(|row| {
                let title = first_text(row, &title_selector).unwrap_or_default();
                let gray = texts(row, &gray_selector);
                let authors = gray.first().cloned().unwrap_or_default();
                let venue = gray.get(1).cloned().unwrap_or_default();

                let citations = first_text(row, &cites_link_selector)
                    .or_else(|| first_text(row, &cites_cell_selector))
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| "0".to_string());

                let year = year_selectors
                    .iter()
                    .find_map(|selector| first_text(row, selector))
                    .unwrap_or_default();

                Publication {
                    title,
                    authors,
                    venue,
                    year,
                    citations,
                }
            })
            .collect();
        Ok(publications)
    }
}

impl ProfileExtractor for HtmlSnapshot {
    fn format(&self) -> &'static str {
        "html"
    }

    fn metrics(&self) -> Result<MetricsTable> {
        self.metrics_table()
    }

    fn history(&self) -> Result<CitationHistory> {
        self.citation_history()
    }

    fn publications(&self) -> Result<Vec<Publication>> {
        self.publication_rows()
    }
}

fn parse_selector(input: &str) -> Result<Selector> {
    Selector::parse(input)
        .map_err(|e| ScrapeError::Parse(format!("invalid selector {input}: {e}")))
}

/// Text content with the ends trimmed; inner spacing is kept as rendered.
fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn texts(scope: ElementRef<'_>, selector: &Selector) -> Vec<String> {
    scope.select(selector).map(element_text).collect()
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope.select(selector).next().map(element_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholarsnap_core::YearCount;

    const PROFILE: &str = include_str!("../fixtures/profile.html");

    fn wrap_rows(rows: &str) -> String {
        format!(
            r#"<html><body><table id="gsc_a_t"><tbody id="gsc_a_b">{rows}</tbody></table></body></html>"#
        )
    }

    #[test]
    fn parses_fixture_metrics_in_document_order() {
        let table = HtmlSnapshot::parse(PROFILE).metrics_table().unwrap();
        assert_eq!(table.header.as_record(), ["", "All", "Since 2019"]);
        let names: Vec<_> = table.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Citations", "h-index", "i10-index"]);
        assert_eq!(table.get("Citations").unwrap().as_record(), ["Citations", "120", "95"]);
    }

    #[test]
    fn two_row_metrics_scenario() {
        let html = r#"<table id="gsc_rsb_st">
            <tr><th></th><th>All</th><th>Since 2019</th></tr>
            <tr><td>Citations</td><td>120</td><td>95</td></tr>
            <tr><td>h-index</td><td>7</td><td>6</td></tr>
            <tr><td>broken</td><td>1</td></tr>
        </table>"#;
        let table = HtmlSnapshot::parse(html).metrics_table().unwrap();
        assert_eq!(table.header, MetricsHeader::new("", "All", "Since 2019"));
        assert_eq!(
            table.rows,
            [
                MetricRow::new("Citations", "120", "95"),
                MetricRow::new("h-index", "7", "6"),
            ]
        );
    }

    #[test]
    fn missing_metrics_table_is_parse_error() {
        let err = HtmlSnapshot::parse("<html><body>nothing here</body></html>")
            .metrics_table()
            .unwrap_err();
        assert!(err.to_string().contains("gsc_rsb_st"));
    }

    #[test]
    fn empty_metrics_table_is_parse_error() {
        let html = r#"<table id="gsc_rsb_st"><tr><th></th><th>All</th><th>Since 2019</th></tr></table>"#;
        let err = HtmlSnapshot::parse(html).metrics_table().unwrap_err();
        assert!(err.to_string().contains("no metrics rows"));
    }

    #[test]
    fn history_from_fixture_is_ascending() {
        let history = HtmlSnapshot::parse(PROFILE).citation_history().unwrap();
        assert_eq!(
            history.points(),
            &[
                YearCount::new("2021", "12"),
                YearCount::new("2022", "25"),
                YearCount::new("2023", "38"),
                YearCount::new("2024", "41"),
            ]
        );
    }

    #[test]
    fn history_descending_dom_is_sorted() {
        let html = r#"<div>
            <span class="gsc_g_t">2023</span><span class="gsc_g_t">2022</span>
            <span class="gsc_g_al">10</span><span class="gsc_g_al">4</span>
        </div>"#;
        let history = HtmlSnapshot::parse(html).citation_history().unwrap();
        assert_eq!(
            history.points(),
            &[YearCount::new("2022", "4"), YearCount::new("2023", "10")]
        );
    }

    #[test]
    fn history_falls_back_to_container_classes() {
        // Labels rendered as <div> instead of <span> only match the container selectors.
        let html = r#"<div class="gsc_md_hist_b">
            <div class="gsc_g_t">2020</div><div class="gsc_g_t">2019</div>
            <a class="gsc_g_a"><div class="gsc_g_al">3</div></a><a class="gsc_g_a"><div class="gsc_g_al">1</div></a>
        </div>"#;
        let history = HtmlSnapshot::parse(html).citation_history().unwrap();
        assert_eq!(
            history.points(),
            &[YearCount::new("2019", "1"), YearCount::new("2020", "3")]
        );
    }

    #[test]
    fn history_missing_chart_is_empty() {
        let history = HtmlSnapshot::parse("<html></html>").citation_history().unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn publications_from_fixture() {
        let pubs = HtmlSnapshot::parse(PROFILE).publication_rows().unwrap();
        assert_eq!(pubs.len(), 3);
        assert_eq!(pubs[0].title, "Graph neural networks for traffic forecasting");
        assert_eq!(pubs[0].authors, "A Rahman, S Malik, J Chen");
        assert_eq!(
            pubs[0].venue,
            "IEEE Transactions on Intelligent Transportation Systems 24 (3), 2023"
        );
        assert_eq!(pubs[0].year, "2023");
        assert_eq!(pubs[0].citations, "57");
        // Empty citation link renders as zero.
        assert_eq!(pubs[2].citations, "0");
    }

    #[test]
    fn publication_without_venue_and_plain_citations() {
        let html = wrap_rows(
            r#"<tr class="gsc_a_tr">
                <td class="gsc_a_t"><a class="gsc_a_at" href="/x">Lonely paper</a>
                    <div class="gs_gray">B Author</div></td>
                <td class="gsc_a_c">3</td>
            </tr>"#,
        );
        let pubs = HtmlSnapshot::parse(&html).publication_rows().unwrap();
        assert_eq!(
            pubs,
            [Publication {
                title: "Lonely paper".into(),
                authors: "B Author".into(),
                venue: String::new(),
                year: String::new(),
                citations: "3".into(),
            }]
        );
    }

    #[test]
    fn rows_outside_listing_body_are_found() {
        let html = r#"<table><tr class="gsc_a_tr">
            <td class="gsc_a_t"><a href="/y">List view paper</a></td>
            <td class="gsc_a_y">2018</td>
        </tr></table>"#;
        let pubs = HtmlSnapshot::parse(html).publication_rows().unwrap();
        assert_eq!(pubs.len(), 1);
        assert_eq!(pubs[0].year, "2018");
        assert_eq!(pubs[0].citations, "0");
    }

    #[test]
    fn cell_text_is_trimmed_but_otherwise_verbatim() {
        let html = wrap_rows(
            "<tr class=\"gsc_a_tr\"><td class=\"gsc_a_t\"><a href=\"/z\">\n   Deep  Nets:  <i>Revisited</i>  </a>\
             <div class=\"gs_gray\"> A  Khan,  B Ali </div></td></tr>",
        );
        let pubs = HtmlSnapshot::parse(&html).publication_rows().unwrap();
        assert_eq!(pubs[0].title, "Deep  Nets:  Revisited");
        assert_eq!(pubs[0].authors, "A  Khan,  B Ali");
    }
}
