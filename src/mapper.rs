//! Dublin Core to [`CanonicalRecord`] mapping.
//!
//! Mapping is pure and infallible: every field is best-effort, and a record
//! with no usable title still maps (with [`PLACEHOLDER_TITLE`]).

use chrono::Utc;

use crate::oai::DC_NS;
use crate::record::{CanonicalRecord, PLACEHOLDER_TITLE};
use crate::xml::XmlElement;

/// Dublin Core elements the mapper reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DcElement {
    /// `dc:title`, the record title.
    Title,
    /// `dc:creator`, primary authors.
    Creator,
    /// `dc:contributor`, used for authors when no creator is given.
    Contributor,
    /// `dc:description`, mapped to the abstract.
    Description,
    /// `dc:subject`, mapped to keywords.
    Subject,
    /// `dc:date`, mapped to the issue date.
    Date,
    /// `dc:type`, the resource type.
    Type,
    /// `dc:language`.
    Language,
    /// `dc:identifier`, scanned for the landing-page URL.
    Identifier,
}

impl DcElement {
    /// Local element name in the Dublin Core namespace.
    #[must_use]
    pub fn local_name(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Creator => "creator",
            Self::Contributor => "contributor",
            Self::Description => "description",
            Self::Subject => "subject",
            Self::Date => "date",
            Self::Type => "type",
            Self::Language => "language",
            Self::Identifier => "identifier",
        }
    }
}

/// Typed access to Dublin Core values inside a metadata container.
pub trait DublinCoreFields {
    /// All non-blank occurrences of `element`, trimmed, in document order.
    fn all_non_blank(&self, element: DcElement) -> Vec<String>;

    /// First non-blank occurrence of `element`, trimmed.
    fn first_non_blank(&self, element: DcElement) -> Option<String> {
        self.all_non_blank(element).into_iter().next()
    }
}

impl DublinCoreFields for XmlElement {
    fn all_non_blank(&self, element: DcElement) -> Vec<String> {
        self.children_named(Some(DC_NS), element.local_name())
            .filter_map(XmlElement::trimmed_text)
            .map(str::to_string)
            .collect()
    }

    fn first_non_blank(&self, element: DcElement) -> Option<String> {
        self.children_named(Some(DC_NS), element.local_name())
            .find_map(XmlElement::trimmed_text)
            .map(str::to_string)
    }
}

/// Source attributes stamped on every record of a harvest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContext {
    /// Institution that runs the repository.
    pub institution: String,
    /// Repository label stamped on every record.
    pub repository: String,
}

impl SourceContext {
    /// Context for one configured source.
    #[must_use]
    pub fn new(institution: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            institution: institution.into(),
            repository: repository.into(),
        }
    }
}

/// Maps one Dublin Core container to a canonical record.
///
/// - single-valued fields take the first non-blank occurrence;
/// - authors come from `creator`, falling back to `contributor` only when no
///   creator is present;
/// - the landing page is the first `identifier` starting with `http://` or
///   `https://`.
#[must_use]
pub fn map_dublin_core<F: DublinCoreFields + ?Sized>(
    identifier: &str,
    metadata: &F,
    context: &SourceContext,
) -> CanonicalRecord {
    let mut authors = metadata.all_non_blank(DcElement::Creator);
    if authors.is_empty() {
        authors = metadata.all_non_blank(DcElement::Contributor);
    }

    let url_landing_page = metadata
        .all_non_blank(DcElement::Identifier)
        .into_iter()
        .find(|value| value.starts_with("http://") || value.starts_with("https://"));

    CanonicalRecord {
        id: identifier.to_string(),
        oai_identifier: identifier.to_string(),
        title: metadata
            .first_non_blank(DcElement::Title)
            .unwrap_or_else(|| PLACEHOLDER_TITLE.to_string()),
        authors,
        institution: context.institution.clone(),
        repository: context.repository.clone(),
        date_issued: metadata.first_non_blank(DcElement::Date),
        record_type: metadata.first_non_blank(DcElement::Type),
        url_landing_page,
        abstract_text: metadata.first_non_blank(DcElement::Description),
        keywords: metadata.all_non_blank(DcElement::Subject),
        language: metadata.first_non_blank(DcElement::Language),
        collections: Vec::new(),
        date_indexed: Utc::now(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::oai::OAI_DC_NS;

    fn dc(fields: &[(&str, &str)]) -> XmlElement {
        fields
            .iter()
            .fold(XmlElement::new(Some(OAI_DC_NS), "dc"), |el, (name, text)| {
                el.with_child(XmlElement::new(Some(DC_NS), *name).with_text(*text))
            })
    }

    fn context() -> SourceContext {
        SourceContext::new("Universidad de La Habana", "Omeka UH")
    }

    #[test]
    fn test_identity_and_context() {
        let record = map_dublin_core("oai:uh:42", &dc(&[("title", "T")]), &context());
        assert_eq!(record.id, "oai:uh:42");
        assert_eq!(record.oai_identifier, record.id);
        assert_eq!(record.institution, "Universidad de La Habana");
        assert_eq!(record.repository, "Omeka UH");
        assert!(record.collections.is_empty());
    }

    #[test]
    fn test_missing_title_uses_placeholder() {
        let record = map_dublin_core("oai:1", &dc(&[("creator", "A")]), &context());
        assert_eq!(record.title, PLACEHOLDER_TITLE);

        let record = map_dublin_core("oai:1", &dc(&[("title", "   ")]), &context());
        assert_eq!(record.title, PLACEHOLDER_TITLE);
    }

    #[test]
    fn test_single_valued_fields_take_first_non_blank() {
        let metadata = dc(&[
            ("title", " "),
            ("title", "  Segundo título "),
            ("title", "Tercero"),
            ("date", "2020"),
            ("date", "2021-01-01"),
            ("type", "Article"),
            ("language", "spa"),
            ("description", ""),
            ("description", "Resumen"),
        ]);
        let record = map_dublin_core("oai:1", &metadata, &context());
        assert_eq!(record.title, "Segundo título");
        assert_eq!(record.date_issued.as_deref(), Some("2020"));
        assert_eq!(record.record_type.as_deref(), Some("Article"));
        assert_eq!(record.language.as_deref(), Some("spa"));
        assert_eq!(record.abstract_text.as_deref(), Some("Resumen"));
    }

    #[test]
    fn test_multi_valued_fields_keep_order_and_duplicates() {
        let metadata = dc(&[
            ("creator", "B"),
            ("creator", " "),
            ("creator", "A"),
            ("subject", "x"),
            ("subject", "x"),
        ]);
        let record = map_dublin_core("oai:1", &metadata, &context());
        assert_eq!(record.authors, vec!["B", "A"]);
        assert_eq!(record.keywords, vec!["x", "x"]);
    }

    #[test]
    fn test_authors_fall_back_to_contributors_only_without_creators() {
        let metadata = dc(&[("contributor", "Tutor"), ("contributor", "Co")]);
        let record = map_dublin_core("oai:1", &metadata, &context());
        assert_eq!(record.authors, vec!["Tutor", "Co"]);

        let metadata = dc(&[("creator", "Autor"), ("contributor", "Tutor")]);
        let record = map_dublin_core("oai:1", &metadata, &context());
        assert_eq!(record.authors, vec!["Autor"]);
    }

    #[test]
    fn test_landing_page_skips_non_url_identifiers() {
        let metadata = dc(&[
            ("identifier", "ISBN 978-3-16"),
            ("identifier", "https://repo.example/item/1"),
        ]);
        let record = map_dublin_core("oai:1", &metadata, &context());
        assert_eq!(
            record.url_landing_page.as_deref(),
            Some("https://repo.example/item/1")
        );
    }

    #[test]
    fn test_landing_page_is_first_match() {
        let metadata = dc(&[
            ("identifier", "http://first.example/a"),
            ("identifier", "https://second.example/b"),
        ]);
        let record = map_dublin_core("oai:1", &metadata, &context());
        assert_eq!(
            record.url_landing_page.as_deref(),
            Some("http://first.example/a")
        );
    }

    #[test]
    fn test_landing_page_absent_without_url_identifier() {
        let metadata = dc(&[("identifier", "urn:nbn:1"), ("identifier", "ftp://x")]);
        let record = map_dublin_core("oai:1", &metadata, &context());
        assert_eq!(record.url_landing_page, None);
    }

    #[test]
    fn test_elements_outside_dc_namespace_are_ignored() {
        let metadata = XmlElement::new(Some(OAI_DC_NS), "dc")
            .with_child(XmlElement::new(None, "title").with_text("No namespace"))
            .with_child(XmlElement::new(Some("urn:other"), "title").with_text("Other"));
        let record = map_dublin_core("oai:1", &metadata, &context());
        assert_eq!(record.title, PLACEHOLDER_TITLE);
    }

    #[test]
    fn test_mapping_is_deterministic_except_date_indexed() {
        let metadata = dc(&[("title", "T"), ("creator", "A"), ("subject", "s")]);
        let first = map_dublin_core("oai:1", &metadata, &context());
        let mut second = map_dublin_core("oai:1", &metadata, &context());
        assert!(second.date_indexed >= first.date_indexed);
        second.date_indexed = first.date_indexed;
        assert_eq!(first, second);
    }
}
