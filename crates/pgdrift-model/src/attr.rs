//! Attribute-level differences between two objects of the same kind.

use facet::Facet;
use std::fmt;

/// One changed scalar attribute of a schema object.
///
/// `None` means the attribute is absent (SQL NULL) on that side. An empty
/// string is a value and is kept distinct from `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Facet)]
#[facet(rename_all = "camelCase")]
pub struct AttributeDifference {
    pub attribute_name: String,
    #[facet(default)]
    pub source_value: Option<String>,
    #[facet(default)]
    pub destination_value: Option<String>,
}

impl AttributeDifference {
    pub fn new(
        attribute_name: impl Into<String>,
        source_value: Option<String>,
        destination_value: Option<String>,
    ) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            source_value,
            destination_value,
        }
    }
}

impl fmt::Display for AttributeDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.attribute_name,
            self.source_value.as_deref().unwrap_or("(none)"),
            self.destination_value.as_deref().unwrap_or("(none)")
        )
    }
}

/// A value that can take part in an attribute comparison.
///
/// Values are compared as-is. The rendered form only ends up in
/// [`AttributeDifference`] once a pair differs.
pub trait AttributeValue {
    fn render(&self) -> Option<String>;
}

impl AttributeValue for str {
    fn render(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl AttributeValue for String {
    fn render(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl AttributeValue for bool {
    fn render(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl AttributeValue for i64 {
    fn render(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl<T: AttributeValue> AttributeValue for Option<T> {
    fn render(&self) -> Option<String> {
        self.as_ref().and_then(AttributeValue::render)
    }
}

/// Ordered lists (column lists, enum labels) compare element by element.
impl AttributeValue for Vec<String> {
    fn render(&self) -> Option<String> {
        Some(self.join(", "))
    }
}

/// Collects attribute differences for one pair of objects.
///
/// Every model type feeds its attributes through the same routine, in the
/// order they should be reported:
///
/// ```
/// use pgdrift_model::AttributeDiffer;
///
/// let diffs = AttributeDiffer::new()
///     .attr("dataType", "integer", "bigint")
///     .attr("nullable", &true, &true)
///     .finish();
/// assert_eq!(diffs.len(), 1);
/// assert_eq!(diffs[0].attribute_name, "dataType");
/// ```
#[derive(Debug, Default)]
pub struct AttributeDiffer {
    differences: Vec<AttributeDifference>,
}

impl AttributeDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare one attribute. Values are compared exactly (case-sensitive).
    pub fn attr<V: AttributeValue + PartialEq + ?Sized>(
        mut self,
        name: &str,
        source: &V,
        destination: &V,
    ) -> Self {
        if source != destination {
            self.differences.push(AttributeDifference::new(
                name,
                source.render(),
                destination.render(),
            ));
        }
        self
    }

    pub fn finish(self) -> Vec<AttributeDifference> {
        self.differences
    }
}
