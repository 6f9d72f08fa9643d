//! Which object kinds take part in a comparison.

use facet::Facet;
use pgdrift_config::FilterConfig;
use regex::{Regex, RegexBuilder};

/// Toggles per object kind and per table part, plus an optional name
/// pattern for tables and views.
///
/// The default enables everything. An all-false filter is legal and
/// produces an empty comparison.
#[derive(Debug, Clone, PartialEq, Facet)]
#[facet(rename_all = "camelCase")]
pub struct ComparisonFilter {
    pub include_tables: bool,
    pub include_views: bool,
    pub include_functions: bool,
    pub include_sequences: bool,
    pub include_types: bool,
    pub include_extensions: bool,
    pub include_columns: bool,
    pub include_primary_keys: bool,
    pub include_foreign_keys: bool,
    pub include_unique_constraints: bool,
    pub include_check_constraints: bool,
    pub include_indexes: bool,
    pub include_triggers: bool,
    /// Applied to table and view names only. See [`NamePattern`].
    #[facet(default)]
    pub name_pattern: Option<String>,
}

macro_rules! toggles {
    ($($setter:ident => $field:ident),* $(,)?) => {
        $(
            pub fn $setter(mut self, on: bool) -> Self {
                self.$field = on;
                self
            }
        )*
    };
}

impl Default for ComparisonFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl ComparisonFilter {
    /// Every kind and every table part.
    pub fn all() -> Self {
        Self::uniform(true)
    }

    /// Nothing at all.
    pub fn none() -> Self {
        Self::uniform(false)
    }

    fn uniform(on: bool) -> Self {
        Self {
            include_tables: on,
            include_views: on,
            include_functions: on,
            include_sequences: on,
            include_types: on,
            include_extensions: on,
            include_columns: on,
            include_primary_keys: on,
            include_foreign_keys: on,
            include_unique_constraints: on,
            include_check_constraints: on,
            include_indexes: on,
            include_triggers: on,
            name_pattern: None,
        }
    }

    toggles! {
        with_tables => include_tables,
        with_views => include_views,
        with_functions => include_functions,
        with_sequences => include_sequences,
        with_types => include_types,
        with_extensions => include_extensions,
        with_columns => include_columns,
        with_primary_keys => include_primary_keys,
        with_foreign_keys => include_foreign_keys,
        with_unique_constraints => include_unique_constraints,
        with_check_constraints => include_check_constraints,
        with_indexes => include_indexes,
        with_triggers => include_triggers,
    }

    pub fn with_name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.name_pattern = Some(pattern.into());
        self
    }

    /// Only table-level objects, with every table part.
    pub fn tables_only() -> Self {
        Self {
            include_views: false,
            include_functions: false,
            include_sequences: false,
            include_types: false,
            include_extensions: false,
            ..Self::all()
        }
    }

    /// Compile the name pattern once for repeated matching.
    pub fn name_matcher(&self) -> NamePattern {
        match &self.name_pattern {
            Some(pattern) => NamePattern::new(pattern),
            None => NamePattern::Any,
        }
    }

    /// Whether a table or view name passes the name pattern.
    ///
    /// Compiles the pattern on every call; use [`Self::name_matcher`] in loops.
    pub fn matches_table(&self, name: &str) -> bool {
        self.name_matcher().matches(name)
    }
}

impl From<&FilterConfig> for ComparisonFilter {
    fn from(config: &FilterConfig) -> Self {
        let on = |toggle: Option<bool>| toggle.unwrap_or(true);
        Self {
            include_tables: on(config.include_tables),
            include_views: on(config.include_views),
            include_functions: on(config.include_functions),
            include_sequences: on(config.include_sequences),
            include_types: on(config.include_types),
            include_extensions: on(config.include_extensions),
            include_columns: on(config.include_columns),
            include_primary_keys: on(config.include_primary_keys),
            include_foreign_keys: on(config.include_foreign_keys),
            include_unique_constraints: on(config.include_unique_constraints),
            include_check_constraints: on(config.include_check_constraints),
            include_indexes: on(config.include_indexes),
            include_triggers: on(config.include_triggers),
            name_pattern: config.name_pattern.clone(),
        }
    }
}

/// A compiled table/view name pattern.
///
/// Patterns starting with `regex:` are regular expressions; anything else
/// is a glob where `*` matches any run of characters and `?` a single one.
/// Both are case-insensitive and must match the whole name.
#[derive(Debug, Clone)]
pub enum NamePattern {
    Any,
    Compiled(Regex),
    /// The pattern did not compile; nothing matches.
    Invalid,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Self {
        let source = match pattern.strip_prefix("regex:") {
            Some(re) => format!("^(?:{re})$"),
            None => glob_to_regex(pattern),
        };

        match RegexBuilder::new(&source).case_insensitive(true).build() {
            Ok(re) => NamePattern::Compiled(re),
            Err(e) => {
                tracing::warn!(pattern, error = %e, "name pattern does not compile, nothing will match");
                NamePattern::Invalid
            }
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Any => true,
            NamePattern::Compiled(re) => re.is_match(name),
            NamePattern::Invalid => false,
        }
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut re = String::with_capacity(glob.len() + 8);
    re.push('^');
    for c in glob.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    re
}
