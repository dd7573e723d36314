//! CSS selection over archive HTML.
//!
//! Thin layer over [`scraper`] giving the "required selector" semantics the
//! TOC parser and metadata lookup need: an empty result for a required
//! selector is a [`LookupError`], not an empty string.
//!
//! `scraper::Html` is not `Send`; parse and extract inside a synchronous
//! function and never hold an [`HtmlPage`] across an `.await`.

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// Selector lookup failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    /// A required selector matched nothing.
    #[error("no match for selector \"{selector}\"")]
    Missing {
        /// The selector that matched nothing.
        selector: String,
    },

    /// The matched element lacks a required attribute.
    #[error("selector \"{selector}\" matched but attribute \"{attribute}\" is missing")]
    MissingAttribute {
        /// The selector that matched.
        selector: String,
        /// The absent attribute.
        attribute: String,
    },

    /// The selector string is not valid CSS.
    #[error("invalid selector \"{selector}\": {reason}")]
    InvalidSelector {
        /// The offending selector.
        selector: String,
        /// Parser message.
        reason: String,
    },
}

impl LookupError {
    /// Returns the selector the failure refers to.
    #[must_use]
    pub fn selector(&self) -> &str {
        match self {
            Self::Missing { selector }
            | Self::MissingAttribute { selector, .. }
            | Self::InvalidSelector { selector, .. } => selector,
        }
    }
}

/// Compiles a CSS selector.
///
/// # Errors
///
/// Returns [`LookupError::InvalidSelector`] for malformed selectors.
pub fn parse_selector(selector: &str) -> Result<Selector, LookupError> {
    Selector::parse(selector).map_err(|e| LookupError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Collects an element's text content, trimmed.
#[must_use]
pub fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// A parsed HTML document.
pub struct HtmlPage {
    html: Html,
}

impl HtmlPage {
    /// Parses a full HTML document.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self {
            html: Html::parse_document(raw),
        }
    }

    /// Returns every element matching `selector`, possibly none.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::InvalidSelector`] for malformed selectors.
    pub fn select(&self, selector: &str) -> Result<Vec<ElementRef<'_>>, LookupError> {
        let compiled = parse_selector(selector)?;
        Ok(self.html.select(&compiled).collect())
    }

    /// Returns the first element matching a required selector.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Missing`] when nothing matches.
    pub fn select_required(&self, selector: &str) -> Result<ElementRef<'_>, LookupError> {
        let compiled = parse_selector(selector)?;
        self.html
            .select(&compiled)
            .next()
            .ok_or_else(|| LookupError::Missing {
                selector: selector.to_string(),
            })
    }

    /// Returns the trimmed text of the first match of a required selector.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Missing`] when nothing matches.
    pub fn select_text(&self, selector: &str) -> Result<String, LookupError> {
        self.select_required(selector).map(|el| element_text(&el))
    }

    /// Returns an attribute of the first match of a required selector.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Missing`] when nothing matches and
    /// [`LookupError::MissingAttribute`] when the attribute is absent.
    pub fn select_attr(&self, selector: &str, attribute: &str) -> Result<String, LookupError> {
        let element = self.select_required(selector)?;
        element
            .value()
            .attr(attribute)
            .map(str::to_string)
            .ok_or_else(|| LookupError::MissingAttribute {
                selector: selector.to_string(),
                attribute: attribute.to_string(),
            })
    }
}

impl std::fmt::Debug for HtmlPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlPage").finish_non_exhaustive()
    }
}
