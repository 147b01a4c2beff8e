//! Reads TEI-style markup into shallow views of the elements of interest.


use std::path::Path;

use anyhow::{Context, Result};
use hashbrown::HashMap;

use crate::ExtractError;

/// A parsed markup element, with at most one level of child elements expanded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShallowNode {
    /// Local name of the element.
    pub tag: String,
    /// Attributes by local name.
    pub attributes: HashMap<String, String>,
    /// Trimmed text preceding the first child element. `None` if empty.
    pub text: Option<String>,
    /// Direct child elements in document order. Their own `children` are always empty.
    pub children: Vec<ShallowNode>,
}

impl ShallowNode {
    fn from_element(node: roxmltree::Node<'_, '_>, expand_children: bool) -> Self {
        let children = if expand_children {
            node.children()
                .filter(roxmltree::Node::is_element)
                .map(|child| Self::from_element(child, false))
                .collect()
        } else {
            Vec::new()
        };

        Self {
            tag: node.tag_name().name().to_owned(),
            attributes: node
                .attributes()
                .map(|attr| (attr.name().to_owned(), attr.value().to_owned()))
                .collect(),
            text: node.text().and_then(trimmed_text),
            children,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Returns the trimmed `text`, or `None` if nothing but whitespace remains.
pub(crate) fn trimmed_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Looks up the first child of `node` tagged `child_tag`.
///
/// Returns the named `attribute` of that child if one is requested, otherwise its text. `None`
/// when there is no such child, attribute, or text.
pub fn extract_value<'a>(
    node: &'a ShallowNode,
    child_tag: &str,
    attribute: Option<&str>,
) -> Option<&'a str> {
    let child = node.children.iter().find(|child| child.tag == child_tag)?;
    match attribute {
        Some(attribute) => child.attribute(attribute),
        None => child.text.as_deref(),
    }
}

/// Reads a markup document from `path` into memory.
pub fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading markup document {:?}", path))
}

/// A fully parsed markup document and its default namespace.
pub struct Markup<'input> {
    doc: roxmltree::Document<'input>,
    namespace: String,
}

impl<'input> Markup<'input> {
    /// Parses the whole of `text`. Fails with [ExtractError::MalformedDocument] if it is not
    /// well-formed, or if its root element declares no default namespace.
    pub fn parse(text: &'input str) -> Result<Self> {
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..Default::default()
        };
        let doc = roxmltree::Document::parse_with_options(text, options)
            .context(ExtractError::MalformedDocument)?;
        let namespace = doc
            .root_element()
            .lookup_namespace_uri(None)
            .ok_or(ExtractError::MalformedDocument)
            .context("root element has no default namespace")?
            .to_owned();
        Ok(Self { doc, namespace })
    }

    /// The default namespace declared on the root element.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns a shallow view of every element below the root whose local name is
    /// `structural_tag` and which lives in the default namespace, in document order.
    pub fn read(&self, structural_tag: &str) -> Vec<ShallowNode> {
        self.elements(structural_tag)
            .map(|node| ShallowNode::from_element(node, true))
            .collect()
    }

    /// Iterates over the matching elements themselves, for callers that need the full subtree.
    pub(crate) fn elements<'a>(
        &'a self,
        structural_tag: &'a str,
    ) -> impl Iterator<Item = roxmltree::Node<'a, 'input>> + 'a {
        let namespace = self.namespace.as_str();
        self.doc
            .root_element()
            .descendants()
            .skip(1)
            .filter(move |node| {
                node.is_element()
                    && node.tag_name().name() == structural_tag
                    && node.tag_name().namespace() == Some(namespace)
            })
    }
}

/// Parses `document` and reads every element tagged `structural_tag` from it.
pub fn read_structure(document: &str, structural_tag: &str) -> Result<Vec<ShallowNode>> {
    Ok(Markup::parse(document)?.read(structural_tag))
}
