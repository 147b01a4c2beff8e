//! Export of table subtrees as standalone XML documents.


use std::{fs, io::Write, path::Path};

use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};

use crate::{
    config::UnidentifiedPolicy,
    figures::FIGURE_TAG,
    identifier::{Keyword, extract_identifier},
    markup::Markup,
    output::{ItemOutcome, file_stem},
};

/// Name of the synthetic root element wrapping each written table.
pub const FRAGMENT_ROOT: &str = "tables";

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

const INDENT: &str = "  ";

/// One table subtree, copied out of its markup document.
#[derive(Clone, Debug, PartialEq)]
pub struct TableFragment {
    /// Identifier from the table's heading, e.g. "table2".
    pub identifier: Option<String>,
    pub element: FragmentElement,
}

/// Owned copy of an element, with qualified names as they appeared in the source.
#[derive(Clone, Debug, PartialEq)]
pub struct FragmentElement {
    pub name: String,
    /// Namespace declarations to emit on this element, as `(prefix, uri)`.
    pub namespaces: Vec<(Option<String>, String)>,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<FragmentNode>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FragmentNode {
    Element(FragmentElement),
    Text(String),
}

impl FragmentElement {
    /// Copies `node` and its descendants, keeping text verbatim. The top element declares every
    /// namespace in scope; descendants declare only bindings their parent does not have.
    fn copy(node: roxmltree::Node<'_, '_>, top: bool) -> Self {
        let inherited: Vec<(Option<&str>, &str)> = match node.parent_element() {
            Some(parent) if !top => parent.namespaces().map(|ns| (ns.name(), ns.uri())).collect(),
            _ => Vec::new(),
        };
        let namespaces = node
            .namespaces()
            .map(|ns| (ns.name(), ns.uri()))
            .filter(|&(prefix, uri)| prefix != Some("xml") && !inherited.contains(&(prefix, uri)))
            .map(|(prefix, uri)| (prefix.map(str::to_owned), uri.to_owned()))
            .collect();

        let children = node
            .children()
            .filter_map(|child| {
                if child.is_element() {
                    Some(FragmentNode::Element(Self::copy(child, false)))
                } else if child.is_text() {
                    child.text().map(|text| FragmentNode::Text(text.to_owned()))
                } else {
                    None
                }
            })
            .collect();

        Self {
            name: qualified_name(node, node.tag_name().namespace(), node.tag_name().name()),
            namespaces,
            attributes: node
                .attributes()
                .map(|attr| {
                    (
                        qualified_name(node, attr.namespace(), attr.name()),
                        attr.value().to_owned(),
                    )
                })
                .collect(),
            children,
        }
    }

    /// Whether any child text is content rather than layout.
    fn has_mixed_content(&self) -> bool {
        self.children.iter().any(|child| match child {
            FragmentNode::Text(text) => !is_layout(text),
            FragmentNode::Element(_) => false,
        })
    }

    /// Writes the element at nesting `depth`. Element-only content is re-indented, with layout
    /// text replaced; within mixed content everything is written verbatim.
    fn write<W: Write>(&self, writer: &mut Writer<W>, depth: usize, indent: bool) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (prefix, uri) in &self.namespaces {
            let key = match prefix {
                Some(prefix) => format!("xmlns:{prefix}"),
                None => "xmlns".to_string(),
            };
            start.push_attribute((key.as_str(), uri.as_str()));
        }
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        let indent = indent && !self.has_mixed_content();
        let written: Vec<&FragmentNode> = self
            .children
            .iter()
            .filter(|child| !(indent && matches!(child, FragmentNode::Text(_))))
            .collect();
        if written.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        for child in written {
            match child {
                FragmentNode::Element(element) => {
                    if indent {
                        write_newline(writer, depth + 1)?;
                    }
                    element.write(writer, depth + 1, indent)?;
                }
                FragmentNode::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            }
        }
        if indent {
            write_newline(writer, depth)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

/// Whitespace-only text spanning lines, which only lays out element-only content.
fn is_layout(text: &str) -> bool {
    text.contains('\n') && text.trim().is_empty()
}

fn write_newline<W: Write>(writer: &mut Writer<W>, depth: usize) -> Result<()> {
    let layout = format!("\n{}", INDENT.repeat(depth));
    writer.write_event(Event::Text(BytesText::from_escaped(layout)))?;
    Ok(())
}

/// Forms the name of an element or attribute as written in the source, using the prefix bound
/// to `namespace` in scope at `node`.
fn qualified_name(node: roxmltree::Node<'_, '_>, namespace: Option<&str>, local: &str) -> String {
    let prefix = match namespace {
        Some(XML_NS) => Some("xml"),
        Some(uri) => node.lookup_prefix(uri),
        None => None,
    };
    match prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_owned(),
    }
}

/// Returns every table in `markup`: the figure-like elements with `type="table"`, in document
/// order.
pub fn export_tables(markup: &Markup<'_>) -> Vec<TableFragment> {
    markup
        .elements(FIGURE_TAG)
        .filter(|node| node.attribute("type") == Some("table"))
        .map(|node| {
            let heading = node
                .descendants()
                .find(|d| d.is_element() && d.tag_name().name() == "head")
                .and_then(|head| head.text());
            TableFragment {
                identifier: extract_identifier(heading, Keyword::Table),
                element: FragmentElement::copy(node, true),
            }
        })
        .collect()
}

impl TableFragment {
    /// Serialises the fragment as a standalone UTF-8 document, indented outside mixed content, with the table as the
    /// sole child of a [FRAGMENT_ROOT] element.
    pub fn to_document(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;
        writer.write_event(Event::Start(BytesStart::new(FRAGMENT_ROOT)))?;
        write_newline(&mut writer, 1)?;
        self.element.write(&mut writer, 1, true)?;
        write_newline(&mut writer, 0)?;
        writer.write_event(Event::End(BytesEnd::new(FRAGMENT_ROOT)))?;
        let mut document = writer.into_inner();
        document.push(b'\n');
        Ok(document)
    }
}

/// Writes each fragment to `{output_dir}/{batch_id}_{identifier}.xml`, creating `output_dir`
/// if needed. Fragments without an identifier are handled according to `policy`.
///
/// Fails as a whole only if the directory cannot be created.
pub fn write_fragments(
    fragments: &[TableFragment],
    output_dir: &Path,
    batch_id: usize,
    policy: UnidentifiedPolicy,
) -> Result<Vec<ItemOutcome>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating table output directory {:?}", output_dir))?;

    Ok(fragments
        .iter()
        .enumerate()
        .map(|(position, fragment)| {
            let Some(stem) = file_stem(
                batch_id,
                fragment.identifier.as_deref(),
                "table",
                position,
                policy,
            ) else {
                log::info!(
                    "Skipping table at position {} of document {}: heading has no identifier.",
                    position,
                    batch_id
                );
                return ItemOutcome::Skipped;
            };
            let path = output_dir.join(format!("{stem}.xml"));
            match write_fragment(fragment, &path) {
                Ok(()) => ItemOutcome::Written(path),
                Err(err) => {
                    log::warn!("Failed to write table: {:?}", err);
                    ItemOutcome::Failed(err)
                }
            }
        })
        .collect())
}

fn write_fragment(fragment: &TableFragment, path: &Path) -> Result<()> {
    let document = fragment
        .to_document()
        .with_context(|| format!("serialising table for {:?}", path))?;
    let mut file =
        AtomicWriteFile::open(path).with_context(|| format!("opening {:?} for writing", path))?;
    file.write_all(&document)
        .with_context(|| format!("writing {:?}", path))?;
    file.commit()
        .with_context(|| format!("committing {:?}", path))?;
    Ok(())
}
